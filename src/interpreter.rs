use std::{
    cell::RefCell,
    io::{self, BufRead, Write},
    mem,
    rc::Rc,
};

use tracing::{debug, instrument};

use crate::{
    ast, builtins,
    callable::{Callable, UserFunction},
    environment::Environment,
    error::RuntimeError,
    token::{Token, TokenKind},
    value::Value,
};

/// How a statement finished. `Return` unwinds to the nearest function call.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    output: Box<dyn Write>,
    input: Box<dyn BufRead>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// An interpreter printing to stdout and reading `input()` from stdin.
    pub fn new() -> Self {
        Self::with_io(Box::new(io::stdout()), Box::new(io::stdin().lock()))
    }

    pub fn with_output(output: Box<dyn Write>) -> Self {
        Self::with_io(output, Box::new(io::empty()))
    }

    pub fn with_io(output: Box<dyn Write>, input: Box<dyn BufRead>) -> Self {
        let mut globals = Environment::new();
        builtins::install(&mut globals);
        let globals = Rc::new(RefCell::new(globals));

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            output,
            input,
        }
    }

    pub fn globals(&self) -> Rc<RefCell<Environment>> {
        Rc::clone(&self.globals)
    }

    pub fn output(&mut self) -> &mut dyn Write {
        self.output.as_mut()
    }

    /// Reads one line of input without its line terminator, `None` at EOF.
    pub fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        let trimmed_len = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed_len);
        Ok(Some(line))
    }

    /// Runs top-level statements in order. The first runtime error stops the
    /// whole run and is handed back to the caller.
    pub fn interpret(&mut self, statements: &[ast::Stmt]) -> Result<(), RuntimeError> {
        for stmt in statements {
            match self.execute(stmt) {
                Ok(Flow::Normal) => {}
                Ok(Flow::Return(_)) => break,
                Err(err) => {
                    debug!(line = err.token().line, "runtime error: {}", err);
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    /// Runs `statements` in `environment`, restoring the current scope
    /// afterwards whether they completed, returned or failed.
    pub fn execute_block(
        &mut self,
        statements: &[ast::Stmt],
        environment: Environment,
    ) -> Result<Flow, RuntimeError> {
        let previous = mem::replace(&mut self.environment, Rc::new(RefCell::new(environment)));
        let result = self.execute_all(statements);
        self.environment = previous;
        result
    }

    fn execute_all(&mut self, statements: &[ast::Stmt]) -> Result<Flow, RuntimeError> {
        for stmt in statements {
            if let Flow::Return(value) = self.execute(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn execute(&mut self, stmt: &ast::Stmt) -> Result<Flow, RuntimeError> {
        match stmt {
            ast::Stmt::Expr(expr_stmt) => {
                self.evaluate(&expr_stmt.expr)?;
            }
            ast::Stmt::Print(print) => {
                let value = self.evaluate(&print.expr)?;
                writeln!(self.output, "{}", value.stringify()).map_err(|err| {
                    RuntimeError::io_error(&print.keyword, format!("Error writing output: {}.", err))
                })?;
            }
            ast::Stmt::VarDecl(var_decl) => {
                let value = match &var_decl.init {
                    Some(init) => self.evaluate(init)?,
                    None => Value::Nil,
                };
                self.environment
                    .borrow_mut()
                    .define(&var_decl.ident, value)?;
            }
            ast::Stmt::Block(block) => {
                let environment = Environment::with_enclosing(Rc::clone(&self.environment));
                return self.execute_block(&block.stmts, environment);
            }
            ast::Stmt::If(if_stmt) => {
                if self.evaluate(&if_stmt.condition)?.is_truthy() {
                    return self.execute(&if_stmt.then_branch);
                } else if let Some(else_branch) = &if_stmt.else_branch {
                    return self.execute(else_branch);
                }
            }
            ast::Stmt::While(while_stmt) => {
                while self.evaluate(&while_stmt.condition)?.is_truthy() {
                    if let Flow::Return(value) = self.execute(&while_stmt.body)? {
                        return Ok(Flow::Return(value));
                    }
                }
            }
            ast::Stmt::Fun(fun_decl) => {
                let function = UserFunction::new(Rc::clone(fun_decl));
                self.environment
                    .borrow_mut()
                    .define(&fun_decl.ident, Value::Callable(Box::new(function)))?;
            }
            ast::Stmt::Return(return_stmt) => {
                let value = match &return_stmt.value {
                    Some(value) => self.evaluate(value)?,
                    None => Value::Nil,
                };
                return Ok(Flow::Return(value));
            }
        }

        Ok(Flow::Normal)
    }

    pub fn evaluate(&mut self, expr: &ast::Expr) -> Result<Value, RuntimeError> {
        match expr {
            ast::Expr::Lit(lit) => Ok(Value::from(&lit.value)),
            ast::Expr::Grouping(grouping) => self.evaluate(&grouping.expr),
            ast::Expr::Var(var) => self.environment.borrow().get(&var.ident),
            ast::Expr::Assign(assign) => {
                let value = self.evaluate(&assign.value)?;
                self.environment
                    .borrow_mut()
                    .assign(&assign.ident, value.clone())?;
                Ok(value)
            }
            ast::Expr::Logical(logical) => {
                let left = self.evaluate(&logical.left)?;
                let short_circuits = match logical.op.kind {
                    TokenKind::Or => left.is_truthy(),
                    _ => !left.is_truthy(),
                };

                if short_circuits {
                    Ok(left)
                } else {
                    self.evaluate(&logical.right)
                }
            }
            ast::Expr::Unary(unary) => {
                let operand = self.evaluate(&unary.expr)?;
                match unary.op.kind {
                    TokenKind::Minus => match operand {
                        Value::Number(number) => Ok(Value::Number(-number)),
                        _ => Err(RuntimeError::type_error(
                            &unary.op,
                            "Operand must be a number.",
                        )),
                    },
                    _ => Ok(Value::Bool(!operand.is_truthy())),
                }
            }
            ast::Expr::Binary(binary) => {
                let left = self.evaluate(&binary.left)?;
                let right = self.evaluate(&binary.right)?;
                binary_op(&binary.op, left, right)
            }
            ast::Expr::Call(call) => {
                let callable = match self.evaluate(&call.callee)? {
                    Value::Callable(callable) => callable,
                    _ => {
                        return Err(RuntimeError::type_error(
                            &call.paren,
                            "Can only call functions.",
                        ))
                    }
                };

                let args = call
                    .args
                    .iter()
                    .map(|arg| self.evaluate(arg))
                    .collect::<Result<Vec<_>, _>>()?;

                if args.len() != callable.arity() {
                    return Err(RuntimeError::Arity {
                        token: call.paren.clone(),
                        expected: callable.arity(),
                        found: args.len(),
                    });
                }

                self.call(callable.as_ref(), args, &call.paren)
            }
        }
    }

    #[instrument(level = "trace", skip_all, fields(callee = callable.name(), line = paren.line))]
    fn call(
        &mut self,
        callable: &dyn Callable,
        args: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, RuntimeError> {
        callable.call(self, args, paren)
    }
}

fn binary_op(op: &Token, left: Value, right: Value) -> Result<Value, RuntimeError> {
    match op.kind {
        TokenKind::EqualEqual => Ok(Value::Bool(left == right)),
        TokenKind::BangEqual => Ok(Value::Bool(left != right)),
        TokenKind::Ampersand => Ok(Value::String(left.stringify() + &right.stringify())),
        TokenKind::Plus => match (numeric_operand(&left), numeric_operand(&right)) {
            (Some(left), Some(right)) => Ok(Value::Number(left + right)),
            _ => Err(RuntimeError::type_error(
                op,
                "Operands must be numbers. Use '&' to concatenate strings.",
            )),
        },
        _ => {
            let (left, right) = match (left, right) {
                (Value::Number(left), Value::Number(right)) => (left, right),
                _ => return Err(RuntimeError::type_error(op, "Operands must be numbers.")),
            };

            Ok(match op.kind {
                TokenKind::Minus => Value::Number(left - right),
                TokenKind::Star => Value::Number(left * right),
                TokenKind::Slash => Value::Number(left / right),
                TokenKind::Greater => Value::Bool(left > right),
                TokenKind::GreaterEqual => Value::Bool(left >= right),
                TokenKind::Lesser => Value::Bool(left < right),
                TokenKind::LesserEqual => Value::Bool(left <= right),
                _ => {
                    return Err(RuntimeError::type_error(
                        op,
                        format!("Unknown binary operator '{}'.", op.lexeme),
                    ))
                }
            })
        }
    }
}

/// Numbers, and strings that parse as numbers, can take part in `+`.
fn numeric_operand(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => Some(*number),
        Value::String(string) => string.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{common::Diagnostics, lexer, parser};
    use pretty_assertions::assert_eq;

    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn run(source: &str) -> (String, Result<(), RuntimeError>) {
        let mut diagnostics = Diagnostics::new();
        let tokens = lexer::lex(source, &mut diagnostics);
        let statements = parser::parse(&tokens, &mut diagnostics);
        assert!(!diagnostics.had_error(), "{:?}", diagnostics.errors());

        let buffer = SharedBuffer::default();
        let mut interpreter = Interpreter::with_output(Box::new(buffer.clone()));
        let result = interpreter.interpret(&statements);

        let output = String::from_utf8_lossy(&buffer.0.borrow()).into_owned();
        (output, result)
    }

    fn output_of(source: &str) -> String {
        let (output, result) = run(source);
        assert_eq!(result, Ok(()));
        output
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(output_of("print 1 + 2 * 3 - 4 / 2;"), "5\n");
        assert_eq!(output_of("print (1 + 2) * 3;"), "9\n");
        assert_eq!(output_of("print -3 * 2;"), "-6\n");
        assert_eq!(output_of("print 7 / 2;"), "3.5\n");
    }

    #[test]
    fn division_by_zero_follows_ieee() {
        assert_eq!(output_of("print 1 / 0;"), "inf\n");
        assert_eq!(output_of("print -1 / 0;"), "-inf\n");
        assert_eq!(output_of("print 0 / 0 == 0 / 0;"), "false\n");
    }

    #[test]
    fn plus_coerces_numeric_strings() {
        assert_eq!(output_of("print \"3\" + 4;"), "7\n");
        assert_eq!(output_of("print \" 1.5 \" + \"2\";"), "3.5\n");

        let (_, result) = run("print \"a\" + 1;");
        assert!(matches!(result, Err(RuntimeError::Type { .. })));
        let (_, result) = run("print nil + 1;");
        assert!(matches!(result, Err(RuntimeError::Type { .. })));
    }

    #[test]
    fn ampersand_concatenates_every_value() {
        assert_eq!(output_of("print \"3\" & 4;"), "34\n");
        assert_eq!(output_of("print true & nil;"), "true無\n");
        assert_eq!(output_of("print nil & nil;"), "無無\n");
        assert_eq!(output_of("print 1.50 & false;"), "1.5false\n");
    }

    #[test]
    fn equality_across_types() {
        assert_eq!(output_of("print nil == nil;"), "true\n");
        assert_eq!(output_of("print nil == false;"), "false\n");
        assert_eq!(output_of("print 1 == \"1\";"), "false\n");
        assert_eq!(output_of("print \"a\" != \"b\";"), "true\n");
        assert_eq!(output_of("fun f() {} var g = f; print f == g;"), "true\n");
        assert_eq!(output_of("fun f() {} fun g() {} print f == g;"), "false\n");
        assert_eq!(output_of("print clock == clock;"), "true\n");
    }

    #[test]
    fn comparison_requires_numbers() {
        assert_eq!(output_of("print 1 < 2; print 2 <= 2; print 3 > 4;"), "true\ntrue\nfalse\n");
        let (_, result) = run("print \"a\" < \"b\";");
        assert!(matches!(result, Err(RuntimeError::Type { .. })));
    }

    #[test]
    fn unary_operators() {
        assert_eq!(output_of("print !nil; print !0; print !!\"\";"), "true\nfalse\ntrue\n");
        let (_, result) = run("print -\"1\";");
        assert!(matches!(result, Err(RuntimeError::Type { .. })));
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(output_of("print nil or \"yes\";"), "yes\n");
        assert_eq!(output_of("print 0 and 2;"), "2\n");
        assert_eq!(output_of("print false and undefinedName;"), "false\n");
    }

    #[test]
    fn blocks_restore_scope_after_error() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lexer::lex("var x = 1; { var x = 2; print missing; }", &mut diagnostics);
        let statements = parser::parse(&tokens, &mut diagnostics);

        let mut interpreter = Interpreter::with_output(Box::new(io::sink()));
        assert!(interpreter.interpret(&statements).is_err());

        let tokens = lexer::lex("x", &mut diagnostics);
        let expr = parser::parse_expression(&tokens, &mut diagnostics);
        let value = expr.map(|expr| interpreter.evaluate(&expr));
        assert_eq!(value, Some(Ok(Value::Number(1.0))));
    }

    #[test]
    fn functions_bind_to_globals() {
        let source = "
            var who = \"global\";
            fun outer() {
                var who = \"local\";
                fun inner() { return who; }
                return inner();
            }
            print outer();
        ";
        assert_eq!(output_of(source), "global\n");
    }

    #[test]
    fn recursion_and_missing_return() {
        let source = "
            fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }
            fun nothing() {}
            print fib(10);
            print nothing();
        ";
        assert_eq!(output_of(source), "55\n無\n");
    }

    #[test]
    fn calling_non_callables_fails() {
        let (_, result) = run("\"text\"();");
        assert!(matches!(result, Err(RuntimeError::Type { .. })));
        assert_eq!(
            result.map_err(|err| err.to_string()),
            Err("Can only call functions.".to_string())
        );
    }

    #[test]
    fn assignment_requires_existing_binding() {
        let (_, result) = run("y = 1;");
        assert!(matches!(result, Err(RuntimeError::UndefinedVariable { .. })));
        assert_eq!(output_of("var y; print y; y = 3; print y;"), "無\n3\n");
    }

    #[test]
    fn input_reads_lines_until_eof() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lexer::lex(
            "print input(\"> \"); print input(\"> \"); print input(\"> \");",
            &mut diagnostics,
        );
        let statements = parser::parse(&tokens, &mut diagnostics);

        let buffer = SharedBuffer::default();
        let mut interpreter = Interpreter::with_io(
            Box::new(buffer.clone()),
            Box::new(io::Cursor::new("first\r\nsecond\n")),
        );
        assert_eq!(interpreter.interpret(&statements), Ok(()));

        let output = String::from_utf8_lossy(&buffer.0.borrow()).into_owned();
        assert_eq!(output, "> first\n> second\n> 無\n");
    }

    #[test]
    fn runtime_error_report_names_the_lexeme() {
        let (_, result) = run("var a = 1;\nprint a - \"b\";");
        let err = result.unwrap_err();
        assert_eq!(
            err.report(),
            "[line 2] Runtime error at '-': Operands must be numbers."
        );
    }
}
