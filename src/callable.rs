use std::{fmt, rc::Rc};

use dyn_clone::DynClone;

use crate::{
    ast,
    environment::Environment,
    error::RuntimeError,
    interpreter::{Flow, Interpreter},
    token::Token,
    value::Value,
};

/// Anything that can appear on the left of a call: user functions and native
/// built-ins alike.
pub trait Callable: DynClone + fmt::Debug + fmt::Display {
    fn name(&self) -> &str;

    fn arity(&self) -> usize;

    /// `args.len()` has already been checked against [`Callable::arity`].
    /// `paren` is the call site's closing parenthesis, used to locate errors.
    fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        paren: &Token,
    ) -> Result<Value, RuntimeError>;

    /// Identity comparison used by `==`.
    fn same_as(&self, other: &dyn Callable) -> bool;

    fn as_user_function(&self) -> Option<&UserFunction> {
        None
    }
}

dyn_clone::clone_trait_object!(Callable);

/// A function declared in the program.
#[derive(Debug, Clone)]
pub struct UserFunction {
    declaration: Rc<ast::FunDecl>,
}

impl UserFunction {
    pub fn new(declaration: Rc<ast::FunDecl>) -> Self {
        UserFunction { declaration }
    }
}

impl Callable for UserFunction {
    fn name(&self) -> &str {
        &self.declaration.ident.lexeme
    }

    fn arity(&self) -> usize {
        self.declaration.parameters.len()
    }

    fn call(
        &self,
        interpreter: &mut Interpreter,
        args: Vec<Value>,
        _paren: &Token,
    ) -> Result<Value, RuntimeError> {
        // calls see the globals, not the scope the function was declared in
        let mut environment = Environment::with_enclosing(interpreter.globals());
        for (param, arg) in self.declaration.parameters.iter().zip(args) {
            environment.define(param, arg)?;
        }

        match interpreter.execute_block(&self.declaration.body, environment)? {
            Flow::Return(value) => Ok(value),
            Flow::Normal => Ok(Value::Nil),
        }
    }

    fn same_as(&self, other: &dyn Callable) -> bool {
        other
            .as_user_function()
            .is_some_and(|other| Rc::ptr_eq(&self.declaration, &other.declaration))
    }

    fn as_user_function(&self) -> Option<&UserFunction> {
        Some(self)
    }
}

impl fmt::Display for UserFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}
