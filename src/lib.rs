//! Scanner, parser and tree-walking evaluator for the Suiron scripting
//! language.
//!
//! ```text
//! source -> lexer::lex -> parser::parse -> Interpreter::interpret
//! ```

pub mod ast;
pub mod builtins;
pub mod callable;
pub mod common;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod parser;
pub mod printer;
pub mod token;
pub mod value;

use std::io::{self, Write};

use thiserror::Error;

pub use interpreter::Interpreter;
pub use value::Value;

/// Why a source unit did not run to completion.
#[derive(Debug, Error)]
pub enum RunError {
    /// Lexical or syntax errors; nothing was executed.
    #[error("{} syntax error(s)", .0.len())]
    Syntax(Vec<common::Error>),

    #[error(transparent)]
    Runtime(#[from] error::RuntimeError),

    /// The debug dumps or the final flush could not be written.
    #[error("could not write output: {0}")]
    Io(#[from] io::Error),
}

/// Debug dumps written to the interpreter's output before running.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub dump_tokens: bool,
    pub dump_ast: bool,
}

/// Scans, parses and executes `source`. Any lexical or syntax error prevents
/// execution of the whole unit.
pub fn run(source: &str, interpreter: &mut Interpreter) -> Result<(), RunError> {
    run_with(source, interpreter, RunOptions::default())
}

pub fn run_with(
    source: &str,
    interpreter: &mut Interpreter,
    options: RunOptions,
) -> Result<(), RunError> {
    let mut diagnostics = common::Diagnostics::new();
    let tokens = lexer::lex(source, &mut diagnostics);

    if options.dump_tokens {
        for token in &tokens {
            writeln!(interpreter.output(), "{}", token)?;
        }
    }

    let statements = parser::parse(&tokens, &mut diagnostics);
    if diagnostics.had_error() {
        return Err(RunError::Syntax(diagnostics.into_errors()));
    }

    if options.dump_ast {
        for stmt in &statements {
            writeln!(interpreter.output(), "{}", printer::print_stmt(stmt))?;
        }
    }

    interpreter.interpret(&statements)?;
    interpreter.output().flush()?;
    Ok(())
}

/// Evaluates a single expression and returns its value.
pub fn eval_expression(source: &str, interpreter: &mut Interpreter) -> Result<Value, RunError> {
    let mut diagnostics = common::Diagnostics::new();
    let tokens = lexer::lex(source, &mut diagnostics);
    let expr = parser::parse_expression(&tokens, &mut diagnostics);

    match expr {
        Some(expr) if !diagnostics.had_error() => Ok(interpreter.evaluate(&expr)?),
        _ => Err(RunError::Syntax(diagnostics.into_errors())),
    }
}
