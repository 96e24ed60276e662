use thiserror::Error;

use crate::token::Token;

/// A fault raised while executing a program. The first one aborts the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("{message}")]
    Type { token: Token, message: String },

    #[error("Expected {expected} arguments but got {found}.")]
    Arity {
        token: Token,
        expected: usize,
        found: usize,
    },

    #[error("Variable '{}' is undefined.", .token.lexeme)]
    UndefinedVariable { token: Token },

    #[error("Variable '{}' is already defined in this scope.", .token.lexeme)]
    Redefinition { token: Token },

    #[error("{message}")]
    Range { token: Token, message: String },

    #[error("{message}")]
    Io { token: Token, message: String },
}

impl RuntimeError {
    pub fn type_error(token: &Token, message: impl Into<String>) -> Self {
        RuntimeError::Type {
            token: token.clone(),
            message: message.into(),
        }
    }

    pub fn range_error(token: &Token, message: impl Into<String>) -> Self {
        RuntimeError::Range {
            token: token.clone(),
            message: message.into(),
        }
    }

    pub fn io_error(token: &Token, message: impl Into<String>) -> Self {
        RuntimeError::Io {
            token: token.clone(),
            message: message.into(),
        }
    }

    /// The token at which the fault was detected.
    pub fn token(&self) -> &Token {
        match self {
            RuntimeError::Type { token, .. }
            | RuntimeError::Arity { token, .. }
            | RuntimeError::UndefinedVariable { token }
            | RuntimeError::Redefinition { token }
            | RuntimeError::Range { token, .. }
            | RuntimeError::Io { token, .. } => token,
        }
    }

    /// Full user-facing form, with line and lexeme.
    pub fn report(&self) -> String {
        let token = self.token();
        format!(
            "[line {}] Runtime error at '{}': {}",
            token.line, token.lexeme, self
        )
    }
}
