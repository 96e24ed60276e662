use std::{fmt, ops::Range};

use tracing::warn;

pub type Span = Range<usize>;

/// A lexical or syntax error, located by source line.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub message: String,
    pub line: usize,
    /// Either empty, `" at end"` or `" at 'lexeme'"`.
    pub location: String,
    pub span: Span,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[line {}] Error{}: {}",
            self.line, self.location, self.message
        )
    }
}

impl std::error::Error for Error {}

/// Collects the errors reported while scanning and parsing one source unit.
///
/// The driver consults [`Diagnostics::had_error`] before handing statements to
/// the interpreter.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<Error>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, error: Error) {
        warn!(line = error.line, "{}", error.message);
        self.errors.push(error);
    }

    pub fn had_error(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<Error> {
        self.errors
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }
}
