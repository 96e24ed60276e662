use std::fmt;

use crate::{ast::LitValue, callable::Callable};

#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    String(String),
    Callable(Box<dyn Callable>),
}

impl Value {
    /// `nil` and `false` are falsy, everything else (including `0`) is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    /// Text used by `print` and by the `&` operator.
    pub fn stringify(&self) -> String {
        self.to_string()
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Callable(_) => "function",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Nil, Self::Nil) => true,
            (Self::Bool(left), Self::Bool(right)) => left == right,
            (Self::Number(left), Self::Number(right)) => left == right,
            (Self::String(left), Self::String(right)) => left == right,
            (Self::Callable(left), Self::Callable(right)) => left.same_as(right.as_ref()),
            _ => false, // values of different types are never equal
        }
    }
}

impl From<&LitValue> for Value {
    fn from(lit: &LitValue) -> Self {
        match lit {
            LitValue::Nil => Value::Nil,
            LitValue::Bool(boolean) => Value::Bool(*boolean),
            LitValue::Number(number) => Value::Number(*number),
            LitValue::String(string) => Value::String(string.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "無"),
            Value::Bool(boolean) => write!(f, "{}", boolean),
            Value::Number(number) => write!(f, "{}", format_number(*number)),
            Value::String(string) => write!(f, "{}", string),
            Value::Callable(callable) => write!(f, "{}", callable),
        }
    }
}

/// Shortest decimal form of `number`, without a trailing `.0`.
pub fn format_number(number: f64) -> String {
    let text = number.to_string();
    match text.strip_suffix(".0") {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}
