use thiserror::Error;

use super::value::Value;

/// Category of a fault raised by the evaluator itself (as opposed to a value
/// thrown by script code).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Error,
    TypeError,
    ReferenceError,
    SyntaxError,
    RangeError,
    AssertionError,
    TimeoutError,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::Error => "Error",
            ErrorKind::TypeError => "TypeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::SyntaxError => "SyntaxError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::AssertionError => "AssertionError",
            ErrorKind::TimeoutError => "TimeoutError",
        }
    }
}

/// Anything that stops a script body early.
#[derive(Debug, Clone, Error)]
pub enum Fault {
    #[error("{message}")]
    Raised { kind: ErrorKind, message: String },

    /// A value passed to `throw`.
    #[error("{}", .0.error_message())]
    Thrown(Value),
}

impl Fault {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Fault::Raised {
            kind,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TypeError, message)
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReferenceError, message)
    }

    pub fn syntax_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SyntaxError, message)
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RangeError, message)
    }

    /// The value a `catch (e)` clause binds for this fault.
    pub fn into_value(self) -> Value {
        match self {
            Fault::Thrown(value) => value,
            Fault::Raised { kind, message } => Value::error_object(kind.name(), &message),
        }
    }
}
