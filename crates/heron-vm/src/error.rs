//! VM error types

use crate::value::Value;
use thiserror::Error;

/// Result type alias for VM operations
pub type VmResult<T> = Result<T, VmError>;

/// VM execution errors
#[derive(Debug, Error)]
pub enum VmError {
    /// Type error (e.g., calling a non-function, writing a read-only property)
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Reference error (undefined variable)
    #[error("ReferenceError: {0}")]
    ReferenceError(String),

    /// Range error
    #[error("RangeError: {0}")]
    RangeError(String),

    /// Syntax error raised while parsing script text
    #[error("SyntaxError: {message} (line {line}, column {column})")]
    SyntaxError {
        message: String,
        line: u32,
        column: u32,
    },

    /// Thrown script exception
    #[error("Uncaught {0}")]
    Exception(Box<ThrownValue>),

    /// Stack overflow
    #[error("RangeError: Maximum call stack size exceeded")]
    StackOverflow,

    /// The VM has been disposed
    #[error("VM has been disposed")]
    Disposed,

    /// Internal error
    #[error("InternalError: {0}")]
    InternalError(String),
}

/// A thrown script value
#[derive(Debug)]
pub struct ThrownValue {
    /// The thrown value
    pub value: Value,
    /// String representation of the thrown value
    pub message: String,
}

impl std::fmt::Display for ThrownValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl VmError {
    /// Create a type error
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    /// Create a reference error
    pub fn reference_error(msg: impl Into<String>) -> Self {
        Self::ReferenceError(msg.into())
    }

    /// Create a range error
    pub fn range_error(msg: impl Into<String>) -> Self {
        Self::RangeError(msg.into())
    }

    /// Create a syntax error at a source position
    pub fn syntax_error(msg: impl Into<String>, line: u32, column: u32) -> Self {
        Self::SyntaxError {
            message: msg.into(),
            line,
            column,
        }
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Create an exception from a thrown value
    pub fn exception(value: Value, message: impl Into<String>) -> Self {
        Self::Exception(Box::new(ThrownValue {
            value,
            message: message.into(),
        }))
    }

    /// The thrown value, if this error carries one
    pub fn thrown_value(&self) -> Option<&Value> {
        match self {
            Self::Exception(thrown) => Some(&thrown.value),
            _ => None,
        }
    }
}
