//! Error types shared by every stage of the interpreter.

use thiserror::Error;

/// Any error that can occur while lexing, parsing, or running a Gopa program.
#[derive(Error, Debug, Clone)]
pub enum GopaError {
    #[error("Lex error at {line}:{col}: {message}")]
    Lex {
        message: String,
        line: usize,
        col: usize,
    },

    #[error("Syntax error: {message}")]
    Parse { message: String },

    #[error("'{name}' is not defined")]
    Undefined { name: String },

    #[error("Type error: {message}")]
    Type { message: String },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Index error: {message}")]
    Index { message: String },

    #[error("{message}")]
    PermissionDenied { message: String },

    #[error("Network request failed: {message}")]
    Network { message: String },

    #[error("{message}")]
    File { message: String },

    #[error("Python call failed: {message}")]
    Python { message: String },
}

pub type GopaResult<T> = Result<T, GopaError>;

impl GopaError {
    pub fn parse(message: impl Into<String>) -> Self {
        GopaError::Parse {
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        GopaError::Type {
            message: message.into(),
        }
    }

    pub fn index(message: impl Into<String>) -> Self {
        GopaError::Index {
            message: message.into(),
        }
    }
}
