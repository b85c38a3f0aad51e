use std::{fmt, result::Result as StdResult};

use rhai::Position;
use thiserror::Error;

/// Which resource guard fired during an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// The memory ceiling was breached.
    Memory,
    /// The wall-clock timeout elapsed.
    Timeout,
    /// The statement budget was exhausted.
    Statements,
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Timeout => write!(f, "timeout"),
            Self::Statements => write!(f, "statement"),
        }
    }
}

/// Error type for script executions.
///
/// Every variant is fatal to the `execute` call that produced it: nothing is
/// retried and no partial rows are returned. The enum stays `Clone` so host
/// errors can travel through the interpreter as `Dynamic` payloads and be
/// recovered typed on the way out.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// The configuration text failed validation.
    #[error("Invalid configuration: {0}")]
    ConfigValidation(String),

    /// A resource guard aborted the execution.
    #[error("Script exceeded the {kind} limit")]
    ResourceExceeded {
        /// The guard that fired.
        kind: LimitKind,
    },

    /// The script failed to parse.
    #[error("Parse error: {message}")]
    Parse {
        /// Parser message, including the offending token where available.
        message: String,
    },

    /// The script raised an unhandled error at runtime.
    #[error("Script runtime error: {message}")]
    ScriptRuntime {
        /// The script-level error message.
        message: String,
    },

    /// `emit_row` was called with something other than an array or map.
    #[error("emit_row() requires an array or map argument, got {type_name}")]
    InvalidRowShape {
        /// Script-level type name of the rejected value.
        type_name: String,
    },

    /// The script finished without ever declaring a schema column.
    #[error("script produced no schema")]
    InvalidResultSet,

    /// A value could not be converted to its column's declared type.
    #[error("cannot convert `{value}` to {target}")]
    Coercion {
        /// Display form of the rejected value.
        value: String,
        /// Name of the target column type.
        target: &'static str,
    },

    /// An outbound HTTP request failed at the transport layer.
    #[error("Network error: {0}")]
    Network(String),

    /// A host function was called with a missing or invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Append a script position to the message of position-less variants.
    pub(crate) fn at(self, pos: Position) -> Self {
        let suffix = match pos.line() {
            Some(line) => format!(" (line {line})"),
            None => return self,
        };
        match self {
            Self::Parse { message } => Self::Parse {
                message: format!("{message}{suffix}"),
            },
            Self::ScriptRuntime { message } => Self::ScriptRuntime {
                message: format!("{message}{suffix}"),
            },
            other => other,
        }
    }
}

/// Result alias using the crate error type.
pub type Result<T> = StdResult<T, Error>;
