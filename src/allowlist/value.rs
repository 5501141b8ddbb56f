//! Values and faults that cross the privilege boundary.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// A value that survives serialization across the privilege boundary.
///
/// Arguments travel as raw strings and are coerced into a `Value` by the
/// declared [`ArgKind`] before the privileged method sees them; results
/// travel back as a `Value` directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// No value (a method that returns nothing).
    Unit,
    /// Boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// UTF-8 string.
    Str(String),
    /// Filesystem path.
    Path(PathBuf),
}

impl Value {
    /// Borrow this value as a string, or fail with an `invalid_argument`
    /// fault naming the actual variant.
    pub fn expect_str(&self) -> Result<&str, CallFault> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(CallFault::invalid_argument(format!(
                "expected a string, got {other:?}"
            ))),
        }
    }

    /// Borrow this value as an integer, or fail with an `invalid_argument`
    /// fault.
    pub fn expect_int(&self) -> Result<i64, CallFault> {
        match self {
            Value::Int(n) => Ok(*n),
            other => Err(CallFault::invalid_argument(format!(
                "expected an integer, got {other:?}"
            ))),
        }
    }

    /// Borrow this value as a boolean, or fail with an `invalid_argument`
    /// fault.
    pub fn expect_bool(&self) -> Result<bool, CallFault> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(CallFault::invalid_argument(format!(
                "expected a boolean, got {other:?}"
            ))),
        }
    }

    /// Borrow this value as a path, or fail with an `invalid_argument`
    /// fault.
    pub fn expect_path(&self) -> Result<&PathBuf, CallFault> {
        match self {
            Value::Path(p) => Ok(p),
            other => Err(CallFault::invalid_argument(format!(
                "expected a path, got {other:?}"
            ))),
        }
    }
}

/// Declared coercion for one positional argument.
///
/// The wire carries every argument as a raw string; the coercion turns it
/// into the typed [`Value`] the privileged method expects. The ordered list
/// of coercions also fixes the method's arity on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgKind {
    /// Pass the raw string through unchanged.
    Str,
    /// Parse as a signed 64-bit integer.
    Int,
    /// Parse as `true` or `false`.
    Bool,
    /// Interpret as a filesystem path.
    Path,
}

impl ArgKind {
    /// Coerce a raw wire string into a typed [`Value`].
    pub fn coerce(&self, raw: &str) -> Result<Value, CallFault> {
        match self {
            ArgKind::Str => Ok(Value::Str(raw.to_string())),
            ArgKind::Int => raw.parse::<i64>().map(Value::Int).map_err(|e| {
                CallFault::invalid_argument(format!("'{raw}' is not an integer: {e}"))
            }),
            ArgKind::Bool => match raw {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                other => Err(CallFault::invalid_argument(format!(
                    "'{other}' is not a boolean"
                ))),
            },
            ArgKind::Path => Ok(Value::Path(PathBuf::from(raw))),
        }
    }
}

/// An error raised by a privileged method, in a form that round-trips
/// through serialization.
///
/// The `kind` is a stable machine-readable identity (so a caller expecting a
/// particular failure can match on it); the `message` is the human-readable
/// detail. The unprivileged proxy re-raises the fault locally, so callers
/// see the same error they would get invoking the method directly.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct CallFault {
    /// Stable error identity (e.g. `permission_denied`, `not_found`).
    pub kind: String,
    /// Human-readable detail.
    pub message: String,
}

impl CallFault {
    /// Create a fault with an explicit kind.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// A malformed or mistyped argument.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new("invalid_argument", message)
    }

    /// The privileged operation was denied by the OS.
    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new("permission_denied", message)
    }
}

impl From<std::io::Error> for CallFault {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        let kind = match err.kind() {
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::NotFound => "not_found",
            ErrorKind::AlreadyExists => "already_exists",
            _ => "io_error",
        };
        Self::new(kind, err.to_string())
    }
}
