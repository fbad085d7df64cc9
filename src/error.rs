use thiserror::Error;

use crate::protocol::error_codes::ErrorCode;

/// A rejected operation, carrying the wire error code the session handler
/// must report alongside a human-readable message.
///
/// This is the single funnel every fallible registry/game/session operation
/// goes through; `server::session` is the only place that turns one of these
/// into an `ERROR <code> <message>` line on the wire.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct ServerError {
    pub code: ErrorCode,
    pub message: String,
}

impl ServerError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Shorthand for constructing a `ServerError` inline at a call site.
macro_rules! server_err {
    ($code:expr, $($arg:tt)*) => {
        $crate::error::ServerError::new($code, format!($($arg)*))
    };
}

pub(crate) use server_err;

pub type ServerResult<T> = Result<T, ServerError>;
