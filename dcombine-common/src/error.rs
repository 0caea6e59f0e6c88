//! Common error types for Data Combine

use thiserror::Error;

/// Common result type for Data Combine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the harvester, snapshot store and reconciler
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encode/decode error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unparseable timestamp or phone string
    #[error("Format error: {0}")]
    Format(String),

    /// Two records share a remote identity but differ materially
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Value exceeds the storage width of its column
    #[error("{entity}.{field}={value:?} is too long ({len} > {max})", len = .value.chars().count())]
    FieldOverflow {
        entity: &'static str,
        field: &'static str,
        value: String,
        max: usize,
    },

    /// Remote API answered with a status at or above 400
    #[error("Fetch failed with {status} {reason}: {body}")]
    Fetch {
        status: u16,
        reason: String,
        body: String,
    },

    /// Transport-level HTTP failure (connect, timeout, decode)
    #[error("HTTP error: {0}")]
    Http(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input record or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure taxonomy used by callers to decide how far an error propagates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// HTTP >= 400; ends a harvest, keeps the partial result
    FetchFailure,
    /// Bad timestamp or phone string
    Format,
    /// Same remote identity, different content
    Conflict,
    /// Value wider than its column
    FieldOverflow,
    /// Storage failure without structured field information
    Storage,
    /// Anything else
    Unexpected,
}

impl Error {
    /// Classify this error into the failure taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Fetch { .. } => ErrorKind::FetchFailure,
            Error::Format(_) => ErrorKind::Format,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::FieldOverflow { .. } => ErrorKind::FieldOverflow,
            Error::Database(_) => ErrorKind::Storage,
            Error::Io(_)
            | Error::Json(_)
            | Error::Config(_)
            | Error::Http(_)
            | Error::NotFound(_)
            | Error::InvalidInput(_)
            | Error::Internal(_) => ErrorKind::Unexpected,
        }
    }

    /// Create a field overflow error for `value` in `entity.field`
    pub fn overflow(entity: &'static str, field: &'static str, value: &str, max: usize) -> Self {
        Error::FieldOverflow {
            entity,
            field,
            value: value.to_string(),
            max,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(Error::Format("x".into()).kind(), ErrorKind::Format);
        assert_eq!(Error::Conflict("x".into()).kind(), ErrorKind::Conflict);
        assert_eq!(
            Error::overflow("Address", "city", "x", 1).kind(),
            ErrorKind::FieldOverflow
        );
        assert_eq!(
            Error::Fetch { status: 404, reason: "Not Found".into(), body: String::new() }.kind(),
            ErrorKind::FetchFailure
        );
        assert_eq!(Error::Database(sqlx::Error::RowNotFound).kind(), ErrorKind::Storage);
        assert_eq!(Error::Internal("x".into()).kind(), ErrorKind::Unexpected);
    }

    #[test]
    fn test_overflow_message_reports_lengths() {
        let err = Error::overflow("Address", "state_code", "FLA", 2);
        assert_eq!(err.to_string(), "Address.state_code=\"FLA\" is too long (3 > 2)");
    }
}
