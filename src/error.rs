//! Error types for Recast.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of a failure, persisted on a failed task.
///
/// The pipeline controller records the kind verbatim and never
/// reinterprets it; only `Transient` failures are safe to retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown task id.
    NotFound,
    /// Malformed source, unknown voice id, unsupported engine selector.
    InvalidInput,
    /// Network failure, rate limit, or timeout from an external service.
    Transient,
    /// Auth failure, quota exhaustion, or corrupt intermediate artifact.
    Unrecoverable,
    /// Caller aborted an in-flight stage.
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::NotFound => write!(f, "not_found"),
            ErrorKind::InvalidInput => write!(f, "invalid_input"),
            ErrorKind::Transient => write!(f, "transient"),
            ErrorKind::Unrecoverable => write!(f, "unrecoverable"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "not_found" => Ok(ErrorKind::NotFound),
            "invalid_input" => Ok(ErrorKind::InvalidInput),
            "transient" => Ok(ErrorKind::Transient),
            "unrecoverable" => Ok(ErrorKind::Unrecoverable),
            "cancelled" => Ok(ErrorKind::Cancelled),
            _ => Err(format!("Unknown error kind: {}", s)),
        }
    }
}

/// Library-level error type for Recast operations.
#[derive(Error, Debug)]
pub enum RecastError {
    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Transient service error: {0}")]
    Transient(String),

    #[error("Unrecoverable error: {0}")]
    Unrecoverable(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RecastError {
    /// Classify this error into the persisted taxonomy.
    ///
    /// HTTP timeouts, connection failures, 429s and 5xx responses are
    /// transient; everything not otherwise classified (store I/O, parse
    /// failures, missing tools) is unrecoverable without intervention.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RecastError::NotFound(_) => ErrorKind::NotFound,
            RecastError::InvalidInput(_) => ErrorKind::InvalidInput,
            RecastError::Transient(_) => ErrorKind::Transient,
            RecastError::Cancelled(_) => ErrorKind::Cancelled,
            RecastError::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    ErrorKind::Transient
                } else if e
                    .status()
                    .is_some_and(|s| s.as_u16() == 429 || s.is_server_error())
                {
                    ErrorKind::Transient
                } else {
                    ErrorKind::Unrecoverable
                }
            }
            _ => ErrorKind::Unrecoverable,
        }
    }

    /// Whether retrying the failed operation could succeed.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

/// Result type alias for Recast operations.
pub type Result<T> = std::result::Result<T, RecastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classification() {
        assert_eq!(
            RecastError::NotFound("x".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            RecastError::InvalidInput("bad".into()).kind(),
            ErrorKind::InvalidInput
        );
        assert_eq!(
            RecastError::Transient("timeout".into()).kind(),
            ErrorKind::Transient
        );
        assert_eq!(
            RecastError::Config("missing key".into()).kind(),
            ErrorKind::Unrecoverable
        );
        assert!(RecastError::Transient("x".into()).is_retryable());
        assert!(!RecastError::Unrecoverable("x".into()).is_retryable());
    }

    #[test]
    fn test_kind_round_trip() {
        for kind in [
            ErrorKind::NotFound,
            ErrorKind::InvalidInput,
            ErrorKind::Transient,
            ErrorKind::Unrecoverable,
            ErrorKind::Cancelled,
        ] {
            let parsed: ErrorKind = kind.to_string().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }
}
