//! Error types for KBM

use crate::record::MalformedRecord;
use std::fmt;
use thiserror::Error;

/// Result type alias for KBM operations
pub type Result<T> = std::result::Result<T, KbmError>;

/// Main error type for KBM
///
/// Every variant here except [`KbmError::Malformed`] is fatal for the run that
/// raised it. Failures that only affect a single record are carried as
/// [`RemoteError`] inside a per-record result and bucketed by [`ErrorKind`]
/// instead.
#[derive(Error, Debug)]
pub enum KbmError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at record {index}: {source}")]
    Parse {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    /// Valid JSON that isn't a usable record; the stream carries on after it
    #[error(
        "Record {} could not be read ({}): {}",
        .0.index,
        .0.record,
        .0.message
    )]
    Malformed(MalformedRecord),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown target '{name}'. Supported targets: {}", supported.join(", "))]
    UnknownTarget { name: String, supported: Vec<String> },

    #[error("Record {index} is missing required field '{field}'")]
    MissingField { index: usize, field: &'static str },

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl KbmError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the error only concerns one record and the stream can go on
    pub fn is_record_scoped(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }

    /// Create an unknown target error
    pub fn unknown_target(name: impl Into<String>, supported: Vec<String>) -> Self {
        Self::UnknownTarget {
            name: name.into(),
            supported,
        }
    }
}

/// Classification of a failed remote call
///
/// Used as the bucket key in end-of-run failure summaries, so the ordering is
/// the order in which buckets are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorKind {
    /// The slug already exists (expected when re-running a create-only load)
    Conflict,
    /// The resource does not exist
    NotFound,
    /// Credentials rejected
    Unauthorized,
    /// The service asked us to slow down
    RateLimited,
    /// 5xx or any other unexpected status
    Server,
    /// Transport failure (DNS, connect, timeout)
    Network,
    /// Response body could not be decoded
    Decode,
    /// The source record lacks a field needed to address the resource
    MissingField,
}

impl ErrorKind {
    /// Classify an HTTP status code returned by the service
    pub fn from_status(status: u16) -> Self {
        match status {
            409 => ErrorKind::Conflict,
            404 => ErrorKind::NotFound,
            401 | 403 => ErrorKind::Unauthorized,
            429 => ErrorKind::RateLimited,
            _ => ErrorKind::Server,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Server => "server",
            ErrorKind::Network => "network",
            ErrorKind::Decode => "decode",
            ErrorKind::MissingField => "missing_field",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed call against the remote knowledge base
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: ErrorKind,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == ErrorKind::Conflict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert_eq!(ErrorKind::from_status(409), ErrorKind::Conflict);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Unauthorized);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Unauthorized);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::RateLimited);
        assert_eq!(ErrorKind::from_status(502), ErrorKind::Server);
        assert_eq!(ErrorKind::from_status(418), ErrorKind::Server);
    }

    #[test]
    fn test_unknown_target_lists_supported() {
        let err = KbmError::unknown_target("klingon", vec!["burmese".into(), "lao".into()]);
        let msg = err.to_string();
        assert!(msg.contains("klingon"));
        assert!(msg.contains("burmese, lao"));
    }

    #[test]
    fn test_remote_error_display() {
        let err = RemoteError::new(ErrorKind::Conflict, "slug abc exists");
        assert_eq!(err.to_string(), "conflict: slug abc exists");
        assert!(err.is_conflict());
        assert!(!err.is_not_found());
    }
}
