//! Error types shared by the build pipeline and the lookup engine.

use thiserror::Error;

/// Errors raised by the classifier build and lookup paths.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or unexpected XML in a feed document. Aborts the build.
    #[error("feed format error at byte {position}: {message}")]
    FeedFormat { position: u64, message: String },

    /// A parent reference or classifier override disagrees with the feed.
    #[error("resolution inconsistency: {0}")]
    ResolutionInconsistency(String),

    /// Transient storage failure; callers may retry.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// Requested address object or postal code does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Ancestor walk exceeded the configured depth.
    #[error("cycle detected: walk from {start} exceeded depth {max_depth}")]
    CycleDetected { start: u64, max_depth: usize },

    /// A write batch failed; the whole load is abandoned.
    #[error("batch {batch} of table {table} failed: {source}")]
    BatchFailed {
        table: String,
        batch: usize,
        #[source]
        source: Box<Error>,
    },

    /// Another build already holds the lock for this version.
    #[error("build of version {0} is already in progress")]
    BuildLocked(u32),

    /// No dataset version has been published yet.
    #[error("no published dataset version")]
    NoPublishedVersion,

    /// Row could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Caller-supplied deadline passed before the query finished.
    #[error("query cancelled after deadline")]
    Cancelled,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Only transient storage failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::StoreUnavailable(_))
    }
}

impl From<sled::Error> for Error {
    fn from(err: sled::Error) -> Self {
        Error::StoreUnavailable(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::FeedFormat {
            position: 0,
            message: err.to_string(),
        }
    }
}

/// Result type for classifier operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_store_errors_are_retryable() {
        assert!(Error::StoreUnavailable("connection reset".into()).is_retryable());
        assert!(!Error::NotFound("address object 7".into()).is_retryable());
        assert!(!Error::ResolutionInconsistency("code 105".into()).is_retryable());
        assert!(!Error::Cancelled.is_retryable());
    }

    #[test]
    fn test_batch_failure_names_batch_index() {
        let err = Error::BatchFailed {
            table: "address_object".into(),
            batch: 42,
            source: Box::new(Error::StoreUnavailable("disk full".into())),
        };
        assert_eq!(
            err.to_string(),
            "batch 42 of table address_object failed: store unavailable: disk full"
        );
    }

    #[test]
    fn test_cycle_display() {
        let err = Error::CycleDetected {
            start: 17,
            max_depth: 64,
        };
        assert_eq!(
            err.to_string(),
            "cycle detected: walk from 17 exceeded depth 64"
        );
    }
}
