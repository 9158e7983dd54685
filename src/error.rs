//! Error taxonomy for the artifact cache and pipeline.
//!
//! Only [`CacheError::StoreUnavailable`] is fatal. Everything else is either
//! surfaced to the caller (`InvalidParameter`), degraded to a cache miss by the
//! store (`StoreIo`, `ArtifactTooLarge`), counted by the pipeline
//! (`Computation`), or a normal lookup outcome (`NoSimilarMatch`).

use std::path::PathBuf;
use thiserror::Error;

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors raised by the cache, the resolver and the pipeline.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Malformed option value or a required option with no default
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    /// Artifact exceeds the configured maximum size; the write is skipped
    #[error("Artifact too large: {size} bytes exceeds limit of {limit} bytes")]
    ArtifactTooLarge { size: u64, limit: u64 },

    /// Read or write failure on a single entry
    #[error("Store I/O error at {}: {source}", path.display())]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Store directory cannot be created, read or written
    #[error("Artifact store unavailable at {}: {source}", path.display())]
    StoreUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The engine failed for one parameter set
    #[error("Computation failed: {0}")]
    Computation(#[from] ComputationError),

    /// No stored entry scored above the acceptance threshold
    #[error("No similar artifact above threshold (best score: {best_score:?})")]
    NoSimilarMatch { best_score: Option<f64> },

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CacheError {
    pub(crate) fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        CacheError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::StoreIo {
            path: path.into(),
            source,
        }
    }

    /// Whether the error must stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CacheError::StoreUnavailable { .. })
    }
}

/// Errors raised by the computation engine.
#[derive(Error, Debug)]
pub enum ComputationError {
    /// Parameters could not be turned into a computation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Element count exceeds the engine limit
    #[error("Too many elements: {elements} exceeds limit of {limit}")]
    TooLarge { elements: u64, limit: u64 },

    /// Result could not be serialized into an artifact
    #[error("Failed to encode artifact: {0}")]
    Encode(String),

    /// Background task panicked or was aborted
    #[error("Computation task failed: {0}")]
    Task(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_store_unavailable_is_fatal() {
        let fatal = CacheError::StoreUnavailable {
            path: PathBuf::from("/nope"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(fatal.is_fatal());

        let io = CacheError::io("/tmp/x", std::io::Error::other("boom"));
        assert!(!io.is_fatal());
        assert!(!CacheError::NoSimilarMatch { best_score: None }.is_fatal());
    }

    #[test]
    fn test_invalid_parameter_message() {
        let err = CacheError::invalid("rings", "required option is missing");
        assert_eq!(
            err.to_string(),
            "Invalid parameter 'rings': required option is missing"
        );
    }
}
