use std::io;
use std::path::PathBuf;

use quorum_merge::MergeError;

/// Errors produced by producers, the merge service, and configuration.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// The merge engine rejected a call (unknown or duplicate source).
    #[error("merge error: {0}")]
    Merge(#[from] MergeError),

    /// I/O error reading a source or configuration file.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// A source row could not be parsed.
    #[error("parse error in {path} at line {line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// The pipeline configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The producer needs an authenticated session and got an anonymous one.
    #[error("source {source_name} requires an authenticated session")]
    Unauthenticated { source_name: String },

    /// The merge service has shut down.
    #[error("merge service is closed")]
    ServiceClosed,

    /// A producer task panicked or was cancelled.
    #[error("producer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Convenience alias used throughout the feed crate.
pub type FeedResult<T> = std::result::Result<T, FeedError>;
