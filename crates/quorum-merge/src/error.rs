use quorum_types::TypeError;

/// Errors produced by merge engine operations.
///
/// Every variant is a configuration error: the engine never fails because of
/// the data it is given, only because of the sources it is asked about.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("source {source_name:?} is not registered")]
    UnknownSource { source_name: String },

    #[error("source {source_name:?} is registered more than once")]
    DuplicateSource { source_name: String },

    #[error("invalid source name: {0}")]
    InvalidSource(#[from] TypeError),
}

/// Result alias for merge operations.
pub type MergeResult<T> = Result<T, MergeError>;
