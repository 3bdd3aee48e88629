use thiserror::Error;

/// Errors produced by type operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("source name must not be empty")]
    EmptySourceName,

    #[error("source name {0:?} has leading or trailing whitespace")]
    UntrimmedSourceName(String),

    #[error("unknown source kind: {0}")]
    UnknownKind(String),
}
