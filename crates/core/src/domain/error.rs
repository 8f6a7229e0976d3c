// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Malformed folder identifier: {0:?}")]
    MalformedFolderId(String),

    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Unknown job state: {0}")]
    UnknownState(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
