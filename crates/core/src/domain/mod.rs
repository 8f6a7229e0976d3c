// Domain Layer - Pure logic and entities (no I/O)

pub mod diff;
pub mod error;
pub mod folder_id;
pub mod job;

// Re-exports
pub use diff::TreeDiff;
pub use error::DomainError;
pub use folder_id::FolderId;
pub use job::{ExecutionMode, JobField, JobId, JobRecord, VerifyState};
