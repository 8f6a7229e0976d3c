// Port Layer - Interfaces for external dependencies

pub mod download_runner;
pub mod download_storage;
pub mod id_provider; // For deterministic testing
pub mod job_dispatcher;
pub mod kv_store;
pub mod time_provider;
pub mod tree_comparator;

// Re-exports
pub use download_runner::{DownloadError, DownloadProgress, DownloadRunner, ProgressSender, RunOutcome};
pub use download_storage::{DownloadDir, DownloadStorage};
pub use id_provider::IdProvider;
pub use job_dispatcher::{JobDispatcher, JobFuture};
pub use kv_store::KeyValueStore;
pub use time_provider::TimeProvider;
pub use tree_comparator::TreeComparator;
