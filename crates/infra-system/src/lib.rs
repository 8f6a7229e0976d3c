// Mirrorcheck Infrastructure - System Adapters
// Implements: DownloadRunner, TreeComparator, DownloadStorage

pub mod download_storage;
pub mod gdrive_runner;
pub mod tree_comparator;

pub use download_storage::LocalDownloadStorage;
pub use gdrive_runner::{GdriveConfig, GdriveRunner};
pub use tree_comparator::FsTreeComparator;
