// Download Storage Port
// Where downloaded trees live on local disk, and how they are removed

use crate::domain::FolderId;
use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// A directory handed out for one folder download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadDir {
    pub path: PathBuf,
    /// True when a cached copy already exists and the download can be skipped
    pub reused: bool,
}

#[async_trait]
pub trait DownloadStorage: Send + Sync {
    /// Allocate the download directory for `folder`.
    ///
    /// Without caching this is a fresh temporary directory. With caching it is
    /// a stable directory keyed by folder id, reported as `reused` if it
    /// already exists.
    async fn allocate(&self, folder: &FolderId) -> Result<DownloadDir>;

    /// Securely remove a directory previously handed out by `allocate`.
    /// Removing a path that no longer exists succeeds.
    async fn remove(&self, path: &Path) -> Result<()>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Allocates `<root>/<folder-id>-<n>` directories and records removals
    pub struct DirStorage {
        root: PathBuf,
        counter: Mutex<u32>,
        removed: Mutex<Vec<PathBuf>>,
    }

    impl DirStorage {
        pub fn new(root: impl Into<PathBuf>) -> Self {
            Self {
                root: root.into(),
                counter: Mutex::new(0),
                removed: Mutex::new(Vec::new()),
            }
        }

        pub fn removed(&self) -> Vec<PathBuf> {
            self.removed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DownloadStorage for DirStorage {
        async fn allocate(&self, folder: &FolderId) -> Result<DownloadDir> {
            let n = {
                let mut counter = self.counter.lock().unwrap();
                *counter += 1;
                *counter
            };
            let path = self.root.join(format!("{}-{}", folder, n));
            std::fs::create_dir_all(&path)?;
            Ok(DownloadDir {
                path,
                reused: false,
            })
        }

        async fn remove(&self, path: &Path) -> Result<()> {
            self.removed.lock().unwrap().push(path.to_path_buf());
            if path.exists() {
                std::fs::remove_dir_all(path)?;
            }
            Ok(())
        }
    }
}
