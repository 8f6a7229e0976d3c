// Local download storage: temporary or cached directories under one root

use async_trait::async_trait;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use mirrorcheck_core::domain::FolderId;
use mirrorcheck_core::error::{AppError, Result};
use mirrorcheck_core::port::{DownloadDir, DownloadStorage};

const TEMP_SUBDIR: &str = "tmp";
const CACHE_SUBDIR: &str = "cache";
const TEMP_PREFIX: &str = "verify-";

/// Download directories rooted at one base path.
///
/// - temporary mode: `<root>/tmp/verify-XXXXXX`, fresh per download
/// - cache mode: `<root>/cache/<folder-id>`, reused when present
///
/// Removal only ever touches paths inside the root.
pub struct LocalDownloadStorage {
    root: PathBuf,
    cache: bool,
}

impl LocalDownloadStorage {
    /// Create storage under `root` (created on demand)
    pub fn new(root: impl Into<PathBuf>, cache: bool) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        let root = root.canonicalize()?;
        Ok(Self { root, cache })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn allocate_sync(root: &Path, cache: bool, folder: &FolderId) -> Result<DownloadDir> {
        if cache {
            let path = root.join(CACHE_SUBDIR).join(folder.as_str());
            if path.is_dir() {
                return Ok(DownloadDir { path, reused: true });
            }
            fs::create_dir_all(&path)?;
            return Ok(DownloadDir {
                path,
                reused: false,
            });
        }

        let parent = root.join(TEMP_SUBDIR);
        fs::create_dir_all(&parent)?;
        let dir = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempdir_in(&parent)?;
        // Lifetime is managed by the orchestrator, not by drop
        let path = dir.keep();
        Ok(DownloadDir {
            path,
            reused: false,
        })
    }

    fn remove_sync(root: &Path, path: &Path) -> Result<()> {
        let metadata = match fs::symlink_metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        if metadata.file_type().is_symlink() {
            return Err(AppError::Validation(format!(
                "refusing to remove symlink {}",
                path.display()
            )));
        }

        let real = path.canonicalize()?;
        if real.as_path() == root || !real.starts_with(root) {
            return Err(AppError::Validation(format!(
                "refusing to remove {} outside download root {}",
                real.display(),
                root.display()
            )));
        }

        // remove_dir_all never follows symlinks inside the tree
        if metadata.is_dir() {
            fs::remove_dir_all(&real)?;
        } else {
            fs::remove_file(&real)?;
        }
        debug!(path = %real.display(), "Removed download directory");
        Ok(())
    }
}

#[async_trait]
impl DownloadStorage for LocalDownloadStorage {
    async fn allocate(&self, folder: &FolderId) -> Result<DownloadDir> {
        let (root, cache, id) = (self.root.clone(), self.cache, folder.clone());
        let dir = run_blocking("allocate", move || Self::allocate_sync(&root, cache, &id)).await?;
        info!(folder = %folder, path = %dir.path.display(), reused = dir.reused, "Allocated download directory");
        Ok(dir)
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        let (root, path) = (self.root.clone(), path.to_path_buf());
        run_blocking("remove", move || Self::remove_sync(&root, &path)).await
    }
}

/// Filesystem work on whole download trees stays off the async workers
async fn run_blocking<T, F>(op: &str, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError::Internal(format!("download storage {} task failed: {}", op, e)))?
}
