// Tree Comparator Port

use crate::domain::TreeDiff;
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;

/// Compares a destination tree against its source.
///
/// The destination is authoritative: every entry under `dst` must exist under
/// `src` with the same type, and files must be byte-identical. Entries only
/// present in `src` are never reported.
#[async_trait]
pub trait TreeComparator: Send + Sync {
    async fn compare(&self, src: &Path, dst: &Path) -> Result<TreeDiff>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Returns a preset diff (or error) and records the paths it was given
    pub struct FixedComparator {
        result: std::result::Result<TreeDiff, String>,
        calls: Mutex<Vec<(PathBuf, PathBuf)>>,
    }

    impl FixedComparator {
        pub fn matching() -> Self {
            Self::returning(TreeDiff::new())
        }

        pub fn returning(diff: TreeDiff) -> Self {
            Self {
                result: Ok(diff),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn failing(message: impl Into<String>) -> Self {
            Self {
                result: Err(message.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<(PathBuf, PathBuf)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TreeComparator for FixedComparator {
        async fn compare(&self, src: &Path, dst: &Path) -> Result<TreeDiff> {
            self.calls
                .lock()
                .unwrap()
                .push((src.to_path_buf(), dst.to_path_buf()));
            self.result.clone().map_err(AppError::Comparison)
        }
    }
}
