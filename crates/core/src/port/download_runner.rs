// Download Runner Port
// Abstraction over the external CLI tool that fetches a remote folder tree

use crate::domain::FolderId;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::sync::mpsc;

/// One "downloading <file>" event observed on the tool's stdout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    /// File name as reported by the tool, relative to the folder root
    pub file_name: String,
}

/// Channel on which a runner publishes progress, in output order.
/// The runner drops its sender when the subprocess finishes.
pub type ProgressSender = mpsc::UnboundedSender<DownloadProgress>;

/// Result of one invocation of the external tool.
///
/// Failures are values, not errors: callers decide whether a failure matters.
/// `SpawnFailed` means the tool could not be started at all (missing binary,
/// permissions), which a readiness probe reports differently from a tool that
/// ran and exited non-zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Success,
    Failed { exit_code: Option<i32> },
    SpawnFailed(String),
    StreamError(String),
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success)
    }

    /// Convert into a `Result`, for callers that treat failure as an error
    pub fn into_result(self) -> Result<(), DownloadError> {
        match self {
            RunOutcome::Success => Ok(()),
            RunOutcome::Failed { exit_code } => Err(DownloadError::NonZeroExit(exit_code)),
            RunOutcome::SpawnFailed(msg) => Err(DownloadError::SpawnFailed(msg)),
            RunOutcome::StreamError(msg) => Err(DownloadError::Stream(msg)),
        }
    }
}

/// Download errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadError {
    #[error("Spawn failed: {0}")]
    SpawnFailed(String),

    #[error("Tool exited with status {}", .0.map(|c| c.to_string()).unwrap_or_else(|| "signal".to_string()))]
    NonZeroExit(Option<i32>),

    #[error("Output stream error: {0}")]
    Stream(String),
}

/// Download runner trait
///
/// Implementations:
/// - GdriveRunner (infra-system): spawns the external tool
/// - MockDownloadRunner: materialises scripted trees for tests
#[async_trait]
pub trait DownloadRunner: Send + Sync {
    /// Recursively download `folder` into `dest`, skipping files already present.
    ///
    /// Each matched progress line is sent on `progress` before the next line
    /// is read.
    async fn download(&self, folder: &FolderId, dest: &Path, progress: ProgressSender)
        -> RunOutcome;

    /// Run the tool's no-op listing command
    async fn probe(&self) -> RunOutcome;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted behaviour for one folder id
    #[derive(Debug, Clone)]
    pub enum MockFolder {
        /// Write these `(relative path, bytes)` files, emitting one event each
        Files(Vec<(String, Vec<u8>)>),
        /// Emit events for these files, then fail
        FailAfter(Vec<String>, RunOutcome),
        /// Panic inside the runner (panic isolation testing)
        Panic(String),
    }

    /// Mock runner that materialises in-memory trees on disk
    pub struct MockDownloadRunner {
        folders: Mutex<HashMap<String, MockFolder>>,
        probe: Mutex<RunOutcome>,
        calls: Mutex<Vec<String>>,
    }

    impl MockDownloadRunner {
        pub fn new() -> Self {
            Self {
                folders: Mutex::new(HashMap::new()),
                probe: Mutex::new(RunOutcome::Success),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn with_folder(self, id: &str, folder: MockFolder) -> Self {
            self.folders.lock().unwrap().insert(id.to_string(), folder);
            self
        }

        pub fn with_files(self, id: &str, files: &[(&str, &[u8])]) -> Self {
            let files = files
                .iter()
                .map(|(path, bytes)| (path.to_string(), bytes.to_vec()))
                .collect();
            self.with_folder(id, MockFolder::Files(files))
        }

        pub fn set_probe(&self, outcome: RunOutcome) {
            *self.probe.lock().unwrap() = outcome;
        }

        /// Folder ids downloaded so far, in call order
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Default for MockDownloadRunner {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl DownloadRunner for MockDownloadRunner {
        async fn download(
            &self,
            folder: &FolderId,
            dest: &Path,
            progress: ProgressSender,
        ) -> RunOutcome {
            self.calls.lock().unwrap().push(folder.to_string());

            let scripted = self.folders.lock().unwrap().get(folder.as_str()).cloned();
            match scripted {
                None => RunOutcome::Failed { exit_code: Some(1) },
                Some(MockFolder::Files(files)) => {
                    for (path, bytes) in files {
                        let target = dest.join(&path);
                        if let Some(parent) = target.parent() {
                            if let Err(e) = std::fs::create_dir_all(parent) {
                                return RunOutcome::StreamError(e.to_string());
                            }
                        }
                        if let Err(e) = std::fs::write(&target, &bytes) {
                            return RunOutcome::StreamError(e.to_string());
                        }
                        let _ = progress.send(DownloadProgress { file_name: path });
                    }
                    RunOutcome::Success
                }
                Some(MockFolder::FailAfter(names, outcome)) => {
                    for file_name in names {
                        let _ = progress.send(DownloadProgress { file_name });
                    }
                    outcome
                }
                Some(MockFolder::Panic(msg)) => panic!("{}", msg),
            }
        }

        async fn probe(&self) -> RunOutcome {
            self.probe.lock().unwrap().clone()
        }
    }
}
