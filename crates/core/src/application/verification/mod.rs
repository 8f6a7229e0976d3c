// Verification Orchestrator - job lifecycle from registration to terminal state

pub mod config;

pub use config::VerifierConfig;

use crate::application::constants::{JOB_KEY_PREFIX, MAX_ID_ATTEMPTS};
use crate::application::job_store::JobRecordStore;
use crate::application::worker::join_error_message;
use crate::domain::{ExecutionMode, FolderId, JobField, JobId, JobRecord, VerifyState};
use crate::error::{AppError, Result};
use crate::port::{
    DownloadProgress, DownloadRunner, DownloadStorage, IdProvider, JobDispatcher, KeyValueStore,
    RunOutcome, TreeComparator,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Verifies that a destination folder tree is a faithful copy of a source tree.
///
/// Lifecycle of one job:
/// `init -> download_src -> download_dst -> compare -> {success | failed}`,
/// with any failure during execution routed to `error`. Each job is executed
/// at most once; there is no retry.
///
/// Cloning is cheap (all collaborators are shared).
#[derive(Clone)]
pub struct VerificationService {
    records: JobRecordStore,
    runner: Arc<dyn DownloadRunner>,
    comparator: Arc<dyn TreeComparator>,
    storage: Arc<dyn DownloadStorage>,
    dispatcher: Arc<dyn JobDispatcher>,
    id_provider: Arc<dyn IdProvider>,
    config: Arc<VerifierConfig>,
}

impl VerificationService {
    /// Create a new verification service
    ///
    /// # Arguments
    /// * `kv` - Shared key/value store holding job records
    /// * `runner` - External download tool
    /// * `comparator` - Tree comparison
    /// * `storage` - Local download directories
    /// * `dispatcher` - Where background executions run
    /// * `id_provider` - Job id generator
    /// * `config` - TTL windows and cleanup policies
    ///
    /// # Example
    /// ```ignore
    /// let service = VerificationService::new(
    ///     kv, runner, comparator, storage,
    ///     Arc::new(WorkerPool::default()),
    ///     Arc::new(UuidProvider),
    ///     VerifierConfig::default(),
    /// );
    /// let job_id = service.register(src_url, dst_url, ExecutionMode::Background).await?;
    /// ```
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        runner: Arc<dyn DownloadRunner>,
        comparator: Arc<dyn TreeComparator>,
        storage: Arc<dyn DownloadStorage>,
        dispatcher: Arc<dyn JobDispatcher>,
        id_provider: Arc<dyn IdProvider>,
        config: VerifierConfig,
    ) -> Self {
        Self {
            records: JobRecordStore::new(kv),
            runner,
            comparator,
            storage,
            dispatcher,
            id_provider,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    /// Register a verification job.
    ///
    /// Both folder identifiers are resolved first; a malformed argument fails
    /// the registration without writing anything. On success the record is
    /// initialised with the short registration TTL and execution is either
    /// dispatched (`Background`) or run to completion (`Inline`).
    ///
    /// Execution failures never surface here: they end in the `error` state.
    pub async fn register(
        &self,
        src_url: &str,
        dst_url: &str,
        mode: ExecutionMode,
    ) -> Result<JobId> {
        let src = FolderId::extract(src_url)
            .map_err(|e| AppError::Validation(format!("source folder: {}", e)))?;
        let dst = FolderId::extract(dst_url)
            .map_err(|e| AppError::Validation(format!("destination folder: {}", e)))?;

        let job_id = self.allocate_job_id().await?;

        if let Err(e) = self
            .records
            .initialize(&job_id, &src, &dst, self.config.registration_ttl)
            .await
        {
            // A half-written record must not outlive a failed registration
            if let Err(cleanup) = self.records.delete(&job_id).await {
                warn!(job_id = %job_id, error = %cleanup, "Could not remove partial job record");
            }
            return Err(e);
        }

        info!(job_id = %job_id, src = %src, dst = %dst, mode = ?mode, "Verification job registered");

        match mode {
            ExecutionMode::Background => {
                let this = self.clone();
                let id = job_id.clone();
                self.dispatcher
                    .dispatch(Box::pin(async move { this.execute(id).await }));
            }
            ExecutionMode::Inline => self.execute(job_id.clone()).await,
        }

        Ok(job_id)
    }

    /// Generate a job id whose record key is not already in use
    async fn allocate_job_id(&self) -> Result<JobId> {
        for attempt in 1..=MAX_ID_ATTEMPTS {
            let candidate = self.id_provider.generate_id();
            if !self.records.exists(&candidate).await? {
                return Ok(candidate);
            }
            warn!(job_id = %candidate, attempt = attempt, "Generated job id already in use");
        }
        Err(AppError::Internal(format!(
            "could not generate a unique job id after {} attempts",
            MAX_ID_ATTEMPTS
        )))
    }

    /// Execute a registered job exactly once, routing every failure (returned
    /// error or panic) to the terminal failure handler.
    pub async fn execute(&self, job_id: JobId) {
        let this = self.clone();
        let id = job_id.clone();
        let handle = tokio::spawn(async move { this.perform(&id).await });

        match handle.await {
            Ok(Ok(state)) => {
                info!(job_id = %job_id, state = %state, "Verification job finished");
            }
            Ok(Err(e)) => self.handle_failure(&job_id, &e.to_string()).await,
            Err(join_err) => {
                self.handle_failure(&job_id, &join_error_message(join_err))
                    .await
            }
        }
    }

    /// Run the job body: download both trees, compare, persist the outcome.
    ///
    /// Returns the terminal state (`success` or `failed`). Any error leaves
    /// the record in whatever transitional state it reached; `execute` is
    /// responsible for moving it to `error`.
    pub async fn perform(&self, job_id: &str) -> Result<VerifyState> {
        let record = self.records.get(job_id).await?;
        if record.is_unknown() {
            return Err(AppError::NotFound(format!(
                "job {} expired or was never registered",
                job_id
            )));
        }

        let mut state = record
            .state
            .ok_or_else(|| AppError::Internal(format!("job {} has no state", job_id)))?;
        let src = FolderId::parse(record.src_folder_id.as_deref().unwrap_or_default())?;
        let dst = FolderId::parse(record.dst_folder_id.as_deref().unwrap_or_default())?;

        self.advance(job_id, &mut state, VerifyState::DownloadSrc).await?;
        let src_path = self.download_folder(job_id, &src).await?;
        self.records
            .set_field(job_id, JobField::SrcFolderPath, &src_path.to_string_lossy())
            .await?;

        self.advance(job_id, &mut state, VerifyState::DownloadDst).await?;
        let dst_path = self.download_folder(job_id, &dst).await?;
        self.records
            .set_field(job_id, JobField::DstFolderPath, &dst_path.to_string_lossy())
            .await?;

        self.advance(job_id, &mut state, VerifyState::Compare).await?;
        let diff = self.comparator.compare(&src_path, &dst_path).await?;

        let terminal = if diff.is_empty() {
            VerifyState::Success
        } else {
            VerifyState::Failed
        };
        // Readers that observe the terminal state must also see the diff
        self.records.set_diff(job_id, &diff).await?;
        self.advance(job_id, &mut state, terminal).await?;

        info!(
            job_id = %job_id,
            state = %terminal,
            missing = diff.missing.len(),
            mismatch = diff.mismatch.len(),
            "Comparison completed"
        );

        if !self.config.keep_downloads {
            self.remove_quietly(job_id, &src_path).await;
            self.remove_quietly(job_id, &dst_path).await;
        }

        Ok(terminal)
    }

    /// Validated state change; also refreshes the in-flight TTL
    async fn advance(
        &self,
        job_id: &str,
        state: &mut VerifyState,
        next: VerifyState,
    ) -> Result<()> {
        let from = *state;
        let next = from.transition(next)?;
        self.records.set_state(job_id, next).await?;
        self.records.touch_ttl(job_id, self.config.active_ttl).await?;
        debug!(job_id = %job_id, from = %from, to = %next, "Job state changed");
        *state = next;
        Ok(())
    }

    /// Download one folder, streaming progress into the record.
    async fn download_folder(&self, job_id: &str, folder: &FolderId) -> Result<PathBuf> {
        let dir = self.storage.allocate(folder).await?;
        if dir.reused {
            info!(job_id = %job_id, folder = %folder, path = %dir.path.display(), "Reusing cached download");
            return Ok(dir.path);
        }

        info!(job_id = %job_id, folder = %folder, path = %dir.path.display(), "Downloading folder");

        let (tx, mut rx) = mpsc::unbounded_channel();
        let download = self.runner.download(folder, &dir.path, tx);
        let consume = async {
            let mut result = Ok(());
            // Keep draining after a store error so event order is never skewed
            while let Some(event) = rx.recv().await {
                if result.is_ok() {
                    result = self.record_progress(job_id, &event).await;
                }
            }
            result
        };
        let (outcome, progress) = tokio::join!(download, consume);

        let result = Self::check_outcome(outcome).and(progress);
        if let Err(e) = result {
            // A partial tree must never be picked up as a cache hit later
            if self.config.cleanup_on_error || self.config.keep_downloads {
                self.remove_quietly(job_id, &dir.path).await;
            }
            return Err(e);
        }

        Ok(dir.path)
    }

    fn check_outcome(outcome: RunOutcome) -> Result<()> {
        outcome.into_result().map_err(AppError::from)
    }

    async fn record_progress(&self, job_id: &str, event: &DownloadProgress) -> Result<()> {
        let count = self.records.increment(job_id, JobField::DownloadCount).await?;
        self.records
            .set_field(job_id, JobField::Comment, &event.file_name)
            .await?;
        self.records.touch_ttl(job_id, self.config.active_ttl).await?;
        debug!(job_id = %job_id, file = %event.file_name, download_count = count, "Download progress");
        Ok(())
    }

    /// Terminal failure handler: state `error`, message in `comment`, and
    /// best-effort removal of recorded download directories.
    ///
    /// A record that already reached `success` or `failed` is left as is.
    /// Never fails; problems are logged.
    pub async fn handle_failure(&self, job_id: &str, message: &str) {
        let record = match self.records.get(job_id).await {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "Could not read record before failing it");
                None
            }
        };
        if let Some(state) = record.as_ref().and_then(|r| r.state).filter(|s| s.is_terminal()) {
            warn!(job_id = %job_id, state = %state, error = %message, "Ignoring failure of a settled job");
            return;
        }

        error!(job_id = %job_id, error = %message, "Verification job failed");

        if let Err(e) = self.records.set_state(job_id, VerifyState::Error).await {
            error!(job_id = %job_id, error = %e, "Could not record error state");
        }
        if let Err(e) = self.records.set_field(job_id, JobField::Comment, message).await {
            error!(job_id = %job_id, error = %e, "Could not record failure message");
        }
        if let Err(e) = self.records.touch_ttl(job_id, self.config.active_ttl).await {
            warn!(job_id = %job_id, error = %e, "Could not refresh record TTL");
        }

        if !self.config.cleanup_on_error || self.config.keep_downloads {
            return;
        }

        let Some(record) = record else {
            return;
        };
        for path in [record.src_folder_path, record.dst_folder_path]
            .into_iter()
            .flatten()
        {
            self.remove_quietly(job_id, Path::new(&path)).await;
        }
    }

    /// Best-effort removal; failures are logged, never escalated
    async fn remove_quietly(&self, job_id: &str, path: &Path) {
        match self.storage.remove(path).await {
            Ok(()) => debug!(job_id = %job_id, path = %path.display(), "Removed download directory"),
            Err(e) => {
                warn!(job_id = %job_id, path = %path.display(), error = %e, "Cleanup failed")
            }
        }
    }

    /// Current record of a job. Unknown or expired jobs yield an all-absent
    /// record rather than an error.
    pub async fn get_state(&self, job_id: &str) -> Result<JobRecord> {
        self.records.get(job_id).await
    }

    /// Poll a job until it reaches a terminal state, disappears, or `timeout`
    /// elapses. `on_update` sees every polled snapshot.
    pub async fn wait_until_settled(
        &self,
        job_id: &str,
        interval: Duration,
        timeout: Option<Duration>,
        mut on_update: impl FnMut(&JobRecord) + Send,
    ) -> Result<JobRecord> {
        let started = tokio::time::Instant::now();
        loop {
            let record = self.get_state(job_id).await?;
            on_update(&record);
            if record.is_terminal() || record.is_unknown() {
                return Ok(record);
            }
            if timeout.is_some_and(|t| started.elapsed() >= t) {
                return Ok(record);
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// Readiness probe: true iff the external tool answers its listing command
    pub async fn ready(&self) -> bool {
        let outcome = self.runner.probe().await;
        if outcome.is_success() {
            return true;
        }
        match outcome {
            RunOutcome::SpawnFailed(msg) => {
                warn!(error = %msg, "Download tool is not installed or not reachable");
                false
            }
            other => {
                warn!(outcome = ?other, "Download tool probe failed");
                false
            }
        }
    }

    /// Administrative bulk clear of every job record
    pub async fn clear_jobs(&self) -> Result<usize> {
        self.records.delete_all_matching(JOB_KEY_PREFIX).await
    }
}
