// Job Record Store - typed accessor over the shared key/value store

use crate::application::constants::JOB_KEY_PREFIX;
use crate::domain::{FolderId, JobField, JobRecord, TreeDiff, VerifyState};
use crate::error::Result;
use crate::port::KeyValueStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Typed view of job records.
///
/// One hash per job under `verify-<job-id>`. Each job owns its key
/// exclusively, so plain single-key operations suffice.
#[derive(Clone)]
pub struct JobRecordStore {
    kv: Arc<dyn KeyValueStore>,
}

impl JobRecordStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    /// Store key of a job record
    pub fn key_for(id: &str) -> String {
        format!("{}{}", JOB_KEY_PREFIX, id)
    }

    /// Whether any record (live) exists under this job id
    pub async fn exists(&self, id: &str) -> Result<bool> {
        Ok(!self.kv.hash_get_all(&Self::key_for(id)).await?.is_empty())
    }

    /// Write every initial field and set the registration TTL
    pub async fn initialize(
        &self,
        id: &str,
        src: &FolderId,
        dst: &FolderId,
        ttl: Duration,
    ) -> Result<()> {
        let key = Self::key_for(id);
        let fields = [
            (JobField::Id.as_str(), id.to_string()),
            (JobField::State.as_str(), VerifyState::Init.to_string()),
            (JobField::DownloadCount.as_str(), "0".to_string()),
            (JobField::Comment.as_str(), String::new()),
            (JobField::SrcFolderId.as_str(), src.to_string()),
            (JobField::DstFolderId.as_str(), dst.to_string()),
            (JobField::SrcFolderPath.as_str(), String::new()),
            (JobField::DstFolderPath.as_str(), String::new()),
            (JobField::DiffJson.as_str(), "{}".to_string()),
        ];

        self.kv.hash_set_all(&key, &fields).await?;
        self.kv.expire(&key, ttl).await?;

        info!(job_id = %id, src = %src, dst = %dst, ttl_secs = ttl.as_secs(), "Job record initialized");
        Ok(())
    }

    /// Read all fields; unknown or expired jobs yield an all-absent record
    pub async fn get(&self, id: &str) -> Result<JobRecord> {
        let mut fields = self.kv.hash_get_all(&Self::key_for(id)).await?;
        // Empty strings are initial placeholders, not values
        fields.retain(|_, v| !v.is_empty());
        Ok(JobRecord::from_fields(&fields))
    }

    pub async fn set_field(&self, id: &str, field: JobField, value: &str) -> Result<()> {
        debug!(job_id = %id, field = %field, "Setting job field");
        self.kv.hash_set(&Self::key_for(id), field.as_str(), value).await
    }

    pub async fn set_state(&self, id: &str, state: VerifyState) -> Result<()> {
        self.set_field(id, JobField::State, state.as_str()).await
    }

    pub async fn set_diff(&self, id: &str, diff: &TreeDiff) -> Result<()> {
        self.set_field(id, JobField::DiffJson, &diff.to_json()?).await
    }

    /// Increment an integer field by one, returning the new value
    pub async fn increment(&self, id: &str, field: JobField) -> Result<i64> {
        self.kv.hash_incr(&Self::key_for(id), field.as_str(), 1).await
    }

    pub async fn touch_ttl(&self, id: &str, ttl: Duration) -> Result<()> {
        self.kv.expire(&Self::key_for(id), ttl).await?;
        Ok(())
    }

    /// Remaining lifetime of a record
    pub async fn ttl(&self, id: &str) -> Result<Option<Duration>> {
        self.kv.ttl(&Self::key_for(id)).await
    }

    /// Delete a single record; true if it existed
    pub async fn delete(&self, id: &str) -> Result<bool> {
        self.kv.delete(&Self::key_for(id)).await
    }

    /// Administrative bulk clear: delete every key starting with `prefix`
    pub async fn delete_all_matching(&self, prefix: &str) -> Result<usize> {
        let keys = self.kv.keys_with_prefix(prefix).await?;
        let mut deleted = 0;
        for key in &keys {
            if self.kv.delete(key).await? {
                deleted += 1;
            }
        }
        info!(prefix = %prefix, deleted = deleted, "Deleted job records");
        Ok(deleted)
    }
}
