// Verification Job Domain Model

use super::diff::TreeDiff;
use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

/// Job ID (opaque token, UUID v4 in production)
pub type JobId = String;

/// Verification job state.
///
/// Ordered `init -> download_src -> download_dst -> compare -> {success | failed}`.
/// Any non-terminal state may also move to `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyState {
    Init,
    DownloadSrc,
    DownloadDst,
    Compare,
    Success,
    Failed,
    Error,
}

impl VerifyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerifyState::Init => "init",
            VerifyState::DownloadSrc => "download_src",
            VerifyState::DownloadDst => "download_dst",
            VerifyState::Compare => "compare",
            VerifyState::Success => "success",
            VerifyState::Failed => "failed",
            VerifyState::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VerifyState::Success | VerifyState::Failed | VerifyState::Error
        )
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_transition_to(&self, next: VerifyState) -> bool {
        use VerifyState::*;

        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Error)
                | (Init, DownloadSrc)
                | (DownloadSrc, DownloadDst)
                | (DownloadDst, Compare)
                | (Compare, Success)
                | (Compare, Failed)
        )
    }

    /// Validate and return the next state
    pub fn transition(self, next: VerifyState) -> Result<VerifyState> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(DomainError::InvalidStateTransition {
                from: self.to_string(),
                to: next.to_string(),
            })
        }
    }
}

impl std::fmt::Display for VerifyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerifyState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "init" => Ok(VerifyState::Init),
            "download_src" => Ok(VerifyState::DownloadSrc),
            "download_dst" => Ok(VerifyState::DownloadDst),
            "compare" => Ok(VerifyState::Compare),
            "success" => Ok(VerifyState::Success),
            "failed" => Ok(VerifyState::Failed),
            "error" => Ok(VerifyState::Error),
            other => Err(DomainError::UnknownState(other.to_string())),
        }
    }
}

/// How a registered job is executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Dispatch onto the worker pool and return immediately
    #[default]
    Background,
    /// Run to a terminal state before `register` returns
    Inline,
}

/// Persisted fields of a job record (hash field names)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobField {
    Id,
    State,
    DownloadCount,
    Comment,
    SrcFolderId,
    DstFolderId,
    SrcFolderPath,
    DstFolderPath,
    DiffJson,
}

impl JobField {
    pub const ALL: [JobField; 9] = [
        JobField::Id,
        JobField::State,
        JobField::DownloadCount,
        JobField::Comment,
        JobField::SrcFolderId,
        JobField::DstFolderId,
        JobField::SrcFolderPath,
        JobField::DstFolderPath,
        JobField::DiffJson,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobField::Id => "id",
            JobField::State => "state",
            JobField::DownloadCount => "download_count",
            JobField::Comment => "comment",
            JobField::SrcFolderId => "src_folder_id",
            JobField::DstFolderId => "dst_folder_id",
            JobField::SrcFolderPath => "src_folder_path",
            JobField::DstFolderPath => "dst_folder_path",
            JobField::DiffJson => "diff_json",
        }
    }
}

impl std::fmt::Display for JobField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a job record as read from the store.
///
/// Every field is optional: an unknown or expired job reads as a record with
/// all fields absent (see [`JobRecord::is_unknown`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Option<JobId>,
    pub state: Option<VerifyState>,
    pub download_count: Option<i64>,
    pub comment: Option<String>,
    pub src_folder_id: Option<String>,
    pub dst_folder_id: Option<String>,
    pub src_folder_path: Option<String>,
    pub dst_folder_path: Option<String>,
    pub diff: Option<TreeDiff>,
}

impl JobRecord {
    /// Build a record from raw hash fields. Unparseable values are treated as
    /// absent; unknown field names are ignored.
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let get = |field: JobField| fields.get(field.as_str()).cloned();

        Self {
            id: get(JobField::Id),
            state: get(JobField::State).and_then(|s| s.parse().ok()),
            download_count: get(JobField::DownloadCount).and_then(|s| s.parse().ok()),
            comment: get(JobField::Comment),
            src_folder_id: get(JobField::SrcFolderId),
            dst_folder_id: get(JobField::DstFolderId),
            src_folder_path: get(JobField::SrcFolderPath),
            dst_folder_path: get(JobField::DstFolderPath),
            diff: get(JobField::DiffJson).and_then(|s| TreeDiff::from_json(&s).ok()),
        }
    }

    /// True when no field is present (unknown or expired job)
    pub fn is_unknown(&self) -> bool {
        *self == Self::default()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_some_and(|s| s.is_terminal())
    }

    /// Flat field map keyed by persisted field name, absent fields as empty strings
    pub fn to_field_map(&self) -> BTreeMap<&'static str, String> {
        let diff_json = self
            .diff
            .as_ref()
            .and_then(|d| d.to_json().ok())
            .unwrap_or_default();

        JobField::ALL
            .iter()
            .map(|field| {
                let value = match field {
                    JobField::Id => self.id.clone().unwrap_or_default(),
                    JobField::State => self.state.map(|s| s.to_string()).unwrap_or_default(),
                    JobField::DownloadCount => self
                        .download_count
                        .map(|c| c.to_string())
                        .unwrap_or_default(),
                    JobField::Comment => self.comment.clone().unwrap_or_default(),
                    JobField::SrcFolderId => self.src_folder_id.clone().unwrap_or_default(),
                    JobField::DstFolderId => self.dst_folder_id.clone().unwrap_or_default(),
                    JobField::SrcFolderPath => self.src_folder_path.clone().unwrap_or_default(),
                    JobField::DstFolderPath => self.dst_folder_path.clone().unwrap_or_default(),
                    JobField::DiffJson => diff_json.clone(),
                };
                (field.as_str(), value)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_transitions() {
        use VerifyState::*;
        let path = [Init, DownloadSrc, DownloadDst, Compare, Success];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
        assert!(Compare.can_transition_to(Failed));
    }

    #[test]
    fn test_backward_and_skipping_transitions_rejected() {
        use VerifyState::*;
        assert!(!DownloadDst.can_transition_to(DownloadSrc));
        assert!(!Init.can_transition_to(Compare));
        assert!(!DownloadSrc.can_transition_to(Success));

        let err = Compare.transition(Init).unwrap_err();
        assert_eq!(
            err,
            DomainError::InvalidStateTransition {
                from: "compare".to_string(),
                to: "init".to_string()
            }
        );
    }

    #[test]
    fn test_error_reachable_from_any_non_terminal_state() {
        use VerifyState::*;
        for state in [Init, DownloadSrc, DownloadDst, Compare] {
            assert!(state.can_transition_to(Error));
        }
        for state in [Success, Failed, Error] {
            assert!(!state.can_transition_to(Error));
        }
    }

    #[test]
    fn test_state_string_round_trip() {
        for state in [
            VerifyState::Init,
            VerifyState::DownloadSrc,
            VerifyState::DownloadDst,
            VerifyState::Compare,
            VerifyState::Success,
            VerifyState::Failed,
            VerifyState::Error,
        ] {
            assert_eq!(state.as_str().parse::<VerifyState>().unwrap(), state);
        }
        assert!("running".parse::<VerifyState>().is_err());
    }

    #[test]
    fn test_record_from_empty_fields_is_unknown() {
        let record = JobRecord::from_fields(&HashMap::new());
        assert!(record.is_unknown());
        assert!(!record.is_terminal());
        assert!(record.to_field_map().values().all(|v| v.is_empty()));
    }

    #[test]
    fn test_record_from_fields() {
        let fields: HashMap<String, String> = [
            ("id", "job-1"),
            ("state", "failed"),
            ("download_count", "7"),
            ("comment", "docs/readme.md"),
            ("src_folder_id", "src"),
            ("dst_folder_id", "dst"),
            ("diff_json", r#"{"missing":["x"],"mismatch":[]}"#),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let record = JobRecord::from_fields(&fields);
        assert_eq!(record.state, Some(VerifyState::Failed));
        assert_eq!(record.download_count, Some(7));
        assert_eq!(record.diff.as_ref().unwrap().missing, vec!["x".to_string()]);
        assert!(record.src_folder_path.is_none());
        assert!(record.is_terminal());

        let map = record.to_field_map();
        assert_eq!(map["state"], "failed");
        assert_eq!(map["src_folder_path"], "");
    }
}
