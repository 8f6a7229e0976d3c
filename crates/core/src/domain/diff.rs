// Tree Diff - result payload of a tree comparison

use serde::{Deserialize, Serialize};

/// Categorised differences between a destination tree and its source.
///
/// Paths are relative to the comparison root and use `/` separators.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeDiff {
    /// Destination entries with no counterpart of the same type in the source
    #[serde(default)]
    pub missing: Vec<String>,
    /// Destination files whose bytes differ from the source file
    #[serde(default)]
    pub mismatch: Vec<String>,
}

impl TreeDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.mismatch.is_empty()
    }

    pub fn record_missing(&mut self, path: impl Into<String>) {
        self.missing.push(path.into());
    }

    pub fn record_mismatch(&mut self, path: impl Into<String>) {
        self.mismatch.push(path.into());
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a persisted payload. The pre-comparison placeholder `{}` parses
    /// to an empty diff.
    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }
}
