//! Folder identifier extraction.
//!
//! Accepts either a raw identifier or a storage-provider URL and resolves it to
//! the canonical identifier. Two URL shapes are recognised, checked in order:
//!
//! 1. a query parameter `id=<ID>` (`https://drive.google.com/open?id=<ID>`)
//! 2. a path segment `/folders/<ID>` (`https://drive.google.com/drive/folders/<ID>?usp=sharing`)
//!
//! Anything else is trimmed and must itself have the identifier shape
//! `[A-Za-z0-9_-]+`. No network access happens here.

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

const FOLDERS_SEGMENT: &str = "/folders/";
const ID_PARAM: &str = "id=";

/// Canonical remote folder identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(String);

impl FolderId {
    /// Extract a folder identifier from a URL or raw identifier.
    ///
    /// # Errors
    /// `DomainError::MalformedFolderId` when neither URL shape matches and the
    /// trimmed input is not a valid identifier.
    ///
    /// # Example
    /// ```
    /// use mirrorcheck_core::domain::FolderId;
    ///
    /// let id = FolderId::extract("https://drive.google.com/drive/folders/1aB_c-D?usp=sharing").unwrap();
    /// assert_eq!(id.as_str(), "1aB_c-D");
    /// ```
    pub fn extract(input: &str) -> Result<Self> {
        let input = input.trim();

        if let Some(id) = query_param_id(input).or_else(|| folders_segment_id(input)) {
            return Ok(Self(id.to_string()));
        }

        Self::parse(input)
    }

    /// Validate a raw identifier without any URL handling.
    pub fn parse(raw: &str) -> Result<Self> {
        if is_valid_id(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(DomainError::MalformedFolderId(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_valid_id(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_id_char)
}

/// Longest run of identifier characters at the start of `s`, if non-empty.
fn leading_id(s: &str) -> Option<&str> {
    let end = s.find(|c: char| !is_id_char(c)).unwrap_or(s.len());
    (end > 0).then(|| &s[..end])
}

fn query_param_id(url: &str) -> Option<&str> {
    let (_, query) = url.split_once('?')?;
    let query = query.split('#').next().unwrap_or_default();
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix(ID_PARAM))
        .and_then(leading_id)
}

fn folders_segment_id(url: &str) -> Option<&str> {
    let start = url.find(FOLDERS_SEGMENT)? + FOLDERS_SEGMENT.len();
    leading_id(&url[start..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_from_folders_url() {
        let id = FolderId::extract("https://drive.google.com/drive/folders/0B1x_Yz-9").unwrap();
        assert_eq!(id.as_str(), "0B1x_Yz-9");

        let id = FolderId::extract("https://drive.google.com/drive/u/0/folders/abc123?usp=sharing")
            .unwrap();
        assert_eq!(id.as_str(), "abc123");
    }

    #[test]
    fn test_extract_from_id_query_param() {
        let id = FolderId::extract("https://drive.google.com/open?id=1AbC-d_E").unwrap();
        assert_eq!(id.as_str(), "1AbC-d_E");

        let id = FolderId::extract("https://drive.google.com/open?usp=sharing&id=XyZ#frag").unwrap();
        assert_eq!(id.as_str(), "XyZ");
    }

    #[test]
    fn test_query_param_takes_precedence_over_folders_segment() {
        let id = FolderId::extract("https://example.com/folders/fromPath?id=fromQuery").unwrap();
        assert_eq!(id.as_str(), "fromQuery");
    }

    #[test]
    fn test_param_name_must_be_exactly_id() {
        // "resourceid=" is not the id parameter, so the path segment wins
        let id = FolderId::extract("https://example.com/folders/seg?resourceid=nope").unwrap();
        assert_eq!(id.as_str(), "seg");
    }

    #[test]
    fn test_raw_identifier_returned_unchanged() {
        let id = FolderId::extract("1234_abcd-EFGH").unwrap();
        assert_eq!(id.as_str(), "1234_abcd-EFGH");
    }

    #[test]
    fn test_raw_identifier_is_trimmed() {
        let id = FolderId::extract("  padded-id \n").unwrap();
        assert_eq!(id.as_str(), "padded-id");
    }

    #[test]
    fn test_malformed_inputs_rejected() {
        for bad in ["", "   ", "has space", "semi;colon", "https://example.com/nothing/here", "a/b"] {
            let err = FolderId::extract(bad).unwrap_err();
            assert!(
                matches!(err, DomainError::MalformedFolderId(_)),
                "expected malformed error for {bad:?}"
            );
        }
    }

    #[test]
    fn test_empty_capture_falls_through_to_validation() {
        assert!(FolderId::extract("https://example.com/folders/?id=").is_err());
    }
}
