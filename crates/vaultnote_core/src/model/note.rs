//! Note domain model.
//!
//! # Responsibility
//! - Define the canonical note record and its immutable version snapshots.
//! - Provide lifecycle helpers for version bookkeeping and encryption state.
//!
//! # Invariants
//! - `id` is stable and never reused for another note.
//! - `is_encrypted == true` iff `encrypted_payload` is present and `content`
//!   is empty. A note never holds plaintext next to a live envelope.
//! - `version == versions.len() + 1` at all times; snapshots are dense and
//!   oldest-first (`versions[i].version == i + 1`).

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for every note.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type NoteId = Uuid;

/// Immutable snapshot of a note's content before a mutation.
///
/// Owned exclusively by its parent note and never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteVersion {
    /// Stable snapshot id.
    pub id: Uuid,
    /// Content as it was before the mutation that created this snapshot.
    pub content: String,
    /// The note's `updated_at` before the mutation.
    pub created_at: DateTime<Utc>,
    /// The note's `version` before the increment.
    pub version: u32,
}

/// Canonical note record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    /// Stable global id used for storage keys and import merging.
    pub id: NoteId,
    pub title: String,
    /// Rich markup body; opaque to the core.
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_encrypted: bool,
    /// Sealed envelope, present exactly while `is_encrypted` is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_payload: Option<String>,
    /// Normalized lowercase tags, insertion order irrelevant.
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_summary: Option<String>,
    /// Positive, starts at 1, incremented on every content change.
    pub version: u32,
    /// Oldest-first append-only history.
    #[serde(default)]
    pub versions: Vec<NoteVersion>,
}

/// Coherence failure for a note record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    /// `version` does not equal `versions.len() + 1`.
    VersionCountMismatch { version: u32, snapshots: usize },
    /// Snapshot numbering is not dense oldest-first.
    NonSequentialSnapshots { index: usize, found: u32 },
    /// Encryption flag disagrees with payload/content state.
    EncryptionStateMismatch,
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::VersionCountMismatch { version, snapshots } => write!(
                f,
                "note version {version} does not match {snapshots} stored snapshots"
            ),
            Self::NonSequentialSnapshots { index, found } => write!(
                f,
                "snapshot at index {index} carries version {found}, expected {}",
                index + 1
            ),
            Self::EncryptionStateMismatch => {
                write!(f, "encryption flag disagrees with payload/content state")
            }
        }
    }
}

impl Error for NoteValidationError {}

impl Note {
    /// Creates a new plaintext note with a generated stable id.
    ///
    /// Both timestamps are set to `now`, version starts at 1 with an empty
    /// history. A blank title falls back to "Untitled".
    pub fn new(title: impl Into<String>, content: impl Into<String>, now: DateTime<Utc>) -> Self {
        let title = title.into();
        let title = if title.trim().is_empty() {
            "Untitled".to_string()
        } else {
            title
        };
        Self {
            id: Uuid::new_v4(),
            title,
            content: content.into(),
            created_at: now,
            updated_at: now,
            is_pinned: false,
            is_encrypted: false,
            encrypted_payload: None,
            tags: Vec::new(),
            ai_summary: None,
            version: 1,
            versions: Vec::new(),
        }
    }

    /// Checks record coherence.
    ///
    /// Called by repository writes before SQL mutations and by the import
    /// path before merging externally produced records.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.version as usize != self.versions.len() + 1 {
            return Err(NoteValidationError::VersionCountMismatch {
                version: self.version,
                snapshots: self.versions.len(),
            });
        }

        for (index, snapshot) in self.versions.iter().enumerate() {
            if snapshot.version as usize != index + 1 {
                return Err(NoteValidationError::NonSequentialSnapshots {
                    index,
                    found: snapshot.version,
                });
            }
        }

        let coherent = if self.is_encrypted {
            self.encrypted_payload.is_some() && self.content.is_empty()
        } else {
            self.encrypted_payload.is_none()
        };
        if !coherent {
            return Err(NoteValidationError::EncryptionStateMismatch);
        }

        Ok(())
    }

    /// Appends a snapshot of the current content and increments `version`.
    ///
    /// Must be called before the new content is applied; the snapshot
    /// captures the pre-mutation state.
    pub fn snapshot_current(&mut self) {
        self.versions.push(NoteVersion {
            id: Uuid::new_v4(),
            content: self.content.clone(),
            created_at: self.updated_at,
            version: self.version,
        });
        self.version += 1;
    }
}

/// Current time truncated to millisecond precision.
///
/// Domain timestamps carry milliseconds only, matching the storage columns
/// and the export format; values read back from the store compare equal to
/// the ones handed out at mutation time.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    Utc.timestamp_millis_opt(now.timestamp_millis())
        .single()
        .unwrap_or(now)
}

/// Normalizes one tag value: trimmed, lowercased, empty rejected.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

/// Normalizes and deduplicates tag values.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut unique = BTreeSet::new();
    for tag in tags {
        if let Some(value) = normalize_tag(tag) {
            unique.insert(value);
        }
    }
    unique.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::{normalize_tags, Note, NoteValidationError};
    use chrono::Utc;

    #[test]
    fn new_note_starts_at_version_one_with_empty_history() {
        let note = Note::new("title", "body", Utc::now());
        assert_eq!(note.version, 1);
        assert!(note.versions.is_empty());
        assert!(note.validate().is_ok());
    }

    #[test]
    fn blank_title_falls_back_to_untitled() {
        let note = Note::new("   ", "body", Utc::now());
        assert_eq!(note.title, "Untitled");
    }

    #[test]
    fn snapshot_current_keeps_version_invariant() {
        let mut note = Note::new("t", "first", Utc::now());
        note.snapshot_current();
        note.content = "second".to_string();
        assert_eq!(note.version, 2);
        assert_eq!(note.versions.len(), 1);
        assert_eq!(note.versions[0].content, "first");
        assert_eq!(note.versions[0].version, 1);
        assert!(note.validate().is_ok());
    }

    #[test]
    fn validate_rejects_plaintext_with_live_envelope() {
        let mut note = Note::new("t", "body", Utc::now());
        note.encrypted_payload = Some("envelope".to_string());
        assert_eq!(
            note.validate(),
            Err(NoteValidationError::EncryptionStateMismatch)
        );
    }

    #[test]
    fn validate_rejects_version_count_drift() {
        let mut note = Note::new("t", "body", Utc::now());
        note.version = 3;
        assert!(matches!(
            note.validate(),
            Err(NoteValidationError::VersionCountMismatch { .. })
        ));
    }

    #[test]
    fn normalize_tags_lowercases_and_deduplicates() {
        let tags = vec![
            "Work".to_string(),
            "IMPORTANT".to_string(),
            "work".to_string(),
            "  ".to_string(),
        ];
        assert_eq!(
            normalize_tags(&tags),
            vec!["important".to_string(), "work".to_string()]
        );
    }
}
