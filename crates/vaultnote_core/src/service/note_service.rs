//! Note lifecycle manager.
//!
//! # Responsibility
//! - Enforce the note/version invariants across every mutation entry point.
//! - Own the encryption state machine (`Plain -> Encrypted -> Plain`).
//! - Drive best-effort AI enrichment and the import/export merge.
//!
//! # Invariants
//! - A content-changing `update` appends exactly one snapshot of the
//!   pre-mutation content and increments `version`; equal content is a no-op
//!   for the history.
//! - `encrypt`/`decrypt` are pure state transitions; they never touch the
//!   version history. Plaintext snapshots taken before encryption survive it.
//! - Import merges whole candidates or skips them; last writer (by
//!   `updated_at`) wins, ties keep the stored record.

use crate::crypto::{self, CryptoError};
use crate::gateway::transport::CompletionTransport;
use crate::gateway::{GatewayError, InferenceGateway};
use crate::model::note::{normalize_tags, now_millis, Note, NoteId};
use crate::repo::note_repo::NoteRepository;
use crate::repo::RepoError;
use crate::service::transfer::{self, ImportReport, TransferError};

use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

/// Service error for note use-cases.
#[derive(Debug)]
pub enum NoteServiceError {
    /// Target note does not exist.
    NoteNotFound(NoteId),
    /// Encryption requested with a blank password.
    EmptyPassword,
    /// Wrong password or corrupted envelope; deliberately indistinguishable.
    InvalidPassword,
    /// Decrypt called on a plaintext note.
    NotEncrypted,
    /// Encrypt called on a note that is already locked.
    AlreadyEncrypted,
    /// Caller-side throttle still active. Transient.
    Cooldown { retry_in: Duration },
    /// Inference service exhausted retries or is disabled. Transient.
    Unavailable,
    /// Malformed import payload.
    InvalidImportFormat(String),
    /// Persistence-layer failure.
    Repo(RepoError),
    /// Internal consistency mismatch between write and read-back.
    InconsistentState(&'static str),
}

impl Display for NoteServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::EmptyPassword => write!(f, "password must not be empty"),
            Self::InvalidPassword => write!(f, "invalid password or corrupted data"),
            Self::NotEncrypted => write!(f, "note is not encrypted"),
            Self::AlreadyEncrypted => write!(f, "note is already encrypted"),
            Self::Cooldown { retry_in } => {
                write!(f, "cooldown active, retry in {}s", retry_in.as_secs())
            }
            Self::Unavailable => write!(f, "inference service unavailable"),
            Self::InvalidImportFormat(details) => write!(f, "invalid import payload: {details}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent note state: {details}"),
        }
    }
}

impl Error for NoteServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for NoteServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<CryptoError> for NoteServiceError {
    fn from(value: CryptoError) -> Self {
        match value {
            CryptoError::InvalidPassword => Self::InvalidPassword,
            CryptoError::SealFailed => Self::InconsistentState("cipher rejected plaintext"),
        }
    }
}

impl From<GatewayError> for NoteServiceError {
    fn from(value: GatewayError) -> Self {
        match value {
            GatewayError::Cooldown { retry_in } => Self::Cooldown { retry_in },
            GatewayError::Unavailable => Self::Unavailable,
        }
    }
}

impl From<TransferError> for NoteServiceError {
    fn from(value: TransferError) -> Self {
        match value {
            TransferError::InvalidFormat(details) => Self::InvalidImportFormat(details),
        }
    }
}

/// Partial field set applied by `update`. Unset fields keep stored values.
#[derive(Debug, Clone, Default)]
pub struct NoteUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    pub is_pinned: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub ai_summary: Option<String>,
}

/// Note lifecycle facade over a record store and the inference gateway.
pub struct NoteService<R: NoteRepository, T: CompletionTransport> {
    repo: R,
    gateway: Arc<InferenceGateway<T>>,
}

impl<R: NoteRepository, T: CompletionTransport> NoteService<R, T> {
    /// Creates a service using the provided store and shared gateway.
    pub fn new(repo: R, gateway: Arc<InferenceGateway<T>>) -> Self {
        Self { repo, gateway }
    }

    /// Creates one note, enriching summary and tags on a best-effort basis.
    ///
    /// Gateway failures are logged and never fail creation; the note is
    /// persisted with whatever enrichment was obtained.
    pub async fn create(
        &mut self,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Note, NoteServiceError> {
        let mut note = Note::new(title, content, now_millis());

        if !note.content.trim().is_empty() {
            match self.gateway.summarize(&note.content).await {
                Ok(summary) if !summary.is_empty() => note.ai_summary = Some(summary),
                Ok(_) => {}
                Err(err) => {
                    warn!("event=note_enrich module=service status=degraded error={err}");
                }
            }
            note.tags = self.gateway.generate_tags(&note.content).await;
        }

        self.repo.put(&note)?;
        info!(
            "event=note_create module=service status=ok note_id={} tags={}",
            note.id,
            note.tags.len()
        );
        Ok(note)
    }

    /// Applies a partial update, snapshotting the pre-mutation content when
    /// it actually changes. Always refreshes `updated_at`.
    pub fn update(&mut self, id: NoteId, changes: NoteUpdate) -> Result<Note, NoteServiceError> {
        let mut note = self
            .repo
            .get(id)?
            .ok_or(NoteServiceError::NoteNotFound(id))?;

        if let Some(content) = changes.content {
            if content != note.content {
                note.snapshot_current();
                note.content = content;
            }
        }
        if let Some(title) = changes.title {
            note.title = title;
        }
        if let Some(pinned) = changes.is_pinned {
            note.is_pinned = pinned;
        }
        if let Some(tags) = changes.tags {
            note.tags = normalize_tags(&tags);
        }
        if let Some(summary) = changes.ai_summary {
            note.ai_summary = Some(summary);
        }

        note.updated_at = now_millis();
        self.repo.put(&note)?;
        Ok(note)
    }

    /// Flips the pinned flag through the regular update path.
    pub fn toggle_pin(&mut self, id: NoteId) -> Result<Note, NoteServiceError> {
        let note = self
            .repo
            .get(id)?
            .ok_or(NoteServiceError::NoteNotFound(id))?;
        self.update(
            id,
            NoteUpdate {
                is_pinned: Some(!note.is_pinned),
                ..NoteUpdate::default()
            },
        )
    }

    /// Locks a note: seals the content into an envelope and clears the
    /// plaintext body.
    ///
    /// Existing plaintext version snapshots are deliberately retained; the
    /// transition itself appends no snapshot.
    pub fn encrypt(&mut self, id: NoteId, password: &str) -> Result<Note, NoteServiceError> {
        if password.trim().is_empty() {
            return Err(NoteServiceError::EmptyPassword);
        }

        let mut note = self
            .repo
            .get(id)?
            .ok_or(NoteServiceError::NoteNotFound(id))?;
        if note.is_encrypted {
            return Err(NoteServiceError::AlreadyEncrypted);
        }

        let envelope = crypto::seal(&note.content, password)?;
        note.is_encrypted = true;
        note.encrypted_payload = Some(envelope);
        note.content = String::new();
        note.updated_at = now_millis();
        self.repo.put(&note)?;
        info!(
            "event=note_encrypt module=service status=ok note_id={}",
            note.id
        );
        Ok(note)
    }

    /// Unlocks a note and leaves it unlocked: the plaintext is restored into
    /// `content` and the envelope is discarded. One-shot, no read-only peek.
    ///
    /// A failed password attempt leaves the stored note untouched.
    pub fn decrypt(&mut self, id: NoteId, password: &str) -> Result<String, NoteServiceError> {
        let mut note = self
            .repo
            .get(id)?
            .ok_or(NoteServiceError::NoteNotFound(id))?;
        if !note.is_encrypted {
            return Err(NoteServiceError::NotEncrypted);
        }
        let envelope = note
            .encrypted_payload
            .take()
            .ok_or(NoteServiceError::InconsistentState(
                "encrypted note without payload",
            ))?;

        let plaintext = crypto::open(&envelope, password)?;
        note.is_encrypted = false;
        note.content = plaintext.clone();
        note.updated_at = now_millis();
        self.repo.put(&note)?;
        info!(
            "event=note_decrypt module=service status=ok note_id={}",
            note.id
        );
        Ok(plaintext)
    }

    /// Re-runs the cooldown-gated summarize + tags bundle for one note.
    ///
    /// Metadata refresh only: neither `version` nor `updated_at` moves.
    /// Blank content is a no-op.
    pub async fn refresh_ai_features(&mut self, id: NoteId) -> Result<Note, NoteServiceError> {
        let mut note = self
            .repo
            .get(id)?
            .ok_or(NoteServiceError::NoteNotFound(id))?;

        if note.content.trim().is_empty() {
            debug!(
                "event=note_enrich module=service status=skipped note_id={} reason=empty_content",
                note.id
            );
            return Ok(note);
        }

        let (summary, tags) = self.gateway.summarize_and_tag(&note.content).await?;
        if !summary.is_empty() {
            note.ai_summary = Some(summary);
        }
        note.tags = tags;
        self.repo.put(&note)?;
        Ok(note)
    }

    /// Hard-deletes one note. Deleting an unknown id is not an error.
    pub fn delete(&mut self, id: NoteId) -> Result<(), NoteServiceError> {
        let existed = self.repo.delete(id)?;
        info!(
            "event=note_delete module=service status=ok note_id={id} existed={existed}"
        );
        Ok(())
    }

    /// Gets one note by stable id.
    pub fn get(&self, id: NoteId) -> Result<Option<Note>, NoteServiceError> {
        Ok(self.repo.get(id)?)
    }

    /// Lists all notes ordered by `updated_at` descending.
    pub fn list(&self) -> Result<Vec<Note>, NoteServiceError> {
        Ok(self.repo.list_by_updated_desc()?)
    }

    /// Local filter over the collection: case-insensitive substring match on
    /// title/content/summary plus an any-of tag filter. Never touches the
    /// network; preserves the `updated_at`-descending order.
    pub fn search_notes(
        &self,
        query: &str,
        tags: &[String],
    ) -> Result<Vec<Note>, NoteServiceError> {
        let needle = query.trim().to_lowercase();
        let wanted = normalize_tags(tags);

        let notes = self.repo.list_by_updated_desc()?;
        Ok(notes
            .into_iter()
            .filter(|note| {
                let matches_query = needle.is_empty()
                    || note.title.to_lowercase().contains(&needle)
                    || note.content.to_lowercase().contains(&needle)
                    || note
                        .ai_summary
                        .as_deref()
                        .map_or(false, |summary| summary.to_lowercase().contains(&needle));
                let matches_tags =
                    wanted.is_empty() || wanted.iter().any(|tag| note.tags.contains(tag));
                matches_query && matches_tags
            })
            .collect())
    }

    /// Merges an import payload into the store.
    ///
    /// Candidates without an id or with broken record shape/invariants are
    /// skipped; known ids are overwritten only when the candidate is strictly
    /// newer; ties keep the stored record.
    pub fn import_notes(&mut self, json: &str) -> Result<ImportReport, NoteServiceError> {
        let candidates = transfer::parse_import_document(json)?;

        let mut report = ImportReport::default();
        for candidate in candidates {
            let Some(note) = transfer::candidate_note(candidate) else {
                report.skipped += 1;
                continue;
            };

            match self.repo.get(note.id)? {
                Some(existing) if note.updated_at > existing.updated_at => {
                    self.repo.put(&note)?;
                    report.imported += 1;
                }
                Some(_) => report.skipped += 1,
                None => {
                    self.repo.put(&note)?;
                    report.imported += 1;
                }
            }
        }

        info!(
            "event=note_import module=service status=ok imported={} skipped={}",
            report.imported, report.skipped
        );
        Ok(report)
    }

    /// Returns the literal current collection, `updated_at` descending.
    pub fn export_all(&self) -> Result<Vec<Note>, NoteServiceError> {
        Ok(self.repo.list_by_updated_desc()?)
    }

    /// Serializes the current collection as the canonical export document.
    pub fn export_json(&self) -> Result<String, NoteServiceError> {
        let notes = self.export_all()?;
        transfer::to_export_json(&notes)
            .map_err(|_| NoteServiceError::InconsistentState("export serialization failed"))
    }
}
