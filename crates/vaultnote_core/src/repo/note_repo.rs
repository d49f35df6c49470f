//! Note record-store contract and SQLite implementation.
//!
//! # Responsibility
//! - Durable keyed CRUD for notes plus the one supported ordering query
//!   (`updated_at` descending).
//! - Persist a note and its version snapshots as one logical record: `put`
//!   replaces the note row and its version rows in a single transaction.
//!
//! # Invariants
//! - `put` validates the note before any SQL mutation.
//! - Snapshot rows are written oldest-first and read back ordered by
//!   `version ASC`.
//! - `delete` is idempotent; removing an unknown id is not an error.

use crate::model::note::{Note, NoteId, NoteVersion};
use crate::repo::{RepoError, RepoResult};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use uuid::Uuid;

const NOTE_SELECT_SQL: &str = "SELECT
    uuid,
    title,
    content,
    created_at,
    updated_at,
    is_pinned,
    is_encrypted,
    encrypted_payload,
    tags,
    ai_summary,
    version
FROM notes";

/// Record-store interface for note persistence.
pub trait NoteRepository {
    /// Inserts or replaces one note together with its version history.
    fn put(&mut self, note: &Note) -> RepoResult<()>;
    /// Gets one note by id, including its version history.
    fn get(&self, id: NoteId) -> RepoResult<Option<Note>>;
    /// Hard-deletes one note. Returns whether a record existed.
    fn delete(&mut self, id: NoteId) -> RepoResult<bool>;
    /// Lists all notes ordered by `updated_at` descending.
    fn list_by_updated_desc(&self) -> RepoResult<Vec<Note>>;
}

/// SQLite-backed note repository.
pub struct SqliteNoteRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteNoteRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl NoteRepository for SqliteNoteRepository<'_> {
    fn put(&mut self, note: &Note) -> RepoResult<()> {
        note.validate()?;

        let tags_json = serde_json::to_string(&note.tags)
            .map_err(|err| RepoError::InvalidData(format!("tags not serializable: {err}")))?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        // REPLACE cascades away the old snapshot rows; they are rewritten
        // below from the in-memory record.
        tx.execute(
            "INSERT OR REPLACE INTO notes (
                uuid,
                title,
                content,
                created_at,
                updated_at,
                is_pinned,
                is_encrypted,
                encrypted_payload,
                tags,
                ai_summary,
                version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11);",
            params![
                note.id.to_string(),
                note.title.as_str(),
                note.content.as_str(),
                note.created_at.timestamp_millis(),
                note.updated_at.timestamp_millis(),
                bool_to_int(note.is_pinned),
                bool_to_int(note.is_encrypted),
                note.encrypted_payload.as_deref(),
                tags_json,
                note.ai_summary.as_deref(),
                note.version,
            ],
        )?;

        for snapshot in &note.versions {
            tx.execute(
                "INSERT INTO note_versions (uuid, note_uuid, content, created_at, version)
                 VALUES (?1, ?2, ?3, ?4, ?5);",
                params![
                    snapshot.id.to_string(),
                    note.id.to_string(),
                    snapshot.content.as_str(),
                    snapshot.created_at.timestamp_millis(),
                    snapshot.version,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn get(&self, id: NoteId) -> RepoResult<Option<Note>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} WHERE uuid = ?1;"))?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            let versions = load_versions(self.conn, id)?;
            return Ok(Some(parse_note_row(row, versions)?));
        }

        Ok(None)
    }

    fn delete(&mut self, id: NoteId) -> RepoResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM notes WHERE uuid = ?1;", [id.to_string()])?;
        Ok(changed > 0)
    }

    fn list_by_updated_desc(&self) -> RepoResult<Vec<Note>> {
        let mut stmt = self.conn.prepare(&format!(
            "{NOTE_SELECT_SQL} ORDER BY updated_at DESC, uuid ASC;"
        ))?;

        let mut rows = stmt.query([])?;
        let mut notes = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get("uuid")?;
            let id = parse_uuid(&uuid_text)?;
            let versions = load_versions(self.conn, id)?;
            notes.push(parse_note_row(row, versions)?);
        }

        Ok(notes)
    }
}

fn load_versions(conn: &Connection, note_id: NoteId) -> RepoResult<Vec<NoteVersion>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, content, created_at, version
         FROM note_versions
         WHERE note_uuid = ?1
         ORDER BY version ASC;",
    )?;

    let mut rows = stmt.query([note_id.to_string()])?;
    let mut versions = Vec::new();
    while let Some(row) = rows.next()? {
        let uuid_text: String = row.get("uuid")?;
        versions.push(NoteVersion {
            id: parse_uuid(&uuid_text)?,
            content: row.get("content")?,
            created_at: parse_millis(row.get("created_at")?, "note_versions.created_at")?,
            version: row.get("version")?,
        });
    }

    Ok(versions)
}

fn parse_note_row(row: &Row<'_>, versions: Vec<NoteVersion>) -> RepoResult<Note> {
    let uuid_text: String = row.get("uuid")?;
    let tags_json: String = row.get("tags")?;
    let tags: Vec<String> = serde_json::from_str(&tags_json).map_err(|_| {
        RepoError::InvalidData(format!("invalid tags value `{tags_json}` in notes.tags"))
    })?;

    let note = Note {
        id: parse_uuid(&uuid_text)?,
        title: row.get("title")?,
        content: row.get("content")?,
        created_at: parse_millis(row.get("created_at")?, "notes.created_at")?,
        updated_at: parse_millis(row.get("updated_at")?, "notes.updated_at")?,
        is_pinned: parse_flag(row.get("is_pinned")?, "notes.is_pinned")?,
        is_encrypted: parse_flag(row.get("is_encrypted")?, "notes.is_encrypted")?,
        encrypted_payload: row.get("encrypted_payload")?,
        tags,
        ai_summary: row.get("ai_summary")?,
        version: row.get("version")?,
        versions,
    };
    note.validate()?;
    Ok(note)
}

fn parse_uuid(value: &str) -> RepoResult<NoteId> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}`")))
}

fn parse_millis(value: i64, column: &str) -> RepoResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(value)
        .single()
        .ok_or_else(|| RepoError::InvalidData(format!("invalid timestamp `{value}` in {column}")))
}

fn parse_flag(value: i64, column: &str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid flag value `{other}` in {column}"
        ))),
    }
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
