//! Record-store abstractions and SQLite implementations.
//!
//! # Responsibility
//! - Define keyed persistence contracts for notes and settings.
//! - Isolate SQL details from service/business orchestration.
//!
//! # Invariants
//! - Write paths must enforce `Note::validate()` before SQL mutations.
//! - Read paths must reject invalid persisted state instead of masking it.

use crate::db::DbError;
use crate::model::note::NoteValidationError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod note_repo;
pub mod settings_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Generic record-store error for persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(NoteValidationError),
    Db(DbError),
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<NoteValidationError> for RepoError {
    fn from(value: NoteValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}
