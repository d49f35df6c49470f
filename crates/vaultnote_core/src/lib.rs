//! Core domain logic for VaultNote.
//! This crate is the single source of truth for business invariants:
//! note/version lifecycle, per-note password encryption, and throttled
//! access to the external text-inference service.

pub mod crypto;
pub mod db;
pub mod gateway;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use crypto::{CryptoError, CryptoResult};
pub use gateway::glossary::{glossary_terms, GlossaryTerm};
pub use gateway::transport::{CompletionTransport, GatewayConfig, HttpTransport};
pub use gateway::{GatewayError, GatewayResult, GrammarSuggestion, InferenceGateway, OpCategory};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::note::{Note, NoteId, NoteValidationError, NoteVersion};
pub use model::settings::{AppSettings, Theme};
pub use repo::note_repo::{NoteRepository, SqliteNoteRepository};
pub use repo::settings_repo::{SettingsRepository, SqliteSettingsRepository};
pub use repo::{RepoError, RepoResult};
pub use service::note_service::{NoteService, NoteServiceError, NoteUpdate};
pub use service::settings_service::SettingsService;
pub use service::transfer::ImportReport;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
