//! Settings use-case service.
//!
//! # Invariants
//! - Absent storage reads resolve to the built-in defaults.
//! - Updates replace the singleton wholesale; there is no field merge.

use crate::model::settings::AppSettings;
use crate::repo::settings_repo::SettingsRepository;
use crate::repo::RepoResult;

/// Settings facade over the singleton store.
pub struct SettingsService<R: SettingsRepository> {
    repo: R,
}

impl<R: SettingsRepository> SettingsService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Returns the stored settings, or defaults when none persist yet.
    pub fn settings(&self) -> RepoResult<AppSettings> {
        Ok(self.repo.settings_get()?.unwrap_or_default())
    }

    /// Replaces the singleton wholesale and returns the new value.
    pub fn replace(&mut self, settings: AppSettings) -> RepoResult<AppSettings> {
        self.repo.settings_replace(&settings)?;
        Ok(settings)
    }
}
