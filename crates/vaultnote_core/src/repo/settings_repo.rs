//! Settings singleton store contract and SQLite implementation.
//!
//! # Invariants
//! - At most one settings row exists at any time.
//! - `settings_replace` clears and re-inserts in a single transaction; the
//!   record is never merged field-by-field.

use crate::model::settings::{AppSettings, Theme};
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, TransactionBehavior};

/// Record-store interface for the settings singleton.
pub trait SettingsRepository {
    fn settings_get(&self) -> RepoResult<Option<AppSettings>>;
    fn settings_replace(&mut self, settings: &AppSettings) -> RepoResult<()>;
}

/// SQLite-backed settings repository.
pub struct SqliteSettingsRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteSettingsRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn new(conn: &'conn mut Connection) -> Self {
        Self { conn }
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn settings_get(&self) -> RepoResult<Option<AppSettings>> {
        let mut stmt = self.conn.prepare(
            "SELECT theme, font_size, font_family, ai_enabled, encryption_enabled
             FROM app_settings
             WHERE id = 1;",
        )?;

        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            let theme_text: String = row.get("theme")?;
            let theme = parse_theme(&theme_text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid theme value `{theme_text}` in app_settings.theme"
                ))
            })?;
            return Ok(Some(AppSettings {
                theme,
                font_size: row.get("font_size")?,
                font_family: row.get("font_family")?,
                ai_enabled: row.get::<_, i64>("ai_enabled")? != 0,
                encryption_enabled: row.get::<_, i64>("encryption_enabled")? != 0,
            }));
        }

        Ok(None)
    }

    fn settings_replace(&mut self, settings: &AppSettings) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute("DELETE FROM app_settings;", [])?;
        tx.execute(
            "INSERT INTO app_settings (id, theme, font_size, font_family, ai_enabled, encryption_enabled)
             VALUES (1, ?1, ?2, ?3, ?4, ?5);",
            params![
                theme_to_db(settings.theme),
                settings.font_size,
                settings.font_family.as_str(),
                settings.ai_enabled as i64,
                settings.encryption_enabled as i64,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}

fn theme_to_db(theme: Theme) -> &'static str {
    match theme {
        Theme::Light => "light",
        Theme::Dark => "dark",
    }
}

fn parse_theme(value: &str) -> Option<Theme> {
    match value {
        "light" => Some(Theme::Light),
        "dark" => Some(Theme::Dark),
        _ => None,
    }
}
