//! Application settings singleton.
//!
//! At most one instance persists at any time; updates replace the whole
//! record, never merge field-by-field.

use serde::{Deserialize, Serialize};

/// Color theme selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Theme {
    Light,
    Dark,
}

/// Process-wide configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSettings {
    pub theme: Theme,
    pub font_size: u32,
    pub font_family: String,
    pub ai_enabled: bool,
    pub encryption_enabled: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            font_size: 16,
            font_family: "Inter".to_string(),
            ai_enabled: true,
            encryption_enabled: true,
        }
    }
}
