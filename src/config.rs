//! Classroom configuration parsed from environment variables.
//!
//! LLM settings live in [`crate::llm::config`]; this covers the rest.

use std::path::PathBuf;

use crate::console::Theme;
use crate::services::auth::TeacherSecret;

pub const DEFAULT_DATA_DIR: &str = "./data";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid {var}: {message}")]
    Invalid { var: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassroomConfig {
    pub teacher_secret: TeacherSecret,
    pub data_dir: PathBuf,
    pub theme: Theme,
}

impl ClassroomConfig {
    /// Build the config from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an unusable value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let teacher_secret = if let Some(digest) = non_empty("THAYDUNG_TEACHER_PASSWORD_SHA256") {
            let digest = digest.trim().to_string();
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::Invalid {
                    var: "THAYDUNG_TEACHER_PASSWORD_SHA256",
                    message: "expected 64 hex characters".into(),
                });
            }
            TeacherSecret::Sha256Hex(digest)
        } else if let Some(plain) = lookup("THAYDUNG_TEACHER_PASSWORD").filter(|v| !v.is_empty()) {
            TeacherSecret::Plain(plain)
        } else {
            TeacherSecret::default()
        };

        let data_dir = non_empty("THAYDUNG_DATA_DIR").map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from);

        let theme = match non_empty("THAYDUNG_THEME") {
            Some(raw) => raw
                .parse()
                .map_err(|message| ConfigError::Invalid { var: "THAYDUNG_THEME", message })?,
            None => Theme::default(),
        };

        Ok(Self { teacher_secret, data_dir, theme })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
