//! `settings.toml` storage.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Errors that can occur while reading settings.toml.
#[derive(Debug)]
pub enum SettingsStorageError {
    /// File I/O error.
    IoError(std::io::Error),
    /// TOML parsing error.
    TomlParseError(toml::de::Error),
}

impl std::fmt::Display for SettingsStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsStorageError::IoError(e) => write!(f, "I/O error: {}", e),
            SettingsStorageError::TomlParseError(e) => write!(f, "TOML parse error: {}", e),
        }
    }
}

impl std::error::Error for SettingsStorageError {}

impl From<std::io::Error> for SettingsStorageError {
    fn from(e: std::io::Error) -> Self {
        SettingsStorageError::IoError(e)
    }
}

impl From<toml::de::Error> for SettingsStorageError {
    fn from(e: toml::de::Error) -> Self {
        SettingsStorageError::TomlParseError(e)
    }
}

/// On-disk shape of settings.toml. Every field is optional; unset fields
/// fall back to the built-in defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typing_speed_ms: Option<u64>,
}

/// Read-only access to settings.toml.
pub struct SettingsStorage {
    path: PathBuf,
}

impl SettingsStorage {
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns `Ok(None)` when the file is missing or blank.
    pub fn load(&self) -> Result<Option<SettingsFile>, SettingsStorageError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        Ok(Some(toml::from_str(&content)?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
