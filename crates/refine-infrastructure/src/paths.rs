//! Path resolution for Refine's settings files.

use std::path::{Path, PathBuf};

const APP_DIR: &str = "refine";
const SETTINGS_FILE: &str = "settings.toml";
const SECRET_FILE: &str = "secret.json";

/// Errors that can occur during path resolution.
#[derive(Debug)]
pub enum PathError {
    /// The platform config directory could not be determined.
    ConfigDirNotFound,
}

impl std::fmt::Display for PathError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathError::ConfigDirNotFound => write!(f, "Cannot find config directory"),
        }
    }
}

impl std::error::Error for PathError {}

/// Locates Refine's files.
///
/// ```text
/// <config_dir>/refine/
/// ├── settings.toml    # model, system prompt, typing speed
/// └── secret.json      # {"api_key": "..."}
/// ```
///
/// `<config_dir>` is the platform config directory from `dirs`, or the base
/// path given to [`RefinePaths::new`].
#[derive(Debug, Clone)]
pub struct RefinePaths {
    base: Option<PathBuf>,
}

impl RefinePaths {
    pub fn new(base_path: Option<&Path>) -> Self {
        Self {
            base: base_path.map(Path::to_path_buf),
        }
    }

    pub fn config_dir(&self) -> Result<PathBuf, PathError> {
        let root = match &self.base {
            Some(base) => base.clone(),
            None => dirs::config_dir().ok_or(PathError::ConfigDirNotFound)?,
        };
        Ok(root.join(APP_DIR))
    }

    pub fn settings_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join(SETTINGS_FILE))
    }

    /// # Security Note
    ///
    /// The file holds the API key in plaintext; keep it at mode 600.
    pub fn secret_file(&self) -> Result<PathBuf, PathError> {
        Ok(self.config_dir()?.join(SECRET_FILE))
    }
}

impl Default for RefinePaths {
    fn default() -> Self {
        Self::new(None)
    }
}
