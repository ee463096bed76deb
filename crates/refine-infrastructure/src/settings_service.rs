//! File-backed [`SettingsService`].

use crate::paths::RefinePaths;
use crate::storage::{SecretStorage, SecretStorageError, SettingsStorage};
use refine_core::config::Settings;
use refine_core::error::{RefineError, Result};
use refine_core::settings::SettingsService;

pub const API_KEY_ENV: &str = "REFINE_API_KEY";
pub const MODEL_ENV: &str = "REFINE_MODEL";

/// Values from the environment that win over the files.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            api_key: non_empty_var(API_KEY_ENV),
            model: non_empty_var(MODEL_ENV),
        }
    }
}

impl std::fmt::Debug for EnvOverrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvOverrides")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .finish()
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Reads settings.toml and secret.json on every `load`, so edits take effect
/// on the next request.
pub struct FileSettingsService {
    settings: SettingsStorage,
    secret: SecretStorage,
    env: EnvOverrides,
}

impl FileSettingsService {
    pub fn new(paths: &RefinePaths, env: EnvOverrides) -> Result<Self> {
        let settings_path = paths
            .settings_file()
            .map_err(|e| RefineError::config(format!("Failed to get settings path: {}", e)))?;
        let secret_path = paths
            .secret_file()
            .map_err(|e| RefineError::config(format!("Failed to get secret path: {}", e)))?;

        Ok(Self {
            settings: SettingsStorage::with_path(settings_path),
            secret: SecretStorage::with_path(secret_path),
            env,
        })
    }

    /// Platform config directory plus the process environment.
    pub fn from_default_location() -> Result<Self> {
        Self::new(&RefinePaths::default(), EnvOverrides::from_env())
    }

    fn load_sync(&self) -> Result<Settings> {
        let mut settings = Settings::default();

        let file = self.settings.load().map_err(|e| {
            RefineError::config(format!(
                "Failed to read {}: {}",
                self.settings.path().display(),
                e
            ))
        })?;
        if let Some(file) = file {
            if let Some(model) = file.model {
                settings.model = model;
            }
            if let Some(system_prompt) = file.system_prompt {
                settings.system_prompt = system_prompt;
            }
            if let Some(typing_speed_ms) = file.typing_speed_ms {
                settings.typing_speed_ms = typing_speed_ms;
            }
        } else {
            tracing::debug!(
                "[Settings] No settings file at {}, using defaults",
                self.settings.path().display()
            );
        }

        match self.secret.load() {
            Ok(secret) => settings.api_key = secret.api_key,
            Err(SecretStorageError::NotFound(path)) => {
                tracing::debug!("[Settings] No secret file at {}", path.display());
            }
            Err(e) => {
                return Err(RefineError::config(format!(
                    "Failed to read {}: {}",
                    self.secret.path().display(),
                    e
                )));
            }
        }

        if let Some(api_key) = &self.env.api_key {
            settings.api_key = Some(api_key.clone());
        }
        if let Some(model) = &self.env.model {
            settings.model = model.clone();
        }

        Ok(settings)
    }
}

#[async_trait::async_trait]
impl SettingsService for FileSettingsService {
    async fn load(&self) -> Result<Settings> {
        self.load_sync()
    }
}
