//! User settings and overlay tuning.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Model identifier that lets the remote service pick a model.
pub const AUTO_MODEL: &str = "auto";

/// Default milliseconds spent revealing one character of the result.
pub const DEFAULT_TYPING_SPEED_MS: u64 = 25;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a writing assistant. Rewrite the text the user \
sends so that it is clear, correct and well structured. Keep the original meaning, language \
and tone. Reply with the rewritten text only, without any preamble or quotes.";

/// Persisted user settings.
///
/// The Remote Call Client reads these on every request and never writes them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Credential for the remote service. Never logged.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Milliseconds per revealed character; `0` shows the whole result at once.
    #[serde(default = "default_typing_speed")]
    pub typing_speed_ms: u64,
}

fn default_model() -> String {
    AUTO_MODEL.to_string()
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_typing_speed() -> u64 {
    DEFAULT_TYPING_SPEED_MS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            system_prompt: default_system_prompt(),
            typing_speed_ms: default_typing_speed(),
        }
    }
}

impl Settings {
    /// Returns the API key if one is configured and non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn typing_interval(&self) -> Duration {
        Duration::from_millis(self.typing_speed_ms)
    }

    /// Key rendered for display: first four characters, rest masked.
    pub fn masked_api_key(&self) -> String {
        match self.api_key() {
            Some(key) if key.chars().count() > 8 => {
                let head: String = key.chars().take(4).collect();
                format!("{head}…")
            }
            Some(_) => "****".to_string(),
            None => "(not set)".to_string(),
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("api_key", &self.api_key().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("system_prompt_chars", &self.system_prompt.chars().count())
            .field("typing_speed_ms", &self.typing_speed_ms)
            .finish()
    }
}

/// Overlay and replacement tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Replacements longer than this (in characters) need explicit confirmation.
    pub large_replacement_threshold: usize,
    /// Characters of the new text shown in a confirmation preview.
    pub preview_chars: usize,
    pub toast_duration_ms: u64,
    pub min_width: i32,
    pub min_height: i32,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            large_replacement_threshold: 1000,
            preview_chars: 120,
            toast_duration_ms: 2500,
            min_width: 320,
            min_height: 200,
        }
    }
}

impl OverlayConfig {
    pub fn toast_duration(&self) -> Duration {
        Duration::from_millis(self.toast_duration_ms)
    }
}
