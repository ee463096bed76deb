//! Remote Call Client configuration.

use refine_core::config::AUTO_MODEL;
use std::time::Duration;

/// OpenAI-compatible chat completions endpoint used by default.
pub const DEFAULT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Model sent when the user leaves the model on `auto`.
pub const DEFAULT_AUTO_MODEL: &str = "openrouter/auto";

/// Retry, timeout and cache tuning for [`crate::RewriteClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub endpoint: String,
    pub auto_model: String,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// Upper bound (exclusive) of the random delay added to each backoff.
    pub max_jitter: Duration,
    pub attempt_timeout: Duration,
    pub cache_ttl: Duration,
    pub cache_capacity: usize,
    pub max_text_chars: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            auto_model: DEFAULT_AUTO_MODEL.to_string(),
            max_retries: 3,
            backoff_base: Duration::from_millis(1000),
            backoff_cap: Duration::from_millis(10_000),
            max_jitter: Duration::from_millis(1000),
            attempt_timeout: Duration::from_millis(15_000),
            cache_ttl: Duration::from_secs(5 * 60),
            cache_capacity: 256,
            max_text_chars: 10_000,
        }
    }
}

impl ClientConfig {
    /// Maps the user's model setting to the identifier sent on the wire.
    pub fn resolve_model(&self, model: &str) -> String {
        let model = model.trim();
        if model.is_empty() || model.eq_ignore_ascii_case(AUTO_MODEL) {
            self.auto_model.clone()
        } else {
            model.to_string()
        }
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}
