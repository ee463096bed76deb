//! Settings service trait.
//!
//! Defines the read-only interface the background context uses to fetch the
//! user's settings and credential before every remote call.

use crate::config::Settings;
use crate::error::Result;

/// Source of persisted settings.
///
/// # Security Note
///
/// Implementations must never log the API key or include it in error messages.
#[async_trait::async_trait]
pub trait SettingsService: Send + Sync {
    /// Loads the current settings, falling back to defaults for anything unset.
    async fn load(&self) -> Result<Settings>;
}

/// Fixed settings, for tests and for the headless CLI mode.
#[derive(Debug, Clone, Default)]
pub struct StaticSettings(pub Settings);

#[async_trait::async_trait]
impl SettingsService for StaticSettings {
    async fn load(&self) -> Result<Settings> {
        Ok(self.0.clone())
    }
}
