//! File-backed storage for settings and the API key.

mod secret_storage;
mod settings_storage;

pub use secret_storage::{SecretFile, SecretStorage, SecretStorageError};
pub use settings_storage::{SettingsFile, SettingsStorage, SettingsStorageError};
