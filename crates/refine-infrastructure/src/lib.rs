//! Filesystem-backed settings for Refine.

pub mod paths;
pub mod settings_service;
pub mod storage;

pub use crate::paths::RefinePaths;
pub use crate::settings_service::{EnvOverrides, FileSettingsService};
