//! # apphost-settings
//!
//! Configuration management with layered sources for the application host.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`HostSettings::default()`]
//! 2. **User file**: `~/.apphost/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `APPHOST_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use apphost_settings::get_settings;
//!
//! let settings = get_settings();
//! println!("applications served from: {}", settings.apps.www_dir);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
///
/// Initialized on first access via [`get_settings`].
static SETTINGS: OnceLock<HostSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads settings from `~/.apphost/settings.json` with env var
/// overrides. If loading fails, returns compiled defaults.
pub fn get_settings() -> &'static HostSettings {
    SETTINGS.get_or_init(|| load_settings().unwrap_or_default())
}

/// Initialize the global settings with a specific value.
///
/// Returns the provided settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: HostSettings) -> std::result::Result<(), HostSettings> {
    SETTINGS.set(settings)
}
