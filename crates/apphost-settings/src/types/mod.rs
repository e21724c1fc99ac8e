//! Settings types.
//!
//! All structs deserialize with `#[serde(default)]`, so a partial user file
//! only needs to name the values it changes.

mod apps;

pub use apps::{AppSettings, LoggingSettings};

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HostSettings {
    /// Application tree settings.
    pub apps: AppSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}
