//! Application tree and logging settings.

use apphost_core::constants::{DEFAULT_ENTRY_FILE, DEFAULT_STALENESS_WINDOW_MS, DEFAULT_WWW_DIR};
use serde::{Deserialize, Serialize};

/// Where applications live on disk and how often they are re-checked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    /// Directory whose sub-directories back the application tree.
    pub www_dir: String,
    /// Script file name inside each application directory.
    pub entry_file: String,
    /// Minimum milliseconds between filesystem checks of one application.
    pub staleness_window_ms: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            www_dir: DEFAULT_WWW_DIR.to_string(),
            entry_file: DEFAULT_ENTRY_FILE.to_string(),
            staleness_window_ms: DEFAULT_STALENESS_WINDOW_MS,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level passed to the subscriber filter.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
