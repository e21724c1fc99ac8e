//! Host-wide defaults shared by settings and the application tree.

/// Minimum interval between two filesystem checks of the same application.
pub const DEFAULT_STALENESS_WINDOW_MS: u64 = 2_000;

/// Name of the script file backing an application directory.
pub const DEFAULT_ENTRY_FILE: &str = "main";

/// Directory (relative to the working directory) holding application folders.
pub const DEFAULT_WWW_DIR: &str = "www";

/// Hook invoked with the application path after a successful load.
pub const HOOK_ON_START: &str = "onStart";

/// Hook invoked with the application path before an application is closed.
pub const HOOK_ON_STOP: &str = "onStop";
