//! Service-handler collaborator.
//!
//! Notified once per successful load and once per close of a loaded
//! application, so outer layers (publication routing, admin views) can track
//! which applications are live.

use serde::Serialize;
use tracing::debug;

use crate::errors::AppError;
use crate::node::NodeId;

/// Identity of an application in notifications.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppInfo {
    /// Node ID.
    pub node: NodeId,
    /// Segment name.
    pub name: String,
    /// Full path.
    pub path: String,
}

/// Receives application lifecycle notifications.
pub trait ServiceHandler: Send + Sync {
    /// The application's entry file ran and `onStart` was invoked.
    fn on_service_started(&self, app: &AppInfo);

    /// The application is being closed.
    fn on_service_stopped(&self, app: &AppInfo);

    /// A lifecycle hook failed. The failure does not stop the transition.
    fn on_hook_failed(&self, _app: &AppInfo, _error: &AppError) {}
}

/// Handler that only logs.
#[derive(Clone, Copy, Debug, Default)]
pub struct LoggingHandler;

impl ServiceHandler for LoggingHandler {
    fn on_service_started(&self, app: &AppInfo) {
        debug!(path = %app.path, "service started");
    }

    fn on_service_stopped(&self, app: &AppInfo) {
        debug!(path = %app.path, "service stopped");
    }
}
