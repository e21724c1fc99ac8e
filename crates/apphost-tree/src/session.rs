//! Client sessions as seen by the application tree.
//!
//! Sessions are owned by the transport layer. The tree only keeps weak
//! references to them and clears their application pointer whenever the
//! scope they were routed to is destroyed or reset.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use apphost_core::SessionId;
use parking_lot::Mutex;
use serde::Serialize;

use crate::node::NodeId;

/// The application a session is currently routed to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AppBinding {
    /// Node the session is attached to.
    pub node: NodeId,
    /// Path of that node at bind time.
    pub path: String,
}

/// A connected client, owned outside the tree.
#[derive(Debug)]
pub struct ClientSession {
    /// Unique session ID.
    pub id: SessionId,
    /// Bound application (set on routing, cleared on invalidation).
    application: Mutex<Option<AppBinding>>,
    /// When this session was established.
    pub connected_at: Instant,
    /// How many times the tree cleared this session's application.
    invalidations: AtomicU64,
}

impl ClientSession {
    /// Create an unbound session.
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            application: Mutex::new(None),
            connected_at: Instant::now(),
            invalidations: AtomicU64::new(0),
        }
    }

    /// The application this session is routed to, if any.
    pub fn application(&self) -> Option<AppBinding> {
        self.application.lock().clone()
    }

    /// Whether the session currently points at an application.
    pub fn is_bound(&self) -> bool {
        self.application.lock().is_some()
    }

    /// Number of invalidations performed by the tree.
    pub fn invalidation_count(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    /// Session age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    pub(crate) fn attach(&self, binding: AppBinding) {
        *self.application.lock() = Some(binding);
    }

    /// Clear the application pointer without counting an invalidation.
    pub(crate) fn detach(&self) -> Option<AppBinding> {
        self.application.lock().take()
    }

    /// Clear the application pointer because its scope is going away.
    pub(crate) fn invalidate(&self) {
        if self.detach().is_some() {
            let _ = self.invalidations.fetch_add(1, Ordering::Relaxed);
        }
    }
}
