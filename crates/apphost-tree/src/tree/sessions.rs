//! Binding client sessions to applications.

use std::sync::Arc;

use apphost_core::SessionId;
use tracing::{debug, warn};

use super::ApplicationTree;
use crate::errors::{AppError, Result};
use crate::node::NodeId;
use crate::session::{AppBinding, ClientSession};

impl ApplicationTree {
    /// Attach a session to an open node, moving it off any previous node.
    ///
    /// Sessions on the node that were dropped without being unbound are
    /// forgotten first.
    pub fn bind_session(&mut self, id: NodeId, session: &Arc<ClientSession>) -> Result<()> {
        let node = self.get_node(id)?;
        if node.scope.is_none() {
            return Err(AppError::invalid_state(&node.path, "application is not open"));
        }
        let path = node.path.clone();

        let previous = self.sessions.get(&session.id).copied();
        match previous {
            Some(bound) if bound == id => return Ok(()),
            Some(_) => {
                let _ = self.unbind_session(&session.id);
            }
            None => {}
        }

        let node = self.get_node_mut(id)?;
        let mut pruned = Vec::new();
        if let Some(scope) = node.scope.as_mut() {
            pruned = scope.prune_clients();
            scope.add_client(session);
        }
        for dead in &pruned {
            let _ = self.sessions.remove(dead);
        }
        session.attach(AppBinding {
            node: id,
            path: path.clone(),
        });
        let _ = self.sessions.insert(session.id.clone(), id);
        debug!(session_id = %session.id, %path, "session bound");
        Ok(())
    }

    /// Detach a session from whatever node it is bound to.
    pub fn unbind_session(&mut self, session_id: &SessionId) -> Option<NodeId> {
        let node_id = self.sessions.remove(session_id)?;
        let removed = self
            .nodes
            .get_mut(&node_id)
            .and_then(|node| node.scope.as_mut())
            .and_then(|scope| scope.remove_client(session_id));
        if let Some(session) = removed {
            let _ = session.detach();
        }
        debug!(%session_id, node = %node_id, "session unbound");
        Some(node_id)
    }

    /// Resolve `path` and bind the session to the result.
    ///
    /// The empty path routes to the root, which is opened first. On failure
    /// the session is left with no application.
    pub fn route_session(&mut self, path: &str, session: &Arc<ClientSession>) -> Result<NodeId> {
        let routed = self.resolve(path).and_then(|id| {
            if id == self.root {
                self.open(id)?;
            }
            self.bind_session(id, session)?;
            Ok(id)
        });
        if let Err(error) = &routed {
            let _ = self.unbind_session(&session.id);
            let _ = session.detach();
            warn!(session_id = %session.id, path, %error, "session routing failed");
        }
        routed
    }

    /// Node a session is bound to.
    pub fn session_node(&self, session_id: &SessionId) -> Option<NodeId> {
        self.sessions.get(session_id).copied()
    }

    /// Number of bound sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
