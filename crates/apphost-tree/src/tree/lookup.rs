//! Property resolution across the scope chain.

use serde_json::Value;
use tracing::warn;

use super::ApplicationTree;
use crate::data::DataHandle;
use crate::engine::HostScope;
use crate::errors::{AppError, Result};
use crate::node::NodeId;
use crate::path;
use crate::property::{ChildScope, Property, ScopeRef};

impl ApplicationTree {
    /// Look `key` up on a node's scope, then on each `super` up to the
    /// globals.
    ///
    /// Only hits on the node's own scope are memoized there; a value
    /// inherited from an ancestor is looked up again next time.
    pub fn get_property(&mut self, id: NodeId, key: &str) -> Result<Option<Property>> {
        let node = self.get_node(id)?;
        if node.scope.is_none() {
            return Err(AppError::invalid_state(&node.path, "application is not open"));
        }

        let mut current = ScopeRef::Node(id);
        loop {
            let node_id = match current {
                ScopeRef::Global => return Ok(self.globals.get(key).cloned().map(Property::Value)),
                ScopeRef::Node(node_id) => node_id,
            };
            let data = &self.data;
            let node = self
                .nodes
                .get_mut(&node_id)
                .ok_or(AppError::UnknownNode(node_id))?;
            let Some(scope) = node.scope.as_mut() else {
                return Err(AppError::invalid_state(&node.path, "ancestor scope is not open"));
            };
            if let Some(property) = scope.lookup_local(key, data) {
                return Ok(Some(property));
            }
            current = scope.parent();
        }
    }

    /// Set an application entry on a node's own scope.
    pub fn set_property(&mut self, id: NodeId, key: &str, value: Value) -> Result<()> {
        let node = self.get_node_mut(id)?;
        let Some(scope) = node.scope.as_mut() else {
            return Err(AppError::invalid_state(&node.path, "application is not open"));
        };
        scope.set_entry(key, value);
        Ok(())
    }

    /// Remove an application entry from a node's own scope.
    pub fn remove_property(&mut self, id: NodeId, key: &str) -> Result<Option<Value>> {
        let node = self.get_node_mut(id)?;
        let Some(scope) = node.scope.as_mut() else {
            return Err(AppError::invalid_state(&node.path, "application is not open"));
        };
        Ok(scope.remove_entry(key))
    }

    /// The node's data table, created on demand.
    pub fn data(&self, id: NodeId) -> Result<DataHandle> {
        Ok(self.data.subtree(&self.get_node(id)?.path))
    }

    /// Open child scopes of a node. Empty when the node is not open.
    pub fn children_of(&self, id: NodeId) -> Result<Vec<ChildScope>> {
        Ok(self
            .get_node(id)?
            .scope
            .as_ref()
            .map(|scope| scope.children())
            .unwrap_or_default())
    }

    /// Resolve the direct child `name` of a node, opening it.
    pub fn child(&mut self, id: NodeId, name: &str) -> Result<NodeId> {
        let parent_path = self.get_node(id)?.path.clone();
        let child_path = path::join(&parent_path, name);
        if !path::is_valid_segment(name) {
            return Err(AppError::NotFound { path: child_path });
        }
        self.resolve(&child_path)
    }
}

/// Host view of one scope, handed to the engine while a file runs.
pub struct ScopeCursor<'a> {
    tree: &'a mut ApplicationTree,
    node: NodeId,
}

impl<'a> ScopeCursor<'a> {
    /// View `node` through `tree`.
    pub fn new(tree: &'a mut ApplicationTree, node: NodeId) -> Self {
        Self { tree, node }
    }
}

impl HostScope for ScopeCursor<'_> {
    fn node(&self) -> NodeId {
        self.node
    }

    fn path(&self) -> String {
        self.tree
            .node(self.node)
            .map(|node| node.path().to_owned())
            .unwrap_or_default()
    }

    fn get(&mut self, key: &str) -> Option<Property> {
        match self.tree.get_property(self.node, key) {
            Ok(property) => property,
            Err(error) => {
                warn!(node = %self.node, key, %error, "property lookup failed");
                None
            }
        }
    }

    fn set(&mut self, key: &str, value: Value) {
        if let Err(error) = self.tree.set_property(self.node, key, value) {
            warn!(node = %self.node, key, %error, "property update failed");
        }
    }

    fn children(&self) -> Vec<ChildScope> {
        self.tree.children_of(self.node).unwrap_or_default()
    }

    fn data(&mut self) -> DataHandle {
        let path = self.path();
        self.tree.data_store().subtree(&path)
    }

    fn child(&mut self, name: &str) -> Result<NodeId> {
        self.tree.child(self.node, name)
    }
}
