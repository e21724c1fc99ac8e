//! Per-application execution scope.
//!
//! A scope answers lookups for the keys it owns: application entries,
//! memoized bindings, the special `data` key, and its structural fields.
//! Anything else is delegated to its `super` scope by the tree, which owns
//! the chain (see [`ApplicationTree::get_property`]).
//!
//! [`ApplicationTree::get_property`]: crate::tree::ApplicationTree::get_property

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Weak};

use apphost_core::SessionId;
use serde_json::Value;
use tracing::debug;

use crate::data::{DataHandle, DataStore};
use crate::engine::ScopeHandle;
use crate::node::NodeId;
use crate::property::{ChildScope, DATA_KEY, Property, ScopeRef, StructuralKey};
use crate::session::ClientSession;

/// Memoized binding of a key found directly on a scope.
#[derive(Clone, Debug)]
enum Memo {
    Structural(StructuralKey),
    Data(DataHandle),
}

/// The execution scope of one application.
#[derive(Debug)]
pub struct ScopeEnvironment {
    name: String,
    path: String,
    parent: ScopeRef,
    this: NodeId,
    identity: Option<ScopeHandle>,
    children: BTreeMap<String, NodeId>,
    clients: BTreeMap<SessionId, Weak<ClientSession>>,
    entries: HashMap<String, Value>,
    cache: HashMap<String, Memo>,
}

impl ScopeEnvironment {
    pub(crate) fn new(name: &str, path: &str, parent: ScopeRef, this: NodeId) -> Self {
        Self {
            name: name.to_owned(),
            path: path.to_owned(),
            parent,
            this,
            identity: None,
            children: BTreeMap::new(),
            clients: BTreeMap::new(),
            entries: HashMap::new(),
            cache: HashMap::new(),
        }
    }

    /// Application name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Application path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The `super` scope.
    pub fn parent(&self) -> ScopeRef {
        self.parent
    }

    /// Node owning this scope (`this`).
    pub fn this(&self) -> NodeId {
        self.this
    }

    /// Engine identity, if bound.
    pub fn identity(&self) -> Option<&ScopeHandle> {
        self.identity.as_ref()
    }

    /// Realized child scopes, ordered by name.
    pub fn children(&self) -> Vec<ChildScope> {
        self.children
            .iter()
            .map(|(name, node)| ChildScope {
                name: name.clone(),
                node: *node,
            })
            .collect()
    }

    /// IDs of bound sessions that are still alive.
    pub fn client_ids(&self) -> Vec<SessionId> {
        self.clients
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Number of bound sessions that are still alive.
    pub fn client_count(&self) -> usize {
        self.clients
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Application entry defined on this scope.
    pub fn entry(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Number of application entries.
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of memoized bindings.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Bind `identity`, replacing the current one.
    ///
    /// Binding the identity already held is a no-op and returns `None`.
    /// Otherwise every bound session is invalidated before the previous
    /// identity is dropped, and their IDs are returned.
    pub fn set_identity(&mut self, identity: Option<ScopeHandle>) -> Option<Vec<SessionId>> {
        let unchanged = match (&self.identity, &identity) {
            (Some(current), Some(next)) => current.same_identity(next),
            (None, None) => true,
            _ => false,
        };
        if unchanged {
            return None;
        }
        let invalidated = self.invalidate_clients();
        let previous = std::mem::replace(&mut self.identity, identity);
        if let Some(previous) = &previous {
            debug!(path = %self.path, scope = previous.id().raw(), "scope identity replaced");
        }
        drop(previous);
        Some(invalidated)
    }

    pub(crate) fn add_client(&mut self, session: &Arc<ClientSession>) {
        let _ = self
            .clients
            .insert(session.id.clone(), Arc::downgrade(session));
    }

    /// Forget sessions whose owner dropped them without unbinding.
    pub(crate) fn prune_clients(&mut self) -> Vec<SessionId> {
        let dead: Vec<SessionId> = self
            .clients
            .iter()
            .filter(|(_, weak)| weak.strong_count() == 0)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &dead {
            let _ = self.clients.remove(id);
        }
        dead
    }

    pub(crate) fn remove_client(&mut self, id: &SessionId) -> Option<Arc<ClientSession>> {
        self.clients.remove(id).and_then(|weak| weak.upgrade())
    }

    /// Clear the application pointer of every bound session.
    pub(crate) fn invalidate_clients(&mut self) -> Vec<SessionId> {
        let clients = std::mem::take(&mut self.clients);
        clients
            .into_iter()
            .map(|(id, weak)| {
                if let Some(session) = weak.upgrade() {
                    session.invalidate();
                }
                id
            })
            .collect()
    }

    pub(crate) fn register_child(&mut self, name: &str, node: NodeId) {
        let _ = self.children.insert(name.to_owned(), node);
    }

    pub(crate) fn unregister_child(&mut self, name: &str) {
        let _ = self.children.remove(name);
    }

    pub(crate) fn set_entry(&mut self, key: &str, value: Value) {
        let _ = self.cache.remove(key);
        let _ = self.entries.insert(key.to_owned(), value);
    }

    pub(crate) fn remove_entry(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Wipe application entries and memoized bindings.
    pub(crate) fn reset_entries(&mut self) {
        self.entries.clear();
        self.cache.clear();
    }

    /// Resolve `key` on this scope only, memoizing structural hits.
    pub(crate) fn lookup_local(&mut self, key: &str, data: &DataStore) -> Option<Property> {
        if let Some(value) = self.entries.get(key) {
            return Some(Property::Value(value.clone()));
        }
        if let Some(memo) = self.cache.get(key) {
            return Some(self.resolve_memo(memo));
        }
        let memo = if key == DATA_KEY {
            Memo::Data(data.subtree(&self.path))
        } else {
            Memo::Structural(StructuralKey::parse(key)?)
        };
        let property = self.resolve_memo(&memo);
        let _ = self.cache.insert(key.to_owned(), memo);
        Some(property)
    }

    fn resolve_memo(&self, memo: &Memo) -> Property {
        match memo {
            Memo::Data(handle) => Property::Data(Arc::clone(handle)),
            Memo::Structural(key) => self.structural(*key),
        }
    }

    fn structural(&self, key: StructuralKey) -> Property {
        match key {
            StructuralKey::Super => Property::Scope(self.parent),
            StructuralKey::This => Property::Scope(ScopeRef::Node(self.this)),
            StructuralKey::Name => Property::Value(Value::String(self.name.clone())),
            StructuralKey::Path => Property::Value(Value::String(self.path.clone())),
            StructuralKey::Children => Property::Children(self.children()),
            StructuralKey::Clients => Property::Clients(self.client_ids()),
        }
    }
}
