//! Values produced by the scope lookup protocol.

use std::sync::Arc;

use apphost_core::SessionId;
use serde::Serialize;
use serde_json::Value;

use crate::data::DataHandle;
use crate::node::NodeId;

/// Key resolved to the application's slice of the data store.
pub const DATA_KEY: &str = "data";

/// Fields every scope exposes before falling back to its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StructuralKey {
    /// The parent scope (`super`).
    Super,
    /// Realized child scopes.
    Children,
    /// Application path.
    Path,
    /// Application name.
    Name,
    /// The scope itself (`this`).
    This,
    /// Bound client sessions.
    Clients,
}

impl StructuralKey {
    /// All structural keys.
    pub const ALL: [Self; 6] = [
        Self::Super,
        Self::Children,
        Self::Path,
        Self::Name,
        Self::This,
        Self::Clients,
    ];

    /// Recognize a structural key.
    pub fn parse(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == key)
    }

    /// The key as seen by application code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Super => "super",
            Self::Children => "children",
            Self::Path => "path",
            Self::Name => "name",
            Self::This => "this",
            Self::Clients => "clients",
        }
    }
}

/// Reference to a scope: an application's or the global one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScopeRef {
    /// The tree's global scope, end of every `super` chain.
    Global,
    /// The scope owned by a node.
    Node(NodeId),
}

/// A realized child scope, as listed by `children`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChildScope {
    /// Child name.
    pub name: String,
    /// Child node.
    pub node: NodeId,
}

/// Result of a property lookup.
#[derive(Clone, Debug)]
pub enum Property {
    /// Plain value (application entries, globals, `name`, `path`).
    Value(Value),
    /// A scope (`super`, `this`).
    Scope(ScopeRef),
    /// Realized children.
    Children(Vec<ChildScope>),
    /// Bound sessions.
    Clients(Vec<SessionId>),
    /// The application's data table.
    Data(DataHandle),
}

impl Property {
    /// The plain value, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The plain value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    /// The referenced scope, if this is one.
    pub fn as_scope(&self) -> Option<ScopeRef> {
        match self {
            Self::Scope(s) => Some(*s),
            _ => None,
        }
    }

    /// The data table, if this is one.
    pub fn as_data(&self) -> Option<&DataHandle> {
        match self {
            Self::Data(d) => Some(d),
            _ => None,
        }
    }
}

impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Scope(a), Self::Scope(b)) => a == b,
            (Self::Children(a), Self::Children(b)) => a == b,
            (Self::Clients(a), Self::Clients(b)) => a == b,
            (Self::Data(a), Self::Data(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<Value> for Property {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}
