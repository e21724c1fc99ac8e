//! Script-engine collaborator.
//!
//! The tree never interprets application code. It asks a [`ScriptEngine`]
//! for scope identities, runs entry files inside them, and calls lifecycle
//! hooks. Identities are wrapped in [`ScopeHandle`], which releases the
//! engine-side scope when the last clone is dropped.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::data::DataHandle;
use crate::errors::{Result as AppResult, ScriptError};
use crate::node::NodeId;
use crate::property::{ChildScope, Property};

/// Engine-side registry token for a scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EngineScopeId(u64);

impl EngineScopeId {
    /// Wrap a raw token.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw token.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Host surface offered to application code while it runs.
///
/// Lookups go through the same inheritance protocol as
/// [`ApplicationTree::get_property`](crate::tree::ApplicationTree::get_property).
/// Opening the application that is currently loading is refused with
/// [`AppError::InvalidState`](crate::errors::AppError::InvalidState).
pub trait HostScope {
    /// Node whose scope is running.
    fn node(&self) -> NodeId;

    /// Path of that node.
    fn path(&self) -> String;

    /// Resolve `key` through the scope chain.
    fn get(&mut self, key: &str) -> Option<Property>;

    /// Define an application entry on the running scope.
    fn set(&mut self, key: &str, value: Value);

    /// Realized child scopes.
    fn children(&self) -> Vec<ChildScope>;

    /// The application's data table.
    fn data(&mut self) -> DataHandle;

    /// Open the child application `name`.
    fn child(&mut self, name: &str) -> AppResult<NodeId>;
}

/// The embedded script engine.
pub trait ScriptEngine: Send + Sync {
    /// Allocate a fresh scope identity.
    fn new_scope(&self, name: &str, path: &str) -> Result<EngineScopeId, ScriptError>;

    /// Release an identity. Called exactly once per allocated identity.
    fn release_scope(&self, scope: EngineScopeId);

    /// Compile and execute `file` inside `scope`.
    fn run_file(
        &self,
        scope: EngineScopeId,
        file: &Path,
        host: &mut dyn HostScope,
    ) -> Result<(), ScriptError>;

    /// Call `hook` defined in `scope`. An undefined hook is not an error.
    fn call_hook(&self, scope: EngineScopeId, hook: &str, args: &[&str])
    -> Result<(), ScriptError>;

    /// Forget everything application code defined in `scope`.
    fn clear_scope(&self, _scope: EngineScopeId) {}

    /// Reclaim unreachable engine objects.
    fn collect_garbage(&self) {}
}

struct HandleInner {
    id: EngineScopeId,
    engine: Arc<dyn ScriptEngine>,
}

impl Drop for HandleInner {
    fn drop(&mut self) {
        self.engine.release_scope(self.id);
    }
}

/// Reference-counted scope identity.
///
/// Cloning shares the identity; the engine scope is released when the last
/// clone is dropped.
#[derive(Clone)]
pub struct ScopeHandle {
    inner: Arc<HandleInner>,
}

impl ScopeHandle {
    /// Ask `engine` for a new identity.
    pub fn allocate(
        engine: &Arc<dyn ScriptEngine>,
        name: &str,
        path: &str,
    ) -> Result<Self, ScriptError> {
        let id = engine.new_scope(name, path)?;
        Ok(Self {
            inner: Arc::new(HandleInner {
                id,
                engine: Arc::clone(engine),
            }),
        })
    }

    /// Engine token.
    pub fn id(&self) -> EngineScopeId {
        self.inner.id
    }

    /// Number of live clones.
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Whether both handles refer to the same identity.
    pub fn same_identity(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for ScopeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopeHandle")
            .field("id", &self.inner.id)
            .field("holders", &self.holders())
            .finish()
    }
}
