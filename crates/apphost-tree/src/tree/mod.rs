//! The application tree.
//!
//! Nodes live in an ID-keyed arena. A parent owns its children through its
//! `children` map; a child only records its parent's [`NodeId`], which is
//! never dereferenced once the parent is gone because children are always
//! removed first.
//!
//! All mutations take `&mut self`. Hosts whose transport threads resolve
//! concurrently wrap the tree in a [`SharedTree`] and hold the lock for the
//! whole resolve/open/close call.

mod lifecycle;
mod lookup;
mod sessions;

pub use lookup::ScopeCursor;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use apphost_core::SessionId;
use apphost_core::constants::{DEFAULT_ENTRY_FILE, DEFAULT_STALENESS_WINDOW_MS, DEFAULT_WWW_DIR};
use apphost_settings::HostSettings;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::debug;

use crate::data::DataStore;
use crate::engine::{ScopeHandle, ScriptEngine};
use crate::errors::{AppError, Result};
use crate::handler::{AppInfo, LoggingHandler, ServiceHandler};
use crate::node::{AppStatus, ApplicationNode, NodeId};
use crate::path;
use crate::watch::{FileProbe, LocalFs};

/// A tree shared between transport threads.
pub type SharedTree = Arc<Mutex<ApplicationTree>>;

/// Where applications live and how often they are re-checked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeConfig {
    /// Directory backing the root application.
    pub www_dir: PathBuf,
    /// Script file name inside each application directory.
    pub entry_file: String,
    /// Minimum interval between filesystem checks of one node.
    pub staleness_window: Duration,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            www_dir: PathBuf::from(DEFAULT_WWW_DIR),
            entry_file: DEFAULT_ENTRY_FILE.to_owned(),
            staleness_window: Duration::from_millis(DEFAULT_STALENESS_WINDOW_MS),
        }
    }
}

impl TreeConfig {
    /// Defaults rooted at `www_dir`.
    pub fn new(www_dir: impl Into<PathBuf>) -> Self {
        Self {
            www_dir: www_dir.into(),
            ..Self::default()
        }
    }

    /// Build from loaded settings.
    pub fn from_settings(settings: &HostSettings) -> Self {
        let apps = &settings.apps;
        Self {
            www_dir: PathBuf::from(&apps.www_dir),
            entry_file: apps.entry_file.clone(),
            staleness_window: Duration::from_millis(apps.staleness_window_ms),
        }
    }

    /// Override the entry file name.
    #[must_use]
    pub fn with_entry_file(mut self, entry_file: impl Into<String>) -> Self {
        self.entry_file = entry_file.into();
        self
    }

    /// Override the staleness window.
    #[must_use]
    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    /// Entry file backing the application at `app_path`.
    pub fn entry_file_for(&self, app_path: &str) -> PathBuf {
        let mut file = self.www_dir.clone();
        for segment in path::segments(app_path) {
            file.push(segment);
        }
        file.push(&self.entry_file);
        file
    }
}

/// Root node plus the orchestration other subsystems call.
pub struct ApplicationTree {
    config: TreeConfig,
    engine: Arc<dyn ScriptEngine>,
    fs: Arc<dyn FileProbe>,
    handler: Arc<dyn ServiceHandler>,
    nodes: HashMap<NodeId, ApplicationNode>,
    root: NodeId,
    next_id: u64,
    globals: HashMap<String, Value>,
    data: DataStore,
    sessions: HashMap<SessionId, NodeId>,
    /// Nodes whose entry file is executing, innermost last.
    loading: Vec<NodeId>,
}

impl ApplicationTree {
    /// Create a tree holding only the (unopened) root node.
    pub fn new(
        config: TreeConfig,
        engine: Arc<dyn ScriptEngine>,
        fs: Arc<dyn FileProbe>,
        handler: Arc<dyn ServiceHandler>,
    ) -> Self {
        let root = NodeId::from_raw(0);
        let root_node = ApplicationNode::new(
            String::new(),
            String::new(),
            None,
            config.entry_file_for(""),
        );
        let mut nodes = HashMap::new();
        let _ = nodes.insert(root, root_node);
        Self {
            config,
            engine,
            fs,
            handler,
            nodes,
            root,
            next_id: 1,
            globals: HashMap::new(),
            data: DataStore::new(),
            sessions: HashMap::new(),
            loading: Vec::new(),
        }
    }

    /// Tree over the local filesystem with a logging-only service handler.
    pub fn with_local_fs(config: TreeConfig, engine: Arc<dyn ScriptEngine>) -> Self {
        Self::new(config, engine, Arc::new(LocalFs), Arc::new(LoggingHandler))
    }

    /// Wrap the tree for use from several threads.
    pub fn into_shared(self) -> SharedTree {
        Arc::new(Mutex::new(self))
    }

    /// Tree configuration.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// A node, if it is part of the tree.
    pub fn node(&self, id: NodeId) -> Option<&ApplicationNode> {
        self.nodes.get(&id)
    }

    /// Whether `id` is part of the tree.
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Walk existing nodes to `path` without creating or opening anything.
    pub fn find(&self, path: &str) -> Option<NodeId> {
        path::parse(path)?
            .into_iter()
            .try_fold(self.root, |current, segment| {
                self.nodes.get(&current)?.children.get(segment).copied()
            })
    }

    /// Notification identity of a node.
    pub fn info(&self, id: NodeId) -> Result<AppInfo> {
        let node = self.get_node(id)?;
        Ok(AppInfo {
            node: id,
            name: node.name.clone(),
            path: node.path.clone(),
        })
    }

    /// Snapshot of one node.
    pub fn status(&self, id: NodeId) -> Result<AppStatus> {
        Ok(AppStatus::of(id, self.get_node(id)?))
    }

    /// Snapshot of every node, depth-first, siblings by name.
    pub fn list(&self) -> Vec<AppStatus> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get(&id) {
                out.push(AppStatus::of(id, node));
                stack.extend(node.children.values().rev().copied());
            }
        }
        out
    }

    /// The shared data store.
    pub fn data_store(&self) -> &DataStore {
        &self.data
    }

    /// Define a global, visible to every scope that does not shadow it.
    pub fn set_global(&mut self, key: impl Into<String>, value: Value) {
        let _ = self.globals.insert(key.into(), value);
    }

    /// A global value.
    pub fn global(&self, key: &str) -> Option<&Value> {
        self.globals.get(key)
    }

    /// Remove a global.
    pub fn remove_global(&mut self, key: &str) -> Option<Value> {
        self.globals.remove(key)
    }

    /// Rebind a node's scope identity.
    ///
    /// Returns `false` when `identity` is the one already bound. Otherwise
    /// every session bound to the node is invalidated first.
    pub fn set_identity(&mut self, id: NodeId, identity: Option<ScopeHandle>) -> Result<bool> {
        let node = self.get_node_mut(id)?;
        let Some(scope) = node.scope.as_mut() else {
            return Err(AppError::invalid_state(&node.path, "application is not open"));
        };
        let Some(invalidated) = scope.set_identity(identity) else {
            return Ok(false);
        };
        for session in &invalidated {
            let _ = self.sessions.remove(session);
        }
        Ok(true)
    }

    /// Full-close the whole tree, children before parents.
    pub fn shutdown(&mut self) {
        if let Err(error) = self.close(self.root, true) {
            tracing::warn!(%error, "application tree shutdown incomplete");
        }
    }

    pub(crate) fn get_node(&self, id: NodeId) -> Result<&ApplicationNode> {
        self.nodes.get(&id).ok_or(AppError::UnknownNode(id))
    }

    pub(crate) fn get_node_mut(&mut self, id: NodeId) -> Result<&mut ApplicationNode> {
        self.nodes.get_mut(&id).ok_or(AppError::UnknownNode(id))
    }

    /// Create the placeholder child `name` under `parent`.
    fn insert_child(&mut self, parent: NodeId, name: &str) -> Result<NodeId> {
        let path = path::join(&self.get_node(parent)?.path, name);
        let id = NodeId::from_raw(self.next_id);
        self.next_id += 1;

        let node = ApplicationNode::new(
            name.to_owned(),
            path.clone(),
            Some(parent),
            self.config.entry_file_for(&path),
        );
        let _ = self.nodes.insert(id, node);
        let _ = self
            .get_node_mut(parent)?
            .children
            .insert(name.to_owned(), id);
        debug!(%path, node = %id, "application node created");
        Ok(id)
    }

    /// Unlink a childless node from its parent and drop it.
    fn detach_node(&mut self, id: NodeId) {
        let Some(node) = self.nodes.remove(&id) else {
            return;
        };
        if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
            let _ = parent.children.remove(&node.name);
            if let Some(scope) = parent.scope.as_mut() {
                scope.unregister_child(&node.name);
            }
        }
        debug!(path = %node.path, node = %id, "application node removed");
    }
}

impl Drop for ApplicationTree {
    fn drop(&mut self) {
        self.shutdown();
    }
}
