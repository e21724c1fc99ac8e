//! Application nodes and their status snapshots.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::scope::ScopeEnvironment;
use crate::staleness::StalenessGate;
use crate::watch::FileWatch;

/// Stable identifier of a node in the tree. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Wrap a raw ID.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw ID.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One element of the application tree.
///
/// A node exists independently of its backing file; `scope` reflects load
/// state, not tree membership.
#[derive(Debug)]
pub struct ApplicationNode {
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: BTreeMap<String, NodeId>,
    pub(crate) scope: Option<ScopeEnvironment>,
    pub(crate) last_error: Option<AppError>,
    pub(crate) staleness: StalenessGate,
    pub(crate) watch: FileWatch,
    /// The entry file ran to completion and `onStart` was attempted.
    pub(crate) loaded: bool,
    pub(crate) loaded_at: Option<DateTime<Utc>>,
}

impl ApplicationNode {
    pub(crate) fn new(name: String, path: String, parent: Option<NodeId>, entry_file: PathBuf) -> Self {
        Self {
            name,
            path,
            parent,
            children: BTreeMap::new(),
            scope: None,
            last_error: None,
            staleness: StalenessGate::new(),
            watch: FileWatch::new(entry_file),
            loaded: false,
            loaded_at: None,
        }
    }

    /// Segment name (empty for the root).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full path from the root.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Parent node (non-owning); `None` for the root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Child nodes by name, ordered.
    pub fn children(&self) -> &BTreeMap<String, NodeId> {
        &self.children
    }

    /// The realized scope, if the node is open.
    pub fn scope(&self) -> Option<&ScopeEnvironment> {
        self.scope.as_ref()
    }

    /// Whether a scope is realized.
    pub fn is_open(&self) -> bool {
        self.scope.is_some()
    }

    /// Whether the entry file ran successfully and has not been closed since.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Last load failure, cleared on successful load or close.
    pub fn last_error(&self) -> Option<&AppError> {
        self.last_error.as_ref()
    }

    /// Entry file backing this node.
    pub fn entry_file(&self) -> &Path {
        self.watch.file()
    }

    /// Directory backing this node.
    pub fn directory(&self) -> &Path {
        self.watch.directory()
    }
}

/// Serializable view of a node.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppStatus {
    /// Node ID.
    pub id: NodeId,
    /// Segment name.
    pub name: String,
    /// Full path.
    pub path: String,
    /// Scope realized.
    pub open: bool,
    /// Entry file loaded.
    pub loaded: bool,
    /// Bound client sessions.
    pub clients: usize,
    /// Child node names.
    pub children: Vec<String>,
    /// Last load failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// When the entry file last loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<DateTime<Utc>>,
}

impl AppStatus {
    pub(crate) fn of(id: NodeId, node: &ApplicationNode) -> Self {
        Self {
            id,
            name: node.name.clone(),
            path: node.path.clone(),
            open: node.is_open(),
            loaded: node.loaded,
            clients: node.scope.as_ref().map_or(0, ScopeEnvironment::client_count),
            children: node.children.keys().cloned().collect(),
            last_error: node.last_error.as_ref().map(ToString::to_string),
            loaded_at: node.loaded_at,
        }
    }
}
