//! Hierarchical auxiliary data store.
//!
//! One tree of tables keyed by path segments, shared by every application.
//! The `data` property of an application resolves to the table at its path,
//! creating intermediate levels on demand. Handles are shared, so a table
//! obtained before a reload is the same table seen after it.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::path;

/// Shared handle to one table of the data store.
pub type DataHandle = Arc<RwLock<DataTable>>;

/// One level of the data store: plain values plus named sub-tables.
#[derive(Debug, Default)]
pub struct DataTable {
    values: BTreeMap<String, Value>,
    children: BTreeMap<String, DataHandle>,
}

impl DataTable {
    /// Value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Store `value` under `key`, returning the previous value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.values.insert(key.into(), value)
    }

    /// Remove the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Number of plain values (sub-tables excluded).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the table holds no plain values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keys of plain values, in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Sub-table `name`, if it was created.
    pub fn child(&self, name: &str) -> Option<DataHandle> {
        self.children.get(name).cloned()
    }

    /// Names of sub-tables, in order.
    pub fn child_names(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Sub-table `name`, creating it if needed.
    pub fn child_or_insert(&mut self, name: &str) -> DataHandle {
        Arc::clone(self.children.entry(name.to_owned()).or_default())
    }

    /// Drop plain values, keep sub-tables.
    pub fn clear_values(&mut self) {
        self.values.clear();
    }

    /// Recursive JSON snapshot. Sub-tables shadow values with the same key.
    pub fn to_json(&self) -> Value {
        let mut map: Map<String, Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        for (name, child) in &self.children {
            let _ = map.insert(name.clone(), child.read().to_json());
        }
        Value::Object(map)
    }
}

/// The process-wide data store.
///
/// Levels are never pruned: closing or removing an application clears its
/// own values but leaves its (possibly empty) table and the levels above it
/// in place, so a handle taken earlier stays valid.
#[derive(Clone, Debug, Default)]
pub struct DataStore {
    root: DataHandle,
}

impl DataStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The root table (the one the root application sees).
    pub fn root(&self) -> DataHandle {
        Arc::clone(&self.root)
    }

    /// Table for `app_path`, creating every missing level.
    pub fn subtree(&self, app_path: &str) -> DataHandle {
        path::segments(app_path)
            .into_iter()
            .fold(self.root(), |table, segment| {
                let next = table.write().child_or_insert(segment);
                next
            })
    }

    /// Table for `app_path` if every level already exists.
    pub fn find(&self, app_path: &str) -> Option<DataHandle> {
        path::segments(app_path)
            .into_iter()
            .try_fold(self.root(), |table, segment| {
                let next = table.read().child(segment);
                next
            })
    }

    /// Drop the plain values stored at `app_path`, keeping deeper tables.
    pub fn clear(&self, app_path: &str) {
        if let Some(table) = self.find(app_path) {
            table.write().clear_values();
        }
    }
}
