//! Resolve, open, load and close.

use std::sync::Arc;

use apphost_core::constants::{HOOK_ON_START, HOOK_ON_STOP};
use chrono::Utc;
use tracing::{debug, info, warn};

use super::ApplicationTree;
use super::lookup::ScopeCursor;
use crate::engine::ScopeHandle;
use crate::errors::{AppError, ErrorKind, Result};
use crate::node::NodeId;
use crate::path;
use crate::property::ScopeRef;
use crate::scope::ScopeEnvironment;
use crate::watch::{FileChange, FileProbe, FileWatch};

impl ApplicationTree {
    /// Find or create the node at `path` and open it.
    ///
    /// The empty path names the root, which is returned without being
    /// opened. A leaf whose backing directory is missing is removed again
    /// before the error is returned, together with any placeholder ancestors
    /// this call created.
    pub fn resolve(&mut self, path: &str) -> Result<NodeId> {
        let Some(segments) = path::parse(path) else {
            return Err(AppError::NotFound {
                path: path.to_owned(),
            });
        };
        if segments.is_empty() {
            return Ok(self.root);
        }

        let mut current = self.root;
        let mut created = Vec::new();
        for segment in segments {
            let existing = self.get_node(current)?.children.get(segment).copied();
            current = match existing {
                Some(child) => child,
                None => {
                    let child = self.insert_child(current, segment)?;
                    created.push(child);
                    child
                }
            };
        }

        match self.open(current) {
            Ok(()) => Ok(current),
            Err(err) => {
                self.discard_failed(current, &created, &err);
                Err(err)
            }
        }
    }

    /// Open a node, loading it if needed.
    ///
    /// At most once per staleness window the entry file and directory are
    /// checked: a changed file is reloaded and a missing directory records
    /// [`AppError::NotFound`]. A recorded error is returned as-is until a
    /// later check clears it.
    pub fn open(&mut self, id: NodeId) -> Result<()> {
        self.ensure_not_loading(id)?;
        let window = self.config.staleness_window;
        let node = self.get_node_mut(id)?;
        if node.staleness.is_elapsed(window) {
            node.staleness.update();
            self.check_backing(id)?;
        }

        if let Some(err) = &self.get_node(id)?.last_error {
            return Err(err.clone());
        }
        self.ensure_scope(id)
    }

    /// Run the entry file in the node's scope, then fire the start hooks.
    ///
    /// On failure the scope is reset, the error is recorded on the node and
    /// no start hook fires. The node's file watch is re-sampled so the
    /// version being run is not reported as a change by the next check.
    pub fn load(&mut self, id: NodeId) -> Result<()> {
        let fs = Arc::clone(&self.fs);
        self.load_entry(id, Some(fs.as_ref()))
    }

    /// [`load`](Self::load), optionally syncing the file watch once the
    /// scope is ready. The watcher path has already sampled the file.
    fn load_entry(&mut self, id: NodeId, sync: Option<&dyn FileProbe>) -> Result<()> {
        self.ensure_not_loading(id)?;
        let node = self.get_node(id)?;
        if node.loaded {
            return Err(AppError::invalid_state(&node.path, "application is already loaded"));
        }
        self.ensure_scope(id)?;

        let node = self.get_node_mut(id)?;
        node.last_error = None;
        if let Some(fs) = sync {
            node.watch.sync(fs);
        }
        let path = node.path.clone();
        let file = node.watch.file().to_path_buf();
        let Some(scope_id) = node
            .scope
            .as_ref()
            .and_then(ScopeEnvironment::identity)
            .map(ScopeHandle::id)
        else {
            return Err(AppError::invalid_state(&path, "scope has no engine identity"));
        };

        let engine = Arc::clone(&self.engine);
        self.loading.push(id);
        let outcome = engine.run_file(scope_id, &file, &mut ScopeCursor::new(self, id));
        let _ = self.loading.pop();

        match outcome {
            Ok(()) => {
                let node = self.get_node_mut(id)?;
                node.loaded = true;
                node.loaded_at = Some(Utc::now());
                self.call_hook(id, HOOK_ON_START);
                self.handler.on_service_started(&self.info(id)?);
                info!(%path, file = %file.display(), "application loaded");
                Ok(())
            }
            Err(script_err) => {
                let err = AppError::LoadFailed {
                    path: path.clone(),
                    message: script_err.message,
                };
                warn!(%path, error = %err, "application failed to load");
                self.reset_scope(id)?;
                self.get_node_mut(id)?.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Partial close followed by a fresh load, keeping the scope identity.
    pub fn reload(&mut self, id: NodeId) -> Result<()> {
        self.close(id, false)?;
        self.load(id)
    }

    /// Tear a node down.
    ///
    /// A partial close resets the scope's entries and data but keeps the
    /// node, its identity and its children. A full close closes the
    /// children first, releases the identity and removes the node from its
    /// parent. The root is never removed; a full close of the root empties
    /// the tree. Bound sessions are invalidated either way.
    pub fn close(&mut self, id: NodeId, full: bool) -> Result<()> {
        self.ensure_not_loading(id)?;
        if full {
            let children: Vec<NodeId> = self.get_node(id)?.children.values().copied().collect();
            for child in children {
                self.close(child, true)?;
            }
        }

        let node = self.get_node(id)?;
        let path = node.path.clone();
        if node.scope.is_some() {
            if node.loaded {
                self.handler.on_service_stopped(&self.info(id)?);
                self.call_hook(id, HOOK_ON_STOP);
                info!(%path, full, "application unloaded");
            }
            if full {
                self.drop_scope(id)?;
            } else {
                self.reset_scope(id)?;
            }
        }

        let is_root = id == self.root;
        let node = self.get_node_mut(id)?;
        node.loaded = false;
        node.loaded_at = None;
        node.last_error = None;
        if full {
            if is_root {
                node.watch = FileWatch::new(node.watch.file().to_path_buf());
                node.staleness.reset();
            } else {
                self.detach_node(id);
            }
        }
        self.engine.collect_garbage();
        Ok(())
    }

    /// Full close of a node and everything below it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        self.close(id, true)
    }

    /// Make sure the node and all its ancestors have a scope.
    ///
    /// Scopes are created top-down. If any allocation fails, the scopes
    /// created by this call are dropped again.
    pub(crate) fn ensure_scope(&mut self, id: NodeId) -> Result<()> {
        let mut pending = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.get_node(current)?;
            if node.scope.is_some() {
                break;
            }
            pending.push(current);
            cursor = node.parent;
        }

        let mut realized = Vec::with_capacity(pending.len());
        for &node_id in pending.iter().rev() {
            match self.realize_scope(node_id) {
                Ok(()) => realized.push(node_id),
                Err(err) => {
                    for &done in realized.iter().rev() {
                        self.drop_scope(done)?;
                    }
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    fn realize_scope(&mut self, id: NodeId) -> Result<()> {
        let node = self.get_node(id)?;
        let (name, path, parent) = (node.name.clone(), node.path.clone(), node.parent);
        let handle = ScopeHandle::allocate(&self.engine, &name, &path).map_err(|err| {
            warn!(%path, error = %err, "scope allocation failed");
            AppError::ScopeAllocation {
                path: path.clone(),
                message: err.message,
            }
        })?;

        let super_ref = parent.map_or(ScopeRef::Global, ScopeRef::Node);
        let mut scope = ScopeEnvironment::new(&name, &path, super_ref, id);
        let _ = scope.set_identity(Some(handle));
        self.get_node_mut(id)?.scope = Some(scope);
        if let Some(parent) = parent {
            if let Some(parent_scope) = self.get_node_mut(parent)?.scope.as_mut() {
                parent_scope.register_child(&name, id);
            }
        }
        debug!(%path, "scope created");
        Ok(())
    }

    /// Invalidate sessions, release the identity and forget the scope.
    fn drop_scope(&mut self, id: NodeId) -> Result<()> {
        let node = self.get_node_mut(id)?;
        let (name, path, parent) = (node.name.clone(), node.path.clone(), node.parent);
        let Some(mut scope) = node.scope.take() else {
            return Ok(());
        };
        let invalidated = scope.invalidate_clients();
        drop(scope);
        self.forget_sessions(&invalidated);

        if let Some(parent_scope) = parent
            .and_then(|p| self.nodes.get_mut(&p))
            .and_then(|p| p.scope.as_mut())
        {
            parent_scope.unregister_child(&name);
        }
        self.data.clear(&path);
        debug!(%path, "scope released");
        Ok(())
    }

    /// Wipe entries, engine-side state and data, keeping the identity.
    fn reset_scope(&mut self, id: NodeId) -> Result<()> {
        let engine = Arc::clone(&self.engine);
        let node = self.get_node_mut(id)?;
        let path = node.path.clone();
        let Some(scope) = node.scope.as_mut() else {
            return Ok(());
        };
        let invalidated = scope.invalidate_clients();
        scope.reset_entries();
        if let Some(handle) = scope.identity() {
            engine.clear_scope(handle.id());
        }
        self.forget_sessions(&invalidated);
        self.data.clear(&path);
        Ok(())
    }

    /// Throttled filesystem check, run from [`open`](Self::open).
    fn check_backing(&mut self, id: NodeId) -> Result<()> {
        let exists = self.watch_file(id)?;
        let node = self.get_node(id)?;
        let present = exists || self.fs.exists(node.directory());

        let node = self.get_node_mut(id)?;
        if present {
            if matches!(node.last_error, Some(AppError::NotFound { .. })) {
                node.last_error = None;
            }
        } else if node.last_error.is_none() {
            warn!(path = %node.path, "application doesn't exist");
            node.last_error = Some(AppError::NotFound {
                path: node.path.clone(),
            });
        }
        Ok(())
    }

    /// Reload the node if its entry file changed. Returns whether the file
    /// exists now.
    fn watch_file(&mut self, id: NodeId) -> Result<bool> {
        let fs = Arc::clone(&self.fs);
        let node = self.get_node_mut(id)?;
        let before = node.watch.clone();
        let change = node.watch.changed_since_last_check(fs.as_ref());
        let exists = node.watch.exists();
        if !change.is_change() {
            return Ok(exists);
        }
        debug!(path = %node.path, ?change, "entry file changed");

        if matches!(change, FileChange::Modified | FileChange::Removed) && node.scope.is_some() {
            self.close(id, false)?;
        }
        if exists {
            if let Err(err) = self.load_entry(id, None) {
                if err.kind() == ErrorKind::ScopeAllocation {
                    let node = self.get_node_mut(id)?;
                    node.watch = before;
                    node.staleness.reset();
                    return Err(err);
                }
            }
        }
        Ok(exists)
    }

    /// Call a script hook. Failures are logged and reported, never returned.
    fn call_hook(&self, id: NodeId, hook: &str) {
        let Ok(node) = self.get_node(id) else {
            return;
        };
        let Some(handle) = node.scope.as_ref().and_then(ScopeEnvironment::identity) else {
            return;
        };
        if let Err(script_err) = self.engine.call_hook(handle.id(), hook, &[node.path.as_str()]) {
            let err = AppError::HookFailed {
                path: node.path.clone(),
                hook: hook.to_owned(),
                message: script_err.message,
            };
            warn!(path = %node.path, hook, error = %err, "application hook failed");
            if let Ok(info) = self.info(id) {
                self.handler.on_hook_failed(&info, &err);
            }
        }
    }

    /// Undo what a failed [`resolve`](Self::resolve) left behind.
    fn discard_failed(&mut self, leaf: NodeId, created: &[NodeId], err: &AppError) {
        match err.kind() {
            ErrorKind::NotFound => {
                if self.contains(leaf) {
                    if let Err(close_err) = self.remove_node(leaf) {
                        warn!(error = %close_err, "failed to remove missing application");
                    }
                }
            }
            ErrorKind::ScopeAllocation => {}
            _ => return,
        }
        for &id in created.iter().rev() {
            let placeholder = self
                .nodes
                .get(&id)
                .is_some_and(|node| node.scope.is_none() && node.children.is_empty());
            if placeholder {
                self.detach_node(id);
            }
        }
    }

    fn forget_sessions(&mut self, sessions: &[apphost_core::SessionId]) {
        for session in sessions {
            let _ = self.sessions.remove(session);
        }
    }

    fn ensure_not_loading(&self, id: NodeId) -> Result<()> {
        if self.loading.contains(&id) {
            let path = self.get_node(id).map(|n| n.path.clone()).unwrap_or_default();
            return Err(AppError::invalid_state(&path, "application is being loaded"));
        }
        Ok(())
    }
}
