//! Path resolution, staleness throttling and failure cleanup.

mod support;

use std::sync::Arc;
use std::time::Duration;

use apphost_tree::{AppError, ErrorKind, ScriptError};
use assert_matches::assert_matches;
use proptest::prelude::*;
use support::Harness;

#[test]
fn resolve_loads_once_and_returns_same_node() {
    let mut h = Harness::new();
    h.app("/a");

    let first = h.tree.resolve("/a").unwrap();
    let second = h.tree.resolve("/a").unwrap();

    assert_eq!(first, second);
    assert_eq!(h.engine.run_count(&Harness::entry("/a")), 1);
    assert_eq!(h.engine.hook_calls("onStart"), vec!["/a"]);
    assert_eq!(h.handler.events(), vec!["start:/a"]);
}

#[test]
fn empty_path_is_unopened_root() {
    let mut h = Harness::new();
    let root = h.tree.resolve("").unwrap();
    assert_eq!(root, h.tree.root());
    assert!(!h.tree.node(root).unwrap().is_open());
    assert_eq!(h.tree.resolve("/").unwrap(), root);
}

#[test]
fn equivalent_spellings_resolve_to_same_node() {
    let mut h = Harness::new();
    h.app("/a/b");
    let canonical = h.tree.resolve("/a/b").unwrap();
    assert_eq!(h.tree.resolve("a/b/").unwrap(), canonical);
    assert_eq!(h.tree.resolve("//a//b").unwrap(), canonical);
    assert_eq!(h.engine.run_count(&Harness::entry("/a/b")), 1);
}

#[test]
fn traversal_segments_are_rejected() {
    let mut h = Harness::new();
    h.app("/b");
    assert_matches!(h.tree.resolve("/a/../b"), Err(AppError::NotFound { .. }));
    assert_eq!(h.tree.node_count(), 1);
}

#[test]
fn resolving_leaf_gives_ancestors_scopes_without_loading_them() {
    let mut h = Harness::new();
    h.app("/a");
    h.app("/a/b");

    let b = h.tree.resolve("/a/b").unwrap();
    let a = h.tree.find("/a").unwrap();

    assert!(h.tree.node(b).unwrap().is_loaded());
    let parent = h.tree.node(a).unwrap();
    assert!(parent.is_open());
    assert!(!parent.is_loaded());
    assert!(h.tree.node(h.tree.root()).unwrap().is_open());
    assert_eq!(h.engine.run_count(&Harness::entry("/a")), 0);
}

#[test]
fn missing_application_leaves_no_placeholders() {
    let mut h = Harness::new();

    let err = h.tree.resolve("/x/y").unwrap_err();

    assert_matches!(&err, AppError::NotFound { path } if path == "/x/y");
    assert!(h.tree.find("/x").is_none());
    assert_eq!(h.tree.node_count(), 1);
    assert_eq!(h.engine.live_scopes(), 0);
}

#[test]
fn missing_leaf_keeps_existing_parent() {
    let mut h = Harness::new();
    h.app("/a");
    let a = h.tree.resolve("/a").unwrap();

    assert_matches!(h.tree.resolve("/a/nope"), Err(AppError::NotFound { .. }));

    assert_eq!(h.tree.find("/a"), Some(a));
    assert!(h.tree.node(a).unwrap().children().is_empty());
    assert!(h.tree.node(a).unwrap().is_loaded());
}

#[test]
fn checks_are_throttled_by_staleness_window() {
    let mut h = Harness::with_window(Duration::from_secs(60));
    h.app("/a");

    let a = h.tree.resolve("/a").unwrap();
    let _ = h.tree.resolve("/a").unwrap();
    assert_eq!(h.fs.modified_calls(), 1);

    h.fs.remove_dir(Harness::dir("/a"));
    assert_eq!(h.tree.resolve("/a").unwrap(), a);
    assert_eq!(h.fs.modified_calls(), 1);
}

#[test]
fn deleted_application_is_removed_after_window() {
    let mut h = Harness::new();
    h.app("/a");
    let a = h.tree.resolve("/a").unwrap();
    let scope = h.tree.node(a).unwrap().scope().unwrap().identity().unwrap().id();

    h.fs.remove_dir(Harness::dir("/a"));
    let err = h.tree.resolve("/a").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(h.tree.find("/a").is_none());
    assert!(!h.tree.contains(a));
    assert!(!h.engine.is_live(scope));
    assert_eq!(h.handler.count("stop:/a"), 1);
    assert_eq!(h.engine.hook_calls("onStop"), vec!["/a"]);
}

#[test]
fn application_can_reappear_after_removal() {
    let mut h = Harness::new();
    assert!(h.tree.resolve("/late").is_err());

    h.app("/late");
    let id = h.tree.resolve("/late").unwrap();

    assert!(h.tree.node(id).unwrap().is_loaded());
    assert_eq!(h.handler.events(), vec!["start:/late"]);
}

#[test]
fn removed_entry_file_turns_into_directory_app() {
    let mut h = Harness::new();
    h.app("/a");
    let a = h.tree.resolve("/a").unwrap();

    h.fs.remove_file(Harness::entry("/a"));
    assert_eq!(h.tree.resolve("/a").unwrap(), a);

    let node = h.tree.node(a).unwrap();
    assert!(node.is_open());
    assert!(!node.is_loaded());
    assert_eq!(h.handler.events(), vec!["start:/a", "stop:/a"]);
}

#[test]
fn failed_load_is_recorded_and_retried_on_change() {
    let mut h = Harness::new();
    h.scripted_app("/a", |_| Err(ScriptError::new("syntax error")));

    let err = h.tree.resolve("/a").unwrap_err();
    assert_matches!(&err, AppError::LoadFailed { message, .. } if message == "syntax error");

    let a = h.tree.find("/a").unwrap();
    let node = h.tree.node(a).unwrap();
    assert!(!node.is_loaded());
    assert_eq!(node.last_error(), Some(&err));
    assert!(h.engine.hook_calls("onStart").is_empty());
    assert!(h.handler.events().is_empty());

    assert_eq!(h.tree.resolve("/a").unwrap_err(), err);
    assert_eq!(h.engine.run_count(&Harness::entry("/a")), 1);

    h.engine.script(Harness::entry("/a"), |_| Ok(()));
    h.fs.touch(Harness::entry("/a"));
    assert_eq!(h.tree.resolve("/a").unwrap(), a);
    assert!(h.tree.node(a).unwrap().last_error().is_none());
    assert_eq!(h.engine.run_count(&Harness::entry("/a")), 2);
    assert_eq!(h.handler.events(), vec!["start:/a"]);
}

#[test]
fn scope_allocation_failure_restores_tree() {
    let mut h = Harness::new();
    h.app("/a/b");
    h.engine.fail_scope_for("/a/b");

    let err = h.tree.resolve("/a/b").unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ScopeAllocation);
    assert_eq!(h.tree.node_count(), 1);
    assert!(!h.tree.node(h.tree.root()).unwrap().is_open());
    assert_eq!(h.engine.live_scopes(), 0);
    assert_eq!(h.engine.run_count(&Harness::entry("/a/b")), 0);

    h.engine.allow_scope_for("/a/b");
    let b = h.tree.resolve("/a/b").unwrap();
    assert!(h.tree.node(b).unwrap().is_loaded());
}

#[test]
fn scope_allocation_failure_keeps_existing_nodes() {
    let mut h = Harness::new();
    h.app("/a");
    h.app("/a/b");
    let a = h.tree.resolve("/a").unwrap();
    h.engine.fail_scope_for("/a/b");

    assert_matches!(h.tree.resolve("/a/b"), Err(AppError::ScopeAllocation { .. }));

    assert_eq!(h.tree.find("/a"), Some(a));
    assert!(h.tree.find("/a/b").is_none());
    assert!(h.tree.node(a).unwrap().is_loaded());
}

#[test]
fn shared_tree_loads_once_under_contention() {
    let h = Harness::new();
    h.app("/a");
    let Harness { tree, engine, .. } = h;
    let shared = tree.into_shared();

    std::thread::scope(|s| {
        for _ in 0..8 {
            let shared = Arc::clone(&shared);
            let _ = s.spawn(move || shared.lock().resolve("/a").unwrap());
        }
    });

    assert_eq!(engine.run_count(&Harness::entry("/a")), 1);
    assert_eq!(engine.hook_calls("onStart").len(), 1);
}

proptest! {
    #[test]
    fn resolution_is_idempotent(segments in proptest::collection::vec("[a-c]{1,2}", 1..4)) {
        let mut h = Harness::new();
        let path = format!("/{}", segments.join("/"));
        h.directory_app(&path);

        let first = h.tree.resolve(&path).unwrap();
        let second = h.tree.resolve(&format!("{path}/")).unwrap();

        prop_assert_eq!(first, second);
        prop_assert_eq!(h.tree.node(first).unwrap().path(), path.as_str());
        prop_assert_eq!(h.tree.find(&path), Some(first));
        prop_assert_eq!(h.tree.node_count(), segments.len() + 1);
    }
}
