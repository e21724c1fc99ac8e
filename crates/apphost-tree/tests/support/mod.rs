//! Shared fixtures for the application tree integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, SystemTime};

use apphost_tree::{
    AppError, AppInfo, ApplicationTree, EngineScopeId, FileProbe, HostScope, ScriptEngine,
    ScriptError, ServiceHandler, TreeConfig,
};
use parking_lot::Mutex;

/// Root directory the fixtures serve applications from.
pub const WWW: &str = "/www";

/// A script body run in place of an entry file.
pub type Script = Arc<dyn Fn(&mut dyn HostScope) -> Result<(), ScriptError> + Send + Sync>;

/// What the fake engine was asked to do, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    Allocated { scope: EngineScopeId, path: String },
    Released(EngineScopeId),
    Ran { scope: EngineScopeId, file: PathBuf },
    Hook { scope: EngineScopeId, hook: String, path: String },
    Cleared(EngineScopeId),
    Collected,
}

/// Engine whose "files" are closures registered per path.
#[derive(Default)]
pub struct FakeEngine {
    next: AtomicU64,
    scripts: Mutex<HashMap<PathBuf, Script>>,
    failing_hooks: Mutex<HashSet<String>>,
    failing_scopes: Mutex<HashSet<String>>,
    live: Mutex<HashSet<EngineScopeId>>,
    events: Mutex<Vec<EngineEvent>>,
}

impl FakeEngine {
    pub fn script(
        &self,
        file: impl Into<PathBuf>,
        body: impl Fn(&mut dyn HostScope) -> Result<(), ScriptError> + Send + Sync + 'static,
    ) {
        let _ = self.scripts.lock().insert(file.into(), Arc::new(body));
    }

    pub fn fail_hook(&self, hook: &str) {
        let _ = self.failing_hooks.lock().insert(hook.to_owned());
    }

    pub fn fail_scope_for(&self, path: &str) {
        let _ = self.failing_scopes.lock().insert(path.to_owned());
    }

    pub fn allow_scope_for(&self, path: &str) {
        let _ = self.failing_scopes.lock().remove(path);
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().clone()
    }

    pub fn live_scopes(&self) -> usize {
        self.live.lock().len()
    }

    pub fn is_live(&self, scope: EngineScopeId) -> bool {
        self.live.lock().contains(&scope)
    }

    pub fn run_count(&self, file: &Path) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, EngineEvent::Ran { file: f, .. } if f == file))
            .count()
    }

    /// Paths a hook fired for, in order.
    pub fn hook_calls(&self, hook: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                EngineEvent::Hook { hook: h, path, .. } if h == hook => Some(path.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: EngineEvent) {
        self.events.lock().push(event);
    }
}

impl ScriptEngine for FakeEngine {
    fn new_scope(&self, _name: &str, path: &str) -> Result<EngineScopeId, ScriptError> {
        if self.failing_scopes.lock().contains(path) {
            return Err(ScriptError::new("out of memory"));
        }
        let scope = EngineScopeId::from_raw(self.next.fetch_add(1, Ordering::Relaxed));
        let _ = self.live.lock().insert(scope);
        self.record(EngineEvent::Allocated {
            scope,
            path: path.to_owned(),
        });
        Ok(scope)
    }

    fn release_scope(&self, scope: EngineScopeId) {
        let _ = self.live.lock().remove(&scope);
        self.record(EngineEvent::Released(scope));
    }

    fn run_file(
        &self,
        scope: EngineScopeId,
        file: &Path,
        host: &mut dyn HostScope,
    ) -> Result<(), ScriptError> {
        self.record(EngineEvent::Ran {
            scope,
            file: file.to_path_buf(),
        });
        let script = self.scripts.lock().get(file).cloned();
        match script {
            Some(script) => script(host),
            None => Ok(()),
        }
    }

    fn call_hook(&self, scope: EngineScopeId, hook: &str, args: &[&str]) -> Result<(), ScriptError> {
        self.record(EngineEvent::Hook {
            scope,
            hook: hook.to_owned(),
            path: args.first().map(ToString::to_string).unwrap_or_default(),
        });
        if self.failing_hooks.lock().contains(hook) {
            return Err(ScriptError::new(format!("{hook} threw")));
        }
        Ok(())
    }

    fn clear_scope(&self, scope: EngineScopeId) {
        self.record(EngineEvent::Cleared(scope));
    }

    fn collect_garbage(&self) {
        self.record(EngineEvent::Collected);
    }
}

/// In-memory filesystem with a logical clock for modification times.
#[derive(Default)]
pub struct MemoryFs {
    files: Mutex<HashMap<PathBuf, SystemTime>>,
    dirs: Mutex<HashSet<PathBuf>>,
    clock: AtomicU64,
    modified_calls: AtomicUsize,
}

impl MemoryFs {
    pub fn add_dir(&self, dir: impl AsRef<Path>) {
        let mut dirs = self.dirs.lock();
        for ancestor in dir.as_ref().ancestors() {
            let _ = dirs.insert(ancestor.to_path_buf());
        }
    }

    /// Create or touch a file, bumping its modification time.
    pub fn touch(&self, file: impl AsRef<Path>) {
        let file = file.as_ref();
        if let Some(parent) = file.parent() {
            self.add_dir(parent);
        }
        let tick = self.clock.fetch_add(1, Ordering::Relaxed) + 1;
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(tick);
        let _ = self.files.lock().insert(file.to_path_buf(), mtime);
    }

    pub fn remove_file(&self, file: impl AsRef<Path>) {
        let _ = self.files.lock().remove(file.as_ref());
    }

    /// Remove a directory and everything below it.
    pub fn remove_dir(&self, dir: impl AsRef<Path>) {
        let dir = dir.as_ref();
        self.dirs.lock().retain(|d| !d.starts_with(dir));
        self.files.lock().retain(|f, _| !f.starts_with(dir));
    }

    pub fn modified_calls(&self) -> usize {
        self.modified_calls.load(Ordering::Relaxed)
    }
}

impl FileProbe for MemoryFs {
    fn exists(&self, path: &Path) -> bool {
        self.dirs.lock().contains(path) || self.files.lock().contains_key(path)
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        let _ = self.modified_calls.fetch_add(1, Ordering::Relaxed);
        self.files.lock().get(path).copied()
    }
}

/// Handler that records `start:<path>`, `stop:<path>` and
/// `hook-failed:<path>:<hook>` lines.
#[derive(Default)]
pub struct RecordingHandler {
    events: Mutex<Vec<String>>,
}

impl RecordingHandler {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }
}

impl ServiceHandler for RecordingHandler {
    fn on_service_started(&self, app: &AppInfo) {
        self.events.lock().push(format!("start:{}", app.path));
    }

    fn on_service_stopped(&self, app: &AppInfo) {
        self.events.lock().push(format!("stop:{}", app.path));
    }

    fn on_hook_failed(&self, app: &AppInfo, error: &AppError) {
        if let AppError::HookFailed { hook, .. } = error {
            self.events.lock().push(format!("hook-failed:{}:{hook}", app.path));
        }
    }
}

/// A tree over [`MemoryFs`] and [`FakeEngine`].
pub struct Harness {
    pub tree: ApplicationTree,
    pub engine: Arc<FakeEngine>,
    pub fs: Arc<MemoryFs>,
    pub handler: Arc<RecordingHandler>,
}

impl Harness {
    /// Every open re-checks the filesystem.
    pub fn new() -> Self {
        Self::with_window(Duration::ZERO)
    }

    pub fn with_window(window: Duration) -> Self {
        let engine = Arc::new(FakeEngine::default());
        let fs = Arc::new(MemoryFs::default());
        let handler = Arc::new(RecordingHandler::default());
        fs.add_dir(WWW);
        let tree = ApplicationTree::new(
            TreeConfig::new(WWW).with_staleness_window(window),
            Arc::clone(&engine) as Arc<dyn ScriptEngine>,
            Arc::clone(&fs) as Arc<dyn FileProbe>,
            Arc::clone(&handler) as Arc<dyn ServiceHandler>,
        );
        Self {
            tree,
            engine,
            fs,
            handler,
        }
    }

    /// Directory backing the application at `app_path`.
    pub fn dir(app_path: &str) -> PathBuf {
        let mut dir = PathBuf::from(WWW);
        for segment in app_path.split('/').filter(|s| !s.is_empty()) {
            dir.push(segment);
        }
        dir
    }

    /// Entry file of the application at `app_path`.
    pub fn entry(app_path: &str) -> PathBuf {
        Self::dir(app_path).join("main")
    }

    /// Create an application with an entry file.
    pub fn app(&self, app_path: &str) {
        self.fs.touch(Self::entry(app_path));
    }

    /// Create an application with an entry file running `body`.
    pub fn scripted_app(
        &self,
        app_path: &str,
        body: impl Fn(&mut dyn HostScope) -> Result<(), ScriptError> + Send + Sync + 'static,
    ) {
        self.engine.script(Self::entry(app_path), body);
        self.app(app_path);
    }

    /// Create a directory-only application.
    pub fn directory_app(&self, app_path: &str) {
        self.fs.add_dir(Self::dir(app_path));
    }
}
