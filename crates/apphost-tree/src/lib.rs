//! # apphost-tree
//!
//! Hierarchical application scopes backed by directories on disk.
//!
//! Every directory under the configured `www` root can host an application:
//! an entry file that runs in its own scope. Scopes inherit from their
//! parent's scope, so a child application sees what its ancestors define
//! unless it shadows it.
//!
//! - [`tree::ApplicationTree`] resolves paths, opens and loads applications
//!   lazily, and tears them down partially or fully.
//! - [`scope::ScopeEnvironment`] holds one application's entries, children
//!   and bound client sessions.
//! - [`engine::ScriptEngine`] is the seam to the embedded interpreter.
//! - [`watch::FileProbe`] is the seam to the filesystem.
//! - [`handler::ServiceHandler`] receives start and stop notifications.

#![deny(unsafe_code)]

pub mod data;
pub mod engine;
pub mod errors;
pub mod handler;
pub mod node;
pub mod path;
pub mod property;
pub mod scope;
pub mod session;
pub mod staleness;
pub mod tree;
pub mod watch;

pub use data::{DataHandle, DataStore, DataTable};
pub use engine::{EngineScopeId, HostScope, ScopeHandle, ScriptEngine};
pub use errors::{AppError, ErrorKind, Result, ScriptError};
pub use handler::{AppInfo, LoggingHandler, ServiceHandler};
pub use node::{AppStatus, ApplicationNode, NodeId};
pub use property::{ChildScope, Property, ScopeRef, StructuralKey};
pub use session::{AppBinding, ClientSession};
pub use tree::{ApplicationTree, ScopeCursor, SharedTree, TreeConfig};
pub use watch::{FileProbe, LocalFs};
