//! Error types for the application tree.
//!
//! [`AppError`] is cloneable because a node keeps its last load failure and
//! hands the same value back to every caller until the next filesystem check.

use serde::Serialize;
use thiserror::Error;

use crate::node::NodeId;

/// Error raised by the script engine while compiling, running, or calling
/// into an application scope.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ScriptError {
    /// Engine-provided description.
    pub message: String,
}

impl ScriptError {
    /// Create a script error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Coarse classification of an [`AppError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// No backing directory or file.
    NotFound,
    /// Compile or execution error in an existing file.
    LoadFailed,
    /// An `onStart`/`onStop` hook raised an error.
    HookFailed,
    /// Operation attempted on a node mid-transition.
    InvalidState,
    /// The engine could not allocate a scope identity.
    ScopeAllocation,
    /// The node ID does not refer to a live node.
    UnknownNode,
}

/// Errors returned by tree operations.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AppError {
    /// No backing file or directory exists for the path.
    #[error("application {path} doesn't exist")]
    NotFound {
        /// Application path.
        path: String,
    },

    /// The backing file exists but failed to compile or run.
    #[error("application {path} failed to load: {message}")]
    LoadFailed {
        /// Application path.
        path: String,
        /// Engine error message.
        message: String,
    },

    /// A lifecycle hook failed. Reported, never propagated out of open/close.
    #[error("hook {hook} of application {path} failed: {message}")]
    HookFailed {
        /// Application path.
        path: String,
        /// Hook name (`onStart` or `onStop`).
        hook: String,
        /// Engine error message.
        message: String,
    },

    /// The node is in a state that does not allow the operation.
    #[error("application {path}: {reason}")]
    InvalidState {
        /// Application path.
        path: String,
        /// What was wrong.
        reason: String,
    },

    /// The engine refused to allocate a scope identity.
    #[error("could not allocate a scope for application {path}: {message}")]
    ScopeAllocation {
        /// Application path.
        path: String,
        /// Engine error message.
        message: String,
    },

    /// The node was removed or never existed.
    #[error("node {0} is not part of the application tree")]
    UnknownNode(NodeId),
}

impl AppError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::LoadFailed { .. } => ErrorKind::LoadFailed,
            Self::HookFailed { .. } => ErrorKind::HookFailed,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::ScopeAllocation { .. } => ErrorKind::ScopeAllocation,
            Self::UnknownNode(_) => ErrorKind::UnknownNode,
        }
    }

    pub(crate) fn invalid_state(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidState {
            path: path.to_owned(),
            reason: reason.into(),
        }
    }
}

/// Result type for tree operations.
pub type Result<T> = std::result::Result<T, AppError>;
