//! # apphost-core
//!
//! Foundation types, branded IDs, and logging for the application host.
//!
//! This crate provides the shared vocabulary that the other host crates depend on:
//!
//! - **Branded IDs**: `SessionId` as a newtype for type safety
//! - **Constants**: default staleness window and entry file name
//! - **Logging**: `tracing` subscriber setup and in-memory capture for tests

#![deny(unsafe_code)]

pub mod constants;
pub mod ids;
pub mod logging;

pub use ids::SessionId;
