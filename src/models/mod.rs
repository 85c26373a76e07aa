//! Data models for the MySQL driver registry.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod fault;
pub mod query;
pub mod runtime;

// Re-export commonly used types
pub use connection::{ConnectParams, DEFAULT_MYSQL_PORT};
pub use fault::{ErrorClass, FaultKind, LibraryError};
pub use query::{Params, Row, Value};
pub use runtime::{EMPTY_ESCAPE_FIXED_IN, HostRuntime, RuntimeKind, parse_runtime_version};
