//! Driver layer.
//!
//! This module provides:
//! - The client library contract and library detection
//! - One adapter per backend, with fault classification
//! - The driver registry and preferred-driver selection
//! - Parameter-style conversion and byte escaping
//! - A sqlx-backed client library (feature `sqlx`)

pub mod adapter;
pub mod backends;
pub mod escape;
pub mod library;
pub mod params;
pub mod registry;
#[cfg(feature = "sqlx")]
pub mod sqlx_binding;

pub use adapter::{
    AdapterDefaults, DriverAdapter, ExceptionSets, classify_error, classify_exception,
    close_connection,
};
pub use backends::adapters_for;
pub use library::{
    Backend, ClientLibrary, Connection, Cursor, CursorOptions, LibraryProbe, StaticProbe,
    default_probe,
};
pub use params::{RewriteCache, format_to_qmark, rewrite_named};
pub use registry::{DriverRegistry, DriverSummary};
