//! MySQL driver registry.
//!
//! Detects which MySQL client libraries are available, wraps each in a uniform
//! adapter, classifies library failures into a small set of fault kinds and
//! picks a preferred driver, with an environment override.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::{Config, DriverOptions};
pub use db::{DriverAdapter, DriverRegistry, classify_error, classify_exception};
pub use error::{DriverError, DriverResult};
pub use models::FaultKind;
