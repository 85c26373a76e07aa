//! Client library contract.
//!
//! A client library is whatever actually speaks the MySQL protocol. This crate
//! never does; it only sees libraries through these traits. The probe answers
//! which libraries are present in this process.

use crate::models::{ConnectParams, LibraryError, Params, Row, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Known backends, in detection order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Binding to the native C client library.
    MysqlClient,
    /// Pure implementation of the client protocol.
    PureMysql,
    /// Vendor connector, optionally accelerated by a native extension.
    Connector,
    /// Minimal fast client built on the pure client's error layer.
    UltraMysql,
}

impl Backend {
    /// All backends, in the order they are probed.
    pub const ALL: [Backend; 4] = [
        Backend::MysqlClient,
        Backend::PureMysql,
        Backend::Connector,
        Backend::UltraMysql,
    ];

    /// Registry name of this backend's primary adapter.
    pub fn driver_name(&self) -> &'static str {
        match self {
            Self::MysqlClient => "MySQLClient",
            Self::PureMysql => "PureMySQL",
            Self::Connector => "MySQL Connector",
            Self::UltraMysql => "UltraMySQL",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.driver_name())
    }
}

/// Cursor flavors a connection can hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorOptions {
    /// Fetch the whole result set up front.
    pub buffered: bool,
    /// Use server-side prepared statements.
    pub prepared: bool,
}

impl Default for CursorOptions {
    fn default() -> Self {
        Self {
            buffered: true,
            prepared: false,
        }
    }
}

impl CursorOptions {
    pub fn unbuffered() -> Self {
        Self {
            buffered: false,
            prepared: false,
        }
    }
}

/// A loaded client library.
pub trait ClientLibrary: Send + Sync {
    /// Open a connection.
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Connection>, LibraryError>;

    /// Build the library's binary literal for `data`.
    fn binary(&self, data: &[u8]) -> Value {
        Value::Bytes(data.to_vec())
    }

    /// Escape a byte string for inclusion in a quoted SQL literal.
    fn escape_bytes(&self, data: &[u8]) -> Result<Vec<u8>, LibraryError>;

    /// Whether the library ships a native (C) extension.
    fn has_native_extension(&self) -> bool {
        false
    }
}

/// An open connection owned by a client library.
pub trait Connection: Send {
    fn cursor(&mut self, options: CursorOptions) -> Result<Box<dyn Cursor + '_>, LibraryError>;

    fn set_autocommit(&mut self, on: bool) -> Result<(), LibraryError>;

    fn commit(&mut self) -> Result<(), LibraryError>;

    fn rollback(&mut self) -> Result<(), LibraryError>;

    fn is_connected(&self) -> bool;

    fn close(&mut self) -> Result<(), LibraryError>;

    /// Re-open a dead connection with the parameters it was opened with.
    fn reconnect(&mut self) -> Result<(), LibraryError> {
        Err(LibraryError::new(
            crate::models::ErrorClass::NotSupported,
            "reconnect is not supported by this library",
        ))
    }
}

/// A cursor over one connection.
pub trait Cursor {
    /// Run a statement; returns the affected (or fetched) row count.
    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, LibraryError>;

    /// Rows produced by the last statement.
    fn fetch_all(&mut self) -> Result<Vec<Row>, LibraryError>;

    fn close(&mut self) -> Result<(), LibraryError> {
        Ok(())
    }
}

/// Answers whether a backend's client library is present.
pub trait LibraryProbe {
    fn probe(&self, backend: Backend) -> Option<Arc<dyn ClientLibrary>>;
}

/// Probe over an explicit set of libraries.
#[derive(Default, Clone)]
pub struct StaticProbe {
    libraries: HashMap<Backend, Arc<dyn ClientLibrary>>,
}

impl StaticProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a library for a backend, replacing any earlier one.
    pub fn with(mut self, backend: Backend, library: Arc<dyn ClientLibrary>) -> Self {
        self.register(backend, library);
        self
    }

    pub fn register(&mut self, backend: Backend, library: Arc<dyn ClientLibrary>) {
        self.libraries.insert(backend, library);
    }

    pub fn contains(&self, backend: Backend) -> bool {
        self.libraries.contains_key(&backend)
    }
}

impl LibraryProbe for StaticProbe {
    fn probe(&self, backend: Backend) -> Option<Arc<dyn ClientLibrary>> {
        self.libraries.get(&backend).cloned()
    }
}

impl std::fmt::Debug for StaticProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut backends: Vec<_> = self.libraries.keys().collect();
        backends.sort_by_key(|b| Backend::ALL.iter().position(|x| x == *b));
        f.debug_struct("StaticProbe")
            .field("backends", &backends)
            .finish()
    }
}

/// Probe over the client libraries compiled into this build.
pub fn default_probe() -> StaticProbe {
    #[allow(unused_mut)]
    let mut probe = StaticProbe::new();

    #[cfg(feature = "sqlx")]
    {
        match crate::db::sqlx_binding::SqlxLibrary::new() {
            Ok(library) => probe.register(Backend::PureMysql, Arc::new(library)),
            Err(e) => tracing::warn!(error = %e, "sqlx client library unavailable"),
        }
    }

    probe
}
