//! Adapter for the pure client implementation.

use crate::db::adapter::{DriverAdapter, ExceptionSets};
use crate::db::escape::EmptyEscapeGuard;
use crate::db::library::{Backend, ClientLibrary, Connection};
use crate::models::{ConnectParams, ErrorClass, HostRuntime, LibraryError, Value};
use std::sync::Arc;

/// Fault sets of the pure client and of clients built on its error layer.
///
/// Closing an already closed connection raises a plain `Error`, sometimes a
/// `DatabaseError`, and I/O errors can escape the library's mapping entirely.
/// A `DatabaseError` outside the close path has only been seen as "socket
/// receive buffer full", which means the connection is unusable.
pub fn pure_exceptions() -> ExceptionSets {
    ExceptionSets::standard()
        .with_close(&[ErrorClass::Error, ErrorClass::Io, ErrorClass::Database])
        .with_disconnected(&[ErrorClass::Io, ErrorClass::Database])
}

pub struct PureMysqlDriver {
    library: Arc<dyn ClientLibrary>,
    exceptions: ExceptionSets,
    escape_guard: EmptyEscapeGuard,
}

impl PureMysqlDriver {
    pub fn new(library: Arc<dyn ClientLibrary>, runtime: &HostRuntime) -> Self {
        let escape_guard = EmptyEscapeGuard::new(runtime.needs_empty_escape_guard());
        if escape_guard.is_enabled() {
            tracing::debug!(runtime = %runtime, "Guarding empty byte escapes");
        }
        Self {
            library,
            exceptions: pure_exceptions(),
            escape_guard,
        }
    }

    pub fn escape_guard(&self) -> EmptyEscapeGuard {
        self.escape_guard
    }
}

impl DriverAdapter for PureMysqlDriver {
    fn name(&self) -> &str {
        Backend::PureMysql.driver_name()
    }

    fn backend(&self) -> Backend {
        Backend::PureMysql
    }

    fn exceptions(&self) -> &ExceptionSets {
        &self.exceptions
    }

    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Connection>, LibraryError> {
        self.library.connect(params)
    }

    fn binary(&self, data: &[u8]) -> Value {
        self.library.binary(data)
    }

    fn escape_bytes(&self, data: &[u8]) -> Result<Vec<u8>, LibraryError> {
        self.escape_guard
            .escape(data, |d| self.library.escape_bytes(d))
    }
}
