//! Adapter for the vendor connector.
//!
//! The connector defaults to its slower pure mode even when the native
//! extension is installed, so the native mode has to be requested at connect
//! time. The native mode does not support prepared cursors.

use crate::db::adapter::{DriverAdapter, ExceptionSets};
use crate::db::library::{Backend, ClientLibrary, Connection, Cursor, CursorOptions};
use crate::models::{ConnectParams, LibraryError, Value};
use std::sync::Arc;

pub const NATIVE_CONNECTOR_NAME: &str = "C MySQL Connector";
pub const PURE_CONNECTOR_NAME: &str = "Py MySQL Connector";

pub struct ConnectorDriver {
    name: &'static str,
    library: Arc<dyn ClientLibrary>,
    exceptions: ExceptionSets,
    use_native: bool,
}

impl ConnectorDriver {
    /// Adapter using the native extension whenever the library has one.
    pub fn new(library: Arc<dyn ClientLibrary>) -> Self {
        let use_native = library.has_native_extension();
        Self {
            name: Backend::Connector.driver_name(),
            library,
            exceptions: ExceptionSets::standard(),
            use_native,
        }
    }

    /// Adapter that always leaves the library in pure mode.
    pub fn pure(library: Arc<dyn ClientLibrary>) -> Self {
        Self {
            name: PURE_CONNECTOR_NAME,
            library,
            exceptions: ExceptionSets::standard(),
            use_native: false,
        }
    }

    pub fn uses_native(&self) -> bool {
        self.use_native
    }
}

impl DriverAdapter for ConnectorDriver {
    fn name(&self) -> &str {
        self.name
    }

    fn backend(&self) -> Backend {
        Backend::Connector
    }

    fn exceptions(&self) -> &ExceptionSets {
        &self.exceptions
    }

    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Connection>, LibraryError> {
        if self.use_native {
            let params = params.clone().with_option("use_pure", "false");
            return self.library.connect(&params);
        }
        self.library.connect(params)
    }

    /// Unbuffered, unprepared. The pure mode is much faster when it doesn't
    /// read the whole result up front.
    fn cursor<'c>(
        &self,
        conn: &'c mut dyn Connection,
    ) -> Result<Box<dyn Cursor + 'c>, LibraryError> {
        conn.cursor(CursorOptions::unbuffered())
    }

    fn binary(&self, data: &[u8]) -> Value {
        self.library.binary(data)
    }

    fn escape_bytes(&self, data: &[u8]) -> Result<Vec<u8>, LibraryError> {
        self.library.escape_bytes(data)
    }
}
