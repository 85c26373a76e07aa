//! Adapter for the native C client binding.

use crate::db::adapter::{DriverAdapter, ExceptionSets};
use crate::db::library::{Backend, ClientLibrary, Connection};
use crate::models::{ConnectParams, LibraryError, Value};
use std::sync::Arc;

pub struct MysqlClientDriver {
    library: Arc<dyn ClientLibrary>,
    exceptions: ExceptionSets,
}

impl MysqlClientDriver {
    pub fn new(library: Arc<dyn ClientLibrary>) -> Self {
        Self {
            library,
            exceptions: ExceptionSets::standard(),
        }
    }
}

impl DriverAdapter for MysqlClientDriver {
    fn name(&self) -> &str {
        Backend::MysqlClient.driver_name()
    }

    fn backend(&self) -> Backend {
        Backend::MysqlClient
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
        self.library.escape_bytes(data)
    }
}
