//! One adapter per known backend.

pub mod connector;
pub mod mysqlclient;
pub mod pure;
pub mod ultra;

pub use connector::{ConnectorDriver, NATIVE_CONNECTOR_NAME, PURE_CONNECTOR_NAME};
pub use mysqlclient::MysqlClientDriver;
pub use pure::{PureMysqlDriver, pure_exceptions};
pub use ultra::{RECEIVE_BUFFER_LIMIT, UltraConnection, UltraMysqlDriver};

use crate::db::adapter::DriverAdapter;
use crate::db::library::{Backend, ClientLibrary};
use crate::models::HostRuntime;
use std::sync::Arc;

/// Build the registry entries for a loaded backend.
///
/// Most backends register one adapter under one name. The connector also
/// registers its native and pure modes; without a native extension both
/// extra names point at the same pure adapter.
pub fn adapters_for(
    backend: Backend,
    library: Arc<dyn ClientLibrary>,
    runtime: &HostRuntime,
) -> Vec<(String, Arc<dyn DriverAdapter>)> {
    let primary = |adapter: Arc<dyn DriverAdapter>| vec![(backend.driver_name().to_string(), adapter)];

    match backend {
        Backend::MysqlClient => primary(Arc::new(MysqlClientDriver::new(library))),
        Backend::PureMysql => primary(Arc::new(PureMysqlDriver::new(library, runtime))),
        Backend::UltraMysql => primary(Arc::new(UltraMysqlDriver::new(library))),
        Backend::Connector => {
            let native = library.has_native_extension();
            let main: Arc<dyn DriverAdapter> = Arc::new(ConnectorDriver::new(Arc::clone(&library)));
            let mut entries = primary(Arc::clone(&main));
            if native {
                entries.push((NATIVE_CONNECTOR_NAME.to_string(), main));
                entries.push((
                    PURE_CONNECTOR_NAME.to_string(),
                    Arc::new(ConnectorDriver::pure(library)),
                ));
            } else {
                entries.push((PURE_CONNECTOR_NAME.to_string(), main));
            }
            entries
        }
    }
}
