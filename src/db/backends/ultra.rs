//! Adapter for the minimal fast client.
//!
//! The client reuses the pure client's error layer but maps only a handful of
//! its own failures, so several kinds escape in the wrong shape:
//!
//! - raw I/O errors, which the storage layer would not recognize as a dead
//!   connection;
//! - "cursor closed" programming errors, seen during aborts and with prepared
//!   statements, which also mean the connection is gone;
//! - `(0, "Socket receive buffer full")` when a response exceeds its fixed
//!   16 MiB receive buffer. Retrying reads the same 16 MiB and fails again.
//!
//! It also doesn't accept named parameters, so those are rewritten to
//! positional form before the query reaches it.

use crate::db::adapter::{DriverAdapter, ExceptionSets};
use crate::db::backends::pure::pure_exceptions;
use crate::db::library::{Backend, ClientLibrary, Connection, Cursor, CursorOptions};
use crate::db::params::RewriteCache;
use crate::models::{ConnectParams, ErrorClass, LibraryError, Params, Row, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Size of the client's fixed receive and send buffers.
pub const RECEIVE_BUFFER_LIMIT: usize = 16 * 1024 * 1024;

const RECEIVE_BUFFER_FULL: &str = "Socket receive buffer full";
const CURSOR_CLOSED: &str = "cursor closed";

pub struct UltraMysqlDriver {
    library: Arc<dyn ClientLibrary>,
    exceptions: ExceptionSets,
    rewrites: Arc<RewriteCache>,
}

impl UltraMysqlDriver {
    pub fn new(library: Arc<dyn ClientLibrary>) -> Self {
        Self {
            library,
            exceptions: pure_exceptions(),
            rewrites: Arc::new(RewriteCache::new()),
        }
    }

    /// Named-parameter rewrites shared by every connection of this adapter.
    pub fn rewrites(&self) -> &RewriteCache {
        &self.rewrites
    }
}

impl DriverAdapter for UltraMysqlDriver {
    fn name(&self) -> &str {
        Backend::UltraMysql.driver_name()
    }

    fn backend(&self) -> Backend {
        Backend::UltraMysql
    }

    fn exceptions(&self) -> &ExceptionSets {
        &self.exceptions
    }

    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Connection>, LibraryError> {
        let inner = self.library.connect(params)?;
        Ok(Box::new(UltraConnection {
            inner,
            library: Arc::clone(&self.library),
            params: params.clone(),
            rewrites: Arc::clone(&self.rewrites),
        }))
    }

    /// The client crashes on the library's mutable binary buffers; plain bytes
    /// are fine.
    fn binary(&self, data: &[u8]) -> Value {
        Value::Bytes(data.to_vec())
    }

    fn escape_bytes(&self, data: &[u8]) -> Result<Vec<u8>, LibraryError> {
        self.library.escape_bytes(data)
    }

    fn is_payload_too_large(&self, err: &LibraryError) -> bool {
        is_receive_buffer_full(err)
    }
}

fn is_receive_buffer_full(err: &LibraryError) -> bool {
    err.class == ErrorClass::Internal && err.code == Some(0) && err.message == RECEIVE_BUFFER_FULL
}

/// Connection that remembers how it was opened.
pub struct UltraConnection {
    inner: Box<dyn Connection>,
    library: Arc<dyn ClientLibrary>,
    params: ConnectParams,
    rewrites: Arc<RewriteCache>,
}

impl Connection for UltraConnection {
    fn cursor(&mut self, options: CursorOptions) -> Result<Box<dyn Cursor + '_>, LibraryError> {
        let rewrites = Arc::clone(&self.rewrites);
        let inner = self.inner.cursor(options).map_err(reshape_io)?;
        Ok(Box::new(UltraCursor { inner, rewrites }))
    }

    fn set_autocommit(&mut self, on: bool) -> Result<(), LibraryError> {
        self.inner.set_autocommit(on)
    }

    fn commit(&mut self) -> Result<(), LibraryError> {
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<(), LibraryError> {
        self.inner.rollback()
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }

    fn close(&mut self) -> Result<(), LibraryError> {
        self.inner.close()
    }

    /// Replace a dead connection with a fresh one to the same server.
    ///
    /// Any connection arguments the caller might pass are ignored; the ones
    /// captured at connect time are reused.
    fn reconnect(&mut self) -> Result<(), LibraryError> {
        if self.inner.is_connected() {
            return Err(LibraryError::programming(
                "reconnect called on a live connection",
            ));
        }
        if let Err(e) = self.inner.close() {
            debug!(error = %e, "Ignoring close failure on dead connection");
        }
        self.inner = self.library.connect(&self.params)?;
        debug!(host = %self.params.host, port = self.params.port, "Reconnected");
        Ok(())
    }
}

struct UltraCursor<'c> {
    inner: Box<dyn Cursor + 'c>,
    rewrites: Arc<RewriteCache>,
}

impl Cursor for UltraCursor<'_> {
    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, LibraryError> {
        let (sql, params) = self.rewrites.to_positional(sql, params)?;
        self.inner.execute(&sql, &params).map_err(|err| {
            warn_on_lock_failure(&sql, &err);
            reshape(err)
        })
    }

    fn fetch_all(&mut self) -> Result<Vec<Row>, LibraryError> {
        self.inner.fetch_all().map_err(reshape)
    }

    fn close(&mut self) -> Result<(), LibraryError> {
        self.inner.close()
    }
}

/// Give escaped failures the class the storage layer expects.
fn reshape(err: LibraryError) -> LibraryError {
    if err.class == ErrorClass::Programming && err.message == CURSOR_CLOSED {
        return err.reclassified(ErrorClass::Interface);
    }
    reshape_io(err)
}

fn reshape_io(err: LibraryError) -> LibraryError {
    if err.class == ErrorClass::Io {
        return err.reclassified(ErrorClass::Interface);
    }
    err
}

/// Advisory lock queries are where the client's odd responses show up.
fn warn_on_lock_failure(sql: &str, err: &LibraryError) {
    if !sql.contains("GET_LOCK") {
        return;
    }
    if is_receive_buffer_full(err) {
        warn!(
            error = %err,
            limit = RECEIVE_BUFFER_LIMIT,
            "GET_LOCK response exceeded the receive buffer"
        );
    } else {
        warn!(error = %err, sql = %sql, "GET_LOCK query failed");
    }
}
