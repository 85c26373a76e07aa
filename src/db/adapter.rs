//! Driver adapter interface.
//!
//! Every backend is wrapped in one adapter exposing the same capability set:
//! connect, cursor, autocommit, binary literals, escaping and fault
//! classification. Shared behavior lives in [`AdapterDefaults`]; backends call
//! into it instead of inheriting from one another.

use crate::db::library::{Backend, Connection, Cursor, CursorOptions};
use crate::error::DriverError;
use crate::models::{ConnectParams, ErrorClass, FaultKind, LibraryError, Value};
use tracing::debug;

/// Error classes an adapter expects on each code path.
///
/// The raw sets overlap: anything that means "disconnected" is also expected
/// while closing. Use the membership checks when the failing operation is
/// known (a close, a lock query). [`ExceptionSets::classify`] derives disjoint
/// buckets from them for failures without that context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionSets {
    pub disconnected: Vec<ErrorClass>,
    /// Expected from `close()`.
    pub close: Vec<ErrorClass>,
    /// Expected from a query taking an advisory lock.
    pub lock: Vec<ErrorClass>,
    /// Failures after which a replica should be tried instead.
    pub use_replica: Vec<ErrorClass>,
}

impl ExceptionSets {
    /// Sets shared by every standard client library.
    ///
    /// If we get a disconnected error we should still be able to close.
    pub fn standard() -> Self {
        let disconnected = vec![ErrorClass::Operational, ErrorClass::Interface];
        let mut close = disconnected.clone();
        close.push(ErrorClass::Programming);
        Self {
            disconnected,
            close,
            lock: vec![ErrorClass::Database],
            use_replica: vec![ErrorClass::Operational],
        }
    }

    pub fn with_disconnected(mut self, extra: &[ErrorClass]) -> Self {
        self.disconnected.extend_from_slice(extra);
        self
    }

    pub fn with_close(mut self, extra: &[ErrorClass]) -> Self {
        self.close.extend_from_slice(extra);
        self
    }

    pub fn is_disconnected(&self, err: &LibraryError) -> bool {
        matches_any(&self.disconnected, err)
    }

    pub fn is_close_failure(&self, err: &LibraryError) -> bool {
        matches_any(&self.close, err)
    }

    pub fn is_lock_failure(&self, err: &LibraryError) -> bool {
        matches_any(&self.lock, err)
    }

    pub fn use_replica(&self, err: &LibraryError) -> bool {
        matches_any(&self.use_replica, err)
    }

    /// Bucket for a failure whose code path is unknown.
    ///
    /// The buckets never overlap:
    ///
    /// - lock contention is the server's lock timeout and deadlock errors;
    /// - a statement the server rejected (syntax, duplicate key, ...) leaves
    ///   the connection usable and is never bucketed;
    /// - disconnected is the rest of the `disconnected` set;
    /// - close failure is what only `close` claims.
    pub fn classify(&self, err: &LibraryError) -> FaultKind {
        if in_lock_bucket(err) {
            FaultKind::LockContention
        } else if self.in_disconnected_bucket(err) {
            FaultKind::Disconnected
        } else if self.in_close_bucket(err) {
            FaultKind::CloseFailed
        } else {
            FaultKind::Unclassified
        }
    }

    fn in_disconnected_bucket(&self, err: &LibraryError) -> bool {
        !err.is_lock_timeout() && !err.is_rejected_statement() && self.is_disconnected(err)
    }

    fn in_close_bucket(&self, err: &LibraryError) -> bool {
        !err.is_lock_timeout()
            && !err.is_rejected_statement()
            && !self.is_disconnected(err)
            && self.is_close_failure(err)
    }
}

fn in_lock_bucket(err: &LibraryError) -> bool {
    err.is_lock_timeout()
}

fn matches_any(set: &[ErrorClass], err: &LibraryError) -> bool {
    set.iter().any(|class| err.is_a(*class))
}

/// Uniform capability set over one client library.
pub trait DriverAdapter: Send + Sync {
    /// Display name; also the registry key.
    fn name(&self) -> &str;

    fn backend(&self) -> Backend;

    fn exceptions(&self) -> &ExceptionSets;

    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Connection>, LibraryError>;

    fn cursor<'c>(
        &self,
        conn: &'c mut dyn Connection,
    ) -> Result<Box<dyn Cursor + 'c>, LibraryError> {
        AdapterDefaults::cursor(conn)
    }

    fn set_autocommit(&self, conn: &mut dyn Connection, on: bool) -> Result<(), LibraryError> {
        AdapterDefaults::set_autocommit(conn, on)
    }

    fn binary(&self, data: &[u8]) -> Value;

    fn escape_bytes(&self, data: &[u8]) -> Result<Vec<u8>, LibraryError>;

    /// Whether `err` reports a response larger than the library can ever receive.
    fn is_payload_too_large(&self, _err: &LibraryError) -> bool {
        false
    }
}

/// Behavior shared by adapters that don't need a library-specific quirk.
pub struct AdapterDefaults;

impl AdapterDefaults {
    pub fn cursor<'c>(conn: &'c mut dyn Connection) -> Result<Box<dyn Cursor + 'c>, LibraryError> {
        conn.cursor(CursorOptions::default())
    }

    pub fn set_autocommit(conn: &mut dyn Connection, on: bool) -> Result<(), LibraryError> {
        conn.set_autocommit(on)
    }
}

/// Classify a library failure into exactly one bucket.
///
/// The adapter's payload predicate is carved out first; everything else goes
/// through [`ExceptionSets::classify`].
pub fn classify_exception(adapter: &dyn DriverAdapter, err: &LibraryError) -> FaultKind {
    if adapter.is_payload_too_large(err) {
        return FaultKind::PayloadTooLarge;
    }
    adapter.exceptions().classify(err)
}

/// Close `conn`, ignoring the failures the adapter expects from a close.
pub fn close_connection(
    adapter: &dyn DriverAdapter,
    conn: &mut dyn Connection,
) -> Result<(), DriverError> {
    match conn.close() {
        Ok(()) => Ok(()),
        Err(e) if adapter.exceptions().is_close_failure(&e) => {
            debug!(driver = adapter.name(), error = %e, "Ignoring close failure");
            Ok(())
        }
        Err(e) => Err(classify_error(adapter, e)),
    }
}

/// Lift a library failure into the crate's error taxonomy.
pub fn classify_error(adapter: &dyn DriverAdapter, err: LibraryError) -> DriverError {
    let driver = adapter.name();
    match classify_exception(adapter, &err) {
        FaultKind::Disconnected => DriverError::disconnected(driver, err),
        FaultKind::CloseFailed => DriverError::close_failed(driver, err),
        FaultKind::LockContention => DriverError::lock_contention(driver, err),
        FaultKind::PayloadTooLarge => DriverError::payload_too_large(
            driver,
            "response exceeded the client's receive buffer; \
             reduce the server's max_allowed_packet setting",
            err,
        ),
        FaultKind::Unclassified => DriverError::Library(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_sets() {
        let sets = ExceptionSets::standard();
        assert!(sets.is_disconnected(&LibraryError::operational("gone")));
        assert!(sets.is_disconnected(&LibraryError::interface("closed")));
        assert!(!sets.is_disconnected(&LibraryError::programming("syntax")));
        assert!(sets.is_close_failure(&LibraryError::programming("closed")));
        assert!(sets.is_lock_failure(&LibraryError::new(ErrorClass::Integrity, "dup")));
        assert!(!sets.is_lock_failure(&LibraryError::io("reset")));
        assert!(sets.use_replica(&LibraryError::operational("gone")));
        assert!(!sets.use_replica(&LibraryError::interface("closed")));
    }

    #[test]
    fn test_standard_classify() {
        let sets = ExceptionSets::standard();
        let kind = |err: LibraryError| sets.classify(&err);

        assert_eq!(kind(LibraryError::operational("gone")), FaultKind::Disconnected);
        assert_eq!(kind(LibraryError::mysql(2013, "Lost connection")), FaultKind::Disconnected);
        assert_eq!(
            kind(LibraryError::programming("closing a closed connection")),
            FaultKind::CloseFailed
        );
        assert_eq!(kind(LibraryError::mysql(1064, "syntax")), FaultKind::Unclassified);
        assert_eq!(kind(LibraryError::mysql(1062, "Duplicate entry")), FaultKind::Unclassified);
        assert_eq!(kind(LibraryError::mysql(1205, "Lock wait timeout")), FaultKind::LockContention);
        assert_eq!(kind(LibraryError::mysql(1213, "Deadlock found")), FaultKind::LockContention);
    }

    #[test]
    fn test_buckets_are_disjoint() {
        let standard = ExceptionSets::standard();
        let wide = ExceptionSets::standard()
            .with_close(&[ErrorClass::Error, ErrorClass::Io, ErrorClass::Database])
            .with_disconnected(&[ErrorClass::Io, ErrorClass::Database]);
        let codes = [None, Some(0), Some(1062), Some(1064), Some(1205), Some(1213), Some(2006)];

        for sets in [standard, wide] {
            for class in ErrorClass::ALL {
                for code in codes {
                    let mut err = LibraryError::new(class, "x");
                    err.code = code;
                    let hits = [
                        in_lock_bucket(&err),
                        sets.in_disconnected_bucket(&err),
                        sets.in_close_bucket(&err),
                    ];
                    assert!(hits.iter().filter(|h| **h).count() <= 1, "{err}");
                }
            }
        }
    }

    #[test]
    fn test_extended_sets() {
        let sets = ExceptionSets::standard().with_disconnected(&[ErrorClass::Io]);
        assert!(sets.is_disconnected(&LibraryError::io("reset")));
        let sets = ExceptionSets::standard().with_close(&[ErrorClass::Error]);
        assert!(sets.is_close_failure(&LibraryError::new(ErrorClass::Error, "plain")));
    }
}
