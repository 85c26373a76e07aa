//! Fault models.
//!
//! Client libraries report failures with their own error classes. This module
//! gives those classes one shape (`ErrorClass` + `LibraryError`) and defines the
//! small closed set of buckets (`FaultKind`) callers act on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error class of a failure raised by a client library.
///
/// Mirrors the usual database client error hierarchy: `Error` is the root,
/// `Interface` and `Database` derive from it, and the remaining database
/// classes derive from `Database`. `Io` and `Other` sit outside the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorClass {
    Error,
    Interface,
    Database,
    Data,
    Operational,
    Integrity,
    Internal,
    Programming,
    NotSupported,
    /// Low-level socket or file I/O failure that escaped the library's own mapping.
    Io,
    /// Anything else (bad arguments, missing parameters, ...).
    Other,
}

impl ErrorClass {
    pub const ALL: [ErrorClass; 11] = [
        Self::Error,
        Self::Interface,
        Self::Database,
        Self::Data,
        Self::Operational,
        Self::Integrity,
        Self::Internal,
        Self::Programming,
        Self::NotSupported,
        Self::Io,
        Self::Other,
    ];

    /// The class this one derives from, if any.
    pub fn parent(self) -> Option<Self> {
        match self {
            Self::Interface | Self::Database => Some(Self::Error),
            Self::Data
            | Self::Operational
            | Self::Integrity
            | Self::Internal
            | Self::Programming
            | Self::NotSupported => Some(Self::Database),
            Self::Error | Self::Io | Self::Other => None,
        }
    }

    /// Whether this class is `ancestor` or derives from it.
    pub fn is_a(self, ancestor: Self) -> bool {
        let mut current = Some(self);
        while let Some(class) = current {
            if class == ancestor {
                return true;
            }
            current = class.parent();
        }
        false
    }

    /// Get the display name for this error class.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Error => "Error",
            Self::Interface => "InterfaceError",
            Self::Database => "DatabaseError",
            Self::Data => "DataError",
            Self::Operational => "OperationalError",
            Self::Integrity => "IntegrityError",
            Self::Internal => "InternalError",
            Self::Programming => "ProgrammingError",
            Self::NotSupported => "NotSupportedError",
            Self::Io => "IOError",
            Self::Other => "OtherError",
        }
    }

    /// Map a MySQL server error number to its error class.
    ///
    /// Numbers without an explicit entry are `Internal` below 1000 and
    /// `Operational` otherwise.
    pub fn from_mysql_errno(errno: u16) -> Self {
        match errno {
            // DB_CREATE_EXISTS, PARSE_ERROR, WRONG_DB_NAME, WRONG_TABLE_NAME,
            // FIELD_SPECIFIED_TWICE, INVALID_GROUP_FUNC_USE, UNSUPPORTED_EXTENSION,
            // TABLE_MUST_HAVE_COLUMNS, SYNTAX_ERROR, NO_SUCH_TABLE, WRONG_COLUMN_NAME,
            // CANT_DO_THIS_DURING_AN_TRANSACTION
            1007 | 1064 | 1102 | 1103 | 1110 | 1111 | 1112 | 1113 | 1149 | 1146 | 1166
            | 1179 => Self::Programming,
            // NO_DEFAULT, PRIMARY_CANT_HAVE_NULL, WARN_NULL_TO_NOTNULL, WARN_DATA_OUT_OF_RANGE,
            // WARN_DATA_TRUNCATED, TRUNCATED_WRONG_VALUE_FOR_FIELD, ILLEGAL_VALUE_FOR_TYPE,
            // DATA_TOO_LONG, DATETIME_FUNCTION_OVERFLOW
            1230 | 1171 | 1263 | 1264 | 1265 | 1366 | 1367 | 1406 | 1441 => Self::Data,
            // BAD_NULL_ERROR, DUP_ENTRY, CANNOT_ADD_FOREIGN, NO_REFERENCED_ROW,
            // ROW_IS_REFERENCED, ROW_IS_REFERENCED_2, NO_REFERENCED_ROW_2
            1048 | 1062 | 1215 | 1216 | 1217 | 1451 | 1452 => Self::Integrity,
            // WARNING_NOT_COMPLETE_ROLLBACK, NOT_SUPPORTED_YET, UNKNOWN_STORAGE_ENGINE,
            // FEATURE_DISABLED
            1196 | 1235 | 1286 | 1289 => Self::NotSupported,
            // CON_COUNT_ERROR, DBACCESS_DENIED_ERROR, ACCESS_DENIED_ERROR,
            // TABLEACCESS_DENIED_ERROR, COLUMNACCESS_DENIED_ERROR, LOCK_DEADLOCK,
            // CONSTRAINT_FAILED
            1040 | 1044 | 1045 | 1142 | 1143 | 1213 | 4025 => Self::Operational,
            n if n < 1000 => Self::Internal,
            _ => Self::Operational,
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

fn fmt_code(code: &Option<i32>) -> String {
    code.map(|c| format!(" ({c})")).unwrap_or_default()
}

/// A failure raised by a client library, before classification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{class}{}: {message}", fmt_code(.code))]
pub struct LibraryError {
    pub class: ErrorClass,
    /// Library or server error number, when one was reported.
    pub code: Option<i32>,
    pub message: String,
}

impl LibraryError {
    /// Create an error of the given class.
    pub fn new(class: ErrorClass, message: impl Into<String>) -> Self {
        Self {
            class,
            code: None,
            message: message.into(),
        }
    }

    /// Attach an error number.
    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    /// Same error, reported under another class.
    pub fn reclassified(self, class: ErrorClass) -> Self {
        Self { class, ..self }
    }

    /// Create an I/O error.
    pub fn io(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Io, message)
    }

    /// Create an interface error.
    pub fn interface(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Interface, message)
    }

    /// Create an operational error.
    pub fn operational(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Operational, message)
    }

    /// Create a programming error.
    pub fn programming(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Programming, message)
    }

    /// Create an error for a MySQL server error number.
    pub fn mysql(errno: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::from_mysql_errno(errno), message).with_code(i32::from(errno))
    }

    /// Whether this error's class is `class` or derives from it.
    pub fn is_a(&self, class: ErrorClass) -> bool {
        self.class.is_a(class)
    }

    /// The error number, when the server reported it.
    ///
    /// Client-side numbers (2000-2999) and library codes below 1000 are not
    /// server errors.
    pub fn server_errno(&self) -> Option<i32> {
        self.code.filter(|c| *c >= 1000 && !(2000..3000).contains(c))
    }

    /// Whether the server gave up waiting for a lock.
    pub fn is_lock_timeout(&self) -> bool {
        self.server_errno().is_some_and(|c| LOCK_ERRNOS.contains(&c))
    }

    /// Whether the server refused the statement itself and left the
    /// connection usable.
    pub fn is_rejected_statement(&self) -> bool {
        self.server_errno().is_some()
            && !self.is_lock_timeout()
            && !self.is_a(ErrorClass::Operational)
    }
}

/// LOCK_WAIT_TIMEOUT, LOCK_DEADLOCK, USER_LOCK_DEADLOCK, LOCK_NOWAIT
pub const LOCK_ERRNOS: [i32; 4] = [1205, 1213, 3058, 3572];

impl From<std::io::Error> for LibraryError {
    fn from(err: std::io::Error) -> Self {
        Self::io(err.to_string())
    }
}

/// Classification bucket for a library failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultKind {
    /// The connection is dead; reconnect.
    Disconnected,
    /// Closing an already broken connection failed; safe to ignore.
    CloseFailed,
    /// An advisory lock could not be taken; treat as contention.
    LockContention,
    /// The server response exceeded a hard client buffer; retrying never helps.
    PayloadTooLarge,
    /// Propagate unchanged.
    Unclassified,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::CloseFailed => "close_failed",
            Self::LockContention => "lock_contention",
            Self::PayloadTooLarge => "payload_too_large",
            Self::Unclassified => "unclassified",
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
