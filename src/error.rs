//! Error types for the MySQL driver registry.
//!
//! This module defines all error types using `thiserror` for ergonomic error handling.
//! Library faults are classified once, close to where they are raised, so that callers
//! branch on a small closed set of variants instead of library-specific error classes.

use crate::models::{FaultKind, LibraryError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DriverError {
    #[error("Driver not found: {name} (available: {})", available.join(", "))]
    DriverNotFound { name: String, available: Vec<String> },

    #[error("Configuration error: {message}")]
    Configuration { message: String, suggestion: String },

    #[error("Disconnected ({driver}): {source}")]
    Disconnected {
        driver: String,
        #[source]
        source: LibraryError,
    },

    #[error("Close failed ({driver}): {source}")]
    CloseFailed {
        driver: String,
        #[source]
        source: LibraryError,
    },

    #[error("Lock contention ({driver}): {source}")]
    LockContention {
        driver: String,
        #[source]
        source: LibraryError,
    },

    #[error("Payload too large ({driver}): {message}")]
    PayloadTooLarge {
        driver: String,
        message: String,
        #[source]
        source: LibraryError,
    },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error(transparent)]
    Library(#[from] LibraryError),
}

impl DriverError {
    /// Create a driver not found error.
    pub fn driver_not_found(name: impl Into<String>, available: Vec<String>) -> Self {
        Self::DriverNotFound {
            name: name.into(),
            available,
        }
    }

    /// Create a configuration error with a helpful suggestion.
    pub fn configuration(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a disconnected error.
    pub fn disconnected(driver: impl Into<String>, source: LibraryError) -> Self {
        Self::Disconnected {
            driver: driver.into(),
            source,
        }
    }

    /// Create a close failed error.
    pub fn close_failed(driver: impl Into<String>, source: LibraryError) -> Self {
        Self::CloseFailed {
            driver: driver.into(),
            source,
        }
    }

    /// Create a lock contention error.
    pub fn lock_contention(driver: impl Into<String>, source: LibraryError) -> Self {
        Self::LockContention {
            driver: driver.into(),
            source,
        }
    }

    /// Create a payload too large error.
    pub fn payload_too_large(
        driver: impl Into<String>,
        message: impl Into<String>,
        source: LibraryError,
    ) -> Self {
        Self::PayloadTooLarge {
            driver: driver.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Configuration { suggestion, .. } => Some(suggestion),
            Self::DriverNotFound { .. } => Some("Pick one of the available driver names"),
            Self::Disconnected { .. } => Some("Reconnect and retry the operation"),
            Self::PayloadTooLarge { .. } => {
                Some("Reduce the server's max_allowed_packet setting or the blob chunk size")
            }
            _ => None,
        }
    }

    /// Check if this error is retryable.
    ///
    /// A payload that overflowed the client's buffer will overflow it again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Disconnected { .. } | Self::LockContention { .. })
    }

    /// The classification bucket this error belongs to.
    pub fn fault_kind(&self) -> FaultKind {
        match self {
            Self::Disconnected { .. } => FaultKind::Disconnected,
            Self::CloseFailed { .. } => FaultKind::CloseFailed,
            Self::LockContention { .. } => FaultKind::LockContention,
            Self::PayloadTooLarge { .. } => FaultKind::PayloadTooLarge,
            _ => FaultKind::Unclassified,
        }
    }
}

/// Result type alias for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;
