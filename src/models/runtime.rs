//! Host runtime the drivers are loaded into.
//!
//! Preference between the native and the pure client depends on the flavor of
//! the host runtime, and one compatibility guard depends on its version.

use clap::ValueEnum;
use semver::Version;
use serde::{Deserialize, Serialize};

/// Flavor of the host runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeKind {
    /// Reference runtime; native client bindings are cheap to call.
    #[default]
    Reference,
    /// Alternate runtime; calls through native bindings are expensive, so the
    /// pure client is preferred.
    Alternate,
}

impl std::fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reference => write!(f, "reference"),
            Self::Alternate => write!(f, "alternate"),
        }
    }
}

/// Alternate runtimes before this version raise a spurious memory fault when
/// the pure client escapes an empty byte buffer.
pub const EMPTY_ESCAPE_FIXED_IN: Version = Version::new(5, 3, 1);

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HostRuntime {
    pub kind: RuntimeKind,
    pub version: Option<Version>,
}

impl HostRuntime {
    pub fn reference() -> Self {
        Self::default()
    }

    pub fn alternate(version: Option<Version>) -> Self {
        Self {
            kind: RuntimeKind::Alternate,
            version,
        }
    }

    pub fn is_alternate(&self) -> bool {
        self.kind == RuntimeKind::Alternate
    }

    /// Whether empty byte buffers must bypass the pure client's escape routine.
    ///
    /// An alternate runtime of unknown version is assumed to be current.
    pub fn needs_empty_escape_guard(&self) -> bool {
        self.is_alternate()
            && self
                .version
                .as_ref()
                .is_some_and(|v| *v < EMPTY_ESCAPE_FIXED_IN)
    }
}

impl std::fmt::Display for HostRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} {}", self.kind, version),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Parse a runtime version, accepting `5`, `5.3` and `5.3.1` forms.
pub fn parse_runtime_version(s: &str) -> Result<Version, semver::Error> {
    let s = s.trim();
    let parts = s.split('.').count();
    match parts {
        1 => Version::parse(&format!("{s}.0.0")),
        2 => Version::parse(&format!("{s}.0")),
        _ => Version::parse(s),
    }
}
