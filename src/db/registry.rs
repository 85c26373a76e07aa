//! Driver registry.
//!
//! Built once at startup from whatever client libraries the probe finds, then
//! read-only. Keys are display names in detection order.

use crate::config::DriverOptions;
use crate::db::adapter::DriverAdapter;
use crate::db::backends::adapters_for;
use crate::db::library::{Backend, LibraryProbe};
use crate::error::{DriverError, DriverResult};
use crate::models::HostRuntime;
use indexmap::IndexMap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// One registry entry, as reported to users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverSummary {
    pub name: String,
    pub backend: Backend,
    pub preferred: bool,
}

pub struct DriverRegistry {
    drivers: IndexMap<String, Arc<dyn DriverAdapter>>,
    preferred: Option<String>,
    forced: Option<String>,
}

impl DriverRegistry {
    /// Detect the available drivers and pick the preferred one.
    ///
    /// A forced driver narrows the registry to that single entry and fails if
    /// it was not detected.
    pub fn detect(probe: &dyn LibraryProbe, options: &DriverOptions) -> DriverResult<Self> {
        let mut registry = Self::detect_libraries(probe, &options.runtime);
        registry.preferred = registry
            .select_preferred(&options.runtime)
            .map(String::from);

        match &options.forced_driver {
            Some(name) => registry.apply_override(name),
            None => Ok(registry),
        }
    }

    /// Build an adapter for every backend whose library is present.
    pub fn detect_libraries(probe: &dyn LibraryProbe, runtime: &HostRuntime) -> Self {
        let mut drivers: IndexMap<String, Arc<dyn DriverAdapter>> = IndexMap::new();
        for backend in Backend::ALL {
            let Some(library) = probe.probe(backend) else {
                debug!(backend = %backend, "Client library not installed");
                continue;
            };
            for (name, adapter) in adapters_for(backend, library, runtime) {
                drivers.insert(name, adapter);
            }
        }

        info!(
            runtime = %runtime,
            drivers = ?drivers.keys().collect::<Vec<_>>(),
            "Detected MySQL drivers"
        );

        Self {
            drivers,
            preferred: None,
            forced: None,
        }
    }

    /// Name of the driver to use.
    ///
    /// A forced driver always wins. Otherwise the native client is preferred;
    /// the pure client beats it on an alternate runtime, where native calls are
    /// slow. The connector is a fallback, and the fast client replaces the pure
    /// one on the reference runtime.
    pub fn select_preferred(&self, runtime: &HostRuntime) -> Option<&str> {
        if let Some(forced) = &self.forced {
            return Some(forced.as_str());
        }

        let mut preferred: Option<Backend> = None;
        for backend in Backend::ALL {
            if !self.drivers.contains_key(backend.driver_name()) {
                continue;
            }
            let take = match backend {
                Backend::MysqlClient => true,
                Backend::PureMysql => runtime.is_alternate() || preferred.is_none(),
                Backend::Connector => preferred.is_none(),
                Backend::UltraMysql => {
                    preferred.is_none()
                        || (preferred == Some(Backend::PureMysql) && !runtime.is_alternate())
                }
            };
            if take {
                preferred = Some(backend);
            }
        }
        preferred.map(|b| b.driver_name())
    }

    fn apply_override(mut self, name: &str) -> DriverResult<Self> {
        let Some(adapter) = self.drivers.get(name).cloned() else {
            let available = self.names().join(", ");
            return Err(DriverError::configuration(
                format!("Forced MySQL driver '{name}' is not available"),
                format!("Install its client library or choose one of: {available}"),
            ));
        };

        info!(
            forced = %name,
            preferred = ?self.preferred,
            discarded = ?self.drivers.keys().filter(|k| *k != name).collect::<Vec<_>>(),
            "Forcing MySQL driver"
        );

        self.drivers = IndexMap::from([(name.to_string(), adapter)]);
        self.preferred = Some(name.to_string());
        self.forced = Some(name.to_string());
        Ok(self)
    }

    pub fn get(&self, name: &str) -> DriverResult<Arc<dyn DriverAdapter>> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| DriverError::driver_not_found(name, self.names()))
    }

    pub fn preferred_name(&self) -> Option<&str> {
        self.preferred.as_deref()
    }

    /// Adapter of the preferred driver, or `None` if nothing was detected.
    pub fn preferred(&self) -> Option<Arc<dyn DriverAdapter>> {
        self.preferred
            .as_deref()
            .and_then(|name| self.drivers.get(name).cloned())
    }

    pub fn forced_name(&self) -> Option<&str> {
        self.forced.as_deref()
    }

    pub fn names(&self) -> Vec<String> {
        self.drivers.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn DriverAdapter>)> {
        self.drivers.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }

    pub fn summaries(&self) -> Vec<DriverSummary> {
        self.iter()
            .map(|(name, adapter)| DriverSummary {
                name: name.to_string(),
                backend: adapter.backend(),
                preferred: self.preferred.as_deref() == Some(name),
            })
            .collect()
    }
}

impl std::fmt::Debug for DriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverRegistry")
            .field("drivers", &self.drivers.keys().collect::<Vec<_>>())
            .field("preferred", &self.preferred)
            .field("forced", &self.forced)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::library::{ClientLibrary, Connection, StaticProbe};
    use crate::models::{ConnectParams, LibraryError};
    use std::sync::Mutex;
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    /// Records every event as its level and `name=value` fields.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<(Level, String)>>>);

    struct Fields(String);

    impl Visit for Fields {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            self.0.push_str(&format!("{}={value:?} ", field.name()));
        }
    }

    impl<S: Subscriber> Layer<S> for Captured {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut fields = Fields(String::new());
            event.record(&mut fields);
            self.0
                .lock()
                .unwrap()
                .push((*event.metadata().level(), fields.0));
        }
    }

    struct NoopLibrary;

    impl ClientLibrary for NoopLibrary {
        fn connect(&self, _params: &ConnectParams) -> Result<Box<dyn Connection>, LibraryError> {
            Err(LibraryError::operational("not a real library"))
        }

        fn escape_bytes(&self, data: &[u8]) -> Result<Vec<u8>, LibraryError> {
            Ok(data.to_vec())
        }
    }

    fn probe(backends: &[Backend]) -> StaticProbe {
        backends.iter().fold(StaticProbe::new(), |p, b| {
            p.with(*b, Arc::new(NoopLibrary))
        })
    }

    fn preferred(backends: &[Backend], runtime: HostRuntime) -> Option<String> {
        let registry = DriverRegistry::detect_libraries(&probe(backends), &runtime);
        registry.select_preferred(&runtime).map(String::from)
    }

    #[test]
    fn test_empty_probe() {
        let registry = DriverRegistry::detect(&StaticProbe::new(), &DriverOptions::default()).unwrap();
        assert!(registry.is_empty());
        assert!(registry.preferred().is_none());
        assert_eq!(registry.preferred_name(), None);
    }

    #[test]
    fn test_detection_order_is_kept() {
        let registry = DriverRegistry::detect_libraries(
            &probe(&[Backend::UltraMysql, Backend::MysqlClient, Backend::PureMysql]),
            &HostRuntime::reference(),
        );
        assert_eq!(registry.names(), ["MySQLClient", "PureMySQL", "UltraMySQL"]);
    }

    #[test]
    fn test_preference_rules() {
        use Backend::*;
        let reference = HostRuntime::reference;
        let alternate = || HostRuntime::alternate(None);

        let all = [MysqlClient, PureMysql, Connector, UltraMysql];
        assert_eq!(preferred(&all, reference()).as_deref(), Some("MySQLClient"));
        assert_eq!(preferred(&all, alternate()).as_deref(), Some("PureMySQL"));
        assert_eq!(preferred(&[Connector], reference()).as_deref(), Some("MySQL Connector"));
        assert_eq!(
            preferred(&[PureMysql, UltraMysql], reference()).as_deref(),
            Some("UltraMySQL")
        );
        assert_eq!(
            preferred(&[PureMysql, UltraMysql], alternate()).as_deref(),
            Some("PureMySQL")
        );
        assert_eq!(
            preferred(&[PureMysql, Connector], reference()).as_deref(),
            Some("PureMySQL")
        );
        assert_eq!(preferred(&[], reference()), None);
    }

    #[test]
    fn test_get_missing_driver() {
        let registry = DriverRegistry::detect_libraries(
            &probe(&[Backend::PureMysql]),
            &HostRuntime::reference(),
        );
        let err = registry.get("MySQLClient").err().unwrap();
        assert!(matches!(err, DriverError::DriverNotFound { .. }));
        assert!(err.to_string().contains("PureMySQL"));
    }

    #[test]
    fn test_summaries_mark_preferred() {
        let registry = DriverRegistry::detect(
            &probe(&[Backend::MysqlClient, Backend::PureMysql]),
            &DriverOptions::default(),
        )
        .unwrap();
        let summaries = registry.summaries();
        assert_eq!(summaries.len(), 2);
        assert!(summaries[0].preferred);
        assert!(!summaries[1].preferred);
        assert_eq!(summaries[1].backend, Backend::PureMysql);
    }

    #[test]
    fn test_forced_override_is_logged() {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::registry().with(captured.clone());
        let options = DriverOptions::default().with_forced_driver("PureMySQL");

        let registry = tracing::subscriber::with_default(subscriber, || {
            DriverRegistry::detect(
                &probe(&[Backend::MysqlClient, Backend::PureMysql]),
                &options,
            )
            .unwrap()
        });
        assert_eq!(registry.preferred_name(), Some("PureMySQL"));

        let events = captured.0.lock().unwrap();
        let (level, fields) = events
            .iter()
            .find(|(_, fields)| fields.contains("Forcing MySQL driver"))
            .expect("override message logged");
        assert_eq!(*level, Level::INFO);
        assert!(fields.contains("forced=PureMySQL"), "{fields}");
        assert!(fields.contains("MySQLClient"), "{fields}");
    }
}
