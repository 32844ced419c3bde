//! Registered backends keyed by service id.
//!
//! Registration happens at start-up; afterwards the registry is read-mostly
//! and every in-flight request resolves its backend concurrently. Each entry
//! carries the parameter validators compiled for the offering's plans so
//! schema compilation never happens on the request path.

use std::sync::Arc;

use broker_core::{BrokerError, ServiceConfiguration};
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::info;

use super::events::LifecycleEvents;
use super::validator::ParameterValidator;
use crate::traits::BrokerService;

// ---------------------------------------------------------------------------
// RegisteredService
// ---------------------------------------------------------------------------

/// A backend together with its precompiled plan validators.
pub struct RegisteredService {
    backend: Arc<dyn BrokerService>,
    validator: ParameterValidator,
}

impl RegisteredService {
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn BrokerService> {
        &self.backend
    }

    #[must_use]
    pub fn configuration(&self) -> &ServiceConfiguration {
        self.backend.configuration()
    }

    #[must_use]
    pub fn validator(&self) -> &ParameterValidator {
        &self.validator
    }
}

impl std::fmt::Debug for RegisteredService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredService")
            .field("service_id", &self.configuration().id)
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// ServiceRegistry
// ---------------------------------------------------------------------------

/// Registry of backends.
///
/// - **Lookup** (`resolve`): by `configuration().id`, lock-free for readers.
/// - **Listing** (`list`): configurations in first-registration order.
///
/// Re-registering an id replaces the backend but keeps its catalog position.
pub struct ServiceRegistry {
    by_id: DashMap<String, Arc<RegisteredService>>,
    /// Registration order for catalog rendering.
    order: RwLock<Vec<String>>,
    events: LifecycleEvents,
}

impl ServiceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            by_id: DashMap::new(),
            order: RwLock::new(Vec::new()),
            events: LifecycleEvents::new(),
        }
    }

    /// Registers a backend under its configuration's id.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the configuration is structurally
    /// invalid or one of its plan schemas does not compile. Nothing is
    /// stored in that case.
    pub fn register<S: BrokerService + 'static>(&self, service: S) -> Result<(), BrokerError> {
        self.register_arc(Arc::new(service))
    }

    /// Like [`register`](Self::register), for a backend that is already shared.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn register_arc(&self, backend: Arc<dyn BrokerService>) -> Result<(), BrokerError> {
        let config = backend.configuration();
        config.validate()?;
        let validator = ParameterValidator::compile(config)?;
        let id = config.id.clone();
        let plans = config.plans.len();

        let entry = Arc::new(RegisteredService { backend, validator });
        // Hold the order lock across the insert so `list` never sees an id
        // without its entry.
        let mut order = self.order.write();
        let replaced = self.by_id.insert(id.clone(), entry).is_some();
        if !replaced {
            order.push(id.clone());
        }
        drop(order);

        info!(service_id = %id, plans, replaced, "service registered");
        Ok(())
    }

    /// Resolves a backend by service id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` when no backend is registered under `service_id`.
    pub fn resolve(&self, service_id: &str) -> Result<Arc<RegisteredService>, BrokerError> {
        self.by_id
            .get(service_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| BrokerError::not_found(format!("Service {service_id} does not exist")))
    }

    /// Configurations of every registered backend, in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<ServiceConfiguration> {
        let order = self.order.read();
        order
            .iter()
            .filter_map(|id| self.by_id.get(id))
            .map(|entry| entry.value().configuration().clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Lifecycle listeners notified by the dispatcher.
    #[must_use]
    pub fn events(&self) -> &LifecycleEvents {
        &self.events
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &*self.order.read())
            .field("events", &self.events)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use broker_core::ErrorKind;
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::service::noop::NoopService;

    fn config(id: &str, name: &str) -> ServiceConfiguration {
        serde_json::from_value(json!({
            "id": id,
            "name": name,
            "description": "registry test",
            "plans": [{ "id": "plan-1", "name": "one", "description": "only plan" }]
        }))
        .unwrap()
    }

    #[test]
    fn register_and_resolve() {
        let registry = ServiceRegistry::new();
        registry.register(NoopService::new(config("svc-1", "one"))).unwrap();

        let entry = registry.resolve("svc-1").unwrap();
        assert_eq!(entry.configuration().name, "one");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn resolve_unregistered_is_not_found() {
        let registry = ServiceRegistry::new();
        let err = registry.resolve("missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(registry.is_empty());
    }

    #[test]
    fn resolve_twice_returns_same_backend() {
        let registry = ServiceRegistry::new();
        registry.register(NoopService::new(config("svc-1", "one"))).unwrap();

        let a = registry.resolve("svc-1").unwrap();
        let b = registry.resolve("svc-1").unwrap();
        assert!(Arc::ptr_eq(a.backend(), b.backend()));
    }

    #[test]
    fn list_follows_registration_order() {
        let registry = ServiceRegistry::new();
        for id in ["zeta", "alpha", "mid"] {
            registry.register(NoopService::new(config(id, id))).unwrap();
        }
        let ids: Vec<_> = registry.list().into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn reregistration_replaces_in_place() {
        let registry = ServiceRegistry::new();
        registry.register(NoopService::new(config("a", "first"))).unwrap();
        registry.register(NoopService::new(config("b", "b"))).unwrap();
        registry.register(NoopService::new(config("a", "second"))).unwrap();

        let listed = registry.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "a");
        assert_eq!(listed[0].name, "second");
        assert_eq!(listed[1].id, "b");
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let registry = ServiceRegistry::new();
        let mut cfg = config("svc-1", "one");
        cfg.plans.clear();

        let err = registry.register(NoopService::new(cfg)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
        assert!(registry.is_empty());
    }

    #[test]
    fn malformed_schema_is_rejected() {
        let registry = ServiceRegistry::new();
        let cfg: ServiceConfiguration = serde_json::from_value(json!({
            "id": "svc-1",
            "name": "one",
            "description": "bad schema",
            "plans": [{
                "id": "plan-1",
                "name": "one",
                "description": "only plan",
                "schemas": {
                    "service_instance": {
                        "create": { "parameters": { "type": "not-a-real-type" } }
                    }
                }
            }]
        }))
        .unwrap();

        let err = registry.register(NoopService::new(cfg)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigurationError);
        assert!(registry.resolve("svc-1").is_err());
    }

    proptest! {
        #[test]
        fn list_has_one_entry_per_id_in_first_seen_order(
            ids in proptest::collection::vec("[a-d]", 1..24)
        ) {
            let registry = ServiceRegistry::new();
            let mut expected: Vec<String> = Vec::new();
            for id in &ids {
                registry.register(NoopService::new(config(id, id))).unwrap();
                if !expected.contains(id) {
                    expected.push(id.clone());
                }
            }

            let listed: Vec<String> = registry.list().into_iter().map(|c| c.id).collect();
            prop_assert_eq!(&listed, &expected);
            prop_assert_eq!(registry.list(), registry.list());
        }
    }
}
