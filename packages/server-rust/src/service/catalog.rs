//! Renders the registry into the catalog document served at `GET /v2/catalog`.

use broker_core::Catalog;

use super::registry::ServiceRegistry;

/// Every registered offering, in registration order, relayed verbatim.
#[must_use]
pub fn project(registry: &ServiceRegistry) -> Catalog {
    Catalog {
        services: registry.list(),
    }
}
