//! Axum handlers and the state they share.
//!
//! Broker handlers are thin: they turn the extracted request parts into a
//! `BrokerRequest` and hand it to the dispatch pipeline. Health handlers
//! report listener state for orchestrators.

pub mod broker;
pub mod health;

pub use broker::{
    bind_handler, binding_last_operation_handler, catalog_handler, deprovision_handler,
    fetch_binding_handler, fetch_instance_handler, instance_last_operation_handler,
    provision_handler, unbind_handler, unrouted_handler, update_instance_handler,
};
pub use health::{health_handler, liveness_handler, readiness_handler};

use std::sync::Arc;
use std::time::Instant;

use super::ShutdownController;
use crate::service::{DispatchPipeline, ServiceRegistry};

/// Shared state passed to every handler via `State` extraction.
///
/// Holds `Arc`s and a cloneable pipeline so cloning per request is cheap.
#[derive(Clone)]
pub struct AppState {
    /// The dispatcher wrapped in its middleware.
    pub pipeline: DispatchPipeline,
    /// Registered backends, read by the health endpoint.
    pub registry: Arc<ServiceRegistry>,
    /// Health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Process start, for uptime reporting.
    pub start_time: Instant,
}
