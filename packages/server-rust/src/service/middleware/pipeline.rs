//! Pipeline composition: wraps the dispatcher in its middleware stack.

use tower::ServiceBuilder;

use super::metrics::{MetricsLayer, MetricsService};
use crate::service::dispatcher::Dispatcher;

/// The service every transport handler calls.
pub type DispatchPipeline = MetricsService<Dispatcher>;

/// Build the dispatch pipeline around a `Dispatcher`.
///
/// The engine imposes no timeout or admission control of its own, so the
/// only layer is `MetricsLayer`. Transport-level limits live in the HTTP
/// middleware stack instead.
///
/// The returned service is `Clone`; handlers clone it per request and drive
/// it with `tower::ServiceExt::oneshot`.
#[must_use]
pub fn build_dispatch_pipeline(dispatcher: Dispatcher) -> DispatchPipeline {
    ServiceBuilder::new().layer(MetricsLayer).service(dispatcher)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
