//! Metrics middleware for broker requests.
//!
//! Wraps every request in a `broker_request` tracing span and records a
//! request counter and a duration histogram through the `metrics` facade.
//! Without an installed recorder the metric calls are no-ops.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use tower::{Layer, Service};
use tracing::{info_span, Instrument};

use crate::service::operation::{BrokerRequest, BrokerResponse};

/// Counter of finished requests, labelled by `operation` and `outcome`.
pub const REQUESTS_TOTAL: &str = "broker_requests_total";
/// Histogram of request durations in seconds, labelled by `operation`.
pub const REQUEST_DURATION_SECONDS: &str = "broker_request_duration_seconds";

// ---------------------------------------------------------------------------
// MetricsLayer
// ---------------------------------------------------------------------------

/// Tower layer that instruments broker requests with timing and counting.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

// ---------------------------------------------------------------------------
// MetricsService
// ---------------------------------------------------------------------------

/// Service wrapper that records request duration and outcome.
#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<BrokerRequest> for MetricsService<S>
where
    S: Service<BrokerRequest, Response = BrokerResponse, Error = Infallible> + Send,
    S::Future: Send + 'static,
{
    type Response = BrokerResponse;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<BrokerResponse, Infallible>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: BrokerRequest) -> Self::Future {
        let operation = request.operation.as_str();
        let request_identity = request
            .headers
            .get(crate::service::headers::REQUEST_IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned();

        let span = info_span!(
            "broker_request",
            operation,
            request_identity = %request_identity,
            status = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        );

        let fut = self.inner.call(request);

        Box::pin(
            async move {
                let start = Instant::now();
                let result = fut.await;
                let elapsed = start.elapsed();

                // Every failure is already a 400 response.
                let response = match result {
                    Ok(response) => response,
                    Err(never) => match never {},
                };
                let outcome = if response.is_success() { "success" } else { "error" };

                #[allow(clippy::cast_possible_truncation)]
                let duration_ms = elapsed.as_millis() as u64;
                let span = tracing::Span::current();
                span.record("status", response.status.as_u16());
                span.record("duration_ms", duration_ms);

                metrics::counter!(REQUESTS_TOTAL, "operation" => operation, "outcome" => outcome)
                    .increment(1);
                metrics::histogram!(REQUEST_DURATION_SECONDS, "operation" => operation)
                    .record(elapsed.as_secs_f64());

                tracing::info!(
                    operation,
                    status = response.status.as_u16(),
                    duration_ms,
                    outcome,
                    "request complete"
                );

                Ok(response)
            }
            .instrument(span),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
