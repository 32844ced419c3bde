//! Network module with deferred startup lifecycle.
//!
//! `new()` assembles shared state, `start()` binds the TCP listener, and
//! `serve()` accepts connections until the shutdown future resolves. The
//! split lets the binary report the bound port before serving.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::{NetworkConfig, TlsConfig};
use super::handlers::{
    bind_handler, binding_last_operation_handler, catalog_handler, deprovision_handler,
    fetch_binding_handler, fetch_instance_handler, health_handler,
    instance_last_operation_handler, liveness_handler, provision_handler, readiness_handler,
    unbind_handler, unrouted_handler, update_instance_handler, AppState,
};
use super::middleware::build_http_layers;
use super::shutdown::ShutdownController;
use crate::service::{build_dispatch_pipeline, Dispatcher, ServiceRegistry};

/// How long in-flight broker requests may take to finish after shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the listener and the state shared by every handler.
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    state: AppState,
}

impl NetworkModule {
    /// Wraps the dispatcher in its pipeline without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig, dispatcher: Dispatcher) -> Self {
        let registry = Arc::clone(dispatcher.registry());
        let state = AppState {
            pipeline: build_dispatch_pipeline(dispatcher),
            registry,
            shutdown: Arc::new(ShutdownController::new()),
            start_time: Instant::now(),
        };
        Self {
            config,
            listener: None,
            state,
        }
    }

    #[must_use]
    pub fn registry(&self) -> Arc<ServiceRegistry> {
        Arc::clone(&self.state.registry)
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.state.shutdown)
    }

    /// The full router: broker routes, health routes, fallbacks, middleware.
    pub fn build_router(&self) -> Router {
        build_router(self.state.clone(), &self.config)
    }

    /// Binds the TCP listener and returns the bound port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();
        info!(host = %self.config.host, port, "TCP listener bound");

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves until `shutdown` resolves, then drains in-flight broker requests.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called, the TLS material cannot
    /// be loaded, or the server hits a fatal I/O error.
    pub async fn serve(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .ok_or_else(|| anyhow::anyhow!("start() must be called before serve()"))?;
        let router = build_router(self.state.clone(), &self.config);
        let controller = Arc::clone(&self.state.shutdown);

        controller.set_ready();

        if let Some(tls) = &self.config.tls {
            serve_tls(listener, router, tls, shutdown).await?;
        } else {
            info!("serving plain HTTP");
            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await?;
        }

        drain(&controller).await;
        Ok(())
    }
}

/// Routes every broker endpoint to its handler.
///
/// Unknown paths and known paths with the wrong method both answer with a
/// 400 `NotFound` body rather than axum's plain 404/405. Bodies over
/// `max_body_bytes` fail the handlers' body extraction and surface as 400
/// `InvalidParameter`.
fn build_router(state: AppState, config: &NetworkConfig) -> Router {
    let instance = "/v2/service_instances/{instance_id}";
    let binding = "/v2/service_instances/{instance_id}/service_bindings/{binding_id}";

    Router::new()
        .route("/v2/catalog", get(catalog_handler))
        .route(
            instance,
            get(fetch_instance_handler)
                .put(provision_handler)
                .patch(update_instance_handler)
                .delete(deprovision_handler),
        )
        .route(
            &format!("{instance}/last_operation"),
            get(instance_last_operation_handler),
        )
        .route(
            binding,
            get(fetch_binding_handler)
                .put(bind_handler)
                .delete(unbind_handler),
        )
        .route(
            &format!("{binding}/last_operation"),
            get(binding_last_operation_handler),
        )
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .fallback(unrouted_handler)
        .method_not_allowed_fallback(unrouted_handler)
        .layer(DefaultBodyLimit::max(config.max_body_bytes))
        .layer(build_http_layers(config))
        .with_state(state)
}

/// Serves HTTPS with `axum-server`, reusing the pre-bound listener.
async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls: &TlsConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load TLS certificates: {e}"))?;

    let addr = listener.local_addr()?;
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();

    tokio::spawn(async move {
        shutdown.await;
        shutdown_handle.graceful_shutdown(None);
    });

    info!(%addr, "serving HTTPS");
    axum_server::from_tcp_rustls(std_listener, rustls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}

async fn drain(controller: &ShutdownController) {
    controller.trigger_shutdown();
    let pending = controller.in_flight_count();
    if pending > 0 {
        info!(pending, "draining in-flight broker requests");
    }
    if controller.wait_for_drain(DRAIN_TIMEOUT).await {
        info!("all broker requests drained");
    } else {
        warn!(
            remaining = controller.in_flight_count(),
            "drain timeout expired with broker requests in flight"
        );
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
