//! Service broker server.
//!
//! Loads a catalog document, registers a no-op backend per offering, and
//! serves the broker API until SIGINT or SIGTERM.
//!
//! ```bash
//! BROKER_CATALOG=catalog.json BROKER_PORT=8080 broker-server
//! curl -H 'X-Broker-API-Version: 2.15' http://localhost:8080/v2/catalog
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use broker_core::Catalog;
use broker_server::network::{NetworkConfig, NetworkModule, TlsConfig};
use broker_server::service::{BrokerConfig, Dispatcher, NoopService, ServiceRegistry, DEFAULT_API_VERSION};
use clap::{Parser, ValueEnum};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "broker-server")]
#[command(about = "Open Service Broker API server")]
struct Args {
    /// Bind address.
    #[arg(long, env = "BROKER_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Listen port; 0 picks a free one.
    #[arg(long, env = "BROKER_PORT", default_value_t = 8080)]
    port: u16,

    /// Required `X-Broker-API-Version` value.
    #[arg(long, env = "BROKER_API_VERSION", default_value = DEFAULT_API_VERSION)]
    api_version: String,

    /// Exact `Authorization` header value platforms must send.
    #[arg(long, env = "BROKER_AUTH_TOKEN", hide_env_values = true)]
    auth_token: Option<String>,

    /// Catalog document (`{"services": [...]}`).
    #[arg(long, env = "BROKER_CATALOG")]
    catalog: Option<PathBuf>,

    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "BROKER_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    #[arg(long, env = "BROKER_LOG_FORMAT", value_enum, default_value = "pretty")]
    log_format: LogFormat,

    /// PEM certificate; enables HTTPS together with `--tls-key`.
    #[arg(long, env = "BROKER_TLS_CERT", requires = "tls_key")]
    tls_cert: Option<PathBuf>,

    #[arg(long, env = "BROKER_TLS_KEY", requires = "tls_cert")]
    tls_key: Option<PathBuf>,
}

impl Args {
    fn network_config(&self) -> NetworkConfig {
        let tls = match (&self.tls_cert, &self.tls_key) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
            }),
            _ => None,
        };
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            tls,
            ..NetworkConfig::default()
        }
    }

    fn broker_config(&self) -> BrokerConfig {
        let config = BrokerConfig::new(self.api_version.clone());
        match &self.auth_token {
            Some(token) => config.with_auth_token(token.clone()),
            None => config,
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_registry(catalog: Option<&PathBuf>) -> Result<ServiceRegistry> {
    let registry = ServiceRegistry::new();
    let Some(path) = catalog else {
        warn!("no catalog configured; serving an empty catalog");
        return Ok(registry);
    };

    let catalog = Catalog::from_path(path)?;
    for service in catalog.services {
        let id = service.id.clone();
        registry
            .register(NoopService::new(service))
            .with_context(|| format!("registering service {id}"))?;
    }
    info!(services = registry.len(), catalog = %path.display(), "catalog loaded");
    Ok(registry)
}

/// Resolves on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C"),
        () = terminate => info!("received SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_format);

    if let Some(addr) = args.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("installing Prometheus exporter")?;
        info!(%addr, "Prometheus metrics listener started");
    }

    let registry = Arc::new(load_registry(args.catalog.as_ref())?);
    let dispatcher = Dispatcher::new(registry, Arc::new(args.broker_config()));

    let mut module = NetworkModule::new(args.network_config(), dispatcher);
    let port = module.start().await.context("binding listener")?;
    info!(port, api_version = %args.api_version, "broker server started");

    module.serve(shutdown_signal()).await?;
    info!("broker server stopped");
    Ok(())
}
