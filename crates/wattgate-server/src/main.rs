//! WattGate gateway server
//!
//! Caching, authenticated proxy in front of a home energy gateway (or the
//! vendor cloud), re-exposing telemetry for monitoring tools and the
//! bundled dashboard.
//!
//! Usage:
//! ```bash
//! # Local mode: point at the gateway on the LAN
//! PW_HOST=192.168.91.1 PW_PASSWORD=secret PW_EMAIL=me@example.com wattgate
//!
//! # Cloud mode: leave PW_HOST empty and run the cloud setup first
//! PW_EMAIL=me@example.com PW_SITEID=12345 wattgate
//! ```
//!
//! Test with:
//! ```bash
//! curl http://localhost:8675/api/meters/aggregates
//! curl http://localhost:8675/csv
//! curl http://localhost:8675/stats
//! ```

use anyhow::Context;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use wattgate_backend::client::HttpClientConfig;
use wattgate_backend::{
    ActiveBackend, CloudConfig, CloudBackend, LocalBackend, LocalConfig, Powerwall,
};
use wattgate_server::config::{HttpsMode, ProxyConfig};
use wattgate_server::routes::build_router;
use wattgate_server::{AppState, BUILD};

/// WattGate - caching gateway proxy for home energy telemetry
#[derive(Parser)]
#[command(name = "wattgate", version, about, long_about = None)]
struct Cli {
    /// Listen port (overrides PW_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address (overrides PW_BIND_ADDRESS)
    #[arg(short, long)]
    bind: Option<String>,

    /// Enable debug logging (overrides PW_DEBUG)
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = ProxyConfig::from_env();
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }
    if cli.debug {
        config.debug = true;
    }

    let filter = if config.debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(
        "WattGate [{}] Proxy Server [{}] - port {}",
        env!("CARGO_PKG_VERSION"),
        BUILD,
        config.port
    );
    if config.https_mode == HttpsMode::Yes {
        // Certificate provisioning is deliberately external; `yes` keeps the
        // HTTPS cookie attributes and expects a TLS terminator in front.
        warn!("PW_HTTPS=yes: expecting an external TLS terminator; serving plain HTTP");
    }

    // Backend selection is a one-time decision: empty host means cloud mode.
    let backend = if config.is_cloud_mode() {
        info!("WattGate Proxy Server - Cloud Mode");
        let mut cloud_config = CloudConfig::new(config.email.clone())
            .with_site_id(config.site_id)
            .with_auth_path(config.auth_path.clone());
        cloud_config.cache_ttl_secs = config.cache_expire_secs;
        cloud_config.client_config = HttpClientConfig::for_cloud(config.timeout_secs);
        ActiveBackend::Cloud(CloudBackend::new(cloud_config)?)
    } else {
        info!("WattGate Proxy Server - Local Mode");
        let mut local_config =
            LocalConfig::new(config.host.clone(), config.password.clone(), config.email.clone())
                .with_timezone(config.timezone.clone())
                .with_auth_mode(config.auth_mode)
                .with_cache_file(config.cache_file.clone());
        local_config.client_config =
            HttpClientConfig::for_local_gateway(config.timeout_secs, config.pool_maxsize);
        ActiveBackend::Local(LocalBackend::new(local_config)?)
    };

    let pw = Arc::new(Powerwall::new(
        backend,
        Duration::from_secs(config.cache_expire_secs),
    ));

    // No degraded mode without a valid session: a failed startup auth (bad
    // credentials, missing cloud setup, unknown site id) halts the process
    // after logging rather than serving in a broken state.
    pw.connect()
        .await
        .context("Unable to connect - fix the configuration and restart")?;

    if pw.is_cloud() {
        if let Some(cloud) = pw.cloud() {
            info!(
                "Connected to site {:?} ({})",
                cloud.site_id(),
                cloud.site_name().unwrap_or_default()
            );
        }
    } else {
        info!(
            "Connected to energy gateway {} ({})",
            config.host,
            pw.site_name().await.unwrap_or_default()
        );
    }

    let port = config.port;
    let bind_address = if config.bind_address.is_empty() {
        "0.0.0.0".to_string()
    } else {
        config.bind_address.clone()
    };
    let state = AppState::new(pw, config);
    let app = build_router(state);

    let addr: SocketAddr = format!("{bind_address}:{port}").parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("WattGate proxy listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("WattGate proxy stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
