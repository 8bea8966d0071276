//! WattGate Gateway Server
//!
//! The HTTP surface in front of the cached [`Powerwall`] facade: convenience
//! aliases, derived telemetry endpoints, an allow-listed raw API proxy, and
//! a dashboard fallback that serves static assets or reverse-proxies the
//! device's own web server.
//!
//! [`Powerwall`]: wattgate_backend::Powerwall

pub mod config;
pub mod proxy;
pub mod routes;
pub mod statics;
pub mod stats;

use std::sync::Arc;
use wattgate_backend::Powerwall;

/// Build tag reported in the /stats banner.
pub const BUILD: &str = "r1";

/// Shared per-process state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    pub pw: Arc<Powerwall>,
    pub stats: Arc<stats::ProxyStats>,
    pub config: Arc<config::ProxyConfig>,
}

impl AppState {
    pub fn new(pw: Arc<Powerwall>, config: config::ProxyConfig) -> Self {
        Self {
            pw,
            stats: Arc::new(stats::ProxyStats::new()),
            config: Arc::new(config),
        }
    }
}
