//! Shared HTTP client utilities

use crate::{BackendError, Result};
use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// HTTP client configuration
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout in seconds (the whole request, not just connect)
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,

    /// Maximum number of idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Accept self-signed upstream certificates.
    ///
    /// The on-premise gateway ships with a self-signed certificate; local
    /// mode cannot talk to it without this. The cloud client keeps full
    /// verification.
    pub accept_invalid_certs: bool,

    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5,
            connect_timeout_secs: 5,
            pool_max_idle_per_host: 15,
            accept_invalid_certs: false,
            user_agent: format!("WattGate/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Configuration for the local gateway connection: bounded pool and
    /// self-signed certs tolerated.
    pub fn for_local_gateway(timeout_secs: u64, pool_max_idle_per_host: usize) -> Self {
        Self {
            timeout_secs,
            pool_max_idle_per_host,
            accept_invalid_certs: true,
            ..Self::default()
        }
    }

    /// Configuration for the vendor cloud API.
    pub fn for_cloud(timeout_secs: u64) -> Self {
        Self {
            timeout_secs,
            ..Self::default()
        }
    }
}

/// Create a configured HTTP client with connection pooling
pub fn create_client(config: &HttpClientConfig) -> Result<Client> {
    let mut builder = ClientBuilder::new()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        // Expire idle connections before the embedded web server closes
        // them; reusing a dead connection shows up as a stuck request.
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .user_agent(&config.user_agent)
        // rustls for TLS (no openssl dependency)
        .use_rustls_tls();

    if config.accept_invalid_certs {
        builder = builder.danger_accept_invalid_certs(true);
    }

    builder
        .build()
        .map_err(|e| BackendError::ConfigError(format!("Failed to create HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpClientConfig::default();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.pool_max_idle_per_host, 15);
        assert!(!config.accept_invalid_certs);
        assert!(config.user_agent.starts_with("WattGate/"));
    }

    #[test]
    fn test_local_gateway_config_tolerates_self_signed() {
        let config = HttpClientConfig::for_local_gateway(7, 10);
        assert_eq!(config.timeout_secs, 7);
        assert_eq!(config.pool_max_idle_per_host, 10);
        assert!(config.accept_invalid_certs);
    }

    #[test]
    fn test_create_client() {
        assert!(create_client(&HttpClientConfig::default()).is_ok());
        assert!(create_client(&HttpClientConfig::for_local_gateway(5, 15)).is_ok());
    }
}
