//! WattGate Backends
//!
//! This crate provides the two upstream data sources behind the gateway:
//! - `LocalBackend` talks to the energy gateway on the LAN over HTTPS
//! - `CloudBackend` talks to the vendor cloud API
//!
//! plus the TTL response cache and the `Powerwall` facade that unifies them.

pub mod cache;
pub mod client;
pub mod cloud;
pub mod facade;
pub mod local;

pub use cache::ResponseCache;
pub use cloud::{CloudBackend, CloudConfig};
pub use facade::{ActiveBackend, GridState, Powerwall};
pub use local::{AuthMode, LocalBackend, LocalConfig};

use thiserror::Error;

/// Backend failure taxonomy.
///
/// Timeouts, auth failures and malformed payloads are deliberately distinct
/// variants so callers (and the gateway's serving statistics) can count them
/// separately.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Request timeout after {0}s")]
    Timeout(u64),

    #[error("Malformed payload: {0}")]
    Malformed(String),

    #[error("Not supported by this backend: {0}")]
    Unsupported(String),

    #[error("Upstream unreachable: {0}")]
    Unreachable(String),

    #[error("Upstream error status: {status_code}")]
    Status { status_code: u16 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Core(#[from] wattgate_core::Error),
}

pub type Result<T> = std::result::Result<T, BackendError>;

/// Classify a transport-level reqwest failure into the backend taxonomy.
pub(crate) fn classify_transport(timeout_secs: u64, err: reqwest::Error) -> BackendError {
    if err.is_timeout() {
        BackendError::Timeout(timeout_secs)
    } else if err.is_connect() {
        BackendError::Unreachable(err.to_string())
    } else {
        BackendError::Http(err)
    }
}
