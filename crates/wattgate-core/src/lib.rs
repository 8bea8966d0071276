//! WattGate Core
//!
//! Leaf crate shared by the backends and the gateway server:
//! - Error types
//! - Credential session store (cookie pair or bearer token on disk)
//! - Firmware version parsing

pub mod credentials;
pub mod error;
pub mod version;

pub use credentials::{CredentialStore, Session};
pub use error::{Error, Result};
pub use version::parse_version;
