//! Credential session store
//!
//! The gateway issues either a cookie pair (`AuthCookie` + `UserRecord`) or a
//! bearer token depending on the configured auth mode. Whichever form is
//! active gets persisted to a local file so a restart can skip the login
//! round-trip against the device.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// An authentication session as issued by the gateway (or cloud login).
///
/// Exactly one variant is ever active per process; the auth mode is fixed at
/// construction and never mixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Session {
    Cookie {
        auth_cookie: String,
        user_record: String,
    },
    Token {
        token: String,
    },
}

impl Session {
    /// Value for the `Cookie` request header (cookie mode).
    pub fn cookie_header(&self) -> Option<String> {
        match self {
            Session::Cookie {
                auth_cookie,
                user_record,
            } => Some(format!(
                "AuthCookie={auth_cookie}; UserRecord={user_record}"
            )),
            Session::Token { .. } => None,
        }
    }

    /// Value for the `Authorization` request header (token mode).
    pub fn bearer_header(&self) -> Option<String> {
        match self {
            Session::Cookie { .. } => None,
            Session::Token { token } => Some(format!("Bearer {token}")),
        }
    }
}

/// Loads and saves a serialized [`Session`] at a fixed path.
///
/// Pure data, no network. A missing file is the normal first-run state and
/// reads as `Ok(None)`.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            path: expand_tilde(path.as_ref())?,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted session, if any.
    ///
    /// Returns `Ok(None)` when the file does not exist. A file that exists
    /// but fails to parse is an error: silently discarding it would hide a
    /// corrupted credential file from the operator.
    pub fn load(&self) -> Result<Option<Session>> {
        if !self.path.exists() {
            debug!("No credential file at {}", self.path.display());
            return Ok(None);
        }
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            Error::CredentialStore(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        let session: Session = serde_json::from_str(&contents).map_err(|e| {
            Error::CredentialStore(format!("Failed to parse {}: {}", self.path.display(), e))
        })?;
        debug!("Loaded cached session from {}", self.path.display());
        Ok(Some(session))
    }

    /// Persist a freshly acquired session.
    pub fn save(&self, session: &Session) -> Result<()> {
        let contents = serde_json::to_string_pretty(session)?;
        fs::write(&self.path, contents).map_err(|e| {
            Error::CredentialStore(format!("Failed to write {}: {}", self.path.display(), e))
        })?;
        debug!("Saved session to {}", self.path.display());
        Ok(())
    }

    /// Remove the persisted session (explicit re-auth / logout).
    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|e| {
                Error::CredentialStore(format!(
                    "Failed to remove {}: {}",
                    self.path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }
}

/// Expand tilde (~) in path to home directory
pub fn expand_tilde(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| Error::Config("Invalid UTF-8 in path".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else if path_str == "~" {
        dirs::home_dir()
            .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

/// Read a single field out of an arbitrary JSON file, supporting dot
/// notation for nested paths (e.g. `"tokens.refresh_token"`).
///
/// Returns `Ok(None)` when the file or the field is absent; the caller
/// decides whether that is fatal.
pub fn read_json_field(file: &Path, field: &str) -> Result<Option<String>> {
    let expanded = expand_tilde(file)?;
    if !expanded.exists() {
        debug!("Auth file does not exist: {}", expanded.display());
        return Ok(None);
    }
    let contents = fs::read_to_string(&expanded).map_err(|e| {
        Error::CredentialStore(format!("Failed to read {}: {}", expanded.display(), e))
    })?;
    let json: serde_json::Value = serde_json::from_str(&contents).map_err(|e| {
        Error::CredentialStore(format!("Failed to parse {}: {}", expanded.display(), e))
    })?;

    let mut current = &json;
    for part in field.split('.') {
        match current.get(part) {
            Some(v) => current = v,
            None => {
                warn!("Field '{}' not found in {}", field, expanded.display());
                return Ok(None);
            }
        }
    }
    match current {
        serde_json::Value::String(s) if !s.is_empty() => Ok(Some(s.clone())),
        serde_json::Value::String(_) => {
            warn!("Field '{}' is empty in {}", field, expanded.display());
            Ok(None)
        }
        _ => {
            warn!(
                "Field '{}' is not a string in {}",
                field,
                expanded.display()
            );
            Ok(None)
        }
    }
}
