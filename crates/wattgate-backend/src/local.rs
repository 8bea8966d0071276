//! Local gateway backend
//!
//! Talks to the energy gateway on the LAN over HTTPS (self-signed
//! certificate). Two authentication modes, fixed at construction:
//!
//! - *cookie*: the login response sets an `AuthCookie`/`UserRecord` pair,
//!   replayed as a `Cookie` header on every request
//! - *token*: the login response carries a bearer token, replayed as an
//!   `Authorization` header
//!
//! A fetch that comes back 401/403 re-authenticates once and retries once.
//! Re-login is serialized so a burst of expired fetches cannot stampede the
//! gateway's login endpoint.

use crate::{
    classify_transport,
    client::{HttpClientConfig, create_client},
    BackendError, Result,
};
use reqwest::{Client, Response, StatusCode, header};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use wattgate_core::{CredentialStore, Session};

/// Device login endpoint, shared by both auth modes.
const LOGIN_PATH: &str = "/api/login/Basic";

/// The gateway's customer-facing login username.
const LOGIN_USERNAME: &str = "customer";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Cookie,
    Token,
}

impl AuthMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "cookie" => Some(AuthMode::Cookie),
            "token" => Some(AuthMode::Token),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMode::Cookie => "cookie",
            AuthMode::Token => "token",
        }
    }
}

/// Local backend configuration, immutable after construction.
#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Hostname or IP of the gateway (e.g. `192.168.91.1`)
    pub host: String,
    /// Customer password set up on the gateway
    pub password: String,
    /// Customer email
    pub email: String,
    /// Timezone reported to the login endpoint
    pub timezone: String,
    pub auth_mode: AuthMode,
    /// Path of the serialized session file
    pub cache_file: PathBuf,
    pub client_config: HttpClientConfig,
    /// Base URL override for tests; `None` means `https://{host}`
    pub base_url: Option<String>,
}

impl LocalConfig {
    pub fn new(host: impl Into<String>, password: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            password: password.into(),
            email: email.into(),
            timezone: "America/Los_Angeles".to_string(),
            auth_mode: AuthMode::Cookie,
            cache_file: PathBuf::from(".wattgate"),
            client_config: HttpClientConfig::for_local_gateway(5, 15),
            base_url: None,
        }
    }

    pub fn with_auth_mode(mut self, auth_mode: AuthMode) -> Self {
        self.auth_mode = auth_mode;
        self
    }

    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = timezone.into();
        self
    }

    pub fn with_cache_file(mut self, cache_file: impl Into<PathBuf>) -> Self {
        self.cache_file = cache_file.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// Backend for the on-premise gateway.
pub struct LocalBackend {
    config: LocalConfig,
    base_url: String,
    client: Client,
    store: CredentialStore,
    session: RwLock<Option<Session>>,
    /// Bumped on every successful login; lets a retrying fetch detect that
    /// another task already re-authenticated.
    generation: AtomicU64,
    reauth: Mutex<()>,
}

impl LocalBackend {
    pub fn new(config: LocalConfig) -> Result<Self> {
        if config.host.is_empty() {
            return Err(BackendError::ConfigError(
                "Local backend requires a gateway host".to_string(),
            ));
        }
        let client = create_client(&config.client_config)?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}", config.host));
        let store = CredentialStore::new(&config.cache_file)?;

        // A cached session lets us skip the login round-trip; a rejected one
        // falls into the normal re-auth path on first fetch.
        let session = match store.load() {
            Ok(session) => session,
            Err(e) => {
                warn!("Ignoring unreadable credential file: {}", e);
                None
            }
        };

        Ok(Self {
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            store,
            session: RwLock::new(session),
            generation: AtomicU64::new(0),
            reauth: Mutex::new(()),
        })
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Origin used for every device request (`https://{host}` unless
    /// overridden).
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn auth_mode(&self) -> AuthMode {
        self.config.auth_mode
    }

    /// Current session, if authenticated. The gateway server re-issues these
    /// credentials as cookies on dashboard responses.
    pub fn session(&self) -> Option<Session> {
        self.session.read().expect("session lock poisoned").clone()
    }

    /// HTTP client handle for the reverse-proxy path (shares the pool).
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    pub fn timeout_secs(&self) -> u64 {
        self.config.client_config.timeout_secs
    }

    /// Log in to the gateway and persist the resulting session.
    pub async fn authenticate(&self) -> Result<()> {
        let _guard = self.reauth.lock().await;
        self.login().await
    }

    /// Re-authenticate after an expired-session response. `seen_generation`
    /// is the generation the caller's failed request was issued under; if
    /// another task already re-logged-in, this is a no-op.
    async fn reauthenticate(&self, seen_generation: u64) -> Result<()> {
        let _guard = self.reauth.lock().await;
        if self.generation.load(Ordering::Acquire) != seen_generation {
            debug!("Session already refreshed by another task");
            return Ok(());
        }
        self.login().await
    }

    async fn login(&self) -> Result<()> {
        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        let body = json!({
            "username": LOGIN_USERNAME,
            "password": self.config.password,
            "email": self.config.email,
            "clientInfo": {"timezone": self.config.timezone},
            "force_sm_off": false,
        });

        debug!("Logging in to gateway at {}", url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| classify_transport(self.config.client_config.timeout_secs, e))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(BackendError::AuthFailed(format!(
                "Login rejected with status {status}: {detail}"
            )));
        }

        let session = match self.config.auth_mode {
            AuthMode::Cookie => Self::session_from_cookies(&response)?,
            AuthMode::Token => Self::session_from_token(response).await?,
        };

        if let Err(e) = self.store.save(&session) {
            // Losing persistence only costs a login on next restart.
            warn!("Failed to persist session: {}", e);
        }
        *self.session.write().expect("session lock poisoned") = Some(session);
        self.generation.fetch_add(1, Ordering::AcqRel);
        debug!("Gateway login succeeded ({} mode)", self.config.auth_mode.as_str());
        Ok(())
    }

    fn session_from_cookies(response: &Response) -> Result<Session> {
        let mut auth_cookie = None;
        let mut user_record = None;
        for cookie in response.cookies() {
            match cookie.name() {
                "AuthCookie" => auth_cookie = Some(cookie.value().to_string()),
                "UserRecord" => user_record = Some(cookie.value().to_string()),
                _ => {}
            }
        }
        match (auth_cookie, user_record) {
            (Some(auth_cookie), Some(user_record)) => Ok(Session::Cookie {
                auth_cookie,
                user_record,
            }),
            _ => Err(BackendError::AuthFailed(
                "Login response did not set the AuthCookie/UserRecord pair".to_string(),
            )),
        }
    }

    async fn session_from_token(response: Response) -> Result<Session> {
        let payload: Value = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(format!("login response: {e}")))?;
        match payload.get("token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => Ok(Session::Token {
                token: token.to_string(),
            }),
            _ => Err(BackendError::AuthFailed(
                "Login response did not carry a bearer token".to_string(),
            )),
        }
    }

    /// Map the unified path vocabulary onto device endpoints.
    fn device_path(path: &str) -> &str {
        match path {
            // Vitals are exposed under /api/devices/vitals on the device.
            // Firmware past 23.44 no longer serves them; the JSON parse
            // failure downstream flows back as an absent payload.
            "/vitals" => "/api/devices/vitals",
            other => other,
        }
    }

    async fn send(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url, Self::device_path(path));
        let mut request = self.client.get(&url);

        let session = self.session();
        if let Some(session) = &session {
            if let Some(cookie) = session.cookie_header() {
                request = request.header(header::COOKIE, cookie);
            }
            if let Some(bearer) = session.bearer_header() {
                request = request.header(header::AUTHORIZATION, bearer);
            }
        }

        request
            .send()
            .await
            .map_err(|e| classify_transport(self.config.client_config.timeout_secs, e))
    }

    fn is_expired(status: StatusCode) -> bool {
        matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
    }

    /// GET an API path, transparently re-authenticating once on an expired
    /// session. A second rejection surfaces as `AuthFailed`, never a loop.
    pub async fn fetch(&self, path: &str) -> Result<Value> {
        let seen_generation = self.generation.load(Ordering::Acquire);
        let response = self.send(path).await?;

        if Self::is_expired(response.status()) {
            debug!("Session expired fetching {}, re-authenticating", path);
            self.reauthenticate(seen_generation).await?;

            let retry = self.send(path).await?;
            if Self::is_expired(retry.status()) {
                return Err(BackendError::AuthFailed(format!(
                    "{} still unauthorized after re-login (status {})",
                    path,
                    retry.status()
                )));
            }
            return Self::parse_payload(path, retry).await;
        }

        Self::parse_payload(path, response).await
    }

    async fn parse_payload(path: &str, response: Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                status_code: status.as_u16(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(format!("{path}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_mode_parse() {
        assert_eq!(AuthMode::parse("cookie"), Some(AuthMode::Cookie));
        assert_eq!(AuthMode::parse("Token"), Some(AuthMode::Token));
        assert_eq!(AuthMode::parse("basic"), None);
    }

    #[test]
    fn test_empty_host_rejected() {
        let config = LocalConfig::new("", "password", "user@example.com");
        assert!(matches!(
            LocalBackend::new(config),
            Err(BackendError::ConfigError(_))
        ));
    }

    #[test]
    fn test_vitals_maps_to_device_endpoint() {
        assert_eq!(LocalBackend::device_path("/vitals"), "/api/devices/vitals");
        assert_eq!(
            LocalBackend::device_path("/api/meters/aggregates"),
            "/api/meters/aggregates"
        );
    }
}
