//! Environment-driven proxy configuration
//!
//! The whole surface is environment variables (container-first, like the
//! rest of this family of tools). Values are read once at startup and are
//! immutable for the process lifetime.

use serde::Serialize;
use std::path::PathBuf;
use wattgate_backend::AuthMode;

/// TLS serving mode.
///
/// `Http` serves plain HTTP but keeps the HTTPS cookie attributes
/// (`Secure; SameSite=None`) for deployments behind an external TLS
/// terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpsMode {
    Yes,
    Http,
    No,
}

impl HttpsMode {
    pub fn parse(value: &str) -> Self {
        match value.to_lowercase().as_str() {
            "yes" => HttpsMode::Yes,
            "http" => HttpsMode::Http,
            _ => HttpsMode::No,
        }
    }

    /// Cookie attribute suffix for re-issued session cookies.
    pub fn cookie_suffix(&self) -> &'static str {
        match self {
            HttpsMode::Yes | HttpsMode::Http => "path=/;SameSite=None;Secure;",
            HttpsMode::No => "path=/;",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyConfig {
    pub bind_address: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub email: String,
    /// Gateway hostname or IP; empty selects cloud mode
    pub host: String,
    pub timezone: String,
    pub debug: bool,
    pub cache_expire_secs: u64,
    pub browser_cache_secs: u64,
    pub timeout_secs: u64,
    pub pool_maxsize: usize,
    pub https_mode: HttpsMode,
    pub port: u16,
    pub style: String,
    pub site_id: Option<i64>,
    pub auth_path: PathBuf,
    #[serde(serialize_with = "serialize_auth_mode")]
    pub auth_mode: AuthMode,
    pub cache_file: PathBuf,
    /// Optional directory of dashboard assets served before the proxy
    /// fallback
    pub web_root: Option<PathBuf>,
}

fn serialize_auth_mode<S: serde::Serializer>(
    mode: &AuthMode,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(mode.as_str())
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_address: String::new(),
            password: "password".to_string(),
            email: "email@example.com".to_string(),
            host: String::new(),
            timezone: "America/Los_Angeles".to_string(),
            debug: false,
            cache_expire_secs: 5,
            browser_cache_secs: 0,
            timeout_secs: 5,
            pool_maxsize: 15,
            https_mode: HttpsMode::No,
            port: 8675,
            style: "clear".to_string(),
            site_id: None,
            auth_path: PathBuf::new(),
            auth_mode: AuthMode::Cookie,
            cache_file: PathBuf::from(".wattgate"),
            web_root: None,
        }
    }
}

impl ProxyConfig {
    /// Read the full configuration surface from the environment, falling
    /// back to defaults. Env vars always win (required for Docker).
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("PW_BIND_ADDRESS") {
            config.bind_address = val;
        }
        if let Ok(val) = std::env::var("PW_PASSWORD") {
            config.password = val;
        }
        if let Ok(val) = std::env::var("PW_EMAIL") {
            config.email = val;
        }
        if let Ok(val) = std::env::var("PW_HOST") {
            config.host = val;
        }
        if let Ok(val) = std::env::var("PW_TIMEZONE") {
            config.timezone = val;
        }
        if let Ok(val) = std::env::var("PW_DEBUG") {
            config.debug = val.to_lowercase() == "yes";
        }
        merge_parsed(&mut config.cache_expire_secs, "PW_CACHE_EXPIRE");
        merge_parsed(&mut config.browser_cache_secs, "PW_BROWSER_CACHE");
        merge_parsed(&mut config.timeout_secs, "PW_TIMEOUT");
        merge_parsed(&mut config.pool_maxsize, "PW_POOL_MAXSIZE");
        if let Ok(val) = std::env::var("PW_HTTPS") {
            config.https_mode = HttpsMode::parse(&val);
        }
        merge_parsed(&mut config.port, "PW_PORT");
        if let Ok(val) = std::env::var("PW_STYLE") {
            config.style = val;
        }
        if let Ok(val) = std::env::var("PW_SITEID") {
            match val.parse() {
                Ok(id) => config.site_id = Some(id),
                Err(_) => eprintln!("Warning: Invalid PW_SITEID '{}', ignoring", val),
            }
        }
        if let Ok(val) = std::env::var("PW_AUTH_PATH") {
            config.auth_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("PW_AUTH_MODE") {
            match AuthMode::parse(&val) {
                Some(mode) => config.auth_mode = mode,
                None => eprintln!(
                    "Warning: Invalid PW_AUTH_MODE '{}', using '{}'",
                    val,
                    config.auth_mode.as_str()
                ),
            }
        }
        if let Ok(val) = std::env::var("PW_CACHE_FILE") {
            config.cache_file = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("PW_WEB_ROOT") {
            config.web_root = Some(PathBuf::from(val));
        }

        config
    }

    /// Host empty selects cloud mode; decided once at startup.
    pub fn is_cloud_mode(&self) -> bool {
        self.host.is_empty()
    }

    /// Style asset filename for the dashboard (e.g. `clear.js`).
    pub fn style_file(&self) -> String {
        format!("{}.js", self.style)
    }
}

fn merge_parsed<T: std::str::FromStr>(target: &mut T, name: &str) {
    if let Ok(val) = std::env::var(name) {
        match val.parse() {
            Ok(parsed) => *target = parsed,
            Err(_) => eprintln!("Warning: Invalid {} '{}', using default", name, val),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_pw_env() {
        for (key, _) in std::env::vars() {
            if key.starts_with("PW_") {
                unsafe { std::env::remove_var(&key) };
            }
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear_pw_env();
        let config = ProxyConfig::from_env();
        assert_eq!(config.port, 8675);
        assert_eq!(config.cache_expire_secs, 5);
        assert_eq!(config.pool_maxsize, 15);
        assert!(config.is_cloud_mode());
        assert_eq!(config.https_mode, HttpsMode::No);
        assert_eq!(config.auth_mode, AuthMode::Cookie);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_pw_env();
        unsafe {
            std::env::set_var("PW_HOST", "192.168.91.1");
            std::env::set_var("PW_PORT", "9000");
            std::env::set_var("PW_CACHE_EXPIRE", "10");
            std::env::set_var("PW_HTTPS", "http");
            std::env::set_var("PW_AUTH_MODE", "token");
            std::env::set_var("PW_SITEID", "12345");
            std::env::set_var("PW_DEBUG", "yes");
        }
        let config = ProxyConfig::from_env();
        clear_pw_env();

        assert!(!config.is_cloud_mode());
        assert_eq!(config.port, 9000);
        assert_eq!(config.cache_expire_secs, 10);
        assert_eq!(config.https_mode, HttpsMode::Http);
        assert_eq!(config.auth_mode, AuthMode::Token);
        assert_eq!(config.site_id, Some(12345));
        assert!(config.debug);
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_pw_env();
        unsafe {
            std::env::set_var("PW_PORT", "not-a-port");
            std::env::set_var("PW_SITEID", "abc");
            std::env::set_var("PW_AUTH_MODE", "basic");
        }
        let config = ProxyConfig::from_env();
        clear_pw_env();

        assert_eq!(config.port, 8675);
        assert_eq!(config.site_id, None);
        assert_eq!(config.auth_mode, AuthMode::Cookie);
    }

    #[test]
    fn test_cookie_suffix_by_mode() {
        assert_eq!(HttpsMode::No.cookie_suffix(), "path=/;");
        assert_eq!(
            HttpsMode::Http.cookie_suffix(),
            "path=/;SameSite=None;Secure;"
        );
        assert_eq!(
            HttpsMode::Yes.cookie_suffix(),
            "path=/;SameSite=None;Secure;"
        );
    }
}
