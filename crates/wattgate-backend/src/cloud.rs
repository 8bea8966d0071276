//! Cloud backend
//!
//! Talks to the vendor cloud API with a previously issued refresh token
//! (created by the out-of-band setup flow) and maps the unified path-based
//! API vocabulary onto cloud-specific calls. The cloud has no equivalent for
//! the device's diagnostic endpoints (`/vitals`, `/strings`); those report
//! `Unsupported` rather than silently returning empty success.

use crate::{
    classify_transport,
    client::{HttpClientConfig, create_client},
    BackendError, Result,
};
use dashmap::DashMap;
use reqwest::{Client, Response, StatusCode, header};
use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};
use wattgate_core::credentials::{expand_tilde, read_json_field};

/// Stores the OAuth refresh/access token pair.
pub const AUTH_FILE: &str = ".wattgate.auth";
/// Stores the selected energy site id.
pub const SITE_FILE: &str = ".wattgate.site";

/// The live-status API expects a wrapping call counter.
const COUNTER_MAX: u64 = 64;
/// Site configuration barely changes; memoize it longer than live data.
const SITE_CONFIG_TTL: Duration = Duration::from_secs(59);

#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// Account email the refresh token was issued for
    pub email: String,
    /// Target site id; `None` selects the account's first energy site
    pub site_id: Option<i64>,
    /// Directory holding the auth and site files
    pub auth_path: PathBuf,
    /// TTL for memoized live data, in seconds
    pub cache_ttl_secs: u64,
    pub client_config: HttpClientConfig,
    /// Owner API base URL (overridable for tests)
    pub base_url: String,
    /// OAuth token endpoint base URL (overridable for tests)
    pub auth_base_url: String,
}

impl CloudConfig {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            site_id: None,
            auth_path: PathBuf::new(),
            cache_ttl_secs: 5,
            client_config: HttpClientConfig::for_cloud(5),
            base_url: "https://owner-api.teslamotors.com".to_string(),
            auth_base_url: "https://auth.tesla.com".to_string(),
        }
    }

    pub fn with_site_id(mut self, site_id: Option<i64>) -> Self {
        self.site_id = site_id;
        self
    }

    pub fn with_auth_path(mut self, auth_path: impl Into<PathBuf>) -> Self {
        self.auth_path = auth_path.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_auth_base_url(mut self, auth_base_url: impl Into<String>) -> Self {
        self.auth_base_url = auth_base_url.into();
        self
    }
}

/// Backend for the vendor cloud API.
pub struct CloudBackend {
    config: CloudConfig,
    client: Client,
    auth_file: PathBuf,
    site_file: PathBuf,
    refresh_token: RwLock<Option<String>>,
    access_token: RwLock<Option<String>>,
    site_id: RwLock<Option<i64>>,
    site_name: RwLock<Option<String>>,
    /// Wrapping counter attached to live-status calls, exposed via /stats.
    counter: AtomicU64,
    /// Short-TTL memo per cloud endpoint, beneath the facade's path cache.
    memo: DashMap<&'static str, (Value, Instant)>,
    refresh_lock: Mutex<()>,
}

/// Lookup a value in a nested payload or return None if any key is absent.
pub fn lookup<'a>(data: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let mut current = data;
    for key in keys {
        current = current.get(key)?;
    }
    Some(current)
}

fn lookup_or_null(data: &Value, keys: &[&str]) -> Value {
    lookup(data, keys).cloned().unwrap_or(Value::Null)
}

impl CloudBackend {
    pub fn new(config: CloudConfig) -> Result<Self> {
        let client = create_client(&config.client_config)?;
        let auth_path = expand_tilde(&config.auth_path)?;
        let auth_file = auth_path.join(AUTH_FILE);
        let site_file = auth_path.join(SITE_FILE);

        Ok(Self {
            config,
            client,
            auth_file,
            site_file,
            refresh_token: RwLock::new(None),
            access_token: RwLock::new(None),
            site_id: RwLock::new(None),
            site_name: RwLock::new(None),
            counter: AtomicU64::new(0),
            memo: DashMap::new(),
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn counter(&self) -> u64 {
        self.counter.load(Ordering::Relaxed)
    }

    pub fn site_id(&self) -> Option<i64> {
        *self.site_id.read().expect("site lock poisoned")
    }

    pub fn site_name(&self) -> Option<String> {
        self.site_name.read().expect("site lock poisoned").clone()
    }

    /// Connect to the cloud: load the refresh token, obtain an access token
    /// and resolve the target site. Without a valid auth file there is no
    /// degraded mode; the caller treats this as fatal.
    pub async fn authenticate(&self) -> Result<()> {
        if !self.auth_file.exists() {
            return Err(BackendError::ConfigError(format!(
                "Missing auth file {} - run setup",
                self.auth_file.display()
            )));
        }
        let refresh_token = read_json_field(&self.auth_file, "refresh_token")?
            .ok_or_else(|| {
                BackendError::AuthFailed(format!(
                    "No refresh_token in {}",
                    self.auth_file.display()
                ))
            })?;
        *self.refresh_token.write().expect("token lock poisoned") = Some(refresh_token);

        self.refresh_access_token().await?;

        // Site selection: explicit config wins, then the persisted site
        // file, then the account's first energy site.
        let wanted = match self.config.site_id {
            Some(id) => Some(id),
            None => self.read_site_file(),
        };

        let sites = self.list_sites().await?;
        if sites.is_empty() {
            return Err(BackendError::ConfigError(format!(
                "No energy sites found for {}",
                self.config.email
            )));
        }

        let selected = match wanted {
            Some(id) => sites
                .iter()
                .find(|s| s.get("energy_site_id").and_then(Value::as_i64) == Some(id))
                .ok_or_else(|| {
                    BackendError::ConfigError(format!(
                        "Site {} not found for {}",
                        id, self.config.email
                    ))
                })?,
            None => &sites[0],
        };
        self.select_site(selected);
        debug!(
            "Connected to cloud - site {:?} ({:?}) for {}",
            self.site_id(),
            self.site_name(),
            self.config.email
        );
        Ok(())
    }

    /// Switch the active site by id. Evaluated once at startup; a failure
    /// here is fatal to startup but cannot affect an already-running
    /// gateway.
    pub async fn change_site(&self, site_id: i64) -> Result<()> {
        let sites = self.list_sites().await?;
        let site = sites
            .iter()
            .find(|s| s.get("energy_site_id").and_then(Value::as_i64) == Some(site_id))
            .ok_or_else(|| {
                BackendError::ConfigError(format!(
                    "Site {} not found for {}",
                    site_id, self.config.email
                ))
            })?;
        self.select_site(site);
        self.memo.clear();
        if let Err(e) = fs::write(&self.site_file, site_id.to_string()) {
            warn!("Failed to persist site id: {}", e);
        }
        debug!("Changed site to {}", site_id);
        Ok(())
    }

    fn select_site(&self, site: &Value) {
        *self.site_id.write().expect("site lock poisoned") =
            site.get("energy_site_id").and_then(Value::as_i64);
        *self.site_name.write().expect("site lock poisoned") = site
            .get("site_name")
            .and_then(Value::as_str)
            .map(str::to_string);
    }

    fn read_site_file(&self) -> Option<i64> {
        let contents = fs::read_to_string(&self.site_file).ok()?;
        match contents.trim().parse() {
            Ok(id) => Some(id),
            Err(e) => {
                debug!("Unable to parse site file, ignoring: {}", e);
                None
            }
        }
    }

    /// Exchange the refresh token for a fresh access token. Serialized so a
    /// burst of 401s produces one renewal, not a storm. A rotated refresh
    /// token is written back to the auth file.
    async fn refresh_access_token(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;

        let refresh_token = self
            .refresh_token
            .read()
            .expect("token lock poisoned")
            .clone()
            .ok_or_else(|| BackendError::AuthFailed("No refresh token loaded".to_string()))?;

        let url = format!("{}/oauth2/v3/token", self.config.auth_base_url);
        let body = json!({
            "grant_type": "refresh_token",
            "client_id": "ownerapi",
            "refresh_token": refresh_token,
            "scope": "openid email offline_access",
        });

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
                "Token refresh rejected with status {status}: {detail}"
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| BackendError::Malformed(format!("token response: {e}")))?;
        let access_token = payload
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                BackendError::AuthFailed("Token response carried no access_token".to_string())
            })?;

        *self.access_token.write().expect("token lock poisoned") =
            Some(access_token.to_string());

        // The identity provider may rotate the refresh token on use.
        if let Some(rotated) = payload.get("refresh_token").and_then(Value::as_str) {
            *self.refresh_token.write().expect("token lock poisoned") =
                Some(rotated.to_string());
            let record = json!({
                "email": self.config.email,
                "refresh_token": rotated,
            });
            if let Err(e) = fs::write(&self.auth_file, record.to_string()) {
                warn!("Failed to persist rotated refresh token: {}", e);
            }
        }

        debug!("Cloud access token refreshed");
        Ok(())
    }

    async fn send_authorized(&self, path: &str) -> Result<Response> {
        let token = self
            .access_token
            .read()
            .expect("token lock poisoned")
            .clone()
            .ok_or_else(|| BackendError::AuthFailed("Not authenticated".to_string()))?;

        self.client
            .get(format!("{}{}", self.config.base_url, path))
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await
            .map_err(|e| classify_transport(self.config.client_config.timeout_secs, e))
    }

    /// Authorized GET with one transparent token renewal on 401.
    async fn api_get(&self, path: &str) -> Result<Value> {
        let response = self.send_authorized(path).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            debug!("Cloud access token expired, refreshing");
            self.refresh_access_token().await?;
            let retry = self.send_authorized(path).await?;
            if retry.status() == StatusCode::UNAUTHORIZED {
                return Err(BackendError::AuthFailed(
                    "Cloud API still unauthorized after token refresh".to_string(),
                ));
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

    async fn list_sites(&self) -> Result<Vec<Value>> {
        let payload = self.api_get("/api/1/products").await?;
        let products = payload
            .get("response")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        Ok(products
            .into_iter()
            .filter(|p| p.get("energy_site_id").is_some())
            .collect())
    }

    fn require_site_id(&self) -> Result<i64> {
        self.site_id()
            .ok_or_else(|| BackendError::AuthFailed("No site selected".to_string()))
    }

    fn memo_fresh(&self, name: &'static str, ttl: Duration) -> Option<Value> {
        let entry = self.memo.get(name)?;
        let (value, fetched_at) = entry.value();
        if fetched_at.elapsed() < ttl {
            debug!("Returning memoized {} data", name);
            Some(value.clone())
        } else {
            None
        }
    }

    /// Battery summary (`site_status`).
    pub async fn get_battery(&self) -> Result<Value> {
        let ttl = Duration::from_secs(self.config.cache_ttl_secs);
        if let Some(fresh) = self.memo_fresh("SITE_SUMMARY", ttl) {
            return Ok(fresh);
        }
        let site = self.require_site_id()?;
        let value = self
            .api_get(&format!("/api/1/energy_sites/{site}/site_status?language=en"))
            .await?;
        self.memo.insert("SITE_SUMMARY", (value.clone(), Instant::now()));
        Ok(value)
    }

    /// Live power flows (`live_status`). Bumps the wrapping call counter on
    /// every real (non-memoized) call.
    pub async fn get_site_power(&self) -> Result<Value> {
        let ttl = Duration::from_secs(self.config.cache_ttl_secs);
        if let Some(fresh) = self.memo_fresh("SITE_DATA", ttl) {
            return Ok(fresh);
        }
        let site = self.require_site_id()?;
        let n = (self.counter.load(Ordering::Relaxed) + 1) % COUNTER_MAX;
        self.counter.store(n, Ordering::Relaxed);
        let value = self
            .api_get(&format!(
                "/api/1/energy_sites/{site}/live_status?counter={n}&language=en"
            ))
            .await?;
        self.memo.insert("SITE_DATA", (value.clone(), Instant::now()));
        Ok(value)
    }

    /// Site configuration (`site_info`); changes rarely, memoized longer.
    pub async fn get_site_config(&self) -> Result<Value> {
        if let Some(fresh) = self.memo_fresh("SITE_CONFIG", SITE_CONFIG_TTL) {
            return Ok(fresh);
        }
        let site = self.require_site_id()?;
        let value = self
            .api_get(&format!("/api/1/energy_sites/{site}/site_info?language=en"))
            .await?;
        self.memo.insert("SITE_CONFIG", (value.clone(), Instant::now()));
        Ok(value)
    }

    /// Backup time remaining, in hours.
    pub async fn get_time_remaining(&self) -> Result<Option<f64>> {
        let ttl = Duration::from_secs(self.config.cache_ttl_secs);
        let value = match self.memo_fresh("BACKUP_TIME", ttl) {
            Some(fresh) => fresh,
            None => {
                let site = self.require_site_id()?;
                let value = self
                    .api_get(&format!(
                        "/api/1/energy_sites/{site}/backup_time_remaining?language=en"
                    ))
                    .await?;
                self.memo.insert("BACKUP_TIME", (value.clone(), Instant::now()));
                value
            }
        };
        Ok(lookup(&value, &["response", "time_remaining_hours"]).and_then(Value::as_f64))
    }

    /// Map a gateway API path onto cloud data.
    pub async fn fetch(&self, path: &str) -> Result<Value> {
        debug!("Cloud request for {}", path);
        match path {
            "/api/status" => {
                let config = self.get_site_config().await?;
                Ok(json!({
                    "din": lookup_or_null(&config, &["response", "id"]),
                    "start_time": lookup_or_null(&config, &["response", "installation_date"]),
                    "up_time_seconds": Value::Null,
                    "is_new": false,
                    "version": lookup_or_null(&config, &["response", "version"]),
                    "git_hash": Value::Null,
                    "commission_count": 0,
                    "device_type": lookup_or_null(&config, &["response", "components", "gateway"]),
                    "teg_type": "unknown",
                    "sync_type": "v2.1",
                    "cellular_disabled": false,
                    "can_reboot": true,
                }))
            }

            "/api/system_status/grid_status" => {
                let power = self.get_site_power().await?;
                let grid_status =
                    if lookup(&power, &["response", "grid_status"]).and_then(Value::as_str)
                        == Some("Active")
                    {
                        "SystemGridConnected"
                    } else {
                        // off_grid or off_grid_unintentional
                        "SystemIslandedActive"
                    };
                Ok(json!({
                    "grid_status": grid_status,
                    "grid_services_active":
                        lookup_or_null(&power, &["response", "grid_services_active"]),
                }))
            }

            "/api/site_info/site_name" => {
                let config = self.get_site_config().await?;
                Ok(json!({
                    "site_name": lookup_or_null(&config, &["response", "site_name"]),
                    "timezone":
                        lookup_or_null(&config, &["response", "installation_time_zone"]),
                }))
            }

            "/api/site_info" => {
                let config = self.get_site_config().await?;
                let nameplate_power = lookup(&config, &["response", "nameplate_power"])
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0)
                    / 1000.0;
                let nameplate_energy = lookup(&config, &["response", "nameplate_energy"])
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0)
                    / 1000.0;
                Ok(json!({
                    "max_system_energy_kWh": nameplate_energy,
                    "max_system_power_kW": nameplate_power,
                    "site_name": lookup_or_null(&config, &["response", "site_name"]),
                    "timezone":
                        lookup_or_null(&config, &["response", "installation_time_zone"]),
                    "max_site_meter_power_kW":
                        lookup_or_null(&config, &["response", "max_site_meter_power_ac"]),
                    "min_site_meter_power_kW":
                        lookup_or_null(&config, &["response", "min_site_meter_power_ac"]),
                    "nominal_system_energy_kWh": nameplate_energy,
                    "nominal_system_power_kW": nameplate_power,
                    "panel_max_current": Value::Null,
                    "grid_code": {
                        "grid_code": Value::Null,
                        "grid_voltage_setting": Value::Null,
                        "grid_freq_setting": Value::Null,
                        "grid_phase_setting": Value::Null,
                        "country": Value::Null,
                        "state": Value::Null,
                        "utility":
                            lookup_or_null(&config, &["response", "tariff_content", "utility"]),
                    },
                }))
            }

            "/api/system_status/soe" => {
                let battery = self.get_battery().await?;
                let percentage_charged =
                    lookup(&battery, &["response", "percentage_charged"])
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0);
                // The cloud reports the app-scale value; invert the 5%
                // reserved-capacity scaling so the raw endpoint round-trips.
                let soe = (percentage_charged + (5.0 / 0.95)) * 0.95;
                Ok(json!({ "percentage": soe }))
            }

            "/api/meters/aggregates" => {
                let config = self.get_site_config().await?;
                let power = self.get_site_power().await?;
                Ok(build_aggregates(&config, &power))
            }

            "/api/operation" => {
                let config = self.get_site_config().await?;
                let reserve = lookup(&config, &["response", "backup_reserve_percent"])
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0);
                let backup = (reserve + (5.0 / 0.95)) * 0.95;
                Ok(json!({
                    "real_mode": lookup_or_null(&config, &["response", "default_real_mode"]),
                    "backup_reserve_percent": backup,
                }))
            }

            "/api/system_status" => {
                let power = self.get_site_power().await?;
                let config = self.get_site_config().await?;
                let battery = self.get_battery().await?;
                Ok(build_system_status(&power, &config, &battery))
            }

            "/api/logout" | "/api/login/Basic" => Ok(json!({"status": "ok"})),

            // Static documents for allow-listed paths the cloud has no live
            // equivalent for.
            "/api/meters/site" => Ok(canned::meters_site()),
            "/api/meters/solar" => Ok(Value::Null),
            "/api/auth/toggle/supported" => Ok(json!({"toggle_auth_supported": true})),
            "/api/sitemaster" => Ok(json!({
                "status": "StatusUp",
                "running": true,
                "connected_to_tesla": true,
                "power_supply_mode": false,
                "can_reboot": "Yes",
            })),
            "/api/powerwalls" => Ok(canned::powerwalls()),
            "/api/customer/registration" => Ok(json!({
                "privacy_notice": Value::Null,
                "limited_warranty": Value::Null,
                "grid_services": Value::Null,
                "marketing": Value::Null,
                "registered": true,
                "timed_out_registration": false,
            })),
            "/api/system/update/status" => Ok(json!({
                "state": "/update_succeeded",
                "info": {"status": ["nonactionable"]},
                "current_time": Value::Null,
                "last_status_time": Value::Null,
                "version": Value::Null,
                "offline_updating": false,
                "offline_update_error": "",
                "estimated_bytes_per_second": Value::Null,
            })),
            "/api/system_status/grid_faults" => Ok(json!([])),
            "/api/solars" => Ok(json!([{
                "brand": "Tesla",
                "model": "Solar Inverter 7.6",
                "power_rating_watts": 7600,
            }])),
            "/api/solars/brands" => Ok(canned::solars_brands()),
            "/api/customer" => Ok(json!({"registered": true})),
            "/api/meters" => Ok(canned::meters()),
            "/api/installer" => Ok(canned::installer()),
            "/api/networks" => Ok(canned::networks()),
            "/api/synchrometer/ct_voltage_references" => Ok(json!({
                "ct1": "Phase1",
                "ct2": "Phase2",
                "ct3": "Phase1",
            })),
            "/api/troubleshooting/problems" => Ok(json!({"problems": []})),
            "/api/solar_powerwall" => Ok(json!({})),

            // The cloud exposes no diagnostic vitals; empty success would
            // hide that, so report unsupported and let the facade render an
            // empty result.
            "/vitals" | "/strings" | "/api/devices/vitals" => {
                Err(BackendError::Unsupported(path.to_string()))
            }

            other => {
                error!("Unknown API in cloud mode: {}", other);
                Err(BackendError::Unsupported(other.to_string()))
            }
        }
    }
}

/// Synthesize the device's `/api/meters/aggregates` shape from cloud live
/// status plus site configuration.
fn build_aggregates(config: &Value, power: &Value) -> Value {
    let timestamp = lookup_or_null(power, &["response", "timestamp"]);
    let battery_count = lookup_or_null(config, &["response", "battery_count"]);
    let solar_inverters = match lookup(config, &["response", "components", "inverters"]) {
        Some(Value::Array(inverters)) => json!(inverters.len()),
        _ => {
            if lookup(config, &["response", "components", "solar"])
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                json!(1)
            } else {
                json!(0)
            }
        }
    };

    let meter = |power_value: Value, num_meters: Value| {
        json!({
            "last_communication_time": timestamp,
            "instant_power": power_value,
            "instant_reactive_power": 0,
            "instant_apparent_power": 0,
            "frequency": 0,
            "energy_exported": 0,
            "energy_imported": 0,
            "instant_average_voltage": 0,
            "instant_average_current": 0,
            "i_a_current": 0,
            "i_b_current": 0,
            "i_c_current": 0,
            "timeout": 1500000000u64,
            "num_meters_aggregated": num_meters,
            "instant_total_current": 0,
        })
    };

    json!({
        "site": meter(lookup_or_null(power, &["response", "grid_power"]), json!(1)),
        "battery": meter(
            lookup_or_null(power, &["response", "battery_power"]),
            battery_count,
        ),
        "load": meter(lookup_or_null(power, &["response", "load_power"]), json!(1)),
        "solar": meter(
            lookup_or_null(power, &["response", "solar_power"]),
            solar_inverters,
        ),
    })
}

fn build_system_status(power: &Value, config: &Value, battery: &Value) -> Value {
    let nameplate_power = lookup_or_null(config, &["response", "nameplate_power"]);
    let battery_count = lookup_or_null(config, &["response", "battery_count"]);
    let island_status = lookup(power, &["response", "island_status"]).and_then(Value::as_str);
    let grid_active =
        lookup(power, &["response", "grid_status"]).and_then(Value::as_str) == Some("Active");
    let grid_status = if island_status == Some("on_grid") || grid_active {
        "SystemGridConnected"
    } else {
        "SystemIslandedActive"
    };

    json!({
        "command_source": "Configuration",
        "battery_target_power": 0,
        "battery_target_reactive_power": 0,
        "nominal_full_pack_energy":
            lookup_or_null(battery, &["response", "total_pack_energy"]),
        "nominal_energy_remaining": lookup_or_null(battery, &["response", "energy_left"]),
        "max_charge_power": nameplate_power,
        "max_discharge_power": nameplate_power,
        "max_apparent_power": nameplate_power,
        "grid_services_power":
            lookup_or_null(power, &["response", "grid_services_power"]),
        "system_island_state": grid_status,
        "available_blocks": battery_count,
        "available_charger_blocks": 0,
        "battery_blocks": [],
        "grid_faults": [],
        "can_reboot": "Yes",
        "solar_real_power_limit": lookup_or_null(power, &["response", "solar_power"]),
        "blocks_controlled": battery_count,
        "primary": true,
        "auxiliary_load": 0,
        "all_enable_lines_high": true,
        "expected_energy_remaining": 0,
    })
}

/// Fixed documents for paths whose real content only exists on the device.
mod canned {
    use serde_json::{Value, json};

    pub fn meters_site() -> Value {
        json!([{
            "id": 0,
            "location": "site",
            "type": "neurio_w2_tcp",
            "cts": [true, true, false, false],
            "inverted": [false, false, false, false],
            "connection": {
                "short_id": "",
                "device_serial": "",
                "https_conf": {},
            },
        }])
    }

    pub fn powerwalls() -> Value {
        json!({
            "enumerating": false,
            "updating": false,
            "checking_if_offgrid": false,
            "running_phase_detection": false,
            "phase_detection_last_error": "no phase information",
            "bubble_shedding": false,
            "on_grid_check_error": "on grid check not run",
            "grid_qualifying": false,
            "grid_code_validating": false,
            "phase_detection_not_available": true,
            "powerwalls": [],
            "gateway_din": Value::Null,
            "sync": Value::Null,
            "msa": Value::Null,
            "states": Value::Null,
        })
    }

    pub fn solars_brands() -> Value {
        json!([
            "ABB", "Delta", "Enphase", "Fronius", "SMA", "SolarEdge", "Tesla", "Other"
        ])
    }

    pub fn meters() -> Value {
        json!([{
            "serial": "",
            "short_id": "",
            "type": "neurio_w2_tcp",
            "connected": true,
            "cts": [{
                "type": "solarRGM",
                "valid": [true, false, false, false],
                "inverted": [false, false, false, false],
            }],
        }])
    }

    pub fn installer() -> Value {
        json!({
            "company": "Tesla",
            "customer_id": "",
            "phone": "",
            "email": "",
            "location": "",
            "mounting": "",
            "wiring": "",
            "backup_configuration": "Whole Home",
            "solar_installation": "",
            "solar_installation_type": "",
            "run_sitemaster": true,
            "verified_config": true,
            "installation_types": ["Residential"],
        })
    }

    pub fn networks() -> Value {
        json!([{
            "network_name": "ethernet_tesla_internal_default",
            "interface": "EthType",
            "enabled": true,
            "dhcp": true,
            "active": true,
            "primary": true,
            "lastTeslaConnected": true,
            "lastInternetConnected": true,
            "iface_network_info": {
                "network_name": "ethernet_tesla_internal_default",
                "ip_address": "",
                "gateway": "",
                "dns": [],
                "state": "DeviceStateReady",
                "state_reason": "DeviceStateReasonNone",
                "signal_strength": 0,
                "hw_address": "",
            },
        }])
    }
}
