//! Unified device facade
//!
//! `Powerwall` is the single entry point the gateway server talks to. The
//! backend (local gateway or vendor cloud) is chosen once at construction
//! and never switched; every raw payload flows through the TTL response
//! cache; the semantic accessors are projections over cached payloads that
//! treat absent fields as the normal case. Device firmware varies, and a
//! missing key is an empty answer, not an error.

use crate::{Result, ResponseCache, cloud::CloudBackend, local::LocalBackend};
use serde_json::{Map, Value, json};
use std::time::Duration;
use tracing::debug;
use wattgate_core::parse_version;

/// The two upstream data sources, closed at construction time.
pub enum ActiveBackend {
    Local(LocalBackend),
    Cloud(CloudBackend),
}

impl ActiveBackend {
    pub async fn authenticate(&self) -> Result<()> {
        match self {
            ActiveBackend::Local(backend) => backend.authenticate().await,
            ActiveBackend::Cloud(backend) => backend.authenticate().await,
        }
    }

    pub async fn fetch(&self, path: &str) -> Result<Value> {
        match self {
            ActiveBackend::Local(backend) => backend.fetch(path).await,
            ActiveBackend::Cloud(backend) => backend.fetch(path).await,
        }
    }
}

/// Power grid connectivity as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridState {
    Up,
    Down,
    Syncing,
}

impl GridState {
    pub fn as_str(&self) -> &'static str {
        match self {
            GridState::Up => "UP",
            GridState::Down => "DOWN",
            GridState::Syncing => "SYNCING",
        }
    }

    pub fn as_numeric(&self) -> i8 {
        match self {
            GridState::Up => 1,
            GridState::Down => 0,
            GridState::Syncing => -1,
        }
    }
}

/// Fixed mapping from raw gateway state strings. Unrecognized states map to
/// `None`; new firmware occasionally grows states and that must never be
/// fatal.
pub fn map_grid_state(raw: &str) -> Option<GridState> {
    match raw {
        "SystemGridConnected" => Some(GridState::Up),
        "SystemIslandedActive" | "SystemMicroGridFaulted" | "SystemWaitForUser" => {
            Some(GridState::Down)
        }
        "SystemTransitionToGrid" | "SystemTransitionToIsland" | "SystemIslandedReady" => {
            Some(GridState::Syncing)
        }
        _ => None,
    }
}

/// Battery display scaling: the vendor app reserves 5% of capacity, so the
/// displayed percentage is `(raw / 0.95) - (5 / 0.95)`. Reproduced exactly
/// for compatibility.
pub fn scale_level(raw: f64) -> f64 {
    (raw / 0.95) - (5.0 / 0.95)
}

/// Aggregate power flows in watts, one value per meter.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct PowerFlows {
    pub site: f64,
    pub solar: f64,
    pub battery: f64,
    pub load: f64,
}

/// Facade over the active backend plus the response cache.
pub struct Powerwall {
    backend: ActiveBackend,
    cache: ResponseCache,
}

impl Powerwall {
    pub fn new(backend: ActiveBackend, cache_ttl: Duration) -> Self {
        Self {
            backend,
            cache: ResponseCache::new(cache_ttl),
        }
    }

    /// Authenticate the active backend. Called once at startup; failure is
    /// fatal there (no degraded mode without a valid session).
    pub async fn connect(&self) -> Result<()> {
        self.backend.authenticate().await
    }

    pub fn is_cloud(&self) -> bool {
        matches!(self.backend, ActiveBackend::Cloud(_))
    }

    pub fn local(&self) -> Option<&LocalBackend> {
        match &self.backend {
            ActiveBackend::Local(backend) => Some(backend),
            ActiveBackend::Cloud(_) => None,
        }
    }

    pub fn cloud(&self) -> Option<&CloudBackend> {
        match &self.backend {
            ActiveBackend::Cloud(backend) => Some(backend),
            ActiveBackend::Local(_) => None,
        }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Fetch an API payload through the cache. A fresh cached entry short-
    /// circuits the backend entirely; a stale or missing one delegates to
    /// the backend and refreshes the entry on success. Failures are never
    /// cached.
    pub async fn poll(&self, path: &str) -> Result<Value> {
        self.poll_with(path, false).await
    }

    /// Fetch bypassing the cache (the entry is still refreshed on success).
    pub async fn poll_force(&self, path: &str) -> Result<Value> {
        self.poll_with(path, true).await
    }

    async fn poll_with(&self, path: &str, bypass_cache: bool) -> Result<Value> {
        if !bypass_cache
            && let Some(payload) = self.cache.get_fresh(path)
        {
            return Ok(payload);
        }
        let payload = self.backend.fetch(path).await?;
        self.cache.store(path, payload.clone());
        Ok(payload)
    }

    /// Cache-checked fetch with failures flattened to `None`. Used by every
    /// derived accessor: an unreachable device or unsupported path reads as
    /// absent data, per the propagation policy.
    async fn poll_opt(&self, path: &str) -> Option<Value> {
        match self.poll(path).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                debug!("poll({}) unavailable: {}", path, e);
                None
            }
        }
    }

    /// Battery charge percentage. `scale` applies the app's 5% reserve
    /// convention.
    pub async fn level(&self, scale: bool) -> Option<f64> {
        let payload = self.poll_opt("/api/system_status/soe").await?;
        let raw = payload.get("percentage")?.as_f64()?;
        Some(if scale { scale_level(raw) } else { raw })
    }

    async fn fetch_power(&self, meter: &str) -> Option<f64> {
        let payload = self.poll_opt("/api/meters/aggregates").await?;
        payload.get(meter)?.get("instant_power")?.as_f64()
    }

    /// All four power flows from one aggregates poll.
    pub async fn power(&self) -> Option<PowerFlows> {
        let payload = self.poll_opt("/api/meters/aggregates").await?;
        let instant = |meter: &str| {
            payload
                .get(meter)
                .and_then(|m| m.get("instant_power"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
        };
        Some(PowerFlows {
            site: instant("site"),
            solar: instant("solar"),
            battery: instant("battery"),
            load: instant("load"),
        })
    }

    /// Grid import/export power in watts.
    pub async fn site(&self) -> Option<f64> {
        self.fetch_power("site").await
    }

    pub async fn solar(&self) -> Option<f64> {
        self.fetch_power("solar").await
    }

    pub async fn battery(&self) -> Option<f64> {
        self.fetch_power("battery").await
    }

    /// Home power usage in watts.
    pub async fn load(&self) -> Option<f64> {
        self.fetch_power("load").await
    }

    /// Alias for [`site`](Self::site).
    pub async fn grid(&self) -> Option<f64> {
        self.site().await
    }

    /// Alias for [`load`](Self::load).
    pub async fn home(&self) -> Option<f64> {
        self.load().await
    }

    pub async fn grid_status(&self) -> Option<GridState> {
        let payload = self.poll_opt("/api/system_status/grid_status").await?;
        let raw = payload.get("grid_status")?.as_str()?.to_string();
        let state = map_grid_state(&raw);
        if state.is_none() {
            debug!("Unrecognized grid state: {:?}", raw);
        }
        state
    }

    pub async fn grid_status_raw(&self) -> Option<Value> {
        self.poll_opt("/api/system_status/grid_status").await
    }

    /// Device vitals map. `None` in cloud mode and on firmware that no
    /// longer serves the endpoint.
    pub async fn vitals(&self) -> Option<Map<String, Value>> {
        let payload = self.poll_opt("/vitals").await?;
        payload.as_object().cloned()
    }

    /// Solar string data (current, voltage, power, state, connected).
    pub async fn strings(&self, verbose: bool) -> Map<String, Value> {
        let vitals = self.vitals().await.unwrap_or_default();
        if !vitals.is_empty() {
            return project_strings(&vitals, verbose);
        }
        // No vitals devices: newer firmware exposes string data under
        // /api/solar_powerwall instead.
        match self.poll_opt("/api/solar_powerwall").await {
            Some(payload) => strings_from_solar_powerwall(&payload),
            None => Map::new(),
        }
    }

    /// Ambient temperature per battery unit.
    pub async fn temps(&self) -> Map<String, Value> {
        match self.vitals().await {
            Some(vitals) => project_temps(&vitals),
            None => Map::new(),
        }
    }

    /// Alerts across all devices, with the solar_powerwall fallback for
    /// firmware without the vitals API.
    pub async fn alerts(&self) -> Vec<String> {
        if let Some(vitals) = self.vitals().await
            && !vitals.is_empty()
        {
            return project_alerts(&vitals);
        }
        match self.poll_opt("/api/solar_powerwall").await {
            Some(payload) => alerts_from_solar_powerwall(&payload),
            None => Vec::new(),
        }
    }

    pub async fn system_status(&self) -> Option<Value> {
        self.poll_opt("/api/system_status").await
    }

    /// Per-battery detail keyed by serial number: system_status blocks
    /// merged with the TETHC temperature/state vitals.
    pub async fn battery_blocks(&self) -> Option<Map<String, Value>> {
        let system_status = self.system_status().await?;
        let vitals = self.vitals().await?;
        if vitals.is_empty() {
            return None;
        }
        merge_battery_blocks(&system_status, &vitals)
    }

    pub async fn site_name(&self) -> Option<String> {
        let payload = self.poll_opt("/api/site_info/site_name").await?;
        match payload.get("site_name").and_then(Value::as_str) {
            Some(name) => Some(name.to_string()),
            None => {
                debug!("Unable to parse payload for site_name: {:?}", payload);
                None
            }
        }
    }

    pub async fn status_raw(&self) -> Option<Value> {
        self.poll_opt("/api/status").await
    }

    /// One field of `/api/status` (din, version, up_time_seconds, ...).
    pub async fn status(&self, param: &str) -> Option<Value> {
        let payload = self.status_raw().await?;
        match payload.get(param) {
            Some(value) => Some(value.clone()),
            None => {
                debug!("Missing {} in status payload", param);
                None
            }
        }
    }

    /// Firmware version string.
    pub async fn version(&self) -> Option<String> {
        self.status("version")
            .await
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// Firmware version packed for comparison.
    pub async fn version_int(&self) -> Option<u64> {
        let version = self.version().await?;
        parse_version(&version)
    }

    pub async fn uptime(&self) -> Option<Value> {
        self.status("up_time_seconds").await
    }

    pub async fn din(&self) -> Option<String> {
        self.status("din")
            .await
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// Battery backup reserve percentage from `/api/operation`.
    pub async fn reserve(&self, scale: bool) -> Option<f64> {
        let payload = self.poll_opt("/api/operation").await?;
        let raw = payload.get("backup_reserve_percent")?.as_f64()?;
        Some(if scale { scale_level(raw) } else { raw })
    }

    /// Backup time remaining on the battery, in hours.
    pub async fn time_remaining(&self) -> Option<f64> {
        match &self.backend {
            ActiveBackend::Cloud(backend) => match backend.get_time_remaining().await {
                Ok(hours) => hours,
                Err(e) => {
                    debug!("time_remaining unavailable: {}", e);
                    None
                }
            },
            ActiveBackend::Local(_) => {
                // The local gateway has no direct endpoint; estimate from
                // remaining pack energy over present load.
                let status = self.system_status().await?;
                let energy = status.get("nominal_energy_remaining")?.as_f64()?;
                let load = self.load().await?;
                if load > 0.0 { Some(energy / load) } else { None }
            }
        }
    }

    /// True when the upstream answers an authenticated status poll.
    pub async fn is_connected(&self) -> bool {
        self.status_raw().await.is_some()
    }
}

const STRING_KEY_MARKERS: [&str; 5] = [
    "PVAC_PVCurrent",
    "PVAC_PVMeasuredPower",
    "PVAC_PVMeasuredVoltage",
    "PVAC_PvState",
    "PVS_String",
];

fn is_string_key(key: &str) -> bool {
    STRING_KEY_MARKERS.iter().any(|marker| key.contains(marker))
}

/// Project solar string data out of a vitals map. PVAC devices carry the
/// electrical measurements; the paired PVS device carries per-string
/// connectivity, injected under the same unit before projection.
pub(crate) fn project_strings(vitals: &Map<String, Value>, verbose: bool) -> Map<String, Value> {
    let devicemap = ["", "1", "2", "3", "4", "5", "6", "7", "8"];
    let mut result = Map::new();
    let mut deviceidx = 0usize;

    for (device, data) in vitals {
        if device.split("--").next() != Some("PVAC") {
            continue;
        }
        let mut merged = match data.as_object() {
            Some(obj) => obj.clone(),
            None => continue,
        };
        // PVS shares the device suffix: PVAC--x--y <-> PVS--x--y
        let look = format!("PVS{}", &device[4..]);
        if let Some(pvs) = vitals.get(&look).and_then(Value::as_object) {
            for (key, value) in pvs {
                if key.contains("String") {
                    merged.insert(key.clone(), value.clone());
                }
            }
        }

        if verbose {
            let mut entry = Map::new();
            if let Some(pout) = merged.get("PVAC_Pout") {
                entry.insert("PVAC_Pout".to_string(), pout.clone());
            }
            for (key, value) in &merged {
                if is_string_key(key) {
                    entry.insert(key.clone(), value.clone());
                }
            }
            result.insert(device.clone(), Value::Object(entry));
        } else {
            let suffix = devicemap.get(deviceidx).copied().unwrap_or("");
            for (key, value) in &merged {
                if !is_string_key(key) {
                    continue;
                }
                let (field, name) = if key.contains("Current") {
                    ("Current", string_name(key, key.len() - 1, suffix))
                } else if key.contains("Power") {
                    ("Power", string_name(key, key.len() - 1, suffix))
                } else if key.contains("Voltage") {
                    ("Voltage", string_name(key, key.len() - 1, suffix))
                } else if key.contains("State") {
                    ("State", string_name(key, key.len() - 1, suffix))
                } else if key.contains("Connected") {
                    // PVS_StringX_Connected: the string letter sits at a
                    // fixed offset rather than the end.
                    ("Connected", string_name(key, 10, suffix))
                } else {
                    ("Unknown", string_name(key, key.len() - 1, suffix))
                };
                let entry = result
                    .entry(name)
                    .or_insert_with(|| Value::Object(Map::new()));
                if let Some(obj) = entry.as_object_mut() {
                    obj.insert(field.to_string(), value.clone());
                }
            }
            deviceidx += 1;
        }
    }
    result
}

fn string_name(key: &str, index: usize, suffix: &str) -> String {
    let letter = key
        .chars()
        .nth(index)
        .map(|c| c.to_string())
        .unwrap_or_default();
    format!("{letter}{suffix}")
}

/// String data fallback for firmware without vitals: the PVAC status block
/// of `/api/solar_powerwall`.
pub(crate) fn strings_from_solar_powerwall(payload: &Value) -> Map<String, Value> {
    let mut result = Map::new();
    let string_vitals = match payload
        .get("pvac_status")
        .and_then(|p| p.get("string_vitals"))
        .and_then(Value::as_array)
    {
        Some(vitals) => vitals,
        None => return result,
    };

    // String names run A, B, C, D, A1, B1, ... matching the unit layout.
    let mut string_map = Vec::new();
    for number in ["", "1", "2", "3", "4", "5", "6", "7", "8"] {
        for letter in ["A", "B", "C", "D"] {
            string_map.push(format!("{letter}{number}"));
        }
    }

    for (i, string) in string_vitals.iter().enumerate() {
        let Some(name) = string_map.get(i) else { break };
        result.insert(
            name.clone(),
            json!({
                "Connected": string.get("connected").cloned().unwrap_or(Value::Null),
                "Voltage": string.get("measured_voltage").cloned().unwrap_or(Value::Null),
                "Current": string.get("current").cloned().unwrap_or(Value::Null),
                "Power": string.get("measured_power").cloned().unwrap_or(Value::Null),
            }),
        );
    }
    result
}

/// Ambient temperature per TETHC (battery enclosure) device.
pub(crate) fn project_temps(vitals: &Map<String, Value>) -> Map<String, Value> {
    let mut temps = Map::new();
    for (device, data) in vitals {
        if device.starts_with("TETHC") {
            temps.insert(
                device.clone(),
                data.get("THC_AmbientTemp").cloned().unwrap_or(Value::Null),
            );
        }
    }
    temps
}

/// Flatten the alert arrays of every vitals device.
pub(crate) fn project_alerts(vitals: &Map<String, Value>) -> Vec<String> {
    let mut alerts = Vec::new();
    for data in vitals.values() {
        if let Some(device_alerts) = data.get("alerts").and_then(Value::as_array) {
            for alert in device_alerts {
                if let Some(alert) = alert.as_str() {
                    alerts.push(alert.to_string());
                }
            }
        }
    }
    alerts
}

/// Alert fallback for firmware without vitals: active flags in the
/// pvac/pvs alert blocks of `/api/solar_powerwall`.
pub(crate) fn alerts_from_solar_powerwall(payload: &Value) -> Vec<String> {
    let mut alerts = Vec::new();
    for section in ["pvac_alerts", "pvs_alerts"] {
        if let Some(flags) = payload.get(section).and_then(Value::as_object) {
            for (alert, active) in flags {
                if active.as_bool() == Some(true) {
                    alerts.push(alert.clone());
                }
            }
        }
    }
    alerts
}

/// Merge system_status battery blocks (keyed by serial number) with the
/// TETHC temperature/state vitals.
pub(crate) fn merge_battery_blocks(
    system_status: &Value,
    vitals: &Map<String, Value>,
) -> Option<Map<String, Value>> {
    let blocks = system_status
        .get("battery_blocks")
        .and_then(Value::as_array)?;
    let available = system_status
        .get("available_blocks")
        .and_then(Value::as_u64)
        .unwrap_or(blocks.len() as u64) as usize;

    let mut result = Map::new();
    for block in blocks.iter().take(available) {
        let obj = block.as_object()?;
        let serial = obj.get("PackageSerialNumber")?.as_str()?;
        let mut entry = Map::new();
        for (key, value) in obj {
            if key != "PackageSerialNumber" {
                entry.insert(key.clone(), value.clone());
            }
        }
        result.insert(serial.to_string(), Value::Object(entry));
    }

    for (device, data) in vitals {
        if !device.starts_with("TETHC--") {
            continue;
        }
        let Some(serial) = device.split("--").nth(2) else {
            continue;
        };
        if let Some(entry) = result.get_mut(serial).and_then(Value::as_object_mut) {
            entry.insert(
                "THC_State".to_string(),
                data.get("THC_State").cloned().unwrap_or(Value::Null),
            );
            entry.insert(
                "temperature".to_string(),
                data.get("THC_AmbientTemp").cloned().unwrap_or(Value::Null),
            );
        }
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scale_level_reference_points() {
        assert!((scale_level(100.0) - 100.0).abs() < 1e-9);
        assert!((scale_level(50.0) - 47.368421052631575).abs() < 1e-9);
        assert!(scale_level(5.0).abs() < 1e-9);
    }

    #[test]
    fn test_grid_state_mapping() {
        assert_eq!(map_grid_state("SystemGridConnected"), Some(GridState::Up));
        assert_eq!(
            map_grid_state("SystemIslandedActive"),
            Some(GridState::Down)
        );
        assert_eq!(
            map_grid_state("SystemTransitionToGrid"),
            Some(GridState::Syncing)
        );
        assert_eq!(
            map_grid_state("SystemTransitionToIsland"),
            Some(GridState::Syncing)
        );
        assert_eq!(
            map_grid_state("SystemIslandedReady"),
            Some(GridState::Syncing)
        );
        assert_eq!(
            map_grid_state("SystemMicroGridFaulted"),
            Some(GridState::Down)
        );
        assert_eq!(map_grid_state("SystemWaitForUser"), Some(GridState::Down));
        assert_eq!(map_grid_state("SomethingNew"), None);
    }

    #[test]
    fn test_grid_state_projections() {
        assert_eq!(GridState::Up.as_str(), "UP");
        assert_eq!(GridState::Up.as_numeric(), 1);
        assert_eq!(GridState::Down.as_str(), "DOWN");
        assert_eq!(GridState::Down.as_numeric(), 0);
        assert_eq!(GridState::Syncing.as_str(), "SYNCING");
        assert_eq!(GridState::Syncing.as_numeric(), -1);
    }

    fn sample_vitals() -> Map<String, Value> {
        json!({
            "PVAC--12345--ABC": {
                "PVAC_Pout": 2900,
                "PVAC_PVCurrentA": 2.1,
                "PVAC_PVMeasuredPowerA": 780.0,
                "PVAC_PVMeasuredVoltageA": 380.2,
                "PVAC_PvStateA": "PV_Active",
                "alerts": ["PVAC_a001_inv"],
            },
            "PVS--12345--ABC": {
                "PVS_StringA_Connected": true,
                "PVS_SelfTestState": "PVS_SelfTestOff",
            },
            "TETHC--2012170-25-E--TG123456789012": {
                "THC_AmbientTemp": 21.5,
                "THC_State": "THC_STATE_AUTONOMOUSCONTROL",
                "alerts": [],
            },
        })
        .as_object()
        .unwrap()
        .clone()
    }

    #[test]
    fn test_project_strings_simplified() {
        let strings = project_strings(&sample_vitals(), false);
        let a = strings.get("A").and_then(Value::as_object).unwrap();
        assert_eq!(a.get("Current"), Some(&json!(2.1)));
        assert_eq!(a.get("Power"), Some(&json!(780.0)));
        assert_eq!(a.get("Voltage"), Some(&json!(380.2)));
        assert_eq!(a.get("State"), Some(&json!("PV_Active")));
        // Connected was injected from the paired PVS device
        assert_eq!(a.get("Connected"), Some(&json!(true)));
    }

    #[test]
    fn test_project_strings_verbose_keeps_raw_keys() {
        let strings = project_strings(&sample_vitals(), true);
        let device = strings
            .get("PVAC--12345--ABC")
            .and_then(Value::as_object)
            .unwrap();
        assert_eq!(device.get("PVAC_Pout"), Some(&json!(2900)));
        assert_eq!(device.get("PVAC_PVCurrentA"), Some(&json!(2.1)));
        assert_eq!(device.get("PVS_StringA_Connected"), Some(&json!(true)));
    }

    #[test]
    fn test_project_strings_empty_vitals() {
        assert!(project_strings(&Map::new(), false).is_empty());
    }

    #[test]
    fn test_strings_from_solar_powerwall() {
        let payload = json!({
            "pvac_status": {
                "string_vitals": [
                    {"connected": true, "measured_voltage": 380.0, "current": 2.0, "measured_power": 760.0},
                    {"connected": false, "measured_voltage": 0.0, "current": 0.0, "measured_power": 0.0},
                ],
            },
        });
        let strings = strings_from_solar_powerwall(&payload);
        assert_eq!(strings["A"]["Connected"], json!(true));
        assert_eq!(strings["A"]["Voltage"], json!(380.0));
        assert_eq!(strings["B"]["Connected"], json!(false));
        assert_eq!(strings.len(), 2);
    }

    #[test]
    fn test_strings_from_solar_powerwall_without_pvac() {
        assert!(strings_from_solar_powerwall(&json!({})).is_empty());
    }

    #[test]
    fn test_project_temps() {
        let temps = project_temps(&sample_vitals());
        assert_eq!(temps.len(), 1);
        assert_eq!(
            temps.get("TETHC--2012170-25-E--TG123456789012"),
            Some(&json!(21.5))
        );
    }

    #[test]
    fn test_project_temps_missing_field_is_null() {
        let vitals = json!({"TETHC--x--y": {"THC_State": "on"}})
            .as_object()
            .unwrap()
            .clone();
        let temps = project_temps(&vitals);
        assert_eq!(temps.get("TETHC--x--y"), Some(&Value::Null));
    }

    #[test]
    fn test_project_alerts() {
        let alerts = project_alerts(&sample_vitals());
        assert_eq!(alerts, vec!["PVAC_a001_inv".to_string()]);
    }

    #[test]
    fn test_alerts_from_solar_powerwall() {
        let payload = json!({
            "pvac_alerts": {"PVAC_a001_inv": true, "PVAC_a002_inv": false},
            "pvs_alerts": {"PVS_a003": true},
        });
        let mut alerts = alerts_from_solar_powerwall(&payload);
        alerts.sort();
        assert_eq!(alerts, vec!["PVAC_a001_inv", "PVS_a003"]);
    }

    #[test]
    fn test_merge_battery_blocks() {
        let system_status = json!({
            "available_blocks": 1,
            "battery_blocks": [{
                "PackageSerialNumber": "TG123456789012",
                "nominal_energy_remaining": 13500,
                "f_out": 60.01,
            }],
        });
        let merged = merge_battery_blocks(&system_status, &sample_vitals()).unwrap();
        let block = merged.get("TG123456789012").unwrap();
        assert_eq!(block["nominal_energy_remaining"], json!(13500));
        assert_eq!(block["temperature"], json!(21.5));
        assert_eq!(block["THC_State"], json!("THC_STATE_AUTONOMOUSCONTROL"));
        assert!(block.get("PackageSerialNumber").is_none());
    }

    #[test]
    fn test_merge_battery_blocks_without_blocks() {
        assert!(merge_battery_blocks(&json!({}), &sample_vitals()).is_none());
    }
}
