//! Request dispatch
//!
//! Routing policy, in priority order:
//! 1. convenience aliases (`/soe`, `/csv`, the scaled battery endpoint)
//! 2. derived/aggregated endpoints projected over already-polled payloads
//! 3. the fixed allow-list of raw upstream API paths, proxied through the
//!    facade's cache
//! 4. everything else is dashboard traffic: local web root first, then the
//!    device's own web server (local mode), else not-found (cloud mode)
//!
//! Every response increments exactly one of gets/errors/timeouts, once,
//! regardless of which branch served it.

use crate::proxy::proxy_to_gateway;
use crate::statics::get_static;
use crate::{AppState, BUILD};
use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use axum::routing::get;
use serde_json::{Map, Value, json};
use tracing::debug;
use wattgate_backend::{AuthMode, BackendError, GridState};
use wattgate_core::{Session, parse_version};

/// Raw upstream API paths proxied verbatim through the cache. Paths with
/// dedicated handlers (aggregates, soe, troubleshooting) are routed above
/// this table.
pub const ALLOWLIST: &[&str] = &[
    "/api/status",
    "/api/site_info/site_name",
    "/api/meters/site",
    "/api/meters/solar",
    "/api/sitemaster",
    "/api/powerwalls",
    "/api/customer/registration",
    "/api/system_status",
    "/api/system_status/grid_status",
    "/api/system/update/status",
    "/api/site_info",
    "/api/system_status/grid_faults",
    "/api/operation",
    "/api/site_info/grid_codes",
    "/api/solars",
    "/api/solars/brands",
    "/api/customer",
    "/api/meters",
    "/api/installer",
    "/api/networks",
    "/api/system/networks",
    "/api/meters/readings",
    "/api/synchrometer/ct_voltage_references",
    "/api/auth/toggle/supported",
    "/api/solar_powerwall",
];

/// Assemble the gateway router.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/aggregates", get(aggregates))
        .route("/api/meters/aggregates", get(aggregates))
        .route("/soe", get(soe_raw))
        .route("/api/system_status/soe", get(soe_scaled))
        .route("/csv", get(csv_snapshot))
        .route("/vitals", get(vitals))
        .route("/strings", get(strings))
        .route("/temps", get(temps))
        .route("/temps/pw", get(temps_pw))
        .route("/alerts", get(alerts))
        .route("/alerts/pw", get(alerts_pw))
        .route("/freq", get(freq))
        .route("/pod", get(pod))
        .route("/version", get(version))
        .route("/stats", get(stats_view))
        .route("/stats/clear", get(stats_clear))
        .route("/help", get(help_page))
        .route("/api/troubleshooting/problems", get(problems));

    for &path in ALLOWLIST {
        router = router.route(
            path,
            get(move |State(state): State<AppState>| async move {
                api_poll_response(&state, path, path).await
            }),
        );
    }

    router.fallback(dashboard).with_state(state)
}

/// API response: JSON body, CORS open, always completes with 200 so pollers
/// never hang on an upstream hiccup.
fn api_response(body: String, content_type: &'static str) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")
        .body(Body::from(body))
        .expect("static response headers")
}

fn json_api_response(value: &Value) -> Response {
    api_response(value.to_string(), "application/json")
}

/// Serve a raw upstream path through the cache, counting the outcome under
/// `stat_path` (the path the client actually requested).
async fn api_poll_response(state: &AppState, stat_path: &str, api_path: &str) -> Response {
    match state.pw.poll(api_path).await {
        Ok(payload) => {
            state.stats.record_get(stat_path);
            json_api_response(&payload)
        }
        Err(BackendError::Timeout(secs)) => {
            debug!("Timeout polling {} after {}s", api_path, secs);
            state.stats.record_timeout();
            api_response("TIMEOUT!".to_string(), "application/json")
        }
        Err(BackendError::Unsupported(path)) => {
            // Cloud mode asked for a device-only capability: an empty
            // document, not an error.
            debug!("Unsupported in this mode: {}", path);
            state.stats.record_get(stat_path);
            api_response("{}".to_string(), "application/json")
        }
        Err(e) => {
            debug!("Error polling {}: {}", api_path, e);
            state.stats.record_error();
            api_response("ERROR!".to_string(), "application/json")
        }
    }
}

/// Derived endpoints always succeed; absence became null/empty upstream.
fn derived_response(state: &AppState, stat_path: &str, value: Value) -> Response {
    state.stats.record_get(stat_path);
    json_api_response(&value)
}

async fn aggregates(State(state): State<AppState>) -> Response {
    api_poll_response(&state, "/api/meters/aggregates", "/api/meters/aggregates").await
}

async fn soe_raw(State(state): State<AppState>) -> Response {
    api_poll_response(&state, "/soe", "/api/system_status/soe").await
}

/// Battery level on the app's 5%-reserve scale.
async fn soe_scaled(State(state): State<AppState>) -> Response {
    let level = state.pw.level(true).await;
    derived_response(
        &state,
        "/api/system_status/soe",
        json!({ "percentage": level }),
    )
}

/// Plain-text snapshot of the five core metrics: grid, home, solar,
/// battery, level.
async fn csv_snapshot(State(state): State<AppState>) -> Response {
    let level = state.pw.level(false).await.unwrap_or(0.0);
    let grid = state.pw.grid().await.unwrap_or(0.0);
    let home = state.pw.home().await.unwrap_or(0.0);
    let solar = state.pw.solar().await.unwrap_or(0.0);
    let battery = state.pw.battery().await.unwrap_or(0.0);
    state.stats.record_get("/csv");
    api_response(
        format!("{grid:.2},{home:.2},{solar:.2},{battery:.2},{level:.2}\n"),
        "text/plain; charset=utf-8",
    )
}

async fn vitals(State(state): State<AppState>) -> Response {
    let vitals = state.pw.vitals().await.unwrap_or_default();
    derived_response(&state, "/vitals", Value::Object(vitals))
}

async fn strings(State(state): State<AppState>) -> Response {
    let strings = state.pw.strings(false).await;
    derived_response(&state, "/strings", Value::Object(strings))
}

async fn temps(State(state): State<AppState>) -> Response {
    let temps = state.pw.temps().await;
    derived_response(&state, "/temps", Value::Object(temps))
}

/// Temperatures reshaped to simple indexed keys (`PW1_temp`, ...).
async fn temps_pw(State(state): State<AppState>) -> Response {
    let temps = state.pw.temps().await;
    let mut reshaped = Map::new();
    for (idx, (_, temp)) in temps.into_iter().enumerate() {
        reshaped.insert(format!("PW{}_temp", idx + 1), temp);
    }
    derived_response(&state, "/temps/pw", Value::Object(reshaped))
}

async fn alerts(State(state): State<AppState>) -> Response {
    let alerts = state.pw.alerts().await;
    derived_response(&state, "/alerts", json!(alerts))
}

/// Alerts keyed by name, values pinned to 1 (easy for flat ingestion).
async fn alerts_pw(State(state): State<AppState>) -> Response {
    let alerts = state.pw.alerts().await;
    let mut keyed = Map::new();
    for alert in alerts {
        keyed.insert(alert, json!(1));
    }
    derived_response(&state, "/alerts/pw", Value::Object(keyed))
}

async fn freq(State(state): State<AppState>) -> Response {
    let system_status = state.pw.system_status().await;
    let vitals = state.pw.vitals().await;
    let grid = state.pw.grid_status().await;
    let fcv = project_freq(system_status.as_ref(), vitals.as_ref(), grid);
    derived_response(&state, "/freq", Value::Object(fcv))
}

async fn pod(State(state): State<AppState>) -> Response {
    let system_status = state.pw.system_status().await;
    let vitals = state.pw.vitals().await;
    let mut pod = project_pod(system_status.as_ref(), vitals.as_ref());
    if !pod.is_empty() {
        pod.insert(
            "time_remaining_hours".to_string(),
            json!(state.pw.time_remaining().await),
        );
        pod.insert(
            "backup_reserve_percent".to_string(),
            json!(state.pw.reserve(true).await),
        );
        let status = system_status.unwrap_or(Value::Null);
        pod.insert(
            "nominal_full_pack_energy".to_string(),
            status
                .get("nominal_full_pack_energy")
                .cloned()
                .unwrap_or(Value::Null),
        );
        pod.insert(
            "nominal_energy_remaining".to_string(),
            status
                .get("nominal_energy_remaining")
                .cloned()
                .unwrap_or(Value::Null),
        );
    }
    derived_response(&state, "/pod", Value::Object(pod))
}

/// Firmware version, raw plus packed for comparisons. Solar-only systems
/// report no version at all.
async fn version(State(state): State<AppState>) -> Response {
    let value = match state.pw.version().await {
        Some(version) => {
            let vint = parse_version(&version).unwrap_or(0);
            json!({"version": version, "vint": vint})
        }
        None => json!({"version": "SolarOnly", "vint": 0}),
    };
    derived_response(&state, "/version", value)
}

async fn build_stats_document(state: &AppState) -> Value {
    let mut doc = state.stats.snapshot();
    doc.insert(
        "wattgate".to_string(),
        json!(format!("{} Proxy {}", env!("CARGO_PKG_VERSION"), BUILD)),
    );
    doc.insert("site_name".to_string(), json!(state.pw.site_name().await));
    doc.insert("cloudmode".to_string(), json!(state.pw.is_cloud()));
    if let Some(cloud) = state.pw.cloud() {
        doc.insert("siteid".to_string(), json!(cloud.site_id()));
        doc.insert("counter".to_string(), json!(cloud.counter()));
    }
    doc.insert(
        "authmode".to_string(),
        json!(state.config.auth_mode.as_str()),
    );
    Value::Object(doc)
}

async fn stats_view(State(state): State<AppState>) -> Response {
    // Snapshot first so the document does not include this request
    let doc = build_stats_document(&state).await;
    derived_response(&state, "/stats", doc)
}

async fn stats_clear(State(state): State<AppState>) -> Response {
    debug!("Clear internal stats");
    state.stats.clear();
    let doc = build_stats_document(&state).await;
    derived_response(&state, "/stats/clear", doc)
}

/// Human-facing status page with the serving statistics.
async fn help_page(State(state): State<AppState>) -> Response {
    let doc = build_stats_document(&state).await;
    let mut rows = String::new();
    if let Some(doc) = doc.as_object() {
        for (key, value) in doc {
            if key == "uri" {
                continue;
            }
            rows.push_str(&format!(
                "<tr><td align=\"left\">{key}</td><td align=\"left\">{value}</td></tr>\n"
            ));
        }
        if let Some(uri) = doc.get("uri").and_then(Value::as_object) {
            for (path, hits) in uri {
                rows.push_str(&format!(
                    "<tr><td align=\"left\">URI: {path}</td><td align=\"left\">{hits}</td></tr>\n"
                ));
            }
        }
    }
    let body = format!(
        "<html>\n<head><meta http-equiv=\"refresh\" content=\"5\" />\n\
         <style>p, td, th {{ font-family: Helvetica, Arial, sans-serif; font-size: 10px;}}</style>\n\
         <style>h1 {{ font-family: Helvetica, Arial, sans-serif; font-size: 20px;}}</style>\n\
         </head>\n<body>\n<h1>WattGate [{}] Proxy [{}]</h1>\n\n\
         <table>\n<tr><th align=\"left\">Stat</th><th align=\"left\">Value</th></tr>\n{}\
         </table>\n</body>\n</html>",
        env!("CARGO_PKG_VERSION"),
        BUILD,
        rows
    );
    state.stats.record_get("/help");
    api_response(body, "text/html")
}

/// Troubleshooting problems with the documented empty-problems fallback.
async fn problems(State(state): State<AppState>) -> Response {
    let value = match state.pw.poll("/api/troubleshooting/problems").await {
        Ok(payload) => payload,
        Err(e) => {
            debug!("troubleshooting/problems unavailable: {}", e);
            json!({"problems": []})
        }
    };
    derived_response(&state, "/api/troubleshooting/problems", value)
}

/// Dashboard/static/proxied content: everything the route table does not
/// claim. Session cookies are re-issued on every response here so the
/// bundled web application can talk to the device API through us.
async fn dashboard(State(state): State<AppState>, req: Request) -> Response {
    state.stats.record_get_anonymous();

    let path = req.uri().path().to_string();
    let path_and_query = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| path.clone());

    let suffix = state.config.https_mode.cookie_suffix();
    let cookies = match state.config.auth_mode {
        // Token mode has no real cookie pair; issue bogus values so the
        // web application's cookie checks pass.
        AuthMode::Token => vec![
            format!("AuthCookie=1234567890;{suffix}"),
            format!("UserRecord=1234567890;{suffix}"),
        ],
        AuthMode::Cookie => match state.pw.local().and_then(|local| local.session()) {
            Some(Session::Cookie {
                auth_cookie,
                user_record,
            }) => vec![
                format!("AuthCookie={auth_cookie};{suffix}"),
                format!("UserRecord={user_record};{suffix}"),
            ],
            _ => vec![
                format!("AuthCookie=local;{suffix}"),
                format!("UserRecord=local;{suffix}"),
            ],
        },
    };

    let lookup = if path == "/" { "/index.html" } else { path.as_str() };
    let mut response = serve_dashboard_content(&state, lookup, &path_and_query).await;

    // Browser caching only for style/script/image content, and only when
    // the operator opted in.
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    let cacheable = matches!(
        content_type.as_str(),
        "text/css" | "application/javascript" | "image/png"
    );
    let cache_control = if state.config.browser_cache_secs > 0 && cacheable {
        format!("max-age={}", state.config.browser_cache_secs)
    } else {
        "no-cache, no-store".to_string()
    };
    if let Ok(value) = HeaderValue::from_str(&cache_control) {
        response.headers_mut().insert(header::CACHE_CONTROL, value);
    }
    for cookie in cookies {
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

async fn serve_dashboard_content(
    state: &AppState,
    lookup: &str,
    path_and_query: &str,
) -> Response {
    if let Some(root) = &state.config.web_root
        && let Some((bytes, content_type)) = get_static(root, lookup).await
    {
        return Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(bytes))
            .expect("static response headers");
    }

    if state.pw.is_cloud() {
        debug!("Cloud mode - file not found: {}", lookup);
        return Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from("Not Found"))
            .expect("static response headers");
    }

    match state.pw.local() {
        Some(local) => match proxy_to_gateway(local, path_and_query).await {
            Ok(response) => response,
            Err(e) => {
                // A broken device-side fetch is a debug-level event; the
                // server keeps serving.
                debug!("Proxy to gateway failed for {}: {}", path_and_query, e);
                Response::builder()
                    .status(StatusCode::BAD_GATEWAY)
                    .header(header::CONTENT_TYPE, "text/plain")
                    .body(Body::from("Not Found"))
                    .expect("static response headers")
            }
        },
        None => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::empty())
            .expect("static response headers"),
    }
}

fn get_value(block: &Value, key: &str) -> Value {
    match block.get(key) {
        Some(value) => value.clone(),
        None => {
            debug!("Missing key in payload [{}]", key);
            Value::Null
        }
    }
}

/// Booleans flatten to 0/1 for flat ingestion; everything else passes
/// through (including null for absent keys).
fn as_int_flag(value: Value) -> Value {
    match value {
        Value::Bool(true) => json!(1),
        Value::Bool(false) => json!(0),
        other => other,
    }
}

/// Frequency/voltage summary across battery blocks and inverter vitals.
pub(crate) fn project_freq(
    system_status: Option<&Value>,
    vitals: Option<&Map<String, Value>>,
    grid: Option<GridState>,
) -> Map<String, Value> {
    let mut fcv = Map::new();

    if let Some(blocks) = system_status
        .and_then(|s| s.get("battery_blocks"))
        .and_then(Value::as_array)
    {
        for (i, block) in blocks.iter().enumerate() {
            let idx = i + 1;
            // Vitals placeholders, overwritten below when vitals exist
            fcv.insert(format!("PW{idx}_name"), Value::Null);
            fcv.insert(format!("PW{idx}_PINV_Fout"), get_value(block, "f_out"));
            fcv.insert(format!("PW{idx}_PINV_VSplit1"), Value::Null);
            fcv.insert(format!("PW{idx}_PINV_VSplit2"), Value::Null);
            fcv.insert(
                format!("PW{idx}_PackagePartNumber"),
                get_value(block, "PackagePartNumber"),
            );
            fcv.insert(
                format!("PW{idx}_PackageSerialNumber"),
                get_value(block, "PackageSerialNumber"),
            );
            for field in ["p_out", "q_out", "v_out", "f_out", "i_out"] {
                fcv.insert(format!("PW{idx}_{field}"), get_value(block, field));
            }
        }
    }

    if let Some(vitals) = vitals {
        let mut idx = 1;
        for (device, data) in vitals {
            if device.starts_with("TEPINV") {
                fcv.insert(format!("PW{idx}_name"), json!(device));
                for field in ["PINV_Fout", "PINV_VSplit1", "PINV_VSplit2"] {
                    fcv.insert(format!("PW{idx}_{field}"), get_value(data, field));
                }
                idx += 1;
            }
            if device.starts_with("TESYNC") || device.starts_with("TEMSA") {
                // Island and meter metrics from the backup gateway/switch
                if let Some(obj) = data.as_object() {
                    for (key, value) in obj {
                        if key.starts_with("ISLAND") || key.starts_with("METER") {
                            fcv.insert(key.clone(), value.clone());
                        }
                    }
                }
            }
        }
    }

    fcv.insert(
        "grid_status".to_string(),
        grid.map(|g| json!(g.as_numeric())).unwrap_or(Value::Null),
    );
    fcv
}

/// Per-battery detail ("pod"): system_status blocks first, then the TEPOD
/// vitals overlay.
pub(crate) fn project_pod(
    system_status: Option<&Value>,
    vitals: Option<&Map<String, Value>>,
) -> Map<String, Value> {
    let mut pod = Map::new();

    if let Some(blocks) = system_status
        .and_then(|s| s.get("battery_blocks"))
        .and_then(Value::as_array)
    {
        for (i, block) in blocks.iter().enumerate() {
            let idx = i + 1;
            // Vitals placeholders
            pod.insert(format!("PW{idx}_name"), Value::Null);
            for field in [
                "POD_ActiveHeating",
                "POD_ChargeComplete",
                "POD_ChargeRequest",
                "POD_DischargeComplete",
                "POD_PermanentlyFaulted",
                "POD_PersistentlyFaulted",
                "POD_enable_line",
                "POD_available_charge_power",
                "POD_available_dischg_power",
                "POD_nom_energy_to_be_charged",
            ] {
                pod.insert(format!("PW{idx}_{field}"), Value::Null);
            }
            pod.insert(
                format!("PW{idx}_POD_nom_energy_remaining"),
                get_value(block, "nominal_energy_remaining"),
            );
            pod.insert(
                format!("PW{idx}_POD_nom_full_pack_energy"),
                get_value(block, "nominal_full_pack_energy"),
            );
            pod.insert(
                format!("PW{idx}_PackagePartNumber"),
                get_value(block, "PackagePartNumber"),
            );
            pod.insert(
                format!("PW{idx}_PackageSerialNumber"),
                get_value(block, "PackageSerialNumber"),
            );
            for field in [
                "pinv_state",
                "pinv_grid_state",
                "p_out",
                "q_out",
                "v_out",
                "f_out",
                "i_out",
                "energy_charged",
                "energy_discharged",
                "OpSeqState",
                "version",
            ] {
                pod.insert(format!("PW{idx}_{field}"), get_value(block, field));
            }
            for field in [
                "off_grid",
                "vf_mode",
                "wobble_detected",
                "charge_power_clamped",
                "backup_ready",
            ] {
                pod.insert(
                    format!("PW{idx}_{field}"),
                    as_int_flag(get_value(block, field)),
                );
            }
        }
    }

    if let Some(vitals) = vitals {
        let mut idx = 1;
        for (device, data) in vitals {
            if !device.starts_with("TEPOD") {
                continue;
            }
            pod.insert(format!("PW{idx}_name"), json!(device));
            for field in [
                "POD_ActiveHeating",
                "POD_ChargeComplete",
                "POD_ChargeRequest",
                "POD_DischargeComplete",
                "POD_PermanentlyFaulted",
                "POD_PersistentlyFaulted",
                "POD_enable_line",
            ] {
                pod.insert(
                    format!("PW{idx}_{field}"),
                    as_int_flag(get_value(data, field)),
                );
            }
            for field in [
                "POD_available_charge_power",
                "POD_available_dischg_power",
                "POD_nom_energy_remaining",
                "POD_nom_energy_to_be_charged",
                "POD_nom_full_pack_energy",
            ] {
                pod.insert(format!("PW{idx}_{field}"), get_value(data, field));
            }
            idx += 1;
        }
    }

    pod
}
