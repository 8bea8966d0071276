//! Gateway dispatch integration tests: the axum router driven in-process
//! against a wiremock stand-in for the energy gateway.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;
use wattgate_backend::{
    ActiveBackend, AuthMode, CloudBackend, CloudConfig, LocalBackend, LocalConfig, Powerwall,
};
use wattgate_server::config::ProxyConfig;
use wattgate_server::routes::build_router;
use wattgate_server::AppState;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    app: Router,
    state: AppState,
    _dir: TempDir,
}

fn local_harness(server: &MockServer, config: ProxyConfig) -> Harness {
    let dir = TempDir::new().unwrap();
    let local_config = LocalConfig::new("gateway.local", "secret", "user@example.com")
        .with_auth_mode(AuthMode::Token)
        .with_cache_file(dir.path().join(".wattgate"))
        .with_base_url(server.uri());
    let backend = LocalBackend::new(local_config).unwrap();
    let pw = Arc::new(Powerwall::new(
        ActiveBackend::Local(backend),
        Duration::from_secs(5),
    ));
    let state = AppState::new(pw, config);
    Harness {
        app: build_router(state.clone()),
        state,
        _dir: dir,
    }
}

fn cloud_harness(config: ProxyConfig) -> Harness {
    let dir = TempDir::new().unwrap();
    let backend =
        CloudBackend::new(CloudConfig::new("user@example.com").with_auth_path(dir.path()))
            .unwrap();
    let pw = Arc::new(Powerwall::new(
        ActiveBackend::Cloud(backend),
        Duration::from_secs(5),
    ));
    let state = AppState::new(pw, config);
    Harness {
        app: build_router(state.clone()),
        state,
        _dir: dir,
    }
}

async fn get_response(app: &Router, uri: &str) -> axum::response::Response {
    app.clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn get_json(app: &Router, uri: &str) -> Value {
    serde_json::from_str(&body_string(get_response(app, uri).await).await).unwrap()
}

#[tokio::test]
async fn test_allowlisted_path_returns_backend_json_unmodified() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "din": "1232100-00-E--TG123",
            "version": "23.44.0 eb113390",
            "up_time_seconds": "1541h38m20s",
        })))
        .mount(&server)
        .await;

    let harness = local_harness(&server, ProxyConfig::default());
    let response = get_response(&harness.app, "/api/status").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
    let payload: Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(payload["din"], "1232100-00-E--TG123");
    assert_eq!(payload["version"], "23.44.0 eb113390");
}

#[tokio::test]
async fn test_aggregates_alias_shares_the_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/meters/aggregates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "site": {"instant_power": -50.0},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let harness = local_harness(&server, ProxyConfig::default());
    let first = get_json(&harness.app, "/aggregates").await;
    let second = get_json(&harness.app, "/api/meters/aggregates").await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_soe_raw_and_scaled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/system_status/soe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"percentage": 50.0})))
        .mount(&server)
        .await;

    let harness = local_harness(&server, ProxyConfig::default());

    let raw = get_json(&harness.app, "/soe").await;
    assert_eq!(raw["percentage"], json!(50.0));

    let scaled = get_json(&harness.app, "/api/system_status/soe").await;
    let displayed = scaled["percentage"].as_f64().unwrap();
    assert!((displayed - 47.368421052631575).abs() < 1e-9);
}

#[tokio::test]
async fn test_csv_renders_two_decimals() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/system_status/soe"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"percentage": 72.5})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/meters/aggregates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "site": {"instant_power": -123.456},
            "load": {"instant_power": 900.0},
            "solar": {"instant_power": 1500.5},
            "battery": {"instant_power": 0.0},
        })))
        .mount(&server)
        .await;

    let harness = local_harness(&server, ProxyConfig::default());
    let response = get_response(&harness.app, "/csv").await;
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/plain; charset=utf-8"
    );
    assert_eq!(
        body_string(response).await,
        "-123.46,900.00,1500.50,0.00,72.50\n"
    );
}

#[tokio::test]
async fn test_derived_endpoints_tolerate_empty_vitals() {
    let server = MockServer::start().await;
    // Firmware without the vitals API: endpoint is gone
    Mock::given(method("GET"))
        .and(path("/api/devices/vitals"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/solar_powerwall"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let harness = local_harness(&server, ProxyConfig::default());

    assert_eq!(get_json(&harness.app, "/vitals").await, json!({}));
    assert_eq!(get_json(&harness.app, "/strings").await, json!({}));
    assert_eq!(get_json(&harness.app, "/temps").await, json!({}));
    assert_eq!(get_json(&harness.app, "/temps/pw").await, json!({}));
    assert_eq!(get_json(&harness.app, "/alerts").await, json!([]));
    assert_eq!(get_json(&harness.app, "/alerts/pw").await, json!({}));
}

#[tokio::test]
async fn test_temps_pw_reshapes_to_indexed_keys() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices/vitals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "TETHC--A--TG1": {"THC_AmbientTemp": 20.5},
            "TETHC--B--TG2": {"THC_AmbientTemp": 21.0},
            "STSTSM--X--Y": {"other": 1},
        })))
        .mount(&server)
        .await;

    let harness = local_harness(&server, ProxyConfig::default());
    let reshaped = get_json(&harness.app, "/temps/pw").await;
    assert_eq!(reshaped, json!({"PW1_temp": 20.5, "PW2_temp": 21.0}));
}

#[tokio::test]
async fn test_freq_includes_grid_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/system_status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"battery_blocks": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/devices/vitals"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/system_status/grid_status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"grid_status": "SystemIslandedActive"})),
        )
        .mount(&server)
        .await;

    let harness = local_harness(&server, ProxyConfig::default());
    let fcv = get_json(&harness.app, "/freq").await;
    assert_eq!(fcv, json!({"grid_status": 0}));
}

#[tokio::test]
async fn test_version_packs_integer_encoding() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"version": "23.44.0 eb113390"})),
        )
        .mount(&server)
        .await;

    let harness = local_harness(&server, ProxyConfig::default());
    let version = get_json(&harness.app, "/version").await;
    assert_eq!(version, json!({"version": "23.44.0 eb113390", "vint": 234400}));
}

#[tokio::test]
async fn test_version_solar_only_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let harness = local_harness(&server, ProxyConfig::default());
    let version = get_json(&harness.app, "/version").await;
    assert_eq!(version, json!({"version": "SolarOnly", "vint": 0}));
}

#[tokio::test]
async fn test_problems_falls_back_to_empty_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/troubleshooting/problems"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let harness = local_harness(&server, ProxyConfig::default());
    assert_eq!(
        get_json(&harness.app, "/api/troubleshooting/problems").await,
        json!({"problems": []})
    );
}

#[tokio::test]
async fn test_upstream_error_renders_marker_and_counts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/operation"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let harness = local_harness(&server, ProxyConfig::default());
    let response = get_response(&harness.app, "/api/operation").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ERROR!");

    let stats = harness.state.stats.snapshot();
    assert_eq!(stats["errors"], json!(1));
    assert_eq!(stats["gets"], json!(0));
}

#[tokio::test]
async fn test_stats_count_and_clear_semantics() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"din": "x"})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/operation"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"backup_reserve_percent": 20})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/site_info/site_name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"site_name": "Home"})))
        .mount(&server)
        .await;

    let harness = local_harness(&server, ProxyConfig::default());
    let start = harness.state.stats.started_at();

    get_response(&harness.app, "/api/status").await;
    get_response(&harness.app, "/api/status").await;
    get_response(&harness.app, "/api/operation").await;

    let stats = get_json(&harness.app, "/stats").await;
    assert_eq!(stats["gets"], json!(3));
    assert_eq!(stats["uri"]["/api/status"], json!(2));
    assert_eq!(stats["uri"]["/api/operation"], json!(1));
    assert_eq!(stats["cloudmode"], json!(false));
    assert_eq!(stats["site_name"], json!("Home"));
    assert_eq!(stats["authmode"], json!("cookie"));

    let cleared = get_json(&harness.app, "/stats/clear").await;
    assert_eq!(cleared["gets"], json!(0));
    assert_eq!(cleared["errors"], json!(0));
    assert_eq!(cleared["timeout"], json!(0));
    assert!(cleared["uri"].as_object().unwrap().is_empty());
    assert_eq!(cleared["start"], json!(start));
}

#[tokio::test]
async fn test_dashboard_serves_static_assets_with_cookies() {
    let server = MockServer::start().await;
    let web_root = TempDir::new().unwrap();
    tokio::fs::write(web_root.path().join("index.html"), "<html>dash</html>")
        .await
        .unwrap();

    let mut config = ProxyConfig::default();
    config.web_root = Some(web_root.path().to_path_buf());
    config.auth_mode = AuthMode::Token;

    let harness = local_harness(&server, config);
    let response = get_response(&harness.app, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/html"
    );
    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-cache, no-store"
    );
    // Token mode issues the bogus cookie pair
    let cookies: Vec<_> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(
        cookies,
        vec![
            "AuthCookie=1234567890;path=/;",
            "UserRecord=1234567890;path=/;"
        ]
    );
    assert_eq!(body_string(response).await, "<html>dash</html>");
}

#[tokio::test]
async fn test_dashboard_browser_cache_for_styles_only() {
    let server = MockServer::start().await;
    let web_root = TempDir::new().unwrap();
    tokio::fs::write(web_root.path().join("app.css"), "body{}")
        .await
        .unwrap();
    tokio::fs::write(web_root.path().join("index.html"), "<html></html>")
        .await
        .unwrap();

    let mut config = ProxyConfig::default();
    config.web_root = Some(web_root.path().to_path_buf());
    config.browser_cache_secs = 3600;

    let harness = local_harness(&server, config);

    let css = get_response(&harness.app, "/app.css").await;
    assert_eq!(
        css.headers().get(header::CACHE_CONTROL).unwrap(),
        "max-age=3600"
    );

    let html = get_response(&harness.app, "/index.html").await;
    assert_eq!(
        html.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-cache, no-store"
    );
}

#[tokio::test]
async fn test_dashboard_reverse_proxies_device_content() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string("<html>device ui</html>"),
        )
        .mount(&server)
        .await;

    // No web root configured: "/" falls through to the device's own web
    // server with the upstream content type and body passed through.
    let harness = local_harness(&server, ProxyConfig::default());
    let response = get_response(&harness.app, "/").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/html"
    );
    assert_eq!(body_string(response).await, "<html>device ui</html>");
}

#[tokio::test]
async fn test_dashboard_proxy_failure_degrades_gracefully() {
    let server = MockServer::start().await;
    let harness = local_harness(&server, ProxyConfig::default());
    // Shut the mock device down so the proxied fetch fails outright
    drop(server);

    let response = get_response(&harness.app, "/missing.html").await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_string(response).await, "Not Found");
}

#[tokio::test]
async fn test_cloud_mode_dashboard_is_not_found() {
    let harness = cloud_harness(ProxyConfig::default());
    let response = get_response(&harness.app, "/anything.html").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Cookie mode in cloud issues the placeholder pair
    let cookies: Vec<_> = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(
        cookies,
        vec!["AuthCookie=local;path=/;", "UserRecord=local;path=/;"]
    );
}

#[tokio::test]
async fn test_cloud_mode_vitals_and_strings_serve_empty() {
    let harness = cloud_harness(ProxyConfig::default());
    assert_eq!(get_json(&harness.app, "/vitals").await, json!({}));
    assert_eq!(get_json(&harness.app, "/strings").await, json!({}));
}

#[tokio::test]
async fn test_timeout_renders_marker_and_counts_separately() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let mut local_config = LocalConfig::new("gateway.local", "secret", "user@example.com")
        .with_auth_mode(AuthMode::Token)
        .with_cache_file(dir.path().join(".wattgate"))
        .with_base_url(server.uri());
    local_config.client_config =
        wattgate_backend::client::HttpClientConfig::for_local_gateway(1, 15);
    let backend = LocalBackend::new(local_config).unwrap();
    let pw = Arc::new(Powerwall::new(
        ActiveBackend::Local(backend),
        Duration::from_secs(5),
    ));
    let state = AppState::new(pw, ProxyConfig::default());
    let app = build_router(state.clone());

    let response = get_response(&app, "/api/status").await;
    assert_eq!(body_string(response).await, "TIMEOUT!");

    let stats = state.stats.snapshot();
    assert_eq!(stats["timeout"], json!(1));
    assert_eq!(stats["errors"], json!(0));
    assert_eq!(stats["gets"], json!(0));
}

#[tokio::test]
async fn test_help_page_is_html() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/site_info/site_name"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"site_name": "Home"})))
        .mount(&server)
        .await;

    let harness = local_harness(&server, ProxyConfig::default());
    let response = get_response(&harness.app, "/help").await;
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/html"
    );
    let body = body_string(response).await;
    assert!(body.contains("WattGate"));
    assert!(body.contains("<table>"));
}
