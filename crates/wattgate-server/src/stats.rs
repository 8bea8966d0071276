//! Serving statistics
//!
//! Process-wide counters shared by every request handler. Each request
//! increments exactly one of gets/errors/timeouts; per-path hit counts are
//! kept for API routes only (dashboard traffic is counted anonymously, the
//! way the URI table stays readable).

use chrono::Utc;
use serde_json::{Map, Value, json};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Default)]
struct StatsInner {
    gets: u64,
    errors: u64,
    timeouts: u64,
    uri: HashMap<String, u64>,
    cleared_at: i64,
}

/// Thread-safe serving statistics tracker.
#[derive(Debug)]
pub struct ProxyStats {
    started_at: i64,
    inner: RwLock<StatsInner>,
}

impl Default for ProxyStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ProxyStats {
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        Self {
            started_at: now,
            inner: RwLock::new(StatsInner {
                cleared_at: now,
                ..StatsInner::default()
            }),
        }
    }

    /// Successful API response: bump gets and the per-path counter.
    pub fn record_get(&self, path: &str) {
        let mut inner = self.inner.write().expect("stats lock poisoned");
        inner.gets += 1;
        *inner.uri.entry(path.to_string()).or_insert(0) += 1;
    }

    /// Successful non-API response (dashboard/static/proxied content).
    pub fn record_get_anonymous(&self) {
        self.inner.write().expect("stats lock poisoned").gets += 1;
    }

    pub fn record_error(&self) {
        self.inner.write().expect("stats lock poisoned").errors += 1;
    }

    pub fn record_timeout(&self) {
        self.inner.write().expect("stats lock poisoned").timeouts += 1;
    }

    /// Reset counters and the per-path table. The start timestamp is the
    /// process start and survives a clear; only `clear` is restamped.
    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("stats lock poisoned");
        inner.gets = 0;
        inner.errors = 0;
        inner.timeouts = 0;
        inner.uri.clear();
        inner.cleared_at = Utc::now().timestamp();
    }

    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    pub fn gets(&self) -> u64 {
        self.inner.read().expect("stats lock poisoned").gets
    }

    pub fn uri_hits(&self, path: &str) -> u64 {
        self.inner
            .read()
            .expect("stats lock poisoned")
            .uri
            .get(path)
            .copied()
            .unwrap_or(0)
    }

    /// Counter snapshot as the base of the /stats document.
    pub fn snapshot(&self) -> Map<String, Value> {
        let inner = self.inner.read().expect("stats lock poisoned");
        let now = Utc::now().timestamp();
        let mut snapshot = Map::new();
        snapshot.insert("gets".to_string(), json!(inner.gets));
        snapshot.insert("errors".to_string(), json!(inner.errors));
        snapshot.insert("timeout".to_string(), json!(inner.timeouts));
        snapshot.insert("uri".to_string(), json!(inner.uri));
        snapshot.insert("ts".to_string(), json!(now));
        snapshot.insert("start".to_string(), json!(self.started_at));
        snapshot.insert("clear".to_string(), json!(inner.cleared_at));
        snapshot.insert(
            "uptime".to_string(),
            json!(format_uptime(now - self.started_at)),
        );
        snapshot
    }
}

/// Render an uptime delta as `H:MM:SS` (days folded into hours would drift
/// from the familiar format, so they get their own prefix).
pub fn format_uptime(seconds: i64) -> String {
    let seconds = seconds.max(0);
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;
    if days > 0 {
        format!("{days} days, {hours}:{minutes:02}:{secs:02}")
    } else {
        format!("{hours}:{minutes:02}:{secs:02}")
    }
}
