use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::cache::CacheStore;

#[derive(Clone)]
pub struct HealthState {
    store: Arc<dyn CacheStore>,
    origin_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CacheSummary {
    pub entries: usize,
}

/// Always served with 200: a missing origin degrades the feed, not the process.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub origin: HealthCheck,
    pub cache: CacheSummary,
    pub checked_at: String,
}

impl HealthState {
    pub fn new(store: Arc<dyn CacheStore>, origin_url: Option<String>) -> Self {
        Self { store, origin_url }
    }
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    let origin = match state.origin_url.as_deref() {
        Some(url) => HealthCheck { status: "ready", detail: format!("forwarding to {url}") },
        None => HealthCheck { status: "degraded", detail: "no origin url configured".to_string() },
    };
    let ready = origin.status == "ready";

    Json(HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "islandhop-server runtime initialized".to_string(),
        },
        origin,
        cache: CacheSummary { entries: state.store.len().await },
        checked_at: Utc::now().to_rfc3339(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Bytes;
    use axum::{extract::State, http::StatusCode, Json};
    use islandhop_core::FilterMode;

    use crate::cache::{CacheEntry, CacheKey, CachePolicy, CacheStore, InMemoryCacheStore};
    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_reports_ready_with_cache_size() {
        let store = Arc::new(InMemoryCacheStore::new(CachePolicy::default()));
        store
            .store(
                CacheKey {
                    origin: "https://tours.example".to_string(),
                    path: "/".to_string(),
                    client_id: "default".to_string(),
                    filter_mode: FilterMode::All,
                    filter_value: String::new(),
                    version: String::new(),
                },
                CacheEntry { status: StatusCode::OK, body: Bytes::from_static(b"{}") },
            )
            .await;

        let state = HealthState::new(store, Some("https://script.example/exec".to_string()));
        let Json(payload) = health(State(state)).await;

        assert_eq!(payload.status, "ready");
        assert_eq!(payload.origin.status, "ready");
        assert_eq!(payload.cache.entries, 1);
    }

    #[tokio::test]
    async fn health_is_degraded_without_origin() {
        let store = Arc::new(InMemoryCacheStore::new(CachePolicy::default()));
        let Json(payload) = health(State(HealthState::new(store, None))).await;

        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.service.status, "ready");
        assert_eq!(payload.cache.entries, 0);
    }
}
