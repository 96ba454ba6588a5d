//! Edge cache in front of the spreadsheet-backed tour endpoint.
//!
//! Endpoints:
//! - `GET     /?client=&mode=&value=&debug=&nocache=&v=`: tour feed, served from cache when possible
//! - `OPTIONS /`: CORS preflight
//!
//! Upstream transport failures never surface as 5xx: the caller gets a 200
//! with an empty feed and `X-Cache: ERROR` so widgets render "no results".

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use islandhop_core::{carries_application_error, FilterMode, TourFeed};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::{CacheEntry, CacheKey, CacheLookup, CachePolicy, CacheStore};
use crate::origin::{OriginQuery, OriginResponse, TourOrigin};

const X_CACHE: &str = "x-cache";
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";
const NO_STORE: &str = "no-store";
const NETWORK_ERROR_BODY: &[u8] = br#"{"version":null,"tours":[],"error":"Network error"}"#;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
    Error,
}

impl CacheStatus {
    fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
            Self::Error => "ERROR",
        }
    }
}

#[derive(Clone)]
pub struct ProxyState {
    store: Arc<dyn CacheStore>,
    origin: Arc<dyn TourOrigin>,
    policy: CachePolicy,
    default_client: String,
    revalidating: Arc<Mutex<HashSet<CacheKey>>>,
}

#[derive(Debug, Default)]
pub struct FeedQuery {
    pub client: Option<String>,
    pub mode: Option<String>,
    pub value: Option<String>,
    pub debug: Option<String>,
    pub nocache: Option<String>,
    pub v: Option<String>,
}

pub fn router(state: ProxyState) -> Router {
    Router::new().route("/", any(handle_request)).with_state(state)
}

pub async fn handle_request(
    State(state): State<ProxyState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method == Method::OPTIONS {
        return preflight_response();
    }

    let pairs = Query::<Vec<(String, String)>>::try_from_uri(&uri)
        .map(|Query(pairs)| pairs)
        .unwrap_or_default();
    state.serve(&headers, &uri, FeedQuery::from_pairs(pairs)).await
}

impl FeedQuery {
    /// The first occurrence of a repeated parameter wins; unknown names are ignored.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut query = Self::default();
        for (name, value) in pairs {
            let slot = match name.as_str() {
                "client" => &mut query.client,
                "mode" => &mut query.mode,
                "value" => &mut query.value,
                "debug" => &mut query.debug,
                "nocache" => &mut query.nocache,
                "v" => &mut query.v,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        query
    }
}

impl ProxyState {
    pub fn new(
        store: Arc<dyn CacheStore>,
        origin: Arc<dyn TourOrigin>,
        policy: CachePolicy,
        default_client: impl Into<String>,
    ) -> Self {
        Self {
            store,
            origin,
            policy,
            default_client: default_client.into(),
            revalidating: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn cache_key(&self, headers: &HeaderMap, uri: &Uri, query: &FeedQuery) -> CacheKey {
        let origin = headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .or_else(|| uri.authority().map(|authority| authority.to_string()))
            .unwrap_or_default();

        CacheKey {
            origin,
            path: uri.path().to_string(),
            client_id: non_blank(query.client.as_deref())
                .unwrap_or(self.default_client.as_str())
                .to_string(),
            filter_mode: FilterMode::parse(query.mode.as_deref()),
            filter_value: query.value.clone().unwrap_or_default(),
            version: query.v.clone().unwrap_or_default(),
        }
    }

    async fn serve(&self, headers: &HeaderMap, uri: &Uri, query: FeedQuery) -> Response {
        let correlation_id = Uuid::new_v4().to_string();
        let debug = flag(query.debug.as_deref());
        let nocache = flag(query.nocache.as_deref());
        let skip_cache = debug || nocache;
        let key = self.cache_key(headers, uri, &query);
        let origin_query = OriginQuery {
            client: key.client_id.clone(),
            mode: key.filter_mode.clone(),
            value: key.filter_value.clone(),
            debug,
            nocache,
        };

        if !skip_cache {
            match self.store.lookup(&key).await {
                CacheLookup::Fresh(entry) => {
                    info!(
                        event_name = "proxy.cache.hit",
                        correlation_id = %correlation_id,
                        client = %key.client_id,
                        mode = %key.filter_mode,
                        "served tour feed from cache"
                    );
                    return self.cached_response(entry);
                }
                CacheLookup::Stale(entry) => {
                    info!(
                        event_name = "proxy.cache.stale",
                        correlation_id = %correlation_id,
                        client = %key.client_id,
                        mode = %key.filter_mode,
                        "served stale tour feed, revalidating in background"
                    );
                    self.spawn_revalidation(key, origin_query);
                    return self.cached_response(entry);
                }
                CacheLookup::Miss => {}
            }
        }

        let response = match self.origin.fetch(&origin_query).await {
            Ok(response) => response,
            Err(error) => {
                warn!(
                    event_name = "proxy.origin.network_error",
                    correlation_id = %correlation_id,
                    client = %key.client_id,
                    error = %error,
                    "origin fetch failed, serving empty feed"
                );
                return network_error_response();
            }
        };

        let cacheable = !skip_cache && is_cacheable(&response);
        info!(
            event_name = "proxy.cache.miss",
            correlation_id = %correlation_id,
            client = %key.client_id,
            mode = %key.filter_mode,
            origin_status = response.status.as_u16(),
            skip_cache,
            cacheable,
            "fetched tour feed from origin"
        );

        let cache_control = if cacheable { self.policy.header_value() } else { NO_STORE.to_string() };
        let OriginResponse { status, body } = response;
        if cacheable {
            self.spawn_store(key, CacheEntry { status, body: body.clone() });
        }

        feed_response(status, body, &cache_control, CacheStatus::Miss)
    }

    fn cached_response(&self, entry: CacheEntry) -> Response {
        feed_response(entry.status, entry.body, &self.policy.header_value(), CacheStatus::Hit)
    }

    fn spawn_store(&self, key: CacheKey, entry: CacheEntry) {
        let store = Arc::clone(&self.store);
        tokio::spawn(async move {
            store.store(key, entry).await;
        });
    }

    fn spawn_revalidation(&self, key: CacheKey, query: OriginQuery) {
        {
            let Ok(mut in_flight) = self.revalidating.lock() else {
                return;
            };
            if !in_flight.insert(key.clone()) {
                return;
            }
        }

        let state = self.clone();
        tokio::spawn(async move {
            match state.origin.fetch(&query).await {
                Ok(response) if is_cacheable(&response) => {
                    let OriginResponse { status, body } = response;
                    state.store.store(key.clone(), CacheEntry { status, body }).await;
                    debug!(
                        event_name = "proxy.cache.revalidated",
                        client = %key.client_id,
                        "stale tour feed refreshed"
                    );
                }
                Ok(response) => {
                    debug!(
                        event_name = "proxy.cache.revalidation_skipped",
                        client = %key.client_id,
                        origin_status = response.status.as_u16(),
                        "origin response not cacheable, keeping stale entry"
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = "proxy.cache.revalidation_failed",
                        client = %key.client_id,
                        error = %error,
                        "background revalidation failed"
                    );
                }
            }

            if let Ok(mut in_flight) = state.revalidating.lock() {
                in_flight.remove(&key);
            }
        });
    }
}

/// Success status and no application-level `error` member; unparseable bodies still qualify.
fn is_cacheable(response: &OriginResponse) -> bool {
    if !response.status.is_success() {
        return false;
    }

    !serde_json::from_slice::<Value>(&response.body)
        .ok()
        .as_ref()
        .is_some_and(carries_application_error)
}

fn flag(value: Option<&str>) -> bool {
    matches!(value.map(str::trim), Some("1") | Some("true"))
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn cors_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers
}

fn feed_response(
    status: StatusCode,
    body: Bytes,
    cache_control: &str,
    cache_status: CacheStatus,
) -> Response {
    let mut headers = cors_headers();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_str(cache_control).unwrap_or(HeaderValue::from_static(NO_STORE)),
    );
    headers.insert(X_CACHE, HeaderValue::from_static(cache_status.as_str()));

    (status, headers, body).into_response()
}

fn network_error_response() -> Response {
    let body = serde_json::to_vec(&TourFeed::network_error())
        .map(Bytes::from)
        .unwrap_or(Bytes::from_static(NETWORK_ERROR_BODY));

    feed_response(StatusCode::OK, body, NO_STORE, CacheStatus::Error)
}

fn preflight_response() -> Response {
    let mut headers = cors_headers();
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET, OPTIONS"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static("Content-Type"));
    headers.insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));

    (StatusCode::NO_CONTENT, headers).into_response()
}
