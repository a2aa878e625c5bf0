//! Home timeline page cache middleware.
//!
//! Replays rendered `GET` responses for the configured TTL. Responses that
//! set cookies or are not `200 OK` always pass through untouched.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::{BodyExt, Limited};
use metrics::counter;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{
    PageCacheConfig,
    keys::PageKey,
    store::{CachedResponse, PageCache},
};

/// Largest body the cache will buffer.
const MAX_CACHED_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared cache state for middleware.
#[derive(Clone)]
pub struct PageCacheState {
    pub config: PageCacheConfig,
    pub store: Arc<PageCache>,
    /// Cookie whose value distinguishes one viewer's rendering from another's.
    pub viewer_cookie: &'static str,
}

impl PageCacheState {
    pub fn new(config: PageCacheConfig, viewer_cookie: &'static str) -> Self {
        let store = Arc::new(PageCache::new(&config));
        Self {
            config,
            store,
            viewer_cookie,
        }
    }
}

#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn page_cache_layer(
    State(cache): State<PageCacheState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.config.enabled || request.method() != Method::GET {
        return next.run(request).await;
    }

    let session = viewer_session(&request, cache.viewer_cookie).map(|id| id.to_string());
    let key = PageKey::new(
        request.uri().path(),
        request.uri().query().unwrap_or(""),
        session.as_deref(),
    );

    if let Some(cached) = cache.store.get(&key) {
        counter!("blogroll_page_cache_hit_total").increment(1);
        debug!(cache = "page", outcome = "hit", "serving cached response");
        return build_response(cached);
    }

    counter!("blogroll_page_cache_miss_total").increment(1);
    debug!(cache = "page", outcome = "miss", "cache miss, executing handler");

    let response = next.run(request).await;
    if response.status() != StatusCode::OK || response.headers().contains_key(header::SET_COOKIE)
    {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match Limited::new(body, MAX_CACHED_BODY_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            warn!(cache = "page", error = %err, "failed to buffer response body");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect(),
        body: bytes.clone(),
    };

    counter!("blogroll_page_cache_store_total").increment(1);
    if let Some(evicted) = cache.store.set(key, cached) {
        counter!("blogroll_page_cache_evict_total").increment(1);
        debug!(cache = "page", evicted = %evicted.path(), "evicted least recent page");
    }

    Response::from_parts(parts, Body::from(bytes))
}

/// Session id from the viewer cookie. Values that are not a UUID cannot name
/// a session, so they share the anonymous rendering.
fn viewer_session(request: &Request<Body>, cookie_name: &str) -> Option<Uuid> {
    request
        .headers()
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(cookie::Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == cookie_name)
        .and_then(|cookie| Uuid::parse_str(cookie.value()).ok())
}

/// Build a response from cached data.
fn build_response(cached: CachedResponse) -> Response {
    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
