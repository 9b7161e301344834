use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{OriginalUri, Request, State},
    http::{header, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::models::ApiError;

/// Largest body buffered for caching
const MAX_CACHED_BODY: usize = 16 * 1024 * 1024;

pub const CACHE_STATUS_HEADER: &str = "x-cache";

/// Cached URLs touched by product, category or subcategory writes
pub const CATALOG_CACHE_PATTERNS: &[&str] = &["/product", "/category", "/subcategory"];

#[derive(Debug, Clone)]
struct CacheEntry {
    status: StatusCode,
    content_type: Option<HeaderValue>,
    body: Bytes,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    fn to_response(&self) -> Response {
        let mut response = Response::new(Body::from(self.body.clone()));
        *response.status_mut() = self.status;
        if let Some(content_type) = &self.content_type {
            response
                .headers_mut()
                .insert(header::CONTENT_TYPE, content_type.clone());
        }
        response
            .headers_mut()
            .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("HIT"));
        response
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
}

/// Process-wide HTTP response cache keyed by `METHOD:URL`
#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
    enabled: bool,
}

impl ResponseCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            enabled,
        }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn key(method: &Method, url: &str) -> String {
        format!("{}:{}", method, url)
    }

    async fn get(&self, key: &str) -> Option<CacheEntry> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_expired(now) => return Some(entry.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        self.entries.write().await.remove(key);
        None
    }

    async fn insert(&self, key: String, entry: CacheEntry) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| !e.is_expired(now));
        entries.insert(key, entry);
    }

    /// Drop every entry
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Drop entries whose key contains any of `patterns`; returns how many were removed
    pub async fn clear_matching(&self, patterns: &[&str]) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !patterns.iter().any(|p| key.contains(p)));
        let removed = before - entries.len();

        if removed > 0 {
            debug!(removed, ?patterns, "Cache entries invalidated");
        }
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries.keys().cloned().collect();
        keys.sort();
        CacheStats {
            size: entries.len(),
            keys,
        }
    }
}

/// Cache handle plus the TTL for one route
#[derive(Clone)]
pub struct CachePolicy {
    cache: ResponseCache,
    ttl: Duration,
}

impl CachePolicy {
    pub fn new(cache: &ResponseCache, ttl: Duration) -> Self {
        Self {
            cache: cache.clone(),
            ttl,
        }
    }
}

/// Clear cached catalog responses after a write reaches its handler.
///
/// Failed writes clear too; only requests turned away by authentication leave
/// the cache alone.
pub async fn invalidate_catalog(
    State(cache): State<ResponseCache>,
    request: Request,
    next: Next,
) -> Response {
    let is_write = !matches!(*request.method(), Method::GET | Method::HEAD | Method::OPTIONS);
    let response = next.run(request).await;

    let rejected = matches!(
        response.status(),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
    );
    if is_write && !rejected {
        cache.clear_matching(CATALOG_CACHE_PATTERNS).await;
    }

    response
}

/// Serve `GET` requests from the cache, storing successful responses for the policy TTL
pub async fn cache_response(
    State(policy): State<CachePolicy>,
    request: Request,
    next: Next,
) -> Response {
    if !policy.cache.enabled() || request.method() != Method::GET {
        return next.run(request).await;
    }

    // Nested routers see a stripped URI, so key on the original one
    let url = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.0.to_string())
        .unwrap_or_else(|| request.uri().to_string());
    let key = ResponseCache::key(request.method(), &url);

    if let Some(entry) = policy.cache.get(&key).await {
        debug!(key = %key, "Cache hit");
        return entry.to_response();
    }

    let response = next.run(request).await;
    if !response.status().is_success() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, MAX_CACHED_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to buffer response for caching");
            return ApiError::internal("Failed to read response body").into_response();
        }
    };

    policy
        .cache
        .insert(
            key,
            CacheEntry {
                status: parts.status,
                content_type: parts.headers.get(header::CONTENT_TYPE).cloned(),
                body: bytes.clone(),
                expires_at: Instant::now() + policy.ttl,
            },
        )
        .await;

    parts
        .headers
        .insert(CACHE_STATUS_HEADER, HeaderValue::from_static("MISS"));
    Response::from_parts(parts, Body::from(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(ttl: Duration) -> CacheEntry {
        CacheEntry {
            status: StatusCode::OK,
            content_type: Some(HeaderValue::from_static("application/json")),
            body: Bytes::from_static(b"{}"),
            expires_at: Instant::now() + ttl,
        }
    }

    #[tokio::test]
    async fn test_get_returns_fresh_entries() {
        let cache = ResponseCache::new(true);
        cache.insert("GET:/a".into(), entry(Duration::from_secs(60))).await;

        let hit = cache.get("GET:/a").await.unwrap();
        assert_eq!(hit.body, Bytes::from_static(b"{}"));
        assert!(cache.get("GET:/missing").await.is_none());
    }

    #[tokio::test]
    async fn test_expired_entries_are_dropped() {
        let cache = ResponseCache::new(true);
        cache.insert("GET:/a".into(), entry(Duration::ZERO)).await;

        assert!(cache.get("GET:/a").await.is_none());
        assert_eq!(cache.stats().await.size, 0);
    }

    #[tokio::test]
    async fn test_clear_matching() {
        let cache = ResponseCache::new(true);
        for key in [
            "GET:/api/v1/product/all",
            "GET:/api/v1/product/search?q=x",
            "GET:/api/v1/banner/",
        ] {
            cache.insert(key.into(), entry(Duration::from_secs(60))).await;
        }

        assert_eq!(cache.clear_matching(&["/product"]).await, 2);
        assert_eq!(
            cache.stats().await,
            CacheStats {
                size: 1,
                keys: vec!["GET:/api/v1/banner/".to_string()],
            }
        );

        cache.clear().await;
        assert_eq!(cache.stats().await.size, 0);
    }

    #[test]
    fn test_disabled_cache() {
        let cache = ResponseCache::new(false);
        assert!(!cache.enabled());
        assert_eq!(tokio_test::block_on(cache.clear_matching(&["/product"])), 0);
    }

    #[test]
    fn test_cached_response_is_marked() {
        let response = entry(Duration::from_secs(1)).to_response();
        assert_eq!(response.headers()[CACHE_STATUS_HEADER], "HIT");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }
}
