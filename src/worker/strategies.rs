//! The three caching strategies.
//!
//! None of them fails: when neither cache nor network can answer, the
//! caller gets a synthetic 503.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::worker::{
    CacheStorage, FetchRequest, Network, StoredResponse, NETWORK_ERROR_BODY, OFFLINE_CONTENT_BODY,
};

// == Cache First ==
/// Serves from cache without touching the network; fetches and stores on
/// a miss.
pub async fn cache_first(
    caches: &CacheStorage,
    network: &dyn Network,
    cache_name: &str,
    request: &FetchRequest,
) -> StoredResponse {
    if let Some(cached) = caches.match_any(request.cache_key()).await {
        debug!(url = %request.url, "cache-first hit");
        return cached;
    }

    match network.fetch(request).await {
        Ok(response) => {
            if response.is_cacheable() {
                caches
                    .put(cache_name, request.cache_key(), response.clone())
                    .await;
            }
            response
        }
        Err(e) => {
            warn!(url = %request.url, "cache-first miss while offline: {}", e);
            StoredResponse::offline(OFFLINE_CONTENT_BODY)
        }
    }
}

// == Stale While Revalidate ==
/// Serves the cached copy immediately and refreshes it in the background.
/// Without a cached copy the caller waits for the network.
pub async fn stale_while_revalidate(
    caches: &CacheStorage,
    network: &Arc<dyn Network>,
    cache_name: &str,
    request: &FetchRequest,
) -> StoredResponse {
    let cached = caches.match_any(request.cache_key()).await;
    let refresh = revalidate(
        caches.clone(),
        Arc::clone(network),
        cache_name.to_string(),
        request.clone(),
    );

    match cached {
        Some(cached) => {
            debug!(url = %request.url, "serving stale copy, revalidating");
            tokio::spawn(refresh);
            cached
        }
        None => refresh
            .await
            .unwrap_or_else(|| StoredResponse::offline(NETWORK_ERROR_BODY)),
    }
}

async fn revalidate(
    caches: CacheStorage,
    network: Arc<dyn Network>,
    cache_name: String,
    request: FetchRequest,
) -> Option<StoredResponse> {
    match network.fetch(&request).await {
        Ok(response) => {
            if response.is_cacheable() {
                caches
                    .put(&cache_name, request.cache_key(), response.clone())
                    .await;
            }
            Some(response)
        }
        Err(e) => {
            debug!(url = %request.url, "revalidation failed: {}", e);
            None
        }
    }
}

// == Network First ==
/// Prefers a fresh response, writing 200s through to the cache; falls back
/// to the cache only when the network fails.
pub async fn network_first(
    caches: &CacheStorage,
    network: &dyn Network,
    cache_name: &str,
    request: &FetchRequest,
) -> StoredResponse {
    match network.fetch(request).await {
        Ok(response) => {
            if response.is_cacheable() {
                caches
                    .put(cache_name, request.cache_key(), response.clone())
                    .await;
            }
            response
        }
        Err(e) => {
            warn!(url = %request.url, "network-first falling back to cache: {}", e);
            caches
                .match_any(request.cache_key())
                .await
                .unwrap_or_else(|| StoredResponse::offline(NETWORK_ERROR_BODY))
        }
    }
}
