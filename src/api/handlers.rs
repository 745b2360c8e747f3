//! API Handlers
//!
//! HTTP request handlers for the smart-cache management endpoints, the
//! worker event endpoints and the caching proxy fallback.

use std::sync::Arc;
use tokio::sync::RwLock;

use axum::{
    body::to_bytes,
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use tracing::info;
use url::Url;

use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{
    CleanupResponse, ClearResponse, DeleteResponse, EnqueueResponse, ExistsResponse,
    GetResponse, HealthResponse, InvalidateRequest, InvalidateResponse, PreloadRequest,
    PreloadResponse, SetRequest, SetResponse, StatsResponse,
};
use crate::smart::{preload, FileStorage, SmartCache, MAX_VALUE_SIZE};
use crate::worker::{
    CacheStorage, FetchRequest, FileFormQueue, HttpNetwork, MessageReply, ServiceWorker,
    SyncReport, WorkerMessage,
};

/// Application state shared across all handlers.
///
/// The smart cache and the worker are independent: neither reads the
/// other's storage.
#[derive(Clone)]
pub struct AppState {
    /// Thread-safe smart cache
    pub cache: Arc<RwLock<SmartCache>>,
    /// Caching router in front of the origin
    pub worker: Arc<ServiceWorker>,
}

impl AppState {
    pub fn new(cache: SmartCache, worker: ServiceWorker) -> Self {
        Self {
            cache: Arc::new(RwLock::new(cache)),
            worker: Arc::new(worker),
        }
    }

    /// Builds the file-backed smart cache, the HTTP network client, the
    /// durable form queue and the worker from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let storage = FileStorage::open(&config.storage_dir, Some(config.storage_quota_bytes))?;
        let cache = SmartCache::new(config.smart_cache(), Arc::new(storage));

        let worker_config = config.worker();
        let origin = Url::parse(&config.origin_url).map_err(|e| {
            CacheError::InvalidRequest(format!("bad origin URL '{}': {}", config.origin_url, e))
        })?;
        let network = HttpNetwork::new(worker_config.fetch_timeout)?;
        let forms = FileFormQueue::new(config.storage_dir.join("forms.json"));
        let worker = ServiceWorker::new(
            worker_config,
            origin,
            CacheStorage::new(),
            Arc::new(network),
            Arc::new(forms),
        )?;

        Ok(Self::new(cache, worker))
    }
}

// == Smart Cache Handlers ==

/// Handler for PUT /cache
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<SetRequest>,
) -> Result<Json<SetResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let tags: Vec<&str> = req.tags.iter().map(String::as_str).collect();
    let mut cache = state.cache.write().await;
    cache.set_tagged(&req.key, &req.value, req.ttl, &tags)?;

    Ok(Json(SetResponse::new(req.key)))
}

/// Handler for GET /cache/:key
///
/// Expired and outdated entries answer 404 like missing ones.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    // Write lock: a read updates stats and may drop an invalid entry
    let mut cache = state.cache.write().await;
    match cache.get_raw(&key)? {
        Some(value) => Ok(Json(GetResponse::new(key, value))),
        None => Err(CacheError::NotFound(key)),
    }
}

/// Handler for GET /cache/:key/exists
pub async fn exists_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Json<ExistsResponse> {
    let exists = state.cache.read().await.has(&key);
    Json(ExistsResponse { key, exists })
}

/// Handler for DELETE /cache/:key
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let mut cache = state.cache.write().await;
    if !cache.delete(&key)? {
        return Err(CacheError::NotFound(key));
    }

    Ok(Json(DeleteResponse::new(key)))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    state.cache.write().await.clear()?;
    Ok(Json(ClearResponse::new()))
}

/// Handler for POST /cache/invalidate
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if req.tag.is_empty() {
        return Err(CacheError::InvalidRequest("Tag cannot be empty".to_string()));
    }

    let removed = state.cache.write().await.invalidate_by_tag(&req.tag)?;
    info!(tag = %req.tag, removed, "invalidated by tag");
    Ok(Json(InvalidateResponse {
        tag: req.tag,
        removed,
    }))
}

/// Handler for POST /cache/cleanup
pub async fn cleanup_handler(State(state): State<AppState>) -> Result<Json<CleanupResponse>> {
    let removed = state.cache.write().await.cleanup()?;
    Ok(Json(CleanupResponse { removed }))
}

/// Handler for POST /cache/preload
///
/// Fetches each uncached path from the origin and stores the JSON body
/// under the path. Individual failures are reported, never raised.
pub async fn preload_handler(
    State(state): State<AppState>,
    Json(req): Json<PreloadRequest>,
) -> Json<PreloadResponse> {
    let worker = state.worker.as_ref();
    let results = preload(&state.cache, &req.paths, req.ttl, move |path| async move {
        worker.fetch_json(&path).await
    })
    .await;

    Json(PreloadResponse { results })
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let cache = state.cache.read().await;
    Json(StatsResponse::from(cache.stats()))
}

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let worker = state.worker.state().await;
    Json(HealthResponse::healthy(worker.to_string()))
}

// == Worker Handlers ==

/// Handler for POST /forms
///
/// Queues a contact form for the next background sync.
pub async fn enqueue_form_handler(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<EnqueueResponse>)> {
    let form = state.worker.forms().enqueue(payload).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            id: form.id,
            queued_at: form.queued_at,
        }),
    ))
}

/// Handler for POST /sync/:tag
pub async fn sync_handler(
    State(state): State<AppState>,
    Path(tag): Path<String>,
) -> Result<Json<SyncReport>> {
    Ok(Json(state.worker.handle_sync(&tag).await?))
}

/// Handler for POST /worker/message
pub async fn message_handler(
    State(state): State<AppState>,
    Json(message): Json<WorkerMessage>,
) -> Result<Json<MessageReply>> {
    Ok(Json(state.worker.handle_message(message).await?))
}

/// Fallback handler: every other request goes through the worker.
///
/// Both absolute-form and origin-form targets are resolved by the worker,
/// which refuses anything off the origin and its allowed hosts.
pub async fn proxy_handler(State(state): State<AppState>, request: Request) -> Result<Response> {
    let (parts, body) = request.into_parts();

    let target = if parts.uri.scheme().is_some() {
        parts.uri.to_string()
    } else {
        parts
            .uri
            .path_and_query()
            .map_or("/", |pq| pq.as_str())
            .to_string()
    };
    let url = state.worker.resolve(&target)?;

    let body = to_bytes(body, MAX_VALUE_SIZE)
        .await
        .map_err(|e| CacheError::InvalidRequest(format!("unreadable body: {}", e)))?;

    let fetch = FetchRequest {
        method: parts.method,
        url,
        headers: parts.headers,
        body,
    };
    let response = state.worker.handle_fetch(&fetch).await?;
    Ok(response.into_response())
}

/// Handler for GET /debug/caches
#[cfg(feature = "debug-inspect")]
pub async fn debug_caches_handler(State(state): State<AppState>) -> Json<Value> {
    let (keys, stats) = {
        let cache = state.cache.read().await;
        (cache.keys(), StatsResponse::from(cache.stats()))
    };
    let worker = state.worker.snapshot().await;

    Json(serde_json::json!({
        "smart_cache": { "keys": keys, "stats": stats },
        "worker": worker,
    }))
}
