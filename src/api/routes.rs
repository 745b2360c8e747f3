//! API Routes
//!
//! Configures the Axum router with the management endpoints and the
//! caching proxy fallback.

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cleanup_handler, clear_handler, delete_handler, enqueue_form_handler, exists_handler,
    get_handler, health_handler, invalidate_handler, message_handler, preload_handler,
    proxy_handler, set_handler, stats_handler, sync_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /cache` - Store a value with optional TTL and tags
/// - `DELETE /cache` - Clear the smart cache
/// - `GET /cache/:key` - Retrieve a value by key
/// - `DELETE /cache/:key` - Delete a key
/// - `GET /cache/:key/exists` - Check validity without touching stats
/// - `POST /cache/invalidate` - Drop every key under a tag
/// - `POST /cache/cleanup` - Drop every invalid entry
/// - `POST /cache/preload` - Load origin paths into the cache
/// - `GET /stats` - Smart cache statistics
/// - `GET /health` - Health check endpoint
/// - `POST /forms` - Queue a contact form
/// - `POST /sync/:tag` - Run a background sync
/// - `POST /worker/message` - Post a message to the worker
/// - `GET /debug/caches` - Cache contents (`debug-inspect` builds only)
///
/// Keys containing `/` must be percent-encoded in the path.
/// Everything else is served by the worker.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/cache", put(set_handler).delete(clear_handler))
        .route("/cache/invalidate", post(invalidate_handler))
        .route("/cache/cleanup", post(cleanup_handler))
        .route("/cache/preload", post(preload_handler))
        .route("/cache/:key", get(get_handler).delete(delete_handler))
        .route("/cache/:key/exists", get(exists_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .route("/forms", post(enqueue_form_handler))
        .route("/sync/:tag", post(sync_handler))
        .route("/worker/message", post(message_handler));

    #[cfg(feature = "debug-inspect")]
    let router = router.route("/debug/caches", get(super::handlers::debug_caches_handler));

    router
        .fallback(proxy_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
