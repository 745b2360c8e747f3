//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint against an
//! in-memory smart cache and a scripted origin.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::Value;
use storefront_cache::{
    api::create_router,
    smart::{MemoryStorage, SmartCache, SmartCacheConfig},
    worker::{
        CacheStorage, FetchRequest, MemoryFormQueue, Network, ServiceWorker, StoredResponse,
        WorkerConfig,
    },
    AppState, CacheError,
};
use tower::ServiceExt;
use url::Url;

// == Helper Functions ==

/// Origin double: answers from a URL table, 404 otherwise.
#[derive(Default)]
struct ScriptedOrigin {
    pages: Mutex<HashMap<String, &'static str>>,
    offline: Mutex<bool>,
}

impl ScriptedOrigin {
    fn serve(&self, url: &str, body: &'static str) {
        self.pages.lock().unwrap().insert(url.to_string(), body);
    }

    fn go_offline(&self) {
        *self.offline.lock().unwrap() = true;
    }
}

#[async_trait]
impl Network for ScriptedOrigin {
    async fn fetch(&self, request: &FetchRequest) -> storefront_cache::Result<StoredResponse> {
        if *self.offline.lock().unwrap() {
            return Err(CacheError::Network("offline".to_string()));
        }
        let page = self.pages.lock().unwrap().get(request.url.as_str()).copied();
        Ok(match page {
            Some(body) => StoredResponse::new(StatusCode::OK, HeaderMap::new(), body),
            None => StoredResponse::new(StatusCode::NOT_FOUND, HeaderMap::new(), "missing"),
        })
    }
}

fn create_test_app_with(origin: Arc<ScriptedOrigin>) -> (Router, AppState) {
    let cache = SmartCache::new(SmartCacheConfig::default(), Arc::new(MemoryStorage::new()));
    let worker = ServiceWorker::new(
        WorkerConfig::default(),
        Url::parse("http://shop.test").unwrap(),
        CacheStorage::new(),
        origin,
        Arc::new(MemoryFormQueue::new()),
    )
    .unwrap();
    let state = AppState::new(cache, worker);
    (create_router(state.clone()), state)
}

fn create_test_app() -> Router {
    create_test_app_with(Arc::new(ScriptedOrigin::default())).0
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// == SET Endpoint Tests ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let app = create_test_app();

    let response = app
        .oneshot(json_request(
            "PUT",
            "/cache",
            r#"{"key":"products","value":[{"id":1,"name":"Serum"}]}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("products"));
}

#[tokio::test]
async fn test_set_endpoint_rejects_zero_ttl() {
    let app = create_test_app();

    let response = app
        .oneshot(json_request("PUT", "/cache", r#"{"key":"k","value":1,"ttl":0}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// == GET Endpoint Tests ==

#[tokio::test]
async fn test_get_endpoint_returns_structured_value() {
    let app = create_test_app();

    app.clone()
        .oneshot(json_request(
            "PUT",
            "/cache",
            r#"{"key":"hero","value":{"title":"Glow","price":29.5}}"#,
        ))
        .await
        .unwrap();

    let response = app.oneshot(empty_request("GET", "/cache/hero")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["key"], "hero");
    assert_eq!(json["value"]["price"], 29.5);
}

#[tokio::test]
async fn test_get_endpoint_percent_encoded_key() {
    let app = create_test_app();

    app.clone()
        .oneshot(json_request(
            "PUT",
            "/cache",
            r#"{"key":"api:/v1/products","value":[1,2,3]}"#,
        ))
        .await
        .unwrap();

    let response = app
        .oneshot(empty_request("GET", "/cache/api%3A%2Fv1%2Fproducts"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["value"], serde_json::json!([1, 2, 3]));
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let app = create_test_app();

    let response = app
        .oneshot(empty_request("GET", "/cache/nonexistent"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("nonexistent"));
}

#[tokio::test]
async fn test_exists_endpoint_does_not_count_requests() {
    let (app, state) = create_test_app_with(Arc::new(ScriptedOrigin::default()));

    app.clone()
        .oneshot(json_request("PUT", "/cache", r#"{"key":"faq","value":"x"}"#))
        .await
        .unwrap();

    let response = app
        .oneshot(empty_request("GET", "/cache/faq/exists"))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;

    assert_eq!(json["exists"], true);
    assert_eq!(state.cache.read().await.stats().total_requests, 0);
}

// == DELETE Endpoint Tests ==

#[tokio::test]
async fn test_delete_endpoint_success() {
    let app = create_test_app();

    app.clone()
        .oneshot(json_request("PUT", "/cache", r#"{"key":"to_delete","value":1}"#))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(empty_request("DELETE", "/cache/to_delete"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(empty_request("GET", "/cache/to_delete"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_endpoint_not_found() {
    let app = create_test_app();

    let response = app
        .oneshot(empty_request("DELETE", "/cache/nonexistent"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clear_endpoint() {
    let (app, state) = create_test_app_with(Arc::new(ScriptedOrigin::default()));

    for key in ["a", "b", "c"] {
        let body = format!(r#"{{"key":"{}","value":null}}"#, key);
        app.clone()
            .oneshot(json_request("PUT", "/cache", &body))
            .await
            .unwrap();
    }

    let response = app.oneshot(empty_request("DELETE", "/cache")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(state.cache.read().await.is_empty());
}

// == Invalidate and Cleanup Tests ==

#[tokio::test]
async fn test_invalidate_endpoint_uses_explicit_and_segment_tags() {
    let (app, state) = create_test_app_with(Arc::new(ScriptedOrigin::default()));

    for body in [
        r#"{"key":"products:serum","value":1}"#,
        r#"{"key":"products:cream","value":2}"#,
        r#"{"key":"hero","value":3,"tags":["products"]}"#,
        r#"{"key":"prod","value":4}"#,
    ] {
        app.clone()
            .oneshot(json_request("PUT", "/cache", body))
            .await
            .unwrap();
    }

    let response = app
        .oneshot(json_request("POST", "/cache/invalidate", r#"{"tag":"products"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 3);
    assert_eq!(state.cache.read().await.keys(), vec!["prod".to_string()]);
}

#[tokio::test]
async fn test_cleanup_endpoint_after_version_bump() {
    let (app, state) = create_test_app_with(Arc::new(ScriptedOrigin::default()));

    app.clone()
        .oneshot(json_request("PUT", "/cache", r#"{"key":"old","value":1}"#))
        .await
        .unwrap();
    state.cache.write().await.set_version("2.0.0");

    let response = app
        .oneshot(empty_request("POST", "/cache/cleanup"))
        .await
        .unwrap();

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["removed"], 1);
}

// == Preload Tests ==

#[tokio::test]
async fn test_preload_endpoint() {
    let origin = Arc::new(ScriptedOrigin::default());
    origin.serve("http://shop.test/api/reviews", r#"[{"stars":5}]"#);
    let (app, state) = create_test_app_with(origin);

    let response = app
        .oneshot(json_request(
            "POST",
            "/cache/preload",
            r#"{"paths":["/api/reviews","/api/missing"],"ttl":60000}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["results"][0]["key"], "/api/reviews");
    assert_eq!(json["results"][0]["status"], "loaded");
    assert_eq!(json["results"][1]["status"], "failed");

    let mut cache = state.cache.write().await;
    let reviews: Option<Value> = cache.get("/api/reviews").unwrap();
    assert_eq!(reviews.unwrap()[0]["stars"], 5);
}

#[tokio::test]
async fn test_preload_refuses_paths_off_origin() {
    let origin = Arc::new(ScriptedOrigin::default());
    origin.serve("http://internal.test/secret", r#"{"token":"x"}"#);
    let (app, state) = create_test_app_with(origin);

    let response = app
        .oneshot(json_request(
            "POST",
            "/cache/preload",
            r#"{"paths":["http://internal.test/secret","//internal.test/secret"]}"#,
        ))
        .await
        .unwrap();

    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["results"][0]["status"], "failed");
    assert_eq!(json["results"][1]["status"], "failed");
    assert_eq!(state.cache.read().await.len(), 0);
}

// == STATS Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();

    app.clone()
        .oneshot(json_request("PUT", "/cache", r#"{"key":"k","value":1}"#))
        .await
        .unwrap();
    for uri in ["/cache/k", "/cache/k", "/cache/k", "/cache/missing"] {
        app.clone().oneshot(empty_request("GET", uri)).await.unwrap();
    }

    let response = app.oneshot(empty_request("GET", "/stats")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["total_requests"], 4);
    assert_eq!(json["hits"], 3);
    assert_eq!(json["misses"], 1);
    assert_eq!(json["size"], 1);
    assert_eq!(json["hit_rate"], 0.75);
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}

// == Worker Endpoint Tests ==

#[tokio::test]
async fn test_form_queue_and_sync() {
    let origin = Arc::new(ScriptedOrigin::default());
    origin.serve("http://shop.test/api/contact", "thanks");
    let (app, state) = create_test_app_with(origin);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/forms",
            r#"{"name":"Ana","email":"ana@x.test","message":"Hi"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["id"], 1);

    let response = app
        .oneshot(empty_request("POST", "/sync/contact-form-sync"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["delivered"], serde_json::json!([1]));
    assert!(state.worker.forms().pending().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_worker_message_lifecycle() {
    let origin = Arc::new(ScriptedOrigin::default());
    for asset in [
        "http://shop.test/",
        "http://shop.test/index.html",
        "http://shop.test/manifest.json",
        "http://shop.test/favicon.ico",
        "http://shop.test/fonts/inter-var.woff2",
    ] {
        origin.serve(asset, "asset");
    }
    let (app, state) = create_test_app_with(origin);
    tokio_test::assert_ok!(state.worker.install().await);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/worker/message", r#"{"type":"SKIP_WAITING"}"#))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["type"], "activated");

    let response = app
        .oneshot(json_request("POST", "/worker/message", r#"{"type":"GET_VERSION"}"#))
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["static_cache"], "static-v1");
    assert_eq!(json["dynamic_cache"], "dynamic-v1");
}

// == Proxy Tests ==

#[tokio::test]
async fn test_proxy_serves_precached_shell_offline() {
    let origin = Arc::new(ScriptedOrigin::default());
    origin.serve("http://shop.test/", "<html>shell</html>");
    for asset in [
        "http://shop.test/index.html",
        "http://shop.test/manifest.json",
        "http://shop.test/favicon.ico",
        "http://shop.test/fonts/inter-var.woff2",
    ] {
        origin.serve(asset, "asset");
    }
    let (app, state) = create_test_app_with(origin.clone());
    state.worker.install().await.unwrap();
    state.worker.activate().await.unwrap();
    origin.go_offline();

    let response = app.clone().oneshot(empty_request("GET", "/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_to_string(response.into_body()).await, "<html>shell</html>");

    let response = app
        .oneshot(empty_request("GET", "/images/never-seen.webp"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_to_string(response.into_body()).await, "Network error");
}

#[tokio::test]
async fn test_proxy_post_offline_is_bad_gateway() {
    let origin = Arc::new(ScriptedOrigin::default());
    origin.go_offline();
    let (app, _state) = create_test_app_with(origin);

    let response = app
        .oneshot(json_request("POST", "/api/contact", r#"{"name":"Bo"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

// == Error Response Tests ==

#[tokio::test]
async fn test_invalid_json_request() {
    let app = create_test_app();

    let response = app
        .oneshot(json_request("PUT", "/cache", "not json"))
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

#[tokio::test]
async fn test_empty_key_request() {
    let app = create_test_app();

    let response = app
        .oneshot(json_request("PUT", "/cache", r#"{"key":"","value":1}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// == TTL Expiration via API Tests ==

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let app = create_test_app();

    app.clone()
        .oneshot(json_request("PUT", "/cache", r#"{"key":"flash","value":1,"ttl":50}"#))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(empty_request("GET", "/cache/flash"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(120)).await;

    let response = app.oneshot(empty_request("GET", "/cache/flash")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
