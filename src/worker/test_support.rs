//! In-process network double for worker tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};

use crate::error::{CacheError, Result};
use crate::worker::{FetchRequest, Network, StoredResponse};

pub(crate) fn ok_response(body: &'static str) -> StoredResponse {
    StoredResponse::new(StatusCode::OK, HeaderMap::new(), body)
}

/// Answers from a URL table; unknown URLs get a 404.
#[derive(Default)]
pub(crate) struct FakeNetwork {
    routes: Mutex<HashMap<String, StoredResponse>>,
    offline: AtomicBool,
    calls: AtomicUsize,
    requests: Mutex<Vec<FetchRequest>>,
    reject_body: Mutex<Option<String>>,
}

impl FakeNetwork {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn offline() -> Self {
        let network = Self::default();
        network.set_online(false);
        network
    }

    pub(crate) fn set_online(&self, online: bool) {
        self.offline.store(!online, Ordering::SeqCst);
    }

    pub(crate) fn route(&self, url: &str, response: StoredResponse) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), response);
    }

    /// Requests whose body contains `needle` get a 500.
    pub(crate) fn reject_bodies_containing(&self, needle: &str) {
        *self.reject_body.lock().unwrap() = Some(needle.to_string());
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for FakeNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<StoredResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if self.offline.load(Ordering::SeqCst) {
            return Err(CacheError::Network("offline".to_string()));
        }

        if let Some(needle) = self.reject_body.lock().unwrap().as_deref() {
            if String::from_utf8_lossy(&request.body).contains(needle) {
                return Ok(StoredResponse::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    HeaderMap::new(),
                    "rejected",
                ));
            }
        }

        let routed = self.routes.lock().unwrap().get(request.cache_key()).cloned();
        Ok(routed.unwrap_or_else(|| {
            StoredResponse::new(StatusCode::NOT_FOUND, HeaderMap::new(), "not found")
        }))
    }
}
