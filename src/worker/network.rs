//! Network access used on cache misses and for form delivery.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};

use crate::error::{CacheError, Result};
use crate::worker::{FetchRequest, StoredResponse};

// == Network Trait ==
/// Performs a request against the network.
///
/// An `Err` means no response arrived at all. HTTP error statuses are
/// returned as ordinary responses.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<StoredResponse>;
}

// == HTTP Network ==
/// `reqwest`-backed network.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
}

impl HttpNetwork {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::Internal(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

/// Drops headers that describe the hop to this process rather than the request.
fn forwardable(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    for name in [
        header::HOST,
        header::CONNECTION,
        header::CONTENT_LENGTH,
        header::TRANSFER_ENCODING,
    ] {
        forwarded.remove(name);
    }
    forwarded
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<StoredResponse> {
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(forwardable(&request.headers))
            .body(request.body.clone())
            .send()
            .await
            .map_err(|e| CacheError::Network(format!("{} {}: {}", request.method, request.url, e)))?;

        let status = response.status();
        let headers = forwardable(response.headers());
        let body = response
            .bytes()
            .await
            .map_err(|e| CacheError::Network(format!("reading {}: {}", request.url, e)))?;

        Ok(StoredResponse::new(status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use url::Url;

    #[test]
    fn test_forwardable_strips_hop_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("localhost:3000"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("image/webp"));

        let forwarded = forwardable(&headers);
        assert!(forwarded.get(header::HOST).is_none());
        assert_eq!(forwarded[header::ACCEPT], "image/webp");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        let network = HttpNetwork::new(Duration::from_millis(500)).unwrap();
        // Port 9 (discard) on loopback is closed in test environments
        let request = FetchRequest::get(Url::parse("http://127.0.0.1:9/").unwrap());

        let result = network.fetch(&request).await;
        assert!(matches!(result, Err(CacheError::Network(_))));
    }
}
