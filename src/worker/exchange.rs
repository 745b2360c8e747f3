//! Requests the worker intercepts and the responses it stores and serves.

use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::Serialize;
use url::Url;

use crate::error::Result;

/// Body of the synthetic response served by cache-first when offline.
pub const OFFLINE_CONTENT_BODY: &str = "Offline content not available";

/// Body of the synthetic response served when the network fails and
/// nothing is cached.
pub const NETWORK_ERROR_BODY: &str = "Network error";

// == Fetch Request ==
/// An intercepted request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchRequest {
    /// Plain GET with no headers.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// POST with a JSON body.
    pub fn post_json<T: Serialize + ?Sized>(url: Url, payload: &T) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Ok(Self {
            method: Method::POST,
            url,
            headers,
            body: Bytes::from(serde_json::to_vec(payload)?),
        })
    }

    /// Key the response is stored under.
    pub fn cache_key(&self) -> &str {
        self.url.as_str()
    }
}

// == Stored Response ==
/// A response as held in a named cache.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl StoredResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    /// Synthetic 503 with a plain-text explanation.
    pub fn offline(message: &'static str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        Self::new(StatusCode::SERVICE_UNAVAILABLE, headers, message)
    }

    /// Only complete 200 responses are written to a cache.
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl IntoResponse for StoredResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_response() {
        let response = StoredResponse::offline(OFFLINE_CONTENT_BODY);

        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.body_text(), "Offline content not available");
        assert!(!response.is_cacheable());
    }

    #[test]
    fn test_post_json_request() {
        let url = Url::parse("http://origin.test/api/contact").unwrap();
        let request = FetchRequest::post_json(url, &serde_json::json!({"id": 3})).unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.cache_key(), "http://origin.test/api/contact");
        assert_eq!(request.headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(&request.body[..], br#"{"id":3}"#);
    }

    #[test]
    fn test_into_response_keeps_parts() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
        let response = StoredResponse::new(StatusCode::OK, headers, "png").into_response();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    }
}
