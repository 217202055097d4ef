//! Request and response values passed through `ApiClient::send`.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{ApiError, Result};

/// Whether a request has already been re-issued after a 401.
///
/// Lives alongside one logical `send` call; a request moves from
/// `NotRetried` to `Retried` at most once and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryState {
    #[default]
    NotRetried,
    Retried,
}

impl RetryState {
    pub fn can_retry(self) -> bool {
        self == RetryState::NotRetried
    }
}

/// An outbound call description. Immutable once handed to the client.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub headers: HeaderMap,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            headers: HeaderMap::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Attach a JSON body
    pub fn with_json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode request body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Add a per-call header, overriding any default of the same name
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ApiError::InvalidHeader(format!("{}: {}", name.as_str(), e)))?;
        self.headers.insert(name, value);
        Ok(self)
    }
}

/// Inbound result of a successful call
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse JSON response: {}", e)))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_retry_state_only_allows_one_retry() {
        assert!(RetryState::default().can_retry());
        assert!(!RetryState::Retried.can_retry());
    }

    #[test]
    fn test_with_header_overrides() {
        let req = ApiRequest::get("/api/teams/")
            .with_header("X-Trace", "one")
            .and_then(|r| r.with_header("x-trace", "two"))
            .expect("valid headers");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.headers["x-trace"], "two");
    }

    #[test]
    fn test_with_header_rejects_invalid() {
        assert!(matches!(
            ApiRequest::get("/").with_header("bad header", "v"),
            Err(ApiError::InvalidHeader(_))
        ));
        assert!(matches!(
            ApiRequest::get("/").with_header("X-Ok", "line\nbreak"),
            Err(ApiError::InvalidHeader(_))
        ));
    }

    #[test]
    fn test_with_json_sets_body() {
        let req = ApiRequest::post("/api/tasks/")
            .with_json(&serde_json::json!({"description": "Review SOP"}))
            .expect("serializable body");
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.body.unwrap()["description"], "Review SOP");
    }

    #[test]
    fn test_with_json_reports_encode_failure_as_request_error() {
        use std::collections::HashMap;

        // JSON object keys must be strings
        let mut body = HashMap::new();
        body.insert(vec![1u8], "x");

        assert!(matches!(
            ApiRequest::post("/api/tasks/").with_json(&body),
            Err(ApiError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_response_json_and_text() {
        #[derive(Deserialize)]
        struct Team {
            name: String,
        }

        let response = ApiResponse {
            status: StatusCode::OK,
            body: br#"{"name": "Quality"}"#.to_vec(),
        };
        let team: Team = response.json().expect("valid json");
        assert_eq!(team.name, "Quality");
        assert_eq!(response.text(), r#"{"name": "Quality"}"#);

        let empty = ApiResponse {
            status: StatusCode::NO_CONTENT,
            body: Vec::new(),
        };
        assert!(empty.is_empty());
        assert!(matches!(
            empty.json::<Team>(),
            Err(ApiError::InvalidResponse(_))
        ));
    }
}
