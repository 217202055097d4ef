//! Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use sopdesk_core::{ApiClient, ClientConfig, MemoryCredentialStore};
use wiremock::{MockServer, Request};

/// Creates an ApiClient pointing to a wiremock server, plus a handle on its
/// credential store
pub fn test_client(server: &MockServer, token: Option<&str>) -> (ApiClient, Arc<MemoryCredentialStore>) {
    let store = Arc::new(match token {
        Some(token) => MemoryCredentialStore::with_token(token),
        None => MemoryCredentialStore::new(),
    });
    let config = ClientConfig::new(&server.uri()).expect("valid mock server uri");
    let client = ApiClient::new(config, store.clone()).expect("client");
    (client, store)
}

/// Requests the server saw for `path`, in arrival order
pub async fn requests_to(server: &MockServer, path: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .expect("request recording is enabled")
        .into_iter()
        .filter(|r| r.url.path() == path)
        .collect()
}

pub fn authorization(request: &Request) -> Option<String> {
    request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
