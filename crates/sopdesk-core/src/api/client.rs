//! API client for communicating with the sopdesk REST API.
//!
//! `ApiClient` attaches the stored bearer token to every request, keeps the
//! backend's session cookies in a shared jar, and recovers once from an
//! expired token:
//!
//! ```text
//! Sent ─► 2xx ─────────────────────────────► Success
//!   │
//!   ├─► 401 (NotRetried) ─► refresh ─┬─► ok ─► Sent again (Retried) ─► Success | Failed
//!   │                                └─► err ─► Failed (RefreshFailed)
//!   └─► other status / no response ─────────► Failed
//! ```
//!
//! Concurrent sends are independent. Two requests that hit a 401 at the same
//! time will each call the refresh endpoint; refreshes are not coalesced.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error, info, warn};

use crate::auth::CredentialStore;
use crate::config::ClientConfig;
use crate::models::RefreshResponse;

use super::{ApiError, ApiRequest, ApiResponse, Result, RetryState};

/// Credential refresh endpoint, relative to the base origin
pub const REFRESH_PATH: &str = "/auth/jwt/refresh/";

/// API client for the sopdesk backend.
/// Clone is cheap - the connection pool, cookie jar and credential store are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
    cookies: Arc<Jar>,
    credentials: Arc<dyn CredentialStore>,
}

impl ApiClient {
    /// Create a client for `config` that reads and writes its bearer token
    /// through `credentials`
    pub fn new(config: ClientConfig, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
        let cookies = Arc::new(Jar::default());
        let client = Self::build_http(&config, &cookies)?;

        Ok(Self {
            client,
            config,
            cookies,
            credentials,
        })
    }

    /// Apply a new origin and default headers to all subsequent calls.
    ///
    /// Cookies stay enabled and the jar carries over, so session cookies set
    /// before reconfiguring are still sent. Applying the current config again
    /// changes nothing.
    pub fn configure(&mut self, config: ClientConfig) -> Result<()> {
        if config == self.config {
            return Ok(());
        }
        self.client = Self::build_http(&config, &self.cookies)?;
        debug!(base_url = %config.base_url, "API client reconfigured");
        self.config = config;
        Ok(())
    }

    fn build_http(config: &ClientConfig, cookies: &Arc<Jar>) -> Result<Client> {
        Client::builder()
            .default_headers(config.default_headers.clone())
            .cookie_provider(Arc::clone(cookies))
            .build()
            .map_err(ApiError::Network)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Session cookies the jar would send to the base origin, as a `Cookie`
    /// header value. `None` when the backend has set none (or expired them).
    pub fn session_cookies(&self) -> Option<String> {
        self.cookies
            .cookies(&self.config.base_url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    /// Put cookies saved by `session_cookies` back into the jar so a new
    /// process can still reach the refresh endpoint
    pub fn restore_session_cookies(&self, cookies: &str) {
        for pair in cookies.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            self.cookies
                .add_cookie_str(&format!("{}; Path=/", pair), &self.config.base_url);
        }
    }

    /// Whether a bearer token is currently stored
    pub fn has_credential(&self) -> Result<bool> {
        Ok(self.stored_token()?.is_some())
    }

    fn stored_token(&self) -> Result<Option<String>> {
        self.credentials.load().map_err(ApiError::Credential)
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.config
            .endpoint(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{:#}", e)))
    }

    /// Send a request, recovering once from an expired token.
    ///
    /// A 401 on the first attempt triggers one refresh and one re-send with
    /// whatever token is stored after the refresh. A 401 on the re-send, a
    /// failed refresh, any other error status, or a transport failure is
    /// returned to the caller.
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.send_from(request, RetryState::NotRetried).await
    }

    /// Send a request once, returning a 401 as-is without refreshing.
    ///
    /// For calls that create credentials (login): a 401 there means the
    /// submitted credentials were rejected, not that a token expired.
    pub async fn send_without_refresh(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.send_from(request, RetryState::Retried).await
    }

    async fn send_from(&self, request: ApiRequest, mut retry: RetryState) -> Result<ApiResponse> {
        let url = self.url(&request.path)?;

        loop {
            match self.dispatch(&request, &url, retry).await {
                Err(ApiError::Unauthorized { .. }) if retry.can_retry() => {
                    warn!(method = %request.method, url = %url, "Request unauthorized, refreshing token");
                    retry = RetryState::Retried;
                    self.refresh().await?;
                    info!(method = %request.method, url = %url, "Token refreshed, retrying request");
                }
                result => return result,
            }
        }
    }

    async fn dispatch(&self, request: &ApiRequest, url: &Url, retry: RetryState) -> Result<ApiResponse> {
        let mut builder = self.client.request(request.method.clone(), url.clone());

        // Read on every attempt so a retry picks up the refreshed token
        if let Some(token) = self.stored_token()? {
            builder = builder.bearer_auth(token);
        }
        builder = builder.headers(request.headers.clone());
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        debug!(method = %request.method, url = %url, retry = ?retry, "Sending request");
        let response = builder.send().await?;
        Self::check_response(response).await
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<ApiResponse> {
        let status = response.status();
        if status.is_success() {
            let body = response.bytes().await?;
            Ok(ApiResponse {
                status,
                body: body.to_vec(),
            })
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Trade the session cookie for a new access token.
    ///
    /// On success the returned token replaces the stored one. On failure the
    /// stored token is left as it was and the error comes back wrapped in
    /// `ApiError::RefreshFailed`. A new token that cannot be written to the
    /// credential store is a local failure and comes back as
    /// `ApiError::Credential`.
    pub async fn refresh(&self) -> Result<()> {
        match self.request_refresh().await {
            Ok(()) => Ok(()),
            Err(e @ ApiError::Credential(_)) => {
                error!(error = %e, "Refreshed token could not be stored");
                Err(e)
            }
            Err(e) => {
                error!(error = %e, "Token refresh failed");
                Err(ApiError::RefreshFailed(Box::new(e)))
            }
        }
    }

    async fn request_refresh(&self) -> Result<()> {
        let url = self.url(REFRESH_PATH)?;
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let response = Self::check_response(response).await?;

        let refreshed: RefreshResponse = if response.is_empty() {
            RefreshResponse { access: None }
        } else {
            response.json()?
        };

        match refreshed.access {
            Some(token) => self.credentials.store(&token).map_err(ApiError::Credential)?,
            // Cookie-only refresh: the backend rotated its cookie, nothing to store
            None => warn!("Refresh response carried no access token, keeping the stored one"),
        }
        Ok(())
    }

    /// Store a token obtained outside the refresh flow (login)
    pub fn set_credential(&self, token: &str) -> Result<()> {
        self.credentials.store(token).map_err(ApiError::Credential)
    }

    pub fn clear_credential(&self) -> Result<()> {
        self.credentials.clear().map_err(ApiError::Credential)
    }

    // ===== Typed helpers =====

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(ApiRequest::get(path)).await?.json()
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        self.send(ApiRequest::post(path).with_json(body)?).await?.json()
    }

    pub async fn put_json<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        self.send(ApiRequest::put(path).with_json(body)?).await?.json()
    }

    pub async fn patch_json<T: DeserializeOwned, B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<T> {
        self.send(ApiRequest::patch(path).with_json(body)?).await?.json()
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.send(ApiRequest::delete(path)).await?;
        Ok(())
    }
}
