//! Core library for sopdesk.
//!
//! Provides the authenticated API client used to talk to the SOP, team and
//! task backend, the credential stores that hold the bearer token between
//! runs, and the configuration needed to find the backend.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError, ApiRequest, ApiResponse, RetryState};
pub use auth::{
    CredentialStore, KeyringCredentialStore, MemoryCredentialStore, SessionCookies, SessionFile,
};
pub use config::{ClientConfig, Config, CredentialBackend};
