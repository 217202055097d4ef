//! REST API client module for the sopdesk backend.
//!
//! This module provides the `ApiClient` for sending authenticated requests.
//! Every request carries the stored bearer token when one exists, and the
//! session cookies the backend set at login. An expired token is recovered
//! once per request by calling the refresh endpoint and re-issuing the
//! request with the new token.

pub mod account;
pub mod client;
pub mod error;
pub mod request;

pub use client::{ApiClient, REFRESH_PATH};
pub use error::{ApiError, Result};
pub use request::{ApiRequest, ApiResponse, RetryState};
