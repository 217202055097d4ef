//! Data models for the sopdesk backend.
//!
//! Only the account types the client itself needs live here. Team, task and
//! document payloads are passed through as `serde_json::Value`.

pub mod user;

pub use user::{LoginResponse, RefreshResponse, SignupRequest, User};
