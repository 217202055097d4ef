//! Authentication module for holding the bearer credential between requests.
//!
//! This module provides:
//! - `CredentialStore`: the get/set/clear seam the API client reads before
//!   every request and writes after login and refresh
//! - `MemoryCredentialStore`: in-process store
//! - `SessionFile`: token persisted as JSON in the cache directory
//! - `KeyringCredentialStore`: token kept in the OS keychain
//! - `SessionCookies`: the backend session cookies, persisted between runs
//!
//! The client has no expiry metadata for the token; the backend signals an
//! expired token with a 401.

pub mod credentials;
pub mod session;

pub use credentials::{CredentialStore, KeyringCredentialStore, MemoryCredentialStore, ACCESS_KEY};
pub use session::{SessionCookies, SessionData, SessionFile};
