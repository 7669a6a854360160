//! # platform
//!
//! Blocking client for the platform REST API (Access, Artifactory and
//! AppTrust endpoints).
//!
//! This crate provides:
//! - Typed requests ([`ApiRequest`]) and status-preserving responses ([`ApiResponse`])
//! - The [`PlatformApi`] trait that callers program against
//! - [`HttpPlatform`], a `ureq` backend with a bounded per-call timeout
//! - [`MockPlatform`], an in-memory backend that records every call
//! - [`Credentials`], which never prints the raw token
//!
//! ## Example
//!
//! ```no_run
//! use platform::{ApiRequest, Credentials, HttpPlatform, PlatformApi, DEFAULT_TIMEOUT};
//!
//! let client = HttpPlatform::new(
//!     "https://acme.jfrog.io",
//!     Credentials::new("token"),
//!     DEFAULT_TIMEOUT,
//! )
//! .unwrap();
//!
//! let resp = client
//!     .send(&ApiRequest::get("/access/api/v1/projects/bookverse"))
//!     .unwrap();
//! println!("HTTP {}", resp.status);
//! ```
//!
//! A non-2xx status is not an error: the caller decides what 404 or 409
//! means for its operation.

pub mod backend;
pub mod error;
pub mod types;

pub use backend::http::{DEFAULT_TIMEOUT, HttpPlatform};
pub use backend::{MockPlatform, PlatformApi};
pub use error::{Error, ErrorCategory, Result};
pub use types::{ApiRequest, ApiResponse, Credentials, Method, encode_component, to_curl};
