//! HTTP backend over `ureq`.
//!
//! Every call has a bounded wait (`timeout_global`). Status codes are
//! returned to the caller untouched; nothing is retried.

use crate::backend::PlatformApi;
use crate::error::{Error, Result};
use crate::types::{ApiRequest, ApiResponse, Credentials, Method};
use std::time::Duration;

/// Default bound on a single call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const USER_AGENT: &str = concat!("tenantctl/", env!("CARGO_PKG_VERSION"));

/// Live platform backend.
pub struct HttpPlatform {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Base URL without trailing slash, e.g. `https://acme.jfrog.io`.
    base_url: String,
    credentials: Credentials,
}

impl HttpPlatform {
    /// Create a backend for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidBaseUrl` unless the URL is http(s).
    pub fn new(base_url: &str, credentials: Credentials, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(Error::InvalidBaseUrl(base_url));
        }

        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();

        Ok(Self {
            agent: config.into(),
            base_url,
            credentials,
        })
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, request: &ApiRequest) -> String {
        format!("{}{}", self.base_url, request.path_with_query())
    }

    fn map_error(request: &ApiRequest, err: ureq::Error) -> Error {
        match err {
            ureq::Error::Timeout(_) => Error::Timeout {
                method: request.method.to_string(),
                path: request.path_with_query(),
            },
            other => Error::network(format!("{request}: {other}")),
        }
    }
}

impl PlatformApi for HttpPlatform {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let url = self.url(request);
        let auth = format!("Bearer {}", self.credentials.token());
        log::debug!("{request}");

        let result = match request.method {
            Method::Get | Method::Delete => {
                let builder = if request.method == Method::Get {
                    self.agent.get(&url)
                } else {
                    self.agent.delete(&url)
                };
                builder
                    .header("Authorization", &auth)
                    .header("Accept", "application/json")
                    .header("User-Agent", USER_AGENT)
                    .call()
            }
            Method::Post | Method::Put | Method::Patch => {
                let builder = match request.method {
                    Method::Post => self.agent.post(&url),
                    Method::Put => self.agent.put(&url),
                    _ => self.agent.patch(&url),
                };
                let builder = builder
                    .header("Authorization", &auth)
                    .header("Accept", "application/json")
                    .header("User-Agent", USER_AGENT);
                match &request.body {
                    Some(body) => builder.send_json(body),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result.map_err(|e| Self::map_error(request, e))?;
        let status = response.status().as_u16();
        let raw = response
            .body_mut()
            .read_to_string()
            .map_err(|e| Self::map_error(request, e))?;

        log::debug!("{request} -> HTTP {status}");

        Ok(ApiResponse {
            status,
            body: if raw.trim().is_empty() { None } else { Some(raw) },
        })
    }
}
