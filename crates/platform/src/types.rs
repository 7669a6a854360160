//! Request, response and credential types.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::fmt;

/// HTTP method of a platform call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Uppercase wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// Whether the call can change platform state.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        !matches!(self, Self::Get)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single platform API call.
///
/// `path` is relative to the platform base URL and already has its
/// segments encoded (see [`encode_component`]).
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    /// Create a request with the given method and path.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Path plus encoded query string, as sent on the wire.
    #[must_use]
    pub fn path_with_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }
}

impl fmt::Display for ApiRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path_with_query())
    }
}

/// Status code and raw body of a completed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Option<String>,
}

impl ApiResponse {
    /// Create a response with no body.
    pub fn empty(status: u16) -> Self {
        Self { status, body: None }
    }

    /// Create a response with a JSON body.
    pub fn with_json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            body: Some(body.to_string()),
        }
    }

    /// Whether the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body into a typed schema.
    ///
    /// An empty body is a decode error, never an empty value.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        match self.body.as_deref().map(str::trim) {
            None | Some("") => Err(Error::InvalidResponse(format!(
                "HTTP {} returned an empty body",
                self.status
            ))),
            Some(raw) => Ok(serde_json::from_str(raw)?),
        }
    }

    /// Short body excerpt for diagnostics.
    #[must_use]
    pub fn body_excerpt(&self) -> String {
        const MAX: usize = 200;
        match &self.body {
            None => String::new(),
            Some(b) if b.chars().count() <= MAX => b.trim().to_string(),
            Some(b) => format!("{}...", b.chars().take(MAX).collect::<String>().trim()),
        }
    }
}

/// Access token that never prints in clear.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// Raw token, for the Authorization header only.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// First four characters followed by `****`; short tokens are fully masked.
    #[must_use]
    pub fn obfuscated(&self) -> String {
        if self.token.chars().count() <= 8 {
            return "****".to_string();
        }
        let prefix: String = self.token.chars().take(4).collect();
        format!("{prefix}****")
    }

    pub fn is_empty(&self) -> bool {
        self.token.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.obfuscated())
            .finish()
    }
}

impl fmt::Display for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.obfuscated())
    }
}

/// Percent-encode a path segment or query component (RFC 3986 unreserved set kept).
#[must_use]
pub fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// Render a request as a curl command with the token obfuscated.
#[must_use]
pub fn to_curl(request: &ApiRequest, base_url: &str, credentials: &Credentials) -> String {
    let mut cmd = format!(
        "curl -X {} -H \"Authorization: Bearer {}\"",
        request.method,
        credentials.obfuscated()
    );
    if let Some(body) = &request.body {
        cmd.push_str(&format!(
            " -H \"Content-Type: application/json\" -d '{}'",
            body
        ));
    }
    cmd.push_str(&format!(
        " \"{}{}\"",
        base_url.trim_end_matches('/'),
        request.path_with_query()
    ));
    cmd
}
