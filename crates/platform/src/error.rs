//! Error types for platform API operations.
//!
//! Only transport-level problems are errors here. An HTTP response with a
//! non-2xx status is a valid [`ApiResponse`](crate::ApiResponse) and is
//! classified by the caller.

use std::fmt;

/// Result type alias for platform operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of platform errors.
///
/// Categories drive user feedback. None of them is retried automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The request did not complete within the configured bound.
    Timeout,
    /// Connection, DNS or TLS failure.
    Network,
    /// The response body did not match the expected schema.
    Decode,
    /// Client misconfiguration (bad base URL, missing token).
    Configuration,
    /// Anything else.
    Other,
}

impl ErrorCategory {
    /// Short label shown before the error message.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Timeout => "Request timed out",
            Self::Network => "Network connectivity issue",
            Self::Decode => "Unexpected response shape",
            Self::Configuration => "Client misconfigured",
            Self::Other => "Unexpected error",
        }
    }

    /// What the operator can do next.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Timeout => "Check platform health or raise --timeout, then re-run",
            Self::Network => "Check connectivity to the platform URL and try again",
            Self::Decode => "The platform API version may differ from the expected one",
            Self::Configuration => "Check --base-url and --token (or JFROG_URL / JFROG_ADMIN_TOKEN)",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to the platform.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The call exceeded its time bound.
    #[error("request timed out: {method} {path}")]
    Timeout {
        /// HTTP method of the request.
        method: String,
        /// Request path.
        path: String,
    },

    /// Transport failure before a status code was received.
    #[error("network error: {message}")]
    Network {
        /// Error message.
        message: String,
    },

    /// Response body was empty or did not decode into the expected schema.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Base URL cannot be used to build request URLs.
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Free-form failure from the transport layer.
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Category used for operator hints.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Timeout { .. } => ErrorCategory::Timeout,
            Error::Network { .. } => ErrorCategory::Network,
            Error::InvalidResponse(_) => ErrorCategory::Decode,
            Error::InvalidBaseUrl(_) => ErrorCategory::Configuration,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this is a decode problem rather than a transport problem.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        self.category() == ErrorCategory::Decode
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}
