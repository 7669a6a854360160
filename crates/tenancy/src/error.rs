//! Error types and the failure taxonomy for lifecycle runs.

use std::fmt;

/// Result type alias for tenancy operations.
pub type Result<T> = std::result::Result<T, Error>;

/// How a failed or non-happy platform interaction is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Membership could not be established; the resource is excluded.
    VerificationAmbiguous,
    /// 404: the desired end state already holds.
    NotFound,
    /// 409: already exists or already in the target state.
    Conflict,
    /// 401/403: fatal to the remaining run.
    AuthFailure,
    /// Anything else, including timeouts and decode errors.
    TransientOrUnknownFailure,
}

impl FailureClass {
    /// Classify a non-2xx status. Returns `None` for 2xx.
    #[must_use]
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            200..=299 => None,
            404 => Some(Self::NotFound),
            409 => Some(Self::Conflict),
            401 | 403 => Some(Self::AuthFailure),
            _ => Some(Self::TransientOrUnknownFailure),
        }
    }

    /// Whether the run may treat this as success.
    #[must_use]
    pub fn is_idempotent_success(&self) -> bool {
        matches!(self, Self::NotFound | Self::Conflict)
    }

    /// Whether this class halts everything that follows.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AuthFailure)
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::VerificationAmbiguous => "verification ambiguous",
            Self::NotFound => "not found",
            Self::Conflict => "conflict",
            Self::AuthFailure => "authentication/authorization failure",
            Self::TransientOrUnknownFailure => "transient or unknown failure",
        };
        f.write_str(s)
    }
}

/// Errors that abort a lifecycle operation as a whole.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The platform rejected our credentials.
    #[error("platform rejected credentials (HTTP {status}) while {operation}")]
    AuthFailure {
        /// 401 or 403.
        status: u16,
        /// What was being attempted.
        operation: String,
    },

    /// Transport-level platform error.
    #[error(transparent)]
    Platform(#[from] platform::Error),

    /// Provisioning manifest could not be read or is inconsistent.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Project key does not satisfy platform naming rules.
    #[error("invalid project key '{0}'")]
    InvalidProjectKey(String),

    /// Dependency resolution produced an unusable plan.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),

    /// The confirmation prompt could not be shown or read.
    #[error("confirmation prompt failed: {0}")]
    Prompt(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert_eq!(FailureClass::from_status(200), None);
        assert_eq!(FailureClass::from_status(204), None);
        assert_eq!(FailureClass::from_status(404), Some(FailureClass::NotFound));
        assert_eq!(FailureClass::from_status(409), Some(FailureClass::Conflict));
        assert_eq!(FailureClass::from_status(401), Some(FailureClass::AuthFailure));
        assert_eq!(FailureClass::from_status(403), Some(FailureClass::AuthFailure));
        assert_eq!(
            FailureClass::from_status(500),
            Some(FailureClass::TransientOrUnknownFailure)
        );
        assert_eq!(
            FailureClass::from_status(400),
            Some(FailureClass::TransientOrUnknownFailure)
        );
    }

    #[test]
    fn test_idempotent_and_fatal() {
        assert!(FailureClass::NotFound.is_idempotent_success());
        assert!(FailureClass::Conflict.is_idempotent_success());
        assert!(!FailureClass::AuthFailure.is_idempotent_success());
        assert!(FailureClass::AuthFailure.is_fatal());
        assert!(!FailureClass::TransientOrUnknownFailure.is_fatal());
    }
}
