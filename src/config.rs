//! Run configuration: built once in `main`, passed by reference.
//!
//! Precedence is flag (or its environment variable) over
//! `~/.config/tenantctl/config.toml` over built-in defaults.

use platform::{Credentials, DEFAULT_TIMEOUT};
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use crate::cli::ConnectionArgs;

/// The literal an operator must supply before a destructive run.
pub const CONFIRMATION_LITERAL: &str = "DELETE";

static PROJECT_KEY_RE: OnceLock<Regex> = OnceLock::new();

fn project_key_re() -> &'static Regex {
    PROJECT_KEY_RE.get_or_init(|| {
        Regex::new(r"^[a-z][a-z0-9-]{1,31}$").unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

/// Configuration problems. These exit with code 2.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no platform URL: pass --base-url or set JFROG_URL")]
    MissingBaseUrl,

    #[error("no access token: pass --token or set JFROG_ADMIN_TOKEN")]
    MissingToken,

    #[error("no project: pass --project or set PROJECT_KEY")]
    MissingProject,

    #[error(
        "invalid project key '{0}': expected a lowercase letter followed by 1-31 lowercase letters, digits or '-'"
    )]
    InvalidProjectKey(String),

    #[error("invalid base URL '{0}': expected http:// or https://")]
    InvalidBaseUrl(String),

    #[error("could not read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config file {}: {source}", path.display())]
    Malformed {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// How much the run talks to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Errors only.
    Silent,
    /// Progress and the final summary.
    Summary,
    /// Per-call confirmation and echoed requests.
    Interactive,
}

impl Verbosity {
    pub fn from_flags(verbose: u8, quiet: bool) -> Self {
        if quiet {
            Self::Silent
        } else if verbose > 0 {
            Self::Interactive
        } else {
            Self::Summary
        }
    }
}

/// Optional on-disk defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub base_url: Option<String>,
    pub token: Option<String>,
    pub project: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Default location of the config file.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".config").join("tenantctl").join("config.toml"))
    }

    /// Load the default config file; a missing file is an empty config.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Immutable settings for one run.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_key: String,
    pub base_url: String,
    pub credentials: Credentials,
    pub timeout: Duration,
    pub verbosity: Verbosity,
}

impl Config {
    /// Merge flags over the config file. `project` is the command's
    /// project key (flag, environment or manifest), if any.
    pub fn resolve(
        connection: &ConnectionArgs,
        project: Option<&str>,
        file: &FileConfig,
        verbosity: Verbosity,
    ) -> Result<Self, ConfigError> {
        let project_key = project
            .map(str::to_string)
            .or_else(|| file.project.clone())
            .ok_or(ConfigError::MissingProject)?;
        validate_project_key(&project_key)?;

        let base_url = connection
            .base_url
            .clone()
            .or_else(|| file.base_url.clone())
            .filter(|u| !u.trim().is_empty())
            .ok_or(ConfigError::MissingBaseUrl)?;
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("https://") || base_url.starts_with("http://")) {
            return Err(ConfigError::InvalidBaseUrl(base_url));
        }

        let token = connection
            .token
            .clone()
            .or_else(|| file.token.clone())
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let timeout = connection
            .timeout
            .or(file.timeout_secs)
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs);

        Ok(Self {
            project_key,
            base_url,
            credentials: Credentials::new(token.trim()),
            timeout,
            verbosity,
        })
    }
}

/// Check a project key against platform naming rules.
pub fn validate_project_key(key: &str) -> Result<(), ConfigError> {
    if project_key_re().is_match(key) {
        Ok(())
    } else {
        Err(ConfigError::InvalidProjectKey(key.to_string()))
    }
}

/// Whether the operator typed the confirmation literal. Exact and
/// case-sensitive; surrounding whitespace is ignored.
pub fn confirmation_satisfied(literal: Option<&str>) -> bool {
    literal.is_some_and(|l| l.trim() == CONFIRMATION_LITERAL)
}

// ============================================================================
// Tests
// ============================================================================
