// Teardown
pub mod cleanup;
pub mod discover;

// Creation
pub mod provision;

use anyhow::{Context as AnyhowContext, Result};
use platform::HttpPlatform;
use tenancy::{ExecuteOptions, Mode, RunSummary};

use crate::config::Config;

/// Open a client for the platform `config` points at.
pub fn connect(config: &Config) -> Result<HttpPlatform> {
    HttpPlatform::new(&config.base_url, config.credentials.clone(), config.timeout)
        .with_context(|| format!("Could not create a client for {}", config.base_url))
}

/// Execution options shared by every mutating command.
pub fn execute_options(dry_run: bool) -> ExecuteOptions {
    ExecuteOptions {
        mode: if dry_run { Mode::DryRun } else { Mode::Apply },
        ..ExecuteOptions::default()
    }
}

/// Process exit status for a finished run.
pub fn exit_status(summary: &RunSummary) -> u8 {
    u8::try_from(summary.exit_code()).unwrap_or(1)
}
