mod cli;
mod commands;
mod config;
mod reporter;
mod step_summary;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, ConnectionArgs};
use commands::cleanup::ConfirmationRequired;
use config::{Config, ConfigError, FileConfig, Verbosity};
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub verbosity: Verbosity,
    pub connection: ConnectionArgs,
}

impl Context {
    /// Resolve the run configuration for `project`.
    pub fn config(&self, project: Option<&str>) -> Result<Config, ConfigError> {
        let file = FileConfig::load()?;
        Config::resolve(&self.connection, project, &file, self.verbosity)
    }
}

/// 2 for configuration problems, 3 for an unconfirmed destructive run,
/// 1 for everything else.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<ConfigError>().is_some() {
        return 2;
    }
    if err.downcast_ref::<ConfirmationRequired>().is_some() {
        return 3;
    }
    match err.downcast_ref::<tenancy::Error>() {
        Some(tenancy::Error::InvalidManifest(_) | tenancy::Error::InvalidProjectKey(_)) => 2,
        _ => 1,
    }
}

/// Category of the first transport error in the chain, if any.
fn platform_category(err: &anyhow::Error) -> Option<platform::ErrorCategory> {
    err.chain()
        .find_map(|cause| {
            cause.downcast_ref::<platform::Error>().or_else(|| {
                match cause.downcast_ref::<tenancy::Error>() {
                    Some(tenancy::Error::Platform(inner)) => Some(inner),
                    _ => None,
                }
            })
        })
        .map(platform::Error::category)
}

fn run(ctx: &Context, command: Command) -> Result<u8> {
    match command {
        Command::Discover(args) => commands::discover::run(ctx, args),
        Command::Cleanup(args) => commands::cleanup::run(ctx, args),
        Command::Provision(args) => commands::provision::run(ctx, args),
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "tenantctl", &mut io::stdout());
            Ok(0)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    let ctx = Context {
        verbosity: Verbosity::from_flags(cli.verbose, cli.quiet),
        connection: cli.connection,
    };

    match run(&ctx, cli.command) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            ui::error(&format!("{err:#}"));
            if let Some(category) = platform_category(&err) {
                ui::dim(&format!("{category}: {}", category.advice()));
            }
            ExitCode::from(exit_code_for(&err))
        }
    }
}
