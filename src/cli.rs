use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tenancy::ResourceKind;

#[derive(Parser)]
#[command(name = "tenantctl")]
#[command(author = "Alberto Cavalcante")]
#[command(version)]
#[command(about = "Provision and tear down a project's platform resources", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v: interactive per-call confirmation and echoed requests)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// How to reach the platform. Flags override the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Platform base URL (e.g. https://acme.jfrog.io)
    #[arg(long, env = "JFROG_URL", global = true)]
    pub base_url: Option<String>,

    /// Admin access token
    #[arg(long, env = "JFROG_ADMIN_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Subcommand)]
pub enum Command {
    /// List a project's resources and the membership verdict for each
    Discover(DiscoverArgs),

    /// Delete every verified resource of a project, leaves first
    Cleanup(CleanupArgs),

    /// Create a project and its resources from a manifest
    Provision(ProvisionArgs),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Discover / Cleanup
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct ScopeArgs {
    /// Project key
    #[arg(short, long, env = "PROJECT_KEY")]
    pub project: Option<String>,

    /// Only these resource kinds (comma-separated or repeated): projects,
    /// stages, repositories, users, roles, applications, versions, oidc, mappings.
    /// Kinds that must go first are added: applications bring versions, oidc
    /// brings mappings, roles bring users, projects bring everything.
    #[arg(short, long, value_delimiter = ',', value_parser = parse_kind)]
    pub scope: Vec<ResourceKind>,
}

#[derive(Args, Debug, Clone)]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub target: ScopeArgs,

    /// Print verdicts as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct CleanupArgs {
    #[command(flatten)]
    pub target: ScopeArgs,

    /// Show what would be deleted without calling the platform
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip confirmation prompts
    #[arg(short, long)]
    pub yes: bool,

    /// Confirmation literal; must be exactly DELETE
    #[arg(long, env = "CONFIRM_CLEANUP", hide_env_values = true)]
    pub confirm: Option<String>,
}

// ============================================================================
// Provision
// ============================================================================

#[derive(Args, Debug, Clone)]
pub struct ProvisionArgs {
    /// Manifest describing the project and its resources (TOML)
    #[arg(short, long)]
    pub manifest: PathBuf,

    /// Show what would be created without calling the platform
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Skip confirmation prompts
    #[arg(short, long)]
    pub yes: bool,
}

fn parse_kind(s: &str) -> Result<ResourceKind, String> {
    s.parse()
}
