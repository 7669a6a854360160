//! `tenantctl discover` - read-only listing of what a project owns.

use anyhow::{Context as AnyhowContext, Result};
use tenancy::plan_teardown;

use crate::Context;
use crate::cli::DiscoverArgs;
use crate::config::Verbosity;
use crate::reporter;
use crate::ui;

/// Run discovery and verification, print every verdict, mutate nothing.
pub fn run(ctx: &Context, args: DiscoverArgs) -> Result<u8> {
    let config = ctx.config(args.target.project.as_deref())?;
    let api = super::connect(&config)?;

    let spinner = if args.json {
        None
    } else {
        reporter::discovery_spinner(config.verbosity, &config.project_key)
    };
    let teardown = plan_teardown(&api, &config.project_key, &args.target.scope);
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let teardown = teardown
        .with_context(|| format!("Discovery failed for project '{}'", config.project_key))?;

    let issues = teardown.issues();
    let failing = issues.iter().filter(|i| i.is_failure()).count();

    if args.json {
        let out = serde_json::to_string_pretty(&teardown.verdicts)
            .context("Could not serialize verdicts")?;
        println!("{out}");
        return Ok(u8::from(failing > 0));
    }

    if config.verbosity > Verbosity::Silent {
        ui::header(&format!("Project '{}'", config.project_key));
        reporter::print_issues(&issues);
        reporter::print_verdicts(&teardown.verdicts);
        if !teardown.plan.is_empty() {
            reporter::print_plan(&teardown.plan);
        }
        println!();
        if failing > 0 {
            ui::warn(&format!(
                "{failing} read(s) failed; results are incomplete"
            ));
        }
    }

    Ok(u8::from(failing > 0))
}
