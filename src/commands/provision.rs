//! `tenantctl provision` - create a project and its resources from a manifest.

use anyhow::{Context as AnyhowContext, Result};
use std::time::Instant;
use tenancy::{ConfirmPolicy, ProvisionManifest, RunSummary, execute};

use crate::Context;
use crate::cli::ProvisionArgs;
use crate::config::Verbosity;
use crate::reporter::{self, PromptConfirm, TerminalReporter};
use crate::step_summary::{RunRecord, StepSummary};
use crate::ui;

pub fn run(ctx: &Context, args: ProvisionArgs) -> Result<u8> {
    let started = Instant::now();
    let manifest = ProvisionManifest::load(&args.manifest)
        .with_context(|| format!("Could not load manifest {}", args.manifest.display()))?;
    let config = ctx.config(Some(manifest.project_key()))?;
    let plan = manifest.build_plan()?;
    let loud = config.verbosity > Verbosity::Silent;

    if loud {
        reporter::print_plan(&plan);
    }

    let api = super::connect(&config)?;
    let mut opts = super::execute_options(args.dry_run);
    if config.verbosity == Verbosity::Interactive && !args.yes {
        opts.confirm = ConfirmPolicy::Always;
    }

    let mut progress = TerminalReporter::new(&config);
    let report = execute(&api, &plan, &opts, &mut progress, &mut PromptConfirm)
        .context("Execution aborted")?;

    let summary = RunSummary::from_report(&report, Vec::new(), 0);
    if let Some(record) = StepSummary::from_env() {
        record.record_run(&RunRecord {
            title: "Provision",
            project_key: &config.project_key,
            dry_run: args.dry_run,
            summary: &summary,
            elapsed: started.elapsed(),
        });
    }
    if loud {
        reporter::print_summary(&summary);
        if args.dry_run {
            println!();
            ui::info("Dry run - no changes made");
        }
    }
    Ok(super::exit_status(&summary))
}
