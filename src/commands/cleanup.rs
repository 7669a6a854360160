//! `tenantctl cleanup` - tear down every verified resource of a project.
//!
//! Discovery and verification always run first and the plan is printed
//! before anything is touched. Outside dry-run, silent mode and `--yes`,
//! the operator must type the confirmation literal before the engine is
//! invoked at all.

use anyhow::{Context as AnyhowContext, Result};
use dialoguer::Input;
use std::time::Instant;
use tenancy::{ConfirmPolicy, RunSummary, execute, plan_teardown};

use crate::Context;
use crate::cli::CleanupArgs;
use crate::config::{CONFIRMATION_LITERAL, Config, Verbosity, confirmation_satisfied};
use crate::reporter::{self, PromptConfirm, TerminalReporter};
use crate::step_summary::{RunRecord, StepSummary};
use crate::ui;

/// The confirmation gate was not passed. Exits with code 3.
#[derive(Debug, thiserror::Error)]
#[error(
    "destructive run not confirmed: pass --confirm {CONFIRMATION_LITERAL} or set CONFIRM_CLEANUP={CONFIRMATION_LITERAL}"
)]
pub struct ConfirmationRequired;

/// Whether this run must pass the literal confirmation gate.
fn gate_required(dry_run: bool, verbosity: Verbosity, yes: bool) -> bool {
    !dry_run && verbosity != Verbosity::Silent && !yes
}

/// Check the supplied literal, or ask for it when a human is present.
fn check_gate(config: &Config, supplied: Option<&str>, steps: usize) -> Result<()> {
    if confirmation_satisfied(supplied) {
        return Ok(());
    }
    if supplied.is_some() || !console::user_attended() {
        return Err(ConfirmationRequired.into());
    }

    println!();
    ui::warn(&format!(
        "This deletes {steps} resource(s) of project '{}' at {}.",
        config.project_key, config.base_url
    ));
    let typed: String = Input::new()
        .with_prompt(format!("Type {CONFIRMATION_LITERAL} to continue"))
        .allow_empty(true)
        .interact_text()
        .context("Failed to read confirmation")?;

    if confirmation_satisfied(Some(&typed)) {
        Ok(())
    } else {
        Err(ConfirmationRequired.into())
    }
}

/// Record the aborted gate for CI, then fail.
fn aborted(record: Option<&StepSummary>, project_key: &str) -> anyhow::Error {
    if let Some(record) = record {
        record.record_aborted(project_key);
    }
    ConfirmationRequired.into()
}

pub fn run(ctx: &Context, args: CleanupArgs) -> Result<u8> {
    let started = Instant::now();
    let config = ctx.config(args.target.project.as_deref())?;
    let record = StepSummary::from_env();

    // A wrong literal fails before any call is made.
    if !args.dry_run && args.confirm.is_some() && !confirmation_satisfied(args.confirm.as_deref())
    {
        return Err(aborted(record.as_ref(), &config.project_key));
    }

    let api = super::connect(&config)?;

    let spinner = reporter::discovery_spinner(config.verbosity, &config.project_key);
    let teardown = plan_teardown(&api, &config.project_key, &args.target.scope);
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let teardown = teardown
        .with_context(|| format!("Discovery failed for project '{}'", config.project_key))?;

    let issues = teardown.issues();
    let excluded = teardown.plan.excluded().len();
    let loud = config.verbosity > Verbosity::Silent;

    if loud {
        reporter::print_issues(&issues);
        if excluded > 0 {
            ui::info(&format!(
                "{excluded} resource(s) excluded: membership could not be verified"
            ));
            for verdict in teardown.rejected() {
                ui::dim(&format!(
                    "{} {} - {}",
                    verdict.descriptor.kind,
                    verdict.descriptor.display_name(),
                    verdict.reason
                ));
            }
        }
    }

    if teardown.plan.is_empty() {
        let summary = RunSummary {
            discovery_issues: issues,
            excluded,
            ..RunSummary::default()
        };
        if loud {
            ui::info(&format!(
                "Nothing to delete for project '{}'",
                config.project_key
            ));
        }
        if let Some(record) = &record {
            record.record_run(&RunRecord {
                title: "Cleanup",
                project_key: &config.project_key,
                dry_run: args.dry_run,
                summary: &summary,
                elapsed: started.elapsed(),
            });
        }
        return Ok(super::exit_status(&summary));
    }

    if loud {
        reporter::print_plan(&teardown.plan);
    }

    if gate_required(args.dry_run, config.verbosity, args.yes) {
        if let Err(err) = check_gate(&config, args.confirm.as_deref(), teardown.plan.len()) {
            if err.is::<ConfirmationRequired>() {
                return Err(aborted(record.as_ref(), &config.project_key));
            }
            return Err(err);
        }
    }

    let mut opts = super::execute_options(args.dry_run);
    if config.verbosity == Verbosity::Interactive && !args.yes {
        opts.confirm = ConfirmPolicy::OnDestructiveOnly;
    }

    let mut progress = TerminalReporter::new(&config);
    let report = execute(&api, &teardown.plan, &opts, &mut progress, &mut PromptConfirm)
        .context("Execution aborted")?;

    let summary = RunSummary::from_report(&report, issues, excluded);
    if let Some(record) = &record {
        record.record_run(&RunRecord {
            title: "Cleanup",
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
