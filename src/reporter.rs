//! Terminal rendering of discovery, plans, progress and the run summary.
//!
//! Nothing here influences what the engine does; it only listens.

use colored::Colorize;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use platform::{ApiRequest, Credentials, to_curl};
use std::time::Duration;
use tenancy::{
    ConfirmCallback, DiscoveryIssue, ExecutionPlan, ExecutionResult, HaltReason, KindCounts,
    MembershipVerdict, PlanStep, ProgressCallback, RunSummary,
};

use crate::config::{Config, Verbosity};
use crate::ui;

const NAME_WIDTH: usize = 48;

/// Progress listener for the execution engine.
pub struct TerminalReporter {
    verbosity: Verbosity,
    base_url: String,
    credentials: Credentials,
}

impl TerminalReporter {
    pub fn new(config: &Config) -> Self {
        Self {
            verbosity: config.verbosity,
            base_url: config.base_url.clone(),
            credentials: config.credentials.clone(),
        }
    }
}

impl ProgressCallback for TerminalReporter {
    fn on_batch_start(&mut self, index: usize, total: usize, steps: usize) {
        if self.verbosity >= Verbosity::Summary {
            println!();
            ui::step(index + 1, total, &format!("{steps} step(s)"));
        }
    }

    fn on_step_start(&mut self, step: &PlanStep, request: Option<&ApiRequest>) {
        if self.verbosity < Verbosity::Interactive {
            return;
        }
        println!("  {} {}", "→".cyan(), step.description());
        if let Some(request) = request {
            ui::dim(&to_curl(request, &self.base_url, &self.credentials));
        }
    }

    fn on_step_complete(&mut self, result: &ExecutionResult) {
        if self.verbosity == Verbosity::Silent {
            return;
        }
        let status = result
            .http_status
            .map(|s| format!(" (HTTP {s})"))
            .unwrap_or_default();
        println!(
            "  {} {} {}: {}{}",
            ui::outcome_symbol(result.outcome),
            result.descriptor.kind,
            result.descriptor.display_name().bold(),
            result.outcome,
            status.dimmed()
        );
        let show_detail =
            result.outcome.is_failure() || self.verbosity == Verbosity::Interactive;
        if show_detail && !result.detail.is_empty() {
            ui::dim(&format!("  {}", result.detail));
        }
    }

    fn on_batch_complete(&mut self, _index: usize) {}
}

/// Asks the operator before each step the policy selects.
pub struct PromptConfirm;

impl ConfirmCallback for PromptConfirm {
    fn confirm(&mut self, prompt: &str) -> tenancy::Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .map_err(|e| tenancy::Error::Prompt(e.to_string()))
    }
}

/// Spinner shown while discovery runs; `None` when output is silent.
pub fn discovery_spinner(verbosity: Verbosity, project_key: &str) -> Option<ProgressBar> {
    if verbosity == Verbosity::Silent {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(format!("Discovering resources of project '{project_key}'..."));
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Print every verdict, verified first.
pub fn print_verdicts(verdicts: &[MembershipVerdict]) {
    let (verified, excluded): (Vec<_>, Vec<_>) = verdicts.iter().partition(|v| v.verified);

    ui::section(&format!("Verified ({})", verified.len()));
    if verified.is_empty() {
        ui::dim("nothing belongs to this project");
    }
    for v in verified {
        println!(
            "  {} {:<22} {}",
            "✓".green(),
            v.descriptor.kind.label(),
            ui::truncate(&v.descriptor.display_name(), NAME_WIDTH)
        );
    }

    if !excluded.is_empty() {
        ui::section(&format!("Excluded ({})", excluded.len()));
        for v in excluded {
            println!(
                "  {} {:<22} {}",
                "⊘".yellow(),
                v.descriptor.kind.label(),
                ui::truncate(&v.descriptor.display_name(), NAME_WIDTH)
            );
            let class = v
                .failure_class()
                .map(|c| format!(" ({c})"))
                .unwrap_or_default();
            ui::dim(&format!("  {} - {}{class}", v.method, v.reason));
        }
    }
}

/// Print discovery issues; 404s are informational.
pub fn print_issues(issues: &[DiscoveryIssue]) {
    if issues.is_empty() {
        return;
    }
    ui::section("Discovery");
    for issue in issues {
        if issue.is_failure() {
            ui::warn(&issue.to_string());
        } else {
            ui::dim(&issue.to_string());
        }
    }
}

/// Print the plan batch by batch.
pub fn print_plan(plan: &ExecutionPlan) {
    ui::header(&format!(
        "Plan for '{}': {} step(s) in {} batch(es)",
        plan.project_key(),
        plan.len(),
        plan.batches().len()
    ));
    let kinds: Vec<String> = plan
        .count_by_kind()
        .iter()
        .map(|(kind, n)| format!("{n} {}", kind.cli_name()))
        .collect();
    if !kinds.is_empty() {
        ui::dim(&kinds.join(", "));
    }
    for (index, batch) in plan.batches().iter().enumerate() {
        println!("  {}", format!("batch {}", index + 1).blue());
        for step in batch {
            let verb = if step.action.is_destructive() {
                step.action.kind().verb().red()
            } else {
                step.action.kind().verb().green()
            };
            println!(
                "    {} {} {}",
                verb,
                step.descriptor().kind,
                ui::truncate(&step.descriptor().display_name(), NAME_WIDTH).bold()
            );
        }
    }
}

fn row(label: &str, c: &KindCounts) -> String {
    format!(
        "  {:<22} {:>7} {:>7} {:>7} {:>7} {:>8} {:>7} {:>6} {:>9} {:>7}",
        label,
        c.deleted,
        c.created,
        c.updated,
        c.already_absent,
        c.conflict_skipped,
        c.blocked,
        c.failed,
        c.would_run,
        c.not_attempted
    )
}

/// Print the per-kind table and the run verdict.
pub fn print_summary(summary: &RunSummary) {
    ui::header("Summary");
    println!(
        "{}",
        format!(
            "  {:<22} {:>7} {:>7} {:>7} {:>7} {:>8} {:>7} {:>6} {:>9} {:>7}",
            "kind",
            "deleted",
            "created",
            "updated",
            "absent",
            "conflict",
            "blocked",
            "failed",
            "would run",
            "skipped"
        )
        .dimmed()
    );
    for (kind, counts) in &summary.per_kind {
        println!("{}", row(kind.label(), counts));
    }
    if summary.per_kind.len() > 1 {
        println!("{}", row("total", &summary.totals()).bold());
    }
    println!();

    if summary.excluded > 0 {
        ui::kv("Excluded (not verified)", &summary.excluded.to_string());
    }
    let failing = summary.failing_issues().count();
    if failing > 0 {
        ui::kv("Discovery failures", &failing.to_string());
    }
    match summary.halted {
        Some(HaltReason::AuthFailure) => ui::error(&HaltReason::AuthFailure.to_string()),
        Some(HaltReason::Cancelled) => ui::warn(&HaltReason::Cancelled.to_string()),
        None => {}
    }
    match summary.project_still_exists {
        Some(true) => ui::error("project still exists after deletion"),
        Some(false) => ui::success("project confirmed removed"),
        None => {}
    }

    if summary.is_success() {
        ui::success("Done");
    } else {
        ui::error("Completed with failures");
    }
}
