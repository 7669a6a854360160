//! Markdown run record for CI.
//!
//! When `GITHUB_STEP_SUMMARY` names a file, each run appends a section to
//! it: the per-kind table, any halt, the post-run project read and the
//! elapsed time. A write failure is logged and never fails the run.

use std::fmt::Write as _;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tenancy::{KindCounts, RunSummary};

use crate::config::CONFIRMATION_LITERAL;

/// Environment variable holding the step summary file.
pub const STEP_SUMMARY_ENV: &str = "GITHUB_STEP_SUMMARY";

/// Appends Markdown sections to a step summary file.
#[derive(Debug, Clone)]
pub struct StepSummary {
    path: PathBuf,
}

impl StepSummary {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `None` unless the variable is set to a non-empty path.
    pub fn from_env() -> Option<Self> {
        std::env::var_os(STEP_SUMMARY_ENV)
            .filter(|v| !v.is_empty())
            .map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `markdown`, creating the file if needed.
    pub fn append(&self, markdown: &str) -> io::Result<()> {
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        f.write_all(markdown.as_bytes())?;
        if !markdown.ends_with('\n') {
            f.write_all(b"\n")?;
        }
        Ok(())
    }

    fn record(&self, markdown: &str) {
        if let Err(e) = self.append(markdown) {
            log::warn!("could not write step summary {}: {e}", self.path.display());
        }
    }

    /// The confirmation gate stopped the run.
    pub fn record_aborted(&self, project_key: &str) {
        self.record(&render_aborted(project_key));
    }

    /// A finished run.
    pub fn record_run(&self, run: &RunRecord<'_>) {
        self.record(&render_run(run));
    }
}

/// What a finished run reports to the step summary.
#[derive(Debug, Clone, Copy)]
pub struct RunRecord<'a> {
    /// "Cleanup" or "Provision".
    pub title: &'a str,
    pub project_key: &'a str,
    pub dry_run: bool,
    pub summary: &'a RunSummary,
    pub elapsed: Duration,
}

pub fn render_aborted(project_key: &str) -> String {
    format!(
        "### ❌ Cleanup Aborted\n\
         - Project: `{project_key}`\n\
         - Confirmation not provided (expected `{CONFIRMATION_LITERAL}`)\n"
    )
}

fn table_row(label: &str, c: &KindCounts) -> String {
    format!(
        "| {label} | {} | {} | {} | {} | {} | {} | {} | {} | {} |\n",
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

pub fn render_run(run: &RunRecord<'_>) -> String {
    let summary = run.summary;
    let mut md = String::new();

    let _ = writeln!(md, "## {} `{}`", run.title, run.project_key);
    let _ = writeln!(md, "- Dry run: `{}`", run.dry_run);
    md.push('\n');

    if summary.per_kind.is_empty() {
        md.push_str("Nothing to do.\n");
    } else {
        md.push_str(
            "| kind | deleted | created | updated | absent | conflict | blocked | failed | would run | skipped |\n",
        );
        md.push_str("|---|--:|--:|--:|--:|--:|--:|--:|--:|--:|\n");
        for (kind, counts) in &summary.per_kind {
            md.push_str(&table_row(kind.label(), counts));
        }
        if summary.per_kind.len() > 1 {
            md.push_str(&table_row("**total**", &summary.totals()));
        }
    }
    md.push('\n');

    if summary.excluded > 0 {
        let _ = writeln!(md, "- Excluded (not verified): {}", summary.excluded);
    }
    let failing: Vec<_> = summary.failing_issues().collect();
    if !failing.is_empty() {
        let _ = writeln!(md, "- Discovery failures: {}", failing.len());
        for issue in failing {
            let _ = writeln!(md, "  - {issue}");
        }
    }

    if let Some(reason) = summary.halted {
        let _ = writeln!(md, "### ❌ Halted\n- {reason}");
    }

    match (summary.project_still_exists, run.dry_run) {
        (Some(false), _) => md.push_str("### ✅ Verification\n- Project no longer exists (404)\n"),
        (Some(true), _) => md.push_str("### ❌ Verification\n- Project still exists after deletion\n"),
        (None, true) => md.push_str("### ℹ️ Verification\n- Skipped due to dry-run\n"),
        (None, false) => {}
    }

    let _ = writeln!(
        md,
        "### ⏱️ Timing\n- Completed in `{:.2}s`",
        run.elapsed.as_secs_f64()
    );

    if summary.is_success() {
        md.push_str("### ✅ Result\n- Success\n");
    } else {
        md.push_str("### ❌ Result\n- Completed with failures\n");
    }
    md
}
