//! Run summary: per-kind outcome counts and the process verdict.

use crate::discovery::DiscoveryIssue;
use crate::executor::{HaltReason, RunReport};
use crate::types::{ExecutionResult, KindCounts, ResourceKind};
use std::collections::BTreeMap;

/// Summary of a run
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub per_kind: BTreeMap<ResourceKind, KindCounts>,
    pub discovery_issues: Vec<DiscoveryIssue>,
    /// Descriptors kept out of the plan by verification.
    pub excluded: usize,
    pub halted: Option<HaltReason>,
    pub project_still_exists: Option<bool>,
}

impl RunSummary {
    /// Summarise a finished run together with what discovery reported.
    pub fn from_report(report: &RunReport, discovery_issues: Vec<DiscoveryIssue>, excluded: usize) -> Self {
        let mut summary = Self {
            discovery_issues,
            excluded,
            halted: report.halted,
            project_still_exists: report.project_still_exists,
            ..Self::default()
        };
        for result in &report.results {
            summary.add_result(result);
        }
        summary
    }

    /// Add a result to the summary
    pub fn add_result(&mut self, result: &ExecutionResult) {
        self.per_kind
            .entry(result.descriptor.kind)
            .or_default()
            .add(result.outcome);
    }

    /// Counts for one kind; zero when nothing of that kind was touched.
    pub fn counts(&self, kind: ResourceKind) -> KindCounts {
        self.per_kind.get(&kind).copied().unwrap_or_default()
    }

    /// Counts across all kinds.
    pub fn totals(&self) -> KindCounts {
        self.per_kind.values().fold(KindCounts::default(), |mut acc, c| {
            acc.deleted += c.deleted;
            acc.created += c.created;
            acc.updated += c.updated;
            acc.already_absent += c.already_absent;
            acc.conflict_skipped += c.conflict_skipped;
            acc.blocked += c.blocked;
            acc.failed += c.failed;
            acc.would_run += c.would_run;
            acc.not_attempted += c.not_attempted;
            acc
        })
    }

    /// Discovery issues that fail the run (404s do not).
    pub fn failing_issues(&self) -> impl Iterator<Item = &DiscoveryIssue> {
        self.discovery_issues.iter().filter(|i| i.is_failure())
    }

    /// No Blocked, no Failed, no failing discovery issue, not cancelled,
    /// and a deleted project really is gone.
    #[must_use]
    pub fn is_success(&self) -> bool {
        let totals = self.totals();
        totals.blocked == 0
            && totals.failed == 0
            && self.failing_issues().next().is_none()
            && self.halted.is_none()
            && self.project_still_exists != Some(true)
    }

    /// Process exit code for this run.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.is_success())
    }
}
