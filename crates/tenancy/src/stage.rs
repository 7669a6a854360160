//! Stage lifecycle sub-protocol
//!
//! A stage moves `InLifecycle -> RemovedFromLifecycle -> Deleted`. The
//! first transition is a lifecycle patch whose effect must be observed by
//! re-reading the promotion path; only then may the stage be deleted.

use crate::discovery::fetch_lifecycle;
use crate::endpoints;
use crate::error::FailureClass;
use crate::executor::Attempt;
use crate::types::Outcome;
use platform::PlatformApi;
use std::collections::HashMap;
use std::fmt;

/// Where a stage is in its removal protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageState {
    InLifecycle,
    RemovedFromLifecycle,
    Deleted,
}

impl StageState {
    /// Whether `self -> next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::InLifecycle, Self::RemovedFromLifecycle)
                | (Self::RemovedFromLifecycle, Self::Deleted)
        )
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InLifecycle => "in lifecycle",
            Self::RemovedFromLifecycle => "removed from lifecycle",
            Self::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Observed state of every stage touched in a run.
///
/// Stages start `InLifecycle` until a detach is observed.
#[derive(Debug, Default)]
pub struct StageTracker {
    states: HashMap<String, StageState>,
}

impl StageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, stage: &str) -> StageState {
        self.states
            .get(stage)
            .copied()
            .unwrap_or(StageState::InLifecycle)
    }

    /// Record a transition. Returns `false` (and records nothing) if the
    /// transition is illegal.
    pub fn advance(&mut self, stage: &str, next: StageState) -> bool {
        let current = self.state(stage);
        if !current.can_transition_to(next) {
            log::warn!("stage '{stage}': refusing transition {current} -> {next}");
            return false;
        }
        self.states.insert(stage.to_string(), next);
        true
    }

    /// Only a stage observed out of the lifecycle may be deleted.
    pub fn may_delete(&self, stage: &str) -> bool {
        self.state(stage) == StageState::RemovedFromLifecycle
    }
}

fn classify_read(status: Option<u16>, class: FailureClass, detail: String) -> Attempt {
    let outcome = match class {
        FailureClass::AuthFailure => Outcome::Blocked,
        _ => Outcome::Failed,
    };
    Attempt {
        outcome,
        http_status: status,
        detail,
    }
}

/// Patch the promotion path to exclude `stage`, then observe the result.
///
/// A project without a lifecycle, or a lifecycle that already excludes the
/// stage, counts as already removed.
pub(crate) fn detach(api: &dyn PlatformApi, project_key: &str, stage: &str) -> Attempt {
    let current = match fetch_lifecycle(api, project_key) {
        Ok(lifecycle) => lifecycle.promote_stages,
        Err(issue) if issue.class == FailureClass::NotFound => {
            return Attempt::new(Outcome::AlreadyAbsent, issue.status, "no lifecycle");
        }
        Err(issue) => return classify_read(issue.status, issue.class, issue.message),
    };

    if !current.iter().any(|s| s == stage) {
        return Attempt::new(Outcome::AlreadyAbsent, Some(200), "not in promotion path");
    }

    let remaining: Vec<String> = current.into_iter().filter(|s| s != stage).collect();
    let request = endpoints::patch_lifecycle(project_key, &remaining);
    let response = match api.send(&request) {
        Ok(response) => response,
        Err(e) => return Attempt::new(Outcome::Failed, None, e.to_string()),
    };
    match FailureClass::from_status(response.status) {
        None => {}
        Some(FailureClass::AuthFailure) => {
            return Attempt::new(Outcome::Blocked, Some(response.status), "lifecycle patch rejected");
        }
        Some(class) => {
            return Attempt::new(
                Outcome::Failed,
                Some(response.status),
                format!("lifecycle patch: {class} {}", response.body_excerpt()),
            );
        }
    }

    // Observe, do not assume.
    match fetch_lifecycle(api, project_key) {
        Ok(after) if after.promote_stages.iter().any(|s| s == stage) => Attempt::new(
            Outcome::Failed,
            Some(response.status),
            "stage still in promotion path after patch",
        ),
        Ok(_) => Attempt::new(
            Outcome::Updated,
            Some(response.status),
            "removed from promotion path",
        ),
        Err(issue) => classify_read(
            issue.status,
            issue.class,
            format!("could not observe patch: {}", issue.message),
        ),
    }
}

/// Append `stage` to the promotion path.
pub(crate) fn attach(api: &dyn PlatformApi, project_key: &str, stage: &str) -> Attempt {
    let mut current = match fetch_lifecycle(api, project_key) {
        Ok(lifecycle) => lifecycle.promote_stages,
        Err(issue) => return classify_read(issue.status, issue.class, issue.message),
    };

    if current.iter().any(|s| s == stage) {
        return Attempt::new(
            Outcome::ConflictSkipped,
            Some(200),
            "already in promotion path",
        );
    }

    current.push(stage.to_string());
    let request = endpoints::patch_lifecycle(project_key, &current);
    match api.send(&request) {
        Ok(response) => match FailureClass::from_status(response.status) {
            None => Attempt::new(Outcome::Updated, Some(response.status), "added to promotion path"),
            Some(FailureClass::AuthFailure) => {
                Attempt::new(Outcome::Blocked, Some(response.status), "lifecycle patch rejected")
            }
            Some(class) => Attempt::new(
                Outcome::Failed,
                Some(response.status),
                format!("lifecycle patch: {class} {}", response.body_excerpt()),
            ),
        },
        Err(e) => Attempt::new(Outcome::Failed, None, e.to_string()),
    }
}
