//! Execution engine - runs a plan batch by batch
//!
//! Batches run strictly in order and each step reaches a terminal
//! [`Outcome`] before the next batch begins. Nothing is retried: a
//! timeout or transport error is `Failed`.

use crate::context::{ConfirmCallback, ConfirmPolicy, ProgressCallback};
use crate::endpoints;
use crate::error::{FailureClass, Result};
use crate::planner::{ExecutionPlan, PlanStep, StepId};
use crate::stage::{self, StageState, StageTracker};
use crate::types::{Action, ActionKind, ExecutionResult, Outcome, ResourceKind};
use platform::{ApiRequest, PlatformApi};
use std::collections::HashMap;
use std::fmt;

/// Whether calls are issued or only simulated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Apply,
    DryRun,
}

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    pub mode: Mode,
    /// When to suspend for operator confirmation.
    pub confirm: ConfirmPolicy,
    /// After a project delete, re-read the project and record whether it is gone.
    pub verify_project_removed: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Apply,
            confirm: ConfirmPolicy::Never,
            verify_project_removed: true,
        }
    }
}

impl ExecuteOptions {
    pub fn dry_run() -> Self {
        Self {
            mode: Mode::DryRun,
            ..Self::default()
        }
    }
}

/// Why a run stopped before the end of its plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// A 401/403 was returned.
    AuthFailure,
    /// The operator declined a confirmation.
    Cancelled,
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AuthFailure => f.write_str("halted after authentication/authorization failure"),
            Self::Cancelled => f.write_str("cancelled by operator"),
        }
    }
}

/// Every result of a run, in execution order.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub results: Vec<ExecutionResult>,
    pub halted: Option<HaltReason>,
    /// `Some(false)` only when the post-run project read answered 404.
    pub project_still_exists: Option<bool>,
}

/// Outcome of one interaction before it is attached to a descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Attempt {
    pub outcome: Outcome,
    pub http_status: Option<u16>,
    pub detail: String,
}

impl Attempt {
    pub(crate) fn new(outcome: Outcome, http_status: Option<u16>, detail: impl Into<String>) -> Self {
        Self {
            outcome,
            http_status,
            detail: detail.into(),
        }
    }

    fn into_result(self, step: &PlanStep) -> ExecutionResult {
        ExecutionResult {
            descriptor: step.descriptor().clone(),
            action: step.action.kind(),
            outcome: self.outcome,
            http_status: self.http_status,
            detail: self.detail,
        }
    }
}

/// Map a status to the outcome of a destructive call.
#[must_use]
pub fn classify_delete(status: u16) -> Outcome {
    match FailureClass::from_status(status) {
        None => Outcome::Deleted,
        Some(FailureClass::NotFound) => Outcome::AlreadyAbsent,
        Some(FailureClass::Conflict) => Outcome::ConflictSkipped,
        Some(FailureClass::AuthFailure) => Outcome::Blocked,
        Some(_) => Outcome::Failed,
    }
}

/// Map a status to the outcome of a constructive call.
///
/// 404 means a parent is missing and is a failure here.
#[must_use]
pub fn classify_create(status: u16) -> Outcome {
    match FailureClass::from_status(status) {
        None => Outcome::Created,
        Some(FailureClass::Conflict) => Outcome::ConflictSkipped,
        Some(FailureClass::AuthFailure) => Outcome::Blocked,
        Some(_) => Outcome::Failed,
    }
}

/// The primary call a step issues, when it is known before running.
///
/// Lifecycle steps read before they write, so they have none.
#[must_use]
pub fn step_request(step: &PlanStep, project_key: &str) -> Option<ApiRequest> {
    match &step.action {
        Action::Delete => endpoints::delete_request(step.descriptor(), project_key),
        Action::Create { body } => endpoints::create_request(step.descriptor(), body, project_key),
        Action::DetachFromLifecycle | Action::AttachToLifecycle => None,
    }
}

/// Execute a plan with the given options and callbacks
///
/// Returns every step's result; a halted run reports the rest as
/// `NotAttempted`. `Err` is reserved for a confirmation prompt that
/// could not be shown.
///
/// # Errors
///
/// Returns `Error::Prompt` if the confirmation callback fails.
pub fn execute<P, C>(
    api: &dyn PlatformApi,
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
    progress: &mut P,
    confirm: &mut C,
) -> Result<RunReport>
where
    P: ProgressCallback + ?Sized,
    C: ConfirmCallback + ?Sized,
{
    let mut report = RunReport::default();
    let mut outcomes: HashMap<StepId, Outcome> = HashMap::new();
    let mut stages = StageTracker::new();
    let total = plan.batches().len();
    let project_key = plan.project_key();

    for (index, batch) in plan.batches().iter().enumerate() {
        progress.on_batch_start(index, total, batch.len());

        for step in batch {
            let request = step_request(step, project_key);
            progress.on_step_start(step, request.as_ref());

            let attempt = if let Some(reason) = report.halted {
                Attempt::new(Outcome::NotAttempted, None, reason.to_string())
            } else if let Some(dep) = uncleared_dependency(step, &outcomes) {
                Attempt::new(
                    Outcome::NotAttempted,
                    None,
                    format!("prerequisite step {dep} did not clear"),
                )
            } else {
                match gate(step, opts, confirm)? {
                    Gate::Proceed => run_step(api, step, request, project_key, opts, &mut stages),
                    Gate::Declined => {
                        report.halted = Some(HaltReason::Cancelled);
                        Attempt::new(Outcome::NotAttempted, None, "declined by operator")
                    }
                }
            };

            if attempt.outcome == Outcome::Blocked && report.halted.is_none() {
                log::error!("{step}: {} - halting remaining plan", attempt.detail);
                report.halted = Some(HaltReason::AuthFailure);
            }

            let result = attempt.into_result(step);
            log::info!("{step}: {}", result.outcome);
            outcomes.insert(step.id, result.outcome);
            progress.on_step_complete(&result);
            report.results.push(result);
        }

        progress.on_batch_complete(index);
    }

    // Nothing is sent after a fail-fast halt.
    if opts.verify_project_removed
        && opts.mode == Mode::Apply
        && report.halted != Some(HaltReason::AuthFailure)
    {
        report.project_still_exists = verify_project_removed(api, plan, &outcomes);
    }

    Ok(report)
}

/// Simple execution without callbacks
///
/// No progress reporting and no confirmation.
///
/// # Errors
///
/// Never fails in practice; see [`execute`].
pub fn execute_simple(
    api: &dyn PlatformApi,
    plan: &ExecutionPlan,
    opts: &ExecuteOptions,
) -> Result<RunReport> {
    use crate::context::{AutoConfirm, NoProgress};

    execute(api, plan, opts, &mut NoProgress, &mut AutoConfirm)
}

fn uncleared_dependency(step: &PlanStep, outcomes: &HashMap<StepId, Outcome>) -> Option<StepId> {
    step.depends_on
        .iter()
        .copied()
        .find(|dep| !outcomes.get(dep).is_some_and(Outcome::is_cleared))
}

enum Gate {
    Proceed,
    Declined,
}

/// Suspension point between plan and call.
fn gate<C: ConfirmCallback + ?Sized>(
    step: &PlanStep,
    opts: &ExecuteOptions,
    confirm: &mut C,
) -> Result<Gate> {
    if opts.mode == Mode::DryRun || !opts.confirm.requires_confirmation(step.action.kind()) {
        return Ok(Gate::Proceed);
    }
    if confirm.confirm(&format!("{}?", step.description()))? {
        Ok(Gate::Proceed)
    } else {
        log::warn!("operator declined: {step}");
        Ok(Gate::Declined)
    }
}

fn run_step(
    api: &dyn PlatformApi,
    step: &PlanStep,
    request: Option<ApiRequest>,
    project_key: &str,
    opts: &ExecuteOptions,
    stages: &mut StageTracker,
) -> Attempt {
    // Re-assert membership at the last moment before any call.
    if !step.verdict.verified {
        log::error!("refusing {step}: membership not verified");
        return Attempt::new(Outcome::Failed, None, "refused: membership not verified");
    }

    let action = step.action.kind();
    let descriptor = step.descriptor();
    let is_stage = descriptor.kind == ResourceKind::Stage;

    if opts.mode == Mode::DryRun {
        let detail = match &request {
            Some(req) => format!("would {action}: {req}"),
            None => format!("would {action}"),
        };
        return Attempt::new(Outcome::WouldRun, None, detail);
    }

    match action {
        ActionKind::DetachFromLifecycle => {
            let attempt = stage::detach(api, project_key, &descriptor.key);
            if attempt.outcome.is_cleared() {
                stages.advance(&descriptor.key, StageState::RemovedFromLifecycle);
            }
            attempt
        }
        ActionKind::AttachToLifecycle => stage::attach(api, project_key, &descriptor.key),
        ActionKind::Delete | ActionKind::Create => {
            let Some(request) = request else {
                return Attempt::new(
                    Outcome::Failed,
                    None,
                    format!("cannot {action} {descriptor}: missing metadata"),
                );
            };
            if is_stage && action == ActionKind::Delete && !stages.may_delete(&descriptor.key) {
                return Attempt::new(
                    Outcome::NotAttempted,
                    None,
                    format!("stage is {}", stages.state(&descriptor.key)),
                );
            }

            let attempt = send(api, &request, action);
            if is_stage && action == ActionKind::Delete && attempt.outcome.is_cleared() {
                stages.advance(&descriptor.key, StageState::Deleted);
            }
            attempt
        }
    }
}

fn send(api: &dyn PlatformApi, request: &ApiRequest, action: ActionKind) -> Attempt {
    match api.send(request) {
        Ok(response) => {
            let outcome = if action == ActionKind::Create {
                classify_create(response.status)
            } else {
                classify_delete(response.status)
            };
            let detail = if outcome.is_failure() {
                format!("{request}: HTTP {} {}", response.status, response.body_excerpt())
            } else {
                format!("{request}: HTTP {}", response.status)
            };
            Attempt::new(outcome, Some(response.status), detail)
        }
        Err(e) => Attempt::new(Outcome::Failed, None, e.to_string()),
    }
}

/// Read the project back after its delete was attempted.
fn verify_project_removed(
    api: &dyn PlatformApi,
    plan: &ExecutionPlan,
    outcomes: &HashMap<StepId, Outcome>,
) -> Option<bool> {
    let attempted = plan.steps().any(|s| {
        s.descriptor().kind == ResourceKind::Project
            && s.action.is_destructive()
            && outcomes
                .get(&s.id)
                .is_some_and(|o| *o != Outcome::NotAttempted)
    });
    if !attempted {
        return None;
    }

    let request = endpoints::get_project(plan.project_key());
    match api.send(&request) {
        Ok(response) if response.status == 404 => {
            log::info!("project '{}' no longer exists", plan.project_key());
            Some(false)
        }
        Ok(response) => {
            log::warn!(
                "project '{}' still answers HTTP {}",
                plan.project_key(),
                response.status
            );
            Some(true)
        }
        Err(e) => {
            log::warn!("could not verify project removal: {e}");
            Some(true)
        }
    }
}
