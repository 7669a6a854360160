//! Callback traits and the confirmation policy.
//!
//! These traits let the engine report progress and suspend for operator
//! confirmation without depending on any terminal implementation.

use crate::error::Result;
use crate::planner::PlanStep;
use crate::types::{ActionKind, ExecutionResult};
use platform::ApiRequest;

/// When the engine suspends before a step to ask the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfirmPolicy {
    /// Before every step.
    Always,
    /// Never ask.
    #[default]
    Never,
    /// Only before destructive calls.
    OnDestructiveOnly,
}

impl ConfirmPolicy {
    /// Whether a step with `action` needs confirmation under this policy.
    #[must_use]
    pub fn requires_confirmation(&self, action: ActionKind) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::OnDestructiveOnly => action.is_destructive(),
        }
    }
}

/// Receives execution events in plan order.
pub trait ProgressCallback: Send {
    /// A dependency batch is about to run.
    fn on_batch_start(&mut self, index: usize, total: usize, steps: usize);

    /// Called before a step runs. `request` is the primary call it will
    /// issue, when known up front.
    fn on_step_start(&mut self, step: &PlanStep, request: Option<&ApiRequest>);

    /// Called when a step reaches a terminal result.
    fn on_step_complete(&mut self, result: &ExecutionResult);

    /// The batch at `index` has no steps left to run.
    fn on_batch_complete(&mut self, index: usize);
}

/// Asks the operator before a step runs.
pub trait ConfirmCallback: Send {
    /// `false` cancels the remainder of the run.
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// No-op progress callback
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_batch_start(&mut self, _index: usize, _total: usize, _steps: usize) {}
    fn on_step_start(&mut self, _step: &PlanStep, _request: Option<&ApiRequest>) {}
    fn on_step_complete(&mut self, _result: &ExecutionResult) {}
    fn on_batch_complete(&mut self, _index: usize) {}
}

/// Auto-confirm callback (always returns true)
pub struct AutoConfirm;

impl ConfirmCallback for AutoConfirm {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Auto-decline callback (always returns false)
pub struct AutoDecline;

impl ConfirmCallback for AutoDecline {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}
