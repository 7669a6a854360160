//! # tenancy
//!
//! Project-scoped resource lifecycle: discover what a tenant owns, verify
//! membership authoritatively, order work by dependency, and execute it
//! idempotently without ever touching another tenant's resources.
//!
//! ## Pipeline
//!
//! - **Discovery** ([`discover`], [`discover_all`]): lists each
//!   [`ResourceKind`] with the most specific filter available. A failed
//!   listing is an empty set plus an issue, never a broader query.
//! - **Verification** ([`verify`]): a descriptor belongs to the project only
//!   when its own record names the project. Everything else is excluded.
//! - **Planning** ([`build_plan`]): dependency batches; versions before
//!   applications, mappings before integrations, lifecycle detach before
//!   stage delete, the project alone and last.
//! - **Execution** ([`execute`]): batch by batch with status
//!   classification, fail-fast on 401/403, and no retries.
//!
//! ## Example
//!
//! ```
//! use platform::MockPlatform;
//! use tenancy::{ExecuteOptions, execute_simple, plan_teardown};
//!
//! let api = MockPlatform::new();
//! let teardown = plan_teardown(&api, "bookverse", &[]).unwrap();
//! let report = execute_simple(&api, &teardown.plan, &ExecuteOptions::dry_run()).unwrap();
//! assert!(report.results.is_empty());
//! assert!(api.mutation_calls().is_empty());
//! ```
//!
//! ## Callbacks
//!
//! - [`ProgressCallback`]: receives batch and step events
//! - [`ConfirmCallback`]: the suspension point before a step, driven by
//!   a [`ConfirmPolicy`]
//!
//! Neither is needed for correctness.

pub mod context;
pub mod discovery;
pub mod endpoints;
pub mod error;
pub mod executor;
pub mod planner;
pub mod provision;
pub mod stage;
pub mod summary;
pub mod teardown;
pub mod types;
pub mod verify;

pub use context::{AutoConfirm, AutoDecline, ConfirmCallback, ConfirmPolicy, NoProgress, ProgressCallback};
pub use discovery::{DiscoveryIssue, DiscoveryReport, discover, discover_all};
pub use error::{Error, FailureClass, Result};
pub use executor::{
    ExecuteOptions, HaltReason, Mode, RunReport, classify_create, classify_delete, execute,
    execute_simple, step_request,
};
pub use planner::{ExecutionPlan, PlanStep, StepId, build_plan};
pub use provision::ProvisionManifest;
pub use stage::{StageState, StageTracker};
pub use summary::RunSummary;
pub use teardown::{TeardownPlan, expand_scope, plan_teardown};
pub use types::{
    Action, ActionKind, ExecutionResult, KindCounts, MembershipVerdict, Outcome, Provenance,
    ResourceDescriptor, ResourceKind, VerificationMethod,
};
pub use verify::{verify, verify_all};
