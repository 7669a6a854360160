//! Core types: resource descriptors, verdicts, actions, outcomes

use crate::error::FailureClass;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Metadata key: owning application of an application version.
pub const META_APPLICATION: &str = "application";
/// Metadata key: OIDC provider an identity mapping belongs to.
pub const META_PROVIDER: &str = "provider";
/// Metadata key: "true"/"false" when a stage's lifecycle membership was known at discovery.
pub const META_IN_LIFECYCLE: &str = "in_lifecycle";
/// Metadata key: package type of a repository.
pub const META_PACKAGE_TYPE: &str = "package_type";

/// Category of platform object.
///
/// Declaration order is the display order used in summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Project,
    Stage,
    Repository,
    User,
    ProjectRole,
    Application,
    ApplicationVersion,
    IdentityIntegration,
    IdentityMapping,
}

impl ResourceKind {
    /// Every kind, leaf-agnostic declaration order.
    pub const ALL: [ResourceKind; 9] = [
        Self::Project,
        Self::Stage,
        Self::Repository,
        Self::User,
        Self::ProjectRole,
        Self::Application,
        Self::ApplicationVersion,
        Self::IdentityIntegration,
        Self::IdentityMapping,
    ];

    /// Name used on the command line (`--scope`).
    #[must_use]
    pub fn cli_name(&self) -> &'static str {
        match self {
            Self::Project => "projects",
            Self::Stage => "stages",
            Self::Repository => "repositories",
            Self::User => "users",
            Self::ProjectRole => "roles",
            Self::Application => "applications",
            Self::ApplicationVersion => "versions",
            Self::IdentityIntegration => "oidc",
            Self::IdentityMapping => "mappings",
        }
    }

    /// Kinds whose resources must be gone before one of this kind can be
    /// deleted. The project depends on everything.
    #[must_use]
    pub fn prerequisites(&self) -> &'static [ResourceKind] {
        match self {
            Self::Project => &Self::ALL,
            Self::Application => &[Self::ApplicationVersion],
            Self::IdentityIntegration => &[Self::IdentityMapping],
            Self::ProjectRole => &[Self::User],
            Self::Stage
            | Self::Repository
            | Self::User
            | Self::ApplicationVersion
            | Self::IdentityMapping => &[],
        }
    }

    /// Human-readable singular label.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Stage => "stage",
            Self::Repository => "repository",
            Self::User => "user",
            Self::ProjectRole => "project role",
            Self::Application => "application",
            Self::ApplicationVersion => "application version",
            Self::IdentityIntegration => "identity integration",
            Self::IdentityMapping => "identity mapping",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "projects" | "project" => Self::Project,
            "stages" | "stage" => Self::Stage,
            "repositories" | "repository" | "repos" => Self::Repository,
            "users" | "user" | "members" => Self::User,
            "roles" | "role" => Self::ProjectRole,
            "applications" | "application" | "apps" => Self::Application,
            "versions" | "version" | "application-versions" => Self::ApplicationVersion,
            "oidc" | "integrations" | "identity-integrations" => Self::IdentityIntegration,
            "mappings" | "identity-mappings" => Self::IdentityMapping,
            other => {
                let valid: Vec<_> = Self::ALL.iter().map(ResourceKind::cli_name).collect();
                return Err(format!(
                    "unknown resource kind '{other}' (expected one of: {})",
                    valid.join(", ")
                ));
            }
        };
        Ok(kind)
    }
}

/// Which query produced a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Provenance {
    /// A project-scoped endpoint (or a project-scoped manifest).
    ProjectScoped,
    /// A global listing with no project filter.
    Unfiltered,
}

/// One candidate unit of work.
///
/// Created by discovery (or the provisioning manifest) and never mutated
/// after construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    /// Opaque external identifier (repository key, stage name, version string, ...).
    pub key: String,
    /// Owning project as stated by the resource's own record, if it states one.
    pub declared_project_key: Option<String>,
    pub provenance: Provenance,
    pub metadata: BTreeMap<String, String>,
}

impl ResourceDescriptor {
    pub fn new(kind: ResourceKind, key: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            kind,
            key: key.into(),
            declared_project_key: None,
            provenance,
            metadata: BTreeMap::new(),
        }
    }

    /// Set the declared owning project.
    pub fn declared(mut self, project_key: Option<String>) -> Self {
        self.declared_project_key = project_key;
        self
    }

    /// Add a metadata entry.
    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Name shown to operators: `app@version` for versions, `provider/name` for mappings.
    #[must_use]
    pub fn display_name(&self) -> String {
        match self.kind {
            ResourceKind::ApplicationVersion => match self.meta(META_APPLICATION) {
                Some(app) => format!("{app}@{}", self.key),
                None => self.key.clone(),
            },
            ResourceKind::IdentityMapping => match self.meta(META_PROVIDER) {
                Some(provider) => format!("{provider}/{}", self.key),
                None => self.key.clone(),
            },
            _ => self.key.clone(),
        }
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.display_name())
    }
}

/// How a membership decision was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationMethod {
    /// The resource's own record names its project; compared for exact equality.
    ExactProjectField,
    /// No authoritative field; always excluded.
    Unverifiable,
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExactProjectField => f.write_str("exact-project-field"),
            Self::Unverifiable => f.write_str("unverifiable"),
        }
    }
}

/// The authoritative yes/no decision for one descriptor.
///
/// `verified == false` is terminal for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipVerdict {
    pub descriptor: ResourceDescriptor,
    pub verified: bool,
    pub method: VerificationMethod,
    pub reason: String,
}

impl MembershipVerdict {
    /// `VerificationAmbiguous` for an excluded descriptor; never fatal.
    #[must_use]
    pub fn failure_class(&self) -> Option<FailureClass> {
        (!self.verified).then_some(FailureClass::VerificationAmbiguous)
    }
}

/// What the engine does with a planned descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Destructive call.
    Delete,
    /// Patch the promotion path to exclude a stage.
    DetachFromLifecycle,
    /// Constructive call with its payload.
    Create { body: serde_json::Value },
    /// Patch the promotion path to include a stage.
    AttachToLifecycle,
}

/// Payload-free discriminant of [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    Delete,
    DetachFromLifecycle,
    Create,
    AttachToLifecycle,
}

impl Action {
    #[must_use]
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Delete => ActionKind::Delete,
            Self::DetachFromLifecycle => ActionKind::DetachFromLifecycle,
            Self::Create { .. } => ActionKind::Create,
            Self::AttachToLifecycle => ActionKind::AttachToLifecycle,
        }
    }

    /// Whether the action destroys platform state.
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        self.kind().is_destructive()
    }
}

impl ActionKind {
    #[must_use]
    pub fn is_destructive(&self) -> bool {
        matches!(self, Self::Delete)
    }

    #[must_use]
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::DetachFromLifecycle => "remove from lifecycle",
            Self::Create => "create",
            Self::AttachToLifecycle => "add to lifecycle",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

/// Terminal result of one planned step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Deleted,
    Created,
    /// A lifecycle patch was applied and its effect observed.
    Updated,
    /// 404, or the target state already held.
    AlreadyAbsent,
    /// 409: already exists or already in target state.
    ConflictSkipped,
    /// 401/403: the run halts.
    Blocked,
    Failed,
    /// Dry-run synthetic result.
    WouldRun,
    /// Halted, cancelled, or a prerequisite did not clear.
    NotAttempted,
}

impl Outcome {
    /// Whether dependents of this step may proceed.
    #[must_use]
    pub fn is_cleared(&self) -> bool {
        matches!(
            self,
            Self::Deleted
                | Self::Created
                | Self::Updated
                | Self::AlreadyAbsent
                | Self::ConflictSkipped
                | Self::WouldRun
        )
    }

    /// Whether this outcome makes the run unsuccessful.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Blocked | Self::Failed)
    }

    #[must_use]
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Deleted | Self::Created | Self::Updated => "✓",
            Self::AlreadyAbsent | Self::ConflictSkipped => "○",
            Self::Blocked | Self::Failed => "✗",
            Self::WouldRun => "→",
            Self::NotAttempted => "⊘",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Deleted => "deleted",
            Self::Created => "created",
            Self::Updated => "updated",
            Self::AlreadyAbsent => "already absent",
            Self::ConflictSkipped => "conflict (skipped)",
            Self::Blocked => "blocked",
            Self::Failed => "failed",
            Self::WouldRun => "would run",
            Self::NotAttempted => "not attempted",
        };
        f.write_str(s)
    }
}

/// Result of executing (or simulating) one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub descriptor: ResourceDescriptor,
    pub action: ActionKind,
    pub outcome: Outcome,
    pub http_status: Option<u16>,
    pub detail: String,
}

/// Per-kind outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindCounts {
    pub deleted: usize,
    pub created: usize,
    pub updated: usize,
    pub already_absent: usize,
    pub conflict_skipped: usize,
    pub blocked: usize,
    pub failed: usize,
    pub would_run: usize,
    pub not_attempted: usize,
}

impl KindCounts {
    pub fn add(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Deleted => self.deleted += 1,
            Outcome::Created => self.created += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::AlreadyAbsent => self.already_absent += 1,
            Outcome::ConflictSkipped => self.conflict_skipped += 1,
            Outcome::Blocked => self.blocked += 1,
            Outcome::Failed => self.failed += 1,
            Outcome::WouldRun => self.would_run += 1,
            Outcome::NotAttempted => self.not_attempted += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.deleted
            + self.created
            + self.updated
            + self.already_absent
            + self.conflict_skipped
            + self.blocked
            + self.failed
            + self.would_run
            + self.not_attempted
    }
}
