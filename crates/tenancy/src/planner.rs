//! Dependency resolver - orders steps into dependency batches
//!
//! Steps carry explicit `depends_on` edges. Each step lands in the batch
//! one past the deepest of its prerequisites, so every prerequisite is in
//! an earlier batch and the project step is always alone in the last one.

use crate::error::{Error, Result};
use crate::types::{
    Action, META_APPLICATION, META_PROVIDER, MembershipVerdict, ResourceDescriptor, ResourceKind,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

/// Index of a step within its plan.
pub type StepId = usize;

/// One unit of work: a verified descriptor and what to do with it.
#[derive(Debug, Clone)]
pub struct PlanStep {
    pub id: StepId,
    pub verdict: MembershipVerdict,
    pub action: Action,
    pub depends_on: Vec<StepId>,
}

impl PlanStep {
    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.verdict.descriptor
    }

    /// e.g. "delete repository bookverse-npm-dev-local"
    #[must_use]
    pub fn description(&self) -> String {
        format!("{} {}", self.action.kind().verb(), self.descriptor())
    }
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.description())
    }
}

/// Ordered dependency batches, only ever containing verified descriptors.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub(crate) project_key: String,
    pub(crate) batches: Vec<Vec<PlanStep>>,
    /// Verdicts that were rejected and kept out of the plan.
    pub(crate) excluded: Vec<MembershipVerdict>,
}

impl ExecutionPlan {
    /// Create an empty plan for `project_key`.
    pub fn new(project_key: impl Into<String>) -> Self {
        Self {
            project_key: project_key.into(),
            ..Self::default()
        }
    }

    /// Level a flat list of steps into batches.
    ///
    /// Step ids must equal their index in `steps`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPlan` for unknown dependencies or cycles.
    pub fn from_steps(
        project_key: impl Into<String>,
        steps: Vec<PlanStep>,
        excluded: Vec<MembershipVerdict>,
    ) -> Result<Self> {
        let levels = levels(&steps)?;
        let depth = levels.iter().copied().max().map_or(0, |l| l + 1);
        let mut batches: Vec<Vec<PlanStep>> = vec![Vec::new(); depth];
        for (step, level) in steps.into_iter().zip(levels) {
            batches[level].push(step);
        }
        for batch in &mut batches {
            batch.sort_by(|a, b| {
                (a.descriptor().kind, a.descriptor().display_name(), a.id)
                    .cmp(&(b.descriptor().kind, b.descriptor().display_name(), b.id))
            });
        }

        let plan = Self {
            project_key: project_key.into(),
            batches,
            excluded,
        };
        plan.validate()?;
        Ok(plan)
    }

    pub fn project_key(&self) -> &str {
        &self.project_key
    }

    pub fn batches(&self) -> &[Vec<PlanStep>] {
        &self.batches
    }

    /// Every step, in execution order.
    pub fn steps(&self) -> impl Iterator<Item = &PlanStep> {
        self.batches.iter().flatten()
    }

    pub fn excluded(&self) -> &[MembershipVerdict] {
        &self.excluded
    }

    /// Total number of steps in the plan
    pub fn len(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of destructive calls the plan would issue.
    pub fn destructive_count(&self) -> usize {
        self.steps().filter(|s| s.action.is_destructive()).count()
    }

    /// Steps per kind, for previews.
    pub fn count_by_kind(&self) -> BTreeMap<ResourceKind, usize> {
        let mut counts = BTreeMap::new();
        for step in self.steps() {
            *counts.entry(step.descriptor().kind).or_insert(0) += 1;
        }
        counts
    }

    /// Check the structural guarantees of a plan.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPlan` if an unverified descriptor is present,
    /// a prerequisite is not in an earlier batch, or a project delete shares
    /// its batch with anything else or is followed by more work.
    pub fn validate(&self) -> Result<()> {
        let mut batch_of: HashMap<StepId, usize> = HashMap::new();
        for (index, batch) in self.batches.iter().enumerate() {
            for step in batch {
                if !step.verdict.verified {
                    return Err(Error::InvalidPlan(format!(
                        "{} is not verified",
                        step.descriptor()
                    )));
                }
                batch_of.insert(step.id, index);
            }
        }

        for (index, batch) in self.batches.iter().enumerate() {
            for step in batch {
                for dep in &step.depends_on {
                    match batch_of.get(dep) {
                        Some(dep_batch) if *dep_batch < index => {}
                        _ => {
                            return Err(Error::InvalidPlan(format!(
                                "{step} depends on step {dep} which does not precede it"
                            )));
                        }
                    }
                }

                let deletes_project = step.descriptor().kind == ResourceKind::Project
                    && step.action.is_destructive();
                if deletes_project && (batch.len() != 1 || index + 1 != self.batches.len()) {
                    return Err(Error::InvalidPlan(
                        "project deletion must run alone, after every other step".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Longest-path level of each step (Kahn's algorithm).
fn levels(steps: &[PlanStep]) -> Result<Vec<usize>> {
    let n = steps.len();
    let mut indegree = vec![0usize; n];
    let mut dependents: Vec<Vec<StepId>> = vec![Vec::new(); n];

    for (index, step) in steps.iter().enumerate() {
        if step.id != index {
            return Err(Error::InvalidPlan(format!(
                "step id {} at position {index}",
                step.id
            )));
        }
        for &dep in &step.depends_on {
            if dep >= n || dep == index {
                return Err(Error::InvalidPlan(format!(
                    "{step} has invalid dependency {dep}"
                )));
            }
            indegree[index] += 1;
            dependents[dep].push(index);
        }
    }

    let mut level = vec![0usize; n];
    let mut queue: VecDeque<StepId> = (0..n).filter(|&i| indegree[i] == 0).collect();
    let mut visited = 0;
    while let Some(current) = queue.pop_front() {
        visited += 1;
        for &next in &dependents[current] {
            level[next] = level[next].max(level[current] + 1);
            indegree[next] -= 1;
            if indegree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if visited != n {
        return Err(Error::InvalidPlan("dependency cycle".to_string()));
    }
    Ok(level)
}

fn push(
    steps: &mut Vec<PlanStep>,
    verdict: MembershipVerdict,
    action: Action,
    depends_on: Vec<StepId>,
) -> StepId {
    let id = steps.len();
    steps.push(PlanStep {
        id,
        verdict,
        action,
        depends_on,
    });
    id
}

/// Build a teardown plan from membership verdicts.
///
/// Unverified verdicts are excluded (and logged); they never reach a step.
///
/// Edges:
/// - stage: lifecycle detach, then delete
/// - application versions before their application
/// - application versions before stage deletion (releases pin stages)
/// - identity mappings before their integration
/// - member removal before role deletion
/// - everything before the project
///
/// # Errors
///
/// Returns `Error::InvalidPlan` if leveling fails.
pub fn build_plan(verdicts: Vec<MembershipVerdict>, project_key: &str) -> Result<ExecutionPlan> {
    let (verified, excluded): (Vec<_>, Vec<_>) =
        verdicts.into_iter().partition(|v| v.verified);
    for verdict in &excluded {
        if let Some(class) = verdict.failure_class() {
            log::warn!(
                "excluded {}: {} ({}, {class})",
                verdict.descriptor,
                verdict.reason,
                verdict.method
            );
        }
    }

    let mut steps: Vec<PlanStep> = Vec::new();
    let mut by_kind: BTreeMap<ResourceKind, Vec<MembershipVerdict>> = BTreeMap::new();
    for verdict in verified {
        by_kind.entry(verdict.descriptor.kind).or_default().push(verdict);
    }
    let mut take = |kind: ResourceKind| by_kind.remove(&kind).unwrap_or_default();

    // Leaves first.
    let mut version_steps: Vec<(String, StepId)> = Vec::new();
    for v in take(ResourceKind::ApplicationVersion) {
        let app = v.descriptor.meta(META_APPLICATION).unwrap_or_default().to_string();
        let id = push(&mut steps, v, Action::Delete, Vec::new());
        version_steps.push((app, id));
    }

    let mut mapping_steps: Vec<(String, StepId)> = Vec::new();
    for v in take(ResourceKind::IdentityMapping) {
        let provider = v.descriptor.meta(META_PROVIDER).unwrap_or_default().to_string();
        let id = push(&mut steps, v, Action::Delete, Vec::new());
        mapping_steps.push((provider, id));
    }

    let member_steps: Vec<StepId> = take(ResourceKind::User)
        .into_iter()
        .map(|v| push(&mut steps, v, Action::Delete, Vec::new()))
        .collect();

    for v in take(ResourceKind::Repository) {
        push(&mut steps, v, Action::Delete, Vec::new());
    }

    for v in take(ResourceKind::ProjectRole) {
        push(&mut steps, v, Action::Delete, member_steps.clone());
    }

    for v in take(ResourceKind::Application) {
        let deps = version_steps
            .iter()
            .filter(|(app, _)| *app == v.descriptor.key)
            .map(|(_, id)| *id)
            .collect();
        push(&mut steps, v, Action::Delete, deps);
    }

    for v in take(ResourceKind::IdentityIntegration) {
        let deps = mapping_steps
            .iter()
            .filter(|(provider, _)| *provider == v.descriptor.key)
            .map(|(_, id)| *id)
            .collect();
        push(&mut steps, v, Action::Delete, deps);
    }

    let all_versions: Vec<StepId> = version_steps.iter().map(|(_, id)| *id).collect();
    for v in take(ResourceKind::Stage) {
        let detach = push(&mut steps, v.clone(), Action::DetachFromLifecycle, Vec::new());
        let mut deps = vec![detach];
        deps.extend(&all_versions);
        push(&mut steps, v, Action::Delete, deps);
    }

    let projects = take(ResourceKind::Project);
    let others: Vec<StepId> = (0..steps.len()).collect();
    for v in projects {
        push(&mut steps, v, Action::Delete, others.clone());
    }

    ExecutionPlan::from_steps(project_key, steps, excluded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureClass;
    use crate::types::{Provenance, VerificationMethod};

    fn verdict(kind: ResourceKind, key: &str, verified: bool) -> MembershipVerdict {
        MembershipVerdict {
            descriptor: ResourceDescriptor::new(kind, key, Provenance::ProjectScoped),
            verified,
            method: VerificationMethod::ExactProjectField,
            reason: String::new(),
        }
    }

    fn batch_of(plan: &ExecutionPlan, kind: ResourceKind, key: &str, action: &Action) -> usize {
        plan.batches()
            .iter()
            .position(|b| {
                b.iter().any(|s| {
                    s.descriptor().kind == kind && s.descriptor().key == key && &s.action == action
                })
            })
            .unwrap()
    }

    #[test]
    fn test_empty_plan() {
        let plan = build_plan(Vec::new(), "bookverse").unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.batches().len(), 0);
    }

    #[test]
    fn test_unverified_excluded() {
        let plan = build_plan(
            vec![
                verdict(ResourceKind::Repository, "bookverse-npm", true),
                verdict(ResourceKind::Repository, "other-bookverse-prod", false),
            ],
            "bookverse",
        )
        .unwrap();
        assert_eq!(plan.len(), 1);
        assert!(plan.steps().all(|s| s.verdict.verified));
        assert_eq!(plan.excluded().len(), 1);
        assert_eq!(plan.excluded()[0].descriptor.key, "other-bookverse-prod");
        assert_eq!(
            plan.excluded()[0].failure_class(),
            Some(FailureClass::VerificationAmbiguous)
        );
        assert!(plan.steps().all(|s| s.verdict.failure_class().is_none()));
    }

    #[test]
    fn test_project_alone_in_last_batch() {
        let plan = build_plan(
            vec![
                verdict(ResourceKind::Project, "bookverse", true),
                verdict(ResourceKind::Repository, "bookverse-npm", true),
                verdict(ResourceKind::User, "alice", true),
            ],
            "bookverse",
        )
        .unwrap();
        let last = plan.batches().last().unwrap();
        assert_eq!(last.len(), 1);
        assert_eq!(last[0].descriptor().kind, ResourceKind::Project);
        plan.validate().unwrap();
    }

    #[test]
    fn test_versions_before_application() {
        let version = MembershipVerdict {
            descriptor: ResourceDescriptor::new(
                ResourceKind::ApplicationVersion,
                "1.0.0",
                Provenance::ProjectScoped,
            )
            .with_meta(META_APPLICATION, "bookverse-web"),
            verified: true,
            method: VerificationMethod::ExactProjectField,
            reason: String::new(),
        };
        let plan = build_plan(
            vec![
                verdict(ResourceKind::Application, "bookverse-web", true),
                version,
            ],
            "bookverse",
        )
        .unwrap();
        assert!(
            batch_of(&plan, ResourceKind::ApplicationVersion, "1.0.0", &Action::Delete)
                < batch_of(&plan, ResourceKind::Application, "bookverse-web", &Action::Delete)
        );
    }

    #[test]
    fn test_stage_detach_before_delete() {
        let plan = build_plan(
            vec![verdict(ResourceKind::Stage, "bookverse-DEV", true)],
            "bookverse",
        )
        .unwrap();
        assert_eq!(plan.len(), 2);
        assert!(
            batch_of(&plan, ResourceKind::Stage, "bookverse-DEV", &Action::DetachFromLifecycle)
                < batch_of(&plan, ResourceKind::Stage, "bookverse-DEV", &Action::Delete)
        );
        assert_eq!(plan.destructive_count(), 1);
        assert_eq!(plan.count_by_kind().get(&ResourceKind::Stage), Some(&2));
    }

    #[test]
    fn test_mapping_before_its_integration_only() {
        let mapping = |provider: &str| MembershipVerdict {
            descriptor: ResourceDescriptor::new(
                ResourceKind::IdentityMapping,
                "ci",
                Provenance::ProjectScoped,
            )
            .with_meta(META_PROVIDER, provider),
            verified: true,
            method: VerificationMethod::ExactProjectField,
            reason: String::new(),
        };
        let plan = build_plan(
            vec![
                mapping("github-a"),
                verdict(ResourceKind::IdentityIntegration, "github-a", true),
                verdict(ResourceKind::IdentityIntegration, "github-b", true),
            ],
            "bookverse",
        )
        .unwrap();
        assert_eq!(
            batch_of(&plan, ResourceKind::IdentityIntegration, "github-a", &Action::Delete),
            1
        );
        assert_eq!(
            batch_of(&plan, ResourceKind::IdentityIntegration, "github-b", &Action::Delete),
            0
        );
    }

    #[test]
    fn test_cycle_rejected() {
        let steps = vec![
            PlanStep {
                id: 0,
                verdict: verdict(ResourceKind::Repository, "a", true),
                action: Action::Delete,
                depends_on: vec![1],
            },
            PlanStep {
                id: 1,
                verdict: verdict(ResourceKind::Repository, "b", true),
                action: Action::Delete,
                depends_on: vec![0],
            },
        ];
        let err = ExecutionPlan::from_steps("bookverse", steps, Vec::new()).unwrap_err();
        assert!(matches!(err, Error::InvalidPlan(_)));
    }

    #[test]
    fn test_validate_rejects_unverified_step() {
        let steps = vec![PlanStep {
            id: 0,
            verdict: verdict(ResourceKind::Repository, "a", false),
            action: Action::Delete,
            depends_on: Vec::new(),
        }];
        assert!(ExecutionPlan::from_steps("bookverse", steps, Vec::new()).is_err());
    }
}
