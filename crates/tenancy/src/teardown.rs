//! Discovery -> verification -> planning for a project teardown.

use crate::discovery::{DiscoveryIssue, DiscoveryReport, discover_all};
use crate::error::Result;
use crate::planner::{ExecutionPlan, build_plan};
use crate::types::{MembershipVerdict, ResourceKind};
use crate::verify::verify_all;
use platform::PlatformApi;
use std::collections::BTreeSet;

/// Everything known before the first mutation.
#[derive(Debug, Clone)]
pub struct TeardownPlan {
    pub reports: Vec<DiscoveryReport>,
    pub verdicts: Vec<MembershipVerdict>,
    pub plan: ExecutionPlan,
}

impl TeardownPlan {
    /// Issues from every discovery report, in kind order.
    pub fn issues(&self) -> Vec<DiscoveryIssue> {
        self.reports
            .iter()
            .flat_map(|r| r.issues.iter().cloned())
            .collect()
    }

    pub fn verified(&self) -> impl Iterator<Item = &MembershipVerdict> {
        self.verdicts.iter().filter(|v| v.verified)
    }

    pub fn rejected(&self) -> impl Iterator<Item = &MembershipVerdict> {
        self.verdicts.iter().filter(|v| !v.verified)
    }
}

/// The kinds to discover for a requested scope: every kind when empty,
/// otherwise the requested kinds plus everything they depend on.
///
/// A parent is never planned without its children having been listed.
#[must_use]
pub fn expand_scope(kinds: &[ResourceKind]) -> Vec<ResourceKind> {
    if kinds.is_empty() {
        return ResourceKind::ALL.to_vec();
    }
    let mut expanded: BTreeSet<ResourceKind> = BTreeSet::new();
    let mut pending: Vec<ResourceKind> = kinds.to_vec();
    while let Some(kind) = pending.pop() {
        if expanded.insert(kind) {
            pending.extend_from_slice(kind.prerequisites());
        }
    }

    let added: Vec<_> = expanded
        .iter()
        .filter(|k| !kinds.contains(k))
        .map(ResourceKind::cli_name)
        .collect();
    if !added.is_empty() {
        log::info!("scope widened with prerequisites: {}", added.join(", "));
    }
    expanded.into_iter().collect()
}

/// Discover `kinds` and their prerequisites (all kinds when empty), verify
/// every descriptor, and order the verified ones into a plan.
///
/// # Errors
///
/// Returns `Error::AuthFailure` if discovery was rejected with 401/403, or
/// `Error::InvalidPlan` if the plan cannot be leveled.
pub fn plan_teardown(
    api: &dyn PlatformApi,
    project_key: &str,
    kinds: &[ResourceKind],
) -> Result<TeardownPlan> {
    let kinds = expand_scope(kinds);

    let reports = discover_all(api, &kinds, project_key)?;
    let descriptors: Vec<_> = reports
        .iter()
        .flat_map(|r| r.descriptors.iter().cloned())
        .collect();
    let verdicts = verify_all(&descriptors, project_key);
    let plan = build_plan(verdicts.clone(), project_key)?;

    log::info!(
        "plan for '{project_key}': {} step(s) in {} batch(es), {} excluded",
        plan.len(),
        plan.batches().len(),
        plan.excluded().len()
    );

    Ok(TeardownPlan {
        reports,
        verdicts,
        plan,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::{Method, MockPlatform};
    use serde_json::json;

    #[test]
    fn test_scope_limits_discovery() {
        let mock = MockPlatform::new();
        mock.on_json(
            Method::Get,
            "/access/api/v1/projects/bookverse/users",
            200,
            &json!({"members": [{"name": "alice"}]}),
        );
        let teardown = plan_teardown(&mock, "bookverse", &[ResourceKind::User]).unwrap();
        assert_eq!(teardown.plan.len(), 1);
        assert_eq!(mock.calls().len(), 1);
        assert!(teardown.issues().is_empty());
    }

    #[test]
    fn test_expand_scope_adds_prerequisites() {
        assert_eq!(
            expand_scope(&[ResourceKind::Application]),
            vec![ResourceKind::Application, ResourceKind::ApplicationVersion]
        );
        assert_eq!(
            expand_scope(&[ResourceKind::IdentityIntegration]),
            vec![ResourceKind::IdentityIntegration, ResourceKind::IdentityMapping]
        );
        assert_eq!(
            expand_scope(&[ResourceKind::ProjectRole]),
            vec![ResourceKind::User, ResourceKind::ProjectRole]
        );
        assert_eq!(expand_scope(&[ResourceKind::Project]), ResourceKind::ALL.to_vec());
        assert_eq!(
            expand_scope(&[ResourceKind::Repository, ResourceKind::Repository]),
            vec![ResourceKind::Repository]
        );
        assert_eq!(expand_scope(&[]), ResourceKind::ALL.to_vec());
    }

    #[test]
    fn test_unscoped_discovers_every_kind() {
        let mock = MockPlatform::new();
        let teardown = plan_teardown(&mock, "bookverse", &[]).unwrap();
        assert_eq!(teardown.reports.len(), ResourceKind::ALL.len());
        assert!(teardown.plan.is_empty());
        // Every 404 is "nothing to do".
        assert!(teardown.issues().iter().all(|i| !i.is_failure()));
    }
}
