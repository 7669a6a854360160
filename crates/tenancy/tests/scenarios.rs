//! End-to-end teardown scenarios against an in-memory platform.

use platform::{ApiResponse, Method, MockPlatform};
use serde_json::json;
use tenancy::{
    ActionKind, ExecuteOptions, HaltReason, Outcome, ProvisionManifest, ResourceKind, RunSummary,
    execute_simple, plan_teardown,
};

const PROJECT: &str = "bookverse";

fn repo_listing(mock: &MockPlatform, repos: &[(&str, Option<&str>)]) {
    let listing: Vec<_> = repos
        .iter()
        .map(|(key, _)| json!({"key": key, "packageType": "generic"}))
        .collect();
    mock.on_json(
        Method::Get,
        format!("/artifactory/api/repositories?project={PROJECT}"),
        200,
        &json!(listing),
    );
    for (key, owner) in repos {
        let detail = match owner {
            Some(owner) => json!({"key": key, "projectKey": owner}),
            None => json!({"key": key}),
        };
        mock.on_json(
            Method::Get,
            format!("/artifactory/api/repositories/{key}"),
            200,
            &detail,
        );
    }
}

fn delete_repo(mock: &MockPlatform, key: &str, statuses: &[u16]) {
    for status in statuses {
        mock.on(
            Method::Delete,
            format!("/artifactory/api/repositories/{key}"),
            ApiResponse::empty(*status),
        );
    }
}

#[test]
fn cross_tenant_repository_never_planned_or_deleted() {
    let mock = MockPlatform::new();
    repo_listing(
        &mock,
        &[
            ("bookverse-npm-dev-local", Some("bookverse")),
            ("other-bookverse-prod", Some("other")),
            ("bookverse-unlabelled", None),
        ],
    );
    delete_repo(&mock, "bookverse-npm-dev-local", &[204]);

    let teardown = plan_teardown(&mock, PROJECT, &[ResourceKind::Repository]).unwrap();
    let rejected: Vec<_> = teardown.rejected().map(|v| v.descriptor.key.as_str()).collect();
    assert_eq!(rejected, vec!["other-bookverse-prod", "bookverse-unlabelled"]);
    assert!(
        teardown
            .plan
            .steps()
            .all(|s| s.descriptor().key == "bookverse-npm-dev-local")
    );

    let report = execute_simple(&mock, &teardown.plan, &ExecuteOptions::default()).unwrap();
    assert_eq!(report.results.len(), 1);
    assert_eq!(
        mock.paths_for(Method::Delete),
        vec!["/artifactory/api/repositories/bookverse-npm-dev-local"]
    );
}

#[test]
fn not_found_discovery_deletes_nothing_and_succeeds() {
    let mock = MockPlatform::new();
    // Every route is unknown: the project-scoped listing answers 404.
    let teardown = plan_teardown(&mock, PROJECT, &[ResourceKind::Repository]).unwrap();
    assert!(teardown.plan.is_empty());

    let report = execute_simple(&mock, &teardown.plan, &ExecuteOptions::default()).unwrap();
    let summary = RunSummary::from_report(&report, teardown.issues(), 0);
    let repos = summary.counts(ResourceKind::Repository);
    assert_eq!(repos.deleted, 0);
    assert_eq!(repos.failed, 0);
    assert_eq!(summary.exit_code(), 0);

    // Only the one filtered GET; no unfiltered fallback.
    assert_eq!(
        mock.paths_for(Method::Get),
        vec!["/artifactory/api/repositories?project=bookverse"]
    );
}

#[test]
fn malformed_listing_is_a_failing_issue() {
    let mock = MockPlatform::new();
    mock.on(
        Method::Get,
        "/apptrust/api/v1/applications?project_key=bookverse",
        ApiResponse {
            status: 200,
            body: Some("<html>maintenance</html>".to_string()),
        },
    );
    let teardown = plan_teardown(&mock, PROJECT, &[ResourceKind::Application]).unwrap();
    assert!(teardown.plan.is_empty());

    let report = execute_simple(&mock, &teardown.plan, &ExecuteOptions::default()).unwrap();
    let summary = RunSummary::from_report(&report, teardown.issues(), 0);
    assert_eq!(summary.exit_code(), 1);
}

#[test]
fn dry_run_sixteen_repositories_without_mutation() {
    let mock = MockPlatform::new();
    let keys: Vec<String> = (0..16).map(|i| format!("bookverse-repo-{i:02}")).collect();
    let repos: Vec<(&str, Option<&str>)> =
        keys.iter().map(|k| (k.as_str(), Some(PROJECT))).collect();
    repo_listing(&mock, &repos);

    let teardown = plan_teardown(&mock, PROJECT, &[ResourceKind::Repository]).unwrap();
    let report = execute_simple(&mock, &teardown.plan, &ExecuteOptions::dry_run()).unwrap();

    assert_eq!(report.results.len(), 16);
    assert!(report.results.iter().all(|r| r.outcome == Outcome::WouldRun));
    assert!(mock.mutation_calls().is_empty());
}

#[test]
fn second_apply_is_idempotent() {
    let mock = MockPlatform::new();
    repo_listing(
        &mock,
        &[
            ("bookverse-npm-dev-local", Some("bookverse")),
            ("bookverse-docker-local", Some("bookverse")),
        ],
    );
    delete_repo(&mock, "bookverse-npm-dev-local", &[204, 404]);
    delete_repo(&mock, "bookverse-docker-local", &[200, 404]);

    let first = plan_teardown(&mock, PROJECT, &[ResourceKind::Repository]).unwrap();
    let run1 = execute_simple(&mock, &first.plan, &ExecuteOptions::default()).unwrap();
    assert!(run1.results.iter().all(|r| r.outcome == Outcome::Deleted));

    // Discovery still lists them (stale listing); deletion answers 404.
    let second = plan_teardown(&mock, PROJECT, &[ResourceKind::Repository]).unwrap();
    let run2 = execute_simple(&mock, &second.plan, &ExecuteOptions::default()).unwrap();
    assert!(
        run2.results
            .iter()
            .all(|r| matches!(r.outcome, Outcome::AlreadyAbsent | Outcome::ConflictSkipped))
    );
    let summary = RunSummary::from_report(&run2, second.issues(), 0);
    assert_eq!(summary.totals().deleted, 0);
    assert_eq!(summary.totals().failed, 0);
    assert!(summary.is_success());
}

/// `bookverse-web` with versions 1.0.0 (deletes) and 2.0.0 (already gone).
fn application_with_versions(mock: &MockPlatform) {
    mock.on_json(
        Method::Get,
        "/apptrust/api/v1/applications?project_key=bookverse",
        200,
        &json!([{"application_key": "bookverse-web", "project_key": "bookverse"}]),
    );
    mock.on_json(
        Method::Get,
        "/apptrust/api/v1/applications/bookverse-web/versions",
        200,
        &json!({"versions": [{"version": "1.0.0"}, {"version": "2.0.0"}]}),
    );
    mock.on(
        Method::Delete,
        "/apptrust/api/v1/applications/bookverse-web/versions/1.0.0",
        ApiResponse::empty(204),
    );
    mock.on(
        Method::Delete,
        "/apptrust/api/v1/applications/bookverse-web/versions/2.0.0",
        ApiResponse::empty(404),
    );
    mock.on(
        Method::Delete,
        "/apptrust/api/v1/applications/bookverse-web",
        ApiResponse::empty(204),
    );
}

fn assert_versions_before_application(mock: &MockPlatform) {
    let deletes = mock.paths_for(Method::Delete);
    let app_index = deletes
        .iter()
        .position(|p| p == "/apptrust/api/v1/applications/bookverse-web")
        .unwrap();
    let version_indices: Vec<_> = deletes
        .iter()
        .enumerate()
        .filter(|(_, p)| p.contains("/versions/"))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(version_indices.len(), 2);
    assert!(version_indices.iter().all(|i| *i < app_index));
}

#[test]
fn versions_deleted_before_their_application() {
    let mock = MockPlatform::new();
    application_with_versions(&mock);

    let teardown = plan_teardown(
        &mock,
        PROJECT,
        &[ResourceKind::Application, ResourceKind::ApplicationVersion],
    )
    .unwrap();
    let report = execute_simple(&mock, &teardown.plan, &ExecuteOptions::default()).unwrap();
    assert!(report.results.iter().all(|r| r.outcome.is_cleared()));
    assert_versions_before_application(&mock);
    assert!(teardown.issues().is_empty());
}

#[test]
fn application_scope_still_removes_versions_first() {
    let mock = MockPlatform::new();
    application_with_versions(&mock);

    let teardown = plan_teardown(&mock, PROJECT, &[ResourceKind::Application]).unwrap();
    assert_eq!(
        teardown.plan.count_by_kind().get(&ResourceKind::ApplicationVersion),
        Some(&2)
    );
    let report = execute_simple(&mock, &teardown.plan, &ExecuteOptions::default()).unwrap();
    assert!(report.results.iter().all(|r| r.outcome.is_cleared()));
    assert!(
        mock.paths_for(Method::Get)
            .contains(&"/apptrust/api/v1/applications/bookverse-web/versions".to_string())
    );
    assert_versions_before_application(&mock);
}

#[test]
fn integration_scope_still_removes_mappings_first() {
    let mock = MockPlatform::new();
    mock.on_json(
        Method::Get,
        "/access/api/v1/oidc",
        200,
        &json!([{"name": "github-bookverse", "project_key": "bookverse"}]),
    );
    mock.on_json(
        Method::Get,
        "/access/api/v1/oidc/github-bookverse/identity_mappings?project_key=bookverse",
        200,
        &json!({"mappings": [{"name": "ci", "project_key": "bookverse"}]}),
    );
    mock.on(
        Method::Delete,
        "/access/api/v1/oidc/github-bookverse/identity_mappings/ci",
        ApiResponse::empty(204),
    );
    mock.on(
        Method::Delete,
        "/access/api/v1/oidc/github-bookverse",
        ApiResponse::empty(204),
    );

    let teardown = plan_teardown(&mock, PROJECT, &[ResourceKind::IdentityIntegration]).unwrap();
    let report = execute_simple(&mock, &teardown.plan, &ExecuteOptions::default()).unwrap();
    assert!(report.results.iter().all(|r| r.outcome == Outcome::Deleted));
    assert_eq!(
        mock.paths_for(Method::Delete),
        vec![
            "/access/api/v1/oidc/github-bookverse/identity_mappings/ci",
            "/access/api/v1/oidc/github-bookverse",
        ]
    );
}

#[test]
fn role_scope_still_removes_members_first() {
    let mock = MockPlatform::new();
    mock.on_json(
        Method::Get,
        "/access/api/v1/projects/bookverse/roles",
        200,
        &json!([{"name": "bookverse-ci", "type": "CUSTOM"}]),
    );
    mock.on_json(
        Method::Get,
        "/access/api/v1/projects/bookverse/users",
        200,
        &json!({"members": [{"name": "alice"}]}),
    );
    mock.on(
        Method::Delete,
        "/access/api/v1/projects/bookverse/users/alice",
        ApiResponse::empty(204),
    );
    mock.on(
        Method::Delete,
        "/access/api/v1/projects/bookverse/roles/bookverse-ci",
        ApiResponse::empty(204),
    );

    let teardown = plan_teardown(&mock, PROJECT, &[ResourceKind::ProjectRole]).unwrap();
    execute_simple(&mock, &teardown.plan, &ExecuteOptions::default()).unwrap();
    assert_eq!(
        mock.paths_for(Method::Delete),
        vec![
            "/access/api/v1/projects/bookverse/users/alice",
            "/access/api/v1/projects/bookverse/roles/bookverse-ci",
        ]
    );
}

#[test]
fn project_scope_discovers_leaves_before_deleting_project() {
    let mock = MockPlatform::new();
    mock.on_json(
        Method::Get,
        "/access/api/v1/projects/bookverse",
        200,
        &json!({"project_key": "bookverse"}),
    );
    mock.on(
        Method::Get,
        "/access/api/v1/projects/bookverse",
        ApiResponse::empty(404),
    );
    repo_listing(&mock, &[("bookverse-npm-dev-local", Some("bookverse"))]);
    delete_repo(&mock, "bookverse-npm-dev-local", &[204]);
    mock.on(
        Method::Delete,
        "/access/api/v1/projects/bookverse",
        ApiResponse::empty(204),
    );

    let teardown = plan_teardown(&mock, PROJECT, &[ResourceKind::Project]).unwrap();
    assert_eq!(teardown.reports.len(), ResourceKind::ALL.len());
    let report = execute_simple(&mock, &teardown.plan, &ExecuteOptions::default()).unwrap();

    assert_eq!(
        mock.paths_for(Method::Delete),
        vec![
            "/artifactory/api/repositories/bookverse-npm-dev-local",
            "/access/api/v1/projects/bookverse",
        ]
    );
    assert_eq!(report.project_still_exists, Some(false));
}

#[test]
fn forbidden_halts_remaining_batches() {
    let mock = MockPlatform::new();
    mock.on_json(
        Method::Get,
        "/access/api/v1/projects/bookverse",
        200,
        &json!({"project_key": "bookverse"}),
    );
    repo_listing(&mock, &[("bookverse-npm-dev-local", Some("bookverse"))]);
    delete_repo(&mock, "bookverse-npm-dev-local", &[403]);

    let teardown = plan_teardown(
        &mock,
        PROJECT,
        &[ResourceKind::Project, ResourceKind::Repository],
    )
    .unwrap();
    let report = execute_simple(&mock, &teardown.plan, &ExecuteOptions::default()).unwrap();

    assert_eq!(report.halted, Some(HaltReason::AuthFailure));
    assert_eq!(report.results[0].outcome, Outcome::Blocked);
    assert_eq!(report.results[1].outcome, Outcome::NotAttempted);
    assert_eq!(mock.paths_for(Method::Delete).len(), 1);

    let summary = RunSummary::from_report(&report, teardown.issues(), 0);
    assert_eq!(summary.exit_code(), 1);
}

#[test]
fn unauthorized_later_batch_keeps_earlier_results() {
    let mock = MockPlatform::new();
    mock.on_json(
        Method::Get,
        "/access/api/v1/projects/bookverse",
        200,
        &json!({"project_key": "bookverse"}),
    );
    mock.on_json(
        Method::Get,
        "/access/api/v1/projects/bookverse/users",
        200,
        &json!({"members": [{"name": "alice"}, {"name": "bob"}]}),
    );
    mock.on_json(
        Method::Get,
        "/access/api/v1/projects/bookverse/roles",
        200,
        &json!([{"name": "bookverse-ci", "type": "CUSTOM"}]),
    );
    mock.on(
        Method::Delete,
        "/access/api/v1/projects/bookverse/users/alice",
        ApiResponse::empty(204),
    );
    mock.on(
        Method::Delete,
        "/access/api/v1/projects/bookverse/users/bob",
        ApiResponse::empty(404),
    );
    mock.on(
        Method::Delete,
        "/access/api/v1/projects/bookverse/roles/bookverse-ci",
        ApiResponse::empty(401),
    );

    let teardown = plan_teardown(&mock, PROJECT, &[]).unwrap();
    assert_eq!(teardown.plan.batches().len(), 3);
    let report = execute_simple(&mock, &teardown.plan, &ExecuteOptions::default()).unwrap();

    let outcomes: Vec<_> = report
        .results
        .iter()
        .map(|r| (r.descriptor.key.as_str(), r.outcome))
        .collect();
    assert_eq!(
        outcomes,
        vec![
            ("alice", Outcome::Deleted),
            ("bob", Outcome::AlreadyAbsent),
            ("bookverse-ci", Outcome::Blocked),
            ("bookverse", Outcome::NotAttempted),
        ]
    );
    assert_eq!(report.halted, Some(HaltReason::AuthFailure));
    assert_eq!(report.results[2].http_status, Some(401));

    // Nothing is sent after the halt, not even the project read-back.
    assert_eq!(mock.paths_for(Method::Delete).len(), 3);
    assert_eq!(report.project_still_exists, None);

    let summary = RunSummary::from_report(&report, teardown.issues(), 0);
    assert_eq!(summary.counts(ResourceKind::User).deleted, 1);
    assert_eq!(summary.counts(ResourceKind::User).already_absent, 1);
    assert_eq!(summary.counts(ResourceKind::ProjectRole).blocked, 1);
    assert_eq!(summary.counts(ResourceKind::Project).not_attempted, 1);
    assert_eq!(summary.exit_code(), 1);
}

#[test]
fn stage_detached_and_observed_before_delete() {
    let mock = MockPlatform::new();
    let lifecycle = "/access/api/v2/lifecycle/?project_key=bookverse";
    mock.on_json(
        Method::Get,
        "/access/api/v2/stages/?project_key=bookverse&scope=project",
        200,
        &json!([
            {"name": "bookverse-DEV", "scope": "project", "project_key": "bookverse"},
            {"name": "PROD", "scope": "global"}
        ]),
    );
    // Discovery read, detach read, post-patch observation.
    mock.on_json(Method::Get, lifecycle, 200, &json!({"promote_stages": ["bookverse-DEV"]}));
    mock.on_json(Method::Get, lifecycle, 200, &json!({"promote_stages": ["bookverse-DEV"]}));
    mock.on_json(Method::Get, lifecycle, 200, &json!({"promote_stages": []}));
    mock.on(Method::Patch, lifecycle, ApiResponse::empty(200));
    mock.on(
        Method::Delete,
        "/access/api/v2/stages/bookverse-DEV?project_key=bookverse",
        ApiResponse::empty(204),
    );

    let teardown = plan_teardown(&mock, PROJECT, &[ResourceKind::Stage]).unwrap();
    assert!(teardown.plan.steps().all(|s| s.descriptor().key != "PROD"));

    let report = execute_simple(&mock, &teardown.plan, &ExecuteOptions::default()).unwrap();
    let actions: Vec<_> = report.results.iter().map(|r| (r.action, r.outcome)).collect();
    assert_eq!(
        actions,
        vec![
            (ActionKind::DetachFromLifecycle, Outcome::Updated),
            (ActionKind::Delete, Outcome::Deleted),
        ]
    );

    let mutations: Vec<_> = mock
        .mutation_calls()
        .into_iter()
        .map(|r| r.method)
        .collect();
    assert_eq!(mutations, vec![Method::Patch, Method::Delete]);
}

#[test]
fn full_teardown_orders_project_last_and_verifies_removal() {
    let mock = MockPlatform::new();
    mock.on_json(
        Method::Get,
        "/access/api/v1/projects/bookverse",
        200,
        &json!({"project_key": "bookverse"}),
    );
    mock.on_json(
        Method::Get,
        "/access/api/v1/projects/bookverse/users",
        200,
        &json!({"members": [{"name": "alice"}]}),
    );
    mock.on(
        Method::Delete,
        "/access/api/v1/projects/bookverse/users/alice",
        ApiResponse::empty(204),
    );
    mock.on(
        Method::Delete,
        "/access/api/v1/projects/bookverse",
        ApiResponse::empty(204),
    );

    // Discovery reads the project once; the post-run read answers 404.
    mock.on(
        Method::Get,
        "/access/api/v1/projects/bookverse",
        ApiResponse::empty(404),
    );

    let teardown = plan_teardown(&mock, PROJECT, &[]).unwrap();
    let report = execute_simple(&mock, &teardown.plan, &ExecuteOptions::default()).unwrap();

    let deletes = mock.paths_for(Method::Delete);
    assert_eq!(deletes.last().unwrap(), "/access/api/v1/projects/bookverse");
    assert_eq!(report.project_still_exists, Some(false));

    let summary = RunSummary::from_report(&report, teardown.issues(), teardown.plan.excluded().len());
    assert!(summary.is_success());
    assert_eq!(summary.counts(ResourceKind::User).deleted, 1);
    assert_eq!(summary.counts(ResourceKind::Project).deleted, 1);
}

const MANIFEST: &str = r#"
[project]
key = "bookverse"
display_name = "BookVerse"

[[stages]]
name = "bookverse-DEV"

[[repositories]]
key = "bookverse-npm-dev-local"
package_type = "npm"
"#;

#[test]
fn provisioning_creates_then_reruns_as_conflicts() {
    let mock = MockPlatform::new();
    let lifecycle = "/access/api/v2/lifecycle/?project_key=bookverse";
    mock.on(Method::Post, "/access/api/v1/projects", ApiResponse::empty(201));
    mock.on(Method::Post, "/access/api/v1/projects", ApiResponse::empty(409));
    mock.on(Method::Post, "/access/api/v2/stages/", ApiResponse::empty(201));
    mock.on(Method::Post, "/access/api/v2/stages/", ApiResponse::empty(409));
    mock.on(
        Method::Put,
        "/artifactory/api/repositories/bookverse-npm-dev-local",
        ApiResponse::empty(200),
    );
    mock.on(
        Method::Put,
        "/artifactory/api/repositories/bookverse-npm-dev-local",
        ApiResponse::empty(409),
    );
    mock.on_json(Method::Get, lifecycle, 200, &json!({"promote_stages": []}));
    mock.on_json(Method::Get, lifecycle, 200, &json!({"promote_stages": ["bookverse-DEV"]}));
    mock.on(Method::Patch, lifecycle, ApiResponse::empty(200));

    let manifest = ProvisionManifest::parse(MANIFEST).unwrap();
    let plan = manifest.build_plan().unwrap();
    assert!(plan.steps().all(|s| s.verdict.verified));

    let first = execute_simple(&mock, &plan, &ExecuteOptions::default()).unwrap();
    assert!(first.results.iter().all(|r| r.outcome.is_cleared()));
    assert_eq!(
        mock.calls()[0].path_with_query(),
        "/access/api/v1/projects",
        "project is created first"
    );
    let summary = RunSummary::from_report(&first, Vec::new(), 0);
    assert_eq!(summary.totals().created, 3);
    assert_eq!(summary.counts(ResourceKind::Stage).updated, 1);

    let second = execute_simple(&mock, &plan, &ExecuteOptions::default()).unwrap();
    assert!(
        second
            .results
            .iter()
            .all(|r| r.outcome == Outcome::ConflictSkipped)
    );
    assert!(RunSummary::from_report(&second, Vec::new(), 0).is_success());
}
