//! Endpoint catalogue for every resource kind.
//!
//! Discovery always uses the most specific filter the platform offers.
//! Path segments are percent-encoded here; callers pass raw names.

use crate::types::{META_APPLICATION, META_PROVIDER, ResourceDescriptor, ResourceKind};
use platform::{ApiRequest, encode_component as enc};

/// The platform's system-owned release stage. Never a candidate.
pub const GLOBAL_RELEASE_STAGE: &str = "PROD";

/// Project roles shipped by the platform. Never candidates.
pub const BUILTIN_ROLES: [&str; 7] = [
    "Developer",
    "Contributor",
    "Viewer",
    "Release Manager",
    "Security Manager",
    "Application Admin",
    "Project Admin",
];

const ACCESS_V1: &str = "/access/api/v1";
const ACCESS_V2: &str = "/access/api/v2";
const ARTIFACTORY: &str = "/artifactory/api";
const APPTRUST: &str = "/apptrust/api/v1";

// ============================================================================
// Discovery
// ============================================================================

pub fn get_project(project_key: &str) -> ApiRequest {
    ApiRequest::get(format!("{ACCESS_V1}/projects/{}", enc(project_key)))
}

pub fn list_stages(project_key: &str) -> ApiRequest {
    ApiRequest::get(format!("{ACCESS_V2}/stages/"))
        .query("project_key", project_key)
        .query("scope", "project")
}

pub fn get_lifecycle(project_key: &str) -> ApiRequest {
    ApiRequest::get(format!("{ACCESS_V2}/lifecycle/")).query("project_key", project_key)
}

pub fn patch_lifecycle(project_key: &str, promote_stages: &[String]) -> ApiRequest {
    ApiRequest::patch(format!("{ACCESS_V2}/lifecycle/"))
        .query("project_key", project_key)
        .json(serde_json::json!({ "promote_stages": promote_stages }))
}

/// Project-filtered repository listing. Used as a hint only: the listing
/// does not state ownership, so every entry is confirmed by its detail record.
pub fn list_repositories(project_key: &str) -> ApiRequest {
    ApiRequest::get(format!("{ARTIFACTORY}/repositories")).query("project", project_key)
}

pub fn get_repository(repo_key: &str) -> ApiRequest {
    ApiRequest::get(format!("{ARTIFACTORY}/repositories/{}", enc(repo_key)))
}

pub fn list_members(project_key: &str) -> ApiRequest {
    ApiRequest::get(format!("{ACCESS_V1}/projects/{}/users", enc(project_key)))
}

pub fn list_roles(project_key: &str) -> ApiRequest {
    ApiRequest::get(format!("{ACCESS_V1}/projects/{}/roles", enc(project_key)))
}

pub fn list_applications(project_key: &str) -> ApiRequest {
    ApiRequest::get(format!("{APPTRUST}/applications")).query("project_key", project_key)
}

pub fn list_versions(application_key: &str) -> ApiRequest {
    ApiRequest::get(format!(
        "{APPTRUST}/applications/{}/versions",
        enc(application_key)
    ))
}

/// Global OIDC integration listing (no project filter exists).
pub fn list_oidc() -> ApiRequest {
    ApiRequest::get(format!("{ACCESS_V1}/oidc"))
}

pub fn list_mappings(provider: &str, project_key: &str) -> ApiRequest {
    ApiRequest::get(format!(
        "{ACCESS_V1}/oidc/{}/identity_mappings",
        enc(provider)
    ))
    .query("project_key", project_key)
}

// ============================================================================
// Mutations
// ============================================================================

/// The destructive call for a descriptor.
///
/// Returns `None` when the descriptor lacks the metadata its path needs.
pub fn delete_request(descriptor: &ResourceDescriptor, project_key: &str) -> Option<ApiRequest> {
    let key = enc(&descriptor.key);
    let p = enc(project_key);
    let req = match descriptor.kind {
        ResourceKind::Project => ApiRequest::delete(format!("{ACCESS_V1}/projects/{key}")),
        ResourceKind::Stage => ApiRequest::delete(format!("{ACCESS_V2}/stages/{key}"))
            .query("project_key", project_key),
        ResourceKind::Repository => ApiRequest::delete(format!("{ARTIFACTORY}/repositories/{key}")),
        ResourceKind::User => ApiRequest::delete(format!("{ACCESS_V1}/projects/{p}/users/{key}")),
        ResourceKind::ProjectRole => {
            ApiRequest::delete(format!("{ACCESS_V1}/projects/{p}/roles/{key}"))
        }
        ResourceKind::Application => ApiRequest::delete(format!("{APPTRUST}/applications/{key}")),
        ResourceKind::ApplicationVersion => {
            let app = enc(descriptor.meta(META_APPLICATION)?);
            ApiRequest::delete(format!("{APPTRUST}/applications/{app}/versions/{key}"))
        }
        ResourceKind::IdentityIntegration => ApiRequest::delete(format!("{ACCESS_V1}/oidc/{key}")),
        ResourceKind::IdentityMapping => {
            let provider = enc(descriptor.meta(META_PROVIDER)?);
            ApiRequest::delete(format!(
                "{ACCESS_V1}/oidc/{provider}/identity_mappings/{key}"
            ))
        }
    };
    Some(req)
}

/// The constructive call for a descriptor and its payload.
///
/// Returns `None` for kinds that are never created directly (application
/// versions) or when required metadata is missing.
pub fn create_request(
    descriptor: &ResourceDescriptor,
    body: &serde_json::Value,
    project_key: &str,
) -> Option<ApiRequest> {
    let key = enc(&descriptor.key);
    let p = enc(project_key);
    let req = match descriptor.kind {
        ResourceKind::Project => ApiRequest::post(format!("{ACCESS_V1}/projects")),
        ResourceKind::Stage => ApiRequest::post(format!("{ACCESS_V2}/stages/")),
        ResourceKind::Repository => ApiRequest::put(format!("{ARTIFACTORY}/repositories/{key}")),
        ResourceKind::User => ApiRequest::put(format!("{ACCESS_V1}/projects/{p}/users/{key}")),
        ResourceKind::ProjectRole => ApiRequest::post(format!("{ACCESS_V1}/projects/{p}/roles")),
        ResourceKind::Application => ApiRequest::post(format!("{APPTRUST}/applications")),
        ResourceKind::ApplicationVersion => return None,
        ResourceKind::IdentityIntegration => ApiRequest::post(format!("{ACCESS_V1}/oidc")),
        ResourceKind::IdentityMapping => {
            let provider = enc(descriptor.meta(META_PROVIDER)?);
            ApiRequest::post(format!("{ACCESS_V1}/oidc/{provider}/identity_mappings"))
        }
    };
    Some(req.json(body.clone()))
}
