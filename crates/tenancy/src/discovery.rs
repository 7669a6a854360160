//! Discovery engine.
//!
//! Each kind is listed with the most specific filter the platform offers.
//! A failed listing yields an empty descriptor set plus a [`DiscoveryIssue`];
//! there is no fallback to a broader query.

use crate::endpoints::{self, BUILTIN_ROLES, GLOBAL_RELEASE_STAGE};
use crate::error::{Error, FailureClass, Result};
use crate::types::{
    META_APPLICATION, META_IN_LIFECYCLE, META_PACKAGE_TYPE, META_PROVIDER, Provenance,
    ResourceDescriptor, ResourceKind,
};
use crate::verify::verify;
use platform::{ApiRequest, PlatformApi};
use rayon::prelude::*;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::fmt;

/// A listing that did not produce a usable answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveryIssue {
    pub kind: ResourceKind,
    pub class: FailureClass,
    /// HTTP status, when the platform answered at all.
    pub status: Option<u16>,
    pub message: String,
}

impl DiscoveryIssue {
    /// Whether the issue should fail the run.
    ///
    /// A 404 on a project-scoped listing means "nothing to do".
    #[must_use]
    pub fn is_failure(&self) -> bool {
        !self.class.is_idempotent_success()
    }
}

impl fmt::Display for DiscoveryIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{}: {} (HTTP {status})", self.kind, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Everything discovery found for one kind.
#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub kind: ResourceKind,
    pub descriptors: Vec<ResourceDescriptor>,
    pub issues: Vec<DiscoveryIssue>,
}

impl DiscoveryReport {
    fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            descriptors: Vec::new(),
            issues: Vec::new(),
        }
    }

    fn failed(kind: ResourceKind, issue: DiscoveryIssue) -> Self {
        Self {
            kind,
            descriptors: Vec::new(),
            issues: vec![issue],
        }
    }

    /// First 401/403 issue, if any.
    #[must_use]
    pub fn auth_failure(&self) -> Option<&DiscoveryIssue> {
        self.issues
            .iter()
            .find(|i| i.class.is_fatal())
    }
}

// ============================================================================
// Response schemas
// ============================================================================

/// Either a bare array or an object wrapping the array under a known key.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(alias = "applications", alias = "versions", alias = "members", alias = "mappings")]
        items: Vec<T>,
    },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Self::Bare(v) | Self::Wrapped { items: v } => v,
        }
    }
}

#[derive(Deserialize)]
struct ProjectRecord {
    project_key: String,
}

#[derive(Deserialize)]
struct StageRecord {
    name: String,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    project_key: Option<String>,
}

/// Promotion path of a project.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LifecycleRecord {
    #[serde(default)]
    pub promote_stages: Vec<String>,
}

#[derive(Deserialize)]
struct RepositorySummary {
    key: String,
    #[serde(rename = "packageType", default)]
    package_type: Option<String>,
}

#[derive(Deserialize)]
struct RepositoryDetail {
    #[serde(rename = "projectKey", default)]
    project_key: Option<String>,
}

#[derive(Deserialize)]
struct MemberRecord {
    name: String,
}

#[derive(Deserialize)]
struct RoleRecord {
    name: String,
    #[serde(rename = "type", default)]
    role_type: Option<String>,
}

#[derive(Deserialize)]
struct ApplicationRecord {
    application_key: String,
    #[serde(default)]
    project_key: Option<String>,
}

#[derive(Deserialize)]
struct VersionRecord {
    version: String,
}

#[derive(Deserialize)]
struct IntegrationRecord {
    name: String,
    #[serde(default)]
    project_key: Option<String>,
}

#[derive(Deserialize)]
struct MappingRecord {
    name: String,
    #[serde(default)]
    project_key: Option<String>,
}

/// Blank strings count as "no field".
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Fetching
// ============================================================================

/// Issue a GET and decode its body, or describe why that was impossible.
fn fetch<T: DeserializeOwned>(
    api: &dyn PlatformApi,
    kind: ResourceKind,
    request: &ApiRequest,
) -> std::result::Result<T, DiscoveryIssue> {
    let response = api.send(request).map_err(|e| DiscoveryIssue {
        kind,
        class: FailureClass::TransientOrUnknownFailure,
        status: None,
        message: format!("{request}: {e}"),
    })?;

    if let Some(class) = FailureClass::from_status(response.status) {
        return Err(DiscoveryIssue {
            kind,
            class,
            status: Some(response.status),
            message: format!("{request} returned {class}"),
        });
    }

    response.json::<T>().map_err(|e| DiscoveryIssue {
        kind,
        class: FailureClass::TransientOrUnknownFailure,
        status: Some(response.status),
        message: format!("{request}: {e}"),
    })
}

/// Read a project's promotion path.
///
/// # Errors
///
/// Returns the issue when the lifecycle cannot be read or decoded.
pub fn fetch_lifecycle(
    api: &dyn PlatformApi,
    project_key: &str,
) -> std::result::Result<LifecycleRecord, DiscoveryIssue> {
    fetch(api, ResourceKind::Stage, &endpoints::get_lifecycle(project_key))
}

// ============================================================================
// Per-kind discovery
// ============================================================================

/// Discover candidates of one kind for `project_key`.
///
/// Never broadens the query on failure: the report then carries an empty
/// descriptor set and the issue.
pub fn discover(api: &dyn PlatformApi, kind: ResourceKind, project_key: &str) -> DiscoveryReport {
    log::debug!("discovering {} for project '{project_key}'", kind.cli_name());
    let report = match kind {
        ResourceKind::Project => discover_project(api, project_key),
        ResourceKind::Stage => discover_stages(api, project_key),
        ResourceKind::Repository => discover_repositories(api, project_key),
        ResourceKind::User => discover_members(api, project_key),
        ResourceKind::ProjectRole => discover_roles(api, project_key),
        ResourceKind::Application => discover_applications(api, project_key),
        ResourceKind::ApplicationVersion => discover_versions(api, project_key),
        ResourceKind::IdentityIntegration => discover_integrations(api),
        ResourceKind::IdentityMapping => discover_mappings(api, project_key),
    };
    for issue in &report.issues {
        if issue.is_failure() {
            log::warn!("discovery issue: {issue}");
        } else {
            log::info!("discovery: {issue}");
        }
    }
    log::debug!(
        "discovered {} {} candidate(s)",
        report.descriptors.len(),
        kind.cli_name()
    );
    report
}

/// Discover several kinds in parallel, preserving the requested order.
///
/// # Errors
///
/// Returns `Error::AuthFailure` if any listing was rejected with 401/403;
/// credentials problems are never absorbed into an empty result.
pub fn discover_all(
    api: &dyn PlatformApi,
    kinds: &[ResourceKind],
    project_key: &str,
) -> Result<Vec<DiscoveryReport>> {
    let mut reports: Vec<DiscoveryReport> = kinds
        .par_iter()
        .map(|kind| discover(api, *kind, project_key))
        .collect();

    // Child kinds re-read their parent listing; report a failed request once.
    let mut seen: HashSet<String> = HashSet::new();
    for report in &mut reports {
        report.issues.retain(|issue| seen.insert(issue.message.clone()));
    }

    if let Some(issue) = reports.iter().find_map(DiscoveryReport::auth_failure) {
        return Err(Error::AuthFailure {
            status: issue.status.unwrap_or(403),
            operation: format!("discovering {}", issue.kind.cli_name()),
        });
    }
    Ok(reports)
}

fn discover_project(api: &dyn PlatformApi, project_key: &str) -> DiscoveryReport {
    let kind = ResourceKind::Project;
    match fetch::<ProjectRecord>(api, kind, &endpoints::get_project(project_key)) {
        Ok(record) => {
            let mut report = DiscoveryReport::new(kind);
            report.descriptors.push(
                ResourceDescriptor::new(kind, project_key, Provenance::ProjectScoped)
                    .declared(non_empty(Some(record.project_key))),
            );
            report
        }
        Err(issue) => DiscoveryReport::failed(kind, issue),
    }
}

fn discover_stages(api: &dyn PlatformApi, project_key: &str) -> DiscoveryReport {
    let kind = ResourceKind::Stage;
    let stages =
        match fetch::<Vec<StageRecord>>(api, kind, &endpoints::list_stages(project_key)) {
            Ok(stages) => stages,
            Err(issue) => return DiscoveryReport::failed(kind, issue),
        };

    // Best effort: a missing lifecycle only means the annotation is absent.
    let lifecycle = match fetch_lifecycle(api, project_key) {
        Ok(lifecycle) => Some(lifecycle.promote_stages),
        Err(issue) => {
            log::debug!("lifecycle not readable: {issue}");
            None
        }
    };

    let mut report = DiscoveryReport::new(kind);
    for stage in stages {
        let global = stage
            .scope
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("global"));
        if global || stage.name == GLOBAL_RELEASE_STAGE {
            log::debug!("skipping system stage '{}'", stage.name);
            continue;
        }
        let mut descriptor = ResourceDescriptor::new(kind, &stage.name, Provenance::ProjectScoped)
            .declared(non_empty(stage.project_key));
        if let Some(path) = &lifecycle {
            let member = path.iter().any(|s| s == &stage.name);
            descriptor = descriptor.with_meta(META_IN_LIFECYCLE, member.to_string());
        }
        report.descriptors.push(descriptor);
    }
    report
}

fn discover_repositories(api: &dyn PlatformApi, project_key: &str) -> DiscoveryReport {
    let kind = ResourceKind::Repository;
    let hints = match fetch::<Vec<RepositorySummary>>(
        api,
        kind,
        &endpoints::list_repositories(project_key),
    ) {
        Ok(hints) => hints,
        Err(issue) => return DiscoveryReport::failed(kind, issue),
    };

    let mut report = DiscoveryReport::new(kind);
    for hint in hints {
        // The listing does not state ownership; the detail record does.
        let declared = match fetch::<RepositoryDetail>(api, kind, &endpoints::get_repository(&hint.key))
        {
            Ok(detail) => non_empty(detail.project_key),
            Err(issue) => {
                report.issues.push(issue);
                None
            }
        };
        let mut descriptor = ResourceDescriptor::new(kind, &hint.key, Provenance::ProjectScoped)
            .declared(declared);
        if let Some(package_type) = hint.package_type {
            descriptor = descriptor.with_meta(META_PACKAGE_TYPE, package_type);
        }
        report.descriptors.push(descriptor);
    }
    report
}

fn discover_members(api: &dyn PlatformApi, project_key: &str) -> DiscoveryReport {
    let kind = ResourceKind::User;
    match fetch::<Listing<MemberRecord>>(api, kind, &endpoints::list_members(project_key)) {
        Ok(listing) => {
            let mut report = DiscoveryReport::new(kind);
            // Membership is a property of the project itself: the
            // project-scoped listing is the authoritative record.
            report.descriptors = listing
                .into_vec()
                .into_iter()
                .map(|m| {
                    ResourceDescriptor::new(kind, m.name, Provenance::ProjectScoped)
                        .declared(Some(project_key.to_string()))
                })
                .collect();
            report
        }
        Err(issue) => DiscoveryReport::failed(kind, issue),
    }
}

fn discover_roles(api: &dyn PlatformApi, project_key: &str) -> DiscoveryReport {
    let kind = ResourceKind::ProjectRole;
    match fetch::<Vec<RoleRecord>>(api, kind, &endpoints::list_roles(project_key)) {
        Ok(roles) => {
            let mut report = DiscoveryReport::new(kind);
            for role in roles {
                let custom = role
                    .role_type
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case("CUSTOM"));
                if !custom || BUILTIN_ROLES.contains(&role.name.as_str()) {
                    log::debug!("skipping built-in role '{}'", role.name);
                    continue;
                }
                report.descriptors.push(
                    ResourceDescriptor::new(kind, role.name, Provenance::ProjectScoped)
                        .declared(Some(project_key.to_string())),
                );
            }
            report
        }
        Err(issue) => DiscoveryReport::failed(kind, issue),
    }
}

fn discover_applications(api: &dyn PlatformApi, project_key: &str) -> DiscoveryReport {
    let kind = ResourceKind::Application;
    match fetch::<Listing<ApplicationRecord>>(api, kind, &endpoints::list_applications(project_key))
    {
        Ok(listing) => {
            let mut report = DiscoveryReport::new(kind);
            report.descriptors = listing
                .into_vec()
                .into_iter()
                .map(|app| {
                    ResourceDescriptor::new(kind, app.application_key, Provenance::ProjectScoped)
                        .declared(non_empty(app.project_key))
                })
                .collect();
            report
        }
        Err(issue) => DiscoveryReport::failed(kind, issue),
    }
}

/// Versions are only listed under applications that verify.
fn discover_versions(api: &dyn PlatformApi, project_key: &str) -> DiscoveryReport {
    let kind = ResourceKind::ApplicationVersion;
    let apps = discover_applications(api, project_key);
    let mut report = DiscoveryReport::new(kind);
    report.issues.extend(apps.issues.into_iter().map(|mut i| {
        i.kind = kind;
        i
    }));

    for app in apps.descriptors {
        let verdict = verify(&app, project_key);
        if !verdict.verified {
            continue;
        }
        match fetch::<Listing<VersionRecord>>(api, kind, &endpoints::list_versions(&app.key)) {
            Ok(listing) => {
                for v in listing.into_vec() {
                    report.descriptors.push(
                        ResourceDescriptor::new(kind, v.version, Provenance::ProjectScoped)
                            .declared(app.declared_project_key.clone())
                            .with_meta(META_APPLICATION, &app.key),
                    );
                }
            }
            Err(issue) => report.issues.push(issue),
        }
    }
    report
}

/// The integration listing has no project filter; only records that name
/// their project can ever verify.
fn discover_integrations(api: &dyn PlatformApi) -> DiscoveryReport {
    let kind = ResourceKind::IdentityIntegration;
    match fetch::<Vec<IntegrationRecord>>(api, kind, &endpoints::list_oidc()) {
        Ok(records) => {
            let mut report = DiscoveryReport::new(kind);
            report.descriptors = records
                .into_iter()
                .map(|r| {
                    ResourceDescriptor::new(kind, r.name, Provenance::Unfiltered)
                        .declared(non_empty(r.project_key))
                })
                .collect();
            report
        }
        Err(issue) => DiscoveryReport::failed(kind, issue),
    }
}

fn discover_mappings(api: &dyn PlatformApi, project_key: &str) -> DiscoveryReport {
    let kind = ResourceKind::IdentityMapping;
    let providers = match fetch::<Vec<IntegrationRecord>>(api, kind, &endpoints::list_oidc()) {
        Ok(records) => records,
        Err(issue) => return DiscoveryReport::failed(kind, issue),
    };

    let mut report = DiscoveryReport::new(kind);
    for provider in providers {
        match fetch::<Listing<MappingRecord>>(
            api,
            kind,
            &endpoints::list_mappings(&provider.name, project_key),
        ) {
            Ok(listing) => {
                for m in listing.into_vec() {
                    report.descriptors.push(
                        ResourceDescriptor::new(kind, m.name, Provenance::ProjectScoped)
                            .declared(non_empty(m.project_key))
                            .with_meta(META_PROVIDER, &provider.name),
                    );
                }
            }
            // A provider without mappings for this project answers 404.
            Err(issue) if issue.class == FailureClass::NotFound => {}
            Err(issue) => report.issues.push(issue),
        }
    }
    report
}
