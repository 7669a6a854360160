//! Provisioning manifest and creation plans.
//!
//! Creation runs the same pipeline as teardown in reverse dependency
//! order: project, then its leaves, then lifecycle attach and identity
//! mappings.

use crate::endpoints::GLOBAL_RELEASE_STAGE;
use crate::error::{Error, Result};
use crate::planner::{ExecutionPlan, PlanStep, StepId};
use crate::types::{Action, META_PROVIDER, Provenance, ResourceDescriptor, ResourceKind};
use crate::verify::verify;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

// ============================================================================
// Manifest Schema
// ============================================================================

/// Everything a tenant needs, declared in TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionManifest {
    pub project: ProjectSpec,
    #[serde(default)]
    pub stages: Vec<StageSpec>,
    #[serde(default)]
    pub repositories: Vec<RepositorySpec>,
    #[serde(default)]
    pub members: Vec<MemberSpec>,
    #[serde(default)]
    pub roles: Vec<RoleSpec>,
    #[serde(default)]
    pub applications: Vec<ApplicationSpec>,
    #[serde(default)]
    pub oidc: Vec<IntegrationSpec>,
    #[serde(default)]
    pub mappings: Vec<MappingSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSpec {
    pub key: String,
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    /// -1 for unlimited.
    #[serde(default = "default_quota")]
    pub storage_quota_bytes: i64,
    #[serde(default = "default_true")]
    pub manage_members: bool,
    #[serde(default = "default_true")]
    pub manage_resources: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSpec {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    /// Append to the project's promotion path after creation.
    #[serde(default = "default_true")]
    pub lifecycle: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySpec {
    pub key: String,
    pub package_type: String,
    #[serde(default = "default_rclass")]
    pub rclass: String,
    #[serde(default)]
    pub environments: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSpec {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSpec {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub environments: Vec<String>,
    #[serde(default)]
    pub actions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationSpec {
    pub key: String,
    pub name: String,
    #[serde(default = "default_criticality")]
    pub criticality: String,
    #[serde(default = "default_maturity")]
    pub maturity_level: String,
    #[serde(default)]
    pub owners: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationSpec {
    pub name: String,
    #[serde(default = "default_provider_type")]
    pub provider_type: String,
    pub issuer_url: String,
    #[serde(default)]
    pub audience: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingSpec {
    pub provider: String,
    pub name: String,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default)]
    pub claims: BTreeMap<String, String>,
    pub scope: String,
}

fn default_true() -> bool {
    true
}

fn default_quota() -> i64 {
    -1
}

fn default_category() -> String {
    "promote".to_string()
}

fn default_rclass() -> String {
    "local".to_string()
}

fn default_criticality() -> String {
    "medium".to_string()
}

fn default_maturity() -> String {
    "unspecified".to_string()
}

fn default_provider_type() -> String {
    "GitHub".to_string()
}

fn default_priority() -> u32 {
    1
}

impl ProvisionManifest {
    /// Load and validate a manifest file.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidManifest` if the file cannot be read, parsed,
    /// or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidManifest(format!("could not read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    /// Parse and validate manifest TOML.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidManifest` on syntax or validation errors.
    pub fn parse(content: &str) -> Result<Self> {
        let manifest: Self =
            toml::from_str(content).map_err(|e| Error::InvalidManifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn project_key(&self) -> &str {
        &self.project.key
    }

    /// Validate the manifest
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidManifest` describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let project = self.project_key();
        if project.trim().is_empty() {
            return Err(Error::InvalidProjectKey(project.to_string()));
        }

        unique("stage", self.stages.iter().map(|s| s.name.as_str()))?;
        unique("repository", self.repositories.iter().map(|r| r.key.as_str()))?;
        unique("member", self.members.iter().map(|m| m.name.as_str()))?;
        unique("role", self.roles.iter().map(|r| r.name.as_str()))?;
        unique("application", self.applications.iter().map(|a| a.key.as_str()))?;
        unique("integration", self.oidc.iter().map(|i| i.name.as_str()))?;

        if let Some(stage) = self.stages.iter().find(|s| s.name == GLOBAL_RELEASE_STAGE) {
            return Err(Error::InvalidManifest(format!(
                "stage '{}' is system-owned and cannot be provisioned",
                stage.name
            )));
        }

        let prefix = format!("{project}-");
        if let Some(repo) = self.repositories.iter().find(|r| !r.key.starts_with(&prefix)) {
            return Err(Error::InvalidManifest(format!(
                "repository '{}' must start with '{prefix}'",
                repo.key
            )));
        }

        let mut seen = HashSet::new();
        for m in &self.mappings {
            if !seen.insert((m.provider.as_str(), m.name.as_str())) {
                return Err(Error::InvalidManifest(format!(
                    "duplicate mapping '{}/{}'",
                    m.provider, m.name
                )));
            }
        }
        Ok(())
    }

    /// Compile the manifest into a creation plan.
    ///
    /// Every descriptor is declared for the manifest's project and goes
    /// through the same verifier as discovered resources.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPlan` if leveling fails.
    pub fn build_plan(&self) -> Result<ExecutionPlan> {
        let project = self.project_key().to_string();
        let mut builder = CreationPlan::new(&project);

        let project_step = builder.create(ResourceKind::Project, &project, &[], self.project_body());
        let root = [project_step];

        let mut stage_steps = Vec::new();
        for stage in &self.stages {
            let body = json!({
                "name": stage.name,
                "scope": "project",
                "project_key": project,
                "category": stage.category,
            });
            let id = builder.create(ResourceKind::Stage, &stage.name, &root, body);
            stage_steps.push((stage, id));
        }

        for repo in &self.repositories {
            let body = json!({
                "key": repo.key,
                "rclass": repo.rclass,
                "packageType": repo.package_type,
                "projectKey": project,
                "environments": repo.environments,
            });
            builder.create(ResourceKind::Repository, &repo.key, &root, body);
        }

        let mut role_steps = vec![project_step];
        for role in &self.roles {
            let body = json!({
                "name": role.name,
                "description": role.description,
                "type": "CUSTOM",
                "environments": role.environments,
                "actions": role.actions,
            });
            role_steps.push(builder.create(ResourceKind::ProjectRole, &role.name, &root, body));
        }

        // Members may reference custom roles.
        for member in &self.members {
            let body = json!({ "name": member.name, "roles": member.roles });
            builder.create(ResourceKind::User, &member.name, &role_steps, body);
        }

        for app in &self.applications {
            let body = json!({
                "project_key": project,
                "application_key": app.key,
                "application_name": app.name,
                "criticality": app.criticality,
                "maturity_level": app.maturity_level,
                "user_owners": app.owners,
            });
            builder.create(ResourceKind::Application, &app.key, &root, body);
        }

        let mut integration_steps: BTreeMap<&str, StepId> = BTreeMap::new();
        for integration in &self.oidc {
            let body = json!({
                "name": integration.name,
                "provider_type": integration.provider_type,
                "issuer_url": integration.issuer_url,
                "audience": integration.audience,
                "project_key": project,
            });
            let id = builder.create(ResourceKind::IdentityIntegration, &integration.name, &root, body);
            integration_steps.insert(integration.name.as_str(), id);
        }

        // Promotion order follows manifest order, so attaches are chained.
        let mut previous_attach: Option<StepId> = None;
        for (stage, create) in stage_steps {
            if !stage.lifecycle {
                continue;
            }
            let mut deps = vec![create];
            deps.extend(previous_attach);
            previous_attach = Some(builder.attach(&stage.name, &deps));
        }

        for mapping in &self.mappings {
            let mut deps = vec![project_step];
            deps.extend(integration_steps.get(mapping.provider.as_str()).copied());
            let body = json!({
                "name": mapping.name,
                "priority": mapping.priority,
                "claims": mapping.claims,
                "token_spec": { "scope": mapping.scope },
                "project_key": project,
            });
            let descriptor = builder
                .descriptor(ResourceKind::IdentityMapping, &mapping.name)
                .with_meta(META_PROVIDER, &mapping.provider);
            builder.push(descriptor, Action::Create { body }, &deps);
        }

        builder.finish()
    }

    fn project_body(&self) -> Value {
        json!({
            "project_key": self.project.key,
            "display_name": self.project.display_name,
            "description": self.project.description,
            "storage_quota_bytes": self.project.storage_quota_bytes,
            "admin_privileges": {
                "manage_members": self.project.manage_members,
                "manage_resources": self.project.manage_resources,
                "index_resources": true,
            },
        })
    }
}

fn unique<'a>(what: &str, names: impl Iterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if name.trim().is_empty() {
            return Err(Error::InvalidManifest(format!("{what} with empty name")));
        }
        if !seen.insert(name) {
            return Err(Error::InvalidManifest(format!("duplicate {what} '{name}'")));
        }
    }
    Ok(())
}

/// Accumulates creation steps; everything passes through the verifier.
struct CreationPlan {
    project: String,
    steps: Vec<PlanStep>,
}

impl CreationPlan {
    fn new(project: &str) -> Self {
        Self {
            project: project.to_string(),
            steps: Vec::new(),
        }
    }

    fn descriptor(&self, kind: ResourceKind, key: &str) -> ResourceDescriptor {
        ResourceDescriptor::new(kind, key, Provenance::ProjectScoped)
            .declared(Some(self.project.clone()))
    }

    fn create(&mut self, kind: ResourceKind, key: &str, deps: &[StepId], body: Value) -> StepId {
        let descriptor = self.descriptor(kind, key);
        self.push(descriptor, Action::Create { body }, deps)
    }

    fn attach(&mut self, stage: &str, deps: &[StepId]) -> StepId {
        let descriptor = self.descriptor(ResourceKind::Stage, stage);
        self.push(descriptor, Action::AttachToLifecycle, deps)
    }

    /// Returns the new step's id. An unverified step fails plan validation.
    fn push(&mut self, descriptor: ResourceDescriptor, action: Action, deps: &[StepId]) -> StepId {
        let verdict = verify(&descriptor, &self.project);
        let id = self.steps.len();
        self.steps.push(PlanStep {
            id,
            verdict,
            action,
            depends_on: deps.to_vec(),
        });
        id
    }

    fn finish(self) -> Result<ExecutionPlan> {
        ExecutionPlan::from_steps(self.project, self.steps, Vec::new())
    }
}
