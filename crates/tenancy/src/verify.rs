//! Membership verification.
//!
//! A resource belongs to the target project only when its own record names
//! that project. Nothing else counts: not provenance, not name prefixes,
//! not substring containment. Ambiguity always resolves to "excluded".

use crate::types::{MembershipVerdict, Provenance, ResourceDescriptor, VerificationMethod};

/// Decide whether `descriptor` belongs to `project_key`.
///
/// Every verdict is logged at info level with its method.
#[must_use]
pub fn verify(descriptor: &ResourceDescriptor, project_key: &str) -> MembershipVerdict {
    let verdict = decide(descriptor, project_key);
    log::info!(
        "verdict {}: verified={} method={} ({})",
        descriptor,
        verdict.verified,
        verdict.method,
        verdict.reason
    );
    verdict
}

/// Verify a batch, preserving order.
#[must_use]
pub fn verify_all(descriptors: &[ResourceDescriptor], project_key: &str) -> Vec<MembershipVerdict> {
    descriptors.iter().map(|d| verify(d, project_key)).collect()
}

fn decide(descriptor: &ResourceDescriptor, project_key: &str) -> MembershipVerdict {
    let source = match descriptor.provenance {
        Provenance::ProjectScoped => "project-scoped query",
        Provenance::Unfiltered => "unfiltered listing",
    };

    if project_key.is_empty() {
        return unverifiable(descriptor, "no target project key".to_string());
    }

    match descriptor.declared_project_key.as_deref() {
        Some(declared) => {
            let verified = declared == project_key;
            let reason = if verified {
                format!("record declares project '{declared}' ({source})")
            } else {
                format!("record declares project '{declared}', not '{project_key}' ({source})")
            };
            MembershipVerdict {
                descriptor: descriptor.clone(),
                verified,
                method: VerificationMethod::ExactProjectField,
                reason,
            }
        }
        None => unverifiable(
            descriptor,
            format!("record has no project field ({source})"),
        ),
    }
}

fn unverifiable(descriptor: &ResourceDescriptor, reason: String) -> MembershipVerdict {
    MembershipVerdict {
        descriptor: descriptor.clone(),
        verified: false,
        method: VerificationMethod::Unverifiable,
        reason,
    }
}
