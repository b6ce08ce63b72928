//! Per-descriptor create/update decisions.
//!
//! Given what the store already holds for one descriptor, decide the single
//! write (if any) that brings it to the desired state. No store access here;
//! [`crate::sync`] performs the listed reads and the chosen write.

use crate::core::ownership::{desired_cluster_role, has_owner_reference, is_owned_by_label};
use crate::core::types::{ClusterRole, ClusterRoleDescriptor, ScopeInstance, ScopeTemplate};
use crate::error::SyncError;

/// Write needed to converge one descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChildAction {
    /// No role exists for the descriptor yet.
    Create(ClusterRole),
    /// The existing role drifted. Carries the existing object with labels,
    /// owner references and rules overwritten; name and resource version kept.
    Update(ClusterRole),
    /// The existing role already matches.
    Unchanged,
}

/// Decide how to converge `descriptor` given the `existing` roles listed for
/// it (owner-UID and generate-name labels already matched).
///
/// More than one existing role is a consistency violation and is reported as
/// [`SyncError::DuplicateOwnedResource`] rather than resolved.
pub fn plan_cluster_role(
    template: &ScopeTemplate,
    descriptor: &ClusterRoleDescriptor,
    fingerprint: &str,
    mut existing: Vec<ClusterRole>,
) -> Result<ChildAction, SyncError> {
    if existing.len() > 1 {
        return Err(SyncError::DuplicateOwnedResource {
            generate_name: descriptor.generate_name.clone(),
            count: existing.len(),
        });
    }

    let desired = desired_cluster_role(template, descriptor, fingerprint);
    let Some(mut current) = existing.pop() else {
        return Ok(ChildAction::Create(desired));
    };

    if is_owned_by_label(&current, template)
        && has_owner_reference(&current, template)
        && current.rules == desired.rules
        && current.metadata.labels == desired.metadata.labels
    {
        return Ok(ChildAction::Unchanged);
    }

    current.metadata.labels = desired.metadata.labels;
    current.metadata.owner_references = desired.metadata.owner_references;
    current.rules = desired.rules;
    Ok(ChildAction::Update(current))
}

/// Instances in the template's namespace that name the template.
pub fn referencing_instances<'a>(
    template: &ScopeTemplate,
    instances: &'a [ScopeInstance],
) -> Vec<&'a ScopeInstance> {
    instances
        .iter()
        .filter(|instance| {
            instance.metadata.namespace == template.metadata.namespace
                && instance.spec.scope_template_name == template.metadata.name
        })
        .collect()
}
