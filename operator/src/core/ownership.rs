//! Ownership labels and owner references stamped onto cluster roles.
//!
//! The label keys below are a compatibility surface: roles written by one
//! release must stay recognizable by the next, so they never change.

use std::collections::BTreeMap;

use crate::core::types::{
    ClusterRole, ClusterRoleDescriptor, ObjectMeta, OwnerReference, ScopeTemplate,
};

/// Tracks the template that owns a cluster role.
pub const SCOPE_TEMPLATE_UID_KEY: &str = "operators.coreos.io/scopeTemplateUID";

/// Tracks the template fingerprint a cluster role was last written under.
pub const SCOPE_TEMPLATE_HASH_KEY: &str = "operators.coreos.io/scopeTemplateHash";

/// Tracks which descriptor of the owning template a cluster role belongs to.
pub const GENERATE_NAME_KEY: &str = "operators.coreos.io/generateName";

pub const SCOPE_TEMPLATE_API_VERSION: &str = "operators.io.operator-framework/v1";
pub const SCOPE_TEMPLATE_KIND: &str = "ScopeTemplate";

/// Owner reference pointing back at `template`.
pub fn owner_reference(template: &ScopeTemplate) -> OwnerReference {
    OwnerReference {
        api_version: SCOPE_TEMPLATE_API_VERSION.to_string(),
        kind: SCOPE_TEMPLATE_KIND.to_string(),
        name: template.metadata.name.clone(),
        uid: template.metadata.uid.clone(),
    }
}

/// The full label set a cluster role owned by `template_uid` must carry.
pub fn ownership_labels(
    template_uid: &str,
    fingerprint: &str,
    generate_name: &str,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (SCOPE_TEMPLATE_UID_KEY.to_string(), template_uid.to_string()),
        (SCOPE_TEMPLATE_HASH_KEY.to_string(), fingerprint.to_string()),
        (GENERATE_NAME_KEY.to_string(), generate_name.to_string()),
    ])
}

/// Metadata for the cluster role that `descriptor` of `template` should produce.
///
/// `fingerprint` is the template's current fingerprint, computed once per pass
/// by the caller.
pub fn child_metadata(
    template: &ScopeTemplate,
    descriptor: &ClusterRoleDescriptor,
    fingerprint: &str,
) -> ObjectMeta {
    ObjectMeta {
        name: descriptor.generate_name.clone(),
        labels: ownership_labels(template.uid(), fingerprint, &descriptor.generate_name),
        owner_references: vec![owner_reference(template)],
        ..ObjectMeta::default()
    }
}

/// The cluster role `descriptor` of `template` should produce.
pub fn desired_cluster_role(
    template: &ScopeTemplate,
    descriptor: &ClusterRoleDescriptor,
    fingerprint: &str,
) -> ClusterRole {
    ClusterRole {
        metadata: child_metadata(template, descriptor, fingerprint),
        rules: descriptor.rules.clone(),
    }
}

/// True if the role's owner-UID label names `template`.
pub fn is_owned_by_label(role: &ClusterRole, template: &ScopeTemplate) -> bool {
    role.metadata.label(SCOPE_TEMPLATE_UID_KEY) == Some(template.uid())
}

/// True if the role carries an owner reference equal to the one `template` would set.
pub fn has_owner_reference(role: &ClusterRole, template: &ScopeTemplate) -> bool {
    let expected = owner_reference(template);
    role.metadata.owner_references.contains(&expected)
}
