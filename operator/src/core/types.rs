//! Object model shared by core logic and the store.
//!
//! These types mirror the shape of the objects the operator reads and writes.
//! They carry no behavior beyond small accessors so they can be built freely
//! in tests and serialized into store snapshots.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Namespaced identity of a stored object (`namespace/name`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectKey {
    pub namespace: String,
    pub name: String,
}

impl ObjectKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

impl FromStr for ObjectKey {
    type Err = String;

    /// Parse `namespace/name`. Both halves must be non-empty.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (namespace, name) = raw
            .split_once('/')
            .ok_or_else(|| format!("expected <namespace>/<name>, got '{raw}'"))?;
        if namespace.is_empty() || name.is_empty() || name.contains('/') {
            return Err(format!("expected <namespace>/<name>, got '{raw}'"));
        }
        Ok(Self::new(namespace, name))
    }
}

/// Reference from a child object back to the object that owns it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: String,
}

/// Metadata common to every stored object.
///
/// `uid` and `resource_version` are assigned by the store. Cluster-scoped
/// objects leave `namespace` empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub uid: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
    pub resource_version: u64,
}

impl ObjectMeta {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// A single RBAC rule. Opaque to reconciliation apart from equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PolicyRule {
    pub verbs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub api_groups: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resource_names: Vec<String>,
    #[serde(rename = "nonResourceURLs", skip_serializing_if = "Vec::is_empty")]
    pub non_resource_urls: Vec<String>,
}

/// One child role declared by a template.
///
/// `generate_name` is unique within the template and is the stable key used
/// to match the descriptor to its cluster role across passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRoleDescriptor {
    pub generate_name: String,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScopeTemplateSpec {
    pub cluster_roles: Vec<ClusterRoleDescriptor>,
}

/// Desired-state declaration for a set of cluster roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeTemplate {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ScopeTemplateSpec,
}

impl ScopeTemplate {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.metadata.namespace, &self.metadata.name)
    }

    pub fn uid(&self) -> &str {
        &self.metadata.uid
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScopeInstanceSpec {
    /// Name of the template (in the instance's namespace) this instance uses.
    pub scope_template_name: String,
}

/// Referencer: asserts that a template is in use within its namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeInstance {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: ScopeInstanceSpec,
}

impl ScopeInstance {
    pub fn key(&self) -> ObjectKey {
        ObjectKey::new(&self.metadata.namespace, &self.metadata.name)
    }
}

/// Cluster-scoped child object created on a template's behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRole {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub rules: Vec<PolicyRule>,
}

impl ClusterRole {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}
