//! Object store abstraction.
//!
//! The [`ObjectStore`] trait is the only shared mutable resource the
//! reconciliation passes touch. All exclusion between passes comes from
//! list-then-act checks against it, never from in-process locks. Tests use
//! the in-memory store (optionally wrapped in a recording store) instead of a
//! live backend.

use std::fmt;

use thiserror::Error;

use crate::core::selector::LabelSelector;
use crate::core::types::{ClusterRole, ObjectKey, ScopeInstance, ScopeTemplate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    ScopeTemplate,
    ScopeInstance,
    ClusterRole,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectKind::ScopeTemplate => "ScopeTemplate",
            ObjectKind::ScopeInstance => "ScopeInstance",
            ObjectKind::ClusterRole => "ClusterRole",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} {name} not found")]
    NotFound { kind: ObjectKind, name: String },

    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: ObjectKind, name: String },

    /// Optimistic concurrency check failed: the object changed since it was read.
    #[error("{name} was modified concurrently (resource version {expected}, store has {actual})")]
    Conflict {
        name: String,
        expected: u64,
        actual: u64,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(kind: ObjectKind, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Blocking client for the objects reconciliation reads and writes.
///
/// Implementations must be safe to share between passes for different
/// templates; the owner-UID label partitions the roles each pass touches.
pub trait ObjectStore {
    fn get_template(&self, key: &ObjectKey) -> Result<ScopeTemplate, StoreError>;

    /// All templates, ordered by key.
    fn list_templates(&self) -> Result<Vec<ScopeTemplate>, StoreError>;

    /// Instances in `namespace`, ordered by name.
    fn list_instances(&self, namespace: &str) -> Result<Vec<ScopeInstance>, StoreError>;

    /// Cluster roles whose labels satisfy `selector`, ordered by name.
    fn list_cluster_roles(&self, selector: &LabelSelector)
    -> Result<Vec<ClusterRole>, StoreError>;

    /// Create `role`. Returns the stored object with store-assigned fields.
    fn create_cluster_role(&self, role: &ClusterRole) -> Result<ClusterRole, StoreError>;

    /// Replace `role`, matched by name. Fails with [`StoreError::Conflict`] if
    /// the stored resource version differs from `role`'s.
    fn update_cluster_role(&self, role: &ClusterRole) -> Result<ClusterRole, StoreError>;

    fn delete_cluster_role(&self, role: &ClusterRole) -> Result<(), StoreError>;
}
