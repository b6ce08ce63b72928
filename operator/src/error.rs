//! Error taxonomy for the reconciliation passes.
//!
//! Nothing here is retried internally. Every pass is idempotent, so the
//! caller re-invokes reconciliation after any error.

use thiserror::Error;

use crate::core::selector::SelectorError;
use crate::core::types::ObjectKey;
use crate::io::store::StoreError;

/// Failure while creating or updating a template's cluster roles.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("list scope instances: {0}")]
    ListReferencers(#[source] StoreError),

    /// More than one cluster role carries the same owner and generate-name
    /// labels. Never resolved automatically.
    #[error("more than one ClusterRole found {generate_name} ({count} matches)")]
    DuplicateOwnedResource { generate_name: String, count: usize },

    #[error("build selector for {generate_name}: {source}")]
    Selector {
        generate_name: String,
        #[source]
        source: SelectorError,
    },

    #[error("list ClusterRoles for {generate_name}: {source}")]
    List {
        generate_name: String,
        #[source]
        source: StoreError,
    },

    #[error("create ClusterRole {generate_name}: {source}")]
    Create {
        generate_name: String,
        #[source]
        source: StoreError,
    },

    #[error("update ClusterRole {generate_name}: {source}")]
    Update {
        generate_name: String,
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    /// Generate-name of the descriptor that failed, if the failure is tied to one.
    pub fn generate_name(&self) -> Option<&str> {
        match self {
            SyncError::ListReferencers(_) => None,
            SyncError::DuplicateOwnedResource { generate_name, .. }
            | SyncError::Selector { generate_name, .. }
            | SyncError::List { generate_name, .. }
            | SyncError::Create { generate_name, .. }
            | SyncError::Update { generate_name, .. } => Some(generate_name),
        }
    }
}

/// Failure while deleting stale cluster roles.
#[derive(Debug, Error)]
pub enum ReapError {
    #[error("build stale selector: {0}")]
    Selector(#[source] SelectorError),

    #[error("list stale ClusterRoles: {0}")]
    List(#[source] StoreError),

    #[error("delete ClusterRole {name}: {source}")]
    Delete {
        name: String,
        #[source]
        source: StoreError,
    },
}

/// Phase of a reconciliation pass that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetch,
    Create,
    Cleanup,
}

/// Error returned by a reconciliation pass, tagged with its phase.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("get ScopeTemplate {key}: {source}")]
    Fetch {
        key: ObjectKey,
        #[source]
        source: StoreError,
    },

    #[error("create ClusterRoles: {0}")]
    Create(#[source] SyncError),

    #[error("delete stale ClusterRoles: {0}")]
    Cleanup(#[source] ReapError),
}

impl ReconcileError {
    pub fn phase(&self) -> Phase {
        match self {
            ReconcileError::Fetch { .. } => Phase::Fetch,
            ReconcileError::Create(_) => Phase::Create,
            ReconcileError::Cleanup(_) => Phase::Cleanup,
        }
    }

    pub fn generate_name(&self) -> Option<&str> {
        match self {
            ReconcileError::Create(err) => err.generate_name(),
            _ => None,
        }
    }
}
