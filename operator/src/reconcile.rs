//! One reconciliation pass for a scope template.
//!
//! A pass fetches the template, syncs its cluster roles against the instances
//! in its namespace, then reaps roles left behind by earlier specs. Every
//! phase is idempotent, so a failed pass is simply re-run by the caller; there
//! are no retries here.

use tracing::{info, instrument, warn};

use crate::core::fingerprint::fingerprint;
use crate::core::types::ObjectKey;
use crate::error::{ReconcileError, SyncError};
use crate::io::store::{ObjectStore, StoreError};
use crate::reap::reap_stale_cluster_roles;
use crate::sync::sync_cluster_roles;

/// Writes performed by a completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Fingerprint of the template spec the pass converged to.
    pub fingerprint: String,
    /// Whether any instance referenced the template.
    pub referenced: bool,
    /// Generate-names of created roles, in descriptor order.
    pub created: Vec<String>,
    /// Generate-names of updated roles, in descriptor order.
    pub updated: Vec<String>,
    /// Generate-names of roles that already matched, in descriptor order.
    pub unchanged: Vec<String>,
    /// Names of stale roles deleted, in name order.
    pub deleted: Vec<String>,
}

impl ReconcileSummary {
    pub fn writes(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The template no longer exists; nothing to do.
    TemplateGone,
    Reconciled(ReconcileSummary),
}

/// Run one reconciliation pass for the template at `key`.
///
/// Callers must not run two passes for the same key concurrently; passes for
/// different templates may run in parallel.
#[instrument(skip_all, fields(template = %key))]
pub fn reconcile<S: ObjectStore + ?Sized>(
    store: &S,
    key: &ObjectKey,
) -> Result<ReconcileOutcome, ReconcileError> {
    info!("reconciling scope template");
    let template = match store.get_template(key) {
        Ok(template) => template,
        Err(err) if err.is_not_found() => {
            info!("scope template not found, nothing to reconcile");
            return Ok(ReconcileOutcome::TemplateGone);
        }
        Err(source) => {
            return Err(ReconcileError::Fetch {
                key: key.clone(),
                source,
            });
        }
    };

    let instances = store
        .list_instances(&template.metadata.namespace)
        .map_err(|err| ReconcileError::Create(SyncError::ListReferencers(err)))?;
    let hash = fingerprint(&template.spec);
    let synced = sync_cluster_roles(store, &template, &hash, &instances)
        .map_err(ReconcileError::Create)?;

    let deleted =
        reap_stale_cluster_roles(store, template.uid(), &hash).map_err(ReconcileError::Cleanup)?;

    let summary = ReconcileSummary {
        fingerprint: hash,
        referenced: synced.referenced,
        created: synced.created,
        updated: synced.updated,
        unchanged: synced.unchanged,
        deleted,
    };
    info!(
        fingerprint = %summary.fingerprint,
        created = summary.created.len(),
        updated = summary.updated.len(),
        unchanged = summary.unchanged.len(),
        deleted = summary.deleted.len(),
        "scope template reconciled"
    );
    Ok(ReconcileOutcome::Reconciled(summary))
}

/// Reconcile every template in the store, in key order.
///
/// A failing template does not stop later ones; each result is returned next
/// to its key. Only a failure to list templates fails the whole call.
pub fn reconcile_all<S: ObjectStore + ?Sized>(
    store: &S,
) -> Result<Vec<(ObjectKey, Result<ReconcileOutcome, ReconcileError>)>, StoreError> {
    let mut keys: Vec<ObjectKey> = store
        .list_templates()?
        .iter()
        .map(|template| template.key())
        .collect();
    keys.sort();

    let mut results = Vec::with_capacity(keys.len());
    for key in keys {
        let result = reconcile(store, &key);
        if let Err(err) = &result {
            warn!(template = %key, error = %err, "reconcile failed");
        }
        results.push((key, result));
    }
    Ok(results)
}
