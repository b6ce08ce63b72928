//! Delete cluster roles abandoned by a spec change.
//!
//! A role owned by a template but labeled with a fingerprint other than the
//! template's current one was written under an older spec. This covers both
//! removed descriptors and edited ones in a single check.

use tracing::{debug, info, instrument};

use crate::core::ownership::{SCOPE_TEMPLATE_HASH_KEY, SCOPE_TEMPLATE_UID_KEY};
use crate::core::selector::LabelSelector;
use crate::error::ReapError;
use crate::io::store::ObjectStore;

/// Delete every role owned by `template_uid` whose fingerprint label is not
/// `current_fingerprint`. Returns the names deleted by this call, in list order.
///
/// A role that is already gone counts as deleted. Any other delete failure
/// stops the pass; roles deleted before it stay deleted.
#[instrument(skip(store))]
pub fn reap_stale_cluster_roles<S: ObjectStore + ?Sized>(
    store: &S,
    template_uid: &str,
    current_fingerprint: &str,
) -> Result<Vec<String>, ReapError> {
    let selector = LabelSelector::new()
        .equals(SCOPE_TEMPLATE_UID_KEY, template_uid)
        .and_then(|s| s.not_equals(SCOPE_TEMPLATE_HASH_KEY, current_fingerprint))
        .map_err(ReapError::Selector)?;
    let stale = store
        .list_cluster_roles(&selector)
        .map_err(ReapError::List)?;

    let mut deleted = Vec::with_capacity(stale.len());
    for role in &stale {
        match store.delete_cluster_role(role) {
            Ok(()) => info!(name = role.name(), "deleted stale cluster role"),
            Err(err) if err.is_not_found() => {
                debug!(name = role.name(), "stale cluster role already gone");
            }
            Err(source) => {
                return Err(ReapError::Delete {
                    name: role.name().to_string(),
                    source,
                });
            }
        }
        deleted.push(role.name().to_string());
    }
    Ok(deleted)
}
