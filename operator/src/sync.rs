//! Create and update the cluster roles a template declares.

use tracing::{debug, info, instrument, warn};

use crate::core::ownership::{GENERATE_NAME_KEY, SCOPE_TEMPLATE_UID_KEY};
use crate::core::plan::{ChildAction, plan_cluster_role, referencing_instances};
use crate::core::selector::LabelSelector;
use crate::core::types::{ClusterRoleDescriptor, ScopeInstance, ScopeTemplate};
use crate::error::SyncError;
use crate::io::store::ObjectStore;

/// What a sync pass did, by descriptor generate-name in descriptor order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    /// False if no instance references the template; nothing was written.
    pub referenced: bool,
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
}

/// Converge the template's cluster roles, one descriptor at a time in
/// descriptor order.
///
/// `fingerprint` is the template's current fingerprint; every role written
/// is labeled with it.
///
/// Does nothing unless at least one of `instances` references the template.
/// Stops at the first failing descriptor; earlier writes are kept and the next
/// pass picks up from the store's state.
#[instrument(skip_all, fields(template = %template.key()))]
pub fn sync_cluster_roles<S: ObjectStore + ?Sized>(
    store: &S,
    template: &ScopeTemplate,
    fingerprint: &str,
    instances: &[ScopeInstance],
) -> Result<SyncSummary, SyncError> {
    let mut summary = SyncSummary::default();
    let referencers = referencing_instances(template, instances);
    if referencers.is_empty() {
        debug!("no scope instance references template, skipping");
        return Ok(summary);
    }
    summary.referenced = true;
    info!(
        referencers = referencers.len(),
        "scope instance found that references template"
    );

    for descriptor in &template.spec.cluster_roles {
        sync_descriptor(store, template, descriptor, fingerprint, &mut summary)?;
    }
    Ok(summary)
}

fn sync_descriptor<S: ObjectStore + ?Sized>(
    store: &S,
    template: &ScopeTemplate,
    descriptor: &ClusterRoleDescriptor,
    hash: &str,
    summary: &mut SyncSummary,
) -> Result<(), SyncError> {
    let generate_name = descriptor.generate_name.as_str();
    let selector = LabelSelector::new()
        .equals(SCOPE_TEMPLATE_UID_KEY, template.uid())
        .and_then(|s| s.equals(GENERATE_NAME_KEY, generate_name))
        .map_err(|source| SyncError::Selector {
            generate_name: generate_name.to_string(),
            source,
        })?;
    let existing = store
        .list_cluster_roles(&selector)
        .map_err(|source| SyncError::List {
            generate_name: generate_name.to_string(),
            source,
        })?;

    let action = plan_cluster_role(template, descriptor, hash, existing).inspect_err(|err| {
        if let SyncError::DuplicateOwnedResource { count, .. } = err {
            warn!(generate_name, count, "refusing to resolve duplicate cluster roles");
        } else {
            warn!(generate_name, error = %err, "cannot plan cluster role");
        }
    })?;

    match action {
        ChildAction::Create(role) => {
            store
                .create_cluster_role(&role)
                .map_err(|source| SyncError::Create {
                    generate_name: generate_name.to_string(),
                    source,
                })?;
            info!(generate_name, "created cluster role");
            summary.created.push(generate_name.to_string());
        }
        ChildAction::Update(role) => {
            store
                .update_cluster_role(&role)
                .map_err(|source| SyncError::Update {
                    generate_name: generate_name.to_string(),
                    source,
                })?;
            info!(generate_name, "updated cluster role");
            summary.updated.push(generate_name.to_string());
        }
        ChildAction::Unchanged => {
            debug!(generate_name, "existing cluster role does not need to be updated");
            summary.unchanged.push(generate_name.to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::fingerprint;
    use crate::core::ownership::{SCOPE_TEMPLATE_HASH_KEY, desired_cluster_role};
    use crate::io::memory_store::MemoryStore;
    use crate::io::store::StoreError;
    use crate::test_support::{
        RecordingStore, StoreCall, descriptor, instance, rule, template,
    };

    fn sync<S: ObjectStore>(
        store: &S,
        tmpl: &ScopeTemplate,
        instances: &[ScopeInstance],
    ) -> Result<SyncSummary, SyncError> {
        sync_cluster_roles(store, tmpl, &fingerprint(&tmpl.spec), instances)
    }

    fn two_role_template() -> ScopeTemplate {
        template(
            "team-a",
            "viewers",
            "u1",
            vec![
                descriptor("viewer", vec![rule(&["get"], &["pods"])]),
                descriptor("editor", vec![rule(&["update"], &["pods"])]),
            ],
        )
    }

    #[test]
    fn creates_every_missing_role() {
        let store = MemoryStore::new();
        let tmpl = two_role_template();
        let instances = vec![instance("team-a", "app", "viewers")];

        let summary = sync(&store, &tmpl, &instances).expect("sync");

        assert_eq!(summary.created, vec!["viewer", "editor"]);
        let viewer = store.cluster_role("viewer").expect("viewer");
        assert_eq!(
            viewer.metadata.label(SCOPE_TEMPLATE_HASH_KEY),
            Some(fingerprint(&tmpl.spec).as_str())
        );
    }

    #[test]
    fn roles_are_labeled_with_given_fingerprint() {
        let store = MemoryStore::new();
        let tmpl = two_role_template();

        sync_cluster_roles(&store, &tmpl, "h-given", &[instance("team-a", "app", "viewers")])
            .expect("sync");

        for name in ["viewer", "editor"] {
            let role = store.cluster_role(name).expect("role");
            assert_eq!(role.metadata.label(SCOPE_TEMPLATE_HASH_KEY), Some("h-given"));
        }
    }

    #[test]
    fn unreferenced_template_writes_nothing() {
        let store = RecordingStore::new();
        let tmpl = two_role_template();
        let instances = vec![
            instance("team-a", "app", "editors"),
            instance("team-b", "app", "viewers"),
        ];

        let summary = sync(&store, &tmpl, &instances).expect("sync");

        assert!(!summary.referenced);
        assert!(store.calls().is_empty());
    }

    #[test]
    fn unchanged_role_does_not_stop_later_descriptors() {
        let store = RecordingStore::new();
        let tmpl = two_role_template();
        let hash = fingerprint(&tmpl.spec);
        store
            .inner()
            .create_cluster_role(&desired_cluster_role(
                &tmpl,
                &tmpl.spec.cluster_roles[0],
                &hash,
            ))
            .expect("seed viewer");

        let summary = sync(&store, &tmpl, &[instance("team-a", "app", "viewers")]).expect("sync");

        assert_eq!(summary.unchanged, vec!["viewer"]);
        assert_eq!(summary.created, vec!["editor"]);
        assert_eq!(store.writes(), vec![StoreCall::Create("editor".to_string())]);
    }

    #[test]
    fn duplicate_roles_fail_without_writes_for_that_descriptor() {
        let store = RecordingStore::new();
        let tmpl = two_role_template();
        let hash = fingerprint(&tmpl.spec);
        let first = desired_cluster_role(&tmpl, &tmpl.spec.cluster_roles[0], &hash);
        let mut second = first.clone();
        second.metadata.name = "viewer-copy".to_string();
        store.inner().seed_cluster_role(first);
        store.inner().seed_cluster_role(second);

        let err = sync(&store, &tmpl, &[instance("team-a", "app", "viewers")]).unwrap_err();

        assert!(matches!(err, SyncError::DuplicateOwnedResource { count: 2, .. }));
        assert_eq!(err.generate_name(), Some("viewer"));
        assert!(store.writes().is_empty());
    }

    #[test]
    fn create_failure_is_surfaced_with_descriptor() {
        let store = RecordingStore::new();
        store.fail_next(
            StoreCall::Create("editor".to_string()),
            StoreError::Unavailable("connection refused".to_string()),
        );
        let tmpl = two_role_template();

        let err = sync(&store, &tmpl, &[instance("team-a", "app", "viewers")]).unwrap_err();

        assert!(matches!(err, SyncError::Create { .. }));
        assert_eq!(err.generate_name(), Some("editor"));
        assert!(store.inner().cluster_role("viewer").is_some());
        assert!(store.inner().cluster_role("editor").is_none());
    }

    #[test]
    fn invalid_generate_name_is_a_selector_error() {
        let store = RecordingStore::new();
        let tmpl = template(
            "team-a",
            "viewers",
            "u1",
            vec![descriptor("not a label", Vec::new())],
        );

        let err = sync(&store, &tmpl, &[instance("team-a", "app", "viewers")]).unwrap_err();

        assert!(matches!(err, SyncError::Selector { .. }));
        assert!(store.calls().is_empty());
    }

    #[test]
    fn roles_of_other_templates_are_never_listed() {
        let store = RecordingStore::new();
        let tmpl = two_role_template();
        sync(&store, &tmpl, &[instance("team-a", "app", "viewers")]).expect("sync");

        for call in store.calls() {
            if let StoreCall::List(selector) = call {
                assert!(selector.contains(&format!("{SCOPE_TEMPLATE_UID_KEY}=u1")));
            }
        }
    }
}
