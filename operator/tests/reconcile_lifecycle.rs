//! Multi-pass reconciliation scenarios.
//!
//! These tests drive `reconcile` through template edits and instance changes
//! against a recording store, checking which writes each pass makes.

use scope_operator::core::fingerprint::fingerprint;
use scope_operator::core::ownership::{
    GENERATE_NAME_KEY, SCOPE_TEMPLATE_HASH_KEY, SCOPE_TEMPLATE_UID_KEY, desired_cluster_role,
};
use scope_operator::core::types::{ClusterRole, ObjectKey, ScopeTemplate};
use scope_operator::error::{Phase, ReconcileError, SyncError};
use scope_operator::io::store::{ObjectStore, StoreError};
use scope_operator::reconcile::{ReconcileOutcome, ReconcileSummary, reconcile};
use scope_operator::sync::sync_cluster_roles;
use scope_operator::test_support::{RecordingStore, StoreCall, descriptor, instance, rule, template};

fn key() -> ObjectKey {
    ObjectKey::new("team-a", "viewers")
}

fn reconciled(store: &RecordingStore, key: &ObjectKey) -> ReconcileSummary {
    match reconcile(store, key).expect("reconcile") {
        ReconcileOutcome::Reconciled(summary) => summary,
        ReconcileOutcome::TemplateGone => panic!("template {key} unexpectedly gone"),
    }
}

fn stored_template(store: &RecordingStore) -> ScopeTemplate {
    store.inner().get_template(&key()).expect("template")
}

fn must_role(store: &RecordingStore, name: &str) -> ClusterRole {
    store
        .inner()
        .cluster_role(name)
        .unwrap_or_else(|| panic!("cluster role {name} missing"))
}

/// Create → edit → converge for a single descriptor.
///
/// 1. Pass 1: "viewer" is created with payload P1 and fingerprint H1.
/// 2. The descriptor payload changes to P2 (fingerprint H2).
/// 3. Pass 2: the same role is updated in place; nothing created or deleted.
/// 4. Pass 3: no writes.
#[test]
fn payload_edit_updates_existing_role_in_place() {
    let store = RecordingStore::new();
    store.inner().put_template(template(
        "team-a",
        "viewers",
        "u1",
        vec![descriptor("viewer", vec![rule(&["get"], &["pods"])])],
    ));
    store.inner().put_instance(instance("team-a", "app", "viewers"));

    let first = reconciled(&store, &key());
    let h1 = fingerprint(&stored_template(&store).spec);
    assert_eq!(first.fingerprint, h1);
    assert_eq!(first.created, vec!["viewer"]);
    assert!(first.deleted.is_empty());

    let created = must_role(&store, "viewer");
    assert_eq!(created.metadata.label(SCOPE_TEMPLATE_UID_KEY), Some("u1"));
    assert_eq!(created.metadata.label(SCOPE_TEMPLATE_HASH_KEY), Some(h1.as_str()));
    assert_eq!(created.metadata.label(GENERATE_NAME_KEY), Some("viewer"));
    assert_eq!(created.rules, vec![rule(&["get"], &["pods"])]);

    let mut edited = stored_template(&store);
    edited.spec.cluster_roles[0].rules = vec![rule(&["get", "list", "watch"], &["pods"])];
    store.inner().put_template(edited);
    let h2 = fingerprint(&stored_template(&store).spec);
    assert_ne!(h1, h2);

    store.clear_calls();
    let second = reconciled(&store, &key());
    assert_eq!(second.updated, vec!["viewer"]);
    assert!(second.created.is_empty());
    assert!(second.deleted.is_empty());
    assert_eq!(store.writes(), vec![StoreCall::Update("viewer".to_string())]);

    let updated = must_role(&store, "viewer");
    assert_eq!(updated.metadata.uid, created.metadata.uid);
    assert_eq!(updated.metadata.label(SCOPE_TEMPLATE_HASH_KEY), Some(h2.as_str()));
    assert_eq!(updated.rules, vec![rule(&["get", "list", "watch"], &["pods"])]);
    assert_eq!(store.inner().cluster_roles().len(), 1);

    store.clear_calls();
    let third = reconciled(&store, &key());
    assert_eq!(third.writes(), 0);
    assert!(store.writes().is_empty());
}

/// Removing a descriptor leaves its role labeled with the old fingerprint;
/// the reap phase deletes it while the surviving descriptor is updated.
#[test]
fn removed_descriptor_is_reaped() {
    let store = RecordingStore::new();
    store.inner().put_template(template(
        "team-a",
        "viewers",
        "u1",
        vec![
            descriptor("viewer", vec![rule(&["get"], &["pods"])]),
            descriptor("editor", vec![rule(&["update"], &["pods"])]),
        ],
    ));
    store.inner().put_instance(instance("team-a", "app", "viewers"));
    reconciled(&store, &key());
    assert_eq!(store.inner().cluster_roles().len(), 2);

    let mut edited = stored_template(&store);
    edited.spec.cluster_roles.truncate(1);
    store.inner().put_template(edited);

    let summary = reconciled(&store, &key());
    assert_eq!(summary.updated, vec!["viewer"]);
    assert_eq!(summary.deleted, vec!["editor"]);
    assert!(store.inner().cluster_role("editor").is_none());
    assert!(store.inner().cluster_role("viewer").is_some());
}

/// Roles owned by template A are never touched by passes for template B,
/// even when B declares the same generate-name.
#[test]
fn other_templates_roles_are_isolated() {
    let store = RecordingStore::new();
    store.inner().put_template(template(
        "team-a",
        "viewers",
        "u1",
        vec![descriptor("viewer", vec![rule(&["get"], &["pods"])])],
    ));
    store.inner().put_instance(instance("team-a", "app", "viewers"));
    reconciled(&store, &key());
    let owned_by_a = must_role(&store, "viewer");

    let other = ObjectKey::new("team-b", "viewers");
    store.inner().put_template(template(
        "team-b",
        "viewers",
        "u2",
        vec![descriptor("viewer", vec![rule(&["*"], &["*"])])],
    ));
    store.inner().put_instance(instance("team-b", "app", "viewers"));

    store.clear_calls();
    let err = reconcile(&store, &other).unwrap_err();

    // Role names are cluster-wide, so B cannot claim "viewer" while A owns it.
    assert_eq!(err.phase(), Phase::Create);
    assert_eq!(err.generate_name(), Some("viewer"));
    assert!(matches!(
        err,
        ReconcileError::Create(SyncError::Create {
            source: StoreError::AlreadyExists { .. },
            ..
        })
    ));
    assert_eq!(must_role(&store, "viewer"), owned_by_a);
    assert!(
        !store
            .calls()
            .iter()
            .any(|call| matches!(call, StoreCall::Update(_) | StoreCall::Delete(_)))
    );
}

/// B's reap pass never deletes A's roles even though their fingerprint label
/// differs from B's.
#[test]
fn reap_ignores_roles_of_other_owners() {
    let store = RecordingStore::new();
    store.inner().put_template(template(
        "team-a",
        "viewers",
        "u1",
        vec![descriptor("viewer", vec![rule(&["get"], &["pods"])])],
    ));
    store.inner().put_instance(instance("team-a", "app", "viewers"));
    reconciled(&store, &key());

    let other = ObjectKey::new("team-b", "editors");
    store.inner().put_template(template(
        "team-b",
        "editors",
        "u2",
        vec![descriptor("editor", vec![rule(&["update"], &["pods"])])],
    ));
    store.inner().put_instance(instance("team-b", "app", "editors"));

    let summary = reconciled(&store, &other);
    assert_eq!(summary.created, vec!["editor"]);
    assert!(summary.deleted.is_empty());
    assert!(store.inner().cluster_role("viewer").is_some());
}

#[test]
fn unreferenced_template_creates_nothing() {
    let store = RecordingStore::new();
    store.inner().put_template(template(
        "team-a",
        "viewers",
        "u1",
        vec![descriptor("viewer", vec![rule(&["get"], &["pods"])])],
    ));
    store.inner().put_instance(instance("team-a", "app", "editors"));

    let summary = reconciled(&store, &key());
    assert!(!summary.referenced);
    assert!(store.writes().is_empty());
    assert!(store.inner().cluster_roles().is_empty());
}

/// Removing the last instance does not delete existing roles; only a
/// fingerprint change does.
#[test]
fn removing_last_instance_keeps_roles() {
    let store = RecordingStore::new();
    store.inner().put_template(template(
        "team-a",
        "viewers",
        "u1",
        vec![descriptor("viewer", vec![rule(&["get"], &["pods"])])],
    ));
    store.inner().put_instance(instance("team-a", "app", "viewers"));
    reconciled(&store, &key());

    store
        .inner()
        .remove_instance(&ObjectKey::new("team-a", "app"));
    store.clear_calls();
    let summary = reconciled(&store, &key());

    assert!(!summary.referenced);
    assert!(store.writes().is_empty());
    assert!(store.inner().cluster_role("viewer").is_some());
}

/// A template deleted between passes is reported gone; its roles are left to
/// the store's owner-reference cascade.
#[test]
fn template_deleted_between_passes_is_gone() {
    let store = RecordingStore::new();
    store.inner().put_template(template(
        "team-a",
        "viewers",
        "u1",
        vec![descriptor("viewer", vec![rule(&["get"], &["pods"])])],
    ));
    store.inner().put_instance(instance("team-a", "app", "viewers"));
    reconciled(&store, &key());

    assert!(store.inner().remove_template(&key()).is_some());
    store.clear_calls();
    let outcome = reconcile(&store, &key()).expect("reconcile");

    assert_eq!(outcome, ReconcileOutcome::TemplateGone);
    assert_eq!(store.calls(), vec![StoreCall::GetTemplate(key())]);
    assert!(store.inner().cluster_role("viewer").is_some());
}

#[test]
fn duplicate_roles_block_only_their_descriptor_pass() {
    let store = RecordingStore::new();
    let tmpl = store.inner().put_template(template(
        "team-a",
        "viewers",
        "u1",
        vec![descriptor("viewer", vec![rule(&["get"], &["pods"])])],
    ));
    store.inner().put_instance(instance("team-a", "app", "viewers"));
    let hash = fingerprint(&tmpl.spec);
    let first = desired_cluster_role(&tmpl, &tmpl.spec.cluster_roles[0], &hash);
    let mut second = first.clone();
    second.metadata.name = "viewer-2".to_string();
    store.inner().seed_cluster_role(first);
    store.inner().seed_cluster_role(second);

    let err = reconcile(&store, &key()).unwrap_err();

    assert_eq!(err.phase(), Phase::Create);
    assert_eq!(err.generate_name(), Some("viewer"));
    assert!(err.to_string().contains("more than one ClusterRole found viewer"));
    assert!(store.writes().is_empty());
    assert_eq!(store.inner().cluster_roles().len(), 2);
}

/// A pass that fails half-way converges on the next invocation.
#[test]
fn failed_pass_converges_when_rerun() {
    let store = RecordingStore::new();
    store.inner().put_template(template(
        "team-a",
        "viewers",
        "u1",
        vec![
            descriptor("viewer", vec![rule(&["get"], &["pods"])]),
            descriptor("editor", vec![rule(&["update"], &["pods"])]),
        ],
    ));
    store.inner().put_instance(instance("team-a", "app", "viewers"));
    store.fail_next(
        StoreCall::Create("editor".to_string()),
        StoreError::Unavailable("connection reset".to_string()),
    );

    let err = reconcile(&store, &key()).unwrap_err();
    assert_eq!(err.generate_name(), Some("editor"));
    assert!(store.inner().cluster_role("viewer").is_some());

    let summary = reconciled(&store, &key());
    assert_eq!(summary.unchanged, vec!["viewer"]);
    assert_eq!(summary.created, vec!["editor"]);
}

#[test]
fn sync_with_no_instances_is_a_no_op() {
    let store = RecordingStore::new();
    let tmpl = template(
        "team-a",
        "viewers",
        "u1",
        vec![descriptor("viewer", vec![rule(&["get"], &["pods"])])],
    );
    let summary = sync_cluster_roles(&store, &tmpl, &fingerprint(&tmpl.spec), &[]).expect("sync");
    assert!(!summary.referenced);
    assert!(store.calls().is_empty());
}
