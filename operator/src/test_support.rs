//! Test-only helpers: object builders, a recording store, and an on-disk
//! workspace for CLI tests.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Result;

use crate::core::selector::LabelSelector;
use crate::core::types::{
    ClusterRole, ClusterRoleDescriptor, ObjectKey, ObjectMeta, PolicyRule, ScopeInstance,
    ScopeInstanceSpec, ScopeTemplate, ScopeTemplateSpec,
};
use crate::io::config::{OperatorConfig, StoreConfig, write_config};
use crate::io::file_store::{load_store, write_store};
use crate::io::memory_store::MemoryStore;
use crate::io::store::{ObjectStore, StoreError};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

/// Create a rule over core-group `resources` with the given `verbs`.
pub fn rule(verbs: &[&str], resources: &[&str]) -> PolicyRule {
    PolicyRule {
        verbs: strings(verbs),
        api_groups: vec![String::new()],
        resources: strings(resources),
        ..PolicyRule::default()
    }
}

pub fn descriptor(generate_name: &str, rules: Vec<PolicyRule>) -> ClusterRoleDescriptor {
    ClusterRoleDescriptor {
        generate_name: generate_name.to_string(),
        rules,
    }
}

pub fn spec(cluster_roles: Vec<ClusterRoleDescriptor>) -> ScopeTemplateSpec {
    ScopeTemplateSpec { cluster_roles }
}

/// Create a template. Pass an empty `uid` to let the store assign one.
pub fn template(
    namespace: &str,
    name: &str,
    uid: &str,
    cluster_roles: Vec<ClusterRoleDescriptor>,
) -> ScopeTemplate {
    ScopeTemplate {
        metadata: ObjectMeta {
            name: name.to_string(),
            namespace: namespace.to_string(),
            uid: uid.to_string(),
            ..ObjectMeta::default()
        },
        spec: spec(cluster_roles),
    }
}

pub fn instance(namespace: &str, name: &str, template_name: &str) -> ScopeInstance {
    ScopeInstance {
        metadata: ObjectMeta {
            name: name.to_string(),
            namespace: namespace.to_string(),
            ..ObjectMeta::default()
        },
        spec: ScopeInstanceSpec {
            scope_template_name: template_name.to_string(),
        },
    }
}

/// Create an unlabeled cluster role with no rules.
pub fn role_named(name: &str) -> ClusterRole {
    ClusterRole {
        metadata: ObjectMeta {
            name: name.to_string(),
            ..ObjectMeta::default()
        },
        rules: Vec::new(),
    }
}

/// A store call observed by [`RecordingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    GetTemplate(ObjectKey),
    ListTemplates,
    ListInstances(String),
    /// Cluster role list, recorded by the selector's string form.
    List(String),
    Create(String),
    Update(String),
    Delete(String),
}

impl StoreCall {
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            StoreCall::Create(_) | StoreCall::Update(_) | StoreCall::Delete(_)
        )
    }
}

/// Wraps a [`MemoryStore`], records every call, and fails scripted calls.
///
/// A scripted failure is consumed by the first call equal to it; the inner
/// store is not touched for that call.
#[derive(Debug, Default)]
pub struct RecordingStore {
    inner: MemoryStore,
    calls: Mutex<Vec<StoreCall>>,
    faults: Mutex<Vec<(StoreCall, StoreError)>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrap(inner: MemoryStore) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    /// The wrapped store. Calls made on it directly are not recorded.
    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    pub fn fail_next(&self, call: StoreCall, error: StoreError) {
        lock(&self.faults).push((call, error));
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        lock(&self.calls).clone()
    }

    pub fn writes(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(StoreCall::is_write)
            .collect()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn record(&self, call: StoreCall) -> Result<(), StoreError> {
        lock(&self.calls).push(call.clone());
        let mut faults = lock(&self.faults);
        match faults.iter().position(|(scripted, _)| *scripted == call) {
            Some(idx) => Err(faults.remove(idx).1),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ObjectStore for RecordingStore {
    fn get_template(&self, key: &ObjectKey) -> Result<ScopeTemplate, StoreError> {
        self.record(StoreCall::GetTemplate(key.clone()))?;
        self.inner.get_template(key)
    }

    fn list_templates(&self) -> Result<Vec<ScopeTemplate>, StoreError> {
        self.record(StoreCall::ListTemplates)?;
        self.inner.list_templates()
    }

    fn list_instances(&self, namespace: &str) -> Result<Vec<ScopeInstance>, StoreError> {
        self.record(StoreCall::ListInstances(namespace.to_string()))?;
        self.inner.list_instances(namespace)
    }

    fn list_cluster_roles(
        &self,
        selector: &LabelSelector,
    ) -> Result<Vec<ClusterRole>, StoreError> {
        self.record(StoreCall::List(selector.to_string()))?;
        self.inner.list_cluster_roles(selector)
    }

    fn create_cluster_role(&self, role: &ClusterRole) -> Result<ClusterRole, StoreError> {
        self.record(StoreCall::Create(role.name().to_string()))?;
        self.inner.create_cluster_role(role)
    }

    fn update_cluster_role(&self, role: &ClusterRole) -> Result<ClusterRole, StoreError> {
        self.record(StoreCall::Update(role.name().to_string()))?;
        self.inner.update_cluster_role(role)
    }

    fn delete_cluster_role(&self, role: &ClusterRole) -> Result<(), StoreError> {
        self.record(StoreCall::Delete(role.name().to_string()))?;
        self.inner.delete_cluster_role(role)
    }
}

/// Temporary directory holding a config file and a store snapshot.
pub struct TestWorkspace {
    dir: tempfile::TempDir,
}

impl TestWorkspace {
    /// Create the workspace with the default config layout and an empty store.
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let workspace = Self { dir };
        let cfg = OperatorConfig {
            store: StoreConfig {
                path: workspace.store_path(),
            },
            ..OperatorConfig::default()
        };
        write_config(&workspace.config_path(), &cfg)?;
        workspace.write_store(&MemoryStore::new())?;
        Ok(workspace)
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join(".scope").join("config.toml")
    }

    pub fn store_path(&self) -> PathBuf {
        self.path().join(".scope").join("store.json")
    }

    pub fn write_store(&self, store: &MemoryStore) -> Result<()> {
        write_store(&self.store_path(), store)
    }

    pub fn read_store(&self) -> Result<MemoryStore> {
        load_store(&self.store_path())
    }
}
