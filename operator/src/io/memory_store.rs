//! In-memory object store.
//!
//! Backs the CLI (via [`crate::io::file_store`]) and the tests. Enforces the
//! same write rules a real store would: unique cluster role names, resource
//! version checks on update, and `NotFound` for missing objects.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::core::selector::LabelSelector;
use crate::core::types::{ClusterRole, ObjectKey, ScopeInstance, ScopeTemplate};
use crate::io::store::{ObjectKind, ObjectStore, StoreError};

/// Serializable contents of a store, ordered by key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub templates: Vec<ScopeTemplate>,
    pub instances: Vec<ScopeInstance>,
    pub cluster_roles: Vec<ClusterRole>,
    /// Counter used to assign uids to objects created without one.
    pub next_uid: u64,
}

#[derive(Debug, Default)]
struct State {
    templates: BTreeMap<ObjectKey, ScopeTemplate>,
    instances: BTreeMap<ObjectKey, ScopeInstance>,
    cluster_roles: BTreeMap<String, ClusterRole>,
    next_uid: u64,
}

impl State {
    fn assign_uid(&mut self, uid: &mut String) {
        if uid.is_empty() {
            self.next_uid += 1;
            *uid = format!("uid-{}", self.next_uid);
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a snapshot. Templates and instances without a uid
    /// get one, as if they had been put into the store.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        let mut state = State {
            cluster_roles: snapshot
                .cluster_roles
                .into_iter()
                .map(|r| (r.metadata.name.clone(), r))
                .collect(),
            next_uid: snapshot.next_uid,
            ..State::default()
        };
        for mut template in snapshot.templates {
            state.assign_uid(&mut template.metadata.uid);
            state.templates.insert(template.key(), template);
        }
        for mut instance in snapshot.instances {
            state.assign_uid(&mut instance.metadata.uid);
            state.instances.insert(instance.key(), instance);
        }
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        let state = self.lock();
        StoreSnapshot {
            templates: state.templates.values().cloned().collect(),
            instances: state.instances.values().cloned().collect(),
            cluster_roles: state.cluster_roles.values().cloned().collect(),
            next_uid: state.next_uid,
        }
    }

    /// Insert or replace a template, assigning a uid if it has none.
    /// Returns the stored template.
    pub fn put_template(&self, mut template: ScopeTemplate) -> ScopeTemplate {
        let mut state = self.lock();
        state.assign_uid(&mut template.metadata.uid);
        template.metadata.resource_version += 1;
        state.templates.insert(template.key(), template.clone());
        template
    }

    pub fn remove_template(&self, key: &ObjectKey) -> Option<ScopeTemplate> {
        self.lock().templates.remove(key)
    }

    pub fn put_instance(&self, mut instance: ScopeInstance) -> ScopeInstance {
        let mut state = self.lock();
        state.assign_uid(&mut instance.metadata.uid);
        state.instances.insert(instance.key(), instance.clone());
        instance
    }

    pub fn remove_instance(&self, key: &ObjectKey) -> Option<ScopeInstance> {
        self.lock().instances.remove(key)
    }

    /// Insert a cluster role as-is, bypassing create checks. Used to seed
    /// fixtures, including inconsistent ones.
    pub fn seed_cluster_role(&self, role: ClusterRole) {
        self.lock()
            .cluster_roles
            .insert(role.metadata.name.clone(), role);
    }

    pub fn cluster_role(&self, name: &str) -> Option<ClusterRole> {
        self.lock().cluster_roles.get(name).cloned()
    }

    pub fn cluster_roles(&self) -> Vec<ClusterRole> {
        self.lock().cluster_roles.values().cloned().collect()
    }

    // A panic while holding the lock cannot leave a half-applied write: every
    // mutation is a single map insert or remove.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ObjectStore for MemoryStore {
    fn get_template(&self, key: &ObjectKey) -> Result<ScopeTemplate, StoreError> {
        self.lock()
            .templates
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(ObjectKind::ScopeTemplate, key.to_string()))
    }

    fn list_templates(&self) -> Result<Vec<ScopeTemplate>, StoreError> {
        Ok(self.lock().templates.values().cloned().collect())
    }

    fn list_instances(&self, namespace: &str) -> Result<Vec<ScopeInstance>, StoreError> {
        Ok(self
            .lock()
            .instances
            .values()
            .filter(|instance| instance.metadata.namespace == namespace)
            .cloned()
            .collect())
    }

    fn list_cluster_roles(
        &self,
        selector: &LabelSelector,
    ) -> Result<Vec<ClusterRole>, StoreError> {
        let roles: Vec<ClusterRole> = self
            .lock()
            .cluster_roles
            .values()
            .filter(|role| selector.matches(&role.metadata.labels))
            .cloned()
            .collect();
        trace!(%selector, matched = roles.len(), "listed cluster roles");
        Ok(roles)
    }

    fn create_cluster_role(&self, role: &ClusterRole) -> Result<ClusterRole, StoreError> {
        let mut state = self.lock();
        if state.cluster_roles.contains_key(role.name()) {
            return Err(StoreError::AlreadyExists {
                kind: ObjectKind::ClusterRole,
                name: role.name().to_string(),
            });
        }
        let mut stored = role.clone();
        state.assign_uid(&mut stored.metadata.uid);
        stored.metadata.resource_version = 1;
        state
            .cluster_roles
            .insert(stored.metadata.name.clone(), stored.clone());
        Ok(stored)
    }

    fn update_cluster_role(&self, role: &ClusterRole) -> Result<ClusterRole, StoreError> {
        let mut state = self.lock();
        let current = state
            .cluster_roles
            .get_mut(role.name())
            .ok_or_else(|| StoreError::not_found(ObjectKind::ClusterRole, role.name()))?;
        if current.metadata.resource_version != role.metadata.resource_version {
            return Err(StoreError::Conflict {
                name: role.name().to_string(),
                expected: role.metadata.resource_version,
                actual: current.metadata.resource_version,
            });
        }
        let mut stored = role.clone();
        stored.metadata.uid = current.metadata.uid.clone();
        stored.metadata.resource_version = current.metadata.resource_version + 1;
        *current = stored.clone();
        Ok(stored)
    }

    fn delete_cluster_role(&self, role: &ClusterRole) -> Result<(), StoreError> {
        self.lock()
            .cluster_roles
            .remove(role.name())
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(ObjectKind::ClusterRole, role.name()))
    }
}
