/*
 * Copyright (C) 2025 The Nanomesh Authors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 * http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Read-only projection of the cluster's workload graph.
//!
//! A [`ClusterSnapshot`] is an immutable view assembled by the external
//! watcher; the stat core takes one snapshot per request and never writes
//! back. All collections are keyed `(namespace, name)` so iteration order is
//! deterministic and response rows come out sorted without extra work.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, RwLock};

use super::deployment::Deployment;
use super::namespace::Namespace;
use super::pod::{ObjectMeta, Pod};
use super::replicaset::ReplicaSet;
use super::resources::ResourceKind;
use super::service::Service;

pub type ObjectKey = (String, String);

/// Identity of one topology object addressed by a stat row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyRef {
    pub namespace: String,
    pub name: String,
}

fn object_key(metadata: &ObjectMeta) -> ObjectKey {
    (
        metadata.namespace.clone().unwrap_or_default(),
        metadata.name.clone().unwrap_or_default(),
    )
}

#[derive(Debug, Default)]
pub struct ClusterSnapshot {
    namespaces: BTreeMap<String, Namespace>,
    deployments: BTreeMap<ObjectKey, Deployment>,
    replica_sets: BTreeMap<ObjectKey, ReplicaSet>,
    pods: BTreeMap<ObjectKey, Pod>,
    services: BTreeMap<ObjectKey, Service>,
}

impl ClusterSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_namespace(&mut self, namespace: Namespace) {
        let name = namespace.metadata.name.clone().unwrap_or_default();
        self.namespaces.insert(name, namespace);
    }

    pub fn insert_deployment(&mut self, deployment: Deployment) {
        self.deployments
            .insert(object_key(&deployment.metadata), deployment);
    }

    pub fn insert_replica_set(&mut self, replica_set: ReplicaSet) {
        self.replica_sets
            .insert(object_key(&replica_set.metadata), replica_set);
    }

    pub fn insert_pod(&mut self, pod: Pod) {
        self.pods.insert(object_key(&pod.metadata), pod);
    }

    pub fn insert_service(&mut self, service: Service) {
        self.services.insert(object_key(&service.metadata), service);
    }

    /// The topology objects a request addresses: the named object, or every
    /// object of the kind in scope. An empty namespace spans all namespaces.
    /// Results are `(namespace, name)` ascending.
    pub fn rows(&self, kind: ResourceKind, namespace: &str, name: &str) -> Vec<TopologyRef> {
        match kind {
            ResourceKind::Authority => Vec::new(),
            ResourceKind::Namespace => self
                .namespaces
                .keys()
                .filter(|candidate| name.is_empty() || candidate.as_str() == name)
                .map(|candidate| TopologyRef {
                    namespace: String::new(),
                    name: candidate.clone(),
                })
                .collect(),
            ResourceKind::Pod => scan_keys(&self.pods, namespace, name),
            ResourceKind::Deployment => scan_keys(&self.deployments, namespace, name),
            ResourceKind::ReplicaSet => scan_keys(&self.replica_sets, namespace, name),
            ResourceKind::Service => scan_keys(&self.services, namespace, name),
        }
    }

    /// Whether a topology object with this identity exists. Authorities are
    /// not cluster objects and never exist here.
    pub fn entity_exists(&self, kind: ResourceKind, namespace: &str, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        let key = (namespace.to_string(), name.to_string());
        match kind {
            ResourceKind::Authority => false,
            ResourceKind::Namespace => self.namespaces.contains_key(name),
            ResourceKind::Pod => self.pods.contains_key(&key),
            ResourceKind::Deployment => self.deployments.contains_key(&key),
            ResourceKind::ReplicaSet => self.replica_sets.contains_key(&key),
            ResourceKind::Service => self.services.contains_key(&key),
        }
    }

    /// Pods owned directly or transitively by one topology object.
    ///
    /// Ownership traversal: `deployment -> replicasets -> pods` through owner
    /// references, falling back to the workload's label selector for pods the
    /// watcher has not linked; `service -> pods` through the service selector.
    /// For the kind `namespace`, `name` is the namespace itself.
    pub fn owned_pods(&self, kind: ResourceKind, namespace: &str, name: &str) -> Vec<&Pod> {
        match kind {
            ResourceKind::Authority => Vec::new(),
            ResourceKind::Pod => self
                .pods
                .get(&(namespace.to_string(), name.to_string()))
                .into_iter()
                .collect(),
            ResourceKind::Namespace => self
                .pods
                .iter()
                .filter(|((pod_ns, _), _)| pod_ns == name)
                .map(|(_, pod)| pod)
                .collect(),
            ResourceKind::Deployment => {
                let Some(deployment) = self
                    .deployments
                    .get(&(namespace.to_string(), name.to_string()))
                else {
                    return Vec::new();
                };
                self.pods_in(namespace)
                    .filter(|pod| match pod.metadata.owner_of_kind("ReplicaSet") {
                        Some(replica_set) => self
                            .replica_sets
                            .get(&(namespace.to_string(), replica_set.to_string()))
                            .and_then(|rs| rs.metadata.owner_of_kind("Deployment"))
                            == Some(name),
                        None => deployment.spec.selector.matches(&pod.metadata.labels),
                    })
                    .collect()
            }
            ResourceKind::ReplicaSet => {
                let Some(replica_set) = self
                    .replica_sets
                    .get(&(namespace.to_string(), name.to_string()))
                else {
                    return Vec::new();
                };
                self.pods_in(namespace)
                    .filter(|pod| match pod.metadata.owner_of_kind("ReplicaSet") {
                        Some(owner) => owner == name,
                        None => replica_set.spec.selector.matches(&pod.metadata.labels),
                    })
                    .collect()
            }
            ResourceKind::Service => {
                let Some(service) = self
                    .services
                    .get(&(namespace.to_string(), name.to_string()))
                else {
                    return Vec::new();
                };
                self.pods_in(namespace)
                    .filter(|pod| service.selects(&pod.metadata.labels))
                    .collect()
            }
        }
    }

    /// Skip-rule predicate: does any pod owned by the selector run?
    pub fn has_running_pods(&self, kind: ResourceKind, namespace: &str, name: &str) -> bool {
        self.rows(kind, namespace, name).iter().any(|row| {
            self.owned_pods(kind, &row.namespace, &row.name)
                .iter()
                .any(|pod| pod.is_running())
        })
    }

    fn pods_in<'a>(&'a self, namespace: &str) -> impl Iterator<Item = &'a Pod> + 'a {
        let namespace = namespace.to_string();
        self.pods
            .iter()
            .filter(move |((pod_ns, _), _)| *pod_ns == namespace)
            .map(|(_, pod)| pod)
    }
}

fn scan_keys<T>(map: &BTreeMap<ObjectKey, T>, namespace: &str, name: &str) -> Vec<TopologyRef> {
    map.keys()
        .filter(|(key_ns, key_name)| {
            (namespace.is_empty() || key_ns == namespace)
                && (name.is_empty() || key_name == name)
        })
        .map(|(key_ns, key_name)| TopologyRef {
            namespace: key_ns.clone(),
            name: key_name.clone(),
        })
        .collect()
}

/// Holds the latest snapshot published by the external watcher. Readers take
/// a snapshot at request entry; until the first sync every read fails and the
/// request is answered `Unavailable`.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    current: RwLock<Option<Arc<ClusterSnapshot>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&self, snapshot: ClusterSnapshot) {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(Arc::new(snapshot));
    }

    pub fn snapshot(&self) -> Result<Arc<ClusterSnapshot>, TopologyError> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone().ok_or_else(TopologyError::not_synced)
    }
}

#[derive(Debug)]
pub struct TopologyError(String);

impl TopologyError {
    fn not_synced() -> Self {
        Self("cluster topology has not completed an initial sync".to_string())
    }
}

impl fmt::Display for TopologyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for TopologyError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nanomesh::test_support::{
        deployment, namespace, pod, pod_owned_by, replica_set, service,
    };

    fn names(refs: &[TopologyRef]) -> Vec<&str> {
        refs.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn rows_are_sorted_and_scoped() {
        let mut snapshot = ClusterSnapshot::new();
        snapshot.insert_pod(pod("zeta", "books", &[], "Running", None));
        snapshot.insert_pod(pod("alpha", "books", &[], "Running", None));
        snapshot.insert_pod(pod("alpha", "emojivoto", &[], "Running", None));

        let scoped = snapshot.rows(ResourceKind::Pod, "books", "");
        assert_eq!(names(&scoped), vec!["alpha", "zeta"]);

        let everything = snapshot.rows(ResourceKind::Pod, "", "");
        assert_eq!(everything.len(), 3);
        assert_eq!(everything[0].namespace, "books");
    }

    #[test]
    fn deployment_owns_pods_through_replica_sets() {
        let mut snapshot = ClusterSnapshot::new();
        snapshot.insert_deployment(deployment("emoji", "emojivoto", &[("app", "emoji-svc")]));
        snapshot.insert_replica_set(replica_set(
            "emoji-6bf9",
            "emojivoto",
            Some("emoji"),
            &[("app", "emoji-svc")],
        ));
        snapshot.insert_pod(pod_owned_by(
            "emoji-6bf9-1",
            "emojivoto",
            &[("app", "emoji-svc")],
            "Running",
            None,
            ("ReplicaSet", "emoji-6bf9"),
        ));
        snapshot.insert_pod(pod_owned_by(
            "stray-1",
            "emojivoto",
            &[("app", "emoji-svc")],
            "Running",
            None,
            ("ReplicaSet", "someone-else"),
        ));

        let owned = snapshot.owned_pods(ResourceKind::Deployment, "emojivoto", "emoji");
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].metadata.name.as_deref(), Some("emoji-6bf9-1"));
    }

    #[test]
    fn deployment_falls_back_to_selector_for_unlinked_pods() {
        let mut snapshot = ClusterSnapshot::new();
        snapshot.insert_deployment(deployment("emoji", "emojivoto", &[("app", "emoji-svc")]));
        snapshot.insert_pod(pod("emoji-1", "emojivoto", &[("app", "emoji-svc")], "Running", None));
        snapshot.insert_pod(pod("vote-1", "emojivoto", &[("app", "vote-svc")], "Running", None));

        let owned = snapshot.owned_pods(ResourceKind::Deployment, "emojivoto", "emoji");
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].metadata.name.as_deref(), Some("emoji-1"));
    }

    #[test]
    fn service_owns_pods_through_its_selector() {
        let mut snapshot = ClusterSnapshot::new();
        snapshot.insert_service(service("emoji-svc", "emojivoto", &[("app", "emoji-svc")]));
        snapshot.insert_pod(pod("emoji-1", "emojivoto", &[("app", "emoji-svc")], "Running", None));
        snapshot.insert_pod(pod("emoji-2", "other", &[("app", "emoji-svc")], "Running", None));

        let owned = snapshot.owned_pods(ResourceKind::Service, "emojivoto", "emoji-svc");
        assert_eq!(owned.len(), 1, "service scope stays inside its namespace");
    }

    #[test]
    fn namespace_rows_carry_the_namespace_as_name() {
        let mut snapshot = ClusterSnapshot::new();
        snapshot.insert_namespace(namespace("emojivoto"));
        snapshot.insert_pod(pod("emoji-1", "emojivoto", &[], "Running", None));

        let rows = snapshot.rows(ResourceKind::Namespace, "", "");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].namespace, "");
        assert_eq!(rows[0].name, "emojivoto");

        let owned = snapshot.owned_pods(ResourceKind::Namespace, "", "emojivoto");
        assert_eq!(owned.len(), 1);
    }

    #[test]
    fn running_predicate_ignores_other_phases() {
        let mut snapshot = ClusterSnapshot::new();
        snapshot.insert_pod(pod("done", "emojivoto", &[], "Succeeded", None));
        snapshot.insert_pod(pod("broken", "emojivoto", &[], "Failed", None));
        assert!(!snapshot.has_running_pods(ResourceKind::Pod, "emojivoto", ""));

        snapshot.insert_pod(pod("live", "emojivoto", &[], "Running", None));
        assert!(snapshot.has_running_pods(ResourceKind::Pod, "emojivoto", ""));
    }

    #[test]
    fn store_is_unavailable_until_first_sync() {
        let store = SnapshotStore::new();
        assert!(store.snapshot().is_err());
        store.replace(ClusterSnapshot::new());
        assert!(store.snapshot().is_ok());
    }
}
