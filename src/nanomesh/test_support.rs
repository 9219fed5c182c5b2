#![allow(dead_code)]

//! Shared fixtures for unit and integration tests: object builders mirroring
//! the cluster manifests the watcher would hydrate, a sample generator
//! matching the proxy's label shape, and a recording mock metrics backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::nanomesh::k8s::deployment::{Deployment, DeploymentSpec, LabelSelector};
use crate::nanomesh::k8s::namespace::Namespace;
use crate::nanomesh::k8s::pod::{ObjectMeta, OwnerReference, Pod, PodSpec, PodStatus};
use crate::nanomesh::k8s::replicaset::{ReplicaSet, ReplicaSetSpec};
use crate::nanomesh::k8s::service::{Service, ServiceSpec};
use crate::nanomesh::prom::{Prometheus, QueryError, Sample, Vector};
use crate::nanomesh::stat::classify::PROXY_VERSION_ANNOTATION;

fn label_map(labels: &[(&str, &str)]) -> HashMap<String, String> {
    labels
        .iter()
        .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
        .collect()
}

fn metadata(name: &str, namespace: &str, labels: &[(&str, &str)]) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: (!namespace.is_empty()).then(|| namespace.to_string()),
        labels: label_map(labels),
        ..ObjectMeta::default()
    }
}

pub fn pod(
    name: &str,
    namespace: &str,
    labels: &[(&str, &str)],
    phase: &str,
    proxy_version: Option<&str>,
) -> Pod {
    let mut meta = metadata(name, namespace, labels);
    if let Some(version) = proxy_version {
        meta.annotations
            .insert(PROXY_VERSION_ANNOTATION.to_string(), version.to_string());
    }
    let mut pod = Pod::new(meta, PodSpec::default());
    if !phase.is_empty() {
        pod.status = Some(PodStatus {
            phase: Some(phase.to_string()),
            ..PodStatus::default()
        });
    }
    pod
}

pub fn pod_owned_by(
    name: &str,
    namespace: &str,
    labels: &[(&str, &str)],
    phase: &str,
    proxy_version: Option<&str>,
    owner: (&str, &str),
) -> Pod {
    let mut built = pod(name, namespace, labels, phase, proxy_version);
    built.metadata.owner_references.push(OwnerReference {
        api_version: "apps/v1".to_string(),
        kind: owner.0.to_string(),
        name: owner.1.to_string(),
        controller: Some(true),
    });
    built
}

pub fn deployment(name: &str, namespace: &str, match_labels: &[(&str, &str)]) -> Deployment {
    Deployment::new(
        metadata(name, namespace, &[]),
        DeploymentSpec {
            replicas: 1,
            selector: LabelSelector {
                match_labels: label_map(match_labels),
            },
            ..DeploymentSpec::default()
        },
    )
}

pub fn replica_set(
    name: &str,
    namespace: &str,
    owner_deployment: Option<&str>,
    match_labels: &[(&str, &str)],
) -> ReplicaSet {
    let mut meta = metadata(name, namespace, &[]);
    if let Some(owner) = owner_deployment {
        meta.owner_references.push(OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: "Deployment".to_string(),
            name: owner.to_string(),
            controller: Some(true),
        });
    }
    ReplicaSet::new(
        meta,
        ReplicaSetSpec {
            replicas: 1,
            selector: LabelSelector {
                match_labels: label_map(match_labels),
            },
            ..ReplicaSetSpec::default()
        },
    )
}

pub fn service(name: &str, namespace: &str, selector: &[(&str, &str)]) -> Service {
    Service::new(
        metadata(name, namespace, &[]),
        ServiceSpec {
            selector: label_map(selector),
            ..ServiceSpec::default()
        },
    )
}

pub fn namespace(name: &str) -> Namespace {
    Namespace::new(name)
}

/// One backend sample the way the proxy labels it: identity labels for the
/// given kind (optionally on the destination side), `classification`, and
/// `tls="true"`. Value 123 at timestamp 456, matching the scenario fixtures.
pub fn sample(
    kind_label: &str,
    name: &str,
    namespace: &str,
    classification: &str,
    dst: bool,
) -> Sample {
    let mut labels = BTreeMap::new();
    let (name_key, namespace_key) = if dst {
        (format!("dst_{kind_label}"), "dst_namespace".to_string())
    } else {
        (kind_label.to_string(), "namespace".to_string())
    };
    labels.insert(name_key, name.to_string());
    labels.insert(namespace_key, namespace.to_string());
    labels.insert("classification".to_string(), classification.to_string());
    labels.insert("tls".to_string(), "true".to_string());
    Sample {
        labels,
        value: 123.0,
        timestamp_ms: 456,
    }
}

/// Mock metrics backend: records every executed query and serves a canned
/// vector, a failure, or a stall.
pub struct MockProm {
    result: Vector,
    fail: bool,
    delay: Option<Duration>,
    queries: Mutex<Vec<String>>,
}

impl MockProm {
    pub fn returning(result: Vector) -> Self {
        Self {
            result,
            fail: false,
            delay: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::returning(Vec::new())
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::empty()
        }
    }

    pub fn stalled(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::empty()
        }
    }

    /// Queries executed so far, in arrival order.
    pub fn executed(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Prometheus for MockProm {
    async fn query(
        &self,
        query: &str,
        _at: Option<DateTime<Utc>>,
    ) -> Result<Vector, QueryError> {
        self.queries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(QueryError::new("mock backend failure"));
        }
        Ok(self.result.clone())
    }

    async fn ready(&self) -> Result<(), QueryError> {
        if self.fail {
            Err(QueryError::new("mock backend failure"))
        } else {
            Ok(())
        }
    }
}
