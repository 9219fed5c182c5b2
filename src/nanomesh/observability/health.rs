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

//! Readiness probing. A stat request needs exactly two things: a synced
//! topology snapshot and a metrics backend that answers its probe.
//! Readiness is their conjunction, with per-dependency failure detail so
//! `/readyz` output names what is missing.

use serde::Serialize;

use crate::nanomesh::k8s::store::SnapshotStore;
use crate::nanomesh::prom::Prometheus;

const DETAIL_MAX_CHARS: usize = 200;

#[derive(Debug, Clone, Serialize)]
pub struct Readiness {
    pub ready: bool,
    pub topology_synced: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology_detail: Option<String>,
    pub metrics_backend_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics_backend_detail: Option<String>,
}

pub async fn readiness<P: Prometheus>(store: &SnapshotStore, prometheus: &P) -> Readiness {
    let topology_detail = store
        .snapshot()
        .err()
        .map(|err| trim_detail(err.to_string()));
    let metrics_backend_detail = prometheus
        .ready()
        .await
        .err()
        .map(|err| trim_detail(err.to_string()));

    let topology_synced = topology_detail.is_none();
    let metrics_backend_ready = metrics_backend_detail.is_none();
    Readiness {
        ready: topology_synced && metrics_backend_ready,
        topology_synced,
        topology_detail,
        metrics_backend_ready,
        metrics_backend_detail,
    }
}

/// A flapping dependency must not balloon the probe body.
fn trim_detail(detail: String) -> String {
    if detail.chars().count() <= DETAIL_MAX_CHARS {
        detail
    } else {
        detail.chars().take(DETAIL_MAX_CHARS).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nanomesh::k8s::store::ClusterSnapshot;
    use crate::nanomesh::test_support::MockProm;

    #[tokio::test]
    async fn unsynced_topology_reports_not_ready_with_detail() {
        let store = SnapshotStore::new();
        let probe = readiness(&store, &MockProm::empty()).await;
        assert!(!probe.ready);
        assert!(!probe.topology_synced);
        assert!(probe.topology_detail.is_some());
        assert!(probe.metrics_backend_ready);
    }

    #[tokio::test]
    async fn unreachable_backend_reports_not_ready() {
        let store = SnapshotStore::new();
        store.replace(ClusterSnapshot::new());
        let probe = readiness(&store, &MockProm::failing()).await;
        assert!(!probe.ready);
        assert!(probe.topology_synced);
        assert!(!probe.metrics_backend_ready);
        assert!(probe.metrics_backend_detail.is_some());
    }

    #[tokio::test]
    async fn both_dependencies_up_means_ready() {
        let store = SnapshotStore::new();
        store.replace(ClusterSnapshot::new());
        let probe = readiness(&store, &MockProm::empty()).await;
        assert!(probe.ready);
        assert!(probe.topology_detail.is_none());
        assert!(probe.metrics_backend_detail.is_none());
    }
}
