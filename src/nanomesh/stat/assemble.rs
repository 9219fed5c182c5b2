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

//! Joins pod counts from the topology with metrics samples into stat tables.
//!
//! Row universe per kind: for inbound and `to`-scoped queries the selector's
//! own topology objects, kept when they have matching samples or at least one
//! running pod; for `from`-scoped queries only destinations with observed
//! traffic that still exist in the topology; for `authority`, exactly the
//! authority values present in the result set, with zero pod counts.

use std::collections::BTreeMap;

use crate::nanomesh::api::types::{BasicStats, PodGroup, Resource, StatRow, StatTable};
use crate::nanomesh::k8s::resources::ResourceKind;
use crate::nanomesh::k8s::store::ClusterSnapshot;
use crate::nanomesh::prom::{Sample, Vector};
use crate::nanomesh::stat::classify::{count_pods, PodCounts};
use crate::nanomesh::stat::planner::{KindPlan, RowKey, LATENCY_QUANTILES};
use crate::nanomesh::stat::validate::{ScopeRoute, ValidRequest};

const CLASSIFICATION_LABEL: &str = "classification";
const CLASSIFICATION_SUCCESS: &str = "success";
const CLASSIFICATION_FAILURE: &str = "failure";
const TLS_LABEL: &str = "tls";

/// Results of one kind's four queries, in plan order.
#[derive(Debug, Clone, Default)]
pub struct KindSamples {
    pub latency: [Vector; LATENCY_QUANTILES.len()],
    pub requests: Vector,
}

type RowId = (String, String);

#[derive(Debug, Default)]
struct TrafficAccum {
    success: f64,
    failure: f64,
    tls: f64,
    latency: [f64; LATENCY_QUANTILES.len()],
}

impl TrafficAccum {
    fn to_stats(&self) -> BasicStats {
        BasicStats {
            success_count: self.success as u64,
            failure_count: self.failure as u64,
            latency_ms_p50: self.latency[0] as u64,
            latency_ms_p95: self.latency[1] as u64,
            latency_ms_p99: self.latency[2] as u64,
            tls_request_count: self.tls as u64,
        }
    }
}

/// The shape returned when the skip rule fires for a kind.
pub fn empty_table() -> StatTable {
    StatTable {
        pod_group: PodGroup { rows: Vec::new() },
    }
}

pub fn assemble_kind(
    request: &ValidRequest,
    plan: &KindPlan,
    snapshot: &ClusterSnapshot,
    samples: &KindSamples,
) -> StatTable {
    let traffic = index_samples(plan.kind, &plan.row_key, samples);
    let from_scoped = matches!(&request.outbound, Some(scope) if scope.route == ScopeRoute::From);

    let mut rows = Vec::new();
    if plan.kind == ResourceKind::Authority {
        for (id, accum) in &traffic {
            rows.push(build_row(
                plan.kind,
                id,
                &request.time_window,
                Some(accum),
                PodCounts::default(),
            ));
        }
    } else if from_scoped {
        for (id, accum) in &traffic {
            if !snapshot.entity_exists(plan.kind, &id.0, &id.1) {
                continue;
            }
            let counts = count_pods(snapshot.owned_pods(plan.kind, &id.0, &id.1));
            rows.push(build_row(plan.kind, id, &request.time_window, Some(accum), counts));
        }
    } else {
        for entity in snapshot.rows(plan.kind, &request.namespace, &request.name) {
            let id = (entity.namespace, entity.name);
            let counts = count_pods(snapshot.owned_pods(plan.kind, &id.0, &id.1));
            let accum = traffic.get(&id);
            if counts.running == 0 && accum.is_none() {
                continue;
            }
            rows.push(build_row(plan.kind, &id, &request.time_window, accum, counts));
        }
    }

    StatTable {
        pod_group: PodGroup { rows },
    }
}

fn index_samples(
    kind: ResourceKind,
    row_key: &RowKey,
    samples: &KindSamples,
) -> BTreeMap<RowId, TrafficAccum> {
    let mut traffic: BTreeMap<RowId, TrafficAccum> = BTreeMap::new();

    for (slot, vector) in samples.latency.iter().enumerate() {
        for sample in vector {
            let accum = traffic.entry(row_id(kind, row_key, sample)).or_default();
            accum.latency[slot] = sample.value;
        }
    }

    for sample in &samples.requests {
        let accum = traffic.entry(row_id(kind, row_key, sample)).or_default();
        match sample.label(CLASSIFICATION_LABEL) {
            CLASSIFICATION_SUCCESS => accum.success += sample.value,
            CLASSIFICATION_FAILURE => accum.failure += sample.value,
            _ => {}
        }
        if sample.label(TLS_LABEL) == "true" {
            accum.tls += sample.value;
        }
    }

    traffic
}

fn row_id(kind: ResourceKind, row_key: &RowKey, sample: &Sample) -> RowId {
    let namespace = sample.label(&row_key.namespace_label).to_string();
    let name = sample.label(&row_key.name_label).to_string();
    if kind == ResourceKind::Namespace {
        // Namespace rows carry the namespace in the name position.
        (String::new(), namespace)
    } else {
        (namespace, name)
    }
}

fn build_row(
    kind: ResourceKind,
    id: &RowId,
    time_window: &str,
    traffic: Option<&TrafficAccum>,
    counts: PodCounts,
) -> StatRow {
    StatRow {
        resource: Resource {
            kind: kind.plural().to_string(),
            namespace: id.0.clone(),
            name: id.1.clone(),
        },
        time_window: time_window.to_string(),
        stats: traffic.map(TrafficAccum::to_stats),
        meshed_pod_count: counts.meshed,
        running_pod_count: counts.running,
        failed_pod_count: counts.failed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nanomesh::k8s::store::ClusterSnapshot;
    use crate::nanomesh::stat::planner::plan_kind;
    use crate::nanomesh::stat::validate::StatTarget;
    use crate::nanomesh::test_support::{pod, sample};

    fn request(kind: ResourceKind, namespace: &str, name: &str) -> ValidRequest {
        ValidRequest {
            target: StatTarget::Kind(kind),
            namespace: namespace.to_string(),
            name: name.to_string(),
            time_window: "1m".to_string(),
            outbound: None,
        }
    }

    #[test]
    fn tls_counts_regardless_of_classification() {
        let mut snapshot = ClusterSnapshot::new();
        snapshot.insert_pod(pod("emoji-1", "emojivoto", &[], "Running", Some("v1")));

        let request = request(ResourceKind::Pod, "emojivoto", "");
        let plan = plan_kind(&request, ResourceKind::Pod, &snapshot);
        let samples = KindSamples {
            requests: vec![
                sample("pod", "emoji-1", "emojivoto", "success", false),
                sample("pod", "emoji-1", "emojivoto", "failure", false),
            ],
            ..KindSamples::default()
        };

        let table = assemble_kind(&request, &plan, &snapshot, &samples);
        let stats = table.pod_group.rows[0].stats.clone().expect("stats");
        assert_eq!(stats.success_count, 123);
        assert_eq!(stats.failure_count, 123);
        assert_eq!(stats.tls_request_count, 246);
    }

    #[test]
    fn authority_rows_always_carry_zero_pod_counts() {
        let mut snapshot = ClusterSnapshot::new();
        snapshot.insert_pod(pod("emoji-1", "emojivoto", &[], "Running", Some("v1")));

        let request = request(ResourceKind::Authority, "emojivoto", "");
        let plan = plan_kind(&request, ResourceKind::Authority, &snapshot);
        let samples = KindSamples {
            requests: vec![sample("authority", "web:8080", "emojivoto", "success", false)],
            ..KindSamples::default()
        };

        let table = assemble_kind(&request, &plan, &snapshot, &samples);
        assert_eq!(table.pod_group.rows.len(), 1);
        let row = &table.pod_group.rows[0];
        assert_eq!(row.resource.name, "web:8080");
        assert_eq!(row.running_pod_count, 0);
        assert_eq!(row.meshed_pod_count, 0);
        assert_eq!(row.failed_pod_count, 0);
    }

    #[test]
    fn sample_only_rows_are_suppressed_for_workload_kinds() {
        let mut snapshot = ClusterSnapshot::new();
        snapshot.insert_pod(pod("emoji-1", "emojivoto", &[], "Running", None));

        let request = request(ResourceKind::Pod, "emojivoto", "");
        let plan = plan_kind(&request, ResourceKind::Pod, &snapshot);
        let samples = KindSamples {
            requests: vec![sample("pod", "long-gone", "emojivoto", "success", false)],
            ..KindSamples::default()
        };

        let table = assemble_kind(&request, &plan, &snapshot, &samples);
        let names: Vec<_> = table
            .pod_group
            .rows
            .iter()
            .map(|row| row.resource.name.as_str())
            .collect();
        assert_eq!(names, vec!["emoji-1"], "ghost of a terminated pod must not appear");
    }
}
