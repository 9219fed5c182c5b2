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

//! The `StatSummary` entry point: validate, snapshot the topology, plan, fan
//! out the metrics queries, and assemble the per-kind tables.

use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use tokio::time::timeout;

use crate::nanomesh::api::types::{ResponseError, StatOk, StatSummaryRequest, StatSummaryResponse, StatTable};
use crate::nanomesh::k8s::store::{ClusterSnapshot, SnapshotStore};
use crate::nanomesh::observability::metrics;
use crate::nanomesh::prom::Prometheus;
use crate::nanomesh::stat::assemble::{self, KindSamples};
use crate::nanomesh::stat::planner::{self, KindPlan};
use crate::nanomesh::stat::validate::{self, ValidRequest, ValidationError};
use crate::nanomesh::stat::StatError;

/// Upper bound on concurrently outstanding metrics queries per request.
pub const MAX_IN_FLIGHT_QUERIES: usize = 8;

/// Answers one `StatSummary` request against the current topology snapshot.
///
/// Validation failures other than an unknown kind are carried in the
/// response's `error` branch; topology unavailability, unknown kinds, and an
/// exceeded deadline surface as [`StatError`]s. Per-query metrics failures
/// degrade the affected kind to zero traffic stats and never fail the call.
pub async fn stat_summary<P: Prometheus>(
    request: &StatSummaryRequest,
    store: &SnapshotStore,
    prometheus: &P,
    deadline: Option<Duration>,
) -> Result<StatSummaryResponse, StatError> {
    let valid = match validate::validate(request) {
        Ok(valid) => valid,
        Err(err @ ValidationError::UnknownKind(_)) => {
            return Err(StatError::unimplemented(err.to_string()));
        }
        Err(err) => {
            return Ok(StatSummaryResponse::Error(ResponseError {
                message: err.to_string(),
            }));
        }
    };

    let snapshot = store
        .snapshot()
        .map_err(|err| StatError::unavailable(err.to_string()))?;
    let plans = planner::plan(&valid, &snapshot);

    let gather = gather_tables(&valid, &plans, &snapshot, prometheus);
    let stat_tables = match deadline {
        Some(deadline) => timeout(deadline, gather).await.map_err(|_| {
            StatError::canceled("deadline exceeded while querying the metrics backend")
        })?,
        None => gather.await,
    };

    Ok(StatSummaryResponse::Ok(StatOk { stat_tables }))
}

async fn gather_tables<P: Prometheus>(
    request: &ValidRequest,
    plans: &[KindPlan],
    snapshot: &ClusterSnapshot,
    prometheus: &P,
) -> Vec<StatTable> {
    let jobs: Vec<(usize, usize, String)> = plans
        .iter()
        .enumerate()
        .flat_map(|(plan_index, plan)| {
            plan.queries
                .iter()
                .enumerate()
                .map(move |(slot, query)| (plan_index, slot, query.clone()))
        })
        .collect();

    let results = stream::iter(jobs.into_iter().map(|(plan_index, slot, query)| async move {
        let started = Instant::now();
        let outcome = prometheus.query(&query, None).await;
        metrics::observe_backend_query(outcome.is_ok(), started.elapsed());
        (plan_index, slot, outcome)
    }))
    .buffer_unordered(MAX_IN_FLIGHT_QUERIES)
    .collect::<Vec<_>>()
    .await;

    let mut samples: Vec<KindSamples> = plans.iter().map(|_| KindSamples::default()).collect();
    let mut degraded = vec![false; plans.len()];
    for (plan_index, slot, outcome) in results {
        match outcome {
            Ok(vector) => {
                if slot == KindPlan::REQUESTS_SLOT {
                    samples[plan_index].requests = vector;
                } else {
                    samples[plan_index].latency[slot] = vector;
                }
            }
            Err(err) => {
                // One failed query degrades the whole kind to zero traffic.
                degraded[plan_index] = true;
                tracing::warn!(
                    kind = plans[plan_index].kind.plural(),
                    error = %err,
                    "metrics query failed; reporting zero traffic for kind"
                );
            }
        }
    }

    plans
        .iter()
        .enumerate()
        .map(|(plan_index, plan)| {
            if plan.skip {
                assemble::empty_table()
            } else if degraded[plan_index] {
                assemble::assemble_kind(request, plan, snapshot, &KindSamples::default())
            } else {
                let kind_samples = std::mem::take(&mut samples[plan_index]);
                assemble::assemble_kind(request, plan, snapshot, &kind_samples)
            }
        })
        .collect()
}
