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

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use axum::Json;
use tracing::Instrument;

use super::error::ApiError;
use crate::nanomesh::api::types::{StatSummaryRequest, StatSummaryResponse};
use crate::nanomesh::k8s::store::SnapshotStore;
use crate::nanomesh::observability::{metrics, trace};
use crate::nanomesh::prom::HttpPrometheus;
use crate::nanomesh::stat::summary;

/// Shared dependencies of the stat handlers, installed once at startup. The
/// snapshot store is also held by the external watcher, which keeps it
/// synced.
pub struct StatContext {
    pub store: Arc<SnapshotStore>,
    pub prometheus: HttpPrometheus,
    pub deadline: Duration,
}

static CONTEXT: OnceLock<Arc<StatContext>> = OnceLock::new();

pub fn install_context(context: StatContext) {
    let _ = CONTEXT.set(Arc::new(context));
}

pub(super) fn context() -> Result<Arc<StatContext>, ApiError> {
    CONTEXT
        .get()
        .cloned()
        .ok_or_else(|| ApiError::unavailable("control plane is still starting"))
}

pub async fn stat_summary(
    Json(request): Json<StatSummaryRequest>,
) -> Result<Json<StatSummaryResponse>, ApiError> {
    let context = context()?;
    let started = Instant::now();

    let resource = request
        .selector
        .as_ref()
        .and_then(|selection| selection.resource.as_ref());
    let span = trace::stat_span(
        resource.map(|r| r.kind.as_str()).unwrap_or_default(),
        resource.map(|r| r.namespace.as_str()).unwrap_or_default(),
        resource.map(|r| r.name.as_str()).unwrap_or_default(),
    );

    let result = summary::stat_summary(
        &request,
        &context.store,
        &context.prometheus,
        Some(context.deadline),
    )
    .instrument(span)
    .await;

    match result {
        Ok(response) => {
            let outcome = match &response {
                StatSummaryResponse::Ok(_) => "ok",
                StatSummaryResponse::Error(_) => "invalid",
            };
            metrics::observe_stat_request(outcome, started.elapsed());
            Ok(Json(response))
        }
        Err(err) => {
            metrics::observe_stat_request(err.code.as_str(), started.elapsed());
            Err(ApiError::from_stat(err))
        }
    }
}
