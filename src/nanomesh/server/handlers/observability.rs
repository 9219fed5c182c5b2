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

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::nanomesh::observability::health;

pub async fn metrics() -> Response {
    let body = crate::nanomesh::observability::metrics::gather();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}

pub async fn healthz() -> Response {
    readyz().await
}

pub async fn readyz() -> Response {
    let context = match super::stat::context() {
        Ok(context) => context,
        Err(err) => return err.into_response(),
    };
    let probe = health::readiness(context.store.as_ref(), &context.prometheus).await;
    let status = if probe.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(probe)).into_response()
}

/// Liveness only checks that the process services requests; it skips the
/// dependency probes.
pub async fn livez() -> Response {
    Json(json!({ "status": "alive" })).into_response()
}

pub async fn version() -> Response {
    Json(json!({ "version": env!("CARGO_PKG_VERSION") })).into_response()
}
