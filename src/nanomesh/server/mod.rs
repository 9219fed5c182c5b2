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

pub mod handlers;

use std::error::Error;
use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::nanomesh::Config;

pub fn build_router() -> Router {
    Router::new()
        .route("/api/v1/stat_summary", post(handlers::stat::stat_summary))
        .route("/metrics", get(handlers::observability::metrics))
        .route("/healthz", get(handlers::observability::healthz))
        .route("/readyz", get(handlers::observability::readyz))
        .route("/livez", get(handlers::observability::livez))
        .route("/version", get(handlers::observability::version))
}

/// Binds the configured address and serves the control-plane API until the
/// process is stopped.
pub async fn serve() -> Result<(), Box<dyn Error + Send + Sync>> {
    let bind_address = Config::BindAddress.get();
    let addr: SocketAddr = bind_address
        .parse()
        .map_err(|err| format!("invalid bind address {bind_address:?}: {err}"))?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!(addr = bind_address.as_str(), "listening for control plane requests");

    axum::serve(listener, build_router()).await?;
    Ok(())
}
