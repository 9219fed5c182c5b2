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

use std::sync::Arc;

use nanomesh::nanomesh::config::{self, Config};
use nanomesh::nanomesh::k8s::store::SnapshotStore;
use nanomesh::nanomesh::observability;
use nanomesh::nanomesh::prom::HttpPrometheus;
use nanomesh::nanomesh::server::{self, handlers};

#[tokio::main]
async fn main() {
    observability::trace::init();

    let prometheus_url = Config::PrometheusUrl.get();
    tracing::info!(
        prometheus = prometheus_url.as_str(),
        "starting nanomesh control plane"
    );

    // The snapshot store is fed by the deployment's watcher sidecar; stat
    // requests answer Unavailable until the first sync lands.
    let store = Arc::new(SnapshotStore::new());
    handlers::install_context(handlers::StatContext {
        store,
        prometheus: HttpPrometheus::new(prometheus_url),
        deadline: config::request_deadline(),
    });

    if let Err(err) = server::serve().await {
        tracing::error!(error = %err, "server terminated");
        std::process::exit(1);
    }
}
