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

use std::sync::OnceLock;
use std::time::Duration;

use prometheus::core::Collector;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

static REGISTRY: OnceLock<Registry> = OnceLock::new();
static STAT_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static STAT_REQUEST_DURATION: OnceLock<HistogramVec> = OnceLock::new();
static BACKEND_QUERIES_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
static BACKEND_QUERY_DURATION: OnceLock<HistogramVec> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(|| {
        Registry::new_custom(Some("nanomesh".to_string()), None)
            .expect("failed to initialise nanomesh metrics registry")
    })
}

fn register_collector<C>(collector: C) -> C
where
    C: Clone + Collector + Send + Sync + 'static,
{
    registry()
        .register(Box::new(collector.clone()))
        .expect("failed to register nanomesh metric collector");
    collector
}

fn stat_requests_total() -> &'static IntCounterVec {
    STAT_REQUESTS_TOTAL.get_or_init(|| {
        let opts = Opts::new(
            "stat_requests_total",
            "StatSummary requests grouped by outcome",
        );
        let counter = IntCounterVec::new(opts, &["outcome"])
            .expect("failed to build stat request counter");
        register_collector(counter)
    })
}

fn stat_request_duration() -> &'static HistogramVec {
    STAT_REQUEST_DURATION.get_or_init(|| {
        let opts = HistogramOpts::new(
            "stat_request_duration_seconds",
            "Wall-clock time spent answering StatSummary requests",
        );
        let histogram = HistogramVec::new(opts, &["outcome"])
            .expect("failed to build stat request histogram");
        register_collector(histogram)
    })
}

fn backend_queries_total() -> &'static IntCounterVec {
    BACKEND_QUERIES_TOTAL.get_or_init(|| {
        let opts = Opts::new(
            "backend_queries_total",
            "Metrics backend queries grouped by result",
        );
        let counter = IntCounterVec::new(opts, &["result"])
            .expect("failed to build backend query counter");
        register_collector(counter)
    })
}

fn backend_query_duration() -> &'static HistogramVec {
    BACKEND_QUERY_DURATION.get_or_init(|| {
        let opts = HistogramOpts::new(
            "backend_query_duration_seconds",
            "Latency of individual metrics backend queries",
        );
        let histogram = HistogramVec::new(opts, &["result"])
            .expect("failed to build backend query histogram");
        register_collector(histogram)
    })
}

pub fn observe_stat_request(outcome: &str, duration: Duration) {
    stat_requests_total().with_label_values(&[outcome]).inc();
    stat_request_duration()
        .with_label_values(&[outcome])
        .observe(duration.as_secs_f64());
}

pub fn observe_backend_query(ok: bool, duration: Duration) {
    let result = if ok { "ok" } else { "error" };
    backend_queries_total().with_label_values(&[result]).inc();
    backend_query_duration()
        .with_label_values(&[result])
        .observe(duration.as_secs_f64());
}

/// Renders the registry in the Prometheus text exposition format.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&registry().gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
