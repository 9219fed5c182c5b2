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

//! Turns a validated request into the per-kind metrics queries.
//!
//! The label clause is rendered from a `BTreeMap` so keys come out
//! alphabetical and generated queries are byte-stable across runs; tests
//! compare them on exact string equality. Exactly one `direction` label is
//! injected per query.

use std::collections::BTreeMap;

use crate::nanomesh::k8s::resources::ResourceKind;
use crate::nanomesh::k8s::store::ClusterSnapshot;
use crate::nanomesh::stat::validate::{ScopeRoute, ValidRequest};

const DIRECTION_LABEL: &str = "direction";
const DIRECTION_INBOUND: &str = "inbound";
const DIRECTION_OUTBOUND: &str = "outbound";
const DST_PREFIX: &str = "dst_";

const LATENCY_METRIC: &str = "response_latency_ms_bucket";
const REQUEST_METRIC: &str = "response_total";

pub const LATENCY_QUANTILES: [&str; 3] = ["0.5", "0.95", "0.99"];

/// Which sample labels carry a row's namespace and name for this plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowKey {
    pub namespace_label: String,
    pub name_label: String,
}

/// The queries for one targeted kind: three latency quantiles and one
/// request counter, or none at all when the skip rule fires.
#[derive(Debug, Clone)]
pub struct KindPlan {
    pub kind: ResourceKind,
    pub skip: bool,
    pub queries: Vec<String>,
    pub row_key: RowKey,
}

impl KindPlan {
    /// Index of the request-counter query within `queries`.
    pub const REQUESTS_SLOT: usize = LATENCY_QUANTILES.len();
}

/// Plans every targeted kind, in table display order.
pub fn plan(request: &ValidRequest, snapshot: &ClusterSnapshot) -> Vec<KindPlan> {
    request
        .target
        .kinds()
        .into_iter()
        .map(|kind| plan_kind(request, kind, snapshot))
        .collect()
}

pub fn plan_kind(
    request: &ValidRequest,
    kind: ResourceKind,
    snapshot: &ClusterSnapshot,
) -> KindPlan {
    let skip =
        kind.has_pods() && !snapshot.has_running_pods(kind, &request.namespace, &request.name);

    let grouping = grouping(request, kind);
    let row_key = RowKey {
        namespace_label: grouping[0].clone(),
        name_label: grouping.last().cloned().unwrap_or_default(),
    };

    let queries = if skip {
        Vec::new()
    } else {
        render_queries(request, kind, &grouping)
    };

    KindPlan {
        kind,
        skip,
        queries,
        row_key,
    }
}

fn render_queries(request: &ValidRequest, kind: ResourceKind, grouping: &[String]) -> Vec<String> {
    let labels = render_labels(&label_scope(request, kind));
    let grouping = grouping.join(", ");
    let window = &request.time_window;

    let mut queries = Vec::with_capacity(LATENCY_QUANTILES.len() + 1);
    for quantile in LATENCY_QUANTILES {
        queries.push(format!(
            "histogram_quantile({quantile}, sum(irate({LATENCY_METRIC}{{{labels}}}[{window}])) by (le, {grouping}))"
        ));
    }
    queries.push(format!(
        "sum(increase({REQUEST_METRIC}{{{labels}}}[{window}])) by ({grouping}, classification, tls)"
    ));
    queries
}

/// The full label scope for one kind's queries, per the direction rule:
/// no scope reports traffic arriving at the selector; a `to` scope reports
/// traffic the selector sends to the peer; a `from` scope reports traffic the
/// peer sends, with the selector's own namespace and name ignored.
fn label_scope(request: &ValidRequest, kind: ResourceKind) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    match &request.outbound {
        None => {
            labels.insert(DIRECTION_LABEL.to_string(), DIRECTION_INBOUND.to_string());
            resource_labels(&mut labels, kind, &request.namespace, &request.name, "");
        }
        Some(scope) if scope.route == ScopeRoute::To => {
            labels.insert(DIRECTION_LABEL.to_string(), DIRECTION_OUTBOUND.to_string());
            resource_labels(&mut labels, kind, &request.namespace, &request.name, "");
            resource_labels(
                &mut labels,
                scope.kind,
                &scope.namespace,
                &scope.name,
                DST_PREFIX,
            );
        }
        Some(scope) => {
            labels.insert(DIRECTION_LABEL.to_string(), DIRECTION_OUTBOUND.to_string());
            resource_labels(&mut labels, scope.kind, &scope.namespace, &scope.name, "");
        }
    }
    labels
}

/// Inserts the labels identifying one resource. Empty namespace or name
/// contribute no label; the kind `namespace` is identified by the namespace
/// label itself.
fn resource_labels(
    labels: &mut BTreeMap<String, String>,
    kind: ResourceKind,
    namespace: &str,
    name: &str,
    prefix: &str,
) {
    let namespace_key = format!("{prefix}namespace");
    if kind == ResourceKind::Namespace {
        if !name.is_empty() {
            labels.insert(namespace_key, name.to_string());
        } else if !namespace.is_empty() {
            labels.insert(namespace_key, namespace.to_string());
        }
        return;
    }
    if !namespace.is_empty() {
        labels.insert(namespace_key, namespace.to_string());
    }
    if !name.is_empty() {
        labels.insert(format!("{prefix}{}", kind.label_key()), name.to_string());
    }
}

/// Grouping labels for one kind. Rows of a `from`-scoped query are keyed by
/// the destination side, so the grouping moves to `dst_`-prefixed labels.
/// The `authority` label is recorded unprefixed on both sides of a request.
fn grouping(request: &ValidRequest, kind: ResourceKind) -> Vec<String> {
    let prefix = match &request.outbound {
        Some(scope) if scope.route == ScopeRoute::From => DST_PREFIX,
        _ => "",
    };
    let namespace_label = format!("{prefix}namespace");
    match kind {
        ResourceKind::Namespace => vec![namespace_label],
        ResourceKind::Authority => vec![namespace_label, "authority".to_string()],
        _ => vec![namespace_label, format!("{prefix}{}", kind.label_key())],
    }
}

fn render_labels(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(key, value)| format!("{key}=\"{value}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nanomesh::stat::validate::{OutboundScope, StatTarget};

    fn request(kind: ResourceKind, namespace: &str, name: &str) -> ValidRequest {
        ValidRequest {
            target: StatTarget::Kind(kind),
            namespace: namespace.to_string(),
            name: name.to_string(),
            time_window: "1m".to_string(),
            outbound: None,
        }
    }

    fn scoped(
        mut request: ValidRequest,
        route: ScopeRoute,
        kind: ResourceKind,
        namespace: &str,
        name: &str,
    ) -> ValidRequest {
        request.outbound = Some(OutboundScope {
            route,
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        request
    }

    fn queries_for(request: &ValidRequest, kind: ResourceKind) -> Vec<String> {
        render_queries(request, kind, &grouping(request, kind))
    }

    #[test]
    fn named_pod_inbound_queries() {
        let request = request(ResourceKind::Pod, "emojivoto", "emojivoto-1");
        let queries = queries_for(&request, ResourceKind::Pod);
        assert_eq!(
            queries,
            vec![
                r#"histogram_quantile(0.5, sum(irate(response_latency_ms_bucket{direction="inbound", namespace="emojivoto", pod="emojivoto-1"}[1m])) by (le, namespace, pod))"#,
                r#"histogram_quantile(0.95, sum(irate(response_latency_ms_bucket{direction="inbound", namespace="emojivoto", pod="emojivoto-1"}[1m])) by (le, namespace, pod))"#,
                r#"histogram_quantile(0.99, sum(irate(response_latency_ms_bucket{direction="inbound", namespace="emojivoto", pod="emojivoto-1"}[1m])) by (le, namespace, pod))"#,
                r#"sum(increase(response_total{direction="inbound", namespace="emojivoto", pod="emojivoto-1"}[1m])) by (namespace, pod, classification, tls)"#,
            ]
        );
    }

    #[test]
    fn to_resource_adds_destination_labels_and_keeps_grouping() {
        let request = scoped(
            request(ResourceKind::Pod, "emojivoto", "emojivoto-1"),
            ScopeRoute::To,
            ResourceKind::Pod,
            "totallydifferent",
            "emojivoto-2",
        );
        let queries = queries_for(&request, ResourceKind::Pod);
        assert_eq!(
            queries[0],
            r#"histogram_quantile(0.5, sum(irate(response_latency_ms_bucket{direction="outbound", dst_namespace="totallydifferent", dst_pod="emojivoto-2", namespace="emojivoto", pod="emojivoto-1"}[1m])) by (le, namespace, pod))"#,
        );
        assert_eq!(
            queries[3],
            r#"sum(increase(response_total{direction="outbound", dst_namespace="totallydifferent", dst_pod="emojivoto-2", namespace="emojivoto", pod="emojivoto-1"}[1m])) by (namespace, pod, classification, tls)"#,
        );
    }

    #[test]
    fn from_resource_ignores_selector_and_groups_by_destination() {
        // Peer namespace left empty: no namespace label at all.
        let request = scoped(
            request(ResourceKind::Pod, "emojivoto", "emojivoto-1"),
            ScopeRoute::From,
            ResourceKind::Pod,
            "",
            "emojivoto-2",
        );
        let queries = queries_for(&request, ResourceKind::Pod);
        assert_eq!(
            queries[0],
            r#"histogram_quantile(0.5, sum(irate(response_latency_ms_bucket{direction="outbound", pod="emojivoto-2"}[1m])) by (le, dst_namespace, dst_pod))"#,
        );
        assert_eq!(
            queries[3],
            r#"sum(increase(response_total{direction="outbound", pod="emojivoto-2"}[1m])) by (dst_namespace, dst_pod, classification, tls)"#,
        );
    }

    #[test]
    fn named_authority_inbound_queries() {
        let request = request(ResourceKind::Authority, "nanomesh", "10.1.1.239:9995");
        let queries = queries_for(&request, ResourceKind::Authority);
        assert_eq!(
            queries[0],
            r#"histogram_quantile(0.5, sum(irate(response_latency_ms_bucket{authority="10.1.1.239:9995", direction="inbound", namespace="nanomesh"}[1m])) by (le, namespace, authority))"#,
        );
        assert_eq!(
            queries[3],
            r#"sum(increase(response_total{authority="10.1.1.239:9995", direction="inbound", namespace="nanomesh"}[1m])) by (namespace, authority, classification, tls)"#,
        );
    }

    #[test]
    fn authority_grouping_is_never_dst_prefixed() {
        let request = scoped(
            request(ResourceKind::Authority, "nanomesh", ""),
            ScopeRoute::From,
            ResourceKind::Deployment,
            "",
            "emojivoto",
        );
        let queries = queries_for(&request, ResourceKind::Authority);
        assert_eq!(
            queries[0],
            r#"histogram_quantile(0.5, sum(irate(response_latency_ms_bucket{deployment="emojivoto", direction="outbound"}[1m])) by (le, dst_namespace, authority))"#,
        );
        assert_eq!(
            queries[3],
            r#"sum(increase(response_total{deployment="emojivoto", direction="outbound"}[1m])) by (dst_namespace, authority, classification, tls)"#,
        );
    }

    #[test]
    fn namespace_kind_groups_by_namespace_alone() {
        let request = request(ResourceKind::Namespace, "", "emojivoto");
        let queries = queries_for(&request, ResourceKind::Namespace);
        assert_eq!(
            queries[3],
            r#"sum(increase(response_total{direction="inbound", namespace="emojivoto"}[1m])) by (namespace, classification, tls)"#,
        );
    }

    #[test]
    fn every_query_carries_exactly_one_direction_label() {
        let inbound = request(ResourceKind::Deployment, "emojivoto", "");
        let outbound = scoped(
            request(ResourceKind::Deployment, "emojivoto", ""),
            ScopeRoute::To,
            ResourceKind::Pod,
            "emojivoto",
            "emoji-1",
        );
        for request in [&inbound, &outbound] {
            for query in queries_for(request, ResourceKind::Deployment) {
                assert_eq!(query.matches("direction=").count(), 1, "{query}");
            }
        }
    }
}
