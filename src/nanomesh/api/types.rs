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

//! Wire messages of the stat API. Field names follow the protobuf contract,
//! so both `oneof`s are serde enums: the request scope is a flattened
//! optional enum, the response is externally tagged (`ok` / `error`).

use serde::{Deserialize, Serialize};

/// Identity of one resource: kind (canonical plural), namespace, name.
/// Namespace is empty for the kind `namespace` and cluster-wide authorities;
/// name is empty to address every object of the kind in scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Resource {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ResourceSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<Resource>,
}

/// Optional peer scope shifting a query from inbound to outbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum Outbound {
    ToResource(Resource),
    FromResource(Resource),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatSummaryRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<ResourceSelection>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub time_window: String,
    #[serde(flatten)]
    pub outbound: Option<Outbound>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum StatSummaryResponse {
    Ok(StatOk),
    Error(ResponseError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatOk {
    pub stat_tables: Vec<StatTable>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ResponseError {
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatTable {
    pub pod_group: PodGroup,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PodGroup {
    #[serde(default)]
    pub rows: Vec<StatRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatRow {
    pub resource: Resource,
    pub time_window: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<BasicStats>,
    #[serde(default)]
    pub meshed_pod_count: u64,
    #[serde(default)]
    pub running_pod_count: u64,
    #[serde(default)]
    pub failed_pod_count: u64,
}

/// Traffic aggregates for one row over the request's time window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BasicStats {
    #[serde(default)]
    pub success_count: u64,
    #[serde(default)]
    pub failure_count: u64,
    #[serde(default)]
    pub latency_ms_p50: u64,
    #[serde(default)]
    pub latency_ms_p95: u64,
    #[serde(default)]
    pub latency_ms_p99: u64,
    #[serde(default)]
    pub tls_request_count: u64,
}

/// Body returned by the HTTP surface for transport-level failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_scope_deserializes_as_oneof() {
        let request: StatSummaryRequest = serde_json::from_value(json!({
            "selector": { "resource": { "kind": "pods", "namespace": "emojivoto" } },
            "time_window": "1m",
            "to_resource": { "kind": "services", "namespace": "emojivoto", "name": "web" }
        }))
        .expect("valid request");

        match request.outbound {
            Some(Outbound::ToResource(peer)) => {
                assert_eq!(peer.kind, "services");
                assert_eq!(peer.name, "web");
            }
            other => panic!("unexpected scope: {:?}", other),
        }
    }

    #[test]
    fn request_without_scope_has_no_outbound() {
        let request: StatSummaryRequest = serde_json::from_value(json!({
            "selector": { "resource": { "kind": "deployments" } }
        }))
        .expect("valid request");
        assert_eq!(request.outbound, None);
        assert_eq!(request.time_window, "");
    }

    #[test]
    fn response_is_externally_tagged() {
        let response = StatSummaryResponse::Error(ResponseError {
            message: "bad scope".to_string(),
        });
        let encoded = serde_json::to_value(&response).expect("serializable");
        assert_eq!(encoded, json!({ "error": { "message": "bad scope" } }));
    }

    #[test]
    fn absent_stats_are_omitted() {
        let row = StatRow {
            resource: Resource {
                kind: "pods".to_string(),
                namespace: "emojivoto".to_string(),
                name: "emoji-1".to_string(),
            },
            time_window: "1m".to_string(),
            ..StatRow::default()
        };
        let encoded = serde_json::to_value(&row).expect("serializable");
        assert!(encoded.get("stats").is_none());
    }
}
