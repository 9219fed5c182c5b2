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

//! The closed vocabulary of resource kinds the stat API can address.
//!
//! Only canonical plural forms are accepted at the edge; the singular form
//! doubles as the label key under which the metrics backend records the
//! resource's identity. Variant order is the display order of stat tables.

/// Pseudo-kind accepted in requests; expands to the four reportable kinds.
pub const ALL: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Namespace,
    Authority,
    Deployment,
    Pod,
    Service,
    ReplicaSet,
}

impl ResourceKind {
    /// Canonicalizes a request kind. Aliases and singular forms are rejected.
    pub fn parse(kind: &str) -> Option<Self> {
        match kind {
            "namespaces" => Some(ResourceKind::Namespace),
            "authorities" => Some(ResourceKind::Authority),
            "deployments" => Some(ResourceKind::Deployment),
            "pods" => Some(ResourceKind::Pod),
            "services" => Some(ResourceKind::Service),
            "replicasets" => Some(ResourceKind::ReplicaSet),
            _ => None,
        }
    }

    pub fn singular(self) -> &'static str {
        match self {
            ResourceKind::Namespace => "namespace",
            ResourceKind::Authority => "authority",
            ResourceKind::Deployment => "deployment",
            ResourceKind::Pod => "pod",
            ResourceKind::Service => "service",
            ResourceKind::ReplicaSet => "replicaset",
        }
    }

    /// Canonical plural form, used in request kinds and response rows.
    pub fn plural(self) -> &'static str {
        match self {
            ResourceKind::Namespace => "namespaces",
            ResourceKind::Authority => "authorities",
            ResourceKind::Deployment => "deployments",
            ResourceKind::Pod => "pods",
            ResourceKind::Service => "services",
            ResourceKind::ReplicaSet => "replicasets",
        }
    }

    /// Label key carrying this kind's identity in metrics backend samples.
    pub fn label_key(self) -> &'static str {
        self.singular()
    }

    /// The kinds `all` expands to. `namespace` and `replicaset` are
    /// addressable individually but never emitted by `all`.
    pub fn expand_all() -> [Self; 4] {
        [
            ResourceKind::Deployment,
            ResourceKind::Pod,
            ResourceKind::Service,
            ResourceKind::Authority,
        ]
    }

    /// Whether pods back this kind. Authorities are synthesized from traffic
    /// and carry no pod counts.
    pub fn has_pods(self) -> bool {
        !matches!(self, ResourceKind::Authority)
    }
}
