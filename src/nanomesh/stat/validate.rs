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

use std::error::Error;
use std::fmt;

use crate::nanomesh::api::types::{Outbound, Resource, StatSummaryRequest};
use crate::nanomesh::k8s::resources::{self, ResourceKind};

pub const DEFAULT_TIME_WINDOW: &str = "1m";

/// What the request reports on: one kind, or the `all` expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatTarget {
    All,
    Kind(ResourceKind),
}

impl StatTarget {
    /// Targeted kinds in table display order.
    pub fn kinds(self) -> Vec<ResourceKind> {
        match self {
            StatTarget::Kind(kind) => vec![kind],
            StatTarget::All => {
                let mut kinds = ResourceKind::expand_all().to_vec();
                kinds.sort();
                kinds
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeRoute {
    To,
    From,
}

/// Normalized outbound peer scope.
#[derive(Debug, Clone)]
pub struct OutboundScope {
    pub route: ScopeRoute,
    pub kind: ResourceKind,
    pub namespace: String,
    pub name: String,
}

/// A request that passed admission, with the time window normalized.
#[derive(Debug, Clone)]
pub struct ValidRequest {
    pub target: StatTarget,
    pub namespace: String,
    pub name: String,
    pub time_window: String,
    pub outbound: Option<OutboundScope>,
}

#[derive(Debug)]
pub enum ValidationError {
    /// The caller addressed a kind outside the closed vocabulary; surfaced
    /// as an RPC-level `Unimplemented` because it is out of contract.
    UnknownKind(String),
    /// Everything else; carried in the `error` branch of the response.
    Invalid(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::UnknownKind(kind) => {
                write!(f, "unimplemented resource type: {kind}")
            }
            ValidationError::Invalid(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ValidationError {}

pub fn validate(request: &StatSummaryRequest) -> Result<ValidRequest, ValidationError> {
    let resource = request
        .selector
        .as_ref()
        .and_then(|selection| selection.resource.as_ref())
        .ok_or_else(|| {
            ValidationError::Invalid("request does not specify a resource to report on".to_string())
        })?;

    let target = parse_target(&resource.kind)?;

    let outbound = match &request.outbound {
        None => None,
        Some(Outbound::ToResource(peer)) => Some(parse_scope(ScopeRoute::To, peer)?),
        Some(Outbound::FromResource(peer)) => Some(parse_scope(ScopeRoute::From, peer)?),
    };

    if target == StatTarget::Kind(ResourceKind::Service) && outbound.is_some() {
        return Err(ValidationError::Invalid(
            "services do not originate traffic; a service selector cannot carry an outbound scope"
                .to_string(),
        ));
    }

    let time_window = normalize_time_window(&request.time_window)?;

    Ok(ValidRequest {
        target,
        namespace: resource.namespace.clone(),
        name: resource.name.clone(),
        time_window,
        outbound,
    })
}

fn parse_target(kind: &str) -> Result<StatTarget, ValidationError> {
    if kind == resources::ALL {
        return Ok(StatTarget::All);
    }
    ResourceKind::parse(kind)
        .map(StatTarget::Kind)
        .ok_or_else(|| ValidationError::UnknownKind(kind.to_string()))
}

fn parse_scope(route: ScopeRoute, peer: &Resource) -> Result<OutboundScope, ValidationError> {
    if peer.kind == resources::ALL {
        return Err(ValidationError::Invalid(
            "\"all\" cannot be used as an outbound peer".to_string(),
        ));
    }
    let kind = ResourceKind::parse(&peer.kind)
        .ok_or_else(|| ValidationError::UnknownKind(peer.kind.clone()))?;
    if route == ScopeRoute::From && kind == ResourceKind::Service {
        return Err(ValidationError::Invalid(
            "services do not originate traffic; \"services\" cannot be used as a from resource"
                .to_string(),
        ));
    }
    Ok(OutboundScope {
        route,
        kind,
        namespace: peer.namespace.clone(),
        name: peer.name.clone(),
    })
}

fn normalize_time_window(window: &str) -> Result<String, ValidationError> {
    if window.is_empty() {
        return Ok(DEFAULT_TIME_WINDOW.to_string());
    }
    let duration = humantime::parse_duration(window).map_err(|err| {
        ValidationError::Invalid(format!("unable to parse time window {window:?}: {err}"))
    })?;
    if duration.is_zero() {
        return Err(ValidationError::Invalid(format!(
            "time window {window:?} must be positive"
        )));
    }
    Ok(window.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nanomesh::api::types::ResourceSelection;

    fn request(kind: &str, namespace: &str, name: &str) -> StatSummaryRequest {
        StatSummaryRequest {
            selector: Some(ResourceSelection {
                resource: Some(Resource {
                    kind: kind.to_string(),
                    namespace: namespace.to_string(),
                    name: name.to_string(),
                }),
            }),
            time_window: String::new(),
            outbound: None,
        }
    }

    fn peer(kind: &str) -> Resource {
        Resource {
            kind: kind.to_string(),
            ..Resource::default()
        }
    }

    #[test]
    fn empty_window_defaults_and_given_window_is_kept_verbatim() {
        let valid = validate(&request("pods", "emojivoto", "")).expect("valid");
        assert_eq!(valid.time_window, "1m");

        let mut with_window = request("pods", "emojivoto", "");
        with_window.time_window = "10m".to_string();
        let valid = validate(&with_window).expect("valid");
        assert_eq!(valid.time_window, "10m");
    }

    #[test]
    fn bad_windows_are_invalid_not_unimplemented() {
        for window in ["soon", "-1m", "0s"] {
            let mut req = request("pods", "emojivoto", "");
            req.time_window = window.to_string();
            match validate(&req) {
                Err(ValidationError::Invalid(_)) => {}
                other => panic!("window {window:?}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn unknown_and_singular_kinds_are_unimplemented() {
        for kind in ["badtype", "deployment", "pod"] {
            match validate(&request(kind, "", "")) {
                Err(ValidationError::UnknownKind(k)) => assert_eq!(k, kind),
                other => panic!("kind {kind:?}: unexpected {other:?}"),
            }
        }
    }

    #[test]
    fn missing_selector_is_invalid() {
        let req = StatSummaryRequest::default();
        assert!(matches!(validate(&req), Err(ValidationError::Invalid(_))));
    }

    #[test]
    fn service_scope_rules() {
        // Bare service selector: a server-side lookup, permitted.
        assert!(validate(&request("services", "emojivoto", "")).is_ok());

        // Service selector with any outbound scope is rejected.
        let mut req = request("services", "emojivoto", "");
        req.outbound = Some(Outbound::FromResource(peer("pods")));
        assert!(matches!(validate(&req), Err(ValidationError::Invalid(_))));

        let mut req = request("services", "emojivoto", "");
        req.outbound = Some(Outbound::ToResource(peer("pods")));
        assert!(matches!(validate(&req), Err(ValidationError::Invalid(_))));

        // Service as a from peer is rejected; as a to peer it is fine.
        let mut req = request("pods", "emojivoto", "");
        req.outbound = Some(Outbound::FromResource(peer("services")));
        assert!(matches!(validate(&req), Err(ValidationError::Invalid(_))));

        let mut req = request("pods", "emojivoto", "");
        req.outbound = Some(Outbound::ToResource(peer("services")));
        assert!(validate(&req).is_ok());
    }

    #[test]
    fn all_target_expands_in_display_order() {
        let valid = validate(&request("all", "emojivoto", "")).expect("valid");
        assert_eq!(
            valid.target.kinds(),
            vec![
                ResourceKind::Authority,
                ResourceKind::Deployment,
                ResourceKind::Pod,
                ResourceKind::Service,
            ]
        );
    }

    #[test]
    fn all_is_rejected_as_a_peer() {
        let mut req = request("pods", "emojivoto", "");
        req.outbound = Some(Outbound::ToResource(peer("all")));
        assert!(matches!(validate(&req), Err(ValidationError::Invalid(_))));
    }
}
