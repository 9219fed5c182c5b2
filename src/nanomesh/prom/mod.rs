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

//! Thin client for the metrics backend's instant-query API.
//!
//! The stat core only ever evaluates vector-typed instant queries; range
//! queries and metadata endpoints are out of scope.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One labeled sample from an instant query.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: BTreeMap<String, String>,
    pub value: f64,
    pub timestamp_ms: i64,
}

impl Sample {
    pub fn label(&self, key: &str) -> &str {
        self.labels.get(key).map(String::as_str).unwrap_or_default()
    }
}

pub type Vector = Vec<Sample>;

#[derive(Debug)]
pub struct QueryError(String);

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for QueryError {}

/// The metrics backend as consumed by the stat core: evaluate one PromQL
/// query at an instant, plus a health probe for readiness reporting.
pub trait Prometheus: Send + Sync {
    fn query(
        &self,
        query: &str,
        at: Option<DateTime<Utc>>,
    ) -> impl Future<Output = Result<Vector, QueryError>> + Send;

    fn ready(&self) -> impl Future<Output = Result<(), QueryError>> + Send;
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiData {
    #[serde(rename = "resultType")]
    result_type: String,
    #[serde(default)]
    result: Vec<ApiSample>,
}

#[derive(Debug, Deserialize)]
struct ApiSample {
    metric: BTreeMap<String, String>,
    value: (f64, String),
}

/// HTTP implementation over the Prometheus query API.
#[derive(Debug, Clone)]
pub struct HttpPrometheus {
    base_url: String,
    client: reqwest::Client,
}

impl HttpPrometheus {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

impl Prometheus for HttpPrometheus {
    async fn query(
        &self,
        query: &str,
        at: Option<DateTime<Utc>>,
    ) -> Result<Vector, QueryError> {
        let url = format!("{}/api/v1/query", self.base_url);
        let mut request = self.client.get(&url).query(&[("query", query)]);
        if let Some(at) = at {
            request = request.query(&[("time", at.timestamp().to_string())]);
        }

        let response = request
            .send()
            .await
            .map_err(|err| QueryError::new(format!("metrics backend request failed: {err}")))?;
        if !response.status().is_success() {
            return Err(QueryError::new(format!(
                "metrics backend returned {}",
                response.status()
            )));
        }

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|err| QueryError::new(format!("metrics backend returned invalid JSON: {err}")))?;
        decode_vector(body)
    }

    async fn ready(&self) -> Result<(), QueryError> {
        let url = format!("{}/-/ready", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| QueryError::new(format!("metrics backend probe failed: {err}")))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(QueryError::new(format!(
                "metrics backend not ready: {}",
                response.status()
            )))
        }
    }
}

fn decode_vector(body: ApiResponse) -> Result<Vector, QueryError> {
    if body.status != "success" {
        let detail = body.error.unwrap_or_else(|| body.status.clone());
        return Err(QueryError::new(format!("query failed: {detail}")));
    }
    let data = body
        .data
        .ok_or_else(|| QueryError::new("query succeeded without a result payload"))?;
    if data.result_type != "vector" {
        return Err(QueryError::new(format!(
            "unexpected result type {:?}",
            data.result_type
        )));
    }

    data.result
        .into_iter()
        .map(|sample| {
            let value = sample
                .value
                .1
                .parse::<f64>()
                .map_err(|err| QueryError::new(format!("unparseable sample value: {err}")))?;
            Ok(Sample {
                labels: sample.metric,
                value,
                timestamp_ms: (sample.value.0 * 1000.0) as i64,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_vector_payloads() {
        let body: ApiResponse = serde_json::from_str(
            r#"{
                "status": "success",
                "data": {
                    "resultType": "vector",
                    "result": [
                        {
                            "metric": {"namespace": "emojivoto", "deployment": "emoji"},
                            "value": [1723640400.5, "123"]
                        }
                    ]
                }
            }"#,
        )
        .expect("valid payload");

        let vector = decode_vector(body).expect("vector");
        assert_eq!(vector.len(), 1);
        assert_eq!(vector[0].label("deployment"), "emoji");
        assert_eq!(vector[0].value, 123.0);
        assert_eq!(vector[0].timestamp_ms, 1723640400500);
    }

    #[test]
    fn surfaces_backend_errors() {
        let body: ApiResponse = serde_json::from_str(
            r#"{"status": "error", "error": "query timed out"}"#,
        )
        .expect("valid payload");
        let err = decode_vector(body).expect_err("error expected");
        assert!(err.to_string().contains("query timed out"));
    }

    #[test]
    fn rejects_non_vector_results() {
        let body: ApiResponse = serde_json::from_str(
            r#"{"status": "success", "data": {"resultType": "matrix", "result": []}}"#,
        )
        .expect("valid payload");
        assert!(decode_vector(body).is_err());
    }
}
