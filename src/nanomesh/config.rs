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

use std::env;
use std::time::Duration;

/// Enum for supported configuration parameters
#[derive(Debug)]
pub enum Config {
    BindAddress,
    PrometheusUrl,
    RequestDeadline,
    LogFormat,
}

impl Config {
    /// Returns the associated environment variable for the config parameter.
    pub fn env_var(&self) -> &'static str {
        match self {
            Config::BindAddress => "NANOMESH_BIND_ADDRESS",
            Config::PrometheusUrl => "NANOMESH_PROMETHEUS_URL",
            Config::RequestDeadline => "NANOMESH_REQUEST_DEADLINE",
            Config::LogFormat => "NANOMESH_LOG_FORMAT",
        }
    }

    /// Returns the default value for the config parameter.
    pub fn default_value(&self) -> &'static str {
        match self {
            Config::BindAddress => "0.0.0.0:8085",
            Config::PrometheusUrl => "http://127.0.0.1:9090",
            Config::RequestDeadline => "10s",
            Config::LogFormat => "text",
        }
    }

    /// Returns the effective value, either from environment or default.
    pub fn get(&self) -> String {
        env::var(self.env_var())
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| self.default_value().to_string())
    }
}

/// Effective per-request deadline. An unparseable override falls back to the
/// default rather than refusing to start.
pub fn request_deadline() -> Duration {
    let configured = Config::RequestDeadline.get();
    humantime::parse_duration(&configured).unwrap_or_else(|_| {
        humantime::parse_duration(Config::RequestDeadline.default_value())
            .expect("default request deadline must parse")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_environment() {
        assert_eq!(Config::BindAddress.default_value(), "0.0.0.0:8085");
        assert!(!Config::PrometheusUrl.get().is_empty());
    }

    #[test]
    fn default_deadline_parses() {
        let parsed = humantime::parse_duration(Config::RequestDeadline.default_value())
            .expect("default must parse");
        assert_eq!(parsed, Duration::from_secs(10));
    }
}
