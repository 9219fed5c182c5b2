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

//! Tracing setup and request correlation.
//!
//! All logging flows through the `tracing` macros. [`init`] installs the
//! global subscriber; each `StatSummary` call runs inside the span from
//! [`stat_span`], so every warning the query fan-out emits carries the
//! request id and selector identity of the request that triggered it.

use std::fmt::Write;
use std::sync::OnceLock;

use rand::{rngs::OsRng, RngCore};
use tracing::Span;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::nanomesh::Config;

static INIT: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber once. `NANOMESH_LOG_FORMAT=json` switches
/// the output to newline-delimited JSON; the level filter honors `RUST_LOG`
/// and defaults to `info`.
pub fn init() {
    INIT.get_or_init(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let result = if Config::LogFormat.get().eq_ignore_ascii_case("json") {
            tracing::subscriber::set_global_default(
                tracing_subscriber::registry()
                    .with(filter)
                    .with(fmt::layer().json()),
            )
        } else {
            tracing::subscriber::set_global_default(
                tracing_subscriber::registry().with(filter).with(fmt::layer()),
            )
        };
        // Another component (or a test harness) may already have installed
        // a subscriber.
        let _ = result;
    });
}

/// Span wrapping one `StatSummary` call, stamped with a fresh request id and
/// the selector identity.
pub fn stat_span(kind: &str, namespace: &str, name: &str) -> Span {
    let request_id = request_id();
    tracing::info_span!("stat_summary", %request_id, kind, namespace, name)
}

/// Sixteen hex characters of OS randomness; enough to grep one request's
/// log lines out of a busy control plane.
pub fn request_id() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    let mut id = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut id, "{byte:02x}");
    }
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_are_hex_and_distinct() {
        let first = request_id();
        let second = request_id();
        assert_eq!(first.len(), 16);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, second);
    }
}
