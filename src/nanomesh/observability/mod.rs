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

//! Observability primitives of the Nanomesh control plane.
//!
//! Self-metrics follow the Prometheus naming conventions: snake_case names
//! prefixed with the project (`nanomesh`), counters ending with `_total`,
//! duration histograms ending with `_seconds`. Logging flows through the
//! `tracing` macros, set up in [`trace`].

pub mod health;
pub mod metrics;
pub mod trace;
