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

use crate::nanomesh::k8s::pod::Pod;

/// Annotation stamped on a pod by the sidecar injector. A pod is meshed iff
/// the annotation is present with a non-empty value.
pub const PROXY_VERSION_ANNOTATION: &str = "nanomesh.io/proxy-version";

/// Per-pod classification. Phases other than `Running` and `Failed`
/// (`Succeeded`, `Pending`, `Unknown`, and non-standard strings like
/// `Completed`) land in neither bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PodFlags {
    pub meshed: bool,
    pub running: bool,
    pub failed: bool,
}

pub fn classify(pod: &Pod) -> PodFlags {
    let meshed = pod
        .metadata
        .annotations
        .get(PROXY_VERSION_ANNOTATION)
        .is_some_and(|version| !version.is_empty());
    PodFlags {
        meshed,
        running: pod.is_running(),
        failed: pod.is_failed(),
    }
}

/// Whole-pod aggregates for one stat row. `meshed` counts only pods that are
/// meshed and running; a meshed pod that has terminated contributes nothing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PodCounts {
    pub meshed: u64,
    pub running: u64,
    pub failed: u64,
}

pub fn count_pods<'a>(pods: impl IntoIterator<Item = &'a Pod>) -> PodCounts {
    let mut counts = PodCounts::default();
    for pod in pods {
        let flags = classify(pod);
        if flags.running {
            counts.running += 1;
            if flags.meshed {
                counts.meshed += 1;
            }
        }
        if flags.failed {
            counts.failed += 1;
        }
    }
    counts
}
