// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::policy::{eligible, least_utilized, nearest};
use crate::{CandidateScope, DeviceView, OffloadPolicy, TaskView, HIGH_UTIL, LOW_UTIL};

/// Probability of probing a remote device for a non-urgent task while the
/// source sits in the medium load band.
pub const PROBE_PROBABILITY: f64 = 0.7;

/// Dynamic offloading (PoA): stateless per-task decisions over the current
/// snapshot, cell-agnostic. The only owned state is the seeded probe stream.
#[derive(Debug)]
pub struct DynamicOffload {
    rng: StdRng,
}

impl DynamicOffload {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl OffloadPolicy for DynamicOffload {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn candidate_scope(&self) -> CandidateScope {
        CandidateScope::Global
    }

    fn update_policy(&mut self, _devices: &[DeviceView]) {}

    fn should_offload(&mut self, src: &DeviceView, task: &TaskView) -> bool {
        if src.cpu_utilization > HIGH_UTIL {
            return true;
        }
        if !src.has_resources(task) {
            return true;
        }
        if !task.urgent && src.cpu_utilization > LOW_UTIL {
            return self.rng.gen_bool(PROBE_PROBABILITY);
        }
        false
    }

    fn select_target(
        &mut self,
        src: &DeviceView,
        task: &TaskView,
        candidates: &[DeviceView],
    ) -> Option<String> {
        let pool = eligible(src, task, candidates);
        let target = if task.urgent {
            nearest(src, &pool)
        } else {
            least_utilized(&pool)
        };
        target.map(|d| d.id.clone())
    }
}
