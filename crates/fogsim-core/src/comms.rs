// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use esnode_offload::ResourceStatus;

use crate::adapters::energy::RECEIVE_ENERGY_FACTOR;
use crate::adapters::{Adapters, PowerState};
use crate::device::FogDevice;
use crate::task::Task;

pub const BASE_LATENCY_MS: f64 = 10.0;
pub const DISTANCE_FACTOR_MS: f64 = 0.1;
/// Serialized payload weight of one MI of task work.
pub const PAYLOAD_BYTES_PER_MI: u64 = 1000;

#[must_use]
pub fn euclid(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Device-local message accounting plus the two delivery operations. Every
/// send bumps `messages`, whether or not the far end accepts.
#[derive(Debug, Default)]
pub struct Communicator {
    pub messages: u64,
}

impl Communicator {
    /// Deliver a resource status into the target's neighbor cache.
    pub fn send_status(&mut self, target: &mut FogDevice, status: ResourceStatus) {
        self.messages += 1;
        target.monitor.update_neighbor(status);
    }

    /// Transfer a task to `target`. Authentication, transmission and the
    /// target's queue capacity are all checked before the task is touched,
    /// so a rejected transfer hands the task back without any latency from
    /// the path not taken. No retry; failure is final per call.
    pub fn offload_task(
        &mut self,
        src_id: &str,
        src_pos: (f64, f64),
        target: &mut FogDevice,
        mut task: Task,
        adapters: &mut Adapters,
    ) -> Result<(), Task> {
        self.messages += 1;
        if !adapters.security.authenticate(src_id, &target.id) {
            tracing::debug!(task = %task.id, from = src_id, to = %target.id, "transfer refused: authentication");
            return Err(task);
        }
        let distance = euclid(src_pos, (target.x, target.y));
        let outcome = adapters
            .network
            .simulate_transmission(task.size_mi * PAYLOAD_BYTES_PER_MI, distance);
        if !outcome.success {
            tracing::debug!(task = %task.id, to = %target.id, reason = outcome.reason, "transfer failed");
            return Err(task);
        }
        if !target.sched.has_capacity() {
            return Err(task);
        }

        task.response_time_ms += outcome.latency_ms + adapters.security.overhead_ms();
        adapters.energy.consume(PowerState::Transmit, outcome.energy_j);
        adapters
            .energy
            .consume(PowerState::Receive, outcome.energy_j * RECEIVE_ENERGY_FACTOR);
        target.receive_task(task)
    }
}
