// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use std::collections::HashMap;

use esnode_offload::cluster::Cell;
use esnode_offload::{CandidateScope, DeviceView, OffloadPolicy};
use serde::Serialize;

use crate::adapters::Adapters;
use crate::device::FogDevice;
use crate::task::Task;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct ControllerStats {
    pub generated: u64,
    pub local: u64,
    pub offloaded: u64,
    pub fallback_local: u64,
    pub dropped: u64,
}

/// Per-task orchestration: ask the active policy whether and where to
/// offload, move the task over the source's communicator, fall back to
/// local admission once on rejection, and drop what nobody takes.
pub struct Controller {
    policy: Box<dyn OffloadPolicy>,
    pub stats: ControllerStats,
}

/// Disjoint mutable access to two devices of the fleet.
pub(crate) fn pair_mut(
    devices: &mut [FogDevice],
    a: usize,
    b: usize,
) -> (&mut FogDevice, &mut FogDevice) {
    assert_ne!(a, b, "pair_mut requires two distinct devices");
    if a < b {
        let (left, right) = devices.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = devices.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}

impl Controller {
    #[must_use]
    pub fn new(policy: Box<dyn OffloadPolicy>) -> Self {
        Self {
            policy,
            stats: ControllerStats::default(),
        }
    }

    #[must_use]
    pub fn policy_name(&self) -> &'static str {
        self.policy.name()
    }

    /// Route one freshly generated task.
    pub fn process_task(
        &mut self,
        devices: &mut [FogDevice],
        index: &HashMap<String, usize>,
        src_fog: &str,
        task: Task,
        adapters: &mut Adapters,
    ) {
        self.stats.generated += 1;
        let Some(&src) = index.get(src_fog) else {
            tracing::warn!(fog = src_fog, task = %task.id, "task bound to unknown fog device");
            self.stats.dropped += 1;
            return;
        };

        let views: Vec<DeviceView> = devices.iter().map(FogDevice::view).collect();
        let src_view = &views[src];
        let task_view = task.view();

        if !self.policy.should_offload(src_view, &task_view) {
            self.admit_local(devices, src, task, false);
            return;
        }

        let candidates: Vec<DeviceView> = match self.policy.candidate_scope() {
            CandidateScope::Cell => views
                .iter()
                .filter(|v| v.cell_id == src_view.cell_id && v.id != src_view.id)
                .cloned()
                .collect(),
            CandidateScope::Global => views
                .iter()
                .filter(|v| v.id != src_view.id)
                .cloned()
                .collect(),
        };

        match self.policy.select_target(src_view, &task_view, &candidates) {
            Some(target_id) if target_id != src_view.id => {
                let Some(&tgt) = index.get(&target_id) else {
                    tracing::warn!(target = %target_id, "policy chose an unknown device");
                    self.admit_local(devices, src, task, true);
                    return;
                };
                let task_id = task.id.clone();
                let (src_dev, tgt_dev) = pair_mut(devices, src, tgt);
                let src_pos = (src_dev.x, src_dev.y);
                match src_dev
                    .comms
                    .offload_task(&src_dev.id, src_pos, tgt_dev, task, adapters)
                {
                    Ok(()) => {
                        self.stats.offloaded += 1;
                        tracing::debug!(task = %task_id, to = %target_id, "task offloaded");
                    }
                    Err(task) => {
                        tracing::debug!(task = %task_id, to = %target_id, "offload rejected; retrying at source");
                        self.admit_local(devices, src, task, true);
                    }
                }
            }
            _ => self.admit_local(devices, src, task, true),
        }
    }

    fn admit_local(&mut self, devices: &mut [FogDevice], src: usize, task: Task, fallback: bool) {
        match devices[src].receive_task(task) {
            Ok(()) => {
                if fallback {
                    self.stats.fallback_local += 1;
                } else {
                    self.stats.local += 1;
                }
            }
            Err(task) => {
                self.stats.dropped += 1;
                tracing::debug!(task = %task.id, device = %devices[src].id, "task dropped");
            }
        }
    }

    /// Periodic refresh: every member pushes a status snapshot to its cell
    /// master, then the policy rebuilds its tables over fresh views.
    pub fn update_status(
        &mut self,
        devices: &mut [FogDevice],
        index: &HashMap<String, usize>,
        cells: &[Cell],
    ) {
        for device in devices.iter_mut() {
            let _ = device.snapshot();
        }
        for cell in cells {
            let Some(master) = cell.master.as_ref() else {
                continue;
            };
            let Some(&master_idx) = index.get(master) else {
                continue;
            };
            for member in &cell.members {
                if member == master {
                    continue;
                }
                let Some(&member_idx) = index.get(member) else {
                    continue;
                };
                let status = devices[member_idx].status();
                let (sender, receiver) = pair_mut(devices, member_idx, master_idx);
                sender.comms.send_status(receiver, status);
            }
            tracing::debug!(
                cell = cell.id,
                master = %master,
                statuses = devices[master_idx].monitor.neighbor_count(),
                "cell status refreshed"
            );
        }

        let views: Vec<DeviceView> = devices.iter().map(FogDevice::view).collect();
        self.policy.update_policy(&views);
    }
}
