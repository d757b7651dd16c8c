// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use crate::policy::least_utilized;
use crate::table::OffloadTable;
use crate::{CandidateScope, DeviceView, OffloadPolicy, TaskView, HIGH_UTIL};

/// Static offloading (SoA): every device has a pre-registered partner on a
/// per-cell capacity ring, refreshed only when the controller asks.
#[derive(Debug, Default)]
pub struct StaticOffload {
    table: OffloadTable,
}

impl StaticOffload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OffloadPolicy for StaticOffload {
    fn name(&self) -> &'static str {
        "static"
    }

    fn candidate_scope(&self) -> CandidateScope {
        CandidateScope::Cell
    }

    fn update_policy(&mut self, devices: &[DeviceView]) {
        self.table = OffloadTable::capacity_ring(devices);
        tracing::debug!(entries = self.table.len(), "static offload ring rebuilt");
    }

    fn should_offload(&mut self, src: &DeviceView, task: &TaskView) -> bool {
        src.cpu_utilization > HIGH_UTIL || !src.has_resources(task)
    }

    fn select_target(
        &mut self,
        src: &DeviceView,
        task: &TaskView,
        candidates: &[DeviceView],
    ) -> Option<String> {
        if let Some(partner) = self.table.partner(&src.id) {
            if let Some(target) = candidates.iter().find(|c| c.id == partner) {
                if target.has_resources(task) {
                    return Some(target.id.clone());
                }
            }
        }
        let pool: Vec<&DeviceView> = candidates.iter().filter(|c| c.id != src.id).collect();
        least_utilized(&pool).map(|d| d.id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::testutil::{loaded, task, view};
    use crate::Role;

    fn ring_devices() -> Vec<DeviceView> {
        let mut a = view("fog-a", 0, Role::Member);
        a.total_mips = 3000;
        a.available_mips = 3000;
        let mut b = view("fog-b", 0, Role::Member);
        b.total_mips = 2000;
        b.available_mips = 2000;
        let mut c = view("fog-c", 0, Role::Member);
        c.total_mips = 1000;
        c.available_mips = 1000;
        vec![a, b, c]
    }

    #[test]
    fn offloads_above_threshold_or_on_misfit() {
        let mut policy = StaticOffload::new();
        let idle = view("fog-a", 0, Role::Member);
        assert!(!policy.should_offload(&idle, &task("t", 500, false)));

        let hot = loaded(view("fog-a", 0, Role::Member), 0.85);
        assert!(policy.should_offload(&hot, &task("t", 10, false)));

        // A task bigger than the free pool must go somewhere else even when
        // utilization still reads moderate.
        let busy = loaded(view("fog-a", 0, Role::Member), 0.6);
        assert!(policy.should_offload(&busy, &task("t", 900, false)));
    }

    #[test]
    fn prefers_the_registered_ring_partner() {
        let devices = ring_devices();
        let mut policy = StaticOffload::new();
        policy.update_policy(&devices);

        // Ring by capacity: a -> b -> c -> a.
        let candidates: Vec<DeviceView> = devices[1..].to_vec();
        let target = policy.select_target(&devices[0], &task("t", 500, false), &candidates);
        assert_eq!(target.as_deref(), Some("fog-b"));
    }

    #[test]
    fn falls_back_to_least_utilized_when_partner_cannot_hold() {
        let devices = ring_devices();
        let mut policy = StaticOffload::new();
        policy.update_policy(&devices);

        let mut candidates: Vec<DeviceView> = devices[1..].to_vec();
        candidates[0] = loaded(candidates[0].clone(), 0.95); // fog-b full
        let target = policy.select_target(&devices[0], &task("t", 500, false), &candidates);
        assert_eq!(target.as_deref(), Some("fog-c"));
    }

    #[test]
    fn no_candidates_means_no_target() {
        let mut policy = StaticOffload::new();
        let src = view("fog-solo", 0, Role::Member);
        assert!(policy
            .select_target(&src, &task("t", 100, false), &[])
            .is_none());
    }
}
