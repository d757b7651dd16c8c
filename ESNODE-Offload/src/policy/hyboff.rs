// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use crate::table::OffloadTable;
use crate::{CandidateScope, DeviceView, OffloadPolicy, Role, TaskView, HIGH_UTIL, MID_UTIL};

/// Load weight of the score blend for urgent tasks; distance dominates.
pub const URGENT_LOAD_WEIGHT: f64 = 0.3;
/// Load weight for non-urgent tasks; load dominates.
pub const NORMAL_LOAD_WEIGHT: f64 = 0.7;
/// Distances are normalized by this before blending with utilization.
pub const DISTANCE_NORM: f64 = 1000.0;

/// Hybrid offloading (HybOff): a master-aware static table for the common
/// case, with a weighted utilization/distance blend as the adaptive path.
/// Masters retain work until they are overloaded; everything stays inside
/// the source's cell.
#[derive(Debug, Default)]
pub struct HybridOffload {
    table: OffloadTable,
}

impl HybridOffload {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn blended(
        src: &DeviceView,
        task: &TaskView,
        pool: &[&DeviceView],
        load_weight: f64,
    ) -> Option<String> {
        pool.iter()
            .copied()
            .filter(|c| c.has_resources(task) && c.cpu_utilization < HIGH_UTIL)
            .min_by(|a, b| {
                Self::score(src, a, load_weight)
                    .total_cmp(&Self::score(src, b, load_weight))
                    .then_with(|| a.id.cmp(&b.id))
            })
            .map(|d| d.id.clone())
    }

    fn score(src: &DeviceView, candidate: &DeviceView, load_weight: f64) -> f64 {
        let distance = src.distance_to(candidate) / DISTANCE_NORM;
        load_weight.mul_add(candidate.cpu_utilization, (1.0 - load_weight) * distance)
    }
}

impl OffloadPolicy for HybridOffload {
    fn name(&self) -> &'static str {
        "hybrid"
    }

    fn candidate_scope(&self) -> CandidateScope {
        CandidateScope::Cell
    }

    fn update_policy(&mut self, devices: &[DeviceView]) {
        self.table = OffloadTable::master_aware(devices);
        tracing::debug!(entries = self.table.len(), "hybrid offload table rebuilt");
    }

    fn should_offload(&mut self, src: &DeviceView, task: &TaskView) -> bool {
        if !src.has_resources(task) {
            return true;
        }
        if src.role == Role::Master && src.cpu_utilization < HIGH_UTIL {
            return false;
        }
        if task.urgent {
            return false;
        }
        src.cpu_utilization > MID_UTIL
    }

    fn select_target(
        &mut self,
        src: &DeviceView,
        task: &TaskView,
        candidates: &[DeviceView],
    ) -> Option<String> {
        let cell: Vec<&DeviceView> = candidates
            .iter()
            .filter(|c| c.cell_id == src.cell_id && c.id != src.id)
            .collect();
        if task.urgent {
            return Self::blended(src, task, &cell, URGENT_LOAD_WEIGHT);
        }
        if let Some(partner) = self.table.partner(&src.id) {
            if let Some(target) = cell.iter().find(|c| c.id == partner) {
                if target.has_resources(task) {
                    return Some(target.id.clone());
                }
            }
        }
        Self::blended(src, task, &cell, NORMAL_LOAD_WEIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::testutil::{at, loaded, task, view};

    #[test]
    fn master_retains_work_below_the_overload_line() {
        let mut policy = HybridOffload::new();
        let master = loaded(view("fog-m", 0, Role::Master), 0.7);
        assert!(!policy.should_offload(&master, &task("t", 100, false)));

        let hot_master = loaded(view("fog-m", 0, Role::Master), 0.85);
        assert!(policy.should_offload(&hot_master, &task("t", 100, false)));
    }

    #[test]
    fn urgent_tasks_stay_local_when_they_fit() {
        let mut policy = HybridOffload::new();
        let busy = loaded(view("fog-a", 0, Role::Member), 0.7);
        assert!(!policy.should_offload(&busy, &task("t", 100, true)));
        // Unless the task cannot run here at all.
        assert!(policy.should_offload(&busy, &task("t", 900, true)));
    }

    #[test]
    fn members_shed_non_urgent_work_above_mid_load() {
        let mut policy = HybridOffload::new();
        let light = loaded(view("fog-a", 0, Role::Member), 0.4);
        assert!(!policy.should_offload(&light, &task("t", 100, false)));

        let loaded_member = loaded(view("fog-a", 0, Role::Member), 0.6);
        assert!(policy.should_offload(&loaded_member, &task("t", 100, false)));
    }

    #[test]
    fn selection_is_restricted_to_the_source_cell() {
        let mut policy = HybridOffload::new();
        let src = view("fog-src", 0, Role::Member);
        let foreign = view("fog-other", 1, Role::Member);
        assert!(policy
            .select_target(&src, &task("t", 100, false), &[foreign])
            .is_none());
    }

    #[test]
    fn non_urgent_prefers_the_table_partner_with_resources() {
        let devices = vec![
            view("fog-m", 0, Role::Master),
            view("fog-a", 0, Role::Member),
            view("fog-b", 0, Role::Member),
        ];
        let mut policy = HybridOffload::new();
        policy.update_policy(&devices);

        // fog-a's chain partner is fog-b (equal capacity, id order).
        let candidates = vec![devices[0].clone(), devices[2].clone()];
        let target = policy.select_target(&devices[1], &task("t", 100, false), &candidates);
        assert_eq!(target.as_deref(), Some("fog-b"));

        // Partner saturated: blend takes over and lands on the master.
        let candidates = vec![devices[0].clone(), loaded(devices[2].clone(), 0.95)];
        let target = policy.select_target(&devices[1], &task("t", 100, false), &candidates);
        assert_eq!(target.as_deref(), Some("fog-m"));
    }

    #[test]
    fn blend_weights_flip_between_urgency_classes() {
        let mut policy = HybridOffload::new();
        let src = at(view("fog-src", 0, Role::Member), 0.0, 0.0);
        let near_loaded = loaded(at(view("fog-near", 0, Role::Member), 50.0, 0.0), 0.7);
        let far_idle = at(view("fog-far", 0, Role::Member), 600.0, 0.0);
        let candidates = vec![near_loaded, far_idle];

        // Urgent: 0.3*0.7 + 0.7*0.05 = 0.245 beats 0.7*0.6 = 0.42.
        let urgent = policy.select_target(&src, &task("t", 100, true), &candidates);
        assert_eq!(urgent.as_deref(), Some("fog-near"));

        // Non-urgent: 0.7*0.7 + 0.3*0.05 = 0.505 loses to 0.3*0.6 = 0.18.
        let normal = policy.select_target(&src, &task("t", 100, false), &candidates);
        assert_eq!(normal.as_deref(), Some("fog-far"));
    }
}
