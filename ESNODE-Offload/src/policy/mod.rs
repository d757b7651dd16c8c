// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use crate::{DeviceView, TaskView, HIGH_UTIL};

pub mod hyboff;
pub mod poa;
pub mod soa;

/// Candidates worth offloading to: somebody else, with room for the task,
/// and not already overloaded.
#[must_use]
pub fn eligible<'a>(
    src: &DeviceView,
    task: &TaskView,
    candidates: &'a [DeviceView],
) -> Vec<&'a DeviceView> {
    candidates
        .iter()
        .filter(|c| c.id != src.id && c.has_resources(task) && c.cpu_utilization < HIGH_UTIL)
        .collect()
}

/// Least loaded device in `pool`, ties broken by id.
#[must_use]
pub fn least_utilized<'a>(pool: &[&'a DeviceView]) -> Option<&'a DeviceView> {
    pool.iter().copied().min_by(|a, b| {
        a.cpu_utilization
            .total_cmp(&b.cpu_utilization)
            .then_with(|| a.id.cmp(&b.id))
    })
}

/// Device in `pool` closest to `src`, ties broken by id.
#[must_use]
pub fn nearest<'a>(src: &DeviceView, pool: &[&'a DeviceView]) -> Option<&'a DeviceView> {
    pool.iter().copied().min_by(|a, b| {
        src.distance_to(a)
            .total_cmp(&src.distance_to(b))
            .then_with(|| a.id.cmp(&b.id))
    })
}


#[cfg(test)]
mod tests {
    use super::testutil::{loaded, task, view};
    use super::*;
    use crate::Role;

    #[test]
    fn eligible_filters_source_overload_and_misfits() {
        let src = view("fog-src", 0, Role::Member);
        let ok = loaded(view("fog-ok", 0, Role::Member), 0.4);
        let hot = loaded(view("fog-hot", 0, Role::Member), 0.9);
        let candidates = vec![src.clone(), ok.clone(), hot];

        let small = task("t1", 200, false);
        let pool = eligible(&src, &small, &candidates);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool[0].id, "fog-ok");

        let huge = task("t2", 5000, false);
        assert!(eligible(&src, &huge, &candidates).is_empty());
    }

    #[test]
    fn selection_ties_break_by_id() {
        let a = loaded(view("fog-a", 0, Role::Member), 0.5);
        let b = loaded(view("fog-b", 0, Role::Member), 0.5);
        let pool = vec![&b, &a];
        assert_eq!(least_utilized(&pool).unwrap().id, "fog-a");

        let src = view("fog-src", 0, Role::Member);
        assert_eq!(nearest(&src, &pool).unwrap().id, "fog-a");
    }
}
