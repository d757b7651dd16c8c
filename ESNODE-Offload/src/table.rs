// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use std::collections::{BTreeMap, HashMap};

use crate::{DeviceView, Role};

/// Per-cell source → target offload map. Two layouts exist: a plain ring
/// over the cell members sorted by capacity, and a master-aware chain where
/// the master feeds the most capable member and the least capable member
/// feeds the master. Both are single cycles, so every member reaches every
/// other by following partners. Single-member cells are skipped.
#[derive(Debug, Clone, Default)]
pub struct OffloadTable {
    entries: HashMap<String, String>,
}

impl OffloadTable {
    /// Layout (a): `member[i] → member[i + 1 mod n]` over members sorted by
    /// `total_mips` descending.
    #[must_use]
    pub fn capacity_ring(devices: &[DeviceView]) -> Self {
        let mut entries = HashMap::new();
        for members in group_by_cell(devices).into_values() {
            ring(&mut entries, &by_capacity(members));
        }
        Self { entries }
    }

    /// Layout (b): master → most capable member, each member → next by
    /// capacity, last member → master. Cells without a master fall back to
    /// the plain ring.
    #[must_use]
    pub fn master_aware(devices: &[DeviceView]) -> Self {
        let mut entries = HashMap::new();
        for members in group_by_cell(devices).into_values() {
            let Some(master) = members.iter().find(|d| d.role == Role::Master) else {
                ring(&mut entries, &by_capacity(members));
                continue;
            };
            let master_id = master.id.clone();
            let others = by_capacity(
                members
                    .iter()
                    .filter(|d| d.id != master_id)
                    .copied()
                    .collect(),
            );
            if others.is_empty() {
                continue;
            }
            let mut chain = vec![master_id];
            chain.extend(others.iter().map(|d| d.id.clone()));
            for pair in chain.windows(2) {
                entries.insert(pair[0].clone(), pair[1].clone());
            }
            entries.insert(chain[chain.len() - 1].clone(), chain[0].clone());
        }
        Self { entries }
    }

    #[must_use]
    pub fn partner(&self, device: &str) -> Option<&str> {
        self.entries.get(device).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn group_by_cell(devices: &[DeviceView]) -> BTreeMap<usize, Vec<&DeviceView>> {
    let mut cells: BTreeMap<usize, Vec<&DeviceView>> = BTreeMap::new();
    for device in devices {
        cells.entry(device.cell_id).or_default().push(device);
    }
    cells
}

fn by_capacity<'a>(mut members: Vec<&'a DeviceView>) -> Vec<&'a DeviceView> {
    members.sort_by(|a, b| b.total_mips.cmp(&a.total_mips).then_with(|| a.id.cmp(&b.id)));
    members
}

fn ring(entries: &mut HashMap<String, String>, members: &[&DeviceView]) {
    if members.len() < 2 {
        return;
    }
    for i in 0..members.len() {
        let next = (i + 1) % members.len();
        entries.insert(members[i].id.clone(), members[next].id.clone());
    }
}
