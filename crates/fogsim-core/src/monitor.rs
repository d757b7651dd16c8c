// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use std::collections::HashMap;

use esnode_offload::ResourceStatus;

/// Per-device resource observer: holds the last local snapshot and a cache
/// of neighbor statuses delivered over the communicator. Entries go stale
/// between refresh rounds; the simulator tolerates last-known data.
#[derive(Debug, Default)]
pub struct Monitor {
    local: Option<ResourceStatus>,
    neighbors: HashMap<String, ResourceStatus>,
}

impl Monitor {
    pub fn observe_local(&mut self, status: ResourceStatus) {
        self.local = Some(status);
    }

    #[must_use]
    pub fn local(&self) -> Option<&ResourceStatus> {
        self.local.as_ref()
    }

    pub fn update_neighbor(&mut self, status: ResourceStatus) {
        self.neighbors.insert(status.device.clone(), status);
    }

    #[must_use]
    pub fn neighbor(&self, device: &str) -> Option<&ResourceStatus> {
        self.neighbors.get(device)
    }

    #[must_use]
    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Last-known statuses of every observed neighbor, id-sorted. This is
    /// the master's cell-wide view.
    #[must_use]
    pub fn cell_view(&self) -> Vec<&ResourceStatus> {
        let mut view: Vec<&ResourceStatus> = self.neighbors.values().collect();
        view.sort_by(|a, b| a.device.cmp(&b.device));
        view
    }
}
