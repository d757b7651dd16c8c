// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use rand::{rngs::StdRng, Rng, SeedableRng};

use esnode_offload::cluster::{self, Cell, ClusterError};
use esnode_offload::Role;

use crate::comms::euclid;
use crate::config::SimConfig;
use crate::device::{DeviceSpec, FogDevice, IotDevice};

const RAM_RANGE_MB: (u64, u64) = (1024, 8192);
const STORAGE_RANGE_MB: (u64, u64) = (8_192, 131_072);
const BANDWIDTH_RANGE_MBPS: (u64, u64) = (100, 1000);

/// Place the fog fleet uniformly in the world square with heterogeneous
/// capabilities, all drawn from the topology seed.
#[must_use]
pub fn build_fog_devices(config: &SimConfig) -> Vec<FogDevice> {
    let mut rng = StdRng::seed_from_u64(config.topology_seed);
    (0..config.fog_devices)
        .map(|i| {
            let x = rng.gen_range(0.0..=config.world_size);
            let y = rng.gen_range(0.0..=config.world_size);
            let spec = DeviceSpec {
                total_mips: rng.gen_range(config.min_device_mips..=config.max_device_mips),
                ram_mb: rng.gen_range(RAM_RANGE_MB.0..=RAM_RANGE_MB.1),
                storage_mb: rng.gen_range(STORAGE_RANGE_MB.0..=STORAGE_RANGE_MB.1),
                bandwidth_mbps: rng.gen_range(BANDWIDTH_RANGE_MBPS.0..=BANDWIDTH_RANGE_MBPS.1),
                max_queue: config.max_queue,
            };
            FogDevice::new(format!("fog-{i:03}"), x, y, spec)
        })
        .collect()
}

/// Place the IoT sources and bind each to its nearest fog device (ties go
/// to the lowest device index).
#[must_use]
pub fn build_iot_devices(config: &SimConfig, fogs: &[FogDevice]) -> Vec<IotDevice> {
    let mut rng = StdRng::seed_from_u64(config.iot_seed);
    (0..config.iot_devices)
        .map(|i| {
            let x = rng.gen_range(0.0..=config.world_size);
            let y = rng.gen_range(0.0..=config.world_size);
            let nearest = fogs
                .iter()
                .map(|f| euclid((x, y), (f.x, f.y)))
                .enumerate()
                .fold((0usize, f64::INFINITY), |best, (idx, d)| {
                    if d < best.1 {
                        (idx, d)
                    } else {
                        best
                    }
                })
                .0;
            IotDevice::new(format!("iot-{i:03}"), x, y, fogs[nearest].id.clone())
        })
        .collect()
}

/// Run the spatial clusterer over the fleet's positions.
pub fn cluster_fog(
    devices: &[FogDevice],
    cells: usize,
    seed: u64,
) -> Result<Vec<Cell>, ClusterError> {
    let points: Vec<(String, (f64, f64))> = devices
        .iter()
        .map(|d| (d.id.clone(), (d.x, d.y)))
        .collect();
    cluster::cluster_devices(&points, cells, seed)
}

/// Record cell membership, roles and cell mates on every device.
pub fn assign_cells(devices: &mut [FogDevice], cells: &[Cell]) {
    for cell in cells {
        for member in &cell.members {
            let Some(device) = devices.iter_mut().find(|d| &d.id == member) else {
                continue;
            };
            device.cell_id = cell.id;
            device.role = if cell.master.as_ref() == Some(member) {
                Role::Master
            } else {
                Role::Member
            };
            device.cell_members = cell
                .members
                .iter()
                .filter(|m| *m != member)
                .cloned()
                .collect();
        }
    }
}
