// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
pub mod adapters;
pub mod comms;
pub mod config;
pub mod controller;
pub mod device;
pub mod metrics;
pub mod monitor;
pub mod sched;
pub mod task;
pub mod topology;
pub mod traffic;

use std::collections::HashMap;

use esnode_offload::cluster::Cell;
use esnode_offload::{build_policy, PolicyKind};
use tracing::info;

use adapters::Adapters;
pub use config::{ConfigOverrides, LogLevel, SimConfig};
use controller::Controller;
use device::{FogDevice, IotDevice};
use metrics::{RunMetrics, SummaryRecord};
use traffic::TrafficGenerator;

#[derive(thiserror::Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Cluster(#[from] esnode_offload::cluster::ClusterError),
}

/// One policy evaluation: a clustered fog fleet, its IoT sources, the
/// controller around the chosen policy, and the per-run aggregates.
/// Single-threaded cooperative ticking; everything is a pure function of
/// the configured seeds.
pub struct Simulation {
    config: SimConfig,
    devices: Vec<FogDevice>,
    iot: Vec<IotDevice>,
    cells: Vec<Cell>,
    index: HashMap<String, usize>,
    controller: Controller,
    traffic: TrafficGenerator,
    adapters: Adapters,
    metrics: RunMetrics,
    now: u64,
}

impl Simulation {
    /// Build a simulation from configuration alone: seeded topology, IoT
    /// binding, clustering, policy construction, initial table refresh.
    pub fn new(config: SimConfig, kind: PolicyKind) -> Result<Self, SimError> {
        config.validate()?;
        let mut devices = topology::build_fog_devices(&config);
        let iot = topology::build_iot_devices(&config, &devices);
        let cells = topology::cluster_fog(&devices, config.cells, config.cluster_seed)?;
        topology::assign_cells(&mut devices, &cells);
        Self::assemble(config, devices, iot, cells, kind)
    }

    /// Build a simulation over a hand-made topology. Clustering and the
    /// policy still come from the config; the strict CLI-level ratio checks
    /// do not apply.
    pub fn from_parts(
        config: SimConfig,
        mut devices: Vec<FogDevice>,
        iot: Vec<IotDevice>,
        kind: PolicyKind,
    ) -> Result<Self, SimError> {
        if devices.is_empty() {
            return Err(config::ConfigError::NoFogDevices.into());
        }
        if devices.iter().any(|d| d.spec.total_mips == 0) {
            return Err(config::ConfigError::ZeroMips.into());
        }
        if config.refresh_interval == 0 {
            return Err(config::ConfigError::ZeroRefreshInterval.into());
        }
        let cells = topology::cluster_fog(&devices, config.cells, config.cluster_seed)?;
        topology::assign_cells(&mut devices, &cells);
        Self::assemble(config, devices, iot, cells, kind)
    }

    fn assemble(
        config: SimConfig,
        devices: Vec<FogDevice>,
        iot: Vec<IotDevice>,
        cells: Vec<Cell>,
        kind: PolicyKind,
    ) -> Result<Self, SimError> {
        let index: HashMap<String, usize> = devices
            .iter()
            .enumerate()
            .map(|(i, d)| (d.id.clone(), i))
            .collect();
        let masters = cells.iter().filter(|c| c.master.is_some()).count();
        info!(
            policy = %kind,
            devices = devices.len(),
            iot = iot.len(),
            cells = cells.len(),
            masters,
            "topology ready"
        );

        let controller = Controller::new(build_policy(kind, config.policy_seed));
        let traffic = TrafficGenerator::new(&config);
        let mut sim = Self {
            config,
            devices,
            iot,
            cells,
            index,
            controller,
            traffic,
            adapters: Adapters::stub(),
            metrics: RunMetrics::default(),
            now: 0,
        };
        sim.controller
            .update_status(&mut sim.devices, &sim.index, &sim.cells);
        Ok(sim)
    }

    /// Advance one tick: generation, per-device scheduling in stable index
    /// order, metrics sampling, and the periodic controller refresh.
    pub fn step(&mut self) {
        let tick_ms = self.config.tick_ms();
        for i in 0..self.iot.len() {
            let Some(task) = self.traffic.maybe_generate(&self.iot[i], self.now) else {
                continue;
            };
            let fog_id = self.iot[i].fog_id.clone();
            self.controller.process_task(
                &mut self.devices,
                &self.index,
                &fog_id,
                task,
                &mut self.adapters,
            );
        }

        for device in &mut self.devices {
            device.tick(self.now, tick_ms, &mut self.adapters);
        }
        self.metrics.sample(&self.devices);

        self.now += 1;
        if self.now % self.config.refresh_interval == 0 {
            self.controller
                .update_status(&mut self.devices, &self.index, &self.cells);
        }
    }

    /// Run the configured number of ticks and produce the summary.
    pub fn run(&mut self) -> SummaryRecord {
        info!(
            policy = self.controller.policy_name(),
            ticks = self.config.ticks,
            "simulation starting"
        );
        for _ in 0..self.config.ticks {
            self.step();
        }
        self.finish()
    }

    /// Close out in-flight work and aggregate the record. Generated work
    /// must be fully accounted for across the terminal states.
    pub fn finish(&mut self) -> SummaryRecord {
        let tick_ms = self.config.tick_ms();
        let mut in_flight = 0u64;
        for device in &mut self.devices {
            in_flight += device.force_complete_all(self.now, tick_ms);
        }

        let stats = self.controller.stats;
        let executed: u64 = self.devices.iter().map(|d| d.sched.executed_count).sum();
        let forced: u64 = self.devices.iter().map(|d| d.sched.forced_count).sum();
        let completed = executed - forced;
        let failed: u64 = self.devices.iter().map(|d| d.sched.failed_tasks).sum();
        let total_response: f64 = self.devices.iter().map(|d| d.sched.total_response_ms).sum();
        let messages: u64 = self.devices.iter().map(|d| d.comms.messages).sum();

        assert_eq!(
            stats.generated,
            completed + failed + stats.dropped + in_flight,
            "task conservation violated"
        );

        let rate = |count: u64| {
            if stats.generated == 0 {
                0.0
            } else {
                count as f64 / stats.generated as f64
            }
        };
        let record = SummaryRecord {
            policy: self.controller.policy_name().to_string(),
            config: self.config.label(),
            completion_rate: rate(completed),
            utilization: self.metrics.mean_utilization(),
            load_balance_stddev: self.metrics.load_balance_stddev(),
            load_balance_range: self.metrics.load_balance_range(),
            avg_response_ms: if executed == 0 {
                0.0
            } else {
                total_response / executed as f64
            },
            total_energy_j: self.adapters.energy.total_joules(),
            offload_rate: rate(stats.offloaded),
            messages,
            generated: stats.generated,
            completed,
            failed,
            dropped: stats.dropped,
            in_flight,
        };
        info!(
            policy = %record.policy,
            completion = record.completion_rate,
            dropped = record.dropped,
            "simulation finished"
        );
        record
    }

    #[must_use]
    pub fn devices(&self) -> &[FogDevice] {
        &self.devices
    }

    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[must_use]
    pub fn stats(&self) -> controller::ControllerStats {
        self.controller.stats
    }

    #[must_use]
    pub fn now(&self) -> u64 {
        self.now
    }
}

/// Convenience wrapper for one configured policy evaluation.
pub fn run_policy(config: &SimConfig, kind: PolicyKind) -> Result<SummaryRecord, SimError> {
    let mut sim = Simulation::new(config.clone(), kind)?;
    Ok(sim.run())
}
