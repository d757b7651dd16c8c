// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use esnode_offload::{DeviceView, LoadBucket, ResourceStatus, Role};
use serde::{Deserialize, Serialize};

use crate::adapters::energy::{IDLE_J_PER_TICK, PROCESSING_J_PER_TICK};
use crate::adapters::{Adapters, PowerState};
use crate::comms::Communicator;
use crate::monitor::Monitor;
use crate::sched::{CpuLedger, Scheduler};
use crate::task::Task;

/// Static capabilities of a fog device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSpec {
    pub total_mips: u64,
    pub ram_mb: u64,
    pub storage_mb: u64,
    pub bandwidth_mbps: u64,
    pub max_queue: usize,
}

/// A fog node: resource accounting plus its three submodules. The device
/// owns monitor, scheduler and communicator outright; they get the narrow
/// pieces they need (ledger, position, adapters) as call arguments, never a
/// back-pointer.
pub struct FogDevice {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub spec: DeviceSpec,
    pub cell_id: usize,
    pub role: Role,
    pub cell_members: Vec<String>,
    pub received: u64,
    pub ledger: CpuLedger,
    pub monitor: Monitor,
    pub comms: Communicator,
    pub sched: Scheduler,
}

impl FogDevice {
    #[must_use]
    pub fn new(id: String, x: f64, y: f64, spec: DeviceSpec) -> Self {
        let ledger = CpuLedger::new(spec.total_mips);
        let sched = Scheduler::new(spec.max_queue);
        Self {
            id,
            x,
            y,
            spec,
            cell_id: 0,
            role: Role::Member,
            cell_members: Vec::new(),
            received: 0,
            ledger,
            monitor: Monitor::default(),
            comms: Communicator::default(),
            sched,
        }
    }

    /// Work the device is already committed to: MIPS allocated to executing
    /// tasks plus everything sitting in the queue.
    #[must_use]
    pub fn committed_mi(&self) -> u64 {
        (self.spec.total_mips - self.ledger.available()) + self.sched.queued_demand_mi()
    }

    /// Committed work over capacity, capped at 1.
    #[must_use]
    pub fn utilization(&self) -> f64 {
        if self.spec.total_mips == 0 {
            return 0.0;
        }
        (self.committed_mi() as f64 / self.spec.total_mips as f64).min(1.0)
    }

    /// Headroom a new task could still claim.
    #[must_use]
    pub fn free_pool_mi(&self) -> u64 {
        self.spec.total_mips.saturating_sub(self.committed_mi())
    }

    #[must_use]
    pub fn status(&self) -> ResourceStatus {
        let util = self.utilization();
        ResourceStatus {
            device: self.id.clone(),
            cpu_utilization: util,
            available_mips: self.free_pool_mi(),
            total_mips: self.spec.total_mips,
            available_ram_mb: self.spec.ram_mb,
            available_storage_mb: self.spec.storage_mb,
            available_bandwidth_mbps: self.spec.bandwidth_mbps,
            bucket: LoadBucket::from_utilization(util),
        }
    }

    /// Build the current status and remember it locally.
    pub fn snapshot(&mut self) -> ResourceStatus {
        let status = self.status();
        self.monitor.observe_local(status.clone());
        status
    }

    #[must_use]
    pub fn view(&self) -> DeviceView {
        DeviceView {
            id: self.id.clone(),
            x: self.x,
            y: self.y,
            total_mips: self.spec.total_mips,
            available_mips: self.free_pool_mi(),
            cpu_utilization: self.utilization(),
            cell_id: self.cell_id,
            role: self.role,
        }
    }

    /// Take ownership of a task, or hand it back when the queue is full.
    pub fn receive_task(&mut self, mut task: Task) -> Result<(), Task> {
        task.origin_fog = Some(self.id.clone());
        self.sched.admit(task)?;
        self.received += 1;
        Ok(())
    }

    /// One scheduler step plus the tick's energy draw.
    pub fn tick(&mut self, now: u64, tick_ms: f64, adapters: &mut Adapters) {
        self.sched.tick(&mut self.ledger, now, tick_ms);
        adapters.energy.consume(PowerState::Idle, IDLE_J_PER_TICK);
        let busy =
            (self.spec.total_mips - self.ledger.available()) as f64 / self.spec.total_mips.max(1) as f64;
        if busy > 0.0 {
            adapters
                .energy
                .consume(PowerState::Processing, PROCESSING_J_PER_TICK * busy);
        }
    }

    pub fn force_complete_all(&mut self, now: u64, tick_ms: f64) -> u64 {
        self.sched.force_complete_all(&mut self.ledger, now, tick_ms)
    }
}

/// A task source, bound to its nearest fog device at build time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IotDevice {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub fog_id: String,
}

impl IotDevice {
    #[must_use]
    pub fn new(id: String, x: f64, y: f64, fog_id: String) -> Self {
        Self { id, x, y, fog_id }
    }
}
