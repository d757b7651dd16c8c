// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use serde::{Deserialize, Serialize};

pub mod cluster;
pub mod policy;
pub mod table;

/// ESNODE-Offload Library
/// ----------------------
///
/// Provides the offloading decision layer for the fog simulator:
/// 1. Spatial clustering of fog devices into cells (k-means, master election).
/// 2. Offload target tables (capacity ring / master-aware layouts).
/// 3. The three offloading policies (static, dynamic, hybrid).

// --- Thresholds ---

/// A device at or above this utilization is treated as overloaded.
pub const HIGH_UTIL: f64 = 0.8;
/// Above this utilization a non-urgent task is a candidate for offloading.
pub const MID_UTIL: f64 = 0.5;
/// Below this utilization a device is considered essentially idle.
pub const LOW_UTIL: f64 = 0.3;

// --- Data Models ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Member,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LoadBucket {
    VeryLow,
    Low,
    Medium,
    High,
}

impl LoadBucket {
    #[must_use]
    pub fn from_utilization(util: f64) -> Self {
        if util < LOW_UTIL {
            Self::VeryLow
        } else if util < MID_UTIL {
            Self::Low
        } else if util < HIGH_UTIL {
            Self::Medium
        } else {
            Self::High
        }
    }
}

/// Point-in-time resource report of a single fog device.
///
/// `available_mips` is the schedulable headroom: capacity minus the work the
/// device has already committed to (executing allocations plus queued demand).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceStatus {
    pub device: String,
    pub cpu_utilization: f64,
    pub available_mips: u64,
    pub total_mips: u64,
    pub available_ram_mb: u64,
    pub available_storage_mb: u64,
    pub available_bandwidth_mbps: u64,
    pub bucket: LoadBucket,
}

/// Read-only device snapshot handed to policies. Policies never touch live
/// device state; they decide over a vector of these.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceView {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub total_mips: u64,
    pub available_mips: u64,
    pub cpu_utilization: f64,
    pub cell_id: usize,
    pub role: Role,
}

impl DeviceView {
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    #[must_use]
    pub fn has_resources(&self, task: &TaskView) -> bool {
        task.size_mi <= self.available_mips
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskView {
    pub id: String,
    pub size_mi: u64,
    pub urgent: bool,
}

// --- Policy Contract ---

/// Which devices a policy wants to see as offload candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateScope {
    /// Only the source device's cell mates.
    Cell,
    /// Every device in the topology.
    Global,
}

/// Three-operation offloading contract. Implementations own their private
/// state (tables, random streams) but treat device views as immutable.
pub trait OffloadPolicy {
    fn name(&self) -> &'static str;

    fn candidate_scope(&self) -> CandidateScope;

    /// Rebuild internal tables from the current utilization distribution.
    fn update_policy(&mut self, devices: &[DeviceView]);

    /// Should `task`, just generated at `src`, run somewhere else?
    fn should_offload(&mut self, src: &DeviceView, task: &TaskView) -> bool;

    /// Pick an execution target among `candidates`, or `None` to stay local.
    fn select_target(
        &mut self,
        src: &DeviceView,
        task: &TaskView,
        candidates: &[DeviceView],
    ) -> Option<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Static,
    Dynamic,
    Hybrid,
}

#[derive(thiserror::Error, Debug)]
#[error("unknown policy: {0}")]
pub struct ParsePolicyError(String);

impl std::str::FromStr for PolicyKind {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(Self::Static),
            "dynamic" => Ok(Self::Dynamic),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
            Self::Hybrid => "hybrid",
        })
    }
}

impl PolicyKind {
    #[must_use]
    pub fn all() -> Vec<Self> {
        vec![Self::Static, Self::Dynamic, Self::Hybrid]
    }
}

/// Instantiate a policy. `seed` feeds the dynamic policy's probe stream so a
/// run is reproducible end to end.
#[must_use]
pub fn build_policy(kind: PolicyKind, seed: u64) -> Box<dyn OffloadPolicy> {
    match kind {
        PolicyKind::Static => Box::new(policy::soa::StaticOffload::new()),
        PolicyKind::Dynamic => Box::new(policy::poa::DynamicOffload::new(seed)),
        PolicyKind::Hybrid => Box::new(policy::hyboff::HybridOffload::new()),
    }
}
