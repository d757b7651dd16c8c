// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    #[must_use]
    pub const fn as_tracing(&self) -> tracing::Level {
        match self {
            Self::Error => tracing::Level::ERROR,
            Self::Warn => tracing::Level::WARN,
            Self::Info => tracing::Level::INFO,
            Self::Debug => tracing::Level::DEBUG,
            Self::Trace => tracing::Level::TRACE,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("at least one fog device is required")]
    NoFogDevices,
    #[error("at least one IoT device is required")]
    NoIotDevices,
    #[error("tick count must be at least 1")]
    ZeroTicks,
    #[error("cell count must be at least 1")]
    ZeroCells,
    #[error("cell count {cells} too high for {fog} fog devices (at most fog/3)")]
    CellRatio { cells: usize, fog: usize },
    #[error("status refresh interval must be at least 1 tick")]
    ZeroRefreshInterval,
    #[error("{what} range is inverted")]
    InvertedRange { what: &'static str },
    #[error("{what} must be a probability in [0, 1]")]
    InvalidProbability { what: &'static str },
    #[error("device MIPS must be positive")]
    ZeroMips,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub fog_devices: usize,
    pub iot_devices: usize,
    /// k for the spatial clusterer.
    pub cells: usize,
    pub ticks: u64,
    /// Wall-clock span one tick represents; converts ticks to milliseconds
    /// in response-time accounting.
    #[serde(with = "humantime_serde")]
    pub tick_duration: Duration,
    pub gen_probability: f64,
    pub min_task_mi: u64,
    pub max_task_mi: u64,
    pub min_deadline_ticks: i64,
    pub max_deadline_ticks: i64,
    pub urgent_probability: f64,
    pub world_size: f64,
    pub min_device_mips: u64,
    pub max_device_mips: u64,
    pub max_queue: usize,
    /// Controller status/table refresh period, in ticks.
    pub refresh_interval: u64,
    pub topology_seed: u64,
    pub iot_seed: u64,
    pub traffic_seed: u64,
    pub cluster_seed: u64,
    pub policy_seed: u64,
    pub log_level: LogLevel,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            fog_devices: 24,
            iot_devices: 60,
            cells: 4,
            ticks: 500,
            tick_duration: Duration::from_secs(1),
            gen_probability: 0.2,
            min_task_mi: 300,
            max_task_mi: 2000,
            min_deadline_ticks: 5,
            max_deadline_ticks: 25,
            urgent_probability: 0.2,
            world_size: 1000.0,
            min_device_mips: 500,
            max_device_mips: 3000,
            max_queue: 10,
            refresh_interval: 10,
            topology_seed: 42,
            iot_seed: 24,
            traffic_seed: 33,
            cluster_seed: 42,
            policy_seed: 7,
            log_level: LogLevel::Info,
        }
    }
}

impl SimConfig {
    /// Derive every stream seed from one base value, fixed offsets apart.
    pub fn apply_base_seed(&mut self, seed: u64) {
        self.topology_seed = seed;
        self.iot_seed = seed.wrapping_add(1_000_000);
        self.traffic_seed = seed.wrapping_add(2_000_000);
        self.cluster_seed = seed.wrapping_add(3_000_000);
        self.policy_seed = seed.wrapping_add(4_000_000);
    }

    /// Reject configurations the simulator refuses to start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fog_devices == 0 {
            return Err(ConfigError::NoFogDevices);
        }
        if self.iot_devices == 0 {
            return Err(ConfigError::NoIotDevices);
        }
        if self.ticks == 0 {
            return Err(ConfigError::ZeroTicks);
        }
        if self.cells == 0 {
            return Err(ConfigError::ZeroCells);
        }
        if self.cells * 3 > self.fog_devices {
            return Err(ConfigError::CellRatio {
                cells: self.cells,
                fog: self.fog_devices,
            });
        }
        if self.refresh_interval == 0 {
            return Err(ConfigError::ZeroRefreshInterval);
        }
        if self.min_task_mi > self.max_task_mi {
            return Err(ConfigError::InvertedRange { what: "task size" });
        }
        if self.min_deadline_ticks > self.max_deadline_ticks {
            return Err(ConfigError::InvertedRange { what: "deadline" });
        }
        if self.min_device_mips > self.max_device_mips {
            return Err(ConfigError::InvertedRange { what: "device MIPS" });
        }
        if self.min_device_mips == 0 {
            return Err(ConfigError::ZeroMips);
        }
        if !(0.0..=1.0).contains(&self.gen_probability) {
            return Err(ConfigError::InvalidProbability {
                what: "gen_probability",
            });
        }
        if !(0.0..=1.0).contains(&self.urgent_probability) {
            return Err(ConfigError::InvalidProbability {
                what: "urgent_probability",
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "fog={} iot={} cells={} ticks={}",
            self.fog_devices, self.iot_devices, self.cells, self.ticks
        )
    }

    #[must_use]
    pub fn tick_ms(&self) -> f64 {
        self.tick_duration.as_secs_f64() * 1000.0
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigOverrides {
    pub fog_devices: Option<usize>,
    pub iot_devices: Option<usize>,
    pub cells: Option<usize>,
    pub ticks: Option<u64>,
    #[serde(with = "humantime_serde::option")]
    pub tick_duration: Option<Duration>,
    pub gen_probability: Option<f64>,
    pub min_task_mi: Option<u64>,
    pub max_task_mi: Option<u64>,
    pub min_deadline_ticks: Option<i64>,
    pub max_deadline_ticks: Option<i64>,
    pub urgent_probability: Option<f64>,
    pub world_size: Option<f64>,
    pub min_device_mips: Option<u64>,
    pub max_device_mips: Option<u64>,
    pub max_queue: Option<usize>,
    pub refresh_interval: Option<u64>,
    pub topology_seed: Option<u64>,
    pub iot_seed: Option<u64>,
    pub traffic_seed: Option<u64>,
    pub cluster_seed: Option<u64>,
    pub policy_seed: Option<u64>,
    pub log_level: Option<LogLevel>,
}

impl SimConfig {
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(fog_devices) = overrides.fog_devices {
            self.fog_devices = fog_devices;
        }
        if let Some(iot_devices) = overrides.iot_devices {
            self.iot_devices = iot_devices;
        }
        if let Some(cells) = overrides.cells {
            self.cells = cells;
        }
        if let Some(ticks) = overrides.ticks {
            self.ticks = ticks;
        }
        if let Some(tick_duration) = overrides.tick_duration {
            self.tick_duration = tick_duration;
        }
        if let Some(gen_probability) = overrides.gen_probability {
            self.gen_probability = gen_probability;
        }
        if let Some(min_task_mi) = overrides.min_task_mi {
            self.min_task_mi = min_task_mi;
        }
        if let Some(max_task_mi) = overrides.max_task_mi {
            self.max_task_mi = max_task_mi;
        }
        if let Some(min_deadline_ticks) = overrides.min_deadline_ticks {
            self.min_deadline_ticks = min_deadline_ticks;
        }
        if let Some(max_deadline_ticks) = overrides.max_deadline_ticks {
            self.max_deadline_ticks = max_deadline_ticks;
        }
        if let Some(urgent_probability) = overrides.urgent_probability {
            self.urgent_probability = urgent_probability;
        }
        if let Some(world_size) = overrides.world_size {
            self.world_size = world_size;
        }
        if let Some(min_device_mips) = overrides.min_device_mips {
            self.min_device_mips = min_device_mips;
        }
        if let Some(max_device_mips) = overrides.max_device_mips {
            self.max_device_mips = max_device_mips;
        }
        if let Some(max_queue) = overrides.max_queue {
            self.max_queue = max_queue;
        }
        if let Some(refresh_interval) = overrides.refresh_interval {
            self.refresh_interval = refresh_interval;
        }
        if let Some(topology_seed) = overrides.topology_seed {
            self.topology_seed = topology_seed;
        }
        if let Some(iot_seed) = overrides.iot_seed {
            self.iot_seed = iot_seed;
        }
        if let Some(traffic_seed) = overrides.traffic_seed {
            self.traffic_seed = traffic_seed;
        }
        if let Some(cluster_seed) = overrides.cluster_seed {
            self.cluster_seed = cluster_seed;
        }
        if let Some(policy_seed) = overrides.policy_seed {
            self.policy_seed = policy_seed;
        }
        if let Some(log_level) = overrides.log_level {
            self.log_level = log_level;
        }
    }
}
