// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::SimConfig;
use crate::device::IotDevice;
use crate::task::Task;

/// Seeded task synthesis for the generation phase. One stream drives every
/// IoT device; ids carry a zero-padded global sequence so all tie-breaks
/// stay deterministic.
#[derive(Debug)]
pub struct TrafficGenerator {
    rng: StdRng,
    sequence: u64,
    gen_probability: f64,
    size_mi: (u64, u64),
    deadline_ticks: (i64, i64),
    urgent_probability: f64,
}

impl TrafficGenerator {
    #[must_use]
    pub fn new(config: &SimConfig) -> Self {
        Self {
            rng: StdRng::seed_from_u64(config.traffic_seed),
            sequence: 0,
            gen_probability: config.gen_probability,
            size_mi: (config.min_task_mi, config.max_task_mi),
            deadline_ticks: (config.min_deadline_ticks, config.max_deadline_ticks),
            urgent_probability: config.urgent_probability,
        }
    }

    /// Roll the per-tick dice for one IoT device.
    pub fn maybe_generate(&mut self, iot: &IotDevice, now: u64) -> Option<Task> {
        if !self.rng.gen_bool(self.gen_probability) {
            return None;
        }
        self.sequence += 1;
        let size = self.rng.gen_range(self.size_mi.0..=self.size_mi.1);
        let deadline = self.rng.gen_range(self.deadline_ticks.0..=self.deadline_ticks.1);
        let urgent = self.rng.gen_bool(self.urgent_probability);
        Some(Task::new(
            format!("task-{:06}", self.sequence),
            iot.id.clone(),
            size,
            deadline,
            urgent,
            now,
        ))
    }

    #[must_use]
    pub const fn generated(&self) -> u64 {
        self.sequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iot() -> IotDevice {
        IotDevice::new("iot-000".to_string(), 1.0, 2.0, "fog-000".to_string())
    }

    fn config() -> SimConfig {
        SimConfig::default()
    }

    #[test]
    fn stream_is_reproducible() {
        let source = iot();
        let run = || {
            let mut traffic = TrafficGenerator::new(&config());
            (0..200)
                .filter_map(|now| traffic.maybe_generate(&source, now))
                .map(|t| (t.id, t.size_mi, t.deadline_ticks, t.urgent))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn synthesized_tasks_respect_the_configured_ranges() {
        let cfg = config();
        let mut traffic = TrafficGenerator::new(&cfg);
        let source = iot();
        let mut produced = 0;
        for now in 0..2000 {
            if let Some(task) = traffic.maybe_generate(&source, now) {
                produced += 1;
                assert!(task.size_mi >= cfg.min_task_mi && task.size_mi <= cfg.max_task_mi);
                assert!(task.deadline_ticks >= cfg.min_deadline_ticks);
                assert!(task.deadline_ticks <= cfg.max_deadline_ticks);
                assert_eq!(task.source_iot, "iot-000");
                assert_eq!(task.created_at, now);
            }
        }
        assert_eq!(produced, traffic.generated());
        // p_gen 0.2 over 2000 ticks: a long way from both 0 and 2000.
        assert!(produced > 250 && produced < 550, "produced {produced}");
    }

    #[test]
    fn certain_generation_fires_every_tick() {
        let cfg = SimConfig {
            gen_probability: 1.0,
            ..config()
        };
        let mut traffic = TrafficGenerator::new(&cfg);
        let source = iot();
        for now in 0..50 {
            assert!(traffic.maybe_generate(&source, now).is_some());
        }
    }
}
