// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use serde::Serialize;

use crate::device::FogDevice;

/// Per-tick aggregation over the device fleet. Both load-balance indices
/// are sampled every tick and averaged over the run, since neither formula
/// is privileged.
#[derive(Debug, Default)]
pub struct RunMetrics {
    ticks_sampled: u64,
    sum_mean_util: f64,
    sum_lb_stddev: f64,
    sum_lb_range: f64,
}

impl RunMetrics {
    pub fn sample(&mut self, devices: &[FogDevice]) {
        let utils: Vec<f64> = devices.iter().map(FogDevice::utilization).collect();
        self.ticks_sampled += 1;
        self.sum_mean_util += mean(&utils);
        self.sum_lb_stddev += load_balance_stddev(&utils);
        self.sum_lb_range += load_balance_range(&utils);
    }

    #[must_use]
    pub fn mean_utilization(&self) -> f64 {
        self.averaged(self.sum_mean_util)
    }

    #[must_use]
    pub fn load_balance_stddev(&self) -> f64 {
        self.averaged(self.sum_lb_stddev)
    }

    #[must_use]
    pub fn load_balance_range(&self) -> f64 {
        self.averaged(self.sum_lb_range)
    }

    fn averaged(&self, sum: f64) -> f64 {
        if self.ticks_sampled == 0 {
            0.0
        } else {
            sum / self.ticks_sampled as f64
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// `1 - stddev(util)`: perfect balance is 1, a maximally split fleet drops
/// towards 0.5.
#[must_use]
pub fn load_balance_stddev(utils: &[f64]) -> f64 {
    if utils.is_empty() {
        return 1.0;
    }
    let mu = mean(utils);
    let variance = utils.iter().map(|u| (u - mu).powi(2)).sum::<f64>() / utils.len() as f64;
    1.0 - variance.sqrt()
}

/// `1 - (max - min) / max`, 1 for an idle fleet.
#[must_use]
pub fn load_balance_range(utils: &[f64]) -> f64 {
    let max = utils.iter().copied().fold(0.0f64, f64::max);
    if max <= 0.0 {
        return 1.0;
    }
    let min = utils.iter().copied().fold(f64::INFINITY, f64::min);
    1.0 - (max - min) / max
}

/// One summary per policy run: everything the report and the CSV carry.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRecord {
    pub policy: String,
    pub config: String,
    pub completion_rate: f64,
    pub utilization: f64,
    pub load_balance_stddev: f64,
    pub load_balance_range: f64,
    pub avg_response_ms: f64,
    pub total_energy_j: f64,
    pub offload_rate: f64,
    pub messages: u64,
    pub generated: u64,
    pub completed: u64,
    pub failed: u64,
    pub dropped: u64,
    pub in_flight: u64,
}

impl SummaryRecord {
    #[must_use]
    pub fn header() -> &'static str {
        "policy,config,completion_rate,utilization,load_balance_stddev,load_balance_range,\
         avg_response_ms,total_energy_j,offload_rate,messages,generated,completed,failed,\
         dropped,in_flight"
    }
}

impl std::fmt::Display for SummaryRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{:.6},{},{},{},{},{},{}",
            self.policy,
            self.config,
            self.completion_rate,
            self.utilization,
            self.load_balance_stddev,
            self.load_balance_range,
            self.avg_response_ms,
            self.total_energy_j,
            self.offload_rate,
            self.messages,
            self.generated,
            self.completed,
            self.failed,
            self.dropped,
            self.in_flight
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn balanced_fleet_scores_one_on_both_indices() {
        let utils = vec![0.4, 0.4, 0.4];
        assert!((load_balance_stddev(&utils) - 1.0).abs() < 1e-12);
        assert!((load_balance_range(&utils) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn skewed_fleet_scores_below_one() {
        let utils = vec![0.9, 0.1];
        assert!((load_balance_stddev(&utils) - 0.6).abs() < 1e-12);
        let expected_range = 1.0 - (0.9 - 0.1) / 0.9;
        assert!((load_balance_range(&utils) - expected_range).abs() < 1e-12);
    }

    #[test]
    fn idle_fleet_counts_as_perfectly_balanced() {
        let utils = vec![0.0, 0.0];
        assert!((load_balance_range(&utils) - 1.0).abs() < 1e-12);
        assert!((load_balance_stddev(&utils) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn record_row_matches_the_header_arity() {
        let record = SummaryRecord {
            policy: "hybrid".into(),
            config: "fog=9 iot=12 cells=2 ticks=40".into(),
            completion_rate: 0.5,
            utilization: 0.25,
            load_balance_stddev: 0.9,
            load_balance_range: 0.8,
            avg_response_ms: 1234.5,
            total_energy_j: 99.0,
            offload_rate: 0.2,
            messages: 42,
            generated: 10,
            completed: 5,
            failed: 2,
            dropped: 1,
            in_flight: 2,
        };
        let header_fields = SummaryRecord::header().split(',').count();
        let row_fields = record.to_string().split(',').count();
        assert_eq!(header_fields, row_fields);
    }
}
