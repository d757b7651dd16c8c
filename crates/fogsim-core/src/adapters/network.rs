// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use crate::comms::{BASE_LATENCY_MS, DISTANCE_FACTOR_MS};

/// Joules charged per transmitted byte by the stub model.
pub const TX_J_PER_BYTE: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct TransmissionOutcome {
    pub success: bool,
    pub latency_ms: f64,
    pub energy_j: f64,
    pub reason: &'static str,
}

/// Network physics boundary. The real bandwidth/latency/loss tables live
/// outside the core; the simulator only needs this one call.
pub trait NetworkModel {
    fn simulate_transmission(&self, bytes: u64, distance: f64) -> TransmissionOutcome;
}

/// Always-successful model: latency grows linearly with distance, energy
/// with payload size.
#[derive(Debug, Clone, Copy, Default)]
pub struct StubNetwork;

impl NetworkModel for StubNetwork {
    fn simulate_transmission(&self, bytes: u64, distance: f64) -> TransmissionOutcome {
        TransmissionOutcome {
            success: true,
            latency_ms: DISTANCE_FACTOR_MS.mul_add(distance, BASE_LATENCY_MS),
            energy_j: bytes as f64 * TX_J_PER_BYTE,
            reason: "ok",
        }
    }
}

/// Stub variant that refuses transfers beyond a fixed range. Handy for
/// driving the rejected-transfer paths without a full physics model.
#[derive(Debug, Clone, Copy)]
pub struct RangeLimitedNetwork {
    pub max_range: f64,
}

impl NetworkModel for RangeLimitedNetwork {
    fn simulate_transmission(&self, bytes: u64, distance: f64) -> TransmissionOutcome {
        if distance > self.max_range {
            return TransmissionOutcome {
                success: false,
                latency_ms: 0.0,
                energy_j: 0.0,
                reason: "out of range",
            };
        }
        StubNetwork.simulate_transmission(bytes, distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latency_is_base_plus_distance_share() {
        let outcome = StubNetwork.simulate_transmission(1_000, 250.0);
        assert!(outcome.success);
        assert!((outcome.latency_ms - 35.0).abs() < 1e-9);
        assert!((outcome.energy_j - 1e-3).abs() < 1e-12);
    }

    #[test]
    fn out_of_range_transfers_fail_cleanly() {
        let net = RangeLimitedNetwork { max_range: 200.0 };
        let near = net.simulate_transmission(1_000, 150.0);
        assert!(near.success);
        let far = net.simulate_transmission(1_000, 250.0);
        assert!(!far.success);
        assert_eq!(far.reason, "out of range");
        assert_eq!(far.energy_j, 0.0);
    }
}
