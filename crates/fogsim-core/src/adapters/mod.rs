// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
pub mod energy;
pub mod export;
pub mod network;
pub mod security;

pub use energy::{EnergyMeter, PowerState};
pub use network::{NetworkModel, RangeLimitedNetwork, StubNetwork, TransmissionOutcome};
pub use security::{Authenticator, StaticGate};

/// External collaborators bundled for the tick path. The core only ever
/// talks to them through these narrow interfaces; the stubs return derived
/// numbers and never block.
pub struct Adapters {
    pub network: Box<dyn NetworkModel>,
    pub security: Box<dyn Authenticator>,
    pub energy: EnergyMeter,
}

impl Adapters {
    #[must_use]
    pub fn stub() -> Self {
        Self {
            network: Box::new(StubNetwork),
            security: Box::new(StaticGate::default()),
            energy: EnergyMeter::new(),
        }
    }
}

impl Default for Adapters {
    fn default() -> Self {
        Self::stub()
    }
}
