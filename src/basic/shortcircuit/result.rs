use nalgebra::Vector3;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::fault::FaultSpec;
use super::sequence::to_sequence;

/// Post-fault quantities at one bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusFaultResult {
    pub bus_id: String,
    /// Voltage of the fault's canonical phase (pu).
    pub v_pu: Complex64,
    /// Current of the fault's canonical phase; zero away from the fault bus.
    pub i_pu: Complex64,
    pub v_abc: [Complex64; 3],
    pub i_abc: [Complex64; 3],
    /// Sequence voltages `[V0, V1, V2]`.
    pub v012: [Complex64; 3],
}

impl BusFaultResult {
    /// Sequence currents `[I0, I1, I2]` of `i_abc`.
    pub fn i012(&self) -> [Complex64; 3] {
        to_sequence(Vector3::from(self.i_abc)).into()
    }
}

/// Outcome of one fault study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultStudyResult {
    pub spec: FaultSpec,
    /// Current of the canonical faulted phase at the fault bus (pu).
    pub fault_current_pu: Complex64,
    /// Sequence currents `[I0, I1, I2]` injected at the fault bus.
    pub sequence_currents: [Complex64; 3],
    /// Base current at the fault bus in kA, when a rated voltage is known.
    pub base_current_ka: Option<f64>,
    /// One entry per bus, in network order.
    pub buses: Vec<BusFaultResult>,
}

impl FaultStudyResult {
    pub fn bus(&self, bus_id: &str) -> Option<&BusFaultResult> {
        self.buses.iter().find(|b| b.bus_id == bus_id)
    }

    /// Magnitude of the fault current in kA.
    pub fn fault_current_ka(&self) -> Option<f64> {
        self.base_current_ka.map(|base| self.fault_current_pu.norm() * base)
    }

    /// Current returning through ground, `3·I0`.
    pub fn ground_current(&self) -> Complex64 {
        self.sequence_currents[0] * 3.0
    }
}
