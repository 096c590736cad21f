use std::str::FromStr;

use derive_more::Display;
use num_complex::Complex64;
use num_traits::Zero;
use serde::{Deserialize, Serialize};

use crate::basic::error::PowerSystemError;

/// Kind of shunt fault.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FaultType {
    #[display("3P")]
    ThreePhase,
    /// Single line to ground.
    #[display("SLG")]
    Slg,
    /// Line to line.
    #[display("LL")]
    Ll,
    /// Double line to ground.
    #[display("DLG")]
    Dlg,
}

impl FromStr for FaultType {
    type Err = PowerSystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "3P" | "3PH" | "3Φ" | "3φ" | "THREEPHASE" | "THREE_PHASE" => Ok(Self::ThreePhase),
            "SLG" | "LG" => Ok(Self::Slg),
            "LL" => Ok(Self::Ll),
            "DLG" | "LLG" => Ok(Self::Dlg),
            _ => Err(PowerSystemError::UnknownFaultType(s.to_string())),
        }
    }
}

impl TryFrom<String> for FaultType {
    type Error = PowerSystemError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FaultType> for String {
    fn from(value: FaultType) -> Self {
        value.to_string()
    }
}

/// Phase selector of a fault.
///
/// Single phases apply to SLG faults, pairs to LL and DLG faults. A trailing
/// `G` is accepted, so `"AG"` parses as `A` and `"ABG"` as `AB`.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FaultPhase {
    A,
    B,
    C,
    AB,
    BC,
    CA,
}

impl FromStr for FaultPhase {
    type Err = PowerSystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_ascii_uppercase();
        let phases = norm.strip_suffix('G').filter(|p| matches!(p.len(), 1 | 2));
        match phases.unwrap_or(norm.as_str()) {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "AB" | "BA" => Ok(Self::AB),
            "BC" | "CB" => Ok(Self::BC),
            "CA" | "AC" => Ok(Self::CA),
            _ => Err(PowerSystemError::UnknownFaultPhase(s.to_string())),
        }
    }
}

impl TryFrom<String> for FaultPhase {
    type Error = PowerSystemError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FaultPhase> for String {
    fn from(value: FaultPhase) -> Self {
        value.to_string()
    }
}

impl FaultPhase {
    pub fn is_single(self) -> bool {
        matches!(self, Self::A | Self::B | Self::C)
    }

    /// Phase indices `(first, second, healthy)` of a pair, `None` for a single phase.
    pub fn pair(self) -> Option<(usize, usize, usize)> {
        match self {
            Self::AB => Some((0, 1, 2)),
            Self::BC => Some((1, 2, 0)),
            Self::CA => Some((2, 0, 1)),
            _ => None,
        }
    }

    /// Index of the phase reported as the fault's canonical phase.
    pub fn canonical(self) -> usize {
        match self {
            Self::A | Self::AB => 0,
            Self::B | Self::BC => 1,
            Self::C | Self::CA => 2,
        }
    }
}

/// A fault to study: where, what kind, through which impedance and on which phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultSpec {
    pub bus_id: String,
    pub fault_type: FaultType,
    /// Fault impedance (pu); zero for a bolted fault.
    #[serde(default)]
    pub z_fault_pu: Complex64,
    /// Ignored for three-phase faults.
    pub phase: FaultPhase,
    #[serde(default)]
    pub description: String,
}

impl FaultSpec {
    /// A bolted fault on phase A, or on phases AB for LL and DLG faults.
    pub fn new(bus_id: impl Into<String>, fault_type: FaultType) -> Self {
        let phase = match fault_type {
            FaultType::Ll | FaultType::Dlg => FaultPhase::AB,
            FaultType::ThreePhase | FaultType::Slg => FaultPhase::A,
        };
        Self {
            bus_id: bus_id.into(),
            fault_type,
            z_fault_pu: Complex64::zero(),
            phase,
            description: String::new(),
        }
    }

    /// Parses fault type and phase selector from their string forms.
    pub fn parse(
        bus_id: impl Into<String>,
        fault_type: &str,
        phase: &str,
    ) -> Result<Self, PowerSystemError> {
        let spec = Self::new(bus_id, fault_type.parse()?).with_phase(phase.parse()?);
        spec.validate()?;
        Ok(spec)
    }

    pub fn with_impedance(mut self, z_fault_pu: Complex64) -> Self {
        self.z_fault_pu = z_fault_pu;
        self
    }

    pub fn with_phase(mut self, phase: FaultPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Checks that the phase selector fits the fault type and the impedance is finite.
    pub fn validate(&self) -> Result<(), PowerSystemError> {
        let fits = match self.fault_type {
            FaultType::ThreePhase => true,
            FaultType::Slg => self.phase.is_single(),
            FaultType::Ll | FaultType::Dlg => !self.phase.is_single(),
        };
        if !fits {
            return Err(PowerSystemError::UnknownFaultPhase(format!(
                "{} for a {} fault",
                self.phase, self.fault_type
            )));
        }
        if !self.z_fault_pu.is_finite() {
            return Err(PowerSystemError::InvalidImpedance {
                element: format!("fault at bus {}", self.bus_id),
                reason: format!("fault impedance {} is not finite", self.z_fault_pu),
            });
        }
        Ok(())
    }

    /// Index of the phase whose voltage and current are reported as the fault's.
    pub fn canonical_phase(&self) -> usize {
        match self.fault_type {
            FaultType::ThreePhase => 0,
            _ => self.phase.canonical(),
        }
    }
}
