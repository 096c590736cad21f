//! Generator records.
//!
//! A generator feeds the power flow through its bus (active power, voltage
//! set-point, reactive limits) and the short-circuit study through its
//! subtransient sequence reactances.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use super::units::Limit;
use crate::basic::error::PowerSystemError;

/// Short-circuit data of a generator, all reactances in pu on the system base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorSc {
    /// Positive-sequence subtransient reactance, `Xd''`.
    pub x1_pu: f64,
    pub x2_pu: f64,
    pub x0_pu: f64,
    /// Neutral grounded; otherwise the generator is absent from the zero-sequence network.
    pub grounded: bool,
    /// Neutral reactance, zero when solidly grounded.
    pub xn_pu: f64,
}

impl Default for GeneratorSc {
    fn default() -> Self {
        Self {
            x1_pu: 0.25,
            x2_pu: 0.25,
            x0_pu: 0.10,
            grounded: true,
            xn_pu: 0.0,
        }
    }
}

/// A generator attached to exactly one bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generator {
    pub id: String,
    pub bus_id: String,
    /// Active power output (pu).
    pub p_gen: f64,
    /// Voltage set-point (pu).
    pub v_set: f64,
    /// Reactive output range (pu).
    #[serde(default, skip_serializing_if = "Limit::is_unbounded")]
    pub q_lim: Limit<f64>,
    #[serde(default)]
    pub sc: GeneratorSc,
}

impl Generator {
    pub fn new(id: impl Into<String>, bus_id: impl Into<String>, p_gen: f64, v_set: f64) -> Self {
        Self {
            id: id.into(),
            bus_id: bus_id.into(),
            p_gen,
            v_set,
            q_lim: Limit::UNBOUNDED,
            sc: GeneratorSc::default(),
        }
    }

    pub fn with_q_limits(mut self, q_min: f64, q_max: f64) -> Self {
        self.q_lim = Limit::new(q_min, q_max);
        self
    }

    pub fn with_sc(mut self, sc: GeneratorSc) -> Self {
        self.sc = sc;
        self
    }

    fn reactance_admittance(&self, x: f64, what: &str) -> Result<Complex64, PowerSystemError> {
        if !x.is_finite() || x.abs() < f64::EPSILON {
            return Err(PowerSystemError::InvalidImpedance {
                element: format!("generator {}", self.id),
                reason: format!("{what} reactance {x} must be finite and non-zero"),
            });
        }
        Ok(Complex64::new(0.0, x).inv())
    }

    /// Shunt admittances `(y1, y2, y0)` this generator adds at its bus.
    ///
    /// `y0` is `None` for an ungrounded neutral.
    pub fn sequence_admittances(
        &self,
    ) -> Result<(Complex64, Complex64, Option<Complex64>), PowerSystemError> {
        let y1 = self.reactance_admittance(self.sc.x1_pu, "positive-sequence")?;
        let y2 = self.reactance_admittance(self.sc.x2_pu, "negative-sequence")?;
        let y0 = if self.sc.grounded {
            Some(self.reactance_admittance(self.sc.x0_pu + 3.0 * self.sc.xn_pu, "zero-sequence")?)
        } else {
            None
        };
        Ok((y1, y2, y0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_admittances() {
        let g = Generator::new("G1", "B1", 0.5, 1.0).with_sc(GeneratorSc {
            x1_pu: 0.2,
            x2_pu: 0.25,
            x0_pu: 0.05,
            grounded: true,
            xn_pu: 0.05,
        });
        let (y1, y2, y0) = g.sequence_admittances().unwrap();
        assert!((y1 - Complex64::new(0.0, -5.0)).norm() < 1e-12);
        assert!((y2 - Complex64::new(0.0, -4.0)).norm() < 1e-12);
        assert!((y0.unwrap() - Complex64::new(0.0, -5.0)).norm() < 1e-12);
    }

    #[test]
    fn test_ungrounded_and_invalid() {
        let mut g = Generator::new("G2", "B2", 0.0, 1.0);
        g.sc.grounded = false;
        assert!(g.sequence_admittances().unwrap().2.is_none());
        g.sc.x1_pu = 0.0;
        assert!(matches!(
            g.sequence_admittances(),
            Err(PowerSystemError::InvalidImpedance { .. })
        ));
    }
}
