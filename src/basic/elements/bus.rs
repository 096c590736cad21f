use derive_more::Display;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// Classification of a bus in the power flow.
///
/// - `Slack`: voltage magnitude and angle are fixed.
/// - `PV`: voltage magnitude is fixed, angle is solved.
/// - `PQ`: both magnitude and angle are solved.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BusType {
    #[display("SLACK")]
    Slack,
    #[display("PV")]
    PV,
    #[default]
    #[display("PQ")]
    PQ,
}

fn neg_inf() -> f64 {
    f64::NEG_INFINITY
}
fn pos_inf() -> f64 {
    f64::INFINITY
}
fn one() -> f64 {
    1.0
}
fn unbounded(v: &f64) -> bool {
    v.is_infinite()
}

/// A network bus with its power flow state.
///
/// All powers are in per-unit on the system base. `theta` is in radians.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bus {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub bus_type: BusType,
    /// Voltage magnitude (pu).
    #[serde(default = "one")]
    pub v: f64,
    /// Voltage angle (rad).
    #[serde(default)]
    pub theta: f64,
    #[serde(default)]
    pub p_sch: f64,
    #[serde(default)]
    pub q_sch: f64,
    /// Computed net real injection after a solve.
    #[serde(default)]
    pub p: f64,
    /// Computed net reactive injection after a solve.
    #[serde(default)]
    pub q: f64,
    #[serde(default)]
    pub p_load: f64,
    #[serde(default)]
    pub q_load: f64,
    #[serde(default)]
    pub p_gen: f64,
    #[serde(default)]
    pub q_gen: f64,
    /// Generator reactive limits at this bus.
    #[serde(default = "neg_inf", skip_serializing_if = "unbounded")]
    pub q_min: f64,
    #[serde(default = "pos_inf", skip_serializing_if = "unbounded")]
    pub q_max: f64,
    #[serde(default)]
    pub g_shunt: f64,
    #[serde(default)]
    pub b_shunt: f64,
    /// Rated line voltage in kV.
    #[serde(default = "one")]
    pub v_rated_kv: f64,
    /// Position in the last assembled matrix.
    #[serde(skip)]
    pub index: usize,
}

impl Default for Bus {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: None,
            bus_type: BusType::PQ,
            v: 1.0,
            theta: 0.0,
            p_sch: 0.0,
            q_sch: 0.0,
            p: 0.0,
            q: 0.0,
            p_load: 0.0,
            q_load: 0.0,
            p_gen: 0.0,
            q_gen: 0.0,
            q_min: f64::NEG_INFINITY,
            q_max: f64::INFINITY,
            g_shunt: 0.0,
            b_shunt: 0.0,
            v_rated_kv: 1.0,
            index: 0,
        }
    }
}

impl Bus {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Reference bus held at `v∠theta`.
    pub fn slack(id: impl Into<String>, v: f64, theta: f64) -> Self {
        Self {
            bus_type: BusType::Slack,
            v,
            theta,
            ..Self::new(id)
        }
    }

    /// Load bus.
    pub fn pq(id: impl Into<String>, p_load: f64, q_load: f64) -> Self {
        Self {
            p_load,
            q_load,
            ..Self::new(id)
        }
    }

    /// Voltage-controlled bus with generation `p_gen` held at `v`.
    pub fn pv(id: impl Into<String>, p_gen: f64, v: f64) -> Self {
        Self {
            bus_type: BusType::PV,
            p_gen,
            v,
            ..Self::new(id)
        }
    }

    pub fn with_load(mut self, p_load: f64, q_load: f64) -> Self {
        self.p_load = p_load;
        self.q_load = q_load;
        self
    }

    pub fn with_q_limits(mut self, q_min: f64, q_max: f64) -> Self {
        self.q_min = q_min;
        self.q_max = q_max;
        self
    }

    pub fn with_shunt(mut self, g_shunt: f64, b_shunt: f64) -> Self {
        self.g_shunt = g_shunt;
        self.b_shunt = b_shunt;
        self
    }

    pub fn with_rated_kv(mut self, v_rated_kv: f64) -> Self {
        self.v_rated_kv = v_rated_kv;
        self
    }

    /// Recomputes the net scheduled injection from its load and generation parts.
    pub fn normalize_injection(&mut self) {
        self.p_sch = self.p_gen - self.p_load;
        self.q_sch = self.q_gen - self.q_load;
    }

    pub fn shunt(&self) -> Complex64 {
        Complex64::new(self.g_shunt, self.b_shunt)
    }

    /// Complex voltage phasor `v∠theta`.
    pub fn voltage(&self) -> Complex64 {
        Complex64::from_polar(self.v, self.theta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_injection() {
        let mut bus = Bus::pv("B3", 0.8, 1.02).with_load(0.3, 0.1);
        bus.q_gen = 0.25;
        bus.normalize_injection();
        assert!((bus.p_sch - 0.5).abs() < 1e-12);
        assert!((bus.q_sch - 0.15).abs() < 1e-12);
    }

    #[test]
    fn test_bus_deserialize_defaults() {
        let bus: Bus = serde_json::from_str(r#"{"id": "B7", "bus_type": "PV", "p_gen": 0.4}"#)
            .unwrap();
        assert_eq!(bus.bus_type, BusType::PV);
        assert_eq!(bus.v, 1.0);
        assert!(bus.q_max.is_infinite());
        assert_eq!(bus.bus_type.to_string(), "PV");
    }
}
