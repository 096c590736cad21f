use std::str::FromStr;

use derive_more::Display;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::basic::error::PowerSystemError;

/// Winding connection of one transformer side.
///
/// Parsed from `"D"`, `"Y"` or `"Yg"` (long forms and `"YN"` accepted).
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WindingConnection {
    #[display("D")]
    Delta,
    #[display("Y")]
    Wye,
    #[display("Yg")]
    WyeGrounded,
}

impl FromStr for WindingConnection {
    type Err = PowerSystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "d" | "delta" => Ok(Self::Delta),
            "y" | "wye" => Ok(Self::Wye),
            "yg" | "yn" | "wyegrounded" | "wye_grounded" => Ok(Self::WyeGrounded),
            _ => Err(PowerSystemError::InvalidWinding(s.to_string())),
        }
    }
}

impl TryFrom<String> for WindingConnection {
    type Error = PowerSystemError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WindingConnection> for String {
    fn from(value: WindingConnection) -> Self {
        value.to_string()
    }
}

impl WindingConnection {
    /// Folds an explicit grounding flag into the connection: a grounded wye is `WyeGrounded`.
    pub fn with_grounding(self, grounded: bool) -> Self {
        match self {
            Self::Wye if grounded => Self::WyeGrounded,
            other => other,
        }
    }
}

/// Transformer data carried by a [`Branch`].
///
/// The high-voltage side is the branch's tap bus, the low-voltage side its z bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerMeta {
    pub sn_mva: f64,
    pub hv_kv: f64,
    pub lv_kv: f64,
    pub conn_hv: WindingConnection,
    pub conn_lv: WindingConnection,
    #[serde(default)]
    pub grounded_hv: bool,
    #[serde(default)]
    pub grounded_lv: bool,
    /// Neutral reactance on the HV side (pu).
    #[serde(default)]
    pub xn_hv_pu: f64,
    /// Neutral reactance on the LV side (pu).
    #[serde(default)]
    pub xn_lv_pu: f64,
}

impl Default for TransformerMeta {
    fn default() -> Self {
        Self {
            sn_mva: 100.0,
            hv_kv: 138.0,
            lv_kv: 13.8,
            conn_hv: WindingConnection::Wye,
            conn_lv: WindingConnection::Wye,
            grounded_hv: false,
            grounded_lv: false,
            xn_hv_pu: 0.0,
            xn_lv_pu: 0.0,
        }
    }
}

impl TransformerMeta {
    pub fn new(conn_hv: WindingConnection, conn_lv: WindingConnection) -> Self {
        Self {
            conn_hv,
            conn_lv,
            ..Default::default()
        }
    }

    pub fn effective_hv(&self) -> WindingConnection {
        self.conn_hv.with_grounding(self.grounded_hv)
    }

    pub fn effective_lv(&self) -> WindingConnection {
        self.conn_lv.with_grounding(self.grounded_lv)
    }
}

fn unity() -> f64 {
    1.0
}

/// A series element between two buses: a line, or a transformer when `transformer` is set.
///
/// `g + jb` is the base series admittance. The optional `z1/z2/z0` override it per
/// sequence; see `NetworkModel::resolve_branches` for the fallback rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub tap_bus_id: String,
    pub z_bus_id: String,
    #[serde(default)]
    pub g: f64,
    #[serde(default)]
    pub b: f64,
    /// Total line-charging susceptance (pu).
    #[serde(default)]
    pub bc: f64,
    /// Off-nominal tap magnitude on the tap bus side.
    #[serde(default = "unity")]
    pub tap: f64,
    /// Phase shift in radians.
    #[serde(default)]
    pub phase: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z1: Option<Complex64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z2: Option<Complex64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z0: Option<Complex64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bc1: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bc0: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformer: Option<TransformerMeta>,
}

impl Branch {
    /// Branch from its base series admittance `g + jb`.
    pub fn new(
        id: impl Into<String>,
        tap_bus_id: impl Into<String>,
        z_bus_id: impl Into<String>,
        y: Complex64,
    ) -> Self {
        Self {
            id: id.into(),
            tap_bus_id: tap_bus_id.into(),
            z_bus_id: z_bus_id.into(),
            g: y.re,
            b: y.im,
            bc: 0.0,
            tap: 1.0,
            phase: 0.0,
            z1: None,
            z2: None,
            z0: None,
            bc1: None,
            bc0: None,
            transformer: None,
        }
    }

    /// Branch from its positive-sequence series impedance.
    pub fn from_z(
        id: impl Into<String>,
        tap_bus_id: impl Into<String>,
        z_bus_id: impl Into<String>,
        z: Complex64,
    ) -> Result<Self, PowerSystemError> {
        let id = id.into();
        if !z.is_finite() || z.norm() < f64::EPSILON {
            return Err(PowerSystemError::InvalidImpedance {
                element: id,
                reason: format!("series impedance {z} must be finite and non-zero"),
            });
        }
        let mut branch = Self::new(id, tap_bus_id, z_bus_id, z.inv());
        branch.z1 = Some(z);
        Ok(branch)
    }

    pub fn with_charging(mut self, bc: f64) -> Self {
        self.bc = bc;
        self
    }

    pub fn with_tap(mut self, tap: f64, phase: f64) -> Self {
        self.tap = tap;
        self.phase = phase;
        self
    }

    pub fn with_negative_sequence(mut self, z2: Complex64) -> Self {
        self.z2 = Some(z2);
        self
    }

    pub fn with_zero_sequence(mut self, z0: Complex64, bc0: Option<f64>) -> Self {
        self.z0 = Some(z0);
        self.bc0 = bc0;
        self
    }

    pub fn with_transformer(mut self, meta: TransformerMeta) -> Self {
        self.transformer = Some(meta);
        self
    }

    pub fn is_transformer(&self) -> bool {
        self.transformer.is_some()
    }

    /// Base series admittance `g + jb`.
    pub fn y(&self) -> Complex64 {
        Complex64::new(self.g, self.b)
    }

    /// Complex tap `tap·e^{j·phase}`.
    pub fn complex_tap(&self) -> Complex64 {
        Complex64::from_polar(self.tap, self.phase)
    }
}
