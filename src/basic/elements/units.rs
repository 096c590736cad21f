use serde::{Deserialize, Serialize};

/// A closed range `[min, max]`.
///
/// Commonly used for constraining reactive output ranges.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Limit<T> {
    /// Minimum value.
    pub min: T,
    /// Maximum value.
    pub max: T,
}

impl Limit<f64> {
    /// A range with no bounds at all.
    pub const UNBOUNDED: Self = Limit {
        min: f64::NEG_INFINITY,
        max: f64::INFINITY,
    };

    pub fn new(min: f64, max: f64) -> Self {
        Limit { min, max }
    }

    pub fn is_unbounded(&self) -> bool {
        self.min == f64::NEG_INFINITY && self.max == f64::INFINITY
    }

    /// Returns the violated bound if `value` lies outside the range.
    pub fn violated_by(&self, value: f64) -> Option<f64> {
        if value > self.max {
            Some(self.max)
        } else if value < self.min {
            Some(self.min)
        } else {
            None
        }
    }
}

impl Default for Limit<f64> {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

/// Base current in kA for a three-phase system of `s_base_mva` at `v_base_kv` line voltage.
pub fn base_current_ka(s_base_mva: f64, v_base_kv: f64) -> Option<f64> {
    (v_base_kv > 0.0 && s_base_mva > 0.0).then(|| s_base_mva / (3f64.sqrt() * v_base_kv))
}
