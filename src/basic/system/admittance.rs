use nalgebra::DMatrix;
use num_complex::Complex64;
use num_traits::{One, Zero};
use tracing::warn;

use crate::basic::error::{PowerSystemError, Result};

/// Taps below this magnitude are treated as `1+0j`.
pub const TAP_EPSILON: f64 = 1e-12;
/// Diagonal shift applied when a matrix is singular.
pub const REGULARIZATION_EPSILON: f64 = 1e-6;
/// Singular value cut-off of the pseudo-inverse fallback.
pub const PINV_EPSILON: f64 = 1e-12;
/// Largest accepted `|Y·Z - I|` entry for an inverse.
const INVERSE_RESIDUAL_TOL: f64 = 1e-6;

/// How an inverse was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InversionMethod {
    Direct,
    Regularized,
    PseudoInverse,
}

/// Square complex bus admittance matrix.
///
/// Rows and columns follow the order in which buses were registered with
/// [`AdmittanceMatrix::add_bus`]; the matrix size always equals that count.
#[derive(Debug, Clone, PartialEq)]
pub struct AdmittanceMatrix {
    bus_ids: Vec<String>,
    y: DMatrix<Complex64>,
}

impl Default for AdmittanceMatrix {
    fn default() -> Self {
        Self::new()
    }
}

impl AdmittanceMatrix {
    pub fn new() -> Self {
        Self {
            bus_ids: Vec::new(),
            y: DMatrix::zeros(0, 0),
        }
    }

    /// Registers a bus connected to nothing and returns its index.
    pub fn add_bus(&mut self, bus_id: impl Into<String>) -> usize {
        let n = self.bus_ids.len();
        let y = std::mem::replace(&mut self.y, DMatrix::zeros(0, 0));
        self.y = y.resize(n + 1, n + 1, Complex64::zero());
        self.bus_ids.push(bus_id.into());
        n
    }

    /// Adds a shunt to ground at bus `idx`.
    pub fn add_shunt(&mut self, idx: usize, y: Complex64) {
        self.y[(idx, idx)] += y;
    }

    /// Stamps a π-model branch between `source` (tap side) and `target`.
    ///
    /// ```text
    /// Yss += (y + j·bc/2) / |t|²     Ytt += y + j·bc/2
    /// Yst -= y / conj(t)             Yts -= y / t
    /// ```
    pub fn connect_bus_to_bus(
        &mut self,
        y: Complex64,
        source: usize,
        target: usize,
        bc: f64,
        tap: Complex64,
    ) {
        let tap = if tap.norm() < TAP_EPSILON {
            Complex64::one()
        } else {
            tap
        };
        let tap_abs2 = tap.norm_sqr();
        let charging = Complex64::new(0.0, bc / 2.0);

        self.y[(source, source)] += (y + charging) / tap_abs2;
        self.y[(target, target)] += y + charging;
        self.y[(source, target)] -= y / tap.conj();
        self.y[(target, source)] -= y / tap;
    }

    pub fn size(&self) -> usize {
        self.bus_ids.len()
    }

    pub fn bus_ids(&self) -> &[String] {
        &self.bus_ids
    }

    pub fn bus_index(&self, bus_id: &str) -> Option<usize> {
        self.bus_ids.iter().position(|id| id == bus_id)
    }

    pub fn get(&self, i: usize, j: usize) -> Complex64 {
        self.y[(i, j)]
    }

    pub fn matrix(&self) -> &DMatrix<Complex64> {
        &self.y
    }

    /// Inverts the matrix into a bus impedance matrix.
    ///
    /// A singular matrix is first retried with `REGULARIZATION_EPSILON` added on
    /// the diagonal, then replaced by its pseudo-inverse.
    pub fn inverse(&self) -> Result<(DMatrix<Complex64>, InversionMethod)> {
        let n = self.size();
        if n == 0 {
            return Ok((DMatrix::zeros(0, 0), InversionMethod::Direct));
        }
        if let Some(z) = checked_inverse(&self.y) {
            return Ok((z, InversionMethod::Direct));
        }

        let eps = Complex64::new(REGULARIZATION_EPSILON, 0.0);
        let regularized = &self.y + DMatrix::from_diagonal_element(n, n, eps);
        if let Some(z) = checked_inverse(&regularized) {
            warn!(size = n, "admittance matrix singular, inverted with diagonal regularization");
            return Ok((z, InversionMethod::Regularized));
        }

        warn!(size = n, "regularized inverse failed, falling back to pseudo-inverse");
        let z = self
            .y
            .clone()
            .pseudo_inverse(PINV_EPSILON)
            .map_err(|e| PowerSystemError::SingularMatrix(e.to_string()))?;
        if z.iter().all(|v| v.is_finite()) {
            Ok((z, InversionMethod::PseudoInverse))
        } else {
            Err(PowerSystemError::SingularMatrix(format!(
                "{n}x{n} admittance matrix has no usable inverse"
            )))
        }
    }
}

fn checked_inverse(y: &DMatrix<Complex64>) -> Option<DMatrix<Complex64>> {
    let z = y.clone().try_inverse()?;
    if !z.iter().all(|v| v.is_finite()) {
        return None;
    }
    let n = y.nrows();
    let residual = y * &z - DMatrix::<Complex64>::identity(n, n);
    let worst = residual.iter().fold(0.0_f64, |acc, v| acc.max(v.norm()));
    (worst < INVERSE_RESIDUAL_TOL).then_some(z)
}
