//! Injected powers and their partial derivatives in polar form.
//!
//! With `G + jB = Y[i][j]` and `δij = θi - θj`:
//!
//! ```text
//! P_i = V_i Σ_j V_j (G cos δij + B sin δij)
//! Q_i = V_i Σ_j V_j (G sin δij - B cos δij)
//! ```
//!
//! which is the same as `Σ |Vi||Vj||Yij| cos(∠Yij - θi + θj)` and its sine
//! counterpart.

use nalgebra::{DMatrix, DVector};
use num_complex::Complex64;

#[inline(always)]
fn terms(y: Complex64, dtheta: f64) -> (f64, f64) {
    let (s, c) = dtheta.sin_cos();
    (y.re * c + y.im * s, y.re * s - y.im * c)
}

/// Real power injected at bus `i`.
pub fn calc_p(y: &DMatrix<Complex64>, v: &[f64], theta: &[f64], i: usize) -> f64 {
    (0..v.len())
        .map(|j| v[j] * terms(y[(i, j)], theta[i] - theta[j]).0)
        .sum::<f64>()
        * v[i]
}

/// Reactive power injected at bus `i`.
pub fn calc_q(y: &DMatrix<Complex64>, v: &[f64], theta: &[f64], i: usize) -> f64 {
    (0..v.len())
        .map(|j| v[j] * terms(y[(i, j)], theta[i] - theta[j]).1)
        .sum::<f64>()
        * v[i]
}

/// `(P, Q)` at every bus.
pub fn calc_pq(y: &DMatrix<Complex64>, v: &[f64], theta: &[f64]) -> (DVector<f64>, DVector<f64>) {
    let n = v.len();
    let p = DVector::from_fn(n, |i, _| calc_p(y, v, theta, i));
    let q = DVector::from_fn(n, |i, _| calc_q(y, v, theta, i));
    (p, q)
}

/// Operating point the partials are evaluated at.
///
/// `p` and `q` are the injections computed at `(v, theta)`; the diagonal
/// partials use them as correction terms.
pub struct OperatingPoint<'a> {
    pub y: &'a DMatrix<Complex64>,
    pub v: &'a [f64],
    pub theta: &'a [f64],
    pub p: &'a [f64],
    pub q: &'a [f64],
}

impl OperatingPoint<'_> {
    #[inline(always)]
    fn at(&self, i: usize, j: usize) -> (f64, f64) {
        terms(self.y[(i, j)], self.theta[i] - self.theta[j])
    }

    /// `∂P_i/∂θ_j`
    pub fn dp_dtheta(&self, i: usize, j: usize) -> f64 {
        if i == j {
            -self.q[i] - self.v[i] * self.v[i] * self.y[(i, i)].im
        } else {
            self.v[i] * self.v[j] * self.at(i, j).1
        }
    }

    /// `∂P_i/∂V_j`
    pub fn dp_dv(&self, i: usize, j: usize) -> f64 {
        if i == j {
            self.p[i] / self.v[i] + self.v[i] * self.y[(i, i)].re
        } else {
            self.v[i] * self.at(i, j).0
        }
    }

    /// `∂Q_i/∂θ_j`
    pub fn dq_dtheta(&self, i: usize, j: usize) -> f64 {
        if i == j {
            self.p[i] - self.v[i] * self.v[i] * self.y[(i, i)].re
        } else {
            -self.v[i] * self.v[j] * self.at(i, j).0
        }
    }

    /// `∂Q_i/∂V_j`
    pub fn dq_dv(&self, i: usize, j: usize) -> f64 {
        if i == j {
            self.q[i] / self.v[i] - self.v[i] * self.y[(i, i)].im
        } else {
            self.v[i] * self.at(i, j).1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (DMatrix<Complex64>, Vec<f64>, Vec<f64>) {
        let ys = Complex64::new(0.01, 0.03).inv();
        let y = DMatrix::from_row_slice(2, 2, &[ys + Complex64::new(0.0, 0.02), -ys, -ys, ys]);
        (y, vec![1.02, 0.97], vec![0.0, -0.05])
    }

    #[test]
    fn test_injection_matches_complex_power() {
        let (y, v, theta) = sample();
        let vc: Vec<Complex64> = v
            .iter()
            .zip(&theta)
            .map(|(&m, &a)| Complex64::from_polar(m, a))
            .collect();
        for i in 0..2 {
            let current: Complex64 = (0..2).map(|j| y[(i, j)] * vc[j]).sum();
            let s = vc[i] * current.conj();
            assert!((calc_p(&y, &v, &theta, i) - s.re).abs() < 1e-10);
            assert!((calc_q(&y, &v, &theta, i) - s.im).abs() < 1e-10);
        }
    }

    #[test]
    fn test_partials_match_finite_differences() {
        let (y, v, theta) = sample();
        let (p, q) = calc_pq(&y, &v, &theta);
        let op = OperatingPoint {
            y: &y,
            v: &v,
            theta: &theta,
            p: p.as_slice(),
            q: q.as_slice(),
        };
        let h = 1e-7;
        for i in 0..2 {
            for j in 0..2 {
                let mut th = theta.clone();
                th[j] += h;
                let dp = (calc_p(&y, &v, &th, i) - p[i]) / h;
                let dq = (calc_q(&y, &v, &th, i) - q[i]) / h;
                assert!((op.dp_dtheta(i, j) - dp).abs() < 1e-4, "dP{i}/dθ{j}");
                assert!((op.dq_dtheta(i, j) - dq).abs() < 1e-4, "dQ{i}/dθ{j}");

                let mut vm = v.clone();
                vm[j] += h;
                let dp = (calc_p(&y, &vm, &theta, i) - p[i]) / h;
                let dq = (calc_q(&y, &vm, &theta, i) - q[i]) / h;
                assert!((op.dp_dv(i, j) - dp).abs() < 1e-4, "dP{i}/dV{j}");
                assert!((op.dq_dv(i, j) - dq).abs() < 1e-4, "dQ{i}/dV{j}");
            }
        }
    }
}
