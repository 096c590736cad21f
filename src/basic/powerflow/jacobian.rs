use nalgebra_sparse::{CooMatrix, CscMatrix};
use num_traits::Zero;

use super::calculator::OperatingPoint;
use crate::basic::elements::BusType;

/// Position of each unknown in the state vector.
///
/// Angles of PV and PQ buses come first, followed by magnitudes of PQ buses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownIndex {
    pub pvpq: Vec<usize>,
    pub pq: Vec<usize>,
    theta_pos: Vec<Option<usize>>,
    v_pos: Vec<Option<usize>>,
}

impl UnknownIndex {
    pub fn new(types: &[BusType]) -> Self {
        let pvpq: Vec<usize> = (0..types.len())
            .filter(|&i| types[i] != BusType::Slack)
            .collect();
        let pq: Vec<usize> = (0..types.len())
            .filter(|&i| types[i] == BusType::PQ)
            .collect();
        let mut theta_pos = vec![None; types.len()];
        let mut v_pos = vec![None; types.len()];
        pvpq.iter().enumerate().for_each(|(k, &i)| theta_pos[i] = Some(k));
        pq.iter().enumerate().for_each(|(k, &i)| v_pos[i] = Some(k));
        Self {
            pvpq,
            pq,
            theta_pos,
            v_pos,
        }
    }

    pub fn n_theta(&self) -> usize {
        self.pvpq.len()
    }

    pub fn n_v(&self) -> usize {
        self.pq.len()
    }

    pub fn len(&self) -> usize {
        self.n_theta() + self.n_v()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Column `j` couples to row `i` when `Y[i][j] != 0`; the diagonal is always present.
fn coupled(op: &OperatingPoint<'_>, i: usize) -> impl Iterator<Item = usize> {
    (0..op.v.len()).filter(move |&j| j == i || !op.y[(i, j)].is_zero())
}

/// Full Jacobian
///
/// ```text
/// | ∂P/∂θ  ∂P/∂V |
/// | ∂Q/∂θ  ∂Q/∂V |
/// ```
/// with rows and columns ordered as in [`UnknownIndex`].
pub fn build_jacobian(op: &OperatingPoint<'_>, idx: &UnknownIndex) -> CscMatrix<f64> {
    let nt = idx.n_theta();
    let n = idx.len();
    let mut coo = CooMatrix::new(n, n);
    for (r, &i) in idx.pvpq.iter().enumerate() {
        for j in coupled(op, i) {
            if let Some(c) = idx.theta_pos[j] {
                coo.push(r, c, op.dp_dtheta(i, j));
            }
            if let Some(c) = idx.v_pos[j] {
                coo.push(r, nt + c, op.dp_dv(i, j));
            }
        }
    }
    for (r, &i) in idx.pq.iter().enumerate() {
        for j in coupled(op, i) {
            if let Some(c) = idx.theta_pos[j] {
                coo.push(nt + r, c, op.dq_dtheta(i, j));
            }
            if let Some(c) = idx.v_pos[j] {
                coo.push(nt + r, nt + c, op.dq_dv(i, j));
            }
        }
    }
    CscMatrix::from(&coo)
}

/// Diagonal blocks `(∂P/∂θ, ∂Q/∂V)` of the Jacobian for the decoupled iteration.
pub fn build_decoupled(
    op: &OperatingPoint<'_>,
    idx: &UnknownIndex,
) -> (CscMatrix<f64>, CscMatrix<f64>) {
    let nt = idx.n_theta();
    let nv = idx.n_v();
    let mut j11 = CooMatrix::new(nt, nt);
    let mut j22 = CooMatrix::new(nv, nv);
    for (r, &i) in idx.pvpq.iter().enumerate() {
        for j in coupled(op, i) {
            if let Some(c) = idx.theta_pos[j] {
                j11.push(r, c, op.dp_dtheta(i, j));
            }
        }
    }
    for (r, &i) in idx.pq.iter().enumerate() {
        for j in coupled(op, i) {
            if let Some(c) = idx.v_pos[j] {
                j22.push(r, c, op.dq_dv(i, j));
            }
        }
    }
    (CscMatrix::from(&j11), CscMatrix::from(&j22))
}
