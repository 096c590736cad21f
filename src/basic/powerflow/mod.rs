//! Newton-Raphson power flow over the positive-sequence network.
//!
//! The solver works on a private copy of the bus state and writes voltages,
//! angles, bus types and computed injections back to the [`NetworkModel`] only
//! once the iteration has converged.

pub mod calculator;
pub mod flows;
pub mod jacobian;
mod qlim;

use nalgebra::{DMatrix, DVector};
use nalgebra_sparse::CscMatrix;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::elements::{BusType, Limit};
use super::error::{PowerSystemError, Result};
use super::network::NetworkModel;
use super::solver::{DefaultSolver, Solve};
use super::system::{Sequence, build_sequence_admittance};
use calculator::{OperatingPoint, calc_pq};
use jacobian::{UnknownIndex, build_decoupled, build_jacobian};
use qlim::QPin;

pub use flows::{BranchFlow, branch_flows};

/// Options of a power flow solve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerFlowOptions {
    pub max_iterations: usize,
    /// Largest accepted absolute mismatch (pu).
    pub tolerance: f64,
    /// Solve `∂P/∂θ` and `∂Q/∂V` separately instead of the full Jacobian.
    pub decoupled: bool,
    /// Switch PV buses to PQ when their reactive output leaves `[q_min, q_max]`,
    /// and back once their voltage recovers.
    pub enforce_q_limits: bool,
    /// Number of times a Newton step may be halved before the solve gives up.
    pub max_halvings: usize,
    /// Lower clamp on voltage magnitudes while stepping (pu).
    pub v_floor: f64,
}

impl Default for PowerFlowOptions {
    fn default() -> Self {
        Self {
            max_iterations: 20,
            tolerance: 1e-6,
            decoupled: false,
            enforce_q_limits: true,
            max_halvings: 8,
            v_floor: 0.05,
        }
    }
}

/// Outcome of a converged solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerFlowReport {
    pub iterations: usize,
    /// Infinity norm of the final mismatch vector.
    pub mismatch: f64,
    /// Ids of PV buses that finished the solve as PQ, held at a reactive limit.
    pub reclassified: Vec<String>,
    /// Ids of buses that were held at a limit and later returned to PV.
    pub restored: Vec<String>,
}

/// Working copy of the bus state, ordered like the model's buses.
#[derive(Debug, Clone)]
pub(crate) struct PfState {
    pub ids: Vec<String>,
    pub types: Vec<BusType>,
    pub v: Vec<f64>,
    pub theta: Vec<f64>,
    pub p_sch: Vec<f64>,
    pub q_sch: Vec<f64>,
    pub q_load: Vec<f64>,
    pub q_lim: Vec<Limit<f64>>,
    /// Voltage and reactive schedule each bus started the solve with.
    pub v_set: Vec<f64>,
    pub q_sch_set: Vec<f64>,
    /// Limit a switched PV bus is held at.
    pub pinned: Vec<Option<QPin>>,
    /// Buses that already returned to PV once.
    pub restored: Vec<bool>,
}

impl PfState {
    fn from_network(net: &NetworkModel) -> Self {
        let buses = net.buses();
        Self {
            ids: buses.iter().map(|b| b.id.clone()).collect(),
            types: buses.iter().map(|b| b.bus_type).collect(),
            v: buses.iter().map(|b| b.v).collect(),
            theta: buses.iter().map(|b| b.theta).collect(),
            p_sch: buses.iter().map(|b| b.p_sch).collect(),
            q_sch: buses.iter().map(|b| b.q_sch).collect(),
            q_load: buses.iter().map(|b| b.q_load).collect(),
            q_lim: buses.iter().map(|b| Limit::new(b.q_min, b.q_max)).collect(),
            v_set: buses.iter().map(|b| b.v).collect(),
            q_sch_set: buses.iter().map(|b| b.q_sch).collect(),
            pinned: vec![None; buses.len()],
            restored: vec![false; buses.len()],
        }
    }

    /// Scheduled minus computed injections, `[ΔP(pvpq); ΔQ(pq)]`.
    fn mismatch(&self, idx: &UnknownIndex, p: &DVector<f64>, q: &DVector<f64>) -> DVector<f64> {
        let nt = idx.n_theta();
        let mut f = DVector::zeros(idx.len());
        for (r, &i) in idx.pvpq.iter().enumerate() {
            f[r] = self.p_sch[i] - p[i];
        }
        for (r, &i) in idx.pq.iter().enumerate() {
            f[nt + r] = self.q_sch[i] - q[i];
        }
        f
    }

    /// State after adding `scale·dx` to the unknowns.
    fn stepped(
        &self,
        idx: &UnknownIndex,
        dx: &[f64],
        scale: f64,
        v_floor: f64,
    ) -> (Vec<f64>, Vec<f64>) {
        let nt = idx.n_theta();
        let mut theta = self.theta.clone();
        let mut v = self.v.clone();
        for (k, &i) in idx.pvpq.iter().enumerate() {
            theta[i] += scale * dx[k];
        }
        for (k, &i) in idx.pq.iter().enumerate() {
            v[i] = (v[i] + scale * dx[nt + k]).max(v_floor);
        }
        (v, theta)
    }
}

fn inf_norm(f: &DVector<f64>) -> f64 {
    f.iter().fold(0.0_f64, |acc, x| {
        if acc.is_nan() || x.is_nan() {
            f64::NAN
        } else {
            acc.max(x.abs())
        }
    })
}

#[allow(non_snake_case)]
fn solve_sparse<S: Solve>(
    solver: &mut S,
    jac: CscMatrix<f64>,
    mut rhs: Vec<f64>,
) -> Result<Vec<f64>> {
    let n = jac.nrows();
    let (mut Ap, mut Ai, mut Ax) = jac.disassemble();
    solver
        .solve(&mut Ap, &mut Ai, &mut Ax, &mut rhs, n)
        .map_err(|e| PowerSystemError::LinearSolve(e.to_string()))?;
    Ok(rhs)
}

/// Solves the power flow with the default sparse solver.
///
/// See [`solve_power_flow_with`].
pub fn solve_power_flow(
    net: &mut NetworkModel,
    options: &PowerFlowOptions,
) -> Result<PowerFlowReport> {
    solve_power_flow_with::<DefaultSolver>(net, options)
}

/// Solves the power flow of `net` with the sparse solver `S`.
///
/// Generator set-points are copied onto their buses and scheduled injections
/// are normalized first. On success every bus carries its solved `v`, `theta`,
/// final type and computed `p`/`q`; slack and PV buses also get the generation
/// that balances them. On failure the network is left exactly as it was after
/// that preparation.
pub fn solve_power_flow_with<S: Solve + Default>(
    net: &mut NetworkModel,
    options: &PowerFlowOptions,
) -> Result<PowerFlowReport> {
    net.apply_generators();
    net.normalize_injections();
    let ybus = build_sequence_admittance(net, Sequence::Positive)?;
    let y = ybus.matrix();
    let mut state = PfState::from_network(net);
    let mut idx = UnknownIndex::new(&state.types);

    if idx.is_empty() {
        debug!("no unknowns, computing injections from the given state");
        write_back(net, y, &state);
        return Ok(PowerFlowReport {
            iterations: 0,
            mismatch: 0.0,
            reclassified: Vec::new(),
            restored: Vec::new(),
        });
    }

    let mut full = S::default();
    let mut p_theta = S::default();
    let mut q_v = S::default();
    let mut iterations = 0;

    let mismatch = loop {
        let (p, q) = calc_pq(y, &state.v, &state.theta);
        let f = state.mismatch(&idx, &p, &q);
        let err = inf_norm(&f);
        debug!(iteration = iterations, mismatch = err, unknowns = idx.len());
        if err < options.tolerance {
            break err;
        }
        if iterations >= options.max_iterations {
            return Err(PowerSystemError::NotConverged {
                iterations,
                mismatch: err,
            });
        }
        iterations += 1;

        let op = OperatingPoint {
            y,
            v: &state.v,
            theta: &state.theta,
            p: p.as_slice(),
            q: q.as_slice(),
        };
        let dx = if options.decoupled {
            let nt = idx.n_theta();
            let (j11, j22) = build_decoupled(&op, &idx);
            let mut dtheta = solve_sparse(&mut p_theta, j11, f.as_slice()[..nt].to_vec())?;
            let dv = solve_sparse(&mut q_v, j22, f.as_slice()[nt..].to_vec())?;
            dtheta.extend(dv);
            dtheta
        } else {
            solve_sparse(&mut full, build_jacobian(&op, &idx), f.as_slice().to_vec())?
        };

        let (scale, improved) = damped_step(y, &mut state, &idx, &dx, err, options).ok_or(
            PowerSystemError::StepDampingFailed {
                iteration: iterations,
                mismatch: err,
            },
        )?;
        debug!(iteration = iterations, scale, mismatch = improved, "step accepted");

        if options.enforce_q_limits {
            let changes = qlim::enforce_q_limits(y, &mut state);
            if !changes.is_empty() {
                debug!(to_pq = ?changes.to_pq, to_pv = ?changes.to_pv, "bus types changed");
                idx = UnknownIndex::new(&state.types);
                full.reset();
                p_theta.reset();
                q_v.reset();
            }
        }
    };

    info!(iterations, mismatch, "power flow converged");
    write_back(net, y, &state);
    let reclassified = state
        .ids
        .iter()
        .zip(&state.pinned)
        .filter(|(_, pin)| pin.is_some())
        .map(|(id, _)| id.clone())
        .collect();
    let restored = state
        .ids
        .iter()
        .zip(&state.restored)
        .filter(|&(_, &back)| back)
        .map(|(id, _)| id.clone())
        .collect();
    Ok(PowerFlowReport {
        iterations,
        mismatch,
        reclassified,
        restored,
    })
}

/// Applies `dx`, halving it until the mismatch drops below `err`.
///
/// Returns the accepted scale and the new mismatch, or `None` when every
/// trial failed to improve.
fn damped_step(
    y: &DMatrix<Complex64>,
    state: &mut PfState,
    idx: &UnknownIndex,
    dx: &[f64],
    err: f64,
    options: &PowerFlowOptions,
) -> Option<(f64, f64)> {
    let mut scale = 1.0;
    for _ in 0..=options.max_halvings {
        let (v, theta) = state.stepped(idx, dx, scale, options.v_floor);
        let (p, q) = calc_pq(y, &v, &theta);
        let trial = inf_norm(&state.mismatch(idx, &p, &q));
        if trial < err {
            state.v = v;
            state.theta = theta;
            return Some((scale, trial));
        }
        scale *= 0.5;
    }
    None
}

fn write_back(net: &mut NetworkModel, y: &DMatrix<Complex64>, state: &PfState) {
    let (p, q) = calc_pq(y, &state.v, &state.theta);
    for (i, bus) in net.buses_mut().iter_mut().enumerate() {
        bus.v = state.v[i];
        bus.theta = state.theta[i];
        bus.bus_type = state.types[i];
        bus.q_sch = state.q_sch[i];
        bus.p = p[i];
        bus.q = q[i];
        match state.types[i] {
            BusType::Slack => {
                bus.p_gen = p[i] + bus.p_load;
                bus.q_gen = q[i] + bus.q_load;
            }
            BusType::PV => bus.q_gen = q[i] + bus.q_load,
            BusType::PQ if state.pinned[i].is_some() => bus.q_gen = state.q_sch[i] + bus.q_load,
            BusType::PQ => {}
        }
    }
}
