use nalgebra::{DMatrix, Matrix3, RowVector3, Vector3};
use num_complex::Complex64;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::fault::{FaultSpec, FaultType};
use super::result::{BusFaultResult, FaultStudyResult};
use super::sequence::{to_phase, transform};
use crate::basic::elements::base_current_ka;
use crate::basic::error::{PowerSystemError, Result};
use crate::basic::network::NetworkModel;
use crate::basic::system::{AdmittanceMatrix, InversionMethod, Sequence, build_sequence_admittance};

/// Denominators below this magnitude make a fault unsolvable.
const SINGULAR_EPSILON: f64 = 1e-12;

/// Thevenin equivalent of the external grid behind the slack bus (pu).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TheveninSource {
    pub z1: Complex64,
    /// Defaults to `z1`.
    #[serde(default)]
    pub z2: Option<Complex64>,
    /// Without it the source is open in the zero-sequence network.
    #[serde(default)]
    pub z0: Option<Complex64>,
}

impl TheveninSource {
    pub fn new(z1: Complex64) -> Self {
        Self {
            z1,
            z2: None,
            z0: None,
        }
    }

    pub fn with_z2(mut self, z2: Complex64) -> Self {
        self.z2 = Some(z2);
        self
    }

    pub fn with_z0(mut self, z0: Complex64) -> Self {
        self.z0 = Some(z0);
        self
    }

    fn admittances(&self) -> Result<[Option<Complex64>; 3]> {
        let inv = |z: Complex64| {
            if z.is_finite() && z.norm() > SINGULAR_EPSILON {
                Ok(z.inv())
            } else {
                Err(PowerSystemError::InvalidImpedance {
                    element: "thevenin source".into(),
                    reason: format!("impedance {z} must be finite and non-zero"),
                })
            }
        };
        Ok([
            self.z0.map(inv).transpose()?,
            Some(inv(self.z1)?),
            Some(inv(self.z2.unwrap_or(self.z1))?),
        ])
    }
}

/// Sources added as shunts before the sequence matrices are inverted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceAugmentation {
    pub thevenin: Option<TheveninSource>,
    /// Add every generator's subtransient reactances at its bus.
    pub include_generators: bool,
}

impl Default for SourceAugmentation {
    fn default() -> Self {
        Self {
            thevenin: None,
            include_generators: true,
        }
    }
}

impl SourceAugmentation {
    pub fn with_thevenin(thevenin: TheveninSource) -> Self {
        Self {
            thevenin: Some(thevenin),
            ..Default::default()
        }
    }
}

/// Short-circuit engine over fixed sequence impedance matrices.
///
/// Matrices are indexed `[zero, positive, negative]`. The engine only reads
/// the network it was built from.
#[derive(Debug, Clone)]
pub struct ShortCircuitSolver {
    bus_ids: Vec<String>,
    pre_fault: Vec<Complex64>,
    base_ka: Vec<Option<f64>>,
    z: [DMatrix<Complex64>; 3],
    methods: [InversionMethod; 3],
}

fn seq_slot(seq: Sequence) -> usize {
    match seq {
        Sequence::Zero => 0,
        Sequence::Positive => 1,
        Sequence::Negative => 2,
    }
}

impl ShortCircuitSolver {
    /// Builds and inverts the sequence networks of `net`, using the voltages on
    /// its buses as the pre-fault profile.
    pub fn new(net: &NetworkModel, augmentation: &SourceAugmentation) -> Result<Self> {
        let mut y = [
            build_sequence_admittance(net, Sequence::Zero)?,
            build_sequence_admittance(net, Sequence::Positive)?,
            build_sequence_admittance(net, Sequence::Negative)?,
        ];

        if let Some(thevenin) = &augmentation.thevenin {
            let slack = net
                .slack_index()
                .ok_or_else(|| PowerSystemError::MissingSlack("thevenin source".into()))?;
            for (m, ys) in y.iter_mut().zip(thevenin.admittances()?) {
                if let Some(ys) = ys {
                    m.add_shunt(slack, ys);
                }
            }
        }
        if augmentation.include_generators {
            for generator in net.generators() {
                let idx = net
                    .bus_index(&generator.bus_id)
                    .ok_or_else(|| PowerSystemError::BusNotFound(generator.bus_id.clone()))?;
                let (y1, y2, y0) = generator.sequence_admittances()?;
                if let Some(y0) = y0 {
                    y[0].add_shunt(idx, y0);
                }
                y[1].add_shunt(idx, y1);
                y[2].add_shunt(idx, y2);
            }
        }

        let pre_fault: Vec<Complex64> = net.buses().iter().map(|b| b.voltage()).collect();
        let [y0, y1, y2] = y;
        let mut solver = Self::from_admittance(&y1, &y2, &y0, &pre_fault)?;
        solver.base_ka = net
            .buses()
            .iter()
            .map(|b| base_current_ka(net.s_base_mva, b.v_rated_kv))
            .collect();
        Ok(solver)
    }

    /// Engine over explicit positive, negative and zero admittance matrices.
    pub fn from_admittance(
        y1: &AdmittanceMatrix,
        y2: &AdmittanceMatrix,
        y0: &AdmittanceMatrix,
        pre_fault: &[Complex64],
    ) -> Result<Self> {
        let n = y1.size();
        for found in [y2.size(), y0.size(), pre_fault.len()] {
            if found != n {
                return Err(PowerSystemError::DimensionMismatch { expected: n, found });
            }
        }
        let (z0, m0) = y0.inverse()?;
        let (z1, m1) = y1.inverse()?;
        let (z2, m2) = y2.inverse()?;
        debug!(
            buses = n,
            zero = ?m0,
            positive = ?m1,
            negative = ?m2,
            "sequence impedance matrices ready"
        );
        Ok(Self {
            bus_ids: y1.bus_ids().to_vec(),
            pre_fault: pre_fault.to_vec(),
            base_ka: vec![None; n],
            z: [z0, z1, z2],
            methods: [m0, m1, m2],
        })
    }

    fn index(&self, bus_id: &str) -> Result<usize> {
        self.bus_ids
            .iter()
            .position(|id| id == bus_id)
            .ok_or_else(|| PowerSystemError::BusNotFound(bus_id.to_string()))
    }

    pub fn bus_ids(&self) -> &[String] {
        &self.bus_ids
    }

    pub fn impedance_matrix(&self, seq: Sequence) -> &DMatrix<Complex64> {
        &self.z[seq_slot(seq)]
    }

    pub fn inversion_method(&self, seq: Sequence) -> InversionMethod {
        self.methods[seq_slot(seq)]
    }

    /// Driving-point impedance `Z_kk` of `bus_id` in sequence `seq`.
    pub fn thevenin_impedance(&self, bus_id: &str, seq: Sequence) -> Result<Complex64> {
        let k = self.index(bus_id)?;
        Ok(self.z[seq_slot(seq)][(k, k)])
    }

    /// Runs one fault study.
    ///
    /// The bus and the phase selector are checked before any arithmetic.
    pub fn run(&self, spec: &FaultSpec) -> Result<FaultStudyResult> {
        let k = self.index(&spec.bus_id)?;
        spec.validate()?;

        let vf = self.pre_fault[k];
        let zkk = Vector3::new(self.z[0][(k, k)], self.z[1][(k, k)], self.z[2][(k, k)]);
        let i012 = sequence_currents(spec, vf, &zkk)?;

        let canonical = spec.canonical_phase();
        let i_abc_fault = to_phase(i012);
        let buses: Vec<BusFaultResult> = (0..self.bus_ids.len())
            .map(|i| {
                let v012 = Vector3::new(
                    -self.z[0][(i, k)] * i012[0],
                    self.pre_fault[i] - self.z[1][(i, k)] * i012[1],
                    -self.z[2][(i, k)] * i012[2],
                );
                let v_abc = to_phase(v012);
                let i_abc = if i == k {
                    i_abc_fault
                } else {
                    Vector3::zeros()
                };
                BusFaultResult {
                    bus_id: self.bus_ids[i].clone(),
                    v_pu: v_abc[canonical],
                    i_pu: i_abc[canonical],
                    v_abc: v_abc.into(),
                    i_abc: i_abc.into(),
                    v012: v012.into(),
                }
            })
            .collect();

        let fault_current_pu = i_abc_fault[canonical];
        info!(
            bus = %spec.bus_id,
            fault = %spec.fault_type,
            phase = %spec.phase,
            current_pu = fault_current_pu.norm(),
            "fault study finished"
        );
        Ok(FaultStudyResult {
            spec: spec.clone(),
            fault_current_pu,
            sequence_currents: i012.into(),
            base_current_ka: self.base_ka[k],
            buses,
        })
    }
}

/// Sequence currents `[I0, I1, I2]` drawn by the fault.
///
/// Non-symmetric faults are solved as a 3×3 system of the boundary conditions
/// written through the rows of `A`, with the fault bus voltages
/// `V012 = (0, Vf, 0) - Zkk ∘ I012`.
fn sequence_currents(
    spec: &FaultSpec,
    vf: Complex64,
    zkk: &Vector3<Complex64>,
) -> Result<Vector3<Complex64>> {
    let zf = spec.z_fault_pu;
    let zero = Complex64::zero();
    if spec.fault_type == FaultType::ThreePhase {
        let den = zkk[1] + zf;
        if den.norm() < SINGULAR_EPSILON {
            return Err(PowerSystemError::SingularMatrix(format!(
                "zero impedance to a three-phase fault at {}",
                spec.bus_id
            )));
        }
        return Ok(Vector3::new(zero, vf / den, zero));
    }

    let a = transform();
    let row = |p: usize| -> RowVector3<Complex64> { a.row(p).into_owned() };
    let src = Vector3::new(zero, vf, zero);
    // voltage of a phase combination `r` is r·src - (r∘zkk)·I
    let weighted = |r: &RowVector3<Complex64>| r.component_mul(&zkk.transpose());
    let rhs = |r: &RowVector3<Complex64>| (r * src)[(0, 0)];

    type Rows = ([RowVector3<Complex64>; 3], [Complex64; 3]);
    let (lhs, b): Rows = match (spec.fault_type, spec.phase.pair()) {
        (FaultType::Slg, None) => {
            let p = spec.phase.canonical();
            let (q, r) = ((p + 1) % 3, (p + 2) % 3);
            let rp = row(p);
            ([row(q), row(r), weighted(&rp) + rp * zf], [zero, zero, rhs(&rp)])
        }
        (FaultType::Ll, Some((p, q, r))) => {
            let diff = row(p) - row(q);
            (
                [row(r), row(p) + row(q), weighted(&diff) + row(p) * zf],
                [zero, zero, rhs(&diff)],
            )
        }
        (FaultType::Dlg, Some((p, q, r))) => {
            let sum = (row(p) + row(q)) * zf;
            (
                [row(r), weighted(&row(p)) + &sum, weighted(&row(q)) + &sum],
                [zero, rhs(&row(p)), rhs(&row(q))],
            )
        }
        _ => {
            return Err(PowerSystemError::UnknownFaultPhase(format!(
                "{} for a {} fault",
                spec.phase, spec.fault_type
            )));
        }
    };

    let m = Matrix3::from_rows(&lhs);
    let i012 = m
        .lu()
        .solve(&Vector3::from(b))
        .filter(|x| x.iter().all(|v| v.is_finite()))
        .ok_or_else(|| {
            PowerSystemError::SingularMatrix(format!(
                "{} fault boundary equations at {} have no solution",
                spec.fault_type, spec.bus_id
            ))
        })?;
    Ok(i012)
}

/// Runs a fault study on a solved network.
///
/// The fault is checked against the network before any matrix is built.
pub fn run_fault_study(
    net: &NetworkModel,
    spec: &FaultSpec,
    augmentation: &SourceAugmentation,
) -> Result<FaultStudyResult> {
    if net.bus_index(&spec.bus_id).is_none() {
        return Err(PowerSystemError::BusNotFound(spec.bus_id.clone()));
    }
    spec.validate()?;
    ShortCircuitSolver::new(net, augmentation)?.run(spec)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::basic::elements::*;
    use crate::basic::shortcircuit::fault::FaultPhase;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn grounded_pair() -> (NetworkModel, SourceAugmentation) {
        let mut net = NetworkModel::default();
        net.add_bus(Bus::slack("B1", 1.0, 0.0)).unwrap();
        net.add_bus(Bus::pq("B2", 0.0, 0.0).with_rated_kv(13.8)).unwrap();
        net.add_branch(
            Branch::from_z("L12", "B1", "B2", c(0.01, 0.03))
                .unwrap()
                .with_zero_sequence(c(0.03, 0.09), None),
        )
        .unwrap();
        let source = TheveninSource::new(c(0.0, 0.25)).with_z0(c(0.0, 0.1));
        let aug = SourceAugmentation::with_thevenin(source);
        (net, aug)
    }

    #[test]
    fn test_thevenin_impedance_per_sequence() {
        let (net, aug) = grounded_pair();
        let sc = ShortCircuitSolver::new(&net, &aug).unwrap();
        let z1 = sc.thevenin_impedance("B2", Sequence::Positive).unwrap();
        let z0 = sc.thevenin_impedance("B2", Sequence::Zero).unwrap();
        assert!((z1 - c(0.01, 0.28)).norm() < 1e-9);
        assert!((z0 - c(0.03, 0.19)).norm() < 1e-9);
        assert_eq!(
            sc.thevenin_impedance("B1", Sequence::Negative).unwrap(),
            sc.thevenin_impedance("B1", Sequence::Positive).unwrap()
        );
        assert_eq!(sc.inversion_method(Sequence::Zero), InversionMethod::Direct);
    }

    #[test]
    fn test_three_phase_current_and_ka() {
        let (net, aug) = grounded_pair();
        let spec = FaultSpec::new("B2", FaultType::ThreePhase);
        let res = run_fault_study(&net, &spec, &aug).unwrap();
        let expected = 1.0 / c(0.01, 0.28);
        assert!((res.fault_current_pu - expected).norm() < 1e-9);
        assert!(res.sequence_currents[0].norm() < 1e-12);
        assert!(res.sequence_currents[2].norm() < 1e-12);
        let ka = res.fault_current_ka().unwrap();
        assert!((ka - expected.norm() * 100.0 / (3f64.sqrt() * 13.8)).abs() < 1e-9);
        assert_eq!(res.bus("B1").unwrap().i_abc, [Complex64::zero(); 3]);
    }

    #[rstest]
    #[case(FaultPhase::A)]
    #[case(FaultPhase::B)]
    #[case(FaultPhase::C)]
    fn test_slg_boundary(#[case] phase: FaultPhase) {
        let (net, aug) = grounded_pair();
        let zf = c(0.02, 0.0);
        let spec = FaultSpec::new("B2", FaultType::Slg).with_phase(phase).with_impedance(zf);
        let res = run_fault_study(&net, &spec, &aug).unwrap();
        let bus = res.bus("B2").unwrap();
        let p = phase.canonical();
        for other in (0..3).filter(|&i| i != p) {
            assert!(bus.i_abc[other].norm() < 1e-9);
        }
        assert!((bus.v_abc[p] - zf * bus.i_abc[p]).norm() < 1e-9);
        assert!((res.ground_current() - bus.i_abc[p]).norm() < 1e-9);
        let i012 = bus.i012();
        for s in 0..3 {
            assert!((i012[s] - res.sequence_currents[s]).norm() < 1e-9);
        }
        // bolted SLG: I = 3 Vf / (Z0 + Z1 + Z2)
        if p == 0 {
            let spec = FaultSpec::new("B2", FaultType::Slg);
            let bolted = run_fault_study(&net, &spec, &aug).unwrap();
            let expected = 3.0 / (c(0.03, 0.19) + c(0.01, 0.28) * 2.0);
            assert!((bolted.fault_current_pu - expected).norm() < 1e-9);
        }
    }

    #[rstest]
    #[case(FaultPhase::AB)]
    #[case(FaultPhase::BC)]
    #[case(FaultPhase::CA)]
    fn test_ll_boundary(#[case] phase: FaultPhase) {
        let (net, aug) = grounded_pair();
        let zf = c(0.0, 0.05);
        let spec = FaultSpec::new("B2", FaultType::Ll).with_phase(phase).with_impedance(zf);
        let res = run_fault_study(&net, &spec, &aug).unwrap();
        let bus = res.bus("B2").unwrap();
        let (p, q, r) = phase.pair().unwrap();
        assert!(bus.i_abc[r].norm() < 1e-9);
        assert!((bus.i_abc[p] + bus.i_abc[q]).norm() < 1e-9);
        assert!((bus.v_abc[p] - bus.v_abc[q] - zf * bus.i_abc[p]).norm() < 1e-9);
        assert!(res.sequence_currents[0].norm() < 1e-9);
        assert_eq!(res.fault_current_pu, bus.i_abc[p]);
    }

    #[rstest]
    #[case(FaultPhase::AB)]
    #[case(FaultPhase::BC)]
    #[case(FaultPhase::CA)]
    fn test_dlg_boundary(#[case] phase: FaultPhase) {
        let (net, aug) = grounded_pair();
        let zf = c(0.01, 0.0);
        let spec = FaultSpec::new("B2", FaultType::Dlg).with_phase(phase).with_impedance(zf);
        let res = run_fault_study(&net, &spec, &aug).unwrap();
        let bus = res.bus("B2").unwrap();
        let (p, q, r) = phase.pair().unwrap();
        let ig = bus.i_abc[p] + bus.i_abc[q];
        assert!(bus.i_abc[r].norm() < 1e-9);
        assert!((bus.v_abc[p] - zf * ig).norm() < 1e-9);
        assert!((bus.v_abc[q] - zf * ig).norm() < 1e-9);
        assert!((res.ground_current() - ig).norm() < 1e-9);
    }

    #[test]
    fn test_rejects_before_solving() {
        let (net, aug) = grounded_pair();
        let err = run_fault_study(&net, &FaultSpec::new("B9", FaultType::Slg), &aug).unwrap_err();
        assert_eq!(err, PowerSystemError::BusNotFound("B9".into()));
        let spec = FaultSpec::new("B2", FaultType::Ll).with_phase(FaultPhase::A);
        assert!(matches!(
            run_fault_study(&net, &spec, &aug),
            Err(PowerSystemError::UnknownFaultPhase(_))
        ));
    }

    #[test]
    fn test_generator_augmentation() {
        let (mut net, _) = grounded_pair();
        net.add_generator(Generator::new("G1", "B1", 0.0, 1.0)).unwrap();
        let sc = ShortCircuitSolver::new(&net, &SourceAugmentation::default()).unwrap();
        // x1 = 0.25 behind B1, so the same driving point as the thevenin case
        let z1 = sc.thevenin_impedance("B2", Sequence::Positive).unwrap();
        assert!((z1 - c(0.01, 0.28)).norm() < 1e-9);
        let z0 = sc.thevenin_impedance("B2", Sequence::Zero).unwrap();
        assert!((z0 - c(0.03, 0.19)).norm() < 1e-9);

        let bare = SourceAugmentation {
            include_generators: false,
            ..Default::default()
        };
        let floating = ShortCircuitSolver::new(&net, &bare).unwrap();
        assert_ne!(floating.inversion_method(Sequence::Positive), InversionMethod::Direct);
    }

    #[test]
    fn test_dimension_mismatch() {
        let (net, _) = grounded_pair();
        let y = build_sequence_admittance(&net, Sequence::Positive).unwrap();
        let pre_fault = [Complex64::new(1.0, 0.0)];
        let err = ShortCircuitSolver::from_admittance(&y, &y, &y, &pre_fault).unwrap_err();
        assert_eq!(err, PowerSystemError::DimensionMismatch { expected: 2, found: 1 });
    }

    #[test]
    fn test_thevenin_source_needs_slack() {
        let mut net = NetworkModel::default();
        net.add_bus(Bus::pq("B1", 0.0, 0.0)).unwrap();
        net.add_bus(Bus::pq("B2", 0.0, 0.0)).unwrap();
        net.add_branch(Branch::from_z("L12", "B1", "B2", c(0.01, 0.03)).unwrap())
            .unwrap();
        let aug = SourceAugmentation::with_thevenin(TheveninSource::new(c(0.0, 0.25)));
        let err = ShortCircuitSolver::new(&net, &aug).unwrap_err();
        assert_eq!(err, PowerSystemError::MissingSlack("thevenin source".into()));
    }

    #[test]
    fn test_sequence_currents_only_at_fault_bus() {
        let (net, aug) = grounded_pair();
        let spec = FaultSpec::new("B2", FaultType::Dlg).with_phase(FaultPhase::BC);
        let res = run_fault_study(&net, &spec, &aug).unwrap();
        let fault = res.bus("B2").unwrap().i012();
        assert!((fault[0] - res.sequence_currents[0]).norm() < 1e-9);
        assert!(fault[0].norm() > 1e-3);
        assert_eq!(res.bus("B1").unwrap().i012(), [Complex64::zero(); 3]);
    }
}
