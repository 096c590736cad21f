//! Caller-owned network model.
//!
//! The model owns the bus, branch and generator records and keeps a bus id to
//! position lookup in sync with them. Engines borrow it: the Y-bus builder and
//! the short-circuit engine read it, the power flow mutates bus state only.

use std::collections::HashMap;

use num_complex::Complex64;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

use super::elements::*;
use super::error::{PowerSystemError, Result};
use super::system::admittance::TAP_EPSILON;

/// Impedances below this magnitude are treated as degenerate.
const Z_EPSILON: f64 = 1e-12;

/// Defaults applied when a branch leaves a sequence impedance unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequenceDefaults {
    /// Plain branches without `z0` use `z0 = factor · z1`.
    pub zero_sequence_factor: f64,
}

impl Default for SequenceDefaults {
    fn default() -> Self {
        Self {
            zero_sequence_factor: 3.0,
        }
    }
}

/// Zero-sequence representation of a branch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZeroSequence {
    /// Stamped like the positive sequence with `y0` and charging `b0`.
    Series { y0: Complex64, b0: f64 },
    /// No coupling between the buses; grounded-wye sides present a shunt to ground.
    GroundedShunts {
        source: Option<Complex64>,
        target: Option<Complex64>,
    },
    /// Absent from the zero-sequence network.
    Open,
}

/// A branch with every sequence quantity resolved and its buses mapped to positions.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedBranch {
    pub branch_id: String,
    pub source: usize,
    pub target: usize,
    pub tap: Complex64,
    pub y1: Complex64,
    pub y2: Complex64,
    pub b1: f64,
    pub zero: ZeroSequence,
}

/// Owned bus, branch and generator records of one network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NetworkRecords", into = "NetworkRecords")]
pub struct NetworkModel {
    pub s_base_mva: f64,
    pub defaults: SequenceDefaults,
    buses: Vec<Bus>,
    branches: Vec<Branch>,
    generators: Vec<Generator>,
    lookup: HashMap<String, usize>,
}

/// Serialized form of a [`NetworkModel`]; the lookup is rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NetworkRecords {
    #[serde(default = "default_s_base")]
    s_base_mva: f64,
    #[serde(default)]
    defaults: SequenceDefaults,
    buses: Vec<Bus>,
    #[serde(default)]
    branches: Vec<Branch>,
    #[serde(default)]
    generators: Vec<Generator>,
}

fn default_s_base() -> f64 {
    100.0
}

impl TryFrom<NetworkRecords> for NetworkModel {
    type Error = PowerSystemError;

    fn try_from(records: NetworkRecords) -> Result<Self> {
        let mut net = NetworkModel::new(records.s_base_mva);
        net.defaults = records.defaults;
        for bus in records.buses {
            net.add_bus(bus)?;
        }
        for branch in records.branches {
            net.add_branch(branch)?;
        }
        for generator in records.generators {
            net.add_generator(generator)?;
        }
        Ok(net)
    }
}

impl From<NetworkModel> for NetworkRecords {
    fn from(net: NetworkModel) -> Self {
        Self {
            s_base_mva: net.s_base_mva,
            defaults: net.defaults,
            buses: net.buses,
            branches: net.branches,
            generators: net.generators,
        }
    }
}

impl Default for NetworkModel {
    fn default() -> Self {
        Self::new(default_s_base())
    }
}

impl NetworkModel {
    pub fn new(s_base_mva: f64) -> Self {
        Self {
            s_base_mva,
            defaults: SequenceDefaults::default(),
            buses: Vec::new(),
            branches: Vec::new(),
            generators: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    pub fn with_defaults(mut self, defaults: SequenceDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Adds a bus and returns its position.
    pub fn add_bus(&mut self, mut bus: Bus) -> Result<usize> {
        if self.lookup.contains_key(&bus.id) {
            return Err(PowerSystemError::DuplicateBus(bus.id));
        }
        let idx = self.buses.len();
        bus.index = idx;
        self.lookup.insert(bus.id.clone(), idx);
        self.buses.push(bus);
        Ok(idx)
    }

    pub fn add_branch(&mut self, branch: Branch) -> Result<()> {
        self.require_bus(&branch.tap_bus_id)?;
        self.require_bus(&branch.z_bus_id)?;
        self.branches.push(branch);
        Ok(())
    }

    pub fn add_generator(&mut self, generator: Generator) -> Result<()> {
        self.require_bus(&generator.bus_id)?;
        self.generators.push(generator);
        Ok(())
    }

    /// Removes a bus together with every branch and generator attached to it.
    pub fn remove_bus(&mut self, bus_id: &str) -> Result<Bus> {
        let idx = self.require_bus(bus_id)?;
        let bus = self.buses.remove(idx);
        self.branches
            .retain(|br| br.tap_bus_id != bus_id && br.z_bus_id != bus_id);
        self.generators.retain(|g| g.bus_id != bus_id);
        self.reindex();
        Ok(bus)
    }

    pub fn remove_branch(&mut self, branch_id: &str) -> Option<Branch> {
        let pos = self.branches.iter().position(|br| br.id == branch_id)?;
        Some(self.branches.remove(pos))
    }

    fn reindex(&mut self) {
        self.lookup.clear();
        for (idx, bus) in self.buses.iter_mut().enumerate() {
            bus.index = idx;
            self.lookup.insert(bus.id.clone(), idx);
        }
    }

    fn require_bus(&self, bus_id: &str) -> Result<usize> {
        self.bus_index(bus_id)
            .ok_or_else(|| PowerSystemError::BusNotFound(bus_id.to_string()))
    }

    pub fn bus_index(&self, bus_id: &str) -> Option<usize> {
        self.lookup.get(bus_id).copied()
    }

    pub fn bus(&self, bus_id: &str) -> Option<&Bus> {
        self.bus_index(bus_id).map(|idx| &self.buses[idx])
    }

    pub fn bus_mut(&mut self, bus_id: &str) -> Option<&mut Bus> {
        self.bus_index(bus_id).map(|idx| &mut self.buses[idx])
    }

    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    /// Mutable bus state. Ids must not be changed through this slice.
    pub(crate) fn buses_mut(&mut self) -> &mut [Bus] {
        &mut self.buses
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn generators(&self) -> &[Generator] {
        &self.generators
    }

    pub fn bus_count(&self) -> usize {
        self.buses.len()
    }

    pub fn slack_index(&self) -> Option<usize> {
        self.buses
            .iter()
            .position(|b| b.bus_type == BusType::Slack)
    }

    /// Recomputes `p_sch = p_gen - p_load` and `q_sch = q_gen - q_load` on every bus.
    pub fn normalize_injections(&mut self) {
        self.buses.iter_mut().for_each(Bus::normalize_injection);
    }

    /// Copies generator set-points onto their buses.
    ///
    /// Active power and reactive limits of generators sharing a bus are summed;
    /// the first generator's voltage set-point wins. A PQ bus holding a generator
    /// becomes PV.
    pub fn apply_generators(&mut self) {
        let mut seen = vec![false; self.buses.len()];
        for generator in &self.generators {
            let Some(idx) = self.lookup.get(&generator.bus_id).copied() else {
                continue;
            };
            let bus = &mut self.buses[idx];
            if !seen[idx] {
                seen[idx] = true;
                bus.p_gen = 0.0;
                bus.q_min = 0.0;
                bus.q_max = 0.0;
                bus.v = generator.v_set;
                if bus.bus_type == BusType::PQ {
                    bus.bus_type = BusType::PV;
                }
            }
            bus.p_gen += generator.p_gen;
            bus.q_min += generator.q_lim.min;
            bus.q_max += generator.q_lim.max;
        }
    }

    /// Resolves sequence admittances and topology of every branch.
    pub fn resolve_branches(&self) -> Result<Vec<ResolvedBranch>> {
        self.branches.iter().map(|br| self.resolve(br)).collect()
    }

    fn resolve(&self, branch: &Branch) -> Result<ResolvedBranch> {
        let source = self.require_bus(&branch.tap_bus_id)?;
        let target = self.require_bus(&branch.z_bus_id)?;

        let tap = branch.complex_tap();
        if !tap.is_finite() {
            return Err(invalid(branch, format!("tap {tap} is not finite")));
        }
        let tap = if tap.norm() < TAP_EPSILON {
            Complex64::one()
        } else {
            tap
        };

        let y_base = branch.y();
        let y1 = match branch.z1 {
            Some(z) => admittance_of(branch, z)?,
            None => y_base,
        };
        let y2 = match branch.z2 {
            Some(z) => admittance_of(branch, z)?,
            None => y1,
        };
        let b1 = branch.bc1.unwrap_or(branch.bc);
        let b0 = branch.bc0.unwrap_or(b1);

        let zero = match &branch.transformer {
            None => {
                let y0 = match branch.z0 {
                    Some(z) => admittance_of(branch, z)?,
                    None => {
                        let factor = self.defaults.zero_sequence_factor;
                        if !factor.is_finite() || factor <= 0.0 {
                            return Err(invalid(
                                branch,
                                format!("zero-sequence factor {factor} must be positive"),
                            ));
                        }
                        y1 / factor
                    }
                };
                ZeroSequence::Series { y0, b0 }
            }
            Some(meta) => transformer_zero_sequence(branch, meta, y1, b0),
        };

        Ok(ResolvedBranch {
            branch_id: branch.id.clone(),
            source,
            target,
            tap,
            y1,
            y2,
            b1,
            zero,
        })
    }
}

fn invalid(branch: &Branch, reason: String) -> PowerSystemError {
    PowerSystemError::InvalidImpedance {
        element: format!("branch {}", branch.id),
        reason,
    }
}

/// `1/z`, with an exactly zero impedance modelling an open branch.
fn admittance_of(branch: &Branch, z: Complex64) -> Result<Complex64> {
    if !z.is_finite() {
        return Err(invalid(branch, format!("impedance {z} is not finite")));
    }
    if z.norm() < Z_EPSILON {
        return Ok(Complex64::zero());
    }
    Ok(z.inv())
}

fn usable(z: Complex64) -> Option<Complex64> {
    (z.is_finite() && z.norm() >= Z_EPSILON).then_some(z)
}

fn transformer_zero_sequence(
    branch: &Branch,
    meta: &TransformerMeta,
    y1: Complex64,
    b0: f64,
) -> ZeroSequence {
    use WindingConnection::*;

    let y_base = branch.y();
    let z0 = branch
        .z0
        .and_then(usable)
        .or_else(|| (y_base.norm() > 0.0).then(|| y_base.inv()).and_then(usable))
        .or_else(|| branch.z1.and_then(usable))
        .or_else(|| (y1.norm() > 0.0).then(|| y1.inv()).and_then(usable));
    let Some(z0) = z0 else {
        return ZeroSequence::Open;
    };

    let hv = meta.effective_hv();
    let lv = meta.effective_lv();
    match (hv, lv) {
        (WyeGrounded, WyeGrounded) => ZeroSequence::Series { y0: z0.inv(), b0 },
        (Delta, _) | (_, Delta) => {
            let shunt = |side: WindingConnection, xn: f64| {
                (side == WyeGrounded).then(|| (z0 + Complex64::new(0.0, 3.0 * xn)).inv())
            };
            match (shunt(hv, meta.xn_hv_pu), shunt(lv, meta.xn_lv_pu)) {
                (None, None) => ZeroSequence::Open,
                (source, target) => ZeroSequence::GroundedShunts { source, target },
            }
        }
        _ => ZeroSequence::Open,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(re: f64, im: f64) -> Complex64 {
        Complex64::new(re, im)
    }

    fn two_bus() -> NetworkModel {
        let mut net = NetworkModel::default();
        net.add_bus(Bus::slack("B1", 1.0, 0.0)).unwrap();
        net.add_bus(Bus::pq("B2", 0.1, 0.05)).unwrap();
        net.add_branch(Branch::from_z("L12", "B1", "B2", c(0.01, 0.03)).unwrap())
            .unwrap();
        net
    }

    #[test]
    fn test_duplicate_and_missing_bus() {
        let mut net = two_bus();
        assert_eq!(
            net.add_bus(Bus::new("B1")),
            Err(PowerSystemError::DuplicateBus("B1".into()))
        );
        let err = net
            .add_branch(Branch::new("L9", "B1", "B9", c(1.0, -3.0)))
            .unwrap_err();
        assert_eq!(err, PowerSystemError::BusNotFound("B9".into()));
        assert!(net.add_generator(Generator::new("G9", "B9", 0.1, 1.0)).is_err());
    }

    #[test]
    fn test_remove_bus_cascades() {
        let mut net = two_bus();
        net.add_bus(Bus::pq("B3", 0.0, 0.0)).unwrap();
        net.add_branch(Branch::from_z("L23", "B2", "B3", c(0.0, 0.1)).unwrap())
            .unwrap();
        net.add_generator(Generator::new("G2", "B2", 0.1, 1.0)).unwrap();
        net.remove_bus("B2").unwrap();
        assert!(net.branches().is_empty());
        assert!(net.generators().is_empty());
        assert_eq!(net.bus_index("B3"), Some(1));
        assert_eq!(net.bus("B3").unwrap().index, 1);
    }

    #[test]
    fn test_sequence_fallbacks() {
        let net = two_bus();
        let r = &net.resolve_branches().unwrap()[0];
        let y1 = c(0.01, 0.03).inv();
        assert!((r.y1 - y1).norm() < 1e-12);
        assert_eq!(r.y2, r.y1);
        match r.zero {
            ZeroSequence::Series { y0, b0 } => {
                assert!((y0 - y1 / 3.0).norm() < 1e-12);
                assert_eq!(b0, 0.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_configurable_zero_sequence_factor() {
        let net = two_bus().with_defaults(SequenceDefaults {
            zero_sequence_factor: 1.0,
        });
        let r = &net.resolve_branches().unwrap()[0];
        assert_eq!(r.zero, ZeroSequence::Series { y0: r.y1, b0: 0.0 });
    }

    #[test]
    fn test_explicit_zero_impedance_is_open() {
        let mut net = two_bus();
        net.remove_branch("L12");
        let br = Branch::from_z("L12", "B1", "B2", c(0.01, 0.03))
            .unwrap()
            .with_zero_sequence(c(0.0, 0.0), None);
        net.add_branch(br).unwrap();
        let r = &net.resolve_branches().unwrap()[0];
        assert_eq!(r.zero, ZeroSequence::Series { y0: Complex64::zero(), b0: 0.0 });
    }

    #[test]
    fn test_transformer_topologies() {
        use WindingConnection::*;
        let z = c(0.0, 0.1);
        let mut net = two_bus();
        let cases = [
            (WyeGrounded, WyeGrounded, "series"),
            (Delta, WyeGrounded, "shunt-lv"),
            (Delta, Delta, "open"),
            (WyeGrounded, Wye, "open"),
        ];
        for (hv, lv, expect) in cases {
            net.remove_branch("T");
            let meta = TransformerMeta {
                xn_lv_pu: 0.01,
                ..TransformerMeta::new(hv, lv)
            };
            let t = Branch::from_z("T", "B1", "B2", z).unwrap().with_transformer(meta);
            net.add_branch(t).unwrap();
            let resolved = net.resolve_branches().unwrap();
            let r = resolved.iter().find(|r| r.branch_id == "T").unwrap();
            match (expect, r.zero) {
                ("series", ZeroSequence::Series { y0, .. }) => {
                    assert!((y0 - z.inv()).norm() < 1e-12)
                }
                ("shunt-lv", ZeroSequence::GroundedShunts { source, target }) => {
                    assert!(source.is_none());
                    assert!((target.unwrap() - c(0.0, 0.13).inv()).norm() < 1e-9);
                }
                ("open", ZeroSequence::Open) => {}
                (e, got) => panic!("{hv:?}-{lv:?}: expected {e}, got {got:?}"),
            }
        }
    }

    #[test]
    fn test_apply_generators() {
        let mut net = two_bus();
        net.add_bus(Bus::pq("B3", 0.2, 0.0)).unwrap();
        net.add_generator(Generator::new("G3", "B3", 0.4, 1.02).with_q_limits(-0.1, 0.3))
            .unwrap();
        net.apply_generators();
        let b3 = net.bus("B3").unwrap();
        assert_eq!(b3.bus_type, BusType::PV);
        assert_eq!(b3.v, 1.02);
        assert_eq!((b3.q_min, b3.q_max), (-0.1, 0.3));
        net.normalize_injections();
        assert!((net.bus("B3").unwrap().p_sch - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_json_roundtrip_rebuilds_lookup() {
        let net = two_bus();
        let raw = serde_json::to_string(&net).unwrap();
        let back: NetworkModel = serde_json::from_str(&raw).unwrap();
        assert_eq!(back.bus_index("B2"), Some(1));
        assert_eq!(back.branches().len(), 1);
    }
}
