use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::basic::error::Result;
use crate::basic::network::NetworkModel;

/// Complex power through one branch, measured at both ends (pu).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BranchFlow {
    pub branch_id: String,
    pub from_bus: String,
    pub to_bus: String,
    /// Power entering the branch at the tap bus.
    pub s_from: Complex64,
    /// Power entering the branch at the z bus.
    pub s_to: Complex64,
}

impl BranchFlow {
    pub fn loss(&self) -> Complex64 {
        self.s_from + self.s_to
    }
}

/// Positive-sequence branch flows at the voltages currently stored on the buses.
pub fn branch_flows(net: &NetworkModel) -> Result<Vec<BranchFlow>> {
    let buses = net.buses();
    net.resolve_branches()?
        .into_iter()
        .map(|br| {
            let (from, to) = (&buses[br.source], &buses[br.target]);
            let (vs, vt) = (from.voltage(), to.voltage());
            let charging = Complex64::new(0.0, br.b1 / 2.0);
            let is = (br.y1 + charging) / br.tap.norm_sqr() * vs - br.y1 / br.tap.conj() * vt;
            let it = (br.y1 + charging) * vt - br.y1 / br.tap * vs;
            Ok(BranchFlow {
                branch_id: br.branch_id,
                from_bus: from.id.clone(),
                to_bus: to.id.clone(),
                s_from: vs * is.conj(),
                s_to: vt * it.conj(),
            })
        })
        .collect()
}
