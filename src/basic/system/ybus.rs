use derive_more::Display;
use num_complex::Complex64;
use num_traits::Zero;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::admittance::AdmittanceMatrix;
use crate::basic::error::Result;
use crate::basic::network::{NetworkModel, ZeroSequence};

/// Symmetrical-component sequence network.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sequence {
    #[display("positive")]
    Positive,
    #[display("negative")]
    Negative,
    #[display("zero")]
    Zero,
}

impl Sequence {
    pub const ALL: [Sequence; 3] = [Sequence::Positive, Sequence::Negative, Sequence::Zero];
}

/// Builds the bus admittance matrix of one sequence network.
///
/// Buses are registered in model order, so matrix index `i` is the model's bus
/// at position `i`. Bus shunts enter every sequence. Branch charging uses `b1`
/// in the positive and negative networks and `b0` in the zero network.
/// Transformer zero-sequence coupling follows the winding connections resolved
/// by [`NetworkModel::resolve_branches`].
pub fn build_sequence_admittance(net: &NetworkModel, seq: Sequence) -> Result<AdmittanceMatrix> {
    let branches = net.resolve_branches()?;
    let mut y = AdmittanceMatrix::new();
    for bus in net.buses() {
        let idx = y.add_bus(bus.id.as_str());
        let shunt = bus.shunt();
        if shunt != Complex64::zero() {
            y.add_shunt(idx, shunt);
        }
    }

    for br in &branches {
        match seq {
            Sequence::Positive => y.connect_bus_to_bus(br.y1, br.source, br.target, br.b1, br.tap),
            Sequence::Negative => y.connect_bus_to_bus(br.y2, br.source, br.target, br.b1, br.tap),
            Sequence::Zero => match br.zero {
                ZeroSequence::Series { y0, b0 } => {
                    y.connect_bus_to_bus(y0, br.source, br.target, b0, br.tap)
                }
                ZeroSequence::GroundedShunts { source, target } => {
                    if let Some(ys) = source {
                        y.add_shunt(br.source, ys);
                    }
                    if let Some(yt) = target {
                        y.add_shunt(br.target, yt);
                    }
                }
                ZeroSequence::Open => {}
            },
        }
    }
    debug!(sequence = %seq, buses = y.size(), branches = branches.len(), "built admittance matrix");
    Ok(y)
}
