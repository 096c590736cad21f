use nalgebra::DMatrix;
use num_complex::Complex64;
use tracing::info;

use super::PfState;
use super::calculator::calc_q;
use crate::basic::elements::BusType;

/// Reactive limit a switched PV bus is held at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QPin {
    Min,
    Max,
}

impl QPin {
    /// A bus held at `q_max` sags below its set-point; once its voltage climbs
    /// back above it the generator no longer needs the full limit. Mirrored
    /// for `q_min`.
    fn released_by(self, v: f64, v_set: f64) -> bool {
        match self {
            Self::Max => v > v_set,
            Self::Min => v < v_set,
        }
    }
}

/// Bus positions whose type changed in one pass.
#[derive(Debug, Default, PartialEq)]
pub(super) struct Reclassification {
    pub to_pq: Vec<usize>,
    pub to_pv: Vec<usize>,
}

impl Reclassification {
    pub fn is_empty(&self) -> bool {
        self.to_pq.is_empty() && self.to_pv.is_empty()
    }
}

/// Checks the reactive output of every PV bus against its generator limits.
///
/// The generator output implied by the current state is `Q_calc + q_load`. A PV
/// bus outside `[q_min, q_max]` is switched to PQ with its net schedule pinned
/// at `limit - q_load`. A bus switched earlier returns to PV at its original
/// set-point once its voltage crosses back over it; each bus returns at most
/// once per solve. The caller must rebuild its unknown index when the result
/// is not empty.
pub(super) fn enforce_q_limits(y: &DMatrix<Complex64>, state: &mut PfState) -> Reclassification {
    let mut changes = Reclassification::default();
    for i in 0..state.types.len() {
        match (state.types[i], state.pinned[i]) {
            (BusType::PQ, Some(pin)) if !state.restored[i] => {
                if pin.released_by(state.v[i], state.v_set[i]) {
                    info!(
                        bus = %state.ids[i],
                        v = state.v[i],
                        v_set = state.v_set[i],
                        "voltage back across set-point, returning bus to PV"
                    );
                    state.types[i] = BusType::PV;
                    state.v[i] = state.v_set[i];
                    state.q_sch[i] = state.q_sch_set[i];
                    state.pinned[i] = None;
                    state.restored[i] = true;
                    changes.to_pv.push(i);
                }
            }
            (BusType::PV, _) => {
                let q_gen = calc_q(y, &state.v, &state.theta, i) + state.q_load[i];
                let lim = state.q_lim[i];
                let Some(limit) = lim.violated_by(q_gen) else {
                    continue;
                };
                info!(
                    bus = %state.ids[i],
                    q_gen,
                    limit,
                    "reactive limit violated, switching PV bus to PQ"
                );
                state.types[i] = BusType::PQ;
                state.q_sch[i] = limit - state.q_load[i];
                state.pinned[i] = Some(if q_gen > lim.max { QPin::Max } else { QPin::Min });
                changes.to_pq.push(i);
            }
            _ => {}
        }
    }
    changes
}
