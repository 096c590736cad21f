//! Bus admittance matrices: the stamping primitive and the per-sequence builder.
pub mod admittance;
pub mod ybus;

pub use admittance::{AdmittanceMatrix, InversionMethod};
pub use ybus::{Sequence, build_sequence_admittance};
