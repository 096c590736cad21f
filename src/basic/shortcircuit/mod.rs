//! Short-circuit studies by symmetrical components.
//!
//! The three sequence networks are inverted once per [`ShortCircuitSolver`];
//! each [`FaultSpec`] then costs one 3×3 solve plus a pass over the buses.

pub mod fault;
pub mod result;
pub mod sequence;
mod solver;

pub use fault::{FaultPhase, FaultSpec, FaultType};
pub use result::{BusFaultResult, FaultStudyResult};
pub use solver::{ShortCircuitSolver, SourceAugmentation, TheveninSource, run_fault_study};
