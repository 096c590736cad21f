//! Sequence-network modelling, Newton-Raphson power flow and symmetrical-component
//! short-circuit studies.
//!
//! ```no_run
//! use num_complex::Complex64;
//! use rustfault::prelude::*;
//!
//! # fn main() -> rustfault::prelude::Result<()> {
//! let mut net = NetworkModel::default();
//! net.add_bus(Bus::slack("B1", 1.0, 0.0))?;
//! net.add_bus(Bus::pq("B2", 0.1, 0.05))?;
//! net.add_branch(Branch::from_z("L12", "B1", "B2", Complex64::new(0.01, 0.03))?)?;
//! solve_power_flow(&mut net, &PowerFlowOptions::default())?;
//!
//! let source = SourceAugmentation::with_thevenin(TheveninSource::new(Complex64::new(0.0, 0.25)));
//! let fault = run_fault_study(&net, &FaultSpec::new("B2", FaultType::ThreePhase), &source)?;
//! println!("{}", fault.table());
//! # Ok(())
//! # }
//! ```
mod basic;

pub mod prelude {
    use crate::basic;
    pub use basic::*;

    pub use basic::elements::*;
    pub use basic::error::{PowerSystemError, Result};
    pub use basic::network::{NetworkModel, SequenceDefaults};
    pub use basic::post_processing::PostProcessing;
    pub use basic::powerflow::{
        BranchFlow, PowerFlowOptions, PowerFlowReport, branch_flows, solve_power_flow,
        solve_power_flow_with,
    };
    pub use basic::shortcircuit::{
        BusFaultResult, FaultPhase, FaultSpec, FaultStudyResult, FaultType, ShortCircuitSolver,
        SourceAugmentation, TheveninSource, run_fault_study,
    };
    pub use basic::solver::{DefaultSolver, Solve};
    pub use basic::system::{AdmittanceMatrix, InversionMethod, Sequence, build_sequence_admittance};
}
