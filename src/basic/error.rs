//! Error type shared by the network model, the power flow and the short-circuit engine.

use thiserror::Error;

/// Errors raised by the engine.
///
/// Configuration variants are raised before any numeric work starts.
/// Numeric variants carry enough context (bus, iteration, mismatch) to be
/// reported to the user verbatim.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PowerSystemError {
    /// A winding connection string could not be parsed.
    #[error("invalid winding connection `{0}` (expected D, Y or Yg)")]
    InvalidWinding(String),
    /// A fault type string could not be parsed.
    #[error("unknown fault type `{0}`")]
    UnknownFaultType(String),
    /// A phase selector is unknown or does not fit the fault type.
    #[error("unknown fault phase `{0}`")]
    UnknownFaultPhase(String),
    /// A bus id is referenced but not part of the network.
    #[error("bus `{0}` not found")]
    BusNotFound(String),
    /// A source needs the slack bus but the network has none.
    #[error("no slack bus to attach the {0} to")]
    MissingSlack(String),
    /// A bus id was registered twice.
    #[error("bus `{0}` already exists")]
    DuplicateBus(String),
    /// An impedance value is zero, non-finite or otherwise unusable.
    #[error("invalid impedance for {element}: {reason}")]
    InvalidImpedance { element: String, reason: String },
    /// Matrix inversion failed even after regularization.
    #[error("singular matrix: {0}")]
    SingularMatrix(String),
    /// Matrices or voltage profiles handed to an engine disagree in size.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    /// The sparse linear solver rejected the Jacobian.
    #[error("linear solve failed: {0}")]
    LinearSolve(String),
    /// No damped Newton step reduced the mismatch.
    #[error("step damping could not reduce mismatch {mismatch:.3e} at iteration {iteration}")]
    StepDampingFailed { iteration: usize, mismatch: f64 },
    /// The iteration limit was reached.
    #[error("power flow did not converge after {iterations} iterations (mismatch {mismatch:.3e})")]
    NotConverged { iterations: usize, mismatch: f64 },
}

pub type Result<T> = std::result::Result<T, PowerSystemError>;
