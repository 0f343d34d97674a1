//! Error types for the relaxation engine

use thiserror::Error;

/// Failures that end (or refuse) a relaxation step.
///
/// Reaching the step budget is not an error; it is reported as
/// [`Outcome::Exhausted`](crate::optim_impl::Outcome::Exhausted).
#[derive(Error, Debug)]
pub enum RelaxError {
    /// The BFGS denominators vanished, i.e. there is no curvature along the step.
    #[error("Degenerate Hessian update: dq.dg = {dq_dg:.3e}, dq.H.dq = {dq_h_dq:.3e}")]
    DegenerateUpdate { dq_dg: f64, dq_h_dq: f64 },

    /// The secular equation on the trust sphere could not be solved.
    #[error("Minimization on sphere failed: {0}")]
    RootFindFailure(String),

    /// Mismatched dimensions or non-finite numbers; nothing was mutated.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A decomposition did not produce the requested factors.
    #[error("Linear algebra failure: {0}")]
    Linalg(String),

    /// The run already returned a terminal outcome or failed.
    #[error("Relaxation has already finished")]
    Finished,

    #[error("Debug trace I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Debug trace serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RelaxError {
    /// Input errors are rejected before any state changes, so the run may go on.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RelaxError::InvalidInput(_))
    }
}
