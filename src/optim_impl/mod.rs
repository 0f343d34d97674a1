//! Geometry relaxation algorithm
//!
//! This module contains the quasi-Newton trust-region engine and the pieces
//! it is assembled from: BFGS Hessian updates, trust radius control, the
//! rational function optimization step, polynomial line search and the
//! convergence test.

mod convergence;
mod engine;
mod hessian;
mod line_search;
mod point;
mod rfo;
mod trust;

#[cfg(test)]
mod tests;

pub use convergence::{check_convergence, ConvergenceReport, Criterion};
pub use engine::{Outcome, StepEngine};
pub use hessian::{update_hessian, HessianUpdate};
pub use line_search::{linear_search, Interpolation, LineSearch};
pub use point::PesPoint;
pub use rfo::{quadratic_step, QuadraticStep, StepKind};
pub use trust::{update_trust, TrustUpdate};
