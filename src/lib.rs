//! Quasi-Newton geometry relaxation
//!
//! A [`StepEngine`] consumes (energy, gradient) evaluations produced
//! elsewhere and proposes the next geometry to evaluate, until the
//! convergence criteria are met or the step budget runs out.

pub mod config;
pub mod coords;
pub mod error;
pub mod geometry;
pub mod math;
pub mod observer;
pub mod optim_impl;
pub mod trace;

pub use config::RelaxParams;
pub use coords::{CartesianCoords, CoordinateAdapter, PairDistances};
pub use error::RelaxError;
pub use geometry::Geometry;
pub use observer::{NullObserver, RelaxObserver, TracingObserver};
pub use optim_impl::{Outcome, StepEngine};
pub use trace::{IterationSnapshot, JsonTraceFile, TraceSink};
