//! Input/Output for the relaxation driver
//!
//! This module handles logging setup, the final geometry report and the
//! JSON-lines exchange with the external evaluator.

mod output;
mod protocol;

pub use output::{print_optimized_geometry, setup_output};
pub use protocol::{JsonLines, Status};
