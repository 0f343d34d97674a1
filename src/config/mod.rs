//! Configuration for relaxation runs
//!
//! `RelaxParams` is what the engine consumes. The YAML run file and the
//! command line (`Args`) are merged into it by the driver binary.

mod args;

pub use args::Args;

use crate::error::RelaxError;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Options recognized by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaxParams {
    #[serde(rename = "gradientmax")]
    pub gradient_max: f64,
    #[serde(rename = "gradientrms")]
    pub gradient_rms: f64,
    #[serde(rename = "stepmax")]
    pub step_max: f64,
    #[serde(rename = "steprms")]
    pub step_rms: f64,
    #[serde(rename = "maxsteps")]
    pub max_steps: usize,
    /// Initial trust radius.
    pub trust: f64,
    /// Path of the JSON debug trace; disabled when absent.
    pub debug: Option<PathBuf>,
}

impl Default for RelaxParams {
    fn default() -> Self {
        RelaxParams {
            gradient_max: 0.45e-3,
            gradient_rms: 0.3e-3,
            step_max: 1.8e-3,
            step_rms: 1.2e-3,
            max_steps: 100,
            trust: 0.3,
            debug: None,
        }
    }
}

impl RelaxParams {
    /// Thresholds and the trust radius must be positive and finite.
    pub fn validate(&self) -> Result<(), RelaxError> {
        let positive = [
            ("gradientmax", self.gradient_max),
            ("gradientrms", self.gradient_rms),
            ("stepmax", self.step_max),
            ("steprms", self.step_rms),
            ("trust", self.trust),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(RelaxError::InvalidInput(format!(
                    "{} must be positive and finite, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Coordinate set used by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateSystem {
    #[default]
    Cartesian,
    Distances,
}

/// YAML run file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub geometry: Vec<AtomConfig>,

    #[serde(default)]
    pub optimization: Option<OptimizationParams>,

    #[serde(default)]
    pub coordinates: Option<CoordinateSystem>,
}

/// Atom configuration in the molecular geometry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomConfig {
    /// Element symbol (e.g., "H", "O", "C")
    pub element: String,

    /// Cartesian coordinates [x, y, z]
    pub coords: [f64; 3],
}

/// Optimization block of the run file; every field may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptimizationParams {
    pub gradientmax: Option<f64>,
    pub gradientrms: Option<f64>,
    pub stepmax: Option<f64>,
    pub steprms: Option<f64>,
    pub maxsteps: Option<usize>,
    pub trust: Option<f64>,
    pub debug: Option<PathBuf>,
}

impl OptimizationParams {
    /// Fill missing fields from [`RelaxParams::default`].
    pub fn with_defaults(self) -> RelaxParams {
        let defaults = RelaxParams::default();
        RelaxParams {
            gradient_max: self.gradientmax.unwrap_or(defaults.gradient_max),
            gradient_rms: self.gradientrms.unwrap_or(defaults.gradient_rms),
            step_max: self.stepmax.unwrap_or(defaults.step_max),
            step_rms: self.steprms.unwrap_or(defaults.step_rms),
            max_steps: self.maxsteps.unwrap_or(defaults.max_steps),
            trust: self.trust.unwrap_or(defaults.trust),
            debug: self.debug.or(defaults.debug),
        }
    }
}

impl Config {
    /// Engine parameters from the run file, overridden by the command line.
    pub fn relax_params(&self, args: &Args) -> RelaxParams {
        let mut params = self.optimization.clone().unwrap_or_default().with_defaults();
        if let Some(maxsteps) = args.maxsteps {
            params.max_steps = maxsteps;
        }
        if let Some(trust) = args.trust {
            params.trust = trust;
        }
        if let Some(ref debug) = args.debug {
            params.debug = Some(debug.clone());
        }
        params
    }

    pub fn coordinate_system(&self, args: &Args) -> CoordinateSystem {
        args.coordinates.or(self.coordinates).unwrap_or_default()
    }
}
