//! Convergence criteria on gradient and step

use crate::config::RelaxParams;
use crate::math::{max_abs, rms};
use nalgebra::DVector;

/// One line of the convergence table.
#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub name: &'static str,
    /// Measured value and threshold; absent for the fixed on-sphere criterion.
    pub value: Option<f64>,
    pub threshold: Option<f64>,
    pub passed: bool,
}

impl Criterion {
    fn below(name: &'static str, value: f64, threshold: f64) -> Self {
        Criterion {
            name,
            value: Some(value),
            threshold: Some(threshold),
            passed: value < threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceReport {
    pub criteria: Vec<Criterion>,
}

impl ConvergenceReport {
    pub fn converged(&self) -> bool {
        self.criteria.iter().all(|c| c.passed)
    }
}

/// Evaluate the convergence criteria in order: gradient RMS and maximum,
/// then either step RMS and maximum or, for a step constrained to the trust
/// sphere, a criterion that never passes.
pub fn check_convergence(
    gradient: &DVector<f64>,
    step: &DVector<f64>,
    on_sphere: bool,
    params: &RelaxParams,
) -> ConvergenceReport {
    let mut criteria = vec![
        Criterion::below("Gradient RMS", rms(gradient.as_slice()), params.gradient_rms),
        Criterion::below("Gradient maximum", max_abs(gradient.as_slice()), params.gradient_max),
    ];
    if on_sphere {
        criteria.push(Criterion {
            name: "Minimization on sphere",
            value: None,
            threshold: None,
            passed: false,
        });
    } else {
        criteria.push(Criterion::below("Step RMS", rms(step.as_slice()), params.step_rms));
        criteria.push(Criterion::below("Step maximum", max_abs(step.as_slice()), params.step_max));
    }
    ConvergenceReport { criteria }
}
