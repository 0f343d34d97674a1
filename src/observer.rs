//! Diagnostic events emitted while relaxing

use crate::math::{max_abs, rms};
use crate::optim_impl::{ConvergenceReport, Interpolation, LineSearch, QuadraticStep, StepKind};
use tracing::{debug, info};

/// Receives the narrative of a relaxation run.
///
/// Every method has an empty default, so an observer only implements the
/// events it cares about.
pub trait RelaxObserver {
    /// Called once with the description of the coordinate set.
    fn on_coordinates(&mut self, _description: &str) {}

    fn on_energy(&mut self, _iteration: usize, _energy: f64) {}

    fn on_hessian_update(&mut self, _change_rms: f64, _change_max: f64) {}

    fn on_trust_update(&mut self, _ratio: f64, _trust: f64) {}

    fn on_line_search(&mut self, _search: &LineSearch) {}

    fn on_quadratic_step(&mut self, _step: &QuadraticStep) {}

    fn on_total_step(&mut self, _step_rms: f64, _step_max: f64) {}

    fn on_convergence(&mut self, _report: &ConvergenceReport) {}

    fn on_exhausted(&mut self, _max_steps: usize) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl RelaxObserver for NullObserver {}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RelaxObserver for TracingObserver {
    fn on_coordinates(&mut self, description: &str) {
        for line in description.lines() {
            info!("{}", line);
        }
    }

    fn on_energy(&mut self, iteration: usize, energy: f64) {
        info!("Step {}", iteration);
        info!("Energy: {:.12}", energy);
    }

    fn on_hessian_update(&mut self, change_rms: f64, change_max: f64) {
        info!("Hessian update information:");
        info!("* Change: RMS: {:.3e}, max: {:.3e}", change_rms, change_max);
    }

    fn on_trust_update(&mut self, ratio: f64, trust: f64) {
        info!("Trust update: Fletcher's parameter: {:.3}", ratio);
        info!("* New trust radius: {:.3}", trust);
    }

    fn on_line_search(&mut self, search: &LineSearch) {
        info!("Line search:");
        info!("* Energies: {:.8}, {:.8}", search.e0, search.e1);
        info!("* Derivatives: {:.3e}, {:.3e}", search.g0, search.g1);
        match search.kind {
            Interpolation::Quartic => info!(
                "* Fitted quartic: t = {:.3}, E = {:.8}",
                search.t, search.energy
            ),
            Interpolation::Cubic => info!(
                "* Fitted cubic: t = {:.3}, E = {:.8}",
                search.t, search.energy
            ),
            Interpolation::StayAtNew => info!("* Polynomial fits failed, staying at new point"),
            Interpolation::ReturnToBest => info!("* Polynomial fits failed, returning to best point"),
        }
    }

    fn on_quadratic_step(&mut self, step: &QuadraticStep) {
        info!("Quadratic step:");
        info!("* Trust radius: {:.3}", step.trust);
        info!("* Number of negative eigenvalues: {}", step.negative_eigenvalues);
        info!("* Lowest eigenvalue: {:.4}", step.lowest_eigenvalue);
        match step.kind {
            StepKind::PureRfo => info!("* lambda: {:.4}", step.lambda),
            StepKind::OnSphere => {
                info!("* Pure RFO step was outside of trust radius");
                info!("* Minimization on sphere, lambda: {:.4}", step.lambda);
            }
        }
        info!(
            "* Step: RMS: {:.3}, max: {:.3}",
            rms(step.dq.as_slice()),
            max_abs(step.dq.as_slice())
        );
        info!("* Predicted energy change: {:.4e}", step.de);
    }

    fn on_total_step(&mut self, step_rms: f64, step_max: f64) {
        info!("Total step: RMS: {:.3}, max: {:.3}", step_rms, step_max);
    }

    fn on_convergence(&mut self, report: &ConvergenceReport) {
        info!("Convergence criteria:");
        for criterion in &report.criteria {
            let verdict = if criterion.passed { "OK" } else { "no" };
            match (criterion.value, criterion.threshold) {
                (Some(value), Some(threshold)) => info!(
                    "* {}: {:.2e} < {:.2e} => {}",
                    criterion.name, value, threshold, verdict
                ),
                _ => info!("* {} => {}", criterion.name, verdict),
            }
        }
        if report.converged() {
            info!("* All criteria matched");
        } else {
            debug!("* Not converged yet");
        }
    }

    fn on_exhausted(&mut self, max_steps: usize) {
        info!("Maximum number of steps ({}) reached", max_steps);
    }
}
