//! The relaxation driver: one call per (energy, gradient) evaluation

use super::convergence::check_convergence;
use super::hessian::update_hessian;
use super::line_search::linear_search;
use super::point::PesPoint;
use super::rfo::quadratic_step;
use super::trust::update_trust;
use crate::config::RelaxParams;
use crate::coords::CoordinateAdapter;
use crate::error::RelaxError;
use crate::geometry::Geometry;
use crate::math::{max_abs, pinv, rms};
use crate::observer::{RelaxObserver, TracingObserver};
use crate::trace::{IterationSnapshot, JsonTraceFile, TraceSink};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

/// Curvature given to directions outside the range of the B-matrix so the
/// quadratic step never moves along them.
const NULL_SPACE_STIFFNESS: f64 = 1000.0;

/// What the driver should do after a step.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// Evaluate this geometry and call [`StepEngine::step`] again.
    Continue(Geometry),
    Converged(Geometry),
    /// The step budget ran out; the geometry is the last one evaluated.
    Exhausted(Geometry),
}

impl Outcome {
    pub fn geometry(&self) -> &Geometry {
        match self {
            Outcome::Continue(g) | Outcome::Converged(g) | Outcome::Exhausted(g) => g,
        }
    }

    pub fn into_geometry(self) -> Geometry {
        match self {
            Outcome::Continue(g) | Outcome::Converged(g) | Outcome::Exhausted(g) => g,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Continue(_))
    }
}

/// Points kept between iterations.
#[derive(Debug, Clone)]
struct History {
    best: PesPoint,
    previous: PesPoint,
    predicted: PesPoint,
    interpolated: PesPoint,
}

/// Everything one iteration changes, applied only once it fully succeeded.
struct Transition {
    hessian: DMatrix<f64>,
    trust: f64,
    geom: Geometry,
    history: History,
    converged: bool,
}

/// Quasi-Newton trust-region relaxation in the coordinates of `A`.
///
/// The engine never evaluates energies. The caller evaluates the current
/// geometry, hands the result to [`step`](Self::step) and receives the next
/// geometry to evaluate or a terminal outcome.
pub struct StepEngine<A: CoordinateAdapter> {
    coords: A,
    params: RelaxParams,
    geom: Geometry,
    hessian: DMatrix<f64>,
    weights: DVector<f64>,
    trust: f64,
    nsteps: usize,
    history: Option<History>,
    finished: bool,
    observer: Box<dyn RelaxObserver>,
    trace: Option<Box<dyn TraceSink>>,
}

impl<A: CoordinateAdapter> StepEngine<A> {
    /// Set up a run starting from `geom`.
    ///
    /// When `params.debug` names a file, a [`JsonTraceFile`] is attached.
    pub fn new(geom: Geometry, coords: A, params: RelaxParams) -> Result<Self, RelaxError> {
        params.validate()?;
        if geom.is_empty() || coords.is_empty() {
            return Err(RelaxError::InvalidInput(
                "cannot relax without atoms or coordinates".to_string(),
            ));
        }
        let n = coords.len();
        let b = coords.b_matrix(&geom);
        if b.shape() != (n, geom.dof()) {
            return Err(RelaxError::InvalidInput(format!(
                "B-matrix is {}x{}, expected {}x{}",
                b.nrows(),
                b.ncols(),
                n,
                geom.dof()
            )));
        }
        // coincident atoms leave undefined directions in the B-matrix
        if b.iter().any(|x| !x.is_finite()) {
            return Err(RelaxError::InvalidInput(
                "B-matrix has non-finite entries; check for overlapping atoms".to_string(),
            ));
        }

        let hessian = coords.hessian_guess(&geom);
        if hessian.shape() != (n, n) {
            return Err(RelaxError::InvalidInput(format!(
                "Hessian guess is {}x{}, expected {}x{}",
                hessian.nrows(),
                hessian.ncols(),
                n,
                n
            )));
        }
        let weights = coords.weights(&geom);
        if weights.len() != n {
            return Err(RelaxError::InvalidInput(format!(
                "{} weights for {} coordinates",
                weights.len(),
                n
            )));
        }
        let q = coords.eval_geom(&geom);
        if q.len() != n {
            return Err(RelaxError::InvalidInput(format!(
                "coordinate set evaluates to {} values, expected {}",
                q.len(),
                n
            )));
        }
        let trace = params
            .debug
            .as_ref()
            .map(|path| Box::new(JsonTraceFile::new(path)) as Box<dyn TraceSink>);

        Ok(StepEngine {
            coords,
            trust: params.trust,
            params,
            geom,
            hessian,
            weights,
            nsteps: 0,
            history: None,
            finished: false,
            observer: Box::new(TracingObserver),
            trace,
        })
    }

    pub fn with_observer<O: RelaxObserver + 'static>(mut self, observer: O) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Replace the trace sink, including one created from `params.debug`.
    pub fn with_trace<T: TraceSink + 'static>(mut self, trace: T) -> Self {
        self.trace = Some(Box::new(trace));
        self
    }

    /// Geometry the engine currently expects an evaluation for.
    pub fn geometry(&self) -> &Geometry {
        &self.geom
    }

    pub fn trust(&self) -> f64 {
        self.trust
    }

    pub fn hessian(&self) -> &DMatrix<f64> {
        &self.hessian
    }

    /// Number of completed calls to [`step`](Self::step).
    pub fn iteration(&self) -> usize {
        self.nsteps
    }

    pub fn params(&self) -> &RelaxParams {
        &self.params
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Consume the evaluation of [`geometry`](Self::geometry).
    ///
    /// `gradient` is the Cartesian gradient flattened as `[x0, y0, z0, ...]`.
    /// Invalid input is rejected without touching the state. Any other error
    /// ends the run, as does a terminal outcome; later calls then fail with
    /// [`RelaxError::Finished`].
    pub fn step(&mut self, energy: f64, gradient: &DVector<f64>) -> Result<Outcome, RelaxError> {
        if self.finished {
            return Err(RelaxError::Finished);
        }

        let nstep = self.nsteps + 1;
        if nstep > self.params.max_steps {
            self.nsteps = nstep;
            self.finished = true;
            self.observer.on_exhausted(self.params.max_steps);
            return Ok(Outcome::Exhausted(self.geom.clone()));
        }

        self.check_input(energy, gradient)?;

        match self.advance(nstep, energy, gradient) {
            Ok(transition) => Ok(self.commit(nstep, transition)),
            Err(err) => {
                if !err.is_recoverable() {
                    self.finished = true;
                }
                Err(err)
            }
        }
    }

    fn check_input(&self, energy: f64, gradient: &DVector<f64>) -> Result<(), RelaxError> {
        if gradient.len() != self.geom.dof() {
            return Err(RelaxError::InvalidInput(format!(
                "gradient has {} components, geometry has {} degrees of freedom",
                gradient.len(),
                self.geom.dof()
            )));
        }
        if !energy.is_finite() {
            return Err(RelaxError::InvalidInput(format!("energy is {}", energy)));
        }
        if gradient.iter().any(|x| !x.is_finite()) {
            return Err(RelaxError::InvalidInput(
                "gradient contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }

    /// Compute one iteration without committing it.
    fn advance(
        &mut self,
        nstep: usize,
        energy: f64,
        gradient: &DVector<f64>,
    ) -> Result<Transition, RelaxError> {
        if nstep == 1 {
            self.observer.on_coordinates(&self.coords.describe());
        }
        self.observer.on_energy(nstep, energy);

        let b = self.coords.b_matrix(&self.geom);
        let b_inv = pinv(&b)?;
        let current = PesPoint::evaluated(
            self.coords.eval_geom(&self.geom),
            energy,
            b_inv.transpose() * gradient,
        );

        let mut hessian = self.hessian.clone();
        let mut trust = self.trust;
        let interpolated = match &self.history {
            None => current.clone(),
            Some(history) => {
                let best_g = history.best.gradient()?;
                let current_g = current.gradient()?;

                let update = update_hessian(&mut hessian, &(&current.q - &history.best.q), &(current_g - best_g))?;
                self.observer.on_hessian_update(update.change_rms, update.change_max);

                let trust_update = update_trust(
                    trust,
                    current.energy()? - history.previous.energy()?,
                    history.predicted.energy()? - history.interpolated.energy()?,
                    &(&history.predicted.q - &history.interpolated.q),
                );
                trust = trust_update.trust;
                self.observer.on_trust_update(trust_update.ratio, trust_update.trust);

                let dq = &history.best.q - &current.q;
                let search = linear_search(
                    current.energy()?,
                    history.best.energy()?,
                    current_g.dot(&dq),
                    best_g.dot(&dq),
                );
                self.observer.on_line_search(&search);

                let t = search.t;
                PesPoint::evaluated(
                    &current.q + &dq * t,
                    search.energy,
                    best_g * t + current_g * (1.0 - t),
                )
            }
        };

        let proj = &b * &b_inv;
        let n = proj.nrows();
        let h_proj = &proj * &hessian * &proj + (DMatrix::<f64>::identity(n, n) - &proj) * NULL_SPACE_STIFFNESS;
        let g_proj = &proj * interpolated.gradient()?;

        let step = quadratic_step(&g_proj, &h_proj, &self.weights, trust)?;
        self.observer.on_quadratic_step(&step);

        let predicted = PesPoint::predicted(&interpolated.q + &step.dq, interpolated.energy()? + step.de);
        let dq = &predicted.q - &current.q;

        let mut geom = self.geom.clone();
        let q_future = self.coords.update_geom(&mut geom, &current.q, &dq, &b_inv)?;
        self.observer.on_total_step(rms(dq.as_slice()), max_abs(dq.as_slice()));
        debug!("Realized step differs by {:.3e} (RMS)", rms((&q_future - &predicted.q).as_slice()));

        if let Some(trace) = self.trace.as_mut() {
            trace.record(&IterationSnapshot::new(
                nstep,
                trust,
                &hessian,
                gradient,
                &geom.coords,
                energy,
                &current.q,
                &dq,
            ))?;
        }

        let report = check_convergence(gradient, &(&q_future - &current.q), step.on_sphere, &self.params);
        self.observer.on_convergence(&report);

        let best = match &self.history {
            Some(history) if energy >= history.best.energy()? => history.best.clone(),
            _ => current.clone(),
        };

        Ok(Transition {
            hessian,
            trust,
            geom,
            history: History {
                best,
                previous: current,
                predicted,
                interpolated,
            },
            converged: report.converged(),
        })
    }

    fn commit(&mut self, nstep: usize, transition: Transition) -> Outcome {
        self.nsteps = nstep;
        self.hessian = transition.hessian;
        self.trust = transition.trust;
        self.history = Some(transition.history);
        self.geom = transition.geom;

        if transition.converged {
            self.finished = true;
            Outcome::Converged(self.geom.clone())
        } else {
            Outcome::Continue(self.geom.clone())
        }
    }
}
