//! Tests for the relaxation engine

use super::{ConvergenceReport, LineSearch, Outcome, StepEngine};
use crate::config::RelaxParams;
use crate::coords::CoordinateAdapter;
use crate::error::RelaxError;
use crate::geometry::Geometry;
use crate::observer::RelaxObserver;
use crate::trace::{IterationSnapshot, TraceSink};
use approx::assert_abs_diff_eq;
use nalgebra::{DMatrix, DVector, Vector3};
use std::cell::RefCell;
use std::rc::Rc;

// Mock coordinate set: the single coordinate is the x position of atom 0
struct XCoordinate {
    force_constant: f64,
}

impl CoordinateAdapter for XCoordinate {
    fn len(&self) -> usize {
        1
    }

    fn hessian_guess(&self, _geom: &Geometry) -> DMatrix<f64> {
        DMatrix::from_element(1, 1, self.force_constant)
    }

    fn weights(&self, _geom: &Geometry) -> DVector<f64> {
        DVector::from_element(1, 1.0)
    }

    fn b_matrix(&self, geom: &Geometry) -> DMatrix<f64> {
        let mut b = DMatrix::zeros(1, geom.dof());
        b[(0, 0)] = 1.0;
        b
    }

    fn eval_geom(&self, geom: &Geometry) -> DVector<f64> {
        DVector::from_element(1, geom.coords[0].x)
    }

    fn describe(&self) -> String {
        "x of atom 0".to_string()
    }
}

fn atom_at(x: f64) -> Geometry {
    Geometry::from_symbols(&["He"], vec![Vector3::new(x, 0.0, 0.0)]).unwrap()
}

/// Energy and gradient of `k x^2 / 2`.
fn harmonic(geom: &Geometry, k: f64) -> (f64, DVector<f64>) {
    let x = geom.coords[0].x;
    (0.5 * k * x * x, DVector::from_vec(vec![k * x, 0.0, 0.0]))
}

fn loose_params() -> RelaxParams {
    RelaxParams {
        gradient_max: 0.1,
        gradient_rms: 0.1,
        step_max: 0.1,
        step_rms: 0.1,
        ..RelaxParams::default()
    }
}

fn engine(x: f64, guess: f64, params: RelaxParams) -> StepEngine<XCoordinate> {
    StepEngine::new(atom_at(x), XCoordinate { force_constant: guess }, params)
        .unwrap()
        .with_observer(crate::observer::NullObserver)
}

#[derive(Default)]
struct Events {
    coordinates: usize,
    energies: Vec<(usize, f64)>,
    hessian_updates: usize,
    trust_updates: Vec<(f64, f64)>,
    line_searches: Vec<LineSearch>,
    quadratic_steps: usize,
    convergence: Vec<bool>,
    exhausted: Option<usize>,
}

#[derive(Clone, Default)]
struct Recorder(Rc<RefCell<Events>>);

impl RelaxObserver for Recorder {
    fn on_coordinates(&mut self, _description: &str) {
        self.0.borrow_mut().coordinates += 1;
    }

    fn on_energy(&mut self, iteration: usize, energy: f64) {
        self.0.borrow_mut().energies.push((iteration, energy));
    }

    fn on_hessian_update(&mut self, _change_rms: f64, _change_max: f64) {
        self.0.borrow_mut().hessian_updates += 1;
    }

    fn on_trust_update(&mut self, ratio: f64, trust: f64) {
        self.0.borrow_mut().trust_updates.push((ratio, trust));
    }

    fn on_line_search(&mut self, search: &LineSearch) {
        self.0.borrow_mut().line_searches.push(*search);
    }

    fn on_quadratic_step(&mut self, _step: &super::QuadraticStep) {
        self.0.borrow_mut().quadratic_steps += 1;
    }

    fn on_convergence(&mut self, report: &ConvergenceReport) {
        self.0.borrow_mut().convergence.push(report.converged());
    }

    fn on_exhausted(&mut self, max_steps: usize) {
        self.0.borrow_mut().exhausted = Some(max_steps);
    }
}

#[derive(Clone, Default)]
struct MemoryTrace(Rc<RefCell<Vec<IterationSnapshot>>>);

impl TraceSink for MemoryTrace {
    fn record(&mut self, snapshot: &IterationSnapshot) -> Result<(), RelaxError> {
        self.0.borrow_mut().push(snapshot.clone());
        Ok(())
    }
}

struct BrokenTrace;

impl TraceSink for BrokenTrace {
    fn record(&mut self, _snapshot: &IterationSnapshot) -> Result<(), RelaxError> {
        Err(RelaxError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only trace",
        )))
    }
}

#[test]
fn test_quadratic_converges_in_one_iteration() {
    let mut engine = engine(0.05, 1.0, loose_params());
    let (e, g) = harmonic(engine.geometry(), 1.0);

    let outcome = engine.step(e, &g).unwrap();
    assert!(matches!(outcome, Outcome::Converged(_)));
    assert!(outcome.geometry().coords[0].x.abs() < 1e-3);
    assert_eq!(engine.iteration(), 1);
    assert!(engine.is_finished());
}

#[test]
fn test_single_step_budget_exhausts() {
    let params = RelaxParams {
        max_steps: 1,
        ..RelaxParams::default()
    };
    let mut engine = engine(0.5, 1.0, params);

    let (e, g) = harmonic(engine.geometry(), 1.0);
    let first = engine.step(e, &g).unwrap();
    let Outcome::Continue(next) = first else {
        panic!("expected Continue, got {:?}", first);
    };
    // the step is pinned to the trust sphere
    assert_abs_diff_eq!(next.coords[0].x, 0.2, epsilon = 1e-6);

    let (e, g) = harmonic(&next, 1.0);
    let second = engine.step(e, &g).unwrap();
    assert!(matches!(second, Outcome::Exhausted(_)));
    assert_abs_diff_eq!(second.geometry().coords[0].x, next.coords[0].x);

    assert!(matches!(engine.step(e, &g), Err(RelaxError::Finished)));
}

#[test]
fn test_second_step_updates_hessian_and_trust() {
    let events = Recorder::default();
    let mut engine = StepEngine::new(atom_at(0.1), XCoordinate { force_constant: 1.0 }, RelaxParams::default())
        .unwrap()
        .with_observer(events.clone());

    let (e, g) = harmonic(engine.geometry(), 2.0);
    let outcome = engine.step(e, &g).unwrap();
    assert!(!outcome.is_terminal());

    let lambda = (1.0 - (1.0 + 4.0 * 0.04_f64).sqrt()) / 2.0;
    let first_step = -0.2 / (1.0 - lambda);
    assert_abs_diff_eq!(outcome.geometry().coords[0].x, 0.1 + first_step, epsilon = 1e-10);
    assert_eq!(engine.trust(), 0.3);

    let (e, g) = harmonic(outcome.geometry(), 2.0);
    engine.step(e, &g).unwrap();

    // one-dimensional BFGS reproduces the exact curvature
    assert_abs_diff_eq!(engine.hessian()[(0, 0)], 2.0, epsilon = 1e-10);
    // poor prediction: shrink to a quarter of the previous step
    assert_abs_diff_eq!(engine.trust(), first_step.abs() / 4.0, epsilon = 1e-10);

    let events = events.0.borrow();
    assert_eq!(events.coordinates, 1);
    assert_eq!(events.energies.len(), 2);
    assert_eq!(events.energies[1].0, 2);
    assert_eq!(events.hessian_updates, 1);
    assert_eq!(events.trust_updates.len(), 1);
    assert!(events.trust_updates[0].0 < 0.25);
    assert_eq!(events.line_searches.len(), 1);
    assert_eq!(events.quadratic_steps, 2);
    assert_eq!(events.convergence, vec![false, false]);
}

#[test]
fn test_identical_evaluations_are_degenerate() {
    let mut engine = engine(0.5, 1.0, RelaxParams::default());
    let (e, g) = harmonic(engine.geometry(), 1.0);
    engine.step(e, &g).unwrap();

    let hessian = engine.hessian().clone();
    let trust = engine.trust();
    let geometry = engine.geometry().clone();

    let result = engine.step(e, &g);
    assert!(matches!(result, Err(RelaxError::DegenerateUpdate { .. })));
    assert_eq!(engine.hessian(), &hessian);
    assert_eq!(engine.trust(), trust);
    assert_eq!(engine.iteration(), 1);
    assert_eq!(engine.geometry().coords, geometry.coords);

    assert!(matches!(engine.step(e, &g), Err(RelaxError::Finished)));
}

#[test]
fn test_invalid_input_leaves_state_untouched() {
    let mut engine = engine(0.05, 1.0, loose_params());

    let short = DVector::from_vec(vec![0.05, 0.0]);
    assert!(matches!(engine.step(0.0, &short), Err(RelaxError::InvalidInput(_))));
    let nan = DVector::from_vec(vec![f64::NAN, 0.0, 0.0]);
    assert!(matches!(engine.step(0.0, &nan), Err(RelaxError::InvalidInput(_))));
    assert!(matches!(
        engine.step(f64::INFINITY, &DVector::zeros(3)),
        Err(RelaxError::InvalidInput(_))
    ));
    assert_eq!(engine.iteration(), 0);
    assert!(!engine.is_finished());

    let (e, g) = harmonic(engine.geometry(), 1.0);
    assert!(matches!(engine.step(e, &g), Ok(Outcome::Converged(_))));
}

#[test]
fn test_trace_receives_one_snapshot_per_iteration() {
    let trace = MemoryTrace::default();
    let mut engine = engine(0.1, 1.0, RelaxParams::default()).with_trace(trace.clone());

    let mut geom = engine.geometry().clone();
    for _ in 0..3 {
        let (e, g) = harmonic(&geom, 2.0);
        match engine.step(e, &g).unwrap() {
            Outcome::Continue(next) => geom = next,
            _ => break,
        }
    }

    let records = trace.0.borrow();
    assert_eq!(records.len(), engine.iteration());
    assert_eq!(records[0].nstep, 1);
    assert_eq!(records[0].q, vec![0.1]);
    assert_eq!(records[0].gradients, vec![0.2, 0.0, 0.0]);
    assert_abs_diff_eq!(records[0].coords[0][0], 0.1 + records[0].dq[0], epsilon = 1e-12);
    assert_eq!(records[0].hessian, vec![vec![1.0]]);
}

#[test]
fn test_trace_failure_ends_the_run() {
    let mut engine = engine(0.5, 1.0, RelaxParams::default()).with_trace(BrokenTrace);
    let (e, g) = harmonic(engine.geometry(), 1.0);

    assert!(matches!(engine.step(e, &g), Err(RelaxError::Io(_))));
    assert_eq!(engine.iteration(), 0);
    assert_abs_diff_eq!(engine.geometry().coords[0].x, 0.5);
    assert!(matches!(engine.step(e, &g), Err(RelaxError::Finished)));
}

#[test]
fn test_rejects_invalid_parameters() {
    let params = RelaxParams {
        gradient_rms: -1.0,
        ..RelaxParams::default()
    };
    let result = StepEngine::new(atom_at(0.0), XCoordinate { force_constant: 1.0 }, params);
    assert!(matches!(result, Err(RelaxError::InvalidInput(_))));
}

// Mock coordinate set that claims one coordinate but disagrees in one of its outputs
struct Misshapen {
    hessian_dim: usize,
    weights_len: usize,
    q_len: usize,
}

impl CoordinateAdapter for Misshapen {
    fn len(&self) -> usize {
        1
    }

    fn hessian_guess(&self, _geom: &Geometry) -> DMatrix<f64> {
        DMatrix::identity(self.hessian_dim, self.hessian_dim)
    }

    fn weights(&self, _geom: &Geometry) -> DVector<f64> {
        DVector::from_element(self.weights_len, 1.0)
    }

    fn b_matrix(&self, geom: &Geometry) -> DMatrix<f64> {
        let mut b = DMatrix::zeros(1, geom.dof());
        b[(0, 0)] = 1.0;
        b
    }

    fn eval_geom(&self, geom: &Geometry) -> DVector<f64> {
        DVector::from_element(self.q_len, geom.coords[0].x)
    }

    fn describe(&self) -> String {
        "misshapen".to_string()
    }
}

#[test]
fn test_rejects_adapter_with_mismatched_shapes() {
    let cases = [
        Misshapen { hessian_dim: 2, weights_len: 1, q_len: 1 },
        Misshapen { hessian_dim: 1, weights_len: 3, q_len: 1 },
        Misshapen { hessian_dim: 1, weights_len: 1, q_len: 2 },
    ];
    for coords in cases {
        let result = StepEngine::new(atom_at(0.5), coords, RelaxParams::default());
        assert!(matches!(result, Err(RelaxError::InvalidInput(_))));
    }

    let consistent = Misshapen { hessian_dim: 1, weights_len: 1, q_len: 1 };
    assert!(StepEngine::new(atom_at(0.5), consistent, RelaxParams::default()).is_ok());
}

#[test]
fn test_rejects_overlapping_atoms_in_distance_coordinates() {
    let geom = Geometry::from_symbols(
        &["H", "H", "O"],
        vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        ],
    )
    .unwrap();
    let coords = crate::coords::PairDistances::new(&geom);
    let result = StepEngine::new(geom, coords, RelaxParams::default());
    assert!(matches!(result, Err(RelaxError::InvalidInput(_))));
}

#[test]
fn test_exhausted_is_reported_to_observer() {
    let events = Recorder::default();
    let params = RelaxParams {
        max_steps: 0,
        ..RelaxParams::default()
    };
    let mut engine = StepEngine::new(atom_at(0.5), XCoordinate { force_constant: 1.0 }, params)
        .unwrap()
        .with_observer(events.clone());

    let (e, g) = harmonic(engine.geometry(), 1.0);
    assert!(matches!(engine.step(e, &g), Ok(Outcome::Exhausted(_))));
    assert_eq!(events.0.borrow().exhausted, Some(0));
    assert!(events.0.borrow().energies.is_empty());
}
