//! Reduced coordinate systems
//!
//! The engine works in whatever coordinates a [`CoordinateAdapter`] provides.
//! Two adapters ship with the crate: plain Cartesian coordinates and the set
//! of all interatomic distances.

mod cartesian;
mod distances;

pub use cartesian::CartesianCoords;
pub use distances::PairDistances;

use crate::error::RelaxError;
use crate::geometry::Geometry;
use crate::math::{pinv, rms};
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

/// Cartesian convergence of the iterative back-transformation.
const BACKTRANSFORM_THRESHOLD: f64 = 1e-6;
const BACKTRANSFORM_MAX_ITER: usize = 20;

/// Maps Cartesian geometries to reduced coordinates and back.
pub trait CoordinateAdapter {
    /// Number of reduced coordinates.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Initial Hessian in reduced coordinates.
    fn hessian_guess(&self, geom: &Geometry) -> DMatrix<f64>;

    /// Per-coordinate weights.
    fn weights(&self, geom: &Geometry) -> DVector<f64>;

    /// Wilson B-matrix, `dq/dx` with one row per reduced coordinate.
    fn b_matrix(&self, geom: &Geometry) -> DMatrix<f64>;

    /// Reduced coordinates of a geometry.
    fn eval_geom(&self, geom: &Geometry) -> DVector<f64>;

    /// Human-readable description of the coordinate set.
    fn describe(&self) -> String;

    /// Move `geom` by the reduced step `dq` taken from `q`, returning the
    /// reduced coordinates actually reached.
    ///
    /// Iterates `x += B+ dq` with a fresh generalized inverse until the
    /// Cartesian change drops below `1e-6`. If that does not happen within
    /// twenty iterations the first-order result is kept.
    fn update_geom(
        &self,
        geom: &mut Geometry,
        q: &DVector<f64>,
        dq: &DVector<f64>,
        b_inv: &DMatrix<f64>,
    ) -> Result<DVector<f64>, RelaxError> {
        let mut q = q.clone();
        let mut dq = dq.clone();
        let mut b_inv = b_inv.clone();
        let mut first_order: Option<(Geometry, DVector<f64>)> = None;

        for iteration in 1..=BACKTRANSFORM_MAX_ITER {
            let dcart = &b_inv * &dq;
            geom.displace(&dcart);
            let q_new = self.eval_geom(geom);
            let dcart_rms = rms(dcart.as_slice());
            debug!(
                "  Back-transformation {}: Cartesian step RMS {:.3e}, remaining RMS {:.3e}",
                iteration,
                dcart_rms,
                rms((&dq - (&q_new - &q)).as_slice())
            );
            dq -= &q_new - &q;
            q = q_new;

            if first_order.is_none() {
                first_order = Some((geom.clone(), q.clone()));
            }
            if dcart_rms < BACKTRANSFORM_THRESHOLD {
                return Ok(q);
            }
            b_inv = pinv(&self.b_matrix(geom))?;
        }

        warn!(
            "Back-transformation did not converge in {} iterations, using first-order step",
            BACKTRANSFORM_MAX_ITER
        );
        match first_order {
            Some((first_geom, first_q)) => {
                *geom = first_geom;
                Ok(first_q)
            }
            None => Ok(q),
        }
    }
}
