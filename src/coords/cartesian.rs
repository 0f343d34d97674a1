//! Cartesian coordinates: the reduced space is the full 3N space

use super::CoordinateAdapter;
use crate::error::RelaxError;
use crate::geometry::Geometry;
use nalgebra::{DMatrix, DVector};

/// Identity coordinate set over all Cartesian degrees of freedom.
#[derive(Debug, Clone)]
pub struct CartesianCoords {
    dof: usize,
    force_constant: f64,
}

impl CartesianCoords {
    pub fn new(geom: &Geometry) -> Self {
        CartesianCoords {
            dof: geom.dof(),
            force_constant: 0.5,
        }
    }

    /// Diagonal value of the initial Hessian guess (default 0.5).
    pub fn with_force_constant(mut self, force_constant: f64) -> Self {
        self.force_constant = force_constant;
        self
    }
}

impl CoordinateAdapter for CartesianCoords {
    fn len(&self) -> usize {
        self.dof
    }

    fn hessian_guess(&self, _geom: &Geometry) -> DMatrix<f64> {
        DMatrix::identity(self.dof, self.dof) * self.force_constant
    }

    fn weights(&self, _geom: &Geometry) -> DVector<f64> {
        DVector::from_element(self.dof, 1.0)
    }

    fn b_matrix(&self, _geom: &Geometry) -> DMatrix<f64> {
        DMatrix::identity(self.dof, self.dof)
    }

    fn eval_geom(&self, geom: &Geometry) -> DVector<f64> {
        geom.flat_coords()
    }

    fn describe(&self) -> String {
        format!(
            "Cartesian coordinates: {} ({} atoms)",
            self.dof,
            self.dof / 3
        )
    }

    fn update_geom(
        &self,
        geom: &mut Geometry,
        _q: &DVector<f64>,
        dq: &DVector<f64>,
        _b_inv: &DMatrix<f64>,
    ) -> Result<DVector<f64>, RelaxError> {
        geom.displace(dq);
        Ok(geom.flat_coords())
    }
}
