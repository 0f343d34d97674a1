//! All interatomic distances as a (redundant) internal coordinate set

use super::CoordinateAdapter;
use crate::geometry::Geometry;
use nalgebra::{DMatrix, DVector};

/// One distance per atom pair `i < j`.
///
/// For five or more atoms the set is redundant, so the B-matrix has more rows
/// than there are internal degrees of freedom and its generalized inverse
/// projects out the redundancy.
#[derive(Debug, Clone)]
pub struct PairDistances {
    pairs: Vec<(usize, usize)>,
    force_constant: f64,
}

impl PairDistances {
    pub fn new(geom: &Geometry) -> Self {
        let n = geom.len();
        let pairs = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .collect();
        PairDistances {
            pairs,
            force_constant: 0.5,
        }
    }

    /// Diagonal value of the initial Hessian guess (default 0.5).
    pub fn with_force_constant(mut self, force_constant: f64) -> Self {
        self.force_constant = force_constant;
        self
    }

    pub fn pairs(&self) -> &[(usize, usize)] {
        &self.pairs
    }
}

impl CoordinateAdapter for PairDistances {
    fn len(&self) -> usize {
        self.pairs.len()
    }

    fn hessian_guess(&self, _geom: &Geometry) -> DMatrix<f64> {
        DMatrix::identity(self.len(), self.len()) * self.force_constant
    }

    fn weights(&self, _geom: &Geometry) -> DVector<f64> {
        DVector::from_element(self.len(), 1.0)
    }

    fn b_matrix(&self, geom: &Geometry) -> DMatrix<f64> {
        let mut b = DMatrix::zeros(self.len(), geom.dof());
        for (row, &(i, j)) in self.pairs.iter().enumerate() {
            let r = geom.coords[i] - geom.coords[j];
            let u = r / r.norm();
            for k in 0..3 {
                b[(row, 3 * i + k)] = u[k];
                b[(row, 3 * j + k)] = -u[k];
            }
        }
        b
    }

    fn eval_geom(&self, geom: &Geometry) -> DVector<f64> {
        DVector::from_iterator(
            self.len(),
            self.pairs
                .iter()
                .map(|&(i, j)| (geom.coords[i] - geom.coords[j]).norm()),
        )
    }

    fn describe(&self) -> String {
        let mut lines = vec![format!("Internal coordinates: {} distances", self.len())];
        for &(i, j) in &self.pairs {
            lines.push(format!("* Bond({}, {})", i + 1, j + 1));
        }
        lines.join("\n")
    }
}
