//! Molecular geometry handed back and forth between the engine and its driver

use crate::error::RelaxError;
use nalgebra::{DVector, Vector3};
use periodic_table_on_an_enum::Element;
use std::fmt;

/// Elements and Cartesian positions of a structure.
#[derive(Clone)]
pub struct Geometry {
    pub elements: Vec<Element>,
    pub coords: Vec<Vector3<f64>>,
}

impl Geometry {
    pub fn new(elements: Vec<Element>, coords: Vec<Vector3<f64>>) -> Result<Self, RelaxError> {
        if elements.len() != coords.len() {
            return Err(RelaxError::InvalidInput(format!(
                "{} elements but {} positions",
                elements.len(),
                coords.len()
            )));
        }
        if coords.iter().any(|c| c.iter().any(|x| !x.is_finite())) {
            return Err(RelaxError::InvalidInput(
                "geometry contains non-finite coordinates".to_string(),
            ));
        }
        Ok(Geometry { elements, coords })
    }

    /// Build a geometry from element symbols, as written in input files.
    pub fn from_symbols(symbols: &[&str], coords: Vec<Vector3<f64>>) -> Result<Self, RelaxError> {
        let elements = symbols
            .iter()
            .map(|s| {
                Element::from_symbol(s)
                    .ok_or_else(|| RelaxError::InvalidInput(format!("Invalid element symbol: {}", s)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Geometry::new(elements, coords)
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Number of Cartesian degrees of freedom.
    pub fn dof(&self) -> usize {
        3 * self.coords.len()
    }

    /// Positions flattened as `[x0, y0, z0, x1, ...]`.
    pub fn flat_coords(&self) -> DVector<f64> {
        DVector::from_iterator(self.dof(), self.coords.iter().flat_map(|c| c.iter().copied()))
    }

    /// Shift every atom by the matching slice of a flattened displacement.
    pub fn displace(&mut self, delta: &DVector<f64>) {
        for (i, coord) in self.coords.iter_mut().enumerate() {
            *coord += Vector3::new(delta[3 * i], delta[3 * i + 1], delta[3 * i + 2]);
        }
    }

    pub fn symbols(&self) -> Vec<&str> {
        self.elements.iter().map(|e| e.get_symbol()).collect()
    }
}

impl fmt::Debug for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let atoms: Vec<(&str, [f64; 3])> = self
            .elements
            .iter()
            .zip(&self.coords)
            .map(|(e, c)| (e.get_symbol(), [c.x, c.y, c.z]))
            .collect();
        f.debug_struct("Geometry").field("atoms", &atoms).finish()
    }
}
