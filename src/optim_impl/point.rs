use crate::error::RelaxError;
use nalgebra::DVector;

/// A point on the potential energy surface in reduced coordinates.
///
/// Energy and gradient are absent for points that were only predicted.
#[derive(Debug, Clone)]
pub struct PesPoint {
    pub q: DVector<f64>,
    pub energy: Option<f64>,
    pub gradient: Option<DVector<f64>>,
}

impl PesPoint {
    pub fn evaluated(q: DVector<f64>, energy: f64, gradient: DVector<f64>) -> Self {
        PesPoint {
            q,
            energy: Some(energy),
            gradient: Some(gradient),
        }
    }

    pub fn predicted(q: DVector<f64>, energy: f64) -> Self {
        PesPoint {
            q,
            energy: Some(energy),
            gradient: None,
        }
    }

    pub fn energy(&self) -> Result<f64, RelaxError> {
        self.energy
            .ok_or_else(|| RelaxError::InvalidInput("point carries no energy".to_string()))
    }

    pub fn gradient(&self) -> Result<&DVector<f64>, RelaxError> {
        self.gradient
            .as_ref()
            .ok_or_else(|| RelaxError::InvalidInput("point carries no gradient".to_string()))
    }
}
