//! BFGS update of the approximate Hessian

use crate::error::RelaxError;
use crate::math::{max_abs, rms, symmetrize};
use nalgebra::{DMatrix, DVector};

/// Size of the change applied by one update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HessianUpdate {
    pub change_rms: f64,
    pub change_max: f64,
}

/// Apply the BFGS formula
/// `dH = dg dg^T / (dq.dg) - H dq dq^T H / (dq.H.dq)` in place.
///
/// Both denominators are checked before anything is touched; a vanishing one
/// yields [`RelaxError::DegenerateUpdate`] and leaves `hessian` unchanged.
pub fn update_hessian(
    hessian: &mut DMatrix<f64>,
    dq: &DVector<f64>,
    dg: &DVector<f64>,
) -> Result<HessianUpdate, RelaxError> {
    let n = hessian.nrows();
    if hessian.ncols() != n || dq.len() != n || dg.len() != n {
        return Err(RelaxError::InvalidInput(format!(
            "Hessian update with H {}x{}, dq {}, dg {}",
            n,
            hessian.ncols(),
            dq.len(),
            dg.len()
        )));
    }

    let h_dq = &*hessian * dq;
    let dq_dg = dq.dot(dg);
    let dq_h_dq = dq.dot(&h_dq);
    if is_degenerate(dq_dg, dq.norm() * dg.norm()) || is_degenerate(dq_h_dq, dq.norm() * h_dq.norm()) {
        return Err(RelaxError::DegenerateUpdate { dq_dg, dq_h_dq });
    }

    let delta = (dg * dg.transpose()) / dq_dg - (&h_dq * h_dq.transpose()) / dq_h_dq;
    let update = HessianUpdate {
        change_rms: rms(delta.as_slice()),
        change_max: max_abs(delta.as_slice()),
    };
    *hessian = symmetrize(&(&*hessian + delta));
    Ok(update)
}

/// A denominator is degenerate when it is zero or lost in the rounding of its
/// own factors.
fn is_degenerate(value: f64, scale: f64) -> bool {
    !value.is_finite() || value == 0.0 || value.abs() <= f64::EPSILON * scale
}
