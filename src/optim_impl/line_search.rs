//! Polynomial interpolation between the newest point and the best one

use crate::math::{fit_cubic, fit_quartic};

/// Which branch of the interpolation produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interpolation {
    Quartic,
    Cubic,
    /// No fit succeeded and the new point is at least as low as the best one.
    StayAtNew,
    /// No fit succeeded and the best point is lower.
    ReturnToBest,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineSearch {
    pub e0: f64,
    pub e1: f64,
    pub g0: f64,
    pub g1: f64,
    /// Position along the segment, 0 at the new point and 1 at the best one.
    pub t: f64,
    pub energy: f64,
    pub kind: Interpolation,
}

/// Interpolate between two points given their energies and the derivatives
/// along the segment joining them.
///
/// A quartic fit is accepted for `t` in `[-1, 2]`, otherwise a cubic one for
/// `t` in `[0, 1]`, otherwise the lower endpoint is returned.
pub fn linear_search(e0: f64, e1: f64, g0: f64, g1: f64) -> LineSearch {
    let result = |t: f64, energy: f64, kind: Interpolation| LineSearch {
        e0,
        e1,
        g0,
        g1,
        t,
        energy,
        kind,
    };

    if let Some((t, energy)) = fit_quartic(e0, e1, g0, g1).filter(|(t, _)| (-1.0..=2.0).contains(t)) {
        return result(t, energy, Interpolation::Quartic);
    }
    if let Some((t, energy)) = fit_cubic(e0, e1, g0, g1).filter(|(t, _)| (0.0..=1.0).contains(t)) {
        return result(t, energy, Interpolation::Cubic);
    }
    if e0 <= e1 {
        result(0.0, e0, Interpolation::StayAtNew)
    } else {
        result(1.0, e1, Interpolation::ReturnToBest)
    }
}
