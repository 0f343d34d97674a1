//! Numerical kernel used by the relaxation engine
//!
//! Generalized inverse, RMS, a bounded root finder for increasing functions,
//! and the cubic/quartic fits used by the line search.

use crate::error::RelaxError;
use nalgebra::{DMatrix, DVector};
use tracing::{debug, warn};

/// Singular values separated by a ratio larger than this are treated as a gap
/// between the kept and the discarded subspace.
const PINV_GAP: f64 = 1e3;
/// Gaps smaller than this are suspicious and get logged.
const PINV_GAP_WARN: f64 = 1e8;

/// Root-mean-square of a slice; zero for an empty slice.
pub fn rms(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    (values.iter().map(|v| v * v).sum::<f64>() / values.len() as f64).sqrt()
}

/// Largest absolute entry of a slice; zero for an empty slice.
pub fn max_abs(values: &[f64]) -> f64 {
    values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()))
}

/// Generalized inverse of a rectangular matrix.
///
/// Singular values are sorted in descending order and cut at the first ratio
/// between neighbours that exceeds `1e3`; everything below the gap is
/// treated as zero.
pub fn pinv(a: &DMatrix<f64>) -> Result<DMatrix<f64>, RelaxError> {
    let (nrows, ncols) = a.shape();
    if nrows == 0 || ncols == 0 {
        return Ok(DMatrix::zeros(ncols, nrows));
    }

    let svd = a.clone().svd(true, true);
    let u = svd
        .u
        .ok_or_else(|| RelaxError::Linalg("SVD did not return U".to_string()))?;
    let v_t = svd
        .v_t
        .ok_or_else(|| RelaxError::Linalg("SVD did not return V^T".to_string()))?;
    let values = svd.singular_values;

    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|&i, &j| values[j].total_cmp(&values[i]));

    if values[order[0]] <= 0.0 {
        return Ok(DMatrix::zeros(ncols, nrows));
    }

    let mut kept = order.len();
    for k in 0..order.len() - 1 {
        let gap = values[order[k]] / values[order[k + 1]];
        if gap > PINV_GAP {
            kept = k + 1;
            if gap < PINV_GAP_WARN {
                warn!("Pseudoinverse gap of only: {:.1e}", gap);
            }
            break;
        }
    }

    let mut inverse = DMatrix::zeros(ncols, nrows);
    for &idx in &order[..kept] {
        let v = v_t.row(idx).transpose();
        let u_col = u.column(idx);
        inverse += (v * u_col.transpose()) / values[idx];
    }
    Ok(inverse)
}

/// Find the root of an increasing function on `(-inf, lim)`.
///
/// Assumes `f(-inf) < 0` and `f(lim) > 0`. The starting point is found by
/// halving the distance to `lim` until `f` turns positive, then Newton steps
/// with a forward-difference derivative run until the residual stops
/// decreasing.
pub fn find_root<F>(mut f: F, lim: f64) -> Result<f64, RelaxError>
where
    F: FnMut(f64) -> Result<f64, RelaxError>,
{
    const MAX_ITER: usize = 1000;
    const DX: f64 = 1e-10;

    let mut d = 1.0;
    let mut bracketed = false;
    for _ in 0..MAX_ITER {
        if f(lim - d)? > 0.0 {
            bracketed = true;
            break;
        }
        d /= 2.0;
    }
    if !bracketed {
        return Err(RelaxError::RootFindFailure(
            "cannot find f(x) > 0 below the limit".to_string(),
        ));
    }

    let mut x = lim - d;
    let mut fx = f(x)?;
    let mut err = fx.abs();
    for _ in 0..MAX_ITER {
        let slope = (f(x + DX)? - fx) / DX;
        if !slope.is_finite() || slope == 0.0 {
            return Err(RelaxError::RootFindFailure(format!(
                "vanishing derivative at x = {:.6e}",
                x
            )));
        }
        let next = x - fx / slope;
        let f_next = f(next)?;
        if !f_next.is_finite() || f_next.abs() >= err {
            return Ok(x);
        }
        x = next;
        fx = f_next;
        err = fx.abs();
    }
    Err(RelaxError::RootFindFailure(format!(
        "no convergence after {} Newton iterations (residual {:.3e})",
        MAX_ITER, err
    )))
}

/// Fit a cubic to values and derivatives at `x = 0, 1`.
///
/// Returns the location and value of the minimum. The fit fails when the
/// cubic has no real extrema, or when its maximum lies inside `(0, 1)` and is
/// closer to `0.5` than the minimum.
pub fn fit_cubic(y0: f64, y1: f64, g0: f64, g1: f64) -> Option<(f64, f64)> {
    let a = 2.0 * (y0 - y1) + g0 + g1;
    let b = -3.0 * (y0 - y1) - 2.0 * g0 - g1;
    let poly = [a, b, g0, y0];

    if a == 0.0 {
        // parabola: a single extremum, only useful if it is a minimum
        if b > 0.0 {
            let t = -g0 / (2.0 * b);
            return Some((t, polyval(&poly, t)));
        }
        return None;
    }

    let roots = real_roots(&[3.0 * a, 2.0 * b, g0]);
    if roots.len() != 2 {
        return None;
    }
    let (minim, maxim) = if a > 0.0 {
        (roots[1], roots[0])
    } else {
        (roots[0], roots[1])
    };
    if 0.0 < maxim && maxim < 1.0 && (minim - 0.5).abs() > (maxim - 0.5).abs() {
        return None;
    }
    Some((minim, polyval(&poly, minim)))
}

/// Fit a constrained quartic to values and derivatives at `x = 0, 1`.
///
/// The quartic is constrained so that its second derivative vanishes at a
/// single point, which leaves it with one local extremum. Either none or two
/// such quartics exist; of the two, the one with the lower minimum wins.
/// Returns `None` when no such quartic exists or both open downwards.
pub fn fit_quartic(y0: f64, y1: f64, g0: f64, g1: f64) -> Option<(f64, f64)> {
    let dy = y1 - y0;
    let disc = -(g0 + g1).powi(2) - 2.0 * g0 * g1 + 6.0 * dy * (g0 + g1) - 6.0 * dy * dy;
    if disc < 1e-11 {
        return None;
    }

    let quartic = |c: f64| {
        let a = c + 3.0 * (y0 - y1) + 2.0 * g0 + g1;
        let b = -2.0 * c - 4.0 * (y0 - y1) - 3.0 * g0 - g1;
        [a, b, c, g0, y0]
    };
    let m = -5.0 * g0 - g1 - 6.0 * y0 + 6.0 * y1;
    let p1 = quartic(0.5 * (m + (2.0 * disc).sqrt()));
    let p2 = quartic(0.5 * (m - (2.0 * disc).sqrt()));
    if p1[0] < 0.0 && p2[0] < 0.0 {
        return None;
    }

    match (quartic_minimum(&p1), quartic_minimum(&p2)) {
        (Some(m1), Some(m2)) => Some(if m1.1 < m2.1 { m1 } else { m2 }),
        (Some(m), None) | (None, Some(m)) => Some(m),
        (None, None) => None,
    }
}

fn quartic_minimum(p: &[f64; 5]) -> Option<(f64, f64)> {
    let roots = real_roots(&[4.0 * p[0], 3.0 * p[1], 2.0 * p[2], p[3]]);
    let t = match roots.as_slice() {
        [] => return None,
        [only] => *only,
        many => many
            .iter()
            .copied()
            .min_by(|x, y| x.abs().total_cmp(&y.abs()))?,
    };
    Some((t, polyval(p, t)))
}

/// Evaluate a polynomial given by coefficients of decreasing degree.
pub fn polyval(coeffs: &[f64], x: f64) -> f64 {
    coeffs.iter().fold(0.0, |acc, c| acc * x + c)
}

/// Real roots (ascending) of a polynomial of degree at most three, given by
/// coefficients of decreasing degree. Negligible leading coefficients are
/// dropped first, so the degree may shrink.
pub fn real_roots(coeffs: &[f64]) -> Vec<f64> {
    let scale = coeffs.iter().fold(0.0f64, |acc, c| acc.max(c.abs()));
    if scale == 0.0 {
        return Vec::new();
    }
    let start = coeffs
        .iter()
        .position(|c| c.abs() > 1e-14 * scale)
        .unwrap_or(coeffs.len());
    let c = &coeffs[start..];

    let mut roots = match c.len() {
        0 | 1 => Vec::new(),
        2 => vec![-c[1] / c[0]],
        3 => quadratic_roots(c[0], c[1], c[2]),
        4 => cubic_roots(c[0], c[1], c[2], c[3]),
        n => {
            debug!("real_roots called with degree {}", n - 1);
            Vec::new()
        }
    };
    roots.sort_by(f64::total_cmp);
    roots
}

fn quadratic_roots(a: f64, b: f64, c: f64) -> Vec<f64> {
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return Vec::new();
    }
    let sq = disc.sqrt();
    // avoid cancellation between -b and the square root
    let q = -0.5 * (b + b.signum() * sq);
    if q == 0.0 {
        return vec![0.0, 0.0];
    }
    vec![q / a, c / q]
}

fn cubic_roots(a: f64, b: f64, c: f64, d: f64) -> Vec<f64> {
    let (b, c, d) = (b / a, c / a, d / a);
    let shift = b / 3.0;
    let p = c - b * b / 3.0;
    let q = 2.0 * b * b * b / 27.0 - b * c / 3.0 + d;
    let disc = (q / 2.0).powi(2) + (p / 3.0).powi(3);

    if p == 0.0 && q == 0.0 {
        return vec![-shift];
    }
    if disc > 0.0 || p >= 0.0 {
        let sq = disc.max(0.0).sqrt();
        let u = (-q / 2.0 + sq).cbrt();
        let v = (-q / 2.0 - sq).cbrt();
        return vec![u + v - shift];
    }

    let r = 2.0 * (-p / 3.0).sqrt();
    let cos_arg = ((3.0 * q) / (2.0 * p) * (-3.0 / p).sqrt()).clamp(-1.0, 1.0);
    let phi = cos_arg.acos() / 3.0;
    (0..3)
        .map(|k| r * (phi - 2.0 * std::f64::consts::PI * k as f64 / 3.0).cos() - shift)
        .collect()
}

/// Symmetric part `(A + A^T) / 2` of a square matrix.
pub fn symmetrize(a: &DMatrix<f64>) -> DMatrix<f64> {
    (a + a.transpose()) * 0.5
}

/// Ascending eigenvalues of the symmetric part of `a`.
pub fn sorted_eigenvalues(a: &DMatrix<f64>) -> DVector<f64> {
    let mut values: Vec<f64> = symmetrize(a).symmetric_eigenvalues().iter().copied().collect();
    values.sort_by(f64::total_cmp);
    DVector::from_vec(values)
}
