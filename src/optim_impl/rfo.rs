//! Quadratic step: rational function optimization with a trust-sphere fallback

use crate::error::RelaxError;
use crate::math::{find_root, sorted_eigenvalues, symmetrize};
use nalgebra::{DMatrix, DVector};

/// How the step was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    /// Unconstrained RFO step that already fits inside the trust radius.
    PureRfo,
    /// Step forced onto the trust sphere through the secular equation.
    OnSphere,
}

/// Result of [`quadratic_step`] together with the quantities worth logging.
#[derive(Debug, Clone)]
pub struct QuadraticStep {
    pub dq: DVector<f64>,
    /// Energy change predicted by the quadratic model.
    pub de: f64,
    /// Flag consumed by the convergence test. See [`quadratic_step`].
    pub on_sphere: bool,
    pub kind: StepKind,
    pub trust: f64,
    /// RFO eigenvalue or the shift found on the sphere.
    pub lambda: f64,
    pub lowest_eigenvalue: f64,
    pub negative_eigenvalues: usize,
}

/// Minimize the quadratic model `g.dq + dq.H.dq / 2` within radius `trust`.
///
/// The RFO step comes from the lowest eigenvector of the augmented matrix
/// `[[H, g], [g^T, 0]]`. If it is longer than `trust`, the shift `lambda`
/// below the lowest eigenvalue of `H` solving `|(lambda - H)^-1 g| = trust` is
/// searched and the step becomes `(lambda - H)^-1 g`.
///
/// `on_sphere` is reported as `false` for both branches. The sphere branch
/// never sets it, so the dedicated on-sphere convergence criterion is never
/// reached through this path; the flag is kept as is rather than wired up.
///
/// The weights are accepted for interface symmetry with the coordinate
/// adapter but do not scale the step.
pub fn quadratic_step(
    g: &DVector<f64>,
    h: &DMatrix<f64>,
    _weights: &DVector<f64>,
    trust: f64,
) -> Result<QuadraticStep, RelaxError> {
    let n = g.len();
    if h.shape() != (n, n) {
        return Err(RelaxError::InvalidInput(format!(
            "quadratic step with gradient {} and Hessian {}x{}",
            n,
            h.nrows(),
            h.ncols()
        )));
    }

    let ev = sorted_eigenvalues(h);
    let lowest_eigenvalue = if n > 0 { ev[0] } else { 0.0 };
    let negative_eigenvalues = ev.iter().filter(|&&e| e < 0.0).count();

    let (rfo_lambda, rfo_step) = rfo_step(g, h);
    let (dq, kind, lambda) = match rfo_step {
        Some(dq) if dq.norm() <= trust => (dq, StepKind::PureRfo, rfo_lambda),
        _ => {
            let steplength = |l: f64| shifted_solve(h, g, l).map(|x| x.norm() - trust);
            let l = find_root(steplength, lowest_eigenvalue)?;
            (shifted_solve(h, g, l)?, StepKind::OnSphere, l)
        }
    };

    let de = g.dot(&dq) + 0.5 * dq.dot(&(h * &dq));
    Ok(QuadraticStep {
        dq,
        de,
        on_sphere: false,
        kind,
        trust,
        lambda,
        lowest_eigenvalue,
        negative_eigenvalues,
    })
}

/// Lowest eigenpair of the augmented RFO matrix, with the step scaled out of
/// the eigenvector. No step when its last component vanishes.
fn rfo_step(g: &DVector<f64>, h: &DMatrix<f64>) -> (f64, Option<DVector<f64>>) {
    let n = g.len();
    let mut rfo = DMatrix::zeros(n + 1, n + 1);
    rfo.view_mut((0, 0), (n, n)).copy_from(h);
    rfo.view_mut((0, n), (n, 1)).copy_from(g);
    rfo.view_mut((n, 0), (1, n)).copy_from(&g.transpose());

    let eigen = symmetrize(&rfo).symmetric_eigen();
    let Some(lowest) = eigen
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
    else {
        return (0.0, None);
    };

    let v = eigen.eigenvectors.column(lowest);
    let scale = v[n];
    if scale.abs() <= f64::EPSILON * v.norm() {
        return (eigen.eigenvalues[lowest], None);
    }
    let dq = v.rows(0, n) / scale;
    (eigen.eigenvalues[lowest], Some(dq))
}

/// Solve `(lambda I - H) x = g`.
fn shifted_solve(h: &DMatrix<f64>, g: &DVector<f64>, lambda: f64) -> Result<DVector<f64>, RelaxError> {
    let n = g.len();
    let shifted = DMatrix::identity(n, n) * lambda - h;
    shifted.lu().solve(g).ok_or_else(|| {
        RelaxError::RootFindFailure(format!("singular shifted Hessian at lambda = {:.6e}", lambda))
    })
}
