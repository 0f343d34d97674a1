//! Trust radius control from Fletcher's ratio

use nalgebra::DVector;

/// Below this ratio the model is poor and the radius shrinks.
const SHRINK_BELOW: f64 = 0.25;
/// Above this ratio (with a full-length step) the radius doubles.
const GROW_ABOVE: f64 = 0.75;
/// Tolerance for "the previous step used the whole radius".
const ON_BOUNDARY: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrustUpdate {
    /// Fletcher's ratio of actual to predicted energy change.
    pub ratio: f64,
    pub trust: f64,
}

/// Compute the next trust radius.
///
/// `dq` is the step the prediction was made for. A zero-length step under the
/// shrink branch keeps the current radius so the result stays positive.
pub fn update_trust(trust: f64, de: f64, de_predicted: f64, dq: &DVector<f64>) -> TrustUpdate {
    let ratio = if de != 0.0 { de / de_predicted } else { 1.0 };
    let step = dq.norm();

    let new_trust = if ratio < SHRINK_BELOW {
        if step > 0.0 {
            step / 4.0
        } else {
            trust
        }
    } else if ratio > GROW_ABOVE && (step - trust).abs() < ON_BOUNDARY {
        2.0 * trust
    } else {
        trust
    };

    TrustUpdate {
        ratio,
        trust: new_trust,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poor_ratio_shrinks_to_quarter_step() {
        let dq = DVector::from_vec(vec![0.3, 0.4]);
        // predicted a decrease, got an increase
        let update = update_trust(0.5, 0.01, -0.02, &dq);
        assert_eq!(update.ratio, -0.5);
        assert!((update.trust - 0.125).abs() < 1e-15);
    }

    #[test]
    fn test_good_ratio_on_boundary_doubles() {
        let dq = DVector::from_vec(vec![0.3, 0.4]);
        let update = update_trust(0.5, -0.019, -0.02, &dq);
        assert!(update.ratio > 0.75);
        assert_eq!(update.trust, 1.0);
    }

    #[test]
    fn test_good_ratio_inside_radius_keeps_trust() {
        let dq = DVector::from_vec(vec![0.1, 0.1]);
        let update = update_trust(0.5, -0.019, -0.02, &dq);
        assert_eq!(update.trust, 0.5);
    }

    #[test]
    fn test_intermediate_ratio_keeps_trust() {
        let dq = DVector::from_vec(vec![0.3, 0.4]);
        let update = update_trust(0.5, -0.01, -0.02, &dq);
        assert_eq!(update.ratio, 0.5);
        assert_eq!(update.trust, 0.5);
    }

    #[test]
    fn test_zero_energy_change_counts_as_perfect() {
        let dq = DVector::from_vec(vec![0.6, 0.8]);
        let update = update_trust(1.0, 0.0, -0.3, &dq);
        assert_eq!(update.ratio, 1.0);
        assert_eq!(update.trust, 2.0);
    }

    #[test]
    fn test_result_stays_positive() {
        let zero = DVector::zeros(3);
        let update = update_trust(0.2, 0.5, -0.1, &zero);
        assert!(update.trust > 0.0);
        for ratio_de in [-1.0, -0.5, 0.1, 0.5, 2.0] {
            let dq = DVector::from_vec(vec![0.01, 0.0, 0.0]);
            assert!(update_trust(0.3, ratio_de, -1.0, &dq).trust > 0.0);
        }
    }
}
