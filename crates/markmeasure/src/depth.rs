//! Linear vertical correction for lengths measured off the calibration plane.
//!
//! `corrected = base * (alpha + beta * y)` where `y` is the image row of the
//! line's midpoint. The two coefficients come from two reference lines of the
//! same known physical length.

use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Singular values below this fraction are treated as zero by the solver.
const SVD_EPS: f64 = 1e-12;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepthCorrectionModel {
    pub alpha: f64,
    pub beta: f64,
}

impl Default for DepthCorrectionModel {
    fn default() -> Self {
        Self::identity()
    }
}

impl DepthCorrectionModel {
    pub const fn identity() -> Self {
        Self {
            alpha: 1.0,
            beta: 0.0,
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::identity()
    }

    #[inline]
    pub fn correct(&self, base_mm: f64, y: f64) -> f64 {
        base_mm * (self.alpha + self.beta * y)
    }
}

/// Midpoint row and uncorrected length of a line drawn with a known scale.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReferenceLine {
    pub y_mid: f64,
    pub base_mm: f64,
}

/// Solve for `(alpha, beta)` so both lines correct to `true_width_mm`.
///
/// Least squares through an SVD: lines at (nearly) the same row or of (nearly)
/// zero length give a numerically poor model rather than an error. `None` for
/// non-finite input or output and for a width that is not positive.
#[cfg_attr(feature = "tracing", instrument(level = "debug"))]
pub fn fit_two_lines(
    a: &ReferenceLine,
    b: &ReferenceLine,
    true_width_mm: f64,
) -> Option<DepthCorrectionModel> {
    let inputs = [a.y_mid, a.base_mm, b.y_mid, b.base_mm, true_width_mm];
    if inputs.iter().any(|v| !v.is_finite()) || true_width_mm <= 0.0 {
        return None;
    }

    let m = Matrix2::new(
        a.base_mm,
        a.base_mm * a.y_mid,
        b.base_mm,
        b.base_mm * b.y_mid,
    );
    let rhs = Vector2::new(true_width_mm, true_width_mm);
    let x = m.svd(true, true).solve(&rhs, SVD_EPS).ok()?;

    let model = DepthCorrectionModel {
        alpha: x[0],
        beta: x[1],
    };
    (model.alpha.is_finite() && model.beta.is_finite()).then_some(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_leaves_lengths_alone() {
        let m = DepthCorrectionModel::default();
        assert!(m.is_identity());
        for y in [0.0, 17.0, 480.5, 3000.0, -12.0] {
            assert_eq!(m.correct(123.4, y), 123.4);
        }
    }

    #[test]
    fn recovers_the_generating_model() {
        let truth = DepthCorrectionModel {
            alpha: 0.93,
            beta: 2.1e-4,
        };
        let true_width = 250.0;
        let line = |y: f64| ReferenceLine {
            y_mid: y,
            base_mm: true_width / (truth.alpha + truth.beta * y),
        };
        let (a, b) = (line(180.0), line(760.0));

        let fit = fit_two_lines(&a, &b, true_width).expect("fit");
        assert_relative_eq!(fit.alpha, truth.alpha, epsilon = 1e-9);
        assert_relative_eq!(fit.beta, truth.beta, max_relative = 1e-8);
        assert_relative_eq!(fit.correct(a.base_mm, a.y_mid), true_width, epsilon = 1e-9);
        assert_relative_eq!(fit.correct(b.base_mm, b.y_mid), true_width, epsilon = 1e-9);
    }

    #[test]
    fn equal_lengths_fit_a_pure_gain() {
        let a = ReferenceLine {
            y_mid: 100.0,
            base_mm: 50.0,
        };
        let b = ReferenceLine {
            y_mid: 400.0,
            base_mm: 50.0,
        };
        let fit = fit_two_lines(&a, &b, 55.0).expect("fit");
        assert_relative_eq!(fit.alpha, 1.1, epsilon = 1e-9);
        assert_relative_eq!(fit.beta, 0.0, epsilon = 1e-10);
    }

    // Same row for both lines: rank-deficient, still returns numbers.
    #[test]
    fn coincident_rows_do_not_error() {
        let a = ReferenceLine {
            y_mid: 300.0,
            base_mm: 80.0,
        };
        let fit = fit_two_lines(&a, &a, 100.0).expect("least-squares fit");
        assert!(fit.alpha.is_finite() && fit.beta.is_finite());
    }

    #[test]
    fn non_finite_input_is_absent() {
        let a = ReferenceLine {
            y_mid: f64::NAN,
            base_mm: 80.0,
        };
        let b = ReferenceLine {
            y_mid: 10.0,
            base_mm: 80.0,
        };
        assert!(fit_two_lines(&a, &b, 100.0).is_none());
    }

    #[test]
    fn non_positive_width_is_absent() {
        let a = ReferenceLine {
            y_mid: 100.0,
            base_mm: 45.0,
        };
        let b = ReferenceLine {
            y_mid: 400.0,
            base_mm: 40.0,
        };
        assert!(fit_two_lines(&a, &b, 0.0).is_none());
        assert!(fit_two_lines(&a, &b, -50.0).is_none());
    }
}
