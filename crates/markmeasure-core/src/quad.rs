//! Small helpers over four-point polygons given in TL, TR, BR, BL order.

use nalgebra::Point2;

/// Euclidean lengths of the four sides `0→1, 1→2, 2→3, 3→0`.
pub fn quad_side_lengths(q: &[Point2<f64>; 4]) -> [f64; 4] {
    std::array::from_fn(|i| nalgebra::distance(&q[i], &q[(i + 1) % 4]))
}

pub fn quad_mean_side(q: &[Point2<f64>; 4]) -> f64 {
    quad_side_lengths(q).iter().sum::<f64>() / 4.0
}

/// Mean of the four corners.
pub fn quad_centroid(q: &[Point2<f64>; 4]) -> Point2<f64> {
    let sx = q.iter().map(|p| p.x).sum::<f64>();
    let sy = q.iter().map(|p| p.y).sum::<f64>();
    Point2::new(sx / 4.0, sy / 4.0)
}

/// Shoelace area. Positive when the corners run clockwise on screen (y down).
pub fn quad_signed_area(q: &[Point2<f64>; 4]) -> f64 {
    let mut acc = 0.0;
    for i in 0..4 {
        let a = q[i];
        let b = q[(i + 1) % 4];
        acc += a.x * b.y - b.x * a.y;
    }
    0.5 * acc
}

/// Strictly convex: every turn has the same non-zero orientation.
pub fn is_convex_quad(q: &[Point2<f64>; 4]) -> bool {
    let mut sign = 0.0_f64;
    for i in 0..4 {
        let a = q[i];
        let b = q[(i + 1) % 4];
        let c = q[(i + 2) % 4];
        let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
        if cross == 0.0 {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square(side: f64) -> [Point2<f64>; 4] {
        [
            Point2::new(0.0, 0.0),
            Point2::new(side, 0.0),
            Point2::new(side, side),
            Point2::new(0.0, side),
        ]
    }

    #[test]
    fn square_metrics() {
        let q = square(120.0);
        assert_eq!(quad_side_lengths(&q), [120.0; 4]);
        assert_relative_eq!(quad_mean_side(&q), 120.0);
        assert_eq!(quad_centroid(&q), Point2::new(60.0, 60.0));
        assert_relative_eq!(quad_signed_area(&q), 14_400.0);
        assert!(is_convex_quad(&q));
    }

    #[test]
    fn counter_clockwise_has_negative_area() {
        let mut q = square(10.0);
        q.reverse();
        assert!(quad_signed_area(&q) < 0.0);
        assert!(is_convex_quad(&q));
    }

    #[test]
    fn bow_tie_is_not_convex() {
        let q = [
            Point2::new(0.0, 0.0),
            Point2::new(10.0, 10.0),
            Point2::new(10.0, 0.0),
            Point2::new(0.0, 10.0),
        ];
        assert!(!is_convex_quad(&q));
    }
}
