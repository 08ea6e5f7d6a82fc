//! 2D lines in homogeneous form

use nalgebra::{Point2, Vector3};

/// A 2D line `a*x + b*y + c = 0`, stored as homogeneous coefficients.
///
/// Lines are treated projectively: any nonzero scaling of the coefficients
/// describes the same line, so no normalization is performed on construction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line2 {
    coeffs: Vector3<f64>,
}

impl Line2 {
    /// Create a line from its coefficients `(a, b, c)`.
    pub fn new(a: f64, b: f64, c: f64) -> Self {
        Self {
            coeffs: Vector3::new(a, b, c),
        }
    }

    /// Create a line from a homogeneous coefficient vector.
    pub fn from_homogeneous(coeffs: Vector3<f64>) -> Self {
        Self { coeffs }
    }

    /// The line through two points, as the cross product of their
    /// homogeneous coordinates.
    pub fn through(p: &Point2<f64>, q: &Point2<f64>) -> Self {
        let hp = Vector3::new(p.x, p.y, 1.0);
        let hq = Vector3::new(q.x, q.y, 1.0);
        Self {
            coeffs: hp.cross(&hq),
        }
    }

    /// Homogeneous coefficients `(a, b, c)`.
    pub fn coeffs(&self) -> Vector3<f64> {
        self.coeffs
    }

    /// Unsigned perpendicular distance from a point to the line.
    ///
    /// A degenerate line (`a = b = 0`) has no finite distance to any point;
    /// the division then yields infinity, which downstream tolerance checks
    /// reject naturally.
    pub fn distance(&self, p: &Point2<f64>) -> f64 {
        let num = (self.coeffs.x * p.x + self.coeffs.y * p.y + self.coeffs.z).abs();
        num / self.coeffs.xy().norm()
    }

    /// Intersection of two lines, or `None` if they are parallel
    /// (the homogeneous intersection lies at infinity).
    pub fn intersection(&self, other: &Line2) -> Option<Point2<f64>> {
        let h = self.coeffs.cross(&other.coeffs);
        // Relative test: the w component vanishes for parallel lines at any
        // coefficient scale.
        if h.z.abs() <= 1e-12 * self.coeffs.norm() * other.coeffs.norm() {
            return None;
        }
        Some(Point2::new(h.x / h.z, h.y / h.z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_line_through_points() {
        // Horizontal line y = 2
        let line = Line2::through(&Point2::new(0.0, 2.0), &Point2::new(10.0, 2.0));
        assert_abs_diff_eq!(line.distance(&Point2::new(5.0, 2.0)), 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(line.distance(&Point2::new(5.0, 7.0)), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_distance_is_unsigned() {
        let line = Line2::new(0.0, 1.0, -2.0); // y = 2
        assert_abs_diff_eq!(line.distance(&Point2::new(0.0, 5.0)), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(line.distance(&Point2::new(0.0, -1.0)), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_distance_unaffected_by_scaling() {
        let line = Line2::new(3.0, 4.0, -10.0);
        let scaled = Line2::new(30.0, 40.0, -100.0);
        let p = Point2::new(7.0, -1.0);
        assert_abs_diff_eq!(line.distance(&p), scaled.distance(&p), epsilon = 1e-12);
    }

    #[test]
    fn test_intersection() {
        let horizontal = Line2::through(&Point2::new(0.0, 3.0), &Point2::new(1.0, 3.0));
        let vertical = Line2::through(&Point2::new(4.0, 0.0), &Point2::new(4.0, 1.0));
        let p = horizontal.intersection(&vertical).unwrap();
        assert_abs_diff_eq!(p.x, 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(p.y, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_parallel_lines_do_not_intersect() {
        let l1 = Line2::new(0.0, 1.0, -2.0);
        let l2 = Line2::new(0.0, 2.0, 6.0);
        assert!(l1.intersection(&l2).is_none());
    }
}
