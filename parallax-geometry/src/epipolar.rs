//! Epipolar lines from a fundamental matrix
//!
//! The fundamental matrix convention follows `p2^T * F12 * p1 = 0`: frame 1
//! is the reference, frame 2 the query, and `F12 * p1` is the epipolar line
//! in frame 2 on which the true correspondent of `p1` must lie.

use nalgebra::{Isometry3, Matrix3, Point2, Vector3};

use crate::camera::CameraIntrinsics;
use crate::line::Line2;

/// The skew-symmetric matrix `[t]x` such that `[t]x * v = t x v`.
pub fn skew_symmetric(t: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -t.z, t.y, //
        t.z, 0.0, -t.x, //
        -t.y, t.x, 0.0,
    )
}

/// Fundamental matrix between two calibrated views from a relative-pose prior.
///
/// `t21` maps frame-1 camera coordinates into frame-2 camera coordinates
/// (`p_cam2 = t21 * p_cam1`); with both frames holding world-to-camera poses
/// this is `pose2 * pose1.inverse()`. The result is
/// `F12 = K2^-T * [t]x * R * K1^-1`.
///
/// A zero-baseline prior (pure rotation) produces the zero matrix: the
/// epipolar constraint is undefined without translation, and every derived
/// line is degenerate. Callers holding such a prior should not expect any
/// candidates to survive the tolerance gate.
pub fn fundamental_from_relative_pose(
    k1: &CameraIntrinsics,
    k2: &CameraIntrinsics,
    t21: &Isometry3<f64>,
) -> Matrix3<f64> {
    let r = t21.rotation.to_rotation_matrix();
    let t = t21.translation.vector;
    let essential = skew_symmetric(&t) * r.matrix();
    k2.k_inverse().transpose() * essential * k1.k_inverse()
}

/// The epipolar line in frame 2 for a frame-1 pixel, `l2 = F12 * p1~`.
pub fn epipolar_line(f12: &Matrix3<f64>, p1: &Point2<f64>) -> Line2 {
    Line2::from_homogeneous(f12 * Vector3::new(p1.x, p1.y, 1.0))
}

/// Whether a line crosses the visible image rectangle `[0,width] x [0,height]`.
///
/// Intersects the line with the top and left boundary lines and rejects the
/// four configurations where both intersections fall beyond opposite corners.
/// Lines parallel to a boundary (no finite intersection) and corner-exact
/// hits are conservatively kept: a false positive here only costs extra
/// candidate checks, since the per-keypoint distance tolerance is the
/// authoritative gate.
pub fn line_crosses_rect(line: &Line2, width: f64, height: f64) -> bool {
    let top = Line2::through(&Point2::new(0.0, 0.0), &Point2::new(width, 0.0));
    let left = Line2::through(&Point2::new(0.0, 0.0), &Point2::new(0.0, height));

    let (i1, i2) = match (line.intersection(&top), line.intersection(&left)) {
        (Some(i1), Some(i2)) => (i1, i2),
        _ => return true,
    };

    if i1.x < 0.0 && i2.y > height {
        return false;
    }
    if i1.x > width && i2.y < 0.0 {
        return false;
    }
    if i1.x > width && i2.y > height {
        return false;
    }
    if i1.x < 0.0 && i2.y < 0.0 {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::{Translation3, UnitQuaternion};

    fn stereo_pair() -> (CameraIntrinsics, Isometry3<f64>) {
        let k = CameraIntrinsics::simple(500.0, 640, 480);
        // Frame 2 camera shifted 0.2m along +X relative to frame 1
        let t21 = Isometry3::from_parts(
            Translation3::new(-0.2, 0.0, 0.0),
            UnitQuaternion::identity(),
        );
        (k, t21)
    }

    #[test]
    fn test_epipolar_constraint_holds_for_true_correspondence() {
        let (k, t21) = stereo_pair();
        let f12 = fundamental_from_relative_pose(&k, &k, &t21);

        // A 3D point seen by both cameras
        let pw = Vector3::new(0.3, -0.1, 2.0);
        let p1 = k.project(&pw);
        let p2 = k.project(&(t21 * nalgebra::Point3::from(pw)).coords);

        let constraint =
            Vector3::new(p2.x, p2.y, 1.0).dot(&(f12 * Vector3::new(p1.x, p1.y, 1.0)));
        assert_abs_diff_eq!(constraint, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_true_correspondent_lies_on_epipolar_line() {
        let (k, t21) = stereo_pair();
        let f12 = fundamental_from_relative_pose(&k, &k, &t21);

        let pw = Vector3::new(-0.4, 0.2, 3.0);
        let p1 = k.project(&pw);
        let p2 = k.project(&(t21 * nalgebra::Point3::from(pw)).coords);

        let line = epipolar_line(&f12, &p1);
        assert!(line.distance(&p2) < 1e-8);
    }

    #[test]
    fn test_skew_symmetric_matches_cross_product() {
        let t = Vector3::new(1.0, -2.0, 0.5);
        let v = Vector3::new(0.3, 0.7, -1.1);
        let via_matrix = skew_symmetric(&t) * v;
        let direct = t.cross(&v);
        assert_abs_diff_eq!((via_matrix - direct).norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_center_crossing_line_is_kept() {
        // Diagonal line through the image center
        let line = Line2::through(&Point2::new(0.0, 0.0), &Point2::new(640.0, 480.0));
        assert!(line_crosses_rect(&line, 640.0, 480.0));
    }

    #[test]
    fn test_line_missing_top_left_corner_is_rejected() {
        // Crosses the top boundary at x = -5 and the left boundary at
        // y = height + 5: passes outside the top-left corner
        let line = Line2::through(&Point2::new(-5.0, 0.0), &Point2::new(0.0, 485.0));
        assert!(!line_crosses_rect(&line, 640.0, 480.0));
    }

    #[test]
    fn test_line_beyond_bottom_right_is_rejected() {
        // Both intersections beyond width/height
        let line = Line2::through(&Point2::new(700.0, 0.0), &Point2::new(0.0, 520.0));
        assert!(!line_crosses_rect(&line, 640.0, 480.0));
    }

    #[test]
    fn test_boundary_parallel_line_is_kept_conservatively() {
        // Vertical line: parallel to the left boundary, no finite
        // intersection, so the rectangle test keeps it and defers to the
        // distance gate
        let line = Line2::new(1.0, 0.0, -700.0); // x = 700
        assert!(line_crosses_rect(&line, 640.0, 480.0));
    }
}
