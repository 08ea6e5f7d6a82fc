//! Camera models

use nalgebra::{Matrix3, Point2, Vector3};

/// Pinhole camera intrinsics with pixel dimensions
///
/// Uses the standard pinhole projection model:
///   u = fx * X/Z + cx
///   v = fy * Y/Z + cy
///
/// The pixel dimensions bound the visible image rectangle
/// `[0, width] x [0, height]` used for epipolar-line pruning.
#[derive(Debug, Clone, Copy)]
pub struct CameraIntrinsics {
    /// Focal length in x direction (pixels)
    pub fx: f64,
    /// Focal length in y direction (pixels)
    pub fy: f64,
    /// Principal point x coordinate (pixels)
    pub cx: f64,
    /// Principal point y coordinate (pixels)
    pub cy: f64,
    /// Image width (pixels)
    pub width: u32,
    /// Image height (pixels)
    pub height: u32,
}

impl CameraIntrinsics {
    /// Create intrinsics from focal lengths, principal point and image size.
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, width: u32, height: u32) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
        }
    }

    /// Create a simple camera with square pixels and a centered principal point.
    pub fn simple(focal_length: f64, width: u32, height: u32) -> Self {
        Self::new(
            focal_length,
            focal_length,
            width as f64 * 0.5,
            height as f64 * 0.5,
            width,
            height,
        )
    }

    /// The calibration matrix `K`.
    pub fn k_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.fx, 0.0, self.cx, //
            0.0, self.fy, self.cy, //
            0.0, 0.0, 1.0,
        )
    }

    /// The analytic inverse of `K` (valid since fx, fy are nonzero for any
    /// physical camera).
    pub fn k_inverse(&self) -> Matrix3<f64> {
        Matrix3::new(
            1.0 / self.fx,
            0.0,
            -self.cx / self.fx,
            0.0,
            1.0 / self.fy,
            -self.cy / self.fy,
            0.0,
            0.0,
            1.0,
        )
    }

    /// Project a 3D point in camera coordinates to pixel coordinates.
    ///
    /// The point must be in front of the camera (Z > 0) for a valid projection.
    pub fn project(&self, point_cam: &Vector3<f64>) -> Point2<f64> {
        let inv_z = 1.0 / point_cam.z;
        Point2::new(
            self.fx * point_cam.x * inv_z + self.cx,
            self.fy * point_cam.y * inv_z + self.cy,
        )
    }

    /// Whether a pixel falls inside the visible image rectangle.
    pub fn contains(&self, p: &Point2<f64>) -> bool {
        p.x >= 0.0 && p.y >= 0.0 && p.x <= self.width as f64 && p.y <= self.height as f64
    }
}
