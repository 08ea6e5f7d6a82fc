//! Two-view projective geometry for feature matching
//!
//! This crate provides the geometric side of two-frame correspondence search:
//! 2D lines in homogeneous form, pinhole intrinsics, fundamental matrices
//! derived from a known relative pose, and robust fundamental-matrix
//! estimation from point correspondences (normalized 8-point inside RANSAC).
//!
//! All pixel quantities are f64. Fundamental matrices relate homogeneous
//! pixel coordinates so that `p2^T * F12 * p1 = 0` for true correspondences.

pub mod camera;
pub mod epipolar;
pub mod fundamental;
pub mod line;

pub use camera::CameraIntrinsics;
pub use epipolar::{epipolar_line, fundamental_from_relative_pose, line_crosses_rect};
pub use fundamental::{fundamental_8point, EightPoint, FundamentalEstimator, RansacEightPoint};
pub use line::Line2;

use thiserror::Error;

/// Errors from fundamental-matrix estimation.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// Fewer correspondences than the solver's minimal sample.
    #[error("need at least {needed} point correspondences, got {got}")]
    NotEnoughPoints { needed: usize, got: usize },
    /// The two point lists have different lengths.
    #[error("point list length mismatch: {0} vs {1}")]
    PointCountMismatch(usize, usize),
    /// Linear solve (SVD) failed to produce a nullspace vector.
    #[error("svd failed in fundamental matrix estimation")]
    SvdFailed,
    /// RANSAC exhausted its iterations without a consensus model.
    #[error("ransac found no consensus fundamental matrix")]
    RansacFailed,
}
