//! Frame data model: keypoints, descriptors, intrinsics, pose

use image::GrayImage;
use nalgebra::{Isometry3, Point2};

use crate::descriptor::BinaryDescriptor;
use crate::MatchError;
use parallax_geometry::CameraIntrinsics;

/// A detected keypoint with position and pyramid level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPoint {
    /// X coordinate (column) in pixels
    pub x: f32,
    /// Y coordinate (row) in pixels
    pub y: f32,
    /// Pyramid octave at which the keypoint was detected (0 = full resolution)
    pub octave: usize,
}

impl KeyPoint {
    /// Create a keypoint at a pixel location and octave
    pub fn new(x: f32, y: f32, octave: usize) -> Self {
        Self { x, y, octave }
    }

    /// The pixel location as an f64 point for geometric computations
    pub fn point(&self) -> Point2<f64> {
        Point2::new(self.x as f64, self.y as f64)
    }
}

/// Per-octave scale factors of the feature-extraction pyramid
///
/// Established once from the extractor configuration and treated as
/// immutable, read-only calibration afterwards. Epipolar tolerances scale
/// with `factor(octave)`: keypoints detected at coarser pyramid levels get
/// proportionally looser distance thresholds.
#[derive(Debug, Clone)]
pub struct ScalePyramid {
    factors: Vec<f64>,
}

impl ScalePyramid {
    /// Build the table for `levels` octaves with a fixed per-level scale step
    /// (`factor[i] = scale_step^i`).
    pub fn new(levels: usize, scale_step: f64) -> Self {
        let factors = (0..levels).map(|i| scale_step.powi(i as i32)).collect();
        Self { factors }
    }

    /// Number of pyramid levels in the table
    pub fn levels(&self) -> usize {
        self.factors.len()
    }

    /// The scale factor for an octave, or `None` if the octave is outside
    /// the table
    pub fn factor(&self, octave: usize) -> Option<f64> {
        self.factors.get(octave).copied()
    }
}

impl Default for ScalePyramid {
    /// Eight octaves with a 1.2 scale step, the usual ORB pyramid shape
    fn default() -> Self {
        Self::new(8, 1.2)
    }
}

/// A camera frame: image, features, intrinsics, and world-to-camera pose
///
/// The keypoint and descriptor sequences are index-aligned; a keypoint index
/// is valid only within `[0, num_keypoints)` for its owning frame. Frames are
/// read-only during matching, so independent frame pairs can be matched from
/// parallel threads.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Grayscale image content
    pub image: GrayImage,
    keypoints: Vec<KeyPoint>,
    descriptors: Vec<BinaryDescriptor>,
    /// Calibrated pinhole intrinsics with pixel dimensions
    pub intrinsics: CameraIntrinsics,
    /// World-to-camera transform
    pub pose: Isometry3<f64>,
}

impl Frame {
    /// Create a frame, validating that keypoints and descriptors are
    /// index-aligned.
    pub fn new(
        image: GrayImage,
        keypoints: Vec<KeyPoint>,
        descriptors: Vec<BinaryDescriptor>,
        intrinsics: CameraIntrinsics,
        pose: Isometry3<f64>,
    ) -> Result<Self, MatchError> {
        if keypoints.len() != descriptors.len() {
            return Err(MatchError::FeatureCountMismatch {
                keypoints: keypoints.len(),
                descriptors: descriptors.len(),
            });
        }
        Ok(Self {
            image,
            keypoints,
            descriptors,
            intrinsics,
            pose,
        })
    }

    /// Number of keypoints (= number of descriptors)
    pub fn num_keypoints(&self) -> usize {
        self.keypoints.len()
    }

    /// All keypoints, in detection order
    pub fn keypoints(&self) -> &[KeyPoint] {
        &self.keypoints
    }

    /// All descriptors, index-aligned with the keypoints
    pub fn descriptors(&self) -> &[BinaryDescriptor] {
        &self.descriptors
    }

    /// A keypoint by index, failing fast on out-of-range access
    pub fn keypoint(&self, index: usize) -> Result<&KeyPoint, MatchError> {
        self.keypoints
            .get(index)
            .ok_or(MatchError::KeypointIndexOutOfRange {
                index,
                len: self.keypoints.len(),
            })
    }

    /// The transform mapping this frame's camera coordinates into `other`'s
    /// camera coordinates.
    pub fn relative_pose_to(&self, other: &Frame) -> Isometry3<f64> {
        other.pose * self.pose.inverse()
    }
}
