//! Epipolar-constrained feature matching between two camera frames
//!
//! This crate establishes 2D keypoint correspondences for visual-odometry and
//! SLAM initialization. Given two frames with a relative-pose prior, the
//! matcher derives the fundamental matrix, prunes the candidate search space
//! with per-keypoint epipolar lines, delegates descriptor comparison to a
//! pluggable matching engine, and re-validates every raw match against the
//! epipolar constraint before emitting it.
//!
//! The descriptor engine and the fundamental-matrix estimator sit behind
//! narrow traits ([`DescriptorMatcher`], `FundamentalEstimator` from
//! `parallax-geometry`) so the core has no dependency on any specific vision
//! library and both can be mocked in tests.

pub mod descriptor;
pub mod diagnostics;
pub mod draw;
pub mod engine;
pub mod frame;
pub mod mask;
pub mod matcher;

pub use descriptor::BinaryDescriptor;
pub use diagnostics::{LogSink, MeasurementSink};
pub use draw::{draw_matches, DrawLayout};
pub use engine::{DescriptorMatcher, HammingMatcher, RawMatch};
pub use frame::{Frame, KeyPoint, ScalePyramid};
pub use mask::MatchMask;
pub use matcher::{EpipolarMatcher, FeaturePair, FundamentalRefinement, EPIPOLAR_CHI2_THRESHOLD};

pub use parallax_geometry::{CameraIntrinsics, GeometryError};

use thiserror::Error;

/// Errors from frame construction and matching.
#[derive(Debug, Error)]
pub enum MatchError {
    /// A frame's keypoint and descriptor sequences must be index-aligned.
    #[error("frame has {keypoints} keypoints but {descriptors} descriptors")]
    FeatureCountMismatch {
        keypoints: usize,
        descriptors: usize,
    },
    /// A keypoint's octave has no entry in the scale pyramid.
    #[error("keypoint octave {octave} outside scale pyramid with {levels} levels")]
    OctaveOutOfRange { octave: usize, levels: usize },
    /// A keypoint index does not exist in its owning frame.
    #[error("keypoint index {index} out of range for frame with {len} keypoints")]
    KeypointIndexOutOfRange { index: usize, len: usize },
    /// Too few epipolar-consistent correspondences to refine the fundamental
    /// matrix.
    #[error("{got} epipolar-consistent correspondences, need at least {needed}")]
    InsufficientCorrespondences { needed: usize, got: usize },
    /// Unrecognized visualization layout name.
    #[error("unknown draw layout {0:?}")]
    UnknownDrawLayout(String),
    /// Failure inside the fundamental-matrix estimator.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}
