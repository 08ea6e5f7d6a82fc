//! Epipolar-constrained matching between two frames
//!
//! Two entry points, mirroring the two situations a front end meets:
//!
//! - [`EpipolarMatcher::match_for_initialization`] for frame pairs with a
//!   usable relative-pose prior: epipolar candidate pruning, masked
//!   descriptor matching, and a second independent epipolar check on every
//!   raw match before it is emitted.
//! - [`EpipolarMatcher::match_unconstrained`] for pairs without a strong
//!   prior: unmasked descriptor matching, epipolar inlier filtering, and a
//!   robust refit of the fundamental matrix. This operation is deliberately
//!   partial (see its docs).

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use nalgebra::{Matrix3, Point2};

use crate::diagnostics::MeasurementSink;
use crate::engine::DescriptorMatcher;
use crate::frame::{Frame, KeyPoint, ScalePyramid};
use crate::mask::MatchMask;
use crate::MatchError;
use parallax_geometry::{
    epipolar_line, fundamental_from_relative_pose, line_crosses_rect, FundamentalEstimator, Line2,
};

/// Chi-squared 1-DoF 99% threshold on the point-to-epipolar-line distance.
/// The effective tolerance is this constant times the scale factor of the
/// tested keypoint's octave.
pub const EPIPOLAR_CHI2_THRESHOLD: f64 = 3.84;

/// Minimum epipolar-consistent correspondences required to refine F.
const MIN_REFINE_CORRESPONDENCES: usize = 8;

/// A confirmed cross-frame correspondence.
///
/// Created only after a match has passed both mask gating and epipolar
/// re-validation; immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeaturePair {
    /// Keypoint index in frame 1
    pub index1: usize,
    /// Pixel location in frame 1
    pub point1: Point2<f64>,
    /// Keypoint index in frame 2
    pub index2: usize,
    /// Pixel location in frame 2
    pub point2: Point2<f64>,
}

/// Result of the general two-frame matcher.
///
/// Holds the epipolar-consistent subset of the unconstrained matches and the
/// fundamental matrix refit from them. Deliberately not a final
/// correspondence list: see [`EpipolarMatcher::match_unconstrained`].
#[derive(Debug, Clone)]
pub struct FundamentalRefinement {
    /// Matches that passed the epipolar tolerance under the prior F
    pub inlier_pairs: Vec<FeaturePair>,
    /// Fundamental matrix refit from the inlier points
    pub refined_f12: Matrix3<f64>,
}

/// Two-frame matcher combining epipolar pruning with a pluggable descriptor
/// engine.
///
/// Stateless across calls: every invocation owns its candidate map, mask and
/// buffers, so independent frame pairs can be matched concurrently as long as
/// each call gets its own frames. The scale pyramid is read-only calibration
/// fixed at construction.
pub struct EpipolarMatcher<M> {
    engine: M,
    pyramid: ScalePyramid,
    sink: Option<Box<dyn MeasurementSink>>,
}

impl<M: DescriptorMatcher> EpipolarMatcher<M> {
    /// Create a matcher around a descriptor engine and the feature-pyramid
    /// scale table.
    pub fn new(engine: M, pyramid: ScalePyramid) -> Self {
        Self {
            engine,
            pyramid,
            sink: None,
        }
    }

    /// Attach a diagnostics sink receiving match-count and inlier-ratio
    /// measurements.
    pub fn with_diagnostics(mut self, sink: Box<dyn MeasurementSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Match two frames whose relative pose is known well enough to derive a
    /// fundamental matrix.
    ///
    /// Frame 1 is the reference, frame 2 the query. Output order follows the
    /// descriptor engine's emission order; one frame-1 keypoint may appear in
    /// matches of several frame-2 queries, which is left to downstream
    /// consumers to police.
    pub fn match_for_initialization(
        &self,
        frame1: &Frame,
        frame2: &Frame,
    ) -> Result<Vec<FeaturePair>, MatchError> {
        self.check_octaves(frame1)?;
        self.check_octaves(frame2)?;

        let t21 = frame1.relative_pose_to(frame2);
        let f12 = fundamental_from_relative_pose(&frame1.intrinsics, &frame2.intrinsics, &t21);

        let candidates = self.epipolar_candidates(frame1, frame2, &f12)?;
        let mask =
            MatchMask::from_candidate_map(frame2.num_keypoints(), frame1.num_keypoints(), &candidates)?;

        let raw = self
            .engine
            .match_descriptors(frame2.descriptors(), frame1.descriptors(), Some(&mask));

        // Re-check every raw match against the epipolar constraint: the
        // engine is not trusted to have honored the mask.
        let mut pairs = Vec::with_capacity(raw.len());
        for m in &raw {
            let kp1 = frame1.keypoint(m.train_idx)?;
            let kp2 = frame2.keypoint(m.query_idx)?;
            let line = epipolar_line(&f12, &kp1.point());
            if self.within_epipolar_tolerance(&line, kp2)? {
                pairs.push(FeaturePair {
                    index1: m.train_idx,
                    point1: kp1.point(),
                    index2: m.query_idx,
                    point2: kp2.point(),
                });
            }
        }

        debug!(
            "initialization match: {} candidates keys, {} raw, {} validated",
            candidates.len(),
            raw.len(),
            pairs.len()
        );
        self.report("initialization.raw_matches", raw.len() as f64);
        self.report("initialization.feature_pairs", pairs.len() as f64);

        Ok(pairs)
    }

    /// Per-keypoint epipolar candidate sets under a fundamental matrix.
    ///
    /// For each frame-1 keypoint, its epipolar line in frame 2 is tested
    /// against the visible rectangle (coarse prune) and every frame-2
    /// keypoint against the scale-aware distance tolerance. Keypoints with no
    /// surviving candidates contribute no map entry.
    pub fn epipolar_candidates(
        &self,
        frame1: &Frame,
        frame2: &Frame,
        f12: &Matrix3<f64>,
    ) -> Result<BTreeMap<usize, BTreeSet<usize>>, MatchError> {
        let width = frame2.intrinsics.width as f64;
        let height = frame2.intrinsics.height as f64;

        let mut map = BTreeMap::new();
        for (i1, kp1) in frame1.keypoints().iter().enumerate() {
            let line = epipolar_line(f12, &kp1.point());

            if !line_crosses_rect(&line, width, height) {
                continue;
            }

            let mut targets = BTreeSet::new();
            for (i2, kp2) in frame2.keypoints().iter().enumerate() {
                if self.within_epipolar_tolerance(&line, kp2)? {
                    targets.insert(i2);
                }
            }

            if !targets.is_empty() {
                map.insert(i1, targets);
            }
        }
        Ok(map)
    }

    /// Match two frames without a usable pose prior.
    ///
    /// Runs the descriptor engine unmasked, keeps the matches consistent with
    /// the prior-derived fundamental matrix, and refits F from those inliers
    /// with the given robust estimator.
    ///
    /// **This operation is explicitly partial.** It stops after the refit: it
    /// does not re-run masked matching under the refined matrix, does not
    /// decompose it into a relative pose, and does not emit a final validated
    /// correspondence list. Callers get the inlier pairs and the refined
    /// matrix to take further themselves. Too few epipolar-consistent
    /// correspondences surface as
    /// [`MatchError::InsufficientCorrespondences`] rather than an empty
    /// result.
    pub fn match_unconstrained<E: FundamentalEstimator>(
        &self,
        frame1: &Frame,
        frame2: &Frame,
        estimator: &E,
    ) -> Result<FundamentalRefinement, MatchError> {
        self.check_octaves(frame1)?;
        self.check_octaves(frame2)?;

        let t21 = frame1.relative_pose_to(frame2);
        let f12 = fundamental_from_relative_pose(&frame1.intrinsics, &frame2.intrinsics, &t21);

        let raw = self
            .engine
            .match_descriptors(frame2.descriptors(), frame1.descriptors(), None);

        let mut inlier_pairs = Vec::new();
        for m in &raw {
            let kp1 = frame1.keypoint(m.train_idx)?;
            let kp2 = frame2.keypoint(m.query_idx)?;
            let line = epipolar_line(&f12, &kp1.point());
            if self.within_epipolar_tolerance(&line, kp2)? {
                inlier_pairs.push(FeaturePair {
                    index1: m.train_idx,
                    point1: kp1.point(),
                    index2: m.query_idx,
                    point2: kp2.point(),
                });
            }
        }

        self.report("unconstrained.raw_matches", raw.len() as f64);
        self.report("unconstrained.epipolar_inliers", inlier_pairs.len() as f64);
        if !raw.is_empty() {
            self.report(
                "unconstrained.inlier_ratio",
                inlier_pairs.len() as f64 / raw.len() as f64,
            );
        }

        if inlier_pairs.len() < MIN_REFINE_CORRESPONDENCES {
            return Err(MatchError::InsufficientCorrespondences {
                needed: MIN_REFINE_CORRESPONDENCES,
                got: inlier_pairs.len(),
            });
        }

        let points1: Vec<Point2<f64>> = inlier_pairs.iter().map(|p| p.point1).collect();
        let points2: Vec<Point2<f64>> = inlier_pairs.iter().map(|p| p.point2).collect();
        let refined_f12 = estimator.estimate(&points1, &points2)?;

        debug!(
            "unconstrained match: {} raw, {} inliers, F refit done",
            raw.len(),
            inlier_pairs.len()
        );

        Ok(FundamentalRefinement {
            inlier_pairs,
            refined_f12,
        })
    }

    /// Scale-aware epipolar acceptance: the keypoint's distance to the line
    /// must stay within `3.84 * scale_factor[octave]`.
    pub fn within_epipolar_tolerance(
        &self,
        line: &Line2,
        kp: &KeyPoint,
    ) -> Result<bool, MatchError> {
        let factor = self
            .pyramid
            .factor(kp.octave)
            .ok_or(MatchError::OctaveOutOfRange {
                octave: kp.octave,
                levels: self.pyramid.levels(),
            })?;
        Ok(line.distance(&kp.point()) <= EPIPOLAR_CHI2_THRESHOLD * factor)
    }

    fn check_octaves(&self, frame: &Frame) -> Result<(), MatchError> {
        for kp in frame.keypoints() {
            if kp.octave >= self.pyramid.levels() {
                return Err(MatchError::OctaveOutOfRange {
                    octave: kp.octave,
                    levels: self.pyramid.levels(),
                });
            }
        }
        Ok(())
    }

    fn report(&self, key: &str, value: f64) {
        if let Some(sink) = &self.sink {
            sink.report(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::BinaryDescriptor;
    use crate::engine::{HammingMatcher, RawMatch};
    use image::GrayImage;
    use nalgebra::{Isometry3, Point3, Translation3, UnitQuaternion};
    use parallax_geometry::fundamental::epipolar_residual;
    use parallax_geometry::{CameraIntrinsics, EightPoint};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use std::sync::{Arc, Mutex};

    fn camera() -> CameraIntrinsics {
        CameraIntrinsics::simple(500.0, 640, 480)
    }

    /// World-to-camera poses for a pair with a 0.2m baseline along +X.
    fn baseline_poses() -> (Isometry3<f64>, Isometry3<f64>) {
        let pose1 = Isometry3::identity();
        let pose2 = Isometry3::from_parts(
            Translation3::new(-0.2, 0.0, 0.0),
            UnitQuaternion::identity(),
        );
        (pose1, pose2)
    }

    fn make_frame(
        k: CameraIntrinsics,
        pose: Isometry3<f64>,
        keypoints: Vec<KeyPoint>,
        descriptors: Vec<BinaryDescriptor>,
    ) -> Frame {
        Frame::new(
            GrayImage::new(k.width, k.height),
            keypoints,
            descriptors,
            k,
            pose,
        )
        .unwrap()
    }

    /// Two views of a non-planar point grid with unique descriptors shared
    /// across frames.
    fn synthetic_scene() -> (Frame, Frame) {
        let k = camera();
        let (pose1, pose2) = baseline_poses();
        let t21 = pose2 * pose1.inverse();

        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut kps1 = Vec::new();
        let mut kps2 = Vec::new();
        let mut descs = Vec::new();

        let mut i = 0usize;
        for zi in 0..2 {
            for yi in 0..3 {
                for xi in 0..4 {
                    let pw = Point3::new(
                        xi as f64 * 0.1 - 0.15,
                        yi as f64 * 0.1 - 0.1,
                        1.0 + zi as f64 * 0.5,
                    );
                    let p1 = k.project(&pw.coords);
                    let p2 = k.project(&(t21 * pw).coords);

                    kps1.push(KeyPoint::new(p1.x as f32, p1.y as f32, i % 3));
                    kps2.push(KeyPoint::new(p2.x as f32, p2.y as f32, i % 3));
                    descs.push(BinaryDescriptor([
                        rng.gen(),
                        rng.gen(),
                        rng.gen(),
                        rng.gen(),
                    ]));
                    i += 1;
                }
            }
        }

        let frame1 = make_frame(k, pose1, kps1, descs.clone());
        let frame2 = make_frame(k, pose2, kps2, descs);
        (frame1, frame2)
    }

    /// Engine that ignores the mask entirely and pairs every query with
    /// train 0 at distance 0.
    struct MaskIgnoringEngine;

    impl DescriptorMatcher for MaskIgnoringEngine {
        fn match_descriptors(
            &self,
            query: &[BinaryDescriptor],
            _train: &[BinaryDescriptor],
            _mask: Option<&MatchMask>,
        ) -> Vec<RawMatch> {
            (0..query.len())
                .map(|q| RawMatch {
                    query_idx: q,
                    train_idx: 0,
                    distance: 0,
                })
                .collect()
        }
    }

    struct RecordingSink(Arc<Mutex<Vec<(String, f64)>>>);

    impl MeasurementSink for RecordingSink {
        fn report(&self, key: &str, value: f64) {
            self.0.lock().unwrap().push((key.to_string(), value));
        }
    }

    #[test]
    fn test_single_true_correspondence_with_decoy() {
        let k = camera();
        let (pose1, pose2) = baseline_poses();

        let desc_a = BinaryDescriptor([0xAAAA_AAAA, 0, 0, 0]);
        let desc_b = BinaryDescriptor([0x5555_5555, 0, 0, 0]);

        let frame1 = make_frame(k, pose1, vec![KeyPoint::new(100.0, 100.0, 0)], vec![desc_a]);
        // Decoy at (500,500) sits 400px off the epipolar line y = 100
        let frame2 = make_frame(
            k,
            pose2,
            vec![KeyPoint::new(100.0, 100.0, 0), KeyPoint::new(500.0, 500.0, 0)],
            vec![desc_a, desc_b],
        );

        let matcher = EpipolarMatcher::new(HammingMatcher::new(), ScalePyramid::default());
        let pairs = matcher.match_for_initialization(&frame1, &frame2).unwrap();

        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].index1, 0);
        assert_eq!(pairs[0].index2, 0);
        assert!(pairs.iter().all(|p| p.index2 != 1));
    }

    #[test]
    fn test_offscreen_epipolar_line_yields_no_candidates() {
        // Frame 1 is taller than frame 2; with a pure-x baseline, the
        // epipolar line of a keypoint at y = 700 runs below frame 2's
        // rectangle (at y = 580 for these intrinsics).
        let k1 = CameraIntrinsics::simple(500.0, 640, 720);
        let k2 = camera();
        let (pose1, pose2) = baseline_poses();

        let desc = BinaryDescriptor([1, 2, 3, 4]);
        let frame1 = make_frame(k1, pose1, vec![KeyPoint::new(100.0, 700.0, 0)], vec![desc]);
        let frame2 = make_frame(
            k2,
            pose2,
            vec![KeyPoint::new(100.0, 100.0, 0), KeyPoint::new(300.0, 400.0, 0)],
            vec![desc, desc],
        );

        let matcher = EpipolarMatcher::new(HammingMatcher::new(), ScalePyramid::default());
        let t21 = frame1.relative_pose_to(&frame2);
        let f12 = fundamental_from_relative_pose(&frame1.intrinsics, &frame2.intrinsics, &t21);

        let map = matcher.epipolar_candidates(&frame1, &frame2, &f12).unwrap();
        assert!(!map.contains_key(&0));
        assert!(map.is_empty());

        // And the full pipeline emits nothing
        let pairs = matcher.match_for_initialization(&frame1, &frame2).unwrap();
        assert!(pairs.is_empty());
    }

    #[test]
    fn test_all_emitted_pairs_satisfy_epipolar_tolerance() {
        let (frame1, frame2) = synthetic_scene();
        let pyramid = ScalePyramid::default();
        let matcher = EpipolarMatcher::new(HammingMatcher::new(), pyramid.clone());

        let pairs = matcher.match_for_initialization(&frame1, &frame2).unwrap();
        assert!(!pairs.is_empty());

        let t21 = frame1.relative_pose_to(&frame2);
        let f12 = fundamental_from_relative_pose(&frame1.intrinsics, &frame2.intrinsics, &t21);
        for pair in &pairs {
            let line = epipolar_line(&f12, &pair.point1);
            let octave = frame2.keypoint(pair.index2).unwrap().octave;
            let limit = EPIPOLAR_CHI2_THRESHOLD * pyramid.factor(octave).unwrap();
            assert!(line.distance(&pair.point2) <= limit);
        }
    }

    #[test]
    fn test_matching_is_deterministic() {
        let (frame1, frame2) = synthetic_scene();
        let matcher = EpipolarMatcher::new(HammingMatcher::new(), ScalePyramid::default());

        let first = matcher.match_for_initialization(&frame1, &frame2).unwrap();
        let second = matcher.match_for_initialization(&frame1, &frame2).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_unique_descriptors_match_to_their_counterparts() {
        let (frame1, frame2) = synthetic_scene();
        let matcher = EpipolarMatcher::new(HammingMatcher::new(), ScalePyramid::default());

        let pairs = matcher.match_for_initialization(&frame1, &frame2).unwrap();
        // Descriptors are shared per scene point, so index1 == index2
        assert_eq!(pairs.len(), frame1.num_keypoints());
        assert!(pairs.iter().all(|p| p.index1 == p.index2));
    }

    #[test]
    fn test_revalidation_is_conservative_against_mask_ignoring_engine() {
        let (frame1, frame2) = synthetic_scene();
        let raw_count = frame2.num_keypoints();

        let matcher = EpipolarMatcher::new(MaskIgnoringEngine, ScalePyramid::default());
        let pairs = matcher.match_for_initialization(&frame1, &frame2).unwrap();

        // The engine pairs every query with train 0; only queries actually on
        // train 0's epipolar line survive re-validation.
        assert!(pairs.len() <= raw_count);
        assert!(pairs.len() < raw_count);
        assert!(pairs.iter().all(|p| p.index1 == 0));
    }

    #[test]
    fn test_octave_outside_pyramid_fails_fast() {
        let k = camera();
        let (pose1, pose2) = baseline_poses();
        let desc = BinaryDescriptor::zeros();

        let frame1 = make_frame(k, pose1, vec![KeyPoint::new(10.0, 10.0, 99)], vec![desc]);
        let frame2 = make_frame(k, pose2, vec![KeyPoint::new(10.0, 10.0, 0)], vec![desc]);

        let matcher = EpipolarMatcher::new(HammingMatcher::new(), ScalePyramid::default());
        let err = matcher.match_for_initialization(&frame1, &frame2).unwrap_err();
        assert!(matches!(
            err,
            MatchError::OctaveOutOfRange { octave: 99, levels: 8 }
        ));
    }

    #[test]
    fn test_unconstrained_refines_fundamental_matrix() {
        let (frame1, frame2) = synthetic_scene();
        let matcher = EpipolarMatcher::new(HammingMatcher::new(), ScalePyramid::default());

        let refinement = matcher
            .match_unconstrained(&frame1, &frame2, &EightPoint)
            .unwrap();

        assert_eq!(refinement.inlier_pairs.len(), frame1.num_keypoints());
        // Keypoints are stored as f32, so the refit is exact only up to
        // quantization noise
        for pair in &refinement.inlier_pairs {
            assert!(epipolar_residual(&refinement.refined_f12, &pair.point1, &pair.point2) < 1e-3);
        }
    }

    #[test]
    fn test_unconstrained_surfaces_insufficient_correspondences() {
        let k = camera();
        let (pose1, pose2) = baseline_poses();
        let desc = BinaryDescriptor([0xF0F0, 0, 0, 0]);

        let frame1 = make_frame(k, pose1, vec![KeyPoint::new(320.0, 240.0, 0)], vec![desc]);
        let frame2 = make_frame(k, pose2, vec![KeyPoint::new(220.0, 240.0, 0)], vec![desc]);

        let matcher = EpipolarMatcher::new(HammingMatcher::new(), ScalePyramid::default());
        let err = matcher
            .match_unconstrained(&frame1, &frame2, &EightPoint)
            .unwrap_err();
        assert!(matches!(
            err,
            MatchError::InsufficientCorrespondences { needed: 8, got: 1 }
        ));
    }

    #[test]
    fn test_measurements_are_reported() {
        let (frame1, frame2) = synthetic_scene();
        let store = Arc::new(Mutex::new(Vec::new()));
        let matcher = EpipolarMatcher::new(HammingMatcher::new(), ScalePyramid::default())
            .with_diagnostics(Box::new(RecordingSink(store.clone())));

        matcher.match_for_initialization(&frame1, &frame2).unwrap();

        let seen = store.lock().unwrap();
        let keys: Vec<&str> = seen.iter().map(|(k, _)| k.as_str()).collect();
        assert!(keys.contains(&"initialization.raw_matches"));
        assert!(keys.contains(&"initialization.feature_pairs"));
    }
}
