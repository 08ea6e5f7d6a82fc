//! Fundamental matrix estimation from point correspondences
//!
//! Implements the normalized 8-point algorithm and a seeded RANSAC wrapper
//! for robust estimation in the presence of outliers. Both are exposed behind
//! the [`FundamentalEstimator`] trait so matching code never depends on a
//! concrete solver.

use log::debug;
use nalgebra::{DMatrix, Matrix3, Point2, Vector3};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::GeometryError;

/// Minimal sample size of the 8-point solver.
const MIN_SAMPLES: usize = 8;

/// Robust multi-point fundamental-matrix estimation.
///
/// Implementations take paired pixel points (`points1[i]` corresponds to
/// `points2[i]`) and return `F` with the `p2^T * F * p1 = 0` convention.
pub trait FundamentalEstimator {
    fn estimate(
        &self,
        points1: &[Point2<f64>],
        points2: &[Point2<f64>],
    ) -> Result<Matrix3<f64>, GeometryError>;
}

/// Hartley normalization: translate the centroid to the origin and scale the
/// mean distance to sqrt(2). Returns the transformed points and the 3x3
/// transform that was applied.
fn normalize_points(points: &[Point2<f64>]) -> (Vec<Point2<f64>>, Matrix3<f64>) {
    let n = points.len() as f64;
    let cx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / n;

    let mean_dist = points
        .iter()
        .map(|p| ((p.x - cx).powi(2) + (p.y - cy).powi(2)).sqrt())
        .sum::<f64>()
        / n;

    // Coincident input points leave nothing to scale
    let scale = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    let transformed = points
        .iter()
        .map(|p| Point2::new((p.x - cx) * scale, (p.y - cy) * scale))
        .collect();

    let t = Matrix3::new(
        scale, 0.0, -scale * cx, //
        0.0, scale, -scale * cy, //
        0.0, 0.0, 1.0,
    );

    (transformed, t)
}

/// Normalized 8-point algorithm for the fundamental matrix.
///
/// `pts1` and `pts2` are corresponding pixel points in two images. The
/// returned matrix is forced to rank 2, scaled to unit Frobenius norm, and
/// satisfies `p2^T * F * p1 = 0` up to numerical error.
pub fn fundamental_8point(
    pts1: &[Point2<f64>],
    pts2: &[Point2<f64>],
) -> Result<Matrix3<f64>, GeometryError> {
    if pts1.len() != pts2.len() {
        return Err(GeometryError::PointCountMismatch(pts1.len(), pts2.len()));
    }
    let n = pts1.len();
    if n < MIN_SAMPLES {
        return Err(GeometryError::NotEnoughPoints {
            needed: MIN_SAMPLES,
            got: n,
        });
    }

    let (pts1_n, t1) = normalize_points(pts1);
    let (pts2_n, t2) = normalize_points(pts2);

    // Design matrix A (n x 9) for p2^T F p1 = 0
    let mut a = DMatrix::<f64>::zeros(n.max(9), 9);
    for (i, (p1, p2)) in pts1_n.iter().zip(pts2_n.iter()).enumerate() {
        let (x, y) = (p1.x, p1.y);
        let (xp, yp) = (p2.x, p2.y);

        a[(i, 0)] = xp * x;
        a[(i, 1)] = xp * y;
        a[(i, 2)] = xp;
        a[(i, 3)] = yp * x;
        a[(i, 4)] = yp * y;
        a[(i, 5)] = yp;
        a[(i, 6)] = x;
        a[(i, 7)] = y;
        a[(i, 8)] = 1.0;
    }

    // Solve A f = 0: the singular vector for the smallest singular value
    let svd = a.svd(true, true);
    let v_t = svd.v_t.ok_or(GeometryError::SvdFailed)?;
    let f_vec = v_t.row(v_t.nrows() - 1);

    let mut f = Matrix3::zeros();
    for r in 0..3 {
        for c in 0..3 {
            f[(r, c)] = f_vec[3 * r + c];
        }
    }

    // Enforce the rank-2 constraint
    let svd_f = f.svd(true, true);
    let u = svd_f.u.ok_or(GeometryError::SvdFailed)?;
    let v_t = svd_f.v_t.ok_or(GeometryError::SvdFailed)?;
    let mut s = svd_f.singular_values;
    s[2] = 0.0;
    f = u * Matrix3::from_diagonal(&s) * v_t;

    // Denormalize and fix the projective scale
    f = t2.transpose() * f * t1;
    let norm = f.norm();
    if norm <= 1e-15 {
        return Err(GeometryError::SvdFailed);
    }
    Ok(f / norm)
}

/// Approximate symmetric epipolar distance in pixels.
///
/// Averages the point-to-line residual over both images via the standard
/// normalization by the epipolar line gradients.
pub fn epipolar_residual(f: &Matrix3<f64>, p1: &Point2<f64>, p2: &Point2<f64>) -> f64 {
    let x = Vector3::new(p1.x, p1.y, 1.0);
    let xp = Vector3::new(p2.x, p2.y, 1.0);

    let fx = f * x;
    let ftxp = f.transpose() * xp;
    let denom = (fx.x * fx.x + fx.y * fx.y + ftxp.x * ftxp.x + ftxp.y * ftxp.y).max(1e-12);
    let val = xp.dot(&fx);
    ((val * val) / denom).sqrt()
}

/// Plain normalized 8-point estimation over all given correspondences.
///
/// Suitable when the input pairs are already outlier-free.
#[derive(Debug, Clone, Copy, Default)]
pub struct EightPoint;

impl FundamentalEstimator for EightPoint {
    fn estimate(
        &self,
        points1: &[Point2<f64>],
        points2: &[Point2<f64>],
    ) -> Result<Matrix3<f64>, GeometryError> {
        fundamental_8point(points1, points2)
    }
}

/// Normalized 8-point inside a seeded RANSAC loop.
///
/// The seed makes estimation deterministic for a given input, which keeps
/// two-frame matching reproducible across runs.
#[derive(Debug, Clone, Copy)]
pub struct RansacEightPoint {
    /// Maximum number of minimal-sample iterations
    pub max_iters: usize,
    /// Inlier threshold on the symmetric epipolar distance (pixels)
    pub inlier_threshold: f64,
    /// RNG seed for sample selection
    pub seed: u64,
}

impl Default for RansacEightPoint {
    fn default() -> Self {
        Self {
            max_iters: 300,
            inlier_threshold: 1.5,
            seed: 42,
        }
    }
}

impl FundamentalEstimator for RansacEightPoint {
    fn estimate(
        &self,
        points1: &[Point2<f64>],
        points2: &[Point2<f64>],
    ) -> Result<Matrix3<f64>, GeometryError> {
        if points1.len() != points2.len() {
            return Err(GeometryError::PointCountMismatch(
                points1.len(),
                points2.len(),
            ));
        }
        let n = points1.len();
        if n < MIN_SAMPLES {
            return Err(GeometryError::NotEnoughPoints {
                needed: MIN_SAMPLES,
                got: n,
            });
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut best_inliers: Vec<usize> = Vec::new();

        for _ in 0..self.max_iters {
            let sample = rand::seq::index::sample(&mut rng, n, MIN_SAMPLES).into_vec();
            let s1: Vec<_> = sample.iter().map(|&i| points1[i]).collect();
            let s2: Vec<_> = sample.iter().map(|&i| points2[i]).collect();

            let model = match fundamental_8point(&s1, &s2) {
                Ok(model) => model,
                Err(_) => continue,
            };

            let inliers: Vec<usize> = (0..n)
                .filter(|&i| {
                    epipolar_residual(&model, &points1[i], &points2[i]) < self.inlier_threshold
                })
                .collect();

            if inliers.len() > best_inliers.len() {
                best_inliers = inliers;
                if best_inliers.len() == n {
                    break;
                }
            }
        }

        if best_inliers.len() < MIN_SAMPLES {
            return Err(GeometryError::RansacFailed);
        }

        debug!(
            "ransac fundamental: {}/{} inliers after at most {} iterations",
            best_inliers.len(),
            n,
            self.max_iters
        );

        // Refit on the full consensus set
        let i1: Vec<_> = best_inliers.iter().map(|&i| points1[i]).collect();
        let i2: Vec<_> = best_inliers.iter().map(|&i| points2[i]).collect();
        fundamental_8point(&i1, &i2)
    }
}
