//! Candidate masks restricting the descriptor search space
//!
//! A mask is a binary matrix indexed `[keypoint-in-frame2][keypoint-in-frame1]`
//! where a nonzero entry marks the pair as eligible for descriptor
//! comparison. It carries eligibility only, never scores.

use std::collections::{BTreeMap, BTreeSet};

use crate::MatchError;

/// Binary compatibility matrix consumed by the descriptor-matching engine.
///
/// Rows index frame-2 (query) keypoints, columns frame-1 (train) keypoints.
/// Built fresh per matching call and owned by that call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchMask {
    rows: usize,
    cols: usize,
    data: Vec<u8>,
}

impl MatchMask {
    /// An all-ineligible mask of the given shape.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    /// Dense construction: every pairwise combination of the two index lists
    /// is marked eligible.
    ///
    /// Used when the candidate set is already a flat cross-product and no
    /// geometric pruning applies. Out-of-range indices fail fast.
    pub fn from_index_lists(
        num_kp2: usize,
        num_kp1: usize,
        frame1_ids: &[usize],
        frame2_ids: &[usize],
    ) -> Result<Self, MatchError> {
        let mut mask = Self::new(num_kp2, num_kp1);
        for &i2 in frame2_ids {
            for &i1 in frame1_ids {
                mask.set(i2, i1)?;
            }
        }
        Ok(mask)
    }

    /// Sparse construction from a per-keypoint candidate map
    /// (frame-1 index -> set of frame-2 indices).
    ///
    /// Exactly the listed pairs become eligible; everything else stays zero.
    /// Out-of-range indices fail fast.
    pub fn from_candidate_map(
        num_kp2: usize,
        num_kp1: usize,
        map1to2: &BTreeMap<usize, BTreeSet<usize>>,
    ) -> Result<Self, MatchError> {
        let mut mask = Self::new(num_kp2, num_kp1);
        for (&i1, kp2_set) in map1to2 {
            for &i2 in kp2_set {
                mask.set(i2, i1)?;
            }
        }
        Ok(mask)
    }

    /// Rows (frame-2 keypoint count).
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Columns (frame-1 keypoint count).
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Whether a `(frame2, frame1)` keypoint pair may be compared.
    /// Out-of-shape queries are ineligible.
    pub fn is_eligible(&self, kp2: usize, kp1: usize) -> bool {
        kp2 < self.rows && kp1 < self.cols && self.data[kp2 * self.cols + kp1] != 0
    }

    /// Total number of eligible entries.
    pub fn eligible_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    fn set(&mut self, kp2: usize, kp1: usize) -> Result<(), MatchError> {
        if kp2 >= self.rows {
            return Err(MatchError::KeypointIndexOutOfRange {
                index: kp2,
                len: self.rows,
            });
        }
        if kp1 >= self.cols {
            return Err(MatchError::KeypointIndexOutOfRange {
                index: kp1,
                len: self.cols,
            });
        }
        self.data[kp2 * self.cols + kp1] = 1;
        Ok(())
    }
}
