//! Descriptor-matching engine interface and brute-force implementation
//!
//! The matching core only needs nearest-descriptor selection under an
//! optional eligibility mask; everything else about descriptor comparison
//! stays behind [`DescriptorMatcher`] so engines can be swapped or mocked.

use crate::descriptor::BinaryDescriptor;
use crate::mask::MatchMask;

/// A raw index-pair match emitted by a descriptor engine.
///
/// `query_idx` indexes the frame-2 descriptor set, `train_idx` the frame-1
/// set, following the reference convention of querying the newer frame
/// against the older one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMatch {
    /// Index into the query (frame 2) descriptor set
    pub query_idx: usize,
    /// Index into the train (frame 1) descriptor set
    pub train_idx: usize,
    /// Hamming distance between the two descriptors
    pub distance: u32,
}

/// Nearest-descriptor matching under an optional candidate mask.
///
/// Implementations emit at most one best match per query index (nearest
/// neighbor, not a bipartite assignment). With a mask, only pairs whose
/// `[query][train]` entry is eligible may be compared; without one, all pairs
/// are. Emission order must be deterministic for identical inputs.
pub trait DescriptorMatcher {
    fn match_descriptors(
        &self,
        query: &[BinaryDescriptor],
        train: &[BinaryDescriptor],
        mask: Option<&MatchMask>,
    ) -> Vec<RawMatch>;
}

/// Brute-force Hamming nearest-neighbor matcher.
///
/// Scans every eligible train descriptor per query and keeps the closest,
/// breaking ties toward the lower train index. An optional absolute distance
/// cap rejects matches worse than the cap; by default no cap is applied, so
/// the engine returns the nearest eligible descriptor unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct HammingMatcher {
    max_distance: Option<u32>,
}

impl HammingMatcher {
    /// Matcher without a distance cap
    pub fn new() -> Self {
        Self { max_distance: None }
    }

    /// Reject matches with Hamming distance above `cap`
    pub fn with_max_distance(mut self, cap: u32) -> Self {
        self.max_distance = Some(cap);
        self
    }
}

impl DescriptorMatcher for HammingMatcher {
    fn match_descriptors(
        &self,
        query: &[BinaryDescriptor],
        train: &[BinaryDescriptor],
        mask: Option<&MatchMask>,
    ) -> Vec<RawMatch> {
        let mut matches = Vec::new();

        for (q_idx, q_desc) in query.iter().enumerate() {
            let mut best: Option<(usize, u32)> = None;

            for (t_idx, t_desc) in train.iter().enumerate() {
                if let Some(mask) = mask {
                    if !mask.is_eligible(q_idx, t_idx) {
                        continue;
                    }
                }

                let dist = q_desc.hamming_distance(t_desc);
                match best {
                    Some((_, best_dist)) if best_dist <= dist => {}
                    _ => best = Some((t_idx, dist)),
                }
            }

            if let Some((t_idx, dist)) = best {
                if self.max_distance.map_or(true, |cap| dist <= cap) {
                    matches.push(RawMatch {
                        query_idx: q_idx,
                        train_idx: t_idx,
                        distance: dist,
                    });
                }
            }
        }

        matches
    }
}
