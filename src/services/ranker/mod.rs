//! Top-K selection
//!
//! For every product, selects the K highest-scoring users that have not
//! already interacted with it, plus one global fallback list with no
//! exclusion. Selection uses a bounded min-heap of size K scanned once
//! over the candidates, so a whole-catalog build costs
//! O(candidate_evaluations * log K) instead of a full sort per product.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use tracing::debug;

use crate::models::RankedUser;

/// Candidate ordering: higher score wins, equal scores break ties toward
/// the lower user_id so rankings are fully deterministic.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    user_id: u64,
    score: f64,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // Scores are clamped to [0, 1] upstream, never NaN.
        self.score
            .partial_cmp(&other.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.user_id.cmp(&self.user_id))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

pub struct TopKRanker {
    k: usize,
}

impl TopKRanker {
    pub fn new(k: usize) -> Self {
        Self { k }
    }

    /// Rank the eligible users for one product. Users in `excluded` never
    /// appear in the result. Returns an empty ranking when no candidate is
    /// eligible; the serving layer treats that the same as an unknown
    /// product.
    pub fn rank_product(
        &self,
        scores: &HashMap<u64, f64>,
        excluded: &HashSet<u64>,
    ) -> Vec<RankedUser> {
        let ranking = self.select_top_k(
            scores
                .iter()
                .filter(|(user_id, _)| !excluded.contains(user_id))
                .map(|(user_id, score)| Candidate {
                    user_id: *user_id,
                    score: *score,
                }),
        );

        debug!(
            excluded_count = excluded.len(),
            ranked_count = ranking.len(),
            "Ranked product candidates"
        );

        ranking
    }

    /// The global fallback: top-K over every scored user, no exclusion.
    /// Computed once per build and reused for every unseen product.
    pub fn global_fallback(&self, scores: &HashMap<u64, f64>) -> Vec<RankedUser> {
        self.select_top_k(scores.iter().map(|(user_id, score)| Candidate {
            user_id: *user_id,
            score: *score,
        }))
    }

    /// Bounded selection: a min-heap of size K keeps the worst retained
    /// candidate on top; anything better evicts it.
    fn select_top_k(&self, candidates: impl Iterator<Item = Candidate>) -> Vec<RankedUser> {
        let mut heap: BinaryHeap<Reverse<Candidate>> = BinaryHeap::with_capacity(self.k + 1);

        for candidate in candidates {
            if heap.len() < self.k {
                heap.push(Reverse(candidate));
            } else if let Some(Reverse(worst)) = heap.peek() {
                if candidate > *worst {
                    heap.pop();
                    heap.push(Reverse(candidate));
                }
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .enumerate()
            .map(|(idx, Reverse(candidate))| RankedUser {
                user_id: candidate.user_id,
                score: candidate.score,
                rank: (idx + 1) as u32,
            })
            .collect()
    }
}
