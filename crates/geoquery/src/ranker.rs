//! Bounded top-K ranking of candidates.
//!
//! Each [`BoundedSelection`] keeps at most K candidates under one total
//! order, in a heap whose top is the worst retained candidate so insertion
//! and eviction are O(log K). The [`BoundedRanker`] feeds every candidate to a
//! distance-ordered and a rank-ordered selection and merges them at the end.

use std::{cmp::Ordering, collections::BinaryHeap, fmt, marker::PhantomData};

use ahash::AHashMap as HashMap;
use geoquery_data::FeatureRef;
use itertools::Itertools;

use crate::{keyword::KeywordScore, viewport::ViewportSlot};

/// A candidate that survived retrieval, before enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct PreResult {
    pub feature: FeatureRef,
    pub rank: u8,
    pub distance_m: f64,
    pub keyword: KeywordScore,
    /// Keyword relevance first, nearness second.
    pub priority: f64,
    pub slot: ViewportSlot,
}

/// Distances beyond this are treated as equal when computing priorities.
const MAX_PRIORITY_DISTANCE_M: f64 = 5.0e7;

impl PreResult {
    pub fn new(
        feature: FeatureRef,
        rank: u8,
        distance_m: f64,
        keyword: KeywordScore,
        slot: ViewportSlot,
    ) -> Self {
        let distance_m = if distance_m.is_finite() { distance_m.max(0.0) } else { f64::MAX };
        Self {
            feature,
            rank,
            distance_m,
            keyword,
            priority: f64::from(keyword.weight()) * MAX_PRIORITY_DISTANCE_M
                - distance_m.min(MAX_PRIORITY_DISTANCE_M),
            slot,
        }
    }
}

/// Common tail of every ordering: feature id, then container, then slot.
fn by_identity(a: &PreResult, b: &PreResult) -> Ordering {
    a.feature
        .feature
        .cmp(&b.feature.feature)
        .then(a.feature.container.cmp(&b.feature.container))
        .then(a.slot.cmp(&b.slot))
}

/// A total order over candidates. `Less` means `a` ranks above `b`.
pub trait Criterion {
    const NAME: &'static str;

    fn compare(a: &PreResult, b: &PreResult) -> Ordering;
}

/// Nearest to the pivot first, better keyword match on ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByDistance;

impl Criterion for ByDistance {
    const NAME: &'static str = "distance";

    fn compare(a: &PreResult, b: &PreResult) -> Ordering {
        a.distance_m
            .total_cmp(&b.distance_m)
            .then(b.keyword.cmp(&a.keyword))
            .then_with(|| by_identity(a, b))
    }
}

/// Most important first, nearer on ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByRank;

impl Criterion for ByRank {
    const NAME: &'static str = "rank";

    fn compare(a: &PreResult, b: &PreResult) -> Ordering {
        b.rank
            .cmp(&a.rank)
            .then(a.distance_m.total_cmp(&b.distance_m))
            .then_with(|| by_identity(a, b))
    }
}

struct Ranked<C>(PreResult, PhantomData<C>);

impl<C: Criterion> PartialEq for Ranked<C> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<C: Criterion> Eq for Ranked<C> {}

impl<C: Criterion> PartialOrd for Ranked<C> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Worse candidates compare greater, so the heap top is the one to evict.
impl<C: Criterion> Ord for Ranked<C> {
    fn cmp(&self, other: &Self) -> Ordering {
        C::compare(&self.0, &other.0)
    }
}

/// Fixed-capacity selection of the best candidates under `C`.
pub struct BoundedSelection<C: Criterion> {
    capacity: usize,
    heap: BinaryHeap<Ranked<C>>,
}

impl<C: Criterion> fmt::Debug for BoundedSelection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundedSelection")
            .field("criterion", &C::NAME)
            .field("capacity", &self.capacity)
            .field("len", &self.heap.len())
            .finish()
    }
}

impl<C: Criterion> BoundedSelection<C> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity.min(4096)),
        }
    }

    /// Offer a candidate. Returns whether it was retained.
    pub fn push(&mut self, candidate: PreResult) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if self.heap.len() < self.capacity {
            self.heap.push(Ranked(candidate, PhantomData));
            return true;
        }
        let outranks_worst = self
            .heap
            .peek()
            .is_some_and(|worst| C::compare(&candidate, &worst.0) == Ordering::Less);
        if outranks_worst {
            self.heap.pop();
            self.heap.push(Ranked(candidate, PhantomData));
        }
        outranks_worst
    }

    /// Retained candidates, best first.
    pub fn into_sorted_vec(self) -> Vec<PreResult> {
        self.heap.into_sorted_vec().into_iter().map(|r| r.0).collect()
    }
}

/// Two independent bounded selections fed with the same candidates.
#[derive(Debug)]
pub struct BoundedRanker {
    by_distance: BoundedSelection<ByDistance>,
    by_rank: BoundedSelection<ByRank>,
    offered: usize,
}

impl BoundedRanker {
    pub fn new(capacity: usize) -> Self {
        Self {
            by_distance: BoundedSelection::new(capacity),
            by_rank: BoundedSelection::new(capacity),
            offered: 0,
        }
    }

    pub fn add_candidate(&mut self, candidate: PreResult) {
        self.offered += 1;
        self.by_distance.push(candidate.clone());
        self.by_rank.push(candidate);
    }

    /// Number of candidates offered so far.
    pub fn offered(&self) -> usize {
        self.offered
    }

    /// Deduplicated union of both selections, ordered by feature id.
    ///
    /// A feature present more than once keeps its highest priority; equal
    /// priorities keep the earliest slot.
    pub fn union(self) -> Vec<PreResult> {
        let mut merged: HashMap<FeatureRef, PreResult> = HashMap::new();
        for candidate in self
            .by_distance
            .into_sorted_vec()
            .into_iter()
            .chain(self.by_rank.into_sorted_vec())
        {
            match merged.get(&candidate.feature) {
                Some(existing)
                    if existing
                        .priority
                        .total_cmp(&candidate.priority)
                        .then(candidate.slot.cmp(&existing.slot))
                        != Ordering::Less => {}
                _ => {
                    merged.insert(candidate.feature, candidate);
                }
            }
        }
        merged
            .into_values()
            .sorted_by(|a, b| {
                a.feature
                    .feature
                    .cmp(&b.feature.feature)
                    .then(a.feature.container.cmp(&b.feature.container))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use geoquery_data::ContainerId;

    use super::*;
    use crate::keyword::MatchQuality;

    fn candidate(feature: u32, rank: u8, distance_m: f64) -> PreResult {
        PreResult::new(
            FeatureRef {
                container: ContainerId(feature % 3),
                feature,
            },
            rank,
            distance_m,
            KeywordScore {
                matched_terms: 1,
                quality: MatchQuality::Exact,
                ..KeywordScore::default()
            },
            ViewportSlot::Current,
        )
    }

    /// Deterministic pseudo-random candidates with plenty of ties.
    fn candidates(n: u32) -> Vec<PreResult> {
        let mut state = 0x2545_f491_u64;
        (0..n)
            .map(|i| {
                state = state
                    .wrapping_mul(6_364_136_223_846_793_005)
                    .wrapping_add(1_442_695_040_888_963_407);
                let rank = ((state >> 33) % 100) as u8;
                let distance = ((state >> 13) % 50) as f64 * 10.0;
                candidate(i, rank, distance)
            })
            .collect()
    }

    fn check_selection<C: Criterion>(n: u32, k: usize) {
        let all = candidates(n);
        let mut selection = BoundedSelection::<C>::new(k);
        for c in all.clone() {
            selection.push(c);
        }
        let kept = selection.into_sorted_vec();
        assert_eq!(kept.len(), (n as usize).min(k));

        let mut expected = all;
        expected.sort_by(C::compare);
        expected.truncate(k);
        assert_eq!(kept, expected, "{} selection must keep the best {k}", C::NAME);
    }

    #[test]
    fn test_bounded_selection_keeps_best() {
        for (n, k) in [(0, 5), (3, 5), (5, 5), (1000, 50), (400, 1)] {
            check_selection::<ByDistance>(n, k);
            check_selection::<ByRank>(n, k);
        }
    }

    #[test]
    fn test_push_reports_retention() {
        let mut selection = BoundedSelection::<ByDistance>::new(2);
        assert!(selection.push(candidate(1, 10, 100.0)));
        assert!(selection.push(candidate(2, 10, 300.0)));
        assert!(!selection.push(candidate(3, 99, 500.0)));
        assert!(selection.push(candidate(4, 0, 50.0)));
        let ids: Vec<_> = selection.into_sorted_vec().iter().map(|c| c.feature.feature).collect();
        assert_eq!(ids, vec![4, 1]);
    }

    #[test]
    fn test_ties_break_on_feature_id() {
        let mut selection = BoundedSelection::<ByDistance>::new(2);
        for id in [9, 3, 7, 5] {
            selection.push(candidate(id, 50, 100.0));
        }
        let ids: Vec<_> = selection.into_sorted_vec().iter().map(|c| c.feature.feature).collect();
        assert_eq!(ids, vec![3, 5]);
    }

    #[test]
    fn test_union_deduplicates() {
        let mut ranker = BoundedRanker::new(2);
        // Near but unimportant, far but important, and one in between
        ranker.add_candidate(candidate(1, 5, 10.0));
        ranker.add_candidate(candidate(2, 90, 9000.0));
        ranker.add_candidate(candidate(3, 60, 100.0));
        assert_eq!(ranker.offered(), 3);

        let ids: Vec<_> = ranker.union().iter().map(|c| c.feature.feature).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_union_keeps_higher_priority() {
        let mut ranker = BoundedRanker::new(4);
        let mut weak = candidate(1, 5, 10.0);
        weak.slot = ViewportSlot::Default;
        let strong = PreResult::new(
            weak.feature,
            5,
            10.0,
            KeywordScore {
                matched_terms: 2,
                quality: MatchQuality::Exact,
                ..KeywordScore::default()
            },
            ViewportSlot::Locality,
        );
        ranker.add_candidate(weak);
        ranker.add_candidate(strong.clone());
        assert_eq!(ranker.union(), vec![strong]);
    }
}
