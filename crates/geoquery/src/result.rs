//! Values produced by a search pass.

use std::{cmp::Ordering, collections::BTreeMap, time::Duration};

use geoquery_data::{FeatureClass, FeatureRef, LocaleCode, Point, Rect, TypeCode};

use crate::{
    house::HouseMatchQuality,
    keyword::{HighlightRange, KeywordScore},
    viewport::ViewportSlot,
};

/// How a search call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SearchStatus {
    /// Results were written.
    Completed,
    /// The pass was cancelled; results and caches are untouched.
    Aborted,
}

impl SearchStatus {
    pub fn is_aborted(self) -> bool {
        self == Self::Aborted
    }
}

/// A feature that survived bounded ranking, enriched for display.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RankedResult {
    pub feature: FeatureRef,
    pub class: FeatureClass,
    /// Best matching name; empty for unnamed features.
    pub name: String,
    pub name_locale: LocaleCode,
    pub center: Point,
    pub rect: Rect,
    /// Distance from the rank pivot.
    pub distance_m: f64,
    pub rank: u8,
    pub slot: ViewportSlot,
    pub keyword: KeywordScore,
    pub types: Vec<TypeCode>,
    /// Display name of the first known category.
    pub type_name: Option<String>,
    /// Region containing the feature, for display.
    pub region: Option<String>,
    /// "<street> <house number>" for addressed features.
    pub address: Option<String>,
    pub highlights: Vec<HighlightRange>,
    /// Set for results of address search.
    pub house: Option<HouseMatchQuality>,
    /// Close to the pivot and notable enough to be promoted.
    pub preferred: bool,
}

/// Final display order, a total order.
///
/// Address matches come first, then keyword relevance, then the preferred
/// tier, then distance, rank and identity. Name locale and full-name matches
/// do not take part.
pub fn compare_results(a: &RankedResult, b: &RankedResult) -> Ordering {
    b.house
        .cmp(&a.house)
        .then(b.keyword.relevance().cmp(&a.keyword.relevance()))
        .then(b.preferred.cmp(&a.preferred))
        .then(a.distance_m.total_cmp(&b.distance_m))
        .then(b.rank.cmp(&a.rank))
        .then(a.feature.feature.cmp(&b.feature.feature))
        .then(a.feature.container.cmp(&b.feature.container))
}

/// A query that reads as a coordinate pair.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CoordinateMatch {
    pub point: Point,
    pub distance_m: Option<f64>,
    pub region: Option<String>,
}

/// Counters of the last search pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassStats {
    /// Geo-index queries per viewport slot.
    pub geo_queries: BTreeMap<ViewportSlot, usize>,
    /// Retrieved candidates per viewport slot.
    pub candidates: BTreeMap<ViewportSlot, u64>,
    /// Geo-index queries issued by locality and address resolution.
    pub resolver_geo_queries: usize,
    /// Candidates offered to the bounded ranker.
    pub ranked: usize,
    pub results: usize,
    pub locality: Option<String>,
    pub house: Option<HouseMatchQuality>,
    pub aborted: bool,
    pub elapsed: Duration,
}

impl PassStats {
    pub fn geo_queries(&self, slot: ViewportSlot) -> usize {
        self.geo_queries.get(&slot).copied().unwrap_or(0)
    }

    /// Whether `slot` was searched at all.
    pub fn searched(&self, slot: ViewportSlot) -> bool {
        self.candidates.contains_key(&slot)
    }
}

/// Cache occupancy, for diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub rank_tables: usize,
    pub cached_slots: Vec<ViewportSlot>,
}

#[cfg(test)]
mod tests {
    use geoquery_data::ContainerId;

    use super::*;
    use crate::keyword::MatchQuality;

    fn result(feature: u32, distance_m: f64, rank: u8, preferred: bool) -> RankedResult {
        RankedResult {
            feature: FeatureRef {
                container: ContainerId(1),
                feature,
            },
            class: FeatureClass::Poi,
            name: String::new(),
            name_locale: LocaleCode::DEFAULT,
            center: Point::default(),
            rect: Rect::default(),
            distance_m,
            rank,
            slot: ViewportSlot::Current,
            keyword: KeywordScore {
                matched_terms: 1,
                quality: MatchQuality::Exact,
                ..KeywordScore::default()
            },
            types: Vec::new(),
            type_name: None,
            region: None,
            address: None,
            highlights: Vec::new(),
            house: None,
            preferred,
        }
    }

    #[test]
    fn test_preferred_tier_comes_first() {
        let mut results = vec![
            result(1, 100.0, 10, false),
            result(2, 300.0, 60, true),
            result(3, 200.0, 50, true),
            result(4, 200.0, 50, true),
        ];
        results.sort_by(compare_results);
        let ids: Vec<_> = results.iter().map(|r| r.feature.feature).collect();
        assert_eq!(ids, vec![3, 4, 2, 1]);
    }

    #[test]
    fn test_name_locale_does_not_outrank_distance() {
        let mut translated = result(1, 7000.0, 10, false);
        translated.keyword.full_name = true;
        translated.keyword.locale_priority = 3;
        let mut native = result(2, 100.0, 60, true);
        native.keyword.locale_priority = 1;
        let mut other_language = result(3, 250.0, 5, false);
        other_language.keyword.locale_priority = 0;

        let mut results = vec![translated, native, other_language];
        results.sort_by(compare_results);
        let ids: Vec<_> = results.iter().map(|r| r.feature.feature).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        // More matched terms still come first
        let mut two_terms = result(4, 9000.0, 0, false);
        two_terms.keyword.matched_terms = 2;
        results.push(two_terms);
        results.sort_by(compare_results);
        assert_eq!(results[0].feature.feature, 4);
    }

    #[test]
    fn test_address_matches_lead() {
        let mut street = result(9, 5000.0, 0, false);
        street.house = Some(HouseMatchQuality::Approximate);
        let mut results = vec![result(1, 10.0, 90, true), street];
        results.sort_by(compare_results);
        assert_eq!(results[0].feature.feature, 9);
    }

    #[test]
    fn test_stats_defaults() {
        let stats = PassStats::default();
        assert_eq!(stats.geo_queries(ViewportSlot::Current), 0);
        assert!(!stats.searched(ViewportSlot::Current));
    }
}
