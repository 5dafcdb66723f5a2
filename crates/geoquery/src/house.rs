//! Address search: house numbers matched against streets and buildings.
//!
//! Resolution narrows down from buildings carrying the exact number, to
//! streets whose house ranges contain it, to the nearest matching street.

use std::cmp::Ordering;

use ahash::AHashMap as HashMap;
use geoquery_data::{
    Bitmap, ContainerId, ContainerKind, FeatureClass, FeatureId, FeatureRef, HouseRange,
    MapContainer, Rect, normalize::normalize,
};
use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, instrument};

use crate::{
    cancel::Outcome,
    context::PassContext,
    keyword::{KeywordScore, QueryTerm},
    retrieval::{RetrievalCallback, RetrievalRequest},
};

/// Digits, optionally followed by a letter or a "/n" suffix: "12", "12b", "7/2".
static HOUSE_NUMBER_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,5})(?:[a-z]|/\d{1,4}[a-z]?)?$").expect("house number pattern is valid")
});

/// Common street-type abbreviations and their full forms.
pub const STREET_ABBREVIATIONS: &[(&str, &str)] = &[
    ("st", "street"),
    ("str", "strasse"),
    ("ave", "avenue"),
    ("av", "avenue"),
    ("rd", "road"),
    ("blvd", "boulevard"),
    ("ln", "lane"),
    ("dr", "drive"),
    ("sq", "square"),
    ("pl", "place"),
];

/// At most this many streets are considered for one address.
const MAX_STREETS: usize = 16;

/// A house number token as typed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HouseNumber {
    /// Normalized token, e.g. "12b".
    pub raw: String,
    /// Leading numeric part, used against house ranges.
    pub number: u32,
}

impl HouseNumber {
    pub fn parse(token: &str) -> Option<Self> {
        let raw = normalize(token);
        let number = HOUSE_NUMBER_REGEX.captures(&raw)?.get(1)?.as_str().parse().ok()?;
        Some(Self { raw, number })
    }

    /// Whether a building's house number denotes this one.
    pub fn matches(&self, building_number: &str) -> bool {
        normalize(building_number) == self.raw
    }
}

/// How precisely an address was located, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HouseMatchQuality {
    /// Only the street is known.
    Approximate,
    /// The street's house ranges contain the number.
    InRange,
    /// A building carries the number.
    Exact,
}

/// Result of address search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HouseMatch {
    pub house: HouseNumber,
    pub quality: HouseMatchQuality,
    /// Matched streets, best first.
    pub streets: Vec<FeatureRef>,
    /// Buildings carrying the number; empty unless the match is exact.
    pub buildings: Vec<FeatureRef>,
}

/// Add the full forms of street abbreviations as synonyms.
pub fn with_street_synonyms(terms: &[QueryTerm]) -> Vec<QueryTerm> {
    terms
        .iter()
        .map(|term| {
            let mut term = term.clone();
            for (short, long) in STREET_ABBREVIATIONS {
                if term.text == *short && !term.synonyms.iter().any(|s| s == long) {
                    term.synonyms.push((*long).to_string());
                }
            }
            term
        })
        .collect()
}

#[derive(Debug, Clone)]
struct StreetCandidate {
    feature: FeatureRef,
    keyword: KeywordScore,
    distance_m: f64,
    ranges: Vec<HouseRange>,
}

impl StreetCandidate {
    /// Better keyword match first, then nearer, then identity.
    fn compare(a: &Self, b: &Self) -> Ordering {
        b.keyword
            .cmp(&a.keyword)
            .then(a.distance_m.total_cmp(&b.distance_m))
            .then(a.feature.cmp(&b.feature))
    }
}

struct StreetCollector<'c, 'a> {
    ctx: &'c mut PassContext<'a>,
    terms: &'c [QueryTerm],
    streets: Vec<StreetCandidate>,
}

impl RetrievalCallback for StreetCollector<'_, '_> {
    fn on_features_retrieved(
        &mut self,
        container: &dyn MapContainer,
        _scale: u8,
        features: &Bitmap,
    ) -> Outcome<()> {
        for id in features.iter() {
            self.ctx.cancel.check()?;
            let Some(record) = self.ctx.load_feature(container, id) else {
                continue;
            };
            let keyword = self.ctx.matcher.score(self.terms, &record.names, &record.types);
            if !keyword.matches_all(self.terms.len()) {
                continue;
            }
            self.streets.push(StreetCandidate {
                feature: FeatureRef {
                    container: container.id(),
                    feature: id,
                },
                keyword,
                distance_m: record.rect.distance_to_m(&self.ctx.pivot),
                ranges: record.address.house_ranges,
            });
        }
        Ok(())
    }
}

struct BuildingCollector<'c, 'a> {
    ctx: &'c PassContext<'a>,
    house: &'c HouseNumber,
    streets: &'c HashMap<ContainerId, Vec<FeatureId>>,
    buildings: Vec<(FeatureRef, FeatureRef)>,
}

impl RetrievalCallback for BuildingCollector<'_, '_> {
    fn on_features_retrieved(
        &mut self,
        container: &dyn MapContainer,
        _scale: u8,
        features: &Bitmap,
    ) -> Outcome<()> {
        let Some(streets) = self.streets.get(&container.id()) else {
            return Ok(());
        };
        for id in features.iter() {
            self.ctx.cancel.check()?;
            let Some(record) = self.ctx.load_feature(container, id) else {
                continue;
            };
            let on_street = record.address.street.filter(|s| streets.contains(s));
            let numbered = record
                .address
                .house_number
                .as_deref()
                .is_some_and(|n| self.house.matches(n));
            if let (Some(street), true) = (on_street, numbered) {
                let container = container.id();
                let building = FeatureRef {
                    container,
                    feature: id,
                };
                let street = FeatureRef {
                    container,
                    feature: street,
                };
                self.buildings.push((building, street));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HouseResolver;

impl HouseResolver {
    /// Locate `house` on a street named by `street_terms` inside `scope`.
    ///
    /// Returns `Ok(None)` when no street matches.
    #[instrument(
        name = "Resolve house",
        level = "debug",
        skip_all,
        fields(house = %house.raw, terms = street_terms.len())
    )]
    pub fn resolve(
        ctx: &mut PassContext<'_>,
        street_terms: &[QueryTerm],
        house: &HouseNumber,
        scope: Rect,
    ) -> Outcome<Option<HouseMatch>> {
        if street_terms.is_empty() {
            return Ok(None);
        }
        let terms = with_street_synonyms(street_terms);
        let containers = ctx.containers_of(ContainerKind::Country);
        let retrieval = ctx.retrieval;
        let cancel = ctx.cancel;

        let mut collector = StreetCollector {
            ctx: &mut *ctx,
            terms: &terms,
            streets: Vec::new(),
        };
        let request = RetrievalRequest::new(&terms, scope).classes(&[FeatureClass::Street]);
        let report = retrieval.retrieve(&containers, &request, cancel, &mut collector)?;
        let streets: Vec<StreetCandidate> = collector
            .streets
            .into_iter()
            .sorted_by(StreetCandidate::compare)
            .take(MAX_STREETS)
            .collect();
        ctx.stats.resolver_geo_queries += report.geo_queries;
        if streets.is_empty() {
            debug!("No street matches the address");
            return Ok(None);
        }

        let mut by_container: HashMap<ContainerId, Vec<FeatureId>> = HashMap::new();
        for street in &streets {
            by_container
                .entry(street.feature.container)
                .or_default()
                .push(street.feature.feature);
        }
        let street_containers: Vec<_> = containers
            .into_iter()
            .filter(|c| by_container.contains_key(&c.id()))
            .collect();
        let mut buildings = BuildingCollector {
            ctx: &*ctx,
            house,
            streets: &by_container,
            buildings: Vec::new(),
        };
        let request = RetrievalRequest::new(&[], scope).classes(&[FeatureClass::Building]);
        let report = retrieval.retrieve(&street_containers, &request, cancel, &mut buildings)?;
        let buildings = buildings.buildings;
        ctx.stats.resolver_geo_queries += report.geo_queries;

        let found = if buildings.is_empty() {
            let in_range: Vec<FeatureRef> = streets
                .iter()
                .filter(|s| s.ranges.iter().any(|r| r.contains(house.number)))
                .map(|s| s.feature)
                .collect();
            if in_range.is_empty() {
                HouseMatch {
                    house: house.clone(),
                    quality: HouseMatchQuality::Approximate,
                    streets: vec![streets[0].feature],
                    buildings: Vec::new(),
                }
            } else {
                HouseMatch {
                    house: house.clone(),
                    quality: HouseMatchQuality::InRange,
                    streets: in_range,
                    buildings: Vec::new(),
                }
            }
        } else {
            let (buildings, matched_streets): (Vec<_>, Vec<_>) =
                buildings.into_iter().sorted().unzip();
            HouseMatch {
                house: house.clone(),
                quality: HouseMatchQuality::Exact,
                streets: streets
                    .iter()
                    .map(|s| s.feature)
                    .filter(|f| matched_streets.contains(f))
                    .collect(),
                buildings,
            }
        };
        debug!(
            quality = ?found.quality,
            streets = found.streets.len(),
            buildings = found.buildings.len(),
            "Address resolved"
        );
        Ok(Some(found))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use geoquery_data::{
        LocaleCode,
        test_data::{TestDataConfig, TestWorld, generate_city},
    };

    use super::*;
    use crate::{
        cancel::{CancelHandle, Cancelled},
        config::SearchConfig,
        keyword::KeywordMatcher,
        rank_table::RankTableCache,
        retrieval::RetrievalEngine,
    };

    fn containers(world: TestWorld) -> Vec<Arc<dyn MapContainer>> {
        let mut out: Vec<Arc<dyn MapContainer>> = vec![Arc::new(world.world)];
        out.extend(world.countries.into_iter().map(|c| Arc::new(c) as Arc<dyn MapContainer>));
        out
    }

    fn terms(words: &[&str]) -> Vec<QueryTerm> {
        let last = words.len().saturating_sub(1);
        words
            .iter()
            .enumerate()
            .map(|(i, w)| QueryTerm::new(*w, i == last))
            .collect()
    }

    fn resolve(words: &[&str], house: &str, cancel: &CancelHandle) -> Outcome<Option<HouseMatch>> {
        let world = generate_city(&TestDataConfig::minimal()).unwrap();
        let scope = world.springfield_rect;
        let center = world.springfield_center;
        let containers = containers(world);
        let config = SearchConfig::default();
        let retrieval = RetrievalEngine::new(config.retrieval.clone());
        let ranks = RankTableCache::new();
        let mut ctx = PassContext::new(
            &containers,
            &config,
            cancel,
            &retrieval,
            &ranks,
            KeywordMatcher::new(&[LocaleCode::DEFAULT]),
            center,
        );
        let house = HouseNumber::parse(house).unwrap();
        HouseResolver::resolve(&mut ctx, &terms(words), &house, scope)
    }

    fn street(feature: u32) -> FeatureRef {
        FeatureRef {
            container: ContainerId(1),
            feature,
        }
    }

    #[test]
    fn test_parse_house_numbers() {
        let h = HouseNumber::parse("12B").unwrap();
        assert_eq!((h.raw.as_str(), h.number), ("12b", 12));
        assert_eq!(HouseNumber::parse("7/2").map(|h| h.number), Some(7));
        assert!(HouseNumber::parse("main").is_none());
        assert!(HouseNumber::parse("12th").is_none());
        assert!(HouseNumber::parse("123456").is_none());
        assert!(h.matches("12b"));
        assert!(!h.matches("12"));
    }

    #[test]
    fn test_street_synonyms() {
        let expanded = with_street_synonyms(&terms(&["main", "st"]));
        assert!(expanded[0].synonyms.is_empty());
        assert_eq!(expanded[1].synonyms, vec!["street".to_string()]);
    }

    #[test]
    fn test_exact_building() {
        let found = resolve(&["oak", "avenue"], "12", &CancelHandle::new()).unwrap().unwrap();
        assert_eq!(found.quality, HouseMatchQuality::Exact);
        assert_eq!(found.buildings, vec![street(4)]);
        assert_eq!(found.streets, vec![street(1)]);
    }

    #[test]
    fn test_number_in_street_range() {
        let found = resolve(&["oak", "ave"], "50", &CancelHandle::new()).unwrap().unwrap();
        assert_eq!(found.quality, HouseMatchQuality::InRange);
        assert_eq!(found.streets, vec![street(1)]);
        assert!(found.buildings.is_empty());
    }

    #[test]
    fn test_falls_back_to_nearest_street() {
        // Main Street has no house ranges; the Shelbyville one is out of scope.
        let found = resolve(&["main", "st"], "1", &CancelHandle::new()).unwrap().unwrap();
        assert_eq!(found.quality, HouseMatchQuality::Approximate);
        assert_eq!(found.streets, vec![street(0)]);
    }

    #[test]
    fn test_unknown_street() {
        assert_eq!(resolve(&["nowhere", "lane"], "5", &CancelHandle::new()), Ok(None));
    }

    #[test]
    fn test_cancelled_resolution() {
        let cancel = CancelHandle::new();
        cancel.cancel();
        assert_eq!(resolve(&["main", "st"], "1", &cancel), Err(Cancelled));
    }
}
