//! Locality resolution: a leading run of query words naming a city or region.
//!
//! Windows of the leading complete words are tried longest first against the
//! world containers. The first window with a confident match wins and its
//! words are consumed, so "springfield main street" searches "main street"
//! inside Springfield.

use std::cmp::Ordering;

use geoquery_data::{Bitmap, ContainerKind, FeatureClass, FeatureRef, MapContainer, Rect};
use tracing::{debug, instrument};

use crate::{
    cancel::Outcome,
    context::PassContext,
    keyword::{KeywordScore, MatchQuality, QueryTerm},
    retrieval::{RetrievalCallback, RetrievalRequest},
};

const LOCALITY_CLASSES: [FeatureClass; 3] =
    [FeatureClass::City, FeatureClass::Region, FeatureClass::Country];

/// A city, region or country named by the query.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Locality {
    pub feature: FeatureRef,
    pub class: FeatureClass,
    pub name: String,
    pub rect: Rect,
    pub rank: u8,
    /// Leading query words consumed by the locality.
    pub token_count: usize,
    pub confidence: f32,
}

/// The best city and the best region for one window of words.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalityMatch {
    pub city: Option<Locality>,
    /// Best region or country.
    pub region: Option<Locality>,
}

impl LocalityMatch {
    /// The city when there is one, else the region.
    pub fn best(&self) -> Option<&Locality> {
        self.city.as_ref().or(self.region.as_ref())
    }

    pub fn token_count(&self) -> usize {
        self.best().map_or(0, |l| l.token_count)
    }

    /// Rectangle scoping searches inside the locality.
    pub fn rect(&self) -> Option<Rect> {
        self.best().map(|l| l.rect)
    }
}

/// Confidence in `[0, 1]` that a keyword match names the locality.
pub fn confidence(score: &KeywordScore, rank: u8) -> f32 {
    let quality = match score.quality {
        MatchQuality::Exact => 1.0,
        MatchQuality::Prefix => 0.7,
        MatchQuality::Fuzzy => 0.55,
        MatchQuality::None => return 0.0,
    };
    let completeness = if score.full_name { 1.0 } else { 0.85 };
    quality * completeness * (0.8 + 0.2 * f32::from(rank) / 255.0)
}

/// Higher confidence, then rank, then lower identity.
fn better(a: &Locality, b: &Locality) -> bool {
    a.confidence
        .total_cmp(&b.confidence)
        .then(a.rank.cmp(&b.rank))
        .then(b.feature.cmp(&a.feature))
        == Ordering::Greater
}

struct LocalityCollector<'c, 'a> {
    ctx: &'c mut PassContext<'a>,
    window: &'c [QueryTerm],
    found: LocalityMatch,
}

impl LocalityCollector<'_, '_> {
    fn offer(&mut self, locality: Locality) {
        let slot = if locality.class == FeatureClass::City {
            &mut self.found.city
        } else {
            &mut self.found.region
        };
        if slot.as_ref().is_none_or(|current| better(&locality, current)) {
            *slot = Some(locality);
        }
    }
}

impl RetrievalCallback for LocalityCollector<'_, '_> {
    fn on_features_retrieved(
        &mut self,
        container: &dyn MapContainer,
        _scale: u8,
        features: &Bitmap,
    ) -> Outcome<()> {
        let Some(ranks) = self.ctx.rank_table(container) else {
            return Ok(());
        };
        let min_confidence = self.ctx.config.locality.min_confidence;
        for id in features.iter() {
            self.ctx.cancel.check()?;
            let Some(record) = self.ctx.load_feature(container, id) else {
                continue;
            };
            if !record.class.is_locality() {
                continue;
            }
            // Category types never name a place, so score on names only.
            let Some(best) = self.ctx.matcher.best_name(self.window, &record.names, &[]) else {
                continue;
            };
            if !best.score.matches_all(self.window.len()) {
                continue;
            }
            let rank = ranks.get(id);
            let confidence = confidence(&best.score, rank);
            if confidence < min_confidence {
                continue;
            }
            self.offer(Locality {
                feature: FeatureRef {
                    container: container.id(),
                    feature: id,
                },
                class: record.class,
                name: best.name,
                rect: record.rect,
                rank,
                token_count: self.window.len(),
                confidence,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalityResolver;

impl LocalityResolver {
    /// Find the locality named by the leading complete `terms`.
    #[instrument(name = "Resolve locality", level = "debug", skip_all, fields(terms = terms.len()))]
    pub fn resolve(
        ctx: &mut PassContext<'_>,
        terms: &[QueryTerm],
    ) -> Outcome<Option<LocalityMatch>> {
        let full = terms.iter().take_while(|t| !t.prefix).count();
        let longest = full.min(ctx.config.locality.max_locality_tokens);
        if longest == 0 {
            return Ok(None);
        }
        let containers = ctx.containers_of(ContainerKind::World);
        let retrieval = ctx.retrieval;
        let cancel = ctx.cancel;

        for len in (1..=longest).rev() {
            let window = &terms[..len];
            let mut collector = LocalityCollector {
                ctx: &mut *ctx,
                window,
                found: LocalityMatch::default(),
            };
            let request = RetrievalRequest::new(window, Rect::world()).classes(&LOCALITY_CLASSES);
            let report = retrieval.retrieve(&containers, &request, cancel, &mut collector)?;
            let found = collector.found;
            ctx.stats.resolver_geo_queries += report.geo_queries;
            if let Some(best) = found.best() {
                debug!(
                    name = %best.name,
                    confidence = best.confidence,
                    tokens = len,
                    "Locality resolved"
                );
                return Ok(Some(found));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use geoquery_data::{
        LocaleCode,
        test_data::{TestDataConfig, TestWorld, WORLD_CONTAINER, generate_city},
    };

    use super::*;
    use crate::{
        cancel::CancelHandle, config::SearchConfig, keyword::KeywordMatcher,
        rank_table::RankTableCache, retrieval::RetrievalEngine,
    };

    fn containers(world: TestWorld) -> Vec<Arc<dyn MapContainer>> {
        let mut out: Vec<Arc<dyn MapContainer>> = vec![Arc::new(world.world)];
        out.extend(world.countries.into_iter().map(|c| Arc::new(c) as Arc<dyn MapContainer>));
        out
    }

    fn resolve(text: &[(&str, bool)], locales: &[LocaleCode]) -> Option<LocalityMatch> {
        let world = generate_city(&TestDataConfig::minimal()).unwrap();
        let center = world.springfield_center;
        let containers = containers(world);
        let config = SearchConfig::default();
        let retrieval = RetrievalEngine::new(config.retrieval.clone());
        let ranks = RankTableCache::new();
        let cancel = CancelHandle::new();
        let mut ctx = PassContext::new(
            &containers,
            &config,
            &cancel,
            &retrieval,
            &ranks,
            KeywordMatcher::new(locales),
            center,
        );
        let terms: Vec<_> = text.iter().map(|(w, p)| QueryTerm::new(*w, *p)).collect();
        LocalityResolver::resolve(&mut ctx, &terms).unwrap()
    }

    fn feature(id: u32) -> FeatureRef {
        FeatureRef {
            container: WORLD_CONTAINER,
            feature: id,
        }
    }

    #[test]
    fn test_confidence_grades() {
        let exact = KeywordScore {
            matched_terms: 1,
            quality: MatchQuality::Exact,
            full_name: true,
            locale_priority: 1,
        };
        let fuzzy = KeywordScore {
            quality: MatchQuality::Fuzzy,
            ..exact
        };
        assert!(confidence(&exact, 200) > 0.9);
        assert!(confidence(&exact, 0) > confidence(&fuzzy, 255));
        assert!(confidence(&fuzzy, 0) < 0.5);
        assert_eq!(confidence(&KeywordScore::default(), 255), 0.0);
    }

    #[test]
    fn test_city_consumes_leading_word() {
        let words = [("springfield", false), ("main", false), ("st", true)];
        let found = resolve(&words, &[LocaleCode::DEFAULT]).unwrap();
        let city = found.city.as_ref().unwrap();
        assert_eq!(city.feature, feature(2));
        assert_eq!(city.name, "Springfield");
        assert_eq!(found.token_count(), 1);
        assert!(found.region.is_none());
    }

    #[test]
    fn test_two_word_region() {
        let words = [("north", false), ("province", false), ("cafe", true)];
        let found = resolve(&words, &[LocaleCode::DEFAULT]).unwrap();
        assert!(found.city.is_none());
        assert_eq!(found.best().map(|l| l.feature), Some(feature(1)));
        assert_eq!(found.token_count(), 2);
    }

    #[test]
    fn test_localized_and_misspelled_names() {
        let de = LocaleCode::from_tag("de").unwrap();
        let found =
            resolve(&[("springfeld", false), ("cafe", true)], &[de, LocaleCode::DEFAULT]).unwrap();
        let city = found.city.map(|c| (c.feature, c.name));
        assert_eq!(city, Some((feature(2), "Springfeld".to_string())));

        // One typo in an eleven letter name is tolerated
        let found =
            resolve(&[("sprinfield", false), ("cafe", true)], &[LocaleCode::DEFAULT]).unwrap();
        assert_eq!(found.best().map(|l| l.feature), Some(feature(2)));
    }

    #[test]
    fn test_no_locality() {
        assert!(resolve(&[("main", false), ("street", true)], &[LocaleCode::DEFAULT]).is_none());
        // A lone prefix is never consumed
        assert!(resolve(&[("springfield", true)], &[LocaleCode::DEFAULT]).is_none());
    }
}
