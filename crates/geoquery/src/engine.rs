//! The query orchestrator.
//!
//! [`MapSearcher`] owns the query state, the viewport slots with their geo
//! caches and the rank table cache. Each call to [`MapSearcher::search`] runs
//! one pass:
//!
//! 1. parse the query, splitting off a house number when address search is on,
//! 2. resolve a leading locality and, with a house number, the address,
//! 3. retrieve and rank candidates slot by slot (Current, Locality, Default),
//! 4. enrich the bounded union of both rankings and order it.
//!
//! Everything a pass writes is staged and published only when it completes.
//! A cancelled pass returns [`SearchStatus::Aborted`] and leaves the caller's
//! results and every cache as they were.
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use geoquery::{
//!     MapSearcher, SearchStatus,
//!     data::{MapContainer, test_data::{TestDataConfig, generate_city}},
//! };
//!
//! let world = generate_city(&TestDataConfig::minimal())?;
//! let mut searcher = MapSearcher::builder()
//!     .container(Arc::new(world.world))
//!     .containers(world.countries.into_iter().map(|c| Arc::new(c) as Arc<dyn MapContainer>))
//!     .categories(Arc::new(world.categories))
//!     .build()?;
//!
//! searcher.set_viewport(world.springfield_rect, false);
//! searcher.set_query("museum");
//! let mut results = Vec::new();
//! assert_eq!(searcher.search(&mut results, 10), SearchStatus::Completed);
//! assert_eq!(results[0].name, "City Museum");
//! # Ok::<(), geoquery::error::GeoQueryError>(())
//! ```

use std::{sync::Arc, time::Instant};

use ahash::AHashMap as HashMap;
use geoquery_data::{
    Bitmap, Categories, CategoryTaxonomy, ContainerId, CountryInfo, FeatureRecord, FeatureRef,
    LocaleCode, MapContainer, Point, Rect,
};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::{
    cancel::{CancelHandle, Cancelled, Outcome},
    config::{Mode, SearchConfig},
    context::PassContext,
    error::Result,
    house::{HouseMatch, HouseMatchQuality, HouseResolver},
    keyword::{KeywordMatcher, KeywordScore, MatchQuality, QueryTerm},
    locality::{LocalityMatch, LocalityResolver},
    query::QueryState,
    rank_table::RankTableCache,
    ranker::{BoundedRanker, PreResult},
    result::{CacheStats, CoordinateMatch, PassStats, RankedResult, SearchStatus, compare_results},
    retrieval::{RetrievalCallback, RetrievalEngine, RetrievalRequest},
    suggest::{Suggestion, SuggestionEngine},
    viewport::{GeoCache, ViewportSlot, ViewportStage, Viewports},
};

/// Half side of the Default slot around the position in [`Mode::Nearby`].
const NEARBY_RADIUS_M: f64 = 20_000.0;

/// "lat, lon" in decimal degrees, separated by a comma, a semicolon or whitespace.
static COORDINATES_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?\d{1,3}(?:\.\d+)?)\s*(?:[,;]\s*|\s+)([+-]?\d{1,3}(?:\.\d+)?)\s*$")
        .expect("coordinate pattern is valid")
});

/// Parse a "lat, lon" query. Out-of-range values yield `None`.
pub fn parse_coordinates(text: &str) -> Option<Point> {
    let caps = COORDINATES_REGEX.captures(text)?;
    let lat = caps.get(1)?.as_str().parse().ok()?;
    let lon = caps.get(2)?.as_str().parse().ok()?;
    Point::try_new(lat, lon)
}

/// Which flavour of pass to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PassKind {
    Full,
    ViewportPoints,
}

/// One slot to search in this pass.
#[derive(Debug)]
struct SlotPlan {
    slot: ViewportSlot,
    rect: Rect,
    terms: Vec<QueryTerm>,
}

/// Read-only orchestrator state a pass works from.
struct PassInputs<'p> {
    kind: PassKind,
    query: &'p QueryState,
    categories: &'p dyn CategoryTaxonomy,
    country_info: Option<&'p dyn CountryInfo>,
    viewports: &'p Viewports,
    mode: Mode,
    search_in_world: bool,
    position: Option<Point>,
}

/// Feeds retrieved features of one slot into the bounded ranker.
struct RankingCollector<'c, 'a> {
    ctx: &'c mut PassContext<'a>,
    ranker: &'c mut BoundedRanker,
    seen: &'c mut HashMap<ContainerId, Bitmap>,
    plan: &'c SlotPlan,
}

impl RetrievalCallback for RankingCollector<'_, '_> {
    fn on_features_retrieved(
        &mut self,
        container: &dyn MapContainer,
        _scale: u8,
        features: &Bitmap,
    ) -> Outcome<()> {
        let Some(ranks) = self.ctx.rank_table(container) else {
            return Ok(());
        };
        let seen = self.seen.entry(container.id()).or_insert_with(Bitmap::new);
        for id in features.iter() {
            self.ctx.cancel.check()?;
            if seen.contains(id) {
                continue;
            }
            let Some(record) = self.ctx.load_feature(container, id) else {
                continue;
            };
            if !record.rect.intersects(&self.plan.rect) {
                continue;
            }
            let keyword = self.ctx.matcher.score(&self.plan.terms, &record.names, &record.types);
            if !keyword.matches_all(self.plan.terms.len()) {
                continue;
            }
            seen.add(id);
            self.ranker.add_candidate(PreResult::new(
                FeatureRef {
                    container: container.id(),
                    feature: id,
                },
                ranks.get(id),
                record.center.distance_m(&self.ctx.pivot),
                keyword,
                self.plan.slot,
            ));
        }
        Ok(())
    }
}

/// Incremental map search over a set of containers.
#[derive(Debug)]
pub struct MapSearcher {
    containers: Vec<Arc<dyn MapContainer>>,
    categories: Arc<dyn CategoryTaxonomy>,
    country_info: Option<Arc<dyn CountryInfo>>,
    config: SearchConfig,
    retrieval: RetrievalEngine,
    suggestions: SuggestionEngine,
    rank_tables: RankTableCache,
    viewports: Viewports,
    query: QueryState,
    cancel: CancelHandle,
    mode: Mode,
    search_in_world: bool,
    pivot: Option<Point>,
    position: Option<Point>,
    pivot_region: Option<String>,
    last_stats: PassStats,
}

impl MapSearcher {
    pub fn builder() -> MapSearcherBuilder {
        MapSearcherBuilder::new()
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn containers(&self) -> &[Arc<dyn MapContainer>] {
        &self.containers
    }

    /// Replace the query text and clear a pending cancellation.
    pub fn set_query(&mut self, text: &str) {
        self.cancel.clear();
        self.query.set_text(text);
        debug!(query = text, tokens = self.query.word_count(), "Query set");
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    /// Set the Current viewport. Its geo cache survives when `force_update`
    /// is false and `rect` lies inside the previously searched rectangle.
    pub fn set_viewport(&mut self, rect: Rect, force_update: bool) {
        let kept = self.viewports.set(ViewportSlot::Current, rect, force_update);
        debug!(kept_cache = kept, force_update, "Viewport set");
        if self.pivot.is_none() {
            self.refresh_pivot_region();
        }
    }

    pub fn viewport(&self) -> Option<Rect> {
        self.viewports.rect(ViewportSlot::Current)
    }

    /// Reference point for distances. Defaults to the viewport center.
    pub fn set_rank_pivot(&mut self, pivot: Point) {
        self.pivot = Some(pivot);
        self.refresh_pivot_region();
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = Some(position);
        self.refresh_pivot_region();
    }

    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.refresh_pivot_region();
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn set_search_in_world(&mut self, enabled: bool) {
        self.search_in_world = enabled;
    }

    /// Set the UI locale. Unknown tags keep the previous locale.
    pub fn set_preferred_locale(&mut self, tag: &str) {
        match LocaleCode::from_tag(tag) {
            Some(locale) => self.query.set_preferred_locale(locale),
            None => warn!(tag, "Ignoring unknown preferred locale"),
        }
    }

    /// Set the keyboard locale. Unknown tags keep the previous locale.
    pub fn set_input_locale(&mut self, tag: &str) {
        match LocaleCode::from_tag(tag) {
            Some(locale) => self.query.set_input_locale(locale),
            None => warn!(tag, "Ignoring unknown input locale"),
        }
    }

    /// The point distances are measured from.
    pub fn pivot(&self) -> Option<Point> {
        match (self.mode, self.position) {
            (Mode::Nearby, Some(position)) => Some(position),
            _ => self
                .pivot
                .or_else(|| self.viewport().map(|r| r.center()))
                .or(self.position),
        }
    }

    /// Region name of the current pivot, for display.
    pub fn pivot_region(&self) -> Option<&str> {
        self.pivot_region.as_deref()
    }

    fn refresh_pivot_region(&mut self) {
        self.pivot_region = self
            .country_info
            .as_ref()
            .zip(self.pivot())
            .and_then(|(info, pivot)| info.region_name(&pivot));
    }

    /// Cancel the in-flight pass, if any.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A handle that cancels passes of this searcher from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Forget the query and the last pass. Locales, viewports and caches stay.
    pub fn reset(&mut self) {
        self.cancel.clear();
        self.query.set_text("");
        self.last_stats = PassStats::default();
    }

    /// Drop every viewport cache and all rank tables.
    pub fn clear_caches(&mut self) {
        self.viewports.clear_caches();
        self.rank_tables.clear();
        debug!("Caches cleared");
    }

    pub fn clear_cache(&mut self, slot: ViewportSlot) {
        self.viewports.clear_cache(slot);
    }

    /// Swap the container set. Caches refer to the old set and are dropped.
    pub fn set_containers(&mut self, containers: Vec<Arc<dyn MapContainer>>) {
        self.containers = containers;
        self.clear_caches();
    }

    pub fn last_pass_stats(&self) -> &PassStats {
        &self.last_stats
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            rank_tables: self.rank_tables.len(),
            cached_slots: self.viewports.cached_slots(),
        }
    }

    /// Completions for the current query. Does not touch retrieval state.
    pub fn suggest_strings(&self) -> Vec<Suggestion> {
        self.suggestions.suggest(&self.query, self.categories.as_ref())
    }

    /// The query read as a coordinate pair.
    pub fn search_coordinates(&self) -> Option<CoordinateMatch> {
        let point = parse_coordinates(self.query.raw())?;
        Some(CoordinateMatch {
            point,
            distance_m: self.position.map(|p| p.distance_m(&point)),
            region: self.country_info.as_ref().and_then(|c| c.region_name(&point)),
        })
    }

    /// Search everywhere the mode allows and write at most `max_count`
    /// results, best first.
    ///
    /// `results` is only written when the pass completes.
    #[instrument(
        name = "Search",
        level = "info",
        skip_all,
        fields(query = %self.query.raw(), max_count = max_count)
    )]
    pub fn search(&mut self, results: &mut Vec<RankedResult>, max_count: usize) -> SearchStatus {
        self.run(results, max_count, PassKind::Full)
    }

    /// Search the Current viewport only, without locality or address search.
    #[instrument(
        name = "Search viewport",
        level = "info",
        skip_all,
        fields(query = %self.query.raw())
    )]
    pub fn search_viewport_points(&mut self, results: &mut Vec<RankedResult>) -> SearchStatus {
        self.run(results, usize::MAX, PassKind::ViewportPoints)
    }

    fn run(
        &mut self,
        results: &mut Vec<RankedResult>,
        max_count: usize,
        kind: PassKind,
    ) -> SearchStatus {
        let started = Instant::now();
        let matcher = KeywordMatcher::new(&self.query.locales());
        let pivot = self.pivot().unwrap_or_default();
        let mut ctx = PassContext::new(
            &self.containers,
            &self.config,
            &self.cancel,
            &self.retrieval,
            &self.rank_tables,
            matcher,
            pivot,
        );
        let inputs = PassInputs {
            kind,
            query: &self.query,
            categories: self.categories.as_ref(),
            country_info: self.country_info.as_deref(),
            viewports: &self.viewports,
            mode: self.mode,
            search_in_world: self.search_in_world,
            position: self.position,
        };
        let mut stage = ViewportStage::default();

        match run_pass(&mut ctx, &mut stage, &inputs) {
            Ok(mut ranked) => {
                ranked.truncate(max_count);
                let mut stats = ctx.commit();
                self.viewports.apply(stage);
                stats.results = ranked.len();
                stats.elapsed = started.elapsed();
                info!(
                    results = stats.results,
                    ranked = stats.ranked,
                    locality = ?stats.locality,
                    elapsed = ?stats.elapsed,
                    "Search pass complete"
                );
                *results = ranked;
                self.last_stats = stats;
                SearchStatus::Completed
            }
            Err(Cancelled) => {
                let mut stats = ctx.stats;
                stats.aborted = true;
                stats.elapsed = started.elapsed();
                debug!(elapsed = ?stats.elapsed, "Search pass cancelled");
                self.last_stats = stats;
                SearchStatus::Aborted
            }
        }
    }
}

fn run_pass(
    ctx: &mut PassContext<'_>,
    stage: &mut ViewportStage,
    inputs: &PassInputs<'_>,
) -> Outcome<Vec<RankedResult>> {
    if inputs.query.is_empty() {
        return Ok(Vec::new());
    }
    let full = inputs.kind == PassKind::Full;
    let capabilities = ctx.config.capabilities;
    let parsed = inputs
        .query
        .parse(inputs.categories, full && capabilities.house_search);
    if parsed.terms.is_empty() {
        return Ok(Vec::new());
    }

    let locality = if full && capabilities.locality_search && inputs.mode != Mode::Viewport {
        LocalityResolver::resolve(ctx, &parsed.terms)?
    } else {
        None
    };
    let remaining: &[QueryTerm] = match &locality {
        Some(found) => &parsed.terms[found.token_count()..],
        None => &[],
    };
    ctx.stats.locality = locality.as_ref().and_then(|l| l.best()).map(|l| l.name.clone());

    let house = match (&parsed.house, locality.as_ref().and_then(LocalityMatch::rect)) {
        (Some(house), Some(scope)) => HouseResolver::resolve(ctx, remaining, house, scope)?,
        _ => None,
    };
    ctx.stats.house = house.as_ref().map(|h| h.quality);

    let mut ranker = BoundedRanker::new(ctx.config.ranking.pre_results_count);
    let mut seen: HashMap<ContainerId, Bitmap> = HashMap::new();
    let plans = plan_slots(ctx, inputs, &parsed.terms, locality.as_ref(), remaining);
    for plan in &plans {
        search_slot(ctx, stage, inputs.viewports, plan, &mut ranker, &mut seen)?;
    }
    if let Some(found) = &locality {
        if remaining.is_empty() && inputs.mode == Mode::Everywhere {
            offer_locality(ctx, &mut ranker, found, &parsed.terms);
        }
    }
    ctx.stats.ranked = ranker.offered();

    let terms_of = |slot: ViewportSlot| -> &[QueryTerm] {
        plans
            .iter()
            .find(|p| p.slot == slot)
            .map_or(parsed.terms.as_slice(), |p| p.terms.as_slice())
    };
    let mut ranked = Vec::new();
    let house_refs: Vec<FeatureRef> = house.as_ref().map(house_features).unwrap_or_default();
    for pre in ranker.union() {
        ctx.cancel.check()?;
        if house_refs.contains(&pre.feature) {
            continue;
        }
        if let Some(result) = enrich(ctx, inputs, &pre, terms_of(pre.slot)) {
            ranked.push(result);
        }
    }
    if let Some(house) = &house {
        ranked.extend(house_results(ctx, inputs, house, remaining)?);
    }
    ranked.sort_by(compare_results);
    Ok(ranked)
}

/// Slots to search for this pass, in search order.
fn plan_slots(
    ctx: &PassContext<'_>,
    inputs: &PassInputs<'_>,
    terms: &[QueryTerm],
    locality: Option<&LocalityMatch>,
    remaining: &[QueryTerm],
) -> Vec<SlotPlan> {
    let mut plans = Vec::with_capacity(3);
    if let Some(rect) = inputs.viewports.rect(ViewportSlot::Current) {
        plans.push(SlotPlan {
            slot: ViewportSlot::Current,
            rect,
            terms: terms.to_vec(),
        });
    }
    if inputs.kind == PassKind::ViewportPoints {
        return plans;
    }
    match inputs.mode {
        Mode::Viewport => {}
        Mode::Everywhere => {
            if let Some(rect) = locality.and_then(LocalityMatch::rect) {
                if !remaining.is_empty() {
                    plans.push(SlotPlan {
                        slot: ViewportSlot::Locality,
                        rect,
                        terms: remaining.to_vec(),
                    });
                }
            }
            if inputs.search_in_world {
                plans.push(SlotPlan {
                    slot: ViewportSlot::Default,
                    rect: Rect::world(),
                    terms: terms.to_vec(),
                });
            }
        }
        Mode::Nearby => {
            let center = inputs.position.unwrap_or(ctx.pivot);
            plans.push(SlotPlan {
                slot: ViewportSlot::Default,
                rect: Rect::around(center, NEARBY_RADIUS_M),
                terms: terms.to_vec(),
            });
        }
    }
    plans
}

fn search_slot(
    ctx: &mut PassContext<'_>,
    stage: &mut ViewportStage,
    viewports: &Viewports,
    plan: &SlotPlan,
    ranker: &mut BoundedRanker,
    seen: &mut HashMap<ContainerId, Bitmap>,
) -> Outcome<()> {
    let cached = viewports.cached(plan.slot, &plan.rect);
    let request = RetrievalRequest::new(&plan.terms, plan.rect).cache(cached);
    let retrieval = ctx.retrieval;
    let cancel = ctx.cancel;
    let containers = ctx.containers;
    let mut collector = RankingCollector {
        ctx: &mut *ctx,
        ranker,
        seen,
        plan,
    };
    let report = retrieval.retrieve(containers, &request, cancel, &mut collector)?;
    debug!(
        slot = ?plan.slot,
        cached = cached.is_some(),
        geo_queries = report.geo_queries,
        candidates = report.candidates,
        "Slot searched"
    );
    *ctx.stats.geo_queries.entry(plan.slot).or_default() += report.geo_queries;
    *ctx.stats.candidates.entry(plan.slot).or_default() += report.candidates;
    if plan.slot != ViewportSlot::Current {
        stage.set_rect(plan.slot, plan.rect);
    }
    if cached.is_none() && !report.fetched.is_empty() {
        stage.store(
            plan.slot,
            GeoCache {
                rect: plan.rect,
                containers: report.fetched,
            },
        );
    }
    Ok(())
}

/// A query naming only a locality returns the locality itself.
fn offer_locality(
    ctx: &mut PassContext<'_>,
    ranker: &mut BoundedRanker,
    found: &LocalityMatch,
    terms: &[QueryTerm],
) {
    let Some(locality) = found.best() else {
        return;
    };
    let Some(container) = ctx
        .containers
        .iter()
        .find(|c| c.id() == locality.feature.container)
        .cloned()
    else {
        return;
    };
    let Some(record) = ctx.load_feature(container.as_ref(), locality.feature.feature) else {
        return;
    };
    let keyword = ctx.matcher.score(terms, &record.names, &record.types);
    ranker.add_candidate(PreResult::new(
        locality.feature,
        locality.rank,
        record.center.distance_m(&ctx.pivot),
        keyword,
        ViewportSlot::Locality,
    ));
}

fn house_features(house: &HouseMatch) -> Vec<FeatureRef> {
    if house.quality == HouseMatchQuality::Exact {
        house.buildings.clone()
    } else {
        house.streets.clone()
    }
}

fn find_container<'a>(ctx: &PassContext<'a>, id: ContainerId) -> Option<&'a Arc<dyn MapContainer>> {
    ctx.containers.iter().find(|c| c.id() == id)
}

/// Display name of the street a feature is addressed on, with its house number.
fn address_of(
    ctx: &PassContext<'_>,
    container: &dyn MapContainer,
    record: &FeatureRecord,
) -> Option<String> {
    let street = ctx.load_feature(container, record.address.street?)?;
    let name = street.names.primary()?.to_string();
    Some(match &record.address.house_number {
        Some(number) => format!("{name} {number}"),
        None => name,
    })
}

fn type_name(
    ctx: &PassContext<'_>,
    inputs: &PassInputs<'_>,
    record: &FeatureRecord,
) -> Option<String> {
    let locale = ctx.matcher.locales().first().copied().unwrap_or(LocaleCode::ENGLISH);
    record
        .types
        .iter()
        .find_map(|t| inputs.categories.type_name(*t, locale))
}

fn enrich(
    ctx: &PassContext<'_>,
    inputs: &PassInputs<'_>,
    pre: &PreResult,
    terms: &[QueryTerm],
) -> Option<RankedResult> {
    let container = find_container(ctx, pre.feature.container)?;
    let record = ctx.load_feature(container.as_ref(), pre.feature.feature)?;
    let (name, name_locale) = ctx
        .matcher
        .best_name(terms, &record.names, &record.types)
        .map(|b| (b.name, b.locale))
        .or_else(|| record.names.iter().next().map(|(l, n)| (n.to_string(), l)))
        .unwrap_or_default();
    let ranking = &ctx.config.ranking;
    Some(RankedResult {
        feature: pre.feature,
        class: record.class,
        highlights: ctx.matcher.highlights(terms, &name),
        name,
        name_locale,
        center: record.center,
        rect: record.rect,
        distance_m: pre.distance_m,
        rank: pre.rank,
        slot: pre.slot,
        keyword: pre.keyword,
        type_name: type_name(ctx, inputs, &record),
        region: inputs.country_info.and_then(|c| c.region_name(&record.center)),
        address: address_of(ctx, container.as_ref(), &record),
        types: record.types,
        house: None,
        preferred: pre.distance_m <= ranking.preferred_radius_m
            && pre.rank >= ranking.preferred_min_rank,
    })
}

/// Results of address search: the matching buildings, or else the streets.
fn house_results(
    ctx: &mut PassContext<'_>,
    inputs: &PassInputs<'_>,
    house: &HouseMatch,
    street_terms: &[QueryTerm],
) -> Outcome<Vec<RankedResult>> {
    let terms = crate::house::with_street_synonyms(street_terms);
    let mut out = Vec::new();
    for feature in house_features(house) {
        ctx.cancel.check()?;
        let Some(container) = find_container(ctx, feature.container).cloned() else {
            continue;
        };
        let Some(record) = ctx.load_feature(container.as_ref(), feature.feature) else {
            continue;
        };
        let rank = ctx
            .rank_table(container.as_ref())
            .map_or(0, |table| table.get(feature.feature));
        let keyword = if house.quality == HouseMatchQuality::Exact {
            KeywordScore {
                matched_terms: u8::try_from(terms.len()).unwrap_or(u8::MAX),
                quality: MatchQuality::Exact,
                full_name: true,
                locale_priority: 0,
            }
        } else {
            ctx.matcher.score(&terms, &record.names, &record.types)
        };
        let pre = PreResult::new(
            feature,
            rank,
            record.center.distance_m(&ctx.pivot),
            keyword,
            ViewportSlot::Locality,
        );
        let Some(mut result) = enrich(ctx, inputs, &pre, &terms) else {
            continue;
        };
        if result.address.is_none() {
            result.address = Some(format!("{} {}", result.name, house.house.raw));
        }
        result.house = Some(house.quality);
        out.push(result);
    }
    Ok(out)
}

/// Builder for [`MapSearcher`].
#[derive(Debug, Default)]
pub struct MapSearcherBuilder {
    containers: Vec<Arc<dyn MapContainer>>,
    categories: Option<Arc<dyn CategoryTaxonomy>>,
    country_info: Option<Arc<dyn CountryInfo>>,
    config: SearchConfig,
    seeds: Vec<(LocaleCode, String)>,
    input_locale: Option<String>,
}

impl MapSearcherBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn container(mut self, container: Arc<dyn MapContainer>) -> Self {
        self.containers.push(container);
        self
    }

    #[must_use]
    pub fn containers(
        mut self,
        containers: impl IntoIterator<Item = Arc<dyn MapContainer>>,
    ) -> Self {
        self.containers.extend(containers);
        self
    }

    /// Category taxonomy; the bundled one when unset.
    #[must_use]
    pub fn categories(mut self, categories: Arc<dyn CategoryTaxonomy>) -> Self {
        self.categories = Some(categories);
        self
    }

    #[must_use]
    pub fn country_info(mut self, country_info: Arc<dyn CountryInfo>) -> Self {
        self.country_info = Some(country_info);
        self
    }

    #[must_use]
    pub fn config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Names suggested next to the category names.
    #[must_use]
    pub fn seed_suggestions(
        mut self,
        seeds: impl IntoIterator<Item = (LocaleCode, String)>,
    ) -> Self {
        self.seeds.extend(seeds);
        self
    }

    /// Initial input locale tag; English when unset.
    #[must_use]
    pub fn input_locale(mut self, tag: impl Into<String>) -> Self {
        self.input_locale = Some(tag.into());
        self
    }

    #[instrument(
        name = "Build MapSearcher",
        level = "debug",
        skip_all,
        fields(containers = self.containers.len())
    )]
    pub fn build(self) -> Result<MapSearcher> {
        self.config.validate()?;
        if self.containers.is_empty() {
            warn!("MapSearcher built without containers, every search will be empty");
        }
        let mut query = QueryState::new();
        let input_locale = match self.input_locale.as_deref() {
            Some(tag) => LocaleCode::from_tag(tag).unwrap_or_else(|| {
                warn!(tag, "Unknown input locale, using English");
                LocaleCode::ENGLISH
            }),
            None => LocaleCode::ENGLISH,
        };
        query.set_input_locale(input_locale);

        let searcher = MapSearcher {
            containers: self.containers,
            categories: self
                .categories
                .unwrap_or_else(|| Arc::new(Categories::bundled())),
            country_info: self.country_info,
            retrieval: RetrievalEngine::new(self.config.retrieval.clone()),
            suggestions: SuggestionEngine::new(self.config.suggest.clone()).with_seeds(self.seeds),
            rank_tables: RankTableCache::new(),
            viewports: Viewports::new(),
            query,
            cancel: CancelHandle::new(),
            mode: self.config.mode,
            search_in_world: self.config.search_in_world,
            pivot: None,
            position: None,
            pivot_region: None,
            last_stats: PassStats::default(),
            config: self.config,
        };
        debug!(containers = searcher.containers.len(), mode = ?searcher.mode, "MapSearcher ready");
        Ok(searcher)
    }
}

#[cfg(test)]
mod tests {
    use geoquery_data::{
        FeatureClass,
        test_data::{TestDataConfig, TestWorld, generate_city},
    };

    use super::*;
    use crate::config::SearchConfigBuilder;

    fn searcher_with(world: TestWorld, config: SearchConfig) -> MapSearcher {
        MapSearcher::builder()
            .container(Arc::new(world.world))
            .containers(world.countries.into_iter().map(|c| Arc::new(c) as Arc<dyn MapContainer>))
            .categories(Arc::new(world.categories))
            .country_info(Arc::new(world.country_info))
            .config(config)
            .build()
            .unwrap()
    }

    fn minimal() -> (MapSearcher, Rect, Point) {
        let world = generate_city(&TestDataConfig::minimal()).unwrap();
        let (rect, center) = (world.springfield_rect, world.springfield_center);
        (searcher_with(world, SearchConfig::default()), rect, center)
    }

    fn search(searcher: &mut MapSearcher, query: &str) -> Vec<RankedResult> {
        searcher.set_query(query);
        let mut results = Vec::new();
        assert_eq!(searcher.search(&mut results, 20), SearchStatus::Completed);
        results
    }

    #[test]
    fn test_parse_coordinates() {
        assert_eq!(parse_coordinates("45.5, -73.25"), Some(Point::new(45.5, -73.25)));
        assert_eq!(parse_coordinates("  -33.9;151.2 "), Some(Point::new(-33.9, 151.2)));
        assert_eq!(parse_coordinates("10 20"), Some(Point::new(10.0, 20.0)));
        assert!(parse_coordinates("95.0, 10.0").is_none());
        assert!(parse_coordinates("45.0, 190").is_none());
        assert!(parse_coordinates("cafe 12").is_none());
    }

    #[test]
    fn test_empty_query_yields_nothing() {
        let (mut searcher, rect, _) = minimal();
        searcher.set_viewport(rect, false);
        assert!(search(&mut searcher, "").is_empty());
        assert!(search(&mut searcher, " , ").is_empty());
        assert!(searcher.last_pass_stats().geo_queries.is_empty());
    }

    #[test]
    fn test_locality_scopes_the_rest_of_the_query() {
        let (mut searcher, _, _) = minimal();
        // No viewport: only the Locality slot can find the museum.
        let results = search(&mut searcher, "springfield museum");
        assert_eq!(results[0].name, "City Museum");
        assert_eq!(results[0].slot, ViewportSlot::Locality);
        assert_eq!(searcher.last_pass_stats().locality.as_deref(), Some("Springfield"));
        assert_eq!(results[0].address.as_deref(), Some("Main Street"));
        assert_eq!(results[0].type_name.as_deref(), Some("Museum"));
    }

    #[test]
    fn test_locality_alone() {
        let (mut searcher, _, _) = minimal();
        let results = search(&mut searcher, "springfield ");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].class, FeatureClass::City);
        assert_eq!(results[0].highlights.len(), 1);
    }

    #[test]
    fn test_address_search() {
        let (mut searcher, _, _) = minimal();
        let results = search(&mut searcher, "Springfield Oak Avenue 12");
        assert_eq!(results[0].house, Some(HouseMatchQuality::Exact));
        assert_eq!(results[0].class, FeatureClass::Building);
        assert_eq!(results[0].address.as_deref(), Some("Oak Avenue 12"));
        assert_eq!(searcher.last_pass_stats().house, Some(HouseMatchQuality::Exact));

        let results = search(&mut searcher, "Springfield 1 Main St");
        assert_eq!(results[0].house, Some(HouseMatchQuality::Approximate));
        assert_eq!(results[0].name, "Main Street");
        assert_eq!(results[0].address.as_deref(), Some("Main Street 1"));
    }

    #[test]
    fn test_capabilities_switch_resolvers_off() {
        let world = generate_city(&TestDataConfig::minimal()).unwrap();
        let config = SearchConfigBuilder::new()
            .locality_search(false)
            .house_search(false)
            .build()
            .unwrap();
        let mut searcher = searcher_with(world, config);
        assert!(search(&mut searcher, "springfield museum").is_empty());
        assert_eq!(searcher.last_pass_stats().locality, None);
    }

    #[test]
    fn test_viewport_points_ignore_other_slots() {
        let (mut searcher, rect, _) = minimal();
        searcher.set_search_in_world(true);
        searcher.set_viewport(rect, false);
        searcher.set_query("cafe");
        let mut results = Vec::new();
        assert_eq!(searcher.search_viewport_points(&mut results), SearchStatus::Completed);
        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|r| r.slot == ViewportSlot::Current));
        assert!(!searcher.last_pass_stats().searched(ViewportSlot::Default));
    }

    #[test]
    fn test_locales() {
        let (mut searcher, rect, _) = minimal();
        searcher.set_viewport(rect, false);
        searcher.set_input_locale("de");
        let results = search(&mut searcher, "stadtmuseum");
        assert_eq!(results[0].name, "Stadtmuseum");
        searcher.set_input_locale("not a locale");
        assert_eq!(searcher.query().input_locale(), LocaleCode::from_tag("de"));
    }

    #[test]
    fn test_pivot_and_region() {
        let (mut searcher, rect, center) = minimal();
        assert_eq!(searcher.pivot(), None);
        searcher.set_viewport(rect, false);
        assert_eq!(searcher.pivot(), Some(rect.center()));
        assert_eq!(searcher.pivot_region(), Some("North Province, Freedonia"));

        let far = Point::new(-10.0, -10.0);
        searcher.set_rank_pivot(far);
        assert_eq!(searcher.pivot(), Some(far));
        assert_eq!(searcher.pivot_region(), None);

        searcher.set_position(center);
        searcher.set_mode(Mode::Nearby);
        assert_eq!(searcher.pivot(), Some(center));
    }

    #[test]
    fn test_coordinate_search() {
        let (mut searcher, _, center) = minimal();
        searcher.set_position(center);
        searcher.set_query("45.0, 10.0");
        let found = searcher.search_coordinates().unwrap();
        assert_eq!(found.point, Point::new(45.0, 10.0));
        assert!(found.distance_m.is_some_and(|d| d < 1.0));
        assert_eq!(found.region.as_deref(), Some("North Province, Freedonia"));

        searcher.set_query("cafe");
        assert!(searcher.search_coordinates().is_none());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = SearchConfig {
            ranking: crate::config::RankingConfig {
                pre_results_count: 0,
                ..Default::default()
            },
            ..SearchConfig::default()
        };
        assert!(MapSearcher::builder().config(config).build().is_err());
    }
}
