//! Candidate retrieval across map containers.
//!
//! For every container intersecting the requested rectangle the engine picks
//! an index scale, asks the geo-index for features in the rectangle and
//! intersects that set with the text-index matches of every query term. The
//! resulting bit-set is handed to a [`RetrievalCallback`], one container at a
//! time on the calling thread.
//!
//! Sequential retrieval reports containers in order. Parallel retrieval
//! reports each container as soon as it is done, so callers must not depend
//! on the order.

use std::sync::{
    Arc,
    mpsc::{self, Receiver, TryRecvError},
};

use ahash::AHashMap as HashMap;
use geoquery_data::{
    Bitmap, ContainerId, ContainerInfo, FeatureClass, MapContainer, Rect, UPPER_SCALE, WordQuery,
};
use rayon::Yield;
use tracing::{debug, instrument, trace};

use crate::{
    cancel::{CancelHandle, Outcome},
    config::RetrievalConfig,
    keyword::QueryTerm,
    viewport::{CachedGeo, GeoCache},
};

/// Receives retrieval results as containers finish.
pub trait RetrievalCallback {
    /// Candidates of one container. Not called for containers without candidates.
    fn on_features_retrieved(
        &mut self,
        container: &dyn MapContainer,
        scale: u8,
        features: &Bitmap,
    ) -> Outcome<()>;

    /// The container is fully processed.
    fn on_container_processed(&mut self, _container: ContainerId) -> Outcome<()> {
        Ok(())
    }
}

/// What to retrieve.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalRequest<'a> {
    pub terms: &'a [QueryTerm],
    pub rect: Rect,
    /// Restrict to these classes; empty means any class.
    pub classes: &'a [FeatureClass],
    /// Geo answers to reuse instead of querying the geo-index.
    pub cache: Option<&'a GeoCache>,
}

impl<'a> RetrievalRequest<'a> {
    pub fn new(terms: &'a [QueryTerm], rect: Rect) -> Self {
        Self {
            terms,
            rect,
            classes: &[],
            cache: None,
        }
    }

    pub fn classes(mut self, classes: &'a [FeatureClass]) -> Self {
        self.classes = classes;
        self
    }

    pub fn cache(mut self, cache: Option<&'a GeoCache>) -> Self {
        self.cache = cache;
        self
    }
}

#[derive(Debug, Default)]
pub struct RetrievalReport {
    /// Geo-index queries issued, including re-queries at coarser scales.
    pub geo_queries: usize,
    /// Containers that intersected the rectangle.
    pub containers: usize,
    pub candidates: u64,
    /// Freshly fetched geo answers, for the viewport cache.
    pub fetched: HashMap<ContainerId, CachedGeo>,
}

#[derive(Debug)]
struct ContainerHit {
    scale: u8,
    candidates: Bitmap,
    fetched: Option<CachedGeo>,
    geo_queries: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RetrievalEngine {
    config: RetrievalConfig,
}

impl RetrievalEngine {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    /// Index scale for querying `rect` in a container: the rectangle's zoom
    /// level plus the configured lookahead, clamped to the container's scales.
    pub fn scale_for(&self, rect: &Rect, info: &ContainerInfo) -> u8 {
        let side = rect.max_side_deg();
        let zoom = if side > 0.0 {
            (360.0 / side).log2().floor().clamp(0.0, f64::from(UPPER_SCALE)) as u8
        } else {
            UPPER_SCALE
        };
        info.clamp_scale(zoom.saturating_add(self.config.scale_lookahead))
    }

    /// Run retrieval over `containers`, reporting candidates to `callback`.
    ///
    /// Once `cancel` fires no further callbacks are made and `Err(Cancelled)`
    /// is returned.
    #[instrument(
        name = "Retrieve",
        level = "debug",
        skip_all,
        fields(terms = request.terms.len(), containers = containers.len())
    )]
    pub fn retrieve(
        &self,
        containers: &[Arc<dyn MapContainer>],
        request: &RetrievalRequest<'_>,
        cancel: &CancelHandle,
        callback: &mut dyn RetrievalCallback,
    ) -> Outcome<RetrievalReport> {
        let mut report = RetrievalReport::default();
        if self.config.parallel && containers.len() > 1 {
            let (tx, rx) = mpsc::channel();
            rayon::in_place_scope(|scope| -> Outcome<()> {
                for container in containers {
                    let tx = tx.clone();
                    scope.spawn(move |_| {
                        let hit = self.process(container.as_ref(), request, cancel);
                        // The receiver is gone once the caller stopped early.
                        let _ = tx.send((container, hit));
                    });
                }
                drop(tx);
                // Workers left running stop at their next cancellation check.
                while let Some((container, hit)) = next_finished(&rx) {
                    Self::dispatch(container.as_ref(), hit?, cancel, callback, &mut report)?;
                }
                Ok(())
            })?;
        } else {
            for container in containers {
                let hit = self.process(container.as_ref(), request, cancel)?;
                Self::dispatch(container.as_ref(), hit, cancel, callback, &mut report)?;
            }
        }
        debug!(
            geo_queries = report.geo_queries,
            containers = report.containers,
            candidates = report.candidates,
            "Retrieval finished"
        );
        Ok(report)
    }

    fn dispatch(
        container: &dyn MapContainer,
        hit: Option<ContainerHit>,
        cancel: &CancelHandle,
        callback: &mut dyn RetrievalCallback,
        report: &mut RetrievalReport,
    ) -> Outcome<()> {
        let Some(hit) = hit else {
            return Ok(());
        };
        cancel.check()?;
        report.geo_queries += hit.geo_queries;
        report.containers += 1;
        report.candidates += hit.candidates.cardinality();
        if let Some(fetched) = hit.fetched {
            report.fetched.insert(container.id(), fetched);
        }
        if !hit.candidates.is_empty() {
            callback.on_features_retrieved(container, hit.scale, &hit.candidates)?;
        }
        cancel.check()?;
        callback.on_container_processed(container.id())
    }

    fn process(
        &self,
        container: &dyn MapContainer,
        request: &RetrievalRequest<'_>,
        cancel: &CancelHandle,
    ) -> Outcome<Option<ContainerHit>> {
        cancel.check()?;
        let info = container.info();
        if !info.bounds.intersects(&request.rect) {
            return Ok(None);
        }

        let (scale, geo, fetched, geo_queries) = match request.cache {
            Some(cache) => match cache.containers.get(&info.id) {
                Some(cached) => (cached.scale, cached.features.clone(), false, 0),
                None => return Ok(None),
            },
            None => {
                let (scale, geo, queries) = self.query_geo(container, &request.rect, cancel)?;
                (scale, geo, true, queries)
            }
        };

        let mut candidates = geo.clone();
        for term in request.terms {
            if candidates.is_empty() {
                break;
            }
            cancel.check()?;
            candidates.and_inplace(&Self::term_matches(container, term));
        }
        if !request.classes.is_empty() && !candidates.is_empty() {
            let mut by_class = Bitmap::new();
            for class in request.classes {
                by_class.or_inplace(&container.query_class(*class));
            }
            candidates.and_inplace(&by_class);
        }
        trace!(
            container = %info.id,
            scale,
            candidates = candidates.cardinality(),
            "Container retrieved"
        );

        Ok(Some(ContainerHit {
            scale,
            candidates,
            fetched: fetched.then_some(CachedGeo {
                scale,
                features: geo,
            }),
            geo_queries,
        }))
    }

    /// Geo-index lookup, stepping to coarser scales while the answer is too large.
    fn query_geo(
        &self,
        container: &dyn MapContainer,
        rect: &Rect,
        cancel: &CancelHandle,
    ) -> Outcome<(u8, Bitmap, usize)> {
        let min_scale = container.info().min_scale;
        let mut scale = self.scale_for(rect, container.info());
        let mut queries = 0;
        loop {
            cancel.check()?;
            let geo = container.query_rect(rect, scale);
            queries += 1;
            if geo.cardinality() <= self.config.max_features_per_container || scale <= min_scale {
                return Ok((scale, geo, queries));
            }
            debug!(
                container = %container.id(),
                scale,
                features = geo.cardinality(),
                "Too many features, retrying at a coarser scale"
            );
            scale -= 1;
        }
    }

    fn term_matches(container: &dyn MapContainer, term: &QueryTerm) -> Bitmap {
        let mut matched = container.query_word(WordQuery {
            word: &term.text,
            prefix: term.prefix,
            max_errors: term.max_errors(),
        });
        for synonym in &term.synonyms {
            matched.or_inplace(&container.query_word(WordQuery {
                word: synonym,
                prefix: false,
                max_errors: 0,
            }));
        }
        if !term.types.is_empty() {
            matched.or_inplace(&container.query_types(&term.types));
        }
        matched
    }
}

/// Next container finished by a worker, or `None` once all have reported.
///
/// On a pool thread, pending pool work runs while waiting so a small pool
/// cannot stall on its own jobs.
fn next_finished<T>(rx: &Receiver<T>) -> Option<T> {
    loop {
        match rx.try_recv() {
            Ok(finished) => return Some(finished),
            Err(TryRecvError::Disconnected) => return None,
            Err(TryRecvError::Empty) => {
                if !matches!(rayon::yield_now(), Some(Yield::Executed)) {
                    return rx.recv().ok();
                }
            }
        }
    }
}
