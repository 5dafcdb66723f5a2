//! State shared by the stages of one search pass.

use std::sync::Arc;

use geoquery_data::{ContainerKind, FeatureId, FeatureRecord, MapContainer, Point, RankTable};
use tracing::warn;

use crate::{
    cancel::CancelHandle,
    config::SearchConfig,
    keyword::KeywordMatcher,
    rank_table::{RankTableCache, RankTableStage},
    result::PassStats,
    retrieval::RetrievalEngine,
};

/// Borrowed inputs and staged outputs of a single pass.
///
/// Anything written to a context becomes visible outside the pass only when
/// the orchestrator commits it after the pass completed.
#[derive(Debug)]
pub struct PassContext<'a> {
    pub containers: &'a [Arc<dyn MapContainer>],
    pub config: &'a SearchConfig,
    pub cancel: &'a CancelHandle,
    pub retrieval: &'a RetrievalEngine,
    pub matcher: KeywordMatcher,
    pub pivot: Point,
    pub ranks: RankTableStage<'a>,
    pub stats: PassStats,
}

impl<'a> PassContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        containers: &'a [Arc<dyn MapContainer>],
        config: &'a SearchConfig,
        cancel: &'a CancelHandle,
        retrieval: &'a RetrievalEngine,
        rank_tables: &'a RankTableCache,
        matcher: KeywordMatcher,
        pivot: Point,
    ) -> Self {
        Self {
            containers,
            config,
            cancel,
            retrieval,
            matcher,
            pivot,
            ranks: rank_tables.stage(),
            stats: PassStats::default(),
        }
    }

    /// Containers of one kind, in registration order.
    pub fn containers_of(&self, kind: ContainerKind) -> Vec<Arc<dyn MapContainer>> {
        self.containers
            .iter()
            .filter(|c| c.info().kind == kind)
            .cloned()
            .collect()
    }

    /// Load a feature record. Unreadable features are logged and skipped.
    pub fn load_feature(
        &self,
        container: &dyn MapContainer,
        id: FeatureId,
    ) -> Option<FeatureRecord> {
        container
            .load_feature(id)
            .inspect_err(|e| {
                warn!(
                    container = %container.id(),
                    feature = id,
                    error = %e,
                    "Skipping unreadable feature"
                )
            })
            .ok()
    }

    pub fn rank_table(&mut self, container: &dyn MapContainer) -> Option<Arc<RankTable>> {
        self.ranks.get(container)
    }

    /// Consume the context, publishing staged rank tables.
    pub fn commit(self) -> PassStats {
        self.ranks.commit();
        self.stats
    }
}
