//! Per-container memoized rank tables.
//!
//! Tables loaded during a pass are staged and only become visible in the
//! shared cache once the pass completes, so an aborted pass leaves the cache
//! untouched.

use std::sync::{Arc, PoisonError, RwLock};

use ahash::AHashMap as HashMap;
use geoquery_data::{ContainerId, MapContainer, RankTable};
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct RankTableCache {
    tables: RwLock<HashMap<ContainerId, Arc<RankTable>>>,
}

impl RankTableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ContainerId) -> Option<Arc<RankTable>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    fn load(container: &dyn MapContainer) -> Option<Arc<RankTable>> {
        match container.load_rank_table() {
            Ok(table) => {
                debug!(container = %container.id(), entries = table.len(), "Loaded rank table");
                Some(Arc::new(table))
            }
            Err(e) => {
                warn!(
                    container = %container.id(),
                    error = %e,
                    "Rank table unavailable, skipping container"
                );
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tables.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn clear(&self) {
        self.tables.write().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn stage(&self) -> RankTableStage<'_> {
        RankTableStage {
            cache: self,
            staged: HashMap::new(),
        }
    }
}

/// Pass-local view of a [`RankTableCache`].
#[derive(Debug)]
pub struct RankTableStage<'a> {
    cache: &'a RankTableCache,
    staged: HashMap<ContainerId, Option<Arc<RankTable>>>,
}

impl RankTableStage<'_> {
    /// Rank table for `container`. Failed loads are remembered for the rest of the pass.
    pub fn get(&mut self, container: &dyn MapContainer) -> Option<Arc<RankTable>> {
        if let Some(table) = self.cache.get(container.id()) {
            return Some(table);
        }
        self.staged
            .entry(container.id())
            .or_insert_with(|| RankTableCache::load(container))
            .clone()
    }

    /// Publish the successfully loaded tables to the shared cache.
    ///
    /// A table already published by another pass is kept.
    pub fn commit(self) {
        let mut tables = self.cache.tables.write().unwrap_or_else(PoisonError::into_inner);
        for (id, table) in self.staged {
            if let Some(table) = table {
                tables.entry(id).or_insert(table);
            }
        }
    }
}
