//! Viewport slots and their per-container geo caches.

use ahash::AHashMap as HashMap;
use geoquery_data::{Bitmap, ContainerId, Rect};
use itertools::Itertools;
use tracing::trace;

/// Named rectangles that scope retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ViewportSlot {
    /// What the user is looking at.
    Current,
    /// The resolved city or region.
    Locality,
    /// The whole world, or the surroundings of the user position.
    Default,
}

/// Geo-index answer for one container.
#[derive(Debug, Clone)]
pub struct CachedGeo {
    pub scale: u8,
    pub features: Bitmap,
}

/// Geo-index answers for every container, for the rectangle they were queried with.
#[derive(Debug, Clone)]
pub struct GeoCache {
    pub rect: Rect,
    pub containers: HashMap<ContainerId, CachedGeo>,
}

impl GeoCache {
    /// Usable for `rect` when `rect` lies inside the queried rectangle.
    pub fn covers(&self, rect: &Rect) -> bool {
        self.rect.contains_rect(rect)
    }
}

#[derive(Debug, Clone, Default)]
struct SlotState {
    rect: Option<Rect>,
    cache: Option<GeoCache>,
}

/// Slot tag to slot state, owned by one orchestrator.
#[derive(Debug, Clone, Default)]
pub struct Viewports {
    slots: HashMap<ViewportSlot, SlotState>,
}

impl Viewports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rect(&self, slot: ViewportSlot) -> Option<Rect> {
        self.slots.get(&slot).and_then(|s| s.rect)
    }

    /// Assign a rectangle to `slot`. The cache survives only when
    /// `force_update` is false and the new rectangle lies inside the cached one.
    /// Returns whether the cache was kept.
    pub fn set(&mut self, slot: ViewportSlot, rect: Rect, force_update: bool) -> bool {
        let state = self.slots.entry(slot).or_default();
        state.rect = Some(rect);
        let keep = !force_update && state.cache.as_ref().is_some_and(|c| c.covers(&rect));
        if !keep && state.cache.take().is_some() {
            trace!(?slot, "Viewport cache invalidated");
        }
        keep
    }

    /// Cached geo answers usable for `rect`.
    pub fn cached(&self, slot: ViewportSlot, rect: &Rect) -> Option<&GeoCache> {
        self.slots
            .get(&slot)
            .and_then(|s| s.cache.as_ref())
            .filter(|c| c.covers(rect))
    }

    pub fn clear_cache(&mut self, slot: ViewportSlot) {
        if let Some(state) = self.slots.get_mut(&slot) {
            state.cache = None;
        }
    }

    pub fn clear_caches(&mut self) {
        for state in self.slots.values_mut() {
            state.cache = None;
        }
    }

    /// Slots currently holding a cache.
    pub fn cached_slots(&self) -> Vec<ViewportSlot> {
        self.slots
            .iter()
            .filter(|(_, s)| s.cache.is_some())
            .map(|(slot, _)| *slot)
            .sorted()
            .collect()
    }

    /// Apply the updates of a completed pass.
    pub fn apply(&mut self, stage: ViewportStage) {
        for (slot, rect) in stage.rects {
            self.set(slot, rect, false);
        }
        for (slot, cache) in stage.caches {
            let state = self.slots.entry(slot).or_default();
            if state.rect.is_none() {
                state.rect = Some(cache.rect);
            }
            state.cache = Some(cache);
        }
    }
}

/// Viewport updates produced by a pass, applied only if it completes.
#[derive(Debug, Default)]
pub struct ViewportStage {
    rects: Vec<(ViewportSlot, Rect)>,
    caches: Vec<(ViewportSlot, GeoCache)>,
}

impl ViewportStage {
    pub fn set_rect(&mut self, slot: ViewportSlot, rect: Rect) {
        self.rects.push((slot, rect));
    }

    pub fn store(&mut self, slot: ViewportSlot, cache: GeoCache) {
        self.caches.push((slot, cache));
    }
}
