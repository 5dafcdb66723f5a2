//! Map container interface consumed by the query core.
//!
//! A container is an immutable bundle of indexed features for one geographic
//! region. The core only talks to it through [`MapContainer`]; the on-disk
//! format is not its concern.

use std::fmt;

pub use croaring::Bitmap;
use serde::{Deserialize, Serialize};

use crate::{
    error::Result,
    feature::{ContainerId, FeatureClass, FeatureId, FeatureRecord, TypeCode},
    geometry::Rect,
};

mod memory;
pub use memory::{ContainerSnapshot, InMemoryContainer, InMemoryContainerBuilder};

/// Finest index scale a container can carry.
pub const UPPER_SCALE: u8 = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerKind {
    /// Coarse world-wide container holding countries, regions and major cities.
    World,
    /// Detailed container for one country or region.
    Country,
}

/// Static description of a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerInfo {
    pub id: ContainerId,
    pub name: String,
    pub kind: ContainerKind,
    pub bounds: Rect,
    pub min_scale: u8,
    pub max_scale: u8,
}

impl ContainerInfo {
    pub fn clamp_scale(&self, scale: u8) -> u8 {
        scale.clamp(self.min_scale, self.max_scale.max(self.min_scale))
    }
}

/// How a single word is looked up in the container's text index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordQuery<'a> {
    /// Normalized word.
    pub word: &'a str,
    /// Also match index words that start with `word`.
    pub prefix: bool,
    /// Maximum edit distance for approximate matches, 0 disables them.
    pub max_errors: u8,
}

/// Importance byte per feature, as produced by the container's ranking data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankTable(Vec<u8>);

impl RankTable {
    pub fn new(ranks: Vec<u8>) -> Self {
        Self(ranks)
    }

    /// Rank of `id`; features missing from the table rank zero.
    pub fn get(&self, id: FeatureId) -> u8 {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.0.get(idx))
            .copied()
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Read access to one map container.
///
/// Implementations must be immutable for the duration of a search pass and
/// safe to query from several retrieval workers at once.
pub trait MapContainer: fmt::Debug + Send + Sync {
    fn info(&self) -> &ContainerInfo;

    fn id(&self) -> ContainerId {
        self.info().id
    }

    /// Features indexed at `scale` whose geometry intersects `rect`.
    fn query_rect(&self, rect: &Rect, scale: u8) -> Bitmap;

    /// Features with a name word matching `query`.
    fn query_word(&self, query: WordQuery<'_>) -> Bitmap;

    /// Features carrying any of `types`.
    fn query_types(&self, types: &[TypeCode]) -> Bitmap;

    /// Features of the given class.
    fn query_class(&self, class: FeatureClass) -> Bitmap;

    fn load_feature(&self, id: FeatureId) -> Result<FeatureRecord>;

    fn load_rank_table(&self) -> Result<RankTable>;
}
