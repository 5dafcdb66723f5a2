//! An in-memory [`MapContainer`] with word, type and class indexes.
//!
//! Used by embedding hosts that ship small datasets and by the test fixtures.
//! Snapshots serialize to JSON so datasets can be prepared offline.

use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use ahash::AHashMap as HashMap;
use itertools::Itertools;
use rapidfuzz::distance::levenshtein;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use super::{Bitmap, ContainerInfo, ContainerKind, MapContainer, RankTable, UPPER_SCALE, WordQuery};
use crate::{
    error::{DataError, Result},
    feature::{ContainerId, FeatureClass, FeatureId, FeatureRecord, TypeCode},
    geometry::Rect,
    normalize::split_words,
};

/// Serializable form of an [`InMemoryContainer`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    pub info: ContainerInfo,
    pub features: Vec<FeatureRecord>,
    /// Non-zero ranks. Each id must name a feature below `features.len()`.
    #[serde(default)]
    pub ranks: Vec<(FeatureId, u8)>,
}

#[derive(Debug)]
pub struct InMemoryContainer {
    info: ContainerInfo,
    features: HashMap<FeatureId, FeatureRecord>,
    ranks: Vec<u8>,
    words: BTreeMap<String, Bitmap>,
    types: HashMap<TypeCode, Bitmap>,
    classes: HashMap<FeatureClass, Bitmap>,
}

impl InMemoryContainer {
    pub fn builder(
        id: ContainerId,
        name: impl Into<String>,
        kind: ContainerKind,
    ) -> InMemoryContainerBuilder {
        InMemoryContainerBuilder::new(id, name, kind)
    }

    /// Build the indexes for a snapshot.
    #[instrument(
        name = "Index Container",
        level = "debug",
        skip_all,
        fields(container = %snapshot.info.id, features = snapshot.features.len())
    )]
    pub fn from_snapshot(snapshot: ContainerSnapshot) -> Result<Self> {
        let ContainerSnapshot { info, features, ranks } = snapshot;
        if info.min_scale > info.max_scale || info.max_scale > UPPER_SCALE {
            return Err(DataError::Malformed(format!(
                "invalid scale range {}..={} for {}",
                info.min_scale, info.max_scale, info.id
            )));
        }

        let mut by_id = HashMap::with_capacity(features.len());
        let mut words: BTreeMap<String, Bitmap> = BTreeMap::new();
        let mut types: HashMap<TypeCode, Bitmap> = HashMap::new();
        let mut classes: HashMap<FeatureClass, Bitmap> = HashMap::new();

        for feature in features {
            let id = feature.id;
            for word in feature.names.iter().flat_map(|(_, name)| split_words(name)).unique() {
                words.entry(word).or_insert_with(Bitmap::new).add(id);
            }
            for &t in &feature.types {
                types.entry(t).or_insert_with(Bitmap::new).add(id);
            }
            classes.entry(feature.class).or_insert_with(Bitmap::new).add(id);
            if by_id.insert(id, feature).is_some() {
                return Err(DataError::Malformed(format!(
                    "duplicate feature id {id} in {}",
                    info.id
                )));
            }
        }

        // The rank table is dense, so ranked ids must index into the feature list.
        let feature_count = by_id.len();
        if let Some((id, _)) = ranks
            .iter()
            .find(|(id, _)| *id as usize >= feature_count || !by_id.contains_key(id))
        {
            return Err(DataError::Malformed(format!(
                "rank for unknown feature {id} in {} ({feature_count} features)",
                info.id
            )));
        }
        let dense_len = ranks
            .iter()
            .map(|(id, _)| *id as usize + 1)
            .max()
            .unwrap_or(0);
        let mut dense = vec![0u8; dense_len];
        for (id, rank) in ranks {
            dense[id as usize] = rank;
        }

        debug!(words = words.len(), "Container indexes built");
        Ok(Self {
            info,
            features: by_id,
            ranks: dense,
            words,
            types,
            classes,
        })
    }

    pub fn snapshot(&self) -> ContainerSnapshot {
        let features = self
            .features
            .values()
            .sorted_by_key(|f| f.id)
            .cloned()
            .collect::<Vec<_>>();
        let ranks = self
            .ranks
            .iter()
            .enumerate()
            .filter(|(_, r)| **r > 0)
            .map(|(id, r)| (id as FeatureId, *r))
            .collect();
        ContainerSnapshot {
            info: self.info.clone(),
            features,
            ranks,
        }
    }

    pub fn from_json_reader(reader: impl Read) -> Result<Self> {
        let snapshot: ContainerSnapshot = serde_json::from_reader(reader)?;
        Self::from_snapshot(snapshot)
    }

    pub fn to_json_writer(&self, writer: impl Write) -> Result<()> {
        serde_json::to_writer(writer, &self.snapshot())?;
        Ok(())
    }

    #[instrument(name = "Load Container", level = "info", skip_all, fields(path = ?path.as_ref()))]
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let container = Self::from_json_reader(BufReader::new(file))?;
        info!(
            container = %container.info.id,
            features = container.features.len(),
            "Loaded container"
        );
        Ok(container)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        self.to_json_writer(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl MapContainer for InMemoryContainer {
    fn info(&self) -> &ContainerInfo {
        &self.info
    }

    fn query_rect(&self, rect: &Rect, scale: u8) -> Bitmap {
        self.features
            .values()
            .filter(|f| f.min_scale <= scale && rect.intersects(&f.rect))
            .map(|f| f.id)
            .collect()
    }

    fn query_word(&self, query: WordQuery<'_>) -> Bitmap {
        let mut out = Bitmap::new();
        if query.word.is_empty() {
            return out;
        }
        if let Some(exact) = self.words.get(query.word) {
            out.or_inplace(exact);
        }
        if query.prefix {
            for (_, ids) in self
                .words
                .range(query.word.to_owned()..)
                .take_while(|(w, _)| w.starts_with(query.word))
            {
                out.or_inplace(ids);
            }
        }
        if query.max_errors > 0 {
            let len = query.word.chars().count();
            let max_errors = usize::from(query.max_errors);
            for (word, ids) in &self.words {
                if word.chars().count().abs_diff(len) > max_errors {
                    continue;
                }
                if levenshtein::distance(query.word.chars(), word.chars()) <= max_errors {
                    out.or_inplace(ids);
                }
            }
        }
        out
    }

    fn query_types(&self, types: &[TypeCode]) -> Bitmap {
        let mut out = Bitmap::new();
        for t in types {
            if let Some(ids) = self.types.get(t) {
                out.or_inplace(ids);
            }
        }
        out
    }

    fn query_class(&self, class: FeatureClass) -> Bitmap {
        self.classes.get(&class).cloned().unwrap_or_else(Bitmap::new)
    }

    fn load_feature(&self, id: FeatureId) -> Result<FeatureRecord> {
        self.features
            .get(&id)
            .cloned()
            .ok_or(DataError::FeatureNotFound {
                container: self.info.id,
                feature: id,
            })
    }

    fn load_rank_table(&self) -> Result<RankTable> {
        Ok(RankTable::new(self.ranks.clone()))
    }
}

/// Incrementally assembles an [`InMemoryContainer`].
#[derive(Debug, Clone)]
pub struct InMemoryContainerBuilder {
    id: ContainerId,
    name: String,
    kind: ContainerKind,
    bounds: Option<Rect>,
    min_scale: u8,
    max_scale: u8,
    features: Vec<FeatureRecord>,
    ranks: Vec<(FeatureId, u8)>,
}

impl InMemoryContainerBuilder {
    pub fn new(id: ContainerId, name: impl Into<String>, kind: ContainerKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            bounds: None,
            min_scale: 0,
            max_scale: UPPER_SCALE,
            features: Vec::new(),
            ranks: Vec::new(),
        }
    }

    /// Override the bounds; by default they cover all added features.
    pub fn bounds(mut self, bounds: Rect) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn scales(mut self, min_scale: u8, max_scale: u8) -> Self {
        self.min_scale = min_scale;
        self.max_scale = max_scale;
        self
    }

    pub fn feature(mut self, record: FeatureRecord, rank: u8) -> Self {
        self.push(record, rank);
        self
    }

    pub fn push(&mut self, record: FeatureRecord, rank: u8) {
        if rank > 0 {
            self.ranks.push((record.id, rank));
        }
        self.features.push(record);
    }

    /// The next unused feature id.
    pub fn next_id(&self) -> FeatureId {
        self.features.iter().map(|f| f.id + 1).max().unwrap_or(0)
    }

    pub fn build(self) -> Result<InMemoryContainer> {
        let bounds = self.bounds.unwrap_or_else(|| {
            self.features
                .iter()
                .map(|f| f.rect)
                .reduce(|a, b| a.union(&b))
                .unwrap_or_else(Rect::world)
        });
        InMemoryContainer::from_snapshot(ContainerSnapshot {
            info: ContainerInfo {
                id: self.id,
                name: self.name,
                kind: self.kind,
                bounds,
                min_scale: self.min_scale,
                max_scale: self.max_scale,
            },
            features: self.features,
            ranks: self.ranks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        feature::{AddressInfo, NameSet},
        geometry::Point,
    };

    fn poi(id: FeatureId, name: &str, at: Point, min_scale: u8) -> FeatureRecord {
        FeatureRecord {
            id,
            class: FeatureClass::Poi,
            names: NameSet::native(name),
            center: at,
            rect: Rect::from_point(at),
            types: vec![7],
            address: AddressInfo::default(),
            min_scale,
        }
    }

    fn sample() -> InMemoryContainer {
        let c = Point::new(50.0, 10.0);
        InMemoryContainer::builder(ContainerId(3), "sample", ContainerKind::Country)
            .feature(poi(0, "Blue Cafe", c, 14), 50)
            .feature(poi(1, "Cafeteria Roma", c.offset_m(300.0, 0.0), 16), 20)
            .feature(poi(2, "Museum", c.offset_m(5000.0, 0.0), 10), 90)
            .build()
            .unwrap()
    }

    #[test]
    fn test_word_queries() {
        let container = sample();
        let exact = container.query_word(WordQuery {
            word: "cafe",
            prefix: false,
            max_errors: 0,
        });
        assert_eq!(exact.iter().collect::<Vec<_>>(), vec![0]);

        let prefix = container.query_word(WordQuery {
            word: "cafe",
            prefix: true,
            max_errors: 0,
        });
        assert_eq!(prefix.iter().collect::<Vec<_>>(), vec![0, 1]);

        let fuzzy = container.query_word(WordQuery {
            word: "musem",
            prefix: false,
            max_errors: 1,
        });
        assert_eq!(fuzzy.iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_query_rect_respects_scale() {
        let container = sample();
        let around = Rect::around(Point::new(50.0, 10.0), 10_000.0);
        assert_eq!(container.query_rect(&around, 17).cardinality(), 3);
        assert_eq!(container.query_rect(&around, 14).iter().collect::<Vec<_>>(), vec![0, 2]);
        assert_eq!(container.query_rect(&around, 5).cardinality(), 0);
    }

    #[test]
    fn test_types_classes_and_ranks() {
        let container = sample();
        assert_eq!(container.query_types(&[7]).cardinality(), 3);
        assert_eq!(container.query_types(&[8]).cardinality(), 0);
        assert_eq!(container.query_class(FeatureClass::Poi).cardinality(), 3);
        assert!(container.query_class(FeatureClass::Street).is_empty());
        let ranks = container.load_rank_table().unwrap();
        assert_eq!(ranks.get(2), 90);
        assert!(matches!(
            container.load_feature(99),
            Err(DataError::FeatureNotFound { feature: 99, .. })
        ));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let c = Point::new(1.0, 1.0);
        let result = InMemoryContainer::builder(ContainerId(1), "dup", ContainerKind::Country)
            .feature(poi(4, "A", c, 0), 0)
            .feature(poi(4, "B", c, 0), 0)
            .build();
        assert!(matches!(result, Err(DataError::Malformed(_))));
    }

    #[test]
    fn test_out_of_range_rank_ids_are_rejected() {
        let mut snapshot = sample().snapshot();
        snapshot.ranks.push((u32::MAX, 10));
        let json = serde_json::to_vec(&snapshot).unwrap();
        assert!(matches!(
            InMemoryContainer::from_json_reader(json.as_slice()),
            Err(DataError::Malformed(_))
        ));

        // Ids inside the range must still name a feature
        let mut snapshot = sample().snapshot();
        snapshot.features.retain(|f| f.id != 1);
        snapshot.ranks.push((1, 10));
        assert!(matches!(
            InMemoryContainer::from_snapshot(snapshot),
            Err(DataError::Malformed(_))
        ));
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let container = sample();
        let file = tempfile::NamedTempFile::new().unwrap();
        container.save_json(file.path()).unwrap();

        let loaded = InMemoryContainer::load_json(file.path()).unwrap();
        assert_eq!(loaded.info(), container.info());
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.load_feature(1).unwrap(), container.load_feature(1).unwrap());
        assert_eq!(loaded.load_rank_table().unwrap().get(0), 50);
    }
}
