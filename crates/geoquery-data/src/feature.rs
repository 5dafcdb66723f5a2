//! Feature records as exposed by map containers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    geometry::{Point, Rect},
    locale::LocaleCode,
};

/// Identifier of a map container within a container set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(pub u32);

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mwm#{}", self.0)
    }
}

/// Identifier of a feature, scoped to its container.
pub type FeatureId = u32;

/// A feature id qualified by its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FeatureRef {
    pub container: ContainerId,
    pub feature: FeatureId,
}

/// Category type code from the taxonomy.
pub type TypeCode = u32;

/// Coarse feature classes the core cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureClass {
    Poi,
    Street,
    Building,
    /// Village, town or city.
    City,
    /// State, province or other first-level region.
    Region,
    Country,
}

impl FeatureClass {
    /// Localities are the classes that scope address search.
    pub const fn is_locality(self) -> bool {
        matches!(self, Self::City | Self::Region | Self::Country)
    }
}

/// A closed range of house numbers along a street.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseRange {
    pub from: u32,
    pub to: u32,
}

impl HouseRange {
    pub fn contains(&self, number: u32) -> bool {
        let (lo, hi) = if self.from <= self.to {
            (self.from, self.to)
        } else {
            (self.to, self.from)
        };
        (lo..=hi).contains(&number)
    }
}

/// Address data attached to a feature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInfo {
    /// Street this feature is addressed on (for buildings and POIs).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street: Option<FeatureId>,
    /// House number as written on the building.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub house_number: Option<String>,
    /// House number ranges covered by a street.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub house_ranges: Vec<HouseRange>,
}

/// Multilingual names of a feature.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NameSet(Vec<(LocaleCode, String)>);

impl NameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// A name set with only the native name.
    pub fn native(name: impl Into<String>) -> Self {
        Self(vec![(LocaleCode::DEFAULT, name.into())])
    }

    /// Add (or replace) the name for `locale`.
    pub fn with(mut self, locale: LocaleCode, name: impl Into<String>) -> Self {
        self.insert(locale, name);
        self
    }

    pub fn insert(&mut self, locale: LocaleCode, name: impl Into<String>) {
        let name = name.into();
        match self.0.iter_mut().find(|(l, _)| *l == locale) {
            Some(slot) => slot.1 = name,
            None => self.0.push((locale, name)),
        }
    }

    pub fn get(&self, locale: LocaleCode) -> Option<&str> {
        self.0
            .iter()
            .find(|(l, _)| *l == locale)
            .map(|(_, n)| n.as_str())
    }

    /// The native name, or the first name if there is no native one.
    pub fn primary(&self) -> Option<&str> {
        self.get(LocaleCode::DEFAULT)
            .or_else(|| self.0.first().map(|(_, n)| n.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (LocaleCode, &str)> + '_ {
        self.0.iter().map(|(l, n)| (*l, n.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Everything a container knows about one feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: FeatureId,
    pub class: FeatureClass,
    pub names: NameSet,
    /// Representative point used for distance ranking.
    pub center: Point,
    /// Bounding rectangle; a degenerate rect for point features.
    pub rect: Rect,
    #[serde(default)]
    pub types: Vec<TypeCode>,
    #[serde(default)]
    pub address: AddressInfo,
    /// Coarsest index scale at which the feature is indexed (0 = world, 17 = street level).
    #[serde(default)]
    pub min_scale: u8,
}

impl FeatureRecord {
    pub fn has_any_type(&self, types: &[TypeCode]) -> bool {
        self.types.iter().any(|t| types.contains(t))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_house_range_is_order_independent() {
        let r = HouseRange { from: 20, to: 2 };
        assert!(r.contains(2));
        assert!(r.contains(11));
        assert!(!r.contains(21));
    }

    #[test]
    fn test_name_set_lookup() {
        let names = NameSet::native("München").with(LocaleCode::ENGLISH, "Munich");
        assert_eq!(names.primary(), Some("München"));
        assert_eq!(names.get(LocaleCode::ENGLISH), Some("Munich"));
        assert_eq!(names.iter().count(), 2);

        let replaced = names.with(LocaleCode::ENGLISH, "Munich City");
        assert_eq!(replaced.get(LocaleCode::ENGLISH), Some("Munich City"));
        assert_eq!(replaced.iter().count(), 2);
    }

    #[test]
    fn test_locality_classes() {
        assert!(FeatureClass::City.is_locality());
        assert!(FeatureClass::Region.is_locality());
        assert!(!FeatureClass::Street.is_locality());
    }
}
