//! Collaborators of the geoquery search core.
//!
//! This crate holds everything the query core reads but does not own: map
//! containers and their indexes, the category taxonomy, country/region
//! lookup, geometry, locale codes and text normalization. It also ships an
//! in-memory container and deterministic test datasets.

pub mod categories;
pub mod container;
pub mod country;
pub mod error;
pub mod feature;
pub mod geometry;
pub mod locale;
pub mod normalize;
pub mod test_data;

pub use categories::{Categories, Category, CategoryName, CategoryTaxonomy};
pub use container::{
    Bitmap, ContainerInfo, ContainerKind, ContainerSnapshot, InMemoryContainer,
    InMemoryContainerBuilder, MapContainer, RankTable, UPPER_SCALE, WordQuery,
};
pub use country::{CountryInfo, RegionArea, StaticCountryInfo};
pub use error::{DataError, Result};
pub use feature::{
    AddressInfo, ContainerId, FeatureClass, FeatureId, FeatureRecord, FeatureRef, HouseRange,
    NameSet, TypeCode,
};
pub use geometry::{Point, Rect};
pub use locale::LocaleCode;
