//! Geoquery - Offline Incremental Map Search
//!
//! Geoquery turns a partially typed query into ranked map features. It
//! searches a set of map containers around the current viewport, inside a
//! city or region named by the query, and optionally the whole world, keeping
//! two bounded selections (nearest and most notable) so a pass stays cheap
//! no matter how many features match.
//!
//! # Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use geoquery::{
//!     MapSearcher, SearchStatus,
//!     data::{MapContainer, test_data::{TestDataConfig, generate_city}},
//! };
//!
//! // A small synthetic country with two cities
//! let world = generate_city(&TestDataConfig::default())?;
//!
//! let mut searcher = MapSearcher::builder()
//!     .container(Arc::new(world.world))
//!     .containers(world.countries.into_iter().map(|c| Arc::new(c) as Arc<dyn MapContainer>))
//!     .country_info(Arc::new(world.country_info))
//!     .build()?;
//!
//! // Cafés around the viewport, nearest and most notable first
//! searcher.set_viewport(world.springfield_rect, false);
//! searcher.set_query("cafe");
//! let mut results = Vec::new();
//! if searcher.search(&mut results, 10) == SearchStatus::Completed {
//!     for result in &results {
//!         println!("{} ({:.0} m)", result.name, result.distance_m);
//!     }
//! }
//!
//! // Address search inside a named city
//! searcher.set_query("Springfield Oak Avenue 12");
//! searcher.search(&mut results, 10);
//! assert_eq!(results[0].address.as_deref(), Some("Oak Avenue 12"));
//! # Ok::<(), geoquery::error::GeoQueryError>(())
//! ```
//!
//! # Features
//!
//! - **Incremental**: Viewport geo answers are cached and reused while the map only zooms in
//! - **Bounded Ranking**: Two fixed-size selections by distance and by rank, merged without
//!   duplicates
//! - **Locality Resolution**: Leading words naming a city or region scope the rest of the query
//! - **Address Search**: A trailing house number is matched against buildings and street ranges
//! - **Cancellable**: Any pass can be aborted from another thread without touching results or
//!   caches
//! - **Suggestions**: Category completions for empty and very short queries
//!
//! # Data
//!
//! Containers, categories and country lookup are traits defined in the
//! [`data`] crate, which also ships an in-memory container with JSON
//! snapshots and deterministic test datasets.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod cancel;
mod config;
mod context;
mod engine;
pub mod error;
mod house;
mod keyword;
mod locality;
mod query;
mod rank_table;
mod ranker;
mod result;
mod retrieval;
mod suggest;
mod viewport;

pub use cancel::{CancelHandle, Cancelled};
pub use config::{
    Capabilities, LocalityConfig, Mode, RankingConfig, RetrievalConfig, SearchConfig,
    SearchConfigBuilder, SuggestConfig,
};
pub use engine::{MapSearcher, MapSearcherBuilder, parse_coordinates};
pub use geoquery_data as data;
pub use house::HouseMatchQuality;
pub use keyword::{HighlightRange, KeywordScore, MatchQuality};
pub use result::{CacheStats, CoordinateMatch, PassStats, RankedResult, SearchStatus};
pub use suggest::Suggestion;
pub use viewport::ViewportSlot;

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the Geoquery library.
///
/// This sets up structured logging with configurable levels and filtering.
/// `RUST_LOG` takes precedence over `level` when set. Repeated calls are
/// no-ops.
///
/// # Examples
///
/// ```rust
/// use geoquery::init_logging;
/// use tracing::Level;
///
/// // Initialize with info-level logging
/// init_logging(Level::INFO)?;
/// # Ok::<(), geoquery::error::GeoQueryError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::GeoQueryError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?;

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .init();
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use geoquery_data::{
        MapContainer,
        test_data::{TestDataConfig, TestWorld, generate_city},
    };

    use super::*;

    fn setup_test_env() {
        let _ = init_logging(tracing::Level::WARN);
    }

    fn searcher(world: TestWorld) -> MapSearcher {
        MapSearcher::builder()
            .container(Arc::new(world.world))
            .containers(world.countries.into_iter().map(|c| Arc::new(c) as Arc<dyn MapContainer>))
            .categories(Arc::new(world.categories))
            .build()
            .unwrap()
    }

    #[test]
    fn test_searcher_creation() {
        setup_test_env();

        let world = generate_city(&TestDataConfig::minimal()).unwrap();
        let searcher = searcher(world);
        assert_eq!(searcher.containers().len(), 2);
        assert_eq!(searcher.cache_stats(), CacheStats::default());
        assert_eq!(searcher.mode(), Mode::Everywhere);
    }

    #[test]
    fn test_basic_search() {
        setup_test_env();

        let world = generate_city(&TestDataConfig::default()).unwrap();
        let rect = world.springfield_rect;
        let mut searcher = searcher(world);
        searcher.set_viewport(rect, false);

        let test_terms = vec!["cafe", "Cafe Aurora", "museum", "oak avenue"];
        for term in test_terms {
            searcher.set_query(term);
            let mut results = Vec::new();
            let status = searcher.search(&mut results, 10);
            assert_eq!(status, SearchStatus::Completed, "Search for '{term}' should complete");
            assert!(!results.is_empty(), "Should find results for '{term}'");
            assert!(results.len() <= 10);
        }
    }

    #[test]
    fn test_suggestions() {
        setup_test_env();

        let world = generate_city(&TestDataConfig::minimal()).unwrap();
        let mut searcher = searcher(world);
        searcher.set_query("");
        assert!(!searcher.suggest_strings().is_empty());
        searcher.set_query("pa");
        let names: Vec<_> = searcher.suggest_strings().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["Parking"]);
    }
}
