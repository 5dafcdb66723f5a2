//! Search configuration and its builder.
//!
//! [`SearchConfig`] is a plain struct with sensible defaults. Use
//! [`SearchConfigBuilder`] to start from a preset and override individual
//! knobs; `build` validates the result.

use crate::error::{GeoQueryError, Result};

/// Which parts of the map the orchestrator searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Mode {
    /// Current viewport, resolved locality and (if enabled) the whole world.
    #[default]
    Everywhere,
    /// Current viewport only.
    Viewport,
    /// Current viewport plus the surroundings of the user position.
    Nearby,
}

/// Optional resolvers, switched on or off per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Capabilities {
    /// Detect a trailing house number and match it against streets.
    pub house_search: bool,
    /// Resolve a city/region from the leading tokens.
    pub locality_search: bool,
}

impl Capabilities {
    pub const fn all() -> Self {
        Self {
            house_search: true,
            locality_search: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            house_search: false,
            locality_search: false,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::all()
    }
}

/// Bounded ranking parameters.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankingConfig {
    /// Capacity of each bounded selection.
    pub pre_results_count: usize,
    /// Results closer than this to the pivot may be promoted.
    pub preferred_radius_m: f64,
    /// Minimum rank for promotion.
    pub preferred_min_rank: u8,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            pre_results_count: 200,
            preferred_radius_m: 500.0,
            preferred_min_rank: 40,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetrievalConfig {
    /// Scale steps added to the rectangle's zoom level when picking the index scale.
    pub scale_lookahead: u8,
    /// Candidate count above which a container is re-queried at a coarser scale.
    pub max_features_per_container: u64,
    /// Query containers on the rayon pool.
    pub parallel: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            scale_lookahead: 7,
            max_features_per_container: 5000,
            parallel: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LocalityConfig {
    /// How many leading tokens may form a locality name.
    pub max_locality_tokens: usize,
    /// Matches below this confidence are discarded.
    pub min_confidence: f32,
}

impl Default for LocalityConfig {
    fn default() -> Self {
        Self {
            max_locality_tokens: 3,
            min_confidence: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SuggestConfig {
    /// Suggestions are produced while the query has fewer characters than this...
    pub max_query_chars: usize,
    /// ...or at most this many tokens.
    pub max_tokens: usize,
    pub max_suggestions: usize,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            max_query_chars: 3,
            max_tokens: 1,
            max_suggestions: 10,
        }
    }
}

/// Configuration for a query orchestrator.
///
/// ```rust
/// use geoquery::{Mode, SearchConfig, SearchConfigBuilder};
///
/// let config = SearchConfig::builder()
///     .pre_results_count(100)
///     .mode(Mode::Viewport)
///     .build()?;
/// assert_eq!(config.ranking.pre_results_count, 100);
///
/// let fast = SearchConfigBuilder::fast().build()?;
/// assert!(!fast.capabilities.house_search);
/// # Ok::<(), geoquery::error::GeoQueryError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchConfig {
    pub ranking: RankingConfig,
    pub retrieval: RetrievalConfig,
    pub locality: LocalityConfig,
    pub suggest: SuggestConfig,
    pub capabilities: Capabilities,
    /// Initial search mode; can be changed on the orchestrator.
    pub mode: Mode,
    /// Initially search the Default (world) slot as well.
    pub search_in_world: bool,
}

impl SearchConfig {
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.ranking.pre_results_count == 0 {
            return Err(GeoQueryError::ConfigError(
                "pre_results_count must be at least 1".to_string(),
            ));
        }
        if !self.ranking.preferred_radius_m.is_finite() || self.ranking.preferred_radius_m < 0.0 {
            return Err(GeoQueryError::ConfigError(format!(
                "preferred_radius_m must be a non-negative distance, got {}",
                self.ranking.preferred_radius_m
            )));
        }
        if !(0.0..=1.0).contains(&self.locality.min_confidence) {
            return Err(GeoQueryError::ConfigError(format!(
                "locality confidence must be within [0, 1], got {}",
                self.locality.min_confidence
            )));
        }
        if self.retrieval.max_features_per_container == 0 {
            return Err(GeoQueryError::ConfigError(
                "max_features_per_container must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for creating search configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    /// Create a new builder with sensible defaults
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    /// Smaller selections and no address search, for low-end devices
    pub fn fast() -> Self {
        let mut builder = Self::new();
        builder.config.ranking.pre_results_count = 50;
        builder.config.retrieval.scale_lookahead = 6;
        builder.config.retrieval.max_features_per_container = 1000;
        builder.config.locality.max_locality_tokens = 2;
        builder.config.suggest.max_suggestions = 5;
        builder.config.capabilities.house_search = false;
        builder
    }

    /// Larger selections and a more permissive locality resolver
    pub fn comprehensive() -> Self {
        let mut builder = Self::new();
        builder.config.ranking.pre_results_count = 500;
        builder.config.retrieval.scale_lookahead = 8;
        builder.config.retrieval.max_features_per_container = 20_000;
        builder.config.locality.max_locality_tokens = 4;
        builder.config.locality.min_confidence = 0.4;
        builder.config.suggest.max_suggestions = 20;
        builder.config.search_in_world = true;
        builder
    }

    /// "What's around me": the current viewport only, no locality or address search
    pub fn viewport_only() -> Self {
        let mut builder = Self::new();
        builder.config.mode = Mode::Viewport;
        builder.config.capabilities = Capabilities::none();
        builder
    }

    /// Capacity of each bounded selection
    pub fn pre_results_count(mut self, count: usize) -> Self {
        self.config.ranking.pre_results_count = count;
        self
    }

    /// Radius and minimum rank of the promoted "nearby and notable" tier
    pub fn preferred_tier(mut self, radius_m: f64, min_rank: u8) -> Self {
        self.config.ranking.preferred_radius_m = radius_m;
        self.config.ranking.preferred_min_rank = min_rank;
        self
    }

    pub fn scale_lookahead(mut self, steps: u8) -> Self {
        self.config.retrieval.scale_lookahead = steps;
        self
    }

    pub fn max_features_per_container(mut self, max: u64) -> Self {
        self.config.retrieval.max_features_per_container = max;
        self
    }

    /// Enable or disable parallel retrieval across containers
    pub fn parallel_retrieval(mut self, enabled: bool) -> Self {
        self.config.retrieval.parallel = enabled;
        self
    }

    pub fn max_locality_tokens(mut self, max: usize) -> Self {
        self.config.locality.max_locality_tokens = max;
        self
    }

    pub fn locality_confidence(mut self, min_confidence: f32) -> Self {
        self.config.locality.min_confidence = min_confidence;
        self
    }

    /// Produce suggestions while the query is shorter than `max_chars` or has
    /// at most `max_tokens` tokens
    pub fn suggestion_threshold(mut self, max_chars: usize, max_tokens: usize) -> Self {
        self.config.suggest.max_query_chars = max_chars;
        self.config.suggest.max_tokens = max_tokens;
        self
    }

    pub fn max_suggestions(mut self, max: usize) -> Self {
        self.config.suggest.max_suggestions = max;
        self
    }

    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.config.capabilities = capabilities;
        self
    }

    pub fn house_search(mut self, enabled: bool) -> Self {
        self.config.capabilities.house_search = enabled;
        self
    }

    pub fn locality_search(mut self, enabled: bool) -> Self {
        self.config.capabilities.locality_search = enabled;
        self
    }

    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn search_in_world(mut self, enabled: bool) -> Self {
        self.config.search_in_world = enabled;
        self
    }

    /// Validate and build the final configuration
    pub fn build(self) -> Result<SearchConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
