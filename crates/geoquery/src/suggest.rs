//! Autocomplete for empty and short queries.

use geoquery_data::{CategoryTaxonomy, LocaleCode, normalize::normalize};
use itertools::Itertools;

use crate::{config::SuggestConfig, query::QueryState};

/// A completion of the current query.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Suggestion {
    /// The suggested name.
    pub name: String,
    /// The raw query with its partial word replaced by `name`, plus a trailing space.
    pub completion: String,
    pub locale: LocaleCode,
}

#[derive(Debug, Clone)]
struct Seed {
    locale: LocaleCode,
    name: String,
    normalized: String,
    min_prefix_len: u8,
}

impl Seed {
    fn new(locale: LocaleCode, name: String, min_prefix_len: u8) -> Self {
        Self {
            locale,
            normalized: normalize(&name),
            name,
            min_prefix_len,
        }
    }
}

/// Proposes category and place names. Works on the query alone, so it never
/// waits for retrieval.
#[derive(Debug, Clone, Default)]
pub struct SuggestionEngine {
    config: SuggestConfig,
    seeds: Vec<Seed>,
}

impl SuggestionEngine {
    pub fn new(config: SuggestConfig) -> Self {
        Self {
            config,
            seeds: Vec::new(),
        }
    }

    /// Extra names to suggest next to the category names, e.g. popular places.
    pub fn with_seeds(mut self, seeds: impl IntoIterator<Item = (LocaleCode, String)>) -> Self {
        self.seeds
            .extend(seeds.into_iter().map(|(locale, name)| Seed::new(locale, name, 0)));
        self
    }

    /// The query is short enough to be completed.
    pub fn is_active(&self, query: &QueryState) -> bool {
        query.raw().trim().chars().count() < self.config.max_query_chars
            || query.word_count() <= self.config.max_tokens
    }

    /// Completions for `query`, best first: input locale before others, then
    /// shorter names, then alphabetical.
    pub fn suggest(&self, query: &QueryState, taxonomy: &dyn CategoryTaxonomy) -> Vec<Suggestion> {
        if !self.is_active(query) || self.config.max_suggestions == 0 {
            return Vec::new();
        }
        let prefix = query.prefix();
        if prefix.is_none() && !query.is_empty() {
            return Vec::new();
        }
        let locales = query.locales();
        let typed = prefix.map_or(0, |p| p.chars().count());

        let categories = locales.iter().flat_map(|locale| {
            taxonomy
                .names_in(*locale)
                .into_iter()
                .map(|n| Seed::new(n.locale, n.name, n.min_prefix_len))
        });
        let extra = self
            .seeds
            .iter()
            .filter(|s| locales.contains(&s.locale))
            .cloned();

        let head = &query.raw()[..query.prefix_start()];
        categories
            .chain(extra)
            .filter(|seed| match prefix {
                None => seed.min_prefix_len == 0,
                Some(p) => {
                    typed >= usize::from(seed.min_prefix_len)
                        && seed.normalized != p
                        && seed.normalized.starts_with(p)
                }
            })
            .sorted_by(|a, b| {
                let priority = |s: &Seed| {
                    locales.iter().position(|l| *l == s.locale).unwrap_or(usize::MAX)
                };
                priority(a)
                    .cmp(&priority(b))
                    .then(a.name.chars().count().cmp(&b.name.chars().count()))
                    .then_with(|| a.normalized.cmp(&b.normalized))
            })
            .unique_by(|s| s.normalized.clone())
            .take(self.config.max_suggestions)
            .map(|seed| Suggestion {
                completion: format!("{head}{} ", seed.name),
                name: seed.name,
                locale: seed.locale,
            })
            .collect()
    }
}
