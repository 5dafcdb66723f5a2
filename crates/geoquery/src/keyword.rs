//! Keyword matching of query terms against multilingual feature names.
//!
//! Word matches are graded `Exact > Prefix > Fuzzy`. A feature's score is
//! the best score over its names, where names in the active locales win ties
//! against names in other languages.

use geoquery_data::{
    LocaleCode, NameSet, TypeCode,
    normalize::{split_words, word_spans},
};
use rapidfuzz::distance::levenshtein;

/// Quality of a single term/word match, ordered from worst to best.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MatchQuality {
    #[default]
    None,
    Fuzzy,
    Prefix,
    Exact,
}

impl MatchQuality {
    pub fn is_match(self) -> bool {
        self != Self::None
    }
}

/// Maximum edit distance tolerated for a word of `len` characters.
pub fn max_errors(len: usize) -> u8 {
    if len < 5 {
        0
    } else if len <= 8 {
        1
    } else {
        2
    }
}

/// One normalized query word, as used by retrieval and scoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTerm {
    pub text: String,
    /// The trailing partial word: also matches words it is a prefix of.
    pub prefix: bool,
    /// Alternative spellings that count as exact matches.
    pub synonyms: Vec<String>,
    /// Category types named by this term.
    pub types: Vec<TypeCode>,
}

impl QueryTerm {
    pub fn new(text: impl Into<String>, prefix: bool) -> Self {
        Self {
            text: text.into(),
            prefix,
            synonyms: Vec::new(),
            types: Vec::new(),
        }
    }

    pub fn with_types(mut self, types: Vec<TypeCode>) -> Self {
        self.types = types;
        self
    }

    pub fn max_errors(&self) -> u8 {
        max_errors(self.text.chars().count())
    }

    /// Grade a normalized name word against this term.
    pub fn match_word(&self, word: &str) -> MatchQuality {
        if word == self.text || self.synonyms.iter().any(|s| s == word) {
            return MatchQuality::Exact;
        }
        if self.prefix && !self.text.is_empty() && word.starts_with(&self.text) {
            return MatchQuality::Prefix;
        }
        let max = usize::from(self.max_errors());
        if max > 0
            && word.chars().count().abs_diff(self.text.chars().count()) <= max
            && levenshtein::distance(self.text.chars(), word.chars()) <= max
        {
            return MatchQuality::Fuzzy;
        }
        MatchQuality::None
    }

    fn matches_types(&self, types: &[TypeCode]) -> bool {
        self.types.iter().any(|t| types.contains(t))
    }
}

/// Keyword relevance of a feature, ordered so that greater is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeywordScore {
    /// Number of query terms matched by the name or the feature types.
    pub matched_terms: u8,
    /// Weakest quality among the matched terms.
    pub quality: MatchQuality,
    /// Every word of the name was matched.
    pub full_name: bool,
    /// 3 for the input locale down to 1 for the native name, 0 for other languages.
    pub locale_priority: u8,
}

impl KeywordScore {
    /// True when all `term_count` terms matched.
    pub fn matches_all(&self, term_count: usize) -> bool {
        usize::from(self.matched_terms) >= term_count
            && (term_count == 0 || self.quality.is_match())
    }

    /// The part of the score that orders final results: terms matched, then
    /// the weakest match quality.
    pub fn relevance(&self) -> (u8, MatchQuality) {
        (self.matched_terms, self.quality)
    }

    /// Monotonic scalar form of the score.
    pub fn weight(&self) -> u32 {
        u32::from(self.matched_terms) * 64
            + self.quality as u32 * 16
            + u32::from(self.full_name) * 4
            + u32::from(self.locale_priority)
    }
}

/// The name that best matches the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BestName {
    pub locale: LocaleCode,
    pub name: String,
    pub score: KeywordScore,
}

/// A matched span of a display name, in character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HighlightRange {
    pub start: usize,
    pub end: usize,
    pub kind: MatchQuality,
}

/// Scores terms against names for up to three active locales.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordMatcher {
    locales: Vec<LocaleCode>,
}

impl KeywordMatcher {
    pub const MAX_LOCALES: usize = 3;

    /// `locales` in priority order; only the first three are used.
    pub fn new(locales: &[LocaleCode]) -> Self {
        let mut active = Vec::with_capacity(Self::MAX_LOCALES);
        for &l in locales {
            if active.len() == Self::MAX_LOCALES {
                break;
            }
            if !active.contains(&l) {
                active.push(l);
            }
        }
        Self { locales: active }
    }

    pub fn locales(&self) -> &[LocaleCode] {
        &self.locales
    }

    fn locale_priority(&self, locale: LocaleCode) -> u8 {
        self.locales
            .iter()
            .position(|l| *l == locale)
            .map_or(0, |idx| (Self::MAX_LOCALES - idx) as u8)
    }

    /// Score all terms against one name.
    pub fn score_name(
        &self,
        terms: &[QueryTerm],
        name: &str,
        locale: LocaleCode,
        types: &[TypeCode],
    ) -> KeywordScore {
        let words = split_words(name);
        let mut matched = 0u8;
        let mut weakest: Option<MatchQuality> = None;
        for term in terms {
            let mut q = words.iter().map(|w| term.match_word(w)).max().unwrap_or_default();
            if term.matches_types(types) {
                q = MatchQuality::Exact;
            }
            if q.is_match() {
                matched = matched.saturating_add(1);
                weakest = Some(weakest.map_or(q, |w| w.min(q)));
            }
        }
        let full_name = !words.is_empty()
            && words
                .iter()
                .all(|w| terms.iter().any(|t| t.match_word(w).is_match()));
        KeywordScore {
            matched_terms: matched,
            quality: weakest.unwrap_or_default(),
            full_name,
            locale_priority: self.locale_priority(locale),
        }
    }

    /// The best matching name, ties going to the higher priority locale and then the earlier name.
    pub fn best_name(
        &self,
        terms: &[QueryTerm],
        names: &NameSet,
        types: &[TypeCode],
    ) -> Option<BestName> {
        let mut best: Option<BestName> = None;
        for (locale, name) in names.iter() {
            let score = self.score_name(terms, name, locale, types);
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(BestName {
                    locale,
                    name: name.to_string(),
                    score,
                });
            }
        }
        best
    }

    /// Feature-level score: the best name, or the type match alone for unnamed features.
    pub fn score(&self, terms: &[QueryTerm], names: &NameSet, types: &[TypeCode]) -> KeywordScore {
        let by_types = self.score_name(terms, "", LocaleCode::DEFAULT, types);
        self.best_name(terms, names, types)
            .map_or(by_types, |b| b.score.max(by_types))
    }

    /// Character ranges of `name` matched by any term.
    pub fn highlights(&self, terms: &[QueryTerm], name: &str) -> Vec<HighlightRange> {
        word_spans(name)
            .into_iter()
            .filter_map(|(start, end, word)| {
                let kind = terms.iter().map(|t| t.match_word(&word)).max()?;
                kind.is_match().then_some(HighlightRange { start, end, kind })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn term(text: &str) -> QueryTerm {
        QueryTerm::new(text, false)
    }

    #[test]
    fn test_quality_is_strictly_ordered() {
        assert!(MatchQuality::Exact > MatchQuality::Prefix);
        assert!(MatchQuality::Prefix > MatchQuality::Fuzzy);
        assert!(MatchQuality::Fuzzy > MatchQuality::None);
    }

    #[test]
    fn test_match_word() {
        let prefix = QueryTerm::new("spring", true);
        assert_eq!(prefix.match_word("spring"), MatchQuality::Exact);
        assert_eq!(prefix.match_word("springfield"), MatchQuality::Prefix);
        assert_eq!(term("spring").match_word("springfield"), MatchQuality::None);

        assert_eq!(term("musem").match_word("museum"), MatchQuality::Fuzzy);
        // Short words get no typo tolerance
        assert_eq!(term("cafe").match_word("cafa"), MatchQuality::None);

        let mut st = term("st");
        st.synonyms.push("street".into());
        assert_eq!(st.match_word("street"), MatchQuality::Exact);
    }

    #[test]
    fn test_best_locale_wins() {
        let de = LocaleCode::from_tag("de").unwrap();
        let names = NameSet::native("München").with(LocaleCode::ENGLISH, "Munich");
        let matcher = KeywordMatcher::new(&[LocaleCode::ENGLISH, LocaleCode::DEFAULT]);

        let native = matcher.best_name(&[term("munchen")], &names, &[]).unwrap();
        assert_eq!(native.locale, LocaleCode::DEFAULT);
        assert_eq!(native.score.locale_priority, 2);
        // Names outside the active locales still match, at the lowest priority
        let other = matcher
            .best_name(&[term("munchen")], &NameSet::new().with(de, "München"), &[])
            .unwrap();
        assert_eq!(other.score.quality, MatchQuality::Exact);
        assert_eq!(other.score.locale_priority, 0);

        let best = matcher.best_name(&[term("munich")], &names, &[]).unwrap();
        assert_eq!(best.name, "Munich");
        assert_eq!(best.score.locale_priority, 3);
    }

    #[test]
    fn test_score_counts_terms_and_types() {
        let matcher = KeywordMatcher::new(&[LocaleCode::ENGLISH, LocaleCode::DEFAULT]);
        let names = NameSet::native("Blue Bottle");
        let cafe = QueryTerm::new("cafe", false).with_types(vec![1]);

        let score = matcher.score(&[cafe.clone(), term("blue")], &names, &[1]);
        assert_eq!(score.matched_terms, 2);
        assert_eq!(score.quality, MatchQuality::Exact);
        assert!(!score.full_name);
        assert!(score.matches_all(2));

        let without_type = matcher.score(&[cafe, term("blue")], &names, &[]);
        assert_eq!(without_type.matched_terms, 1);
        assert!(!without_type.matches_all(2));
        assert!(score > without_type);

        // Unnamed features can still match by category
        let by_type = [QueryTerm::new("cafe", true).with_types(vec![1])];
        let unnamed = matcher.score(&by_type, &NameSet::new(), &[1]);
        assert!(unnamed.matches_all(1));
    }

    #[test]
    fn test_full_name_beats_partial() {
        let matcher = KeywordMatcher::new(&[LocaleCode::DEFAULT]);
        let terms = [term("main"), QueryTerm::new("street", true)];
        let full = matcher.score(&terms, &NameSet::native("Main Street"), &[]);
        let partial = matcher.score(&terms, &NameSet::native("Main Street North"), &[]);
        assert!(full.full_name);
        assert!(full > partial);
        assert!(full.weight() > partial.weight());
    }

    #[test]
    fn test_highlights() {
        let matcher = KeywordMatcher::new(&[LocaleCode::DEFAULT]);
        let terms = [term("city"), QueryTerm::new("mus", true)];
        let ranges = matcher.highlights(&terms, "City Museum, Café");
        let range = |start, end, kind| HighlightRange { start, end, kind };
        assert_eq!(
            ranges,
            vec![range(0, 4, MatchQuality::Exact), range(5, 11, MatchQuality::Prefix)]
        );
    }

    #[test]
    fn test_matcher_keeps_three_distinct_locales() {
        let de = LocaleCode::from_tag("de").unwrap();
        let fr = LocaleCode::from_tag("fr").unwrap();
        let m = KeywordMatcher::new(&[de, de, LocaleCode::ENGLISH, fr, LocaleCode::DEFAULT]);
        assert_eq!(m.locales(), &[de, LocaleCode::ENGLISH, fr]);
    }
}
