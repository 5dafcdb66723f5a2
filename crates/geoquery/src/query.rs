//! Query state: the raw text, its tokens and the locales it is read in.

use geoquery_data::{
    CategoryTaxonomy, LocaleCode,
    normalize::{is_separator, split_words},
};

use crate::{house::HouseNumber, keyword::QueryTerm};

/// The user's query as the orchestrator sees it.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    raw: String,
    tokens: Vec<String>,
    prefix: Option<String>,
    input_locale: Option<LocaleCode>,
    preferred_locale: Option<LocaleCode>,
}

/// Query terms for one pass, with the house number split off when address parsing is active.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedQuery {
    pub terms: Vec<QueryTerm>,
    pub house: Option<HouseNumber>,
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the query text. A trailing word not followed by a separator
    /// becomes the prefix.
    pub fn set_text(&mut self, text: &str) {
        self.raw = text.to_string();
        let mut words = split_words(text);
        let ends_in_word = text.chars().last().is_some_and(|c| !is_separator(c));
        self.prefix = if ends_in_word { words.pop() } else { None };
        self.tokens = words;
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty() && self.prefix.is_none()
    }

    /// Tokens plus the prefix.
    pub fn word_count(&self) -> usize {
        self.tokens.len() + usize::from(self.prefix.is_some())
    }

    /// Byte offset of the trailing partial word in the raw text.
    pub fn prefix_start(&self) -> usize {
        if self.prefix.is_none() {
            return self.raw.len();
        }
        self.raw
            .char_indices()
            .rev()
            .find(|(_, c)| is_separator(*c))
            .map_or(0, |(idx, c)| idx + c.len_utf8())
    }

    pub fn set_input_locale(&mut self, locale: LocaleCode) {
        self.input_locale = Some(locale);
    }

    pub fn set_preferred_locale(&mut self, locale: LocaleCode) {
        self.preferred_locale = Some(locale);
    }

    pub fn input_locale(&self) -> Option<LocaleCode> {
        self.input_locale
    }

    /// Active locales in priority order: input, preferred, native. At most three.
    pub fn locales(&self) -> Vec<LocaleCode> {
        let mut out = Vec::with_capacity(3);
        for l in [self.input_locale, self.preferred_locale, Some(LocaleCode::DEFAULT)]
            .into_iter()
            .flatten()
        {
            if !out.contains(&l) {
                out.push(l);
            }
        }
        out
    }

    /// Build the pass terms. With `detect_house`, the last word that reads
    /// as a house number is removed from the terms and returned separately.
    pub fn parse(&self, taxonomy: &dyn CategoryTaxonomy, detect_house: bool) -> ParsedQuery {
        let locales = self.locales();
        let mut words: Vec<(String, bool)> =
            self.tokens.iter().map(|t| (t.clone(), false)).collect();
        if let Some(p) = &self.prefix {
            words.push((p.clone(), true));
        }

        let house_idx = if detect_house && words.len() > 1 {
            words.iter().rposition(|(w, _)| HouseNumber::parse(w).is_some())
        } else {
            None
        };
        let house = house_idx.and_then(|idx| HouseNumber::parse(&words.remove(idx).0));

        let terms = words
            .into_iter()
            .map(|(text, prefix)| {
                let types = taxonomy.types_for_token(&text, prefix, &locales);
                QueryTerm::new(text, prefix).with_types(types)
            })
            .collect();
        ParsedQuery { terms, house }
    }
}

#[cfg(test)]
mod tests {
    use geoquery_data::{Categories, categories::types};

    use super::*;

    fn query(text: &str) -> QueryState {
        let mut q = QueryState::new();
        q.set_text(text);
        q
    }

    #[test]
    fn test_prefix_split() {
        let q = query("Main Str");
        assert_eq!(q.tokens(), &["main".to_string()]);
        assert_eq!(q.prefix(), Some("str"));
        assert_eq!(q.word_count(), 2);
        assert_eq!(q.prefix_start(), 5);

        let q = query("Main Street ");
        assert_eq!(q.tokens().len(), 2);
        assert_eq!(q.prefix(), None);
        assert_eq!(q.prefix_start(), q.raw().len());

        assert!(query("").is_empty());
        assert!(query("  ,, ").is_empty());
    }

    #[test]
    fn test_locales_are_deduplicated() {
        let mut q = QueryState::new();
        assert_eq!(q.locales(), vec![LocaleCode::DEFAULT]);
        q.set_input_locale(LocaleCode::ENGLISH);
        q.set_preferred_locale(LocaleCode::ENGLISH);
        assert_eq!(q.locales(), vec![LocaleCode::ENGLISH, LocaleCode::DEFAULT]);
    }

    #[test]
    fn test_parse_maps_categories() {
        let mut q = query("cafe");
        q.set_input_locale(LocaleCode::ENGLISH);
        let parsed = q.parse(&Categories::bundled(), true);
        assert_eq!(parsed.terms.len(), 1);
        assert!(parsed.terms[0].prefix);
        assert_eq!(parsed.terms[0].types, vec![types::CAFE]);
        assert!(parsed.house.is_none());
    }

    #[test]
    fn test_parse_strips_house_number() {
        let q = query("Springfield 1 Main St");
        let parsed = q.parse(&Categories::bundled(), true);
        assert_eq!(parsed.house.as_ref().map(|h| h.number), Some(1));
        let texts: Vec<_> = parsed.terms.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["springfield", "main", "st"]);
        assert_eq!(parsed.terms.iter().take_while(|t| !t.prefix).count(), 2);

        let trailing = query("Oak Avenue 12b").parse(&Categories::bundled(), true);
        assert_eq!(trailing.house.map(|h| h.raw), Some("12b".to_string()));

        // A lone number is a query, not an address
        assert!(query("42").parse(&Categories::bundled(), true).house.is_none());
        assert!(q.parse(&Categories::bundled(), false).house.is_none());
    }
}
