//! Compact locale codes used for multilingual feature names.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Language tags known to map containers, indexed by their code.
///
/// Index 0 is the feature's own (native) name and never comes from a user tag.
const LANGUAGES: &[&str] = &[
    "default", "en", "ja", "fr", "ko", "ar", "de", "ru", "es", "it", "zh", "pt", "nl", "pl", "uk",
    "be", "sv", "fi", "tr", "cs",
];

/// A locale code as stored in map containers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocaleCode(pub i8);

impl LocaleCode {
    /// The feature's own primary name.
    pub const DEFAULT: Self = Self(0);
    pub const ENGLISH: Self = Self(1);

    /// Parse a BCP-47-ish tag (`"en"`, `"en-US"`, `"pt_BR"`).
    ///
    /// Only the primary subtag is used. Unknown or malformed tags return `None`
    /// so callers can keep their previous locale.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let primary = tag
            .trim()
            .split(['-', '_'])
            .next()
            .filter(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphabetic()))?
            .to_ascii_lowercase();
        if primary == "default" {
            return None;
        }
        LANGUAGES
            .iter()
            .position(|&lang| lang == primary)
            .and_then(|idx| i8::try_from(idx).ok())
            .map(Self)
    }

    /// The tag this code was parsed from, or `"unknown"` for codes outside the table.
    pub fn tag(self) -> &'static str {
        usize::try_from(self.0)
            .ok()
            .and_then(|idx| LANGUAGES.get(idx))
            .copied()
            .unwrap_or("unknown")
    }
}

impl Default for LocaleCode {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for LocaleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}
