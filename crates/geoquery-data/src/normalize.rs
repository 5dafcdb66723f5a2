//! Text normalization shared by container indexing and query tokenization.
//!
//! Both sides must fold text identically or the text index would never match
//! the query tokens.

/// Fold a single character: lowercase and strip common Latin diacritics.
fn fold_char(c: char, out: &mut String) {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ą' => 'a',
        'ç' | 'ć' | 'č' => 'c',
        'ď' | 'đ' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ę' | 'ě' => 'e',
        'ì' | 'í' | 'î' | 'ï' | 'ī' => 'i',
        'ł' => 'l',
        'ñ' | 'ń' | 'ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => 'o',
        'ř' => 'r',
        'ś' | 'š' | 'ş' => 's',
        'ť' | 'ţ' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => 'u',
        'ý' | 'ÿ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        'ß' => {
            out.push_str("ss");
            return;
        }
        'ё' => 'е',
        other => other,
    };
    out.push(folded);
}

/// True for characters that separate tokens.
pub fn is_separator(c: char) -> bool {
    !(c.is_alphanumeric() || c == '/' || c == '\'')
}

/// Lowercase and fold diacritics. Separators are preserved.
pub fn normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars().flat_map(char::to_lowercase) {
        fold_char(c, &mut out);
    }
    out
}

/// Normalize and split into non-empty words.
pub fn split_words(text: &str) -> Vec<String> {
    normalize(text)
        .split(is_separator)
        .filter(|w| !w.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Split the original (un-normalized) text into words with their char offsets.
///
/// Used to compute highlight ranges in display names.
pub fn word_spans(text: &str) -> Vec<(usize, usize, String)> {
    let mut spans = Vec::new();
    let mut start: Option<usize> = None;
    let chars: Vec<char> = text.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        match (start, is_separator(c)) {
            (None, false) => start = Some(i),
            (Some(s), true) => {
                let word: String = chars[s..i].iter().collect();
                spans.push((s, i, normalize(&word)));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        let word: String = chars[s..].iter().collect();
        spans.push((s, chars.len(), normalize(&word)));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_folds_case_and_diacritics() {
        assert_eq!(normalize("Café Zürich"), "cafe zurich");
        assert_eq!(normalize("Straße"), "strasse");
        assert_eq!(normalize("ŁÓDŹ"), "lodz");
    }

    #[test]
    fn test_split_words() {
        assert_eq!(split_words("  Main St., 12/3 "), vec!["main", "st", "12/3"]);
        assert!(split_words(" ,, ").is_empty());
    }

    #[test]
    fn test_word_spans_use_char_offsets() {
        let spans = word_spans("Café de Flore");
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0], (0, 4, "cafe".to_string()));
        assert_eq!(spans[2], (8, 13, "flore".to_string()));
    }
}
