//! Code-aware tokenizer shared by indexing and querying

use regex::Regex;
use std::sync::OnceLock;

/// Words dropped before indexing
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "have", "i", "in",
    "is", "it", "its", "of", "on", "or", "that", "the", "to", "was", "were", "will", "with",
    "you", "your",
];

fn word_regex() -> &'static Regex {
    static WORDS: OnceLock<Regex> = OnceLock::new();
    WORDS.get_or_init(|| Regex::new(r"[A-Za-z0-9_]+").expect("static regex"))
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.binary_search(&token).is_ok()
}

/// Tokenize text into lowercase terms
///
/// Every alphanumeric/underscore run becomes one term. Identifiers also emit
/// their snake_case and camelCase parts when a part differs from the whole
/// token and is not a stopword.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut out = Vec::new();

    for m in word_regex().find_iter(text) {
        let raw = m.as_str();
        let token = raw.to_ascii_lowercase();
        if is_stopword(&token) {
            continue;
        }

        let subs: Vec<String> = split_identifier(raw)
            .into_iter()
            .map(str::to_ascii_lowercase)
            .filter(|sub| *sub != token && !is_stopword(sub))
            .collect();

        out.push(token);
        out.extend(subs);
    }

    out
}

/// Split on underscores, then on camelCase boundaries
///
/// `parse_jsonValue` -> `parse`, `json`, `Value`; `HTTPServer` -> `HTTP`, `Server`.
pub fn split_identifier(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();

    for piece in raw.split('_').filter(|p| !p.is_empty()) {
        let chars: Vec<(usize, char)> = piece.char_indices().collect();
        let mut start = 0;

        for i in 1..chars.len() {
            let (pos, cur) = chars[i];
            let prev = chars[i - 1].1;
            let next_is_lower = chars.get(i + 1).is_some_and(|(_, c)| c.is_ascii_lowercase());

            let lower_to_upper = (prev.is_ascii_lowercase() || prev.is_ascii_digit())
                && cur.is_ascii_uppercase();
            let acronym_end =
                prev.is_ascii_uppercase() && cur.is_ascii_uppercase() && next_is_lower;

            if lower_to_upper || acronym_end {
                parts.push(&piece[start..pos]);
                start = pos;
            }
        }
        parts.push(&piece[start..]);
    }

    parts
}
