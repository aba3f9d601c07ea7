use crate::lexical::tokenize;

const ELLIPSIS: char = '…';

/// Excerpt of at most `max_chars` characters around the first query term
///
/// Matching is ASCII case-insensitive. With no match the leading window is
/// used. Truncated sides are marked with an ellipsis.
pub fn make_snippet(text: &str, query: &str, max_chars: usize) -> String {
    let total = text.chars().count();
    if total <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }

    let lowered = text.to_ascii_lowercase();
    let first_hit = tokenize(query)
        .iter()
        .filter_map(|term| lowered.find(term.as_str()))
        .min()
        .map(|byte| text[..byte].chars().count());

    let start = match first_hit {
        Some(hit) => hit.saturating_sub(max_chars / 2),
        None => 0,
    };
    let end = (start + max_chars).min(total);
    let start = end.saturating_sub(max_chars);

    let mut snippet = String::with_capacity(max_chars + 8);
    if start > 0 {
        snippet.push(ELLIPSIS);
    }
    snippet.extend(text.chars().skip(start).take(end - start));
    if end < total {
        snippet.push(ELLIPSIS);
    }
    snippet
}
