//! Parser for the `synchronous_standby_names` GUC.
//!
//! Recognizes the PostgreSQL 9.6+ grammar:
//! - `ANY n (name, ...)` — quorum commit; no individual standby is
//!   guaranteed synchronous, so the result is empty.
//! - `FIRST n (name, ...)` — the first `n` names are synchronous.
//! - `n (name, ...)` — same, `FIRST` implied.
//! - `name [, ...]` — exactly the first name is synchronous.

/// Separator set used by the tokenizer. Double quotes are separators too:
/// quoted names are split at the quotes, not kept as atomic tokens.
const fn is_separator(c: char) -> bool {
    matches!(c, ' ' | ',' | '(' | ')' | '"')
}

/// Tokens are the maximal non-separator runs; consecutive separators collapse.
fn tokenize(raw: &str) -> Vec<&str> {
    raw.split(is_separator).filter(|t| !t.is_empty()).collect()
}

/// Parses `num_sync`: leading ASCII decimal digits only, anything else ends
/// the number. Non-numeric tokens count as 0.
fn parse_num_sync(token: &str) -> usize {
    let end = token
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(token.len());
    token
        .get(..end)
        .and_then(|digits| digits.parse().ok())
        .unwrap_or(0)
}

fn take_names(tokens: &[&str], count: usize) -> Vec<String> {
    tokens
        .iter()
        .take(count)
        .map(|name| (*name).to_string())
        .collect()
}

/// Extracts the application names to treat as synchronous from the raw GUC
/// value. Pure and total: malformed input yields an empty list.
#[must_use]
pub fn parse(raw: &str) -> Vec<String> {
    let tokens = tokenize(raw);
    let Some((&head, rest)) = tokens.split_first() else {
        return Vec::new();
    };

    if head.eq_ignore_ascii_case("ANY") {
        return Vec::new();
    }

    if head.eq_ignore_ascii_case("FIRST") {
        let Some((&count, names)) = rest.split_first() else {
            return Vec::new();
        };
        return take_names(names, parse_num_sync(count));
    }

    // Bare-count form, `FIRST` implied. The bounded branch triggers on a '('
    // anywhere past the first token, not just immediately after it.
    let head_start = raw.find(|c| !is_separator(c)).unwrap_or(0);
    let after_head = raw.get(head_start + head.len()..).unwrap_or("");
    if after_head.contains('(') {
        return take_names(rest, parse_num_sync(head));
    }

    // Plain name list without a count: only the first entry is synchronous.
    vec![head.to_string()]
}
