//! Identity-key normalization and entity alignment.

pub mod align;

pub use align::{AlignedPair, Alignment, EntityMatcher};

/// Generational suffixes dropped from player name keys. Compared after
/// trailing-dot stripping, so "Jr" and "Jr." both match.
const NAME_SUFFIXES: &[&str] = &["jr", "sr", "ii", "iii", "iv"];

/// Lowercase and collapse runs of whitespace.
pub fn normalize_key(raw: &str) -> String {
    raw.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalized player-name key: lowercase, collapsed whitespace, trailing
/// generational suffixes removed. Word order is preserved; "Smith, Bob"
/// does not key-match "Bob Smith" without a mapping rule.
pub fn normalize_name(raw: &str) -> String {
    let mut tokens: Vec<&str> = Vec::new();
    let lowered = raw.to_lowercase();
    for token in lowered.split_whitespace() {
        tokens.push(token);
    }
    while let Some(last) = tokens.last() {
        let bare = last.trim_end_matches('.');
        if NAME_SUFFIXES.contains(&bare) {
            tokens.pop();
        } else {
            break;
        }
    }
    tokens.join(" ")
}

/// Case normalization per a rule's caseSensitive flag, with whitespace
/// always collapsed.
pub fn fold_case(raw: &str, case_sensitive: bool) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if case_sensitive {
        collapsed
    } else {
        collapsed.to_lowercase()
    }
}
