//! Canonical form of attribution values.

use engine_core::SourceMediumTerm;

const STRIPPED: [char; 6] = ['/', '\\', '?', '&', '=', '#'];

/// Lowercases, turns spaces into `-` and removes URL punctuation.
pub fn normalize(value: &str) -> String {
    value
        .trim()
        .to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| !STRIPPED.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn normalize_all(smt: &SourceMediumTerm) -> SourceMediumTerm {
    SourceMediumTerm::new(
        normalize(&smt.source),
        normalize(&smt.medium),
        normalize(&smt.term),
    )
}
