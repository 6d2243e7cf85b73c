//! Canonical form for shareholder names.
//!
//! The accounting client and the registry disagree on accents and casing
//! (`João da Silva` vs `JOAO DA SILVA`), so names are only ever compared
//! after passing through [`normalize`].

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Decompose accented characters, drop the combining marks and upper-case.
///
/// Marks are stripped again after upper-casing because a handful of
/// lowercase letters map to uppercase forms that decompose further.
pub fn normalize(name: &str) -> String {
    let upper = strip_marks(name).to_uppercase();
    strip_marks(&upper)
}

fn strip_marks(s: &str) -> String {
    s.nfd().filter(|c| !is_combining_mark(*c)).collect()
}
