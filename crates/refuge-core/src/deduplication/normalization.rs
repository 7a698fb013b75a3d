//! Name normalization for shelter matching

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Generic shelter words that say nothing about which shelter is meant
pub const STOPWORDS: [&str; 8] = [
    "cabane", "refuge", "abri", "refugi", "refugio", "cayolar", "orri", "orry",
];

/// Elided articles dropped from the start of a word
const ELISIONS: [&str; 2] = ["d'", "l'"];

/// Canonical comparison key for a display name.
///
/// - Folds diacritics and compatibility forms
/// - Converts to lowercase
/// - Drops elided articles (`d'Areng` -> `areng`)
/// - Removes generic shelter words, also inside hyphenated compounds
/// - Removes everything but ASCII letters, digits and spaces
/// - Collapses whitespace
///
/// The key is idempotent: `normalize_name(&normalize_name(x)) == normalize_name(x)`.
pub fn normalize_name(name: &str) -> String {
    let folded: String = name
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        // Typographic apostrophes count as elision marks
        .replace(['\u{2019}', '\u{2018}', '\u{02bc}'], "'");

    folded
        .split_whitespace()
        .map(strip_elision)
        .map(|word| {
            // Hyphenated compounds: each alphanumeric run is its own token
            word.split(|c: char| !c.is_ascii_alphanumeric())
                .filter(|run| !is_stopword(run))
                .collect::<String>()
        })
        .filter(|word| !word.is_empty() && !is_stopword(word))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

/// Drop one leading elided article, if any
fn strip_elision(word: &str) -> &str {
    for prefix in ELISIONS {
        if let Some(rest) = word.strip_prefix(prefix) {
            return rest;
        }
    }
    word
}
