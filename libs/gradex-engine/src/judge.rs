/// Output Judge - Pure Comparison Policies
///
/// **Core Responsibility:**
/// Decide whether a program's stdout matches the expected output under the
/// problem's rating mode.
///
/// **Critical Properties:**
/// - Knows nothing about processes or languages
/// - Pure and total: (output, expected, mode) → bool, never panics
/// - An invalid regex pattern fails closed (returns false)
use std::sync::LazyLock;

use gradex_common::types::RatingMode;
use regex::Regex;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static BRACKET_SPACING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*([\[\]\(\)\{\}])\s*").unwrap());
static COMMA_SPACING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*").unwrap());

/// Compare actual vs expected output under the given rating mode.
pub fn compare(output: &str, expected: &str, mode: RatingMode) -> bool {
    match mode {
        RatingMode::Hard => compare_hard(output, expected),
        RatingMode::Space => compare_space(output, expected),
        RatingMode::Regex => compare_regex(output, expected),
        RatingMode::None => true,
    }
}

fn compare_hard(output: &str, expected: &str) -> bool {
    output.trim() == expected.trim()
}

fn compare_space(output: &str, expected: &str) -> bool {
    normalize_space(output) == normalize_space(expected)
}

/// Collapse whitespace so that formatting-only differences do not fail a
/// submission: newlines become spaces, runs collapse to a single space,
/// spaces adjacent to brackets/braces/parens and after commas are removed.
/// Idempotent: `normalize_space(normalize_space(s)) == normalize_space(s)`.
pub fn normalize_space(text: &str) -> String {
    let text = text.replace('\n', " ");
    let text = WHITESPACE_RUN.replace_all(&text, " ");
    let text = BRACKET_SPACING.replace_all(&text, "$1");
    let text = COMMA_SPACING.replace_all(&text, ",");
    text.trim().to_string()
}

fn compare_regex(output: &str, expected: &str) -> bool {
    // Fullmatch semantics with DOTALL + MULTILINE. A malformed pattern is a
    // non-match, never an error surfaced to the caller.
    let anchored = format!(r"\A(?sm:{})\z", expected.trim());
    match Regex::new(&anchored) {
        Ok(pattern) => pattern.is_match(output.trim()),
        Err(_) => false,
    }
}
