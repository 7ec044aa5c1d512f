//! Output matching
//!
//! Compares a program's actual output against a test case's expected output
//! under a per-test-case policy. Matching never fails: malformed numbers or
//! patterns are simply a mismatch.

pub mod similarity;

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Minimum similarity for a `SIMILARITY` match
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Absolute tolerance for a `NUMERIC` match
pub const NUMERIC_TOLERANCE: f64 = 1e-6;

/// Comparison policy attached to a test case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum MatchPolicy {
    #[default]
    Exact,
    IgnoreCase,
    IgnoreWhitespace,
    Numeric,
    Contains,
    Regex,
    Similarity,
}

impl MatchPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchPolicy::Exact => "EXACT",
            MatchPolicy::IgnoreCase => "IGNORE_CASE",
            MatchPolicy::IgnoreWhitespace => "IGNORE_WHITESPACE",
            MatchPolicy::Numeric => "NUMERIC",
            MatchPolicy::Contains => "CONTAINS",
            MatchPolicy::Regex => "REGEX",
            MatchPolicy::Similarity => "SIMILARITY",
        }
    }
}

impl fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unknown policy names fall back to `EXACT`
impl From<String> for MatchPolicy {
    fn from(value: String) -> Self {
        match value.trim().to_uppercase().as_str() {
            "IGNORE_CASE" => MatchPolicy::IgnoreCase,
            "IGNORE_WHITESPACE" => MatchPolicy::IgnoreWhitespace,
            "NUMERIC" => MatchPolicy::Numeric,
            "CONTAINS" => MatchPolicy::Contains,
            "REGEX" => MatchPolicy::Regex,
            "SIMILARITY" => MatchPolicy::Similarity,
            _ => MatchPolicy::Exact,
        }
    }
}

/// Compare `actual` against `expected` under `policy`.
///
/// A missing actual output only matches a missing expected output.
pub fn matches(actual: Option<&str>, expected: Option<&str>, policy: MatchPolicy) -> bool {
    let (actual, expected) = match (actual, expected) {
        (None, expected) => return expected.is_none(),
        (Some(_), None) => return false,
        (Some(a), Some(e)) => (a, e),
    };

    match policy {
        MatchPolicy::Exact => actual == expected,
        MatchPolicy::IgnoreCase => eq_ignore_case(actual, expected),
        MatchPolicy::IgnoreWhitespace => strip_whitespace(actual) == strip_whitespace(expected),
        MatchPolicy::Numeric => numeric_eq(actual, expected),
        MatchPolicy::Contains => actual.contains(expected),
        MatchPolicy::Regex => regex_full_match(actual, expected),
        MatchPolicy::Similarity => similarity::score(actual, expected) >= SIMILARITY_THRESHOLD,
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}

fn numeric_eq(actual: &str, expected: &str) -> bool {
    match (actual.trim().parse::<f64>(), expected.trim().parse::<f64>()) {
        (Ok(a), Ok(e)) => (a - e).abs() < NUMERIC_TOLERANCE,
        _ => false,
    }
}

fn regex_full_match(actual: &str, pattern: &str) -> bool {
    match Regex::new(&format!("^(?:{})$", pattern)) {
        Ok(re) => re.is_match(actual),
        Err(e) => {
            debug!("Invalid match pattern {:?}: {}", pattern, e);
            false
        }
    }
}
