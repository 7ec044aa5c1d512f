//! Behavioral validator for the sentiment analysis problem

use super::{BehaviorOutcome, BehaviorValidator};
use crate::core::TestCase;

const PROBLEM_ID: &str = "sentiment-analysis";

const POSITIVE_WORDS: &[&str] = &[
    "love", "best", "great", "excellent", "amazing", "wonderful", "fantastic", "good", "nice",
    "happy", "joy",
];

const NEGATIVE_WORDS: &[&str] = &[
    "hate", "worst", "terrible", "awful", "bad", "horrible", "sad", "angry", "disappointed",
    "stuck",
];

/// Phrases that make a text neutral regardless of keyword counts
const NEUTRAL_MARKERS: &[&str] = &["okay", "average", "nothing great"];

pub struct SentimentAnalysisValidator;

impl SentimentAnalysisValidator {
    /// Keyword-count classifier: `positive`, `negative` or `neutral`
    pub fn classify(text: &str) -> &'static str {
        let lower = text.to_lowercase();

        if NEUTRAL_MARKERS.iter().any(|m| lower.contains(m)) {
            return "neutral";
        }

        let count = |words: &[&str]| -> usize { words.iter().map(|w| lower.matches(w).count()).sum() };
        let positive = count(POSITIVE_WORDS);
        let negative = count(NEGATIVE_WORDS);

        match positive.cmp(&negative) {
            std::cmp::Ordering::Greater => "positive",
            std::cmp::Ordering::Less => "negative",
            std::cmp::Ordering::Equal => "neutral",
        }
    }
}

impl BehaviorValidator for SentimentAnalysisValidator {
    fn name(&self) -> &'static str {
        "sentiment-analysis"
    }

    fn supports(&self, problem_id: &str) -> bool {
        problem_id == PROBLEM_ID
    }

    fn validate(&self, _problem_id: &str, case: &TestCase, _code: &str) -> BehaviorOutcome {
        let actual = Self::classify(&case.input).to_string();
        let passed = actual == case.expected_output;
        let feedback = (!passed).then(|| {
            format!(
                "For input '{}', expected '{}' but got '{}'. \
                 Consider analyzing the emotional tone of the text more carefully.",
                case.input, case.expected_output, actual
            )
        });

        BehaviorOutcome {
            input: case.input.clone(),
            expected: case.expected_output.clone(),
            actual,
            passed,
            feedback,
        }
    }
}
