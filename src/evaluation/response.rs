//! Outward-facing views
//!
//! Everything a caller sees goes through these types. Hidden test cases are
//! masked here, so no response can leak their input or expected output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::{Language, Submission, SubmissionStatus, TestCase, TestResult};
use crate::validation::{BehaviorOutcome, ValidationResult};

pub const HIDDEN_INPUT: &str = "Hidden test case";
pub const HIDDEN_EXPECTED: &str = "Hidden";

pub const STRUCTURE_FAILURE_MESSAGE: &str = "Code structure validation failed";

/// One test result as shown to the submitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResultView {
    pub test_case_id: i64,
    pub input: String,
    pub expected_output: String,
    pub actual_output: Option<String>,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
    pub memory_usage_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
    pub hidden: bool,
}

impl TestResultView {
    pub fn new(case: &TestCase, result: &TestResult) -> Self {
        let (input, expected_output, actual_output) = if case.hidden {
            // The actual output of a passing hidden case is its expected output
            (HIDDEN_INPUT.to_string(), HIDDEN_EXPECTED.to_string(), None)
        } else {
            (
                case.input.clone(),
                case.expected_output.clone(),
                result.actual_output.clone(),
            )
        };

        Self {
            test_case_id: result.test_case_id,
            input,
            expected_output,
            actual_output,
            passed: result.passed,
            error_message: result.error_message.clone(),
            execution_time_ms: result.execution_time_ms,
            memory_usage_bytes: result.memory_usage_bytes,
            similarity_score: result.similarity_score,
            hidden: case.hidden,
        }
    }

    /// Views for `results`, which follow `cases` order but may skip test
    /// cases that never ran.
    ///
    /// A result with no matching test case is fully masked.
    pub fn collect(cases: &[TestCase], results: &[TestResult]) -> Vec<Self> {
        let mut next = 0;
        results
            .iter()
            .map(|result| {
                let offset = cases[next..]
                    .iter()
                    .position(|case| case.id == result.test_case_id);
                match offset {
                    Some(offset) => {
                        let case = &cases[next + offset];
                        next += offset + 1;
                        Self::new(case, result)
                    }
                    None => {
                        warn!("No test case for result {}, masking it", result.test_case_id);
                        Self::unmatched(result)
                    }
                }
            })
            .collect()
    }

    fn unmatched(result: &TestResult) -> Self {
        Self {
            test_case_id: result.test_case_id,
            input: HIDDEN_INPUT.to_string(),
            expected_output: HIDDEN_EXPECTED.to_string(),
            actual_output: None,
            passed: result.passed,
            error_message: result.error_message.clone(),
            execution_time_ms: result.execution_time_ms,
            memory_usage_bytes: result.memory_usage_bytes,
            similarity_score: result.similarity_score,
            hidden: true,
        }
    }
}

/// Response of an ad-hoc run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub test_results: Vec<TestResultView>,
    pub success: bool,
    /// Whole-run failure, e.g. compiler output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Response when structural validation rejects the code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationFailureResponse {
    pub success: bool,
    pub message: String,
    pub errors: Vec<String>,
    pub passed_tests: usize,
    pub total_tests: usize,
    pub test_results: Vec<TestResultView>,
}

impl ValidationFailureResponse {
    pub fn new(validation: &ValidationResult, total_tests: usize) -> Self {
        Self {
            success: false,
            message: validation
                .message
                .clone()
                .unwrap_or_else(|| STRUCTURE_FAILURE_MESSAGE.to_string()),
            errors: validation.errors.clone(),
            passed_tests: 0,
            total_tests,
            test_results: Vec::new(),
        }
    }
}

/// Report of the validator-chain path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionReport {
    pub success: bool,
    pub passed_tests: usize,
    pub total_tests: usize,
    pub test_results: Vec<BehaviorOutcome>,
    pub message: String,
    pub structure_warnings: Vec<String>,
}

impl SolutionReport {
    pub fn result_message(passed: usize, total: usize) -> String {
        if passed == total {
            "All tests passed! Great job!".to_string()
        } else {
            format!("Passed {} out of {} tests. Keep trying!", passed, total)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValidationReport {
    Solution(SolutionReport),
    Rejected(ValidationFailureResponse),
}

impl ValidationReport {
    pub fn success(&self) -> bool {
        match self {
            ValidationReport::Solution(report) => report.success,
            ValidationReport::Rejected(_) => false,
        }
    }
}

/// A graded submission as shown to the submitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionView {
    pub id: i64,
    pub user_id: i64,
    pub problem_id: String,
    pub language: Language,
    pub status: SubmissionStatus,
    pub score: f64,
    pub execution_time_ms: u64,
    pub memory_usage_bytes: u64,
    pub submitted_at: DateTime<Utc>,
    pub test_results: Vec<TestResultView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_failure: Option<ValidationFailureResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl SubmissionView {
    pub fn new(
        submission: &Submission,
        cases: &[TestCase],
        validation_failure: Option<ValidationFailureResponse>,
    ) -> Self {
        Self {
            id: submission.id,
            user_id: submission.user_id,
            problem_id: submission.problem_id.clone(),
            language: submission.language,
            status: submission.status,
            score: submission.score,
            execution_time_ms: submission.execution_time_ms,
            memory_usage_bytes: submission.memory_usage_bytes,
            submitted_at: submission.submitted_at,
            test_results: TestResultView::collect(cases, &submission.test_results),
            validation_failure,
            error_message: None,
        }
    }

    pub fn with_error_message(mut self, error_message: Option<String>) -> Self {
        self.error_message = error_message;
        self
    }
}

/// Mask a behavioral outcome produced for a hidden test case
pub fn mask_outcome(case: &TestCase, mut outcome: BehaviorOutcome) -> BehaviorOutcome {
    if case.hidden {
        outcome.input = HIDDEN_INPUT.to_string();
        outcome.expected = HIDDEN_EXPECTED.to_string();
        outcome.actual = HIDDEN_EXPECTED.to_string();
        // Feedback quotes input and expected values
        outcome.feedback = outcome.feedback.map(|_| "Hidden test case failed".to_string());
    }
    outcome
}
