//! Grading data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::languages::Language;
use super::verdict::SubmissionStatus;
use crate::error::{EngineError, EngineResult};
use crate::matching::MatchPolicy;

/// A single test case owned by a problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: i64,
    pub input: String,
    pub expected_output: String,
    /// Hidden test cases never expose input or expected output
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub order_index: i32,
    #[serde(default)]
    pub match_type: MatchPolicy,
}

impl TestCase {
    pub fn new(id: i64, input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            id,
            input: input.into(),
            expected_output: expected_output.into(),
            hidden: false,
            order_index: 0,
            match_type: MatchPolicy::default(),
        }
    }

    pub fn with_order(mut self, order_index: i32) -> Self {
        self.order_index = order_index;
        self
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_type = policy;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// Outcome of running one test case. Created once, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    pub test_case_id: i64,
    pub actual_output: Option<String>,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub execution_time_ms: u64,
    pub memory_usage_bytes: u64,
    /// Only recorded for `SIMILARITY` comparisons
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
}

impl TestResult {
    pub fn failed(test_case_id: i64, message: impl Into<String>, execution_time_ms: u64) -> Self {
        Self {
            test_case_id,
            actual_output: None,
            passed: false,
            error_message: Some(message.into()),
            execution_time_ms,
            memory_usage_bytes: 0,
            similarity_score: None,
        }
    }
}

/// A user's attempt at a problem
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: i64,
    pub user_id: i64,
    pub problem_id: String,
    pub code: String,
    pub language: Language,
    pub status: SubmissionStatus,
    /// 0..=100
    pub score: f64,
    /// Sum over executed test cases
    pub execution_time_ms: u64,
    /// Peak over executed test cases
    pub memory_usage_bytes: u64,
    pub test_results: Vec<TestResult>,
    pub submitted_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(
        id: i64,
        user_id: i64,
        problem_id: impl Into<String>,
        code: impl Into<String>,
        language: Language,
    ) -> Self {
        Self {
            id,
            user_id,
            problem_id: problem_id.into(),
            code: code.into(),
            language,
            status: SubmissionStatus::Pending,
            score: 0.0,
            execution_time_ms: 0,
            memory_usage_bytes: 0,
            test_results: Vec::new(),
            submitted_at: Utc::now(),
        }
    }

    /// Move to `next`, rejecting moves the lifecycle does not allow
    pub fn transition(&mut self, next: SubmissionStatus) -> EngineResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}
