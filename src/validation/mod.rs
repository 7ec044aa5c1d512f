//! Validation module - pluggable solution validators
//!
//! Two kinds of plugins:
//! - `StructureValidator`: static checks on the source before anything runs
//! - `BehaviorValidator`: judges one test case for a problem family
//!
//! `ValidatorChain` decides which plugin applies to a problem.

pub mod chain;
pub mod generic;
pub mod python_structure;
pub mod sentiment;

use serde::{Deserialize, Serialize};

use crate::core::TestCase;

pub use chain::ValidatorChain;
pub use generic::GenericBehaviorValidator;
pub use python_structure::PythonStructureValidator;
pub use sentiment::SentimentAnalysisValidator;

/// Shortest accepted source, in characters after trimming
pub const MIN_CODE_LENGTH: usize = 10;

pub const CODE_TOO_SHORT: &str = "Code is too short or empty";

/// Outcome of a structural check. Any error makes it a failure; warnings
/// never do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub success: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            message: None,
        }
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.success = false;
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Result of judging one test case with a behavioral validator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BehaviorOutcome {
    pub input: String,
    pub expected: String,
    pub actual: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// Static source check for a family of problems
pub trait StructureValidator: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, problem_id: &str) -> bool;

    fn validate(&self, code: Option<&str>, problem_id: &str) -> ValidationResult;
}

/// Per-test-case judge for a family of problems
pub trait BehaviorValidator: Send + Sync {
    fn name(&self) -> &'static str;

    fn supports(&self, problem_id: &str) -> bool;

    /// Generic validators are only consulted once no specific one applies
    fn is_generic(&self) -> bool {
        false
    }

    fn validate(&self, problem_id: &str, case: &TestCase, code: &str) -> BehaviorOutcome;
}

/// Reject missing, blank or too-short code. Nothing else fails.
pub fn basic_structure_check(code: Option<&str>) -> ValidationResult {
    let mut result = ValidationResult::new();
    let long_enough = code
        .map(|c| c.trim().chars().count() >= MIN_CODE_LENGTH)
        .unwrap_or(false);
    if !long_enough {
        result.add_error(CODE_TOO_SHORT);
    }
    result
}
