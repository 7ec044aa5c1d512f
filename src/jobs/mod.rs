//! Jobs the grading worker consumes from the queue

use serde::{Deserialize, Serialize};

use crate::core::TestCase;
use crate::evaluation::SubmissionRequest;

/// Worker job enum - represents different types of jobs the worker can process
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "job_type")]
pub enum WorkerJob {
    /// Grade a user submission
    #[serde(rename = "submit")]
    Submit(SubmissionRequest),
    /// Run code against a problem without recording a submission
    #[serde(rename = "run")]
    Run(RunJob),
    /// Judge a solution through the validator chain
    #[serde(rename = "validate")]
    Validate(ValidateJob),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunJob {
    pub request_id: String,
    pub problem_id: String,
    pub code: String,
    pub language: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateJob {
    pub request_id: String,
    pub problem_id: String,
    pub code: Option<String>,
    /// Test cases to judge against; the problem's own when absent
    #[serde(default)]
    pub test_cases: Option<Vec<TestCase>>,
}

/// Stored in place of a result when a job could not be processed
#[derive(Debug, Serialize, Deserialize)]
pub struct JobError {
    pub success: bool,
    pub error: String,
}

impl JobError {
    pub fn new(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            error: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_submit_job() {
        let json = r#"{
            "job_type": "submit",
            "submission_id": 12,
            "user_id": 3,
            "problem_id": "echo-processing",
            "code": "print(input())",
            "language": "python"
        }"#;
        match serde_json::from_str::<WorkerJob>(json).unwrap() {
            WorkerJob::Submit(request) => {
                assert_eq!(request.submission_id, 12);
                assert_eq!(request.language, "python");
            }
            other => panic!("unexpected job: {:?}", other),
        }
    }

    #[test]
    fn test_parse_validate_job_without_cases() {
        let json = r#"{
            "job_type": "validate",
            "request_id": "r-1",
            "problem_id": "sentiment-analysis",
            "code": null
        }"#;
        match serde_json::from_str::<WorkerJob>(json).unwrap() {
            WorkerJob::Validate(job) => {
                assert!(job.code.is_none());
                assert!(job.test_cases.is_none());
            }
            other => panic!("unexpected job: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_job_type_rejected() {
        let json = r#"{"job_type": "compile", "request_id": "x"}"#;
        assert!(serde_json::from_str::<WorkerJob>(json).is_err());
    }
}
