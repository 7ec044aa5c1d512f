//! Verdict aggregation

use crate::core::{SubmissionStatus, TestResult};
use crate::executor::ExecutionFailure;

/// Submission-level figures derived from per-test results
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub status: SubmissionStatus,
    /// 0..=100
    pub score: f64,
    pub passed: usize,
    pub total: usize,
    /// Sum over results
    pub execution_time_ms: u64,
    /// Peak over results
    pub memory_usage_bytes: u64,
}

/// Aggregate `results` of a problem with `total` test cases.
///
/// `accepted` needs every one of at least one test case to pass. A whole-run
/// failure decides the status on its own and zeroes the score.
pub fn aggregate(
    results: &[TestResult],
    total: usize,
    run_failure: Option<&ExecutionFailure>,
) -> Aggregate {
    let passed = results.iter().filter(|r| r.passed).count();
    let execution_time_ms = results.iter().map(|r| r.execution_time_ms).sum();
    let memory_usage_bytes = results
        .iter()
        .map(|r| r.memory_usage_bytes)
        .max()
        .unwrap_or(0);

    let (status, score) = match run_failure {
        Some(failure) => (failure.kind.status(), 0.0),
        None if total == 0 => (SubmissionStatus::WrongAnswer, 0.0),
        None => {
            let score = 100.0 * passed as f64 / total as f64;
            if passed == total {
                (SubmissionStatus::Accepted, score)
            } else {
                (SubmissionStatus::WrongAnswer, score)
            }
        }
    };

    Aggregate {
        status,
        score,
        passed,
        total,
        execution_time_ms,
        memory_usage_bytes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::FailureKind;

    fn result(id: i64, passed: bool, time: u64, memory: u64) -> TestResult {
        TestResult {
            test_case_id: id,
            actual_output: Some("out".into()),
            passed,
            error_message: None,
            execution_time_ms: time,
            memory_usage_bytes: memory,
            similarity_score: None,
        }
    }

    #[test]
    fn test_partial_pass() {
        let results = vec![
            result(1, true, 10, 100),
            result(2, true, 20, 300),
            result(3, false, 30, 200),
        ];
        let agg = aggregate(&results, 3, None);

        assert_eq!(agg.status, SubmissionStatus::WrongAnswer);
        assert!((agg.score - 66.666_666).abs() < 1e-3);
        assert_eq!(agg.passed, 2);
        assert_eq!(agg.execution_time_ms, 60);
        assert_eq!(agg.memory_usage_bytes, 300);
    }

    #[test]
    fn test_all_pass() {
        let results = vec![result(1, true, 1, 1), result(2, true, 1, 1)];
        let agg = aggregate(&results, 2, None);
        assert_eq!(agg.status, SubmissionStatus::Accepted);
        assert_eq!(agg.score, 100.0);
    }

    #[test]
    fn test_no_test_cases() {
        let agg = aggregate(&[], 0, None);
        assert_eq!(agg.status, SubmissionStatus::WrongAnswer);
        assert_eq!(agg.score, 0.0);
        assert_eq!(agg.execution_time_ms, 0);
        assert_eq!(agg.memory_usage_bytes, 0);
    }

    #[test]
    fn test_whole_run_failure_overrides() {
        let failure = ExecutionFailure::whole_run(FailureKind::MemoryLimitExceeded, "oom");
        let results = vec![result(1, true, 5, 5)];
        let agg = aggregate(&results, 2, Some(&failure));
        assert_eq!(agg.status, SubmissionStatus::MemoryLimitExceeded);
        assert_eq!(agg.score, 0.0);
        assert_eq!(agg.passed, 1);
    }
}
