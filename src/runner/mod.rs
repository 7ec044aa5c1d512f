//! Test case runner
//!
//! Runs one (code, language, test case) triple through an executor under a
//! hard wall-clock timeout and turns the outcome into a `TestResult`.
//! Execution failures become data on the result; they never propagate.

use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::core::{Language, TestCase, TestResult};
use crate::error::EngineError;
use crate::executor::{ExecutionFailure, Executor};
use crate::matching::{self, similarity, MatchPolicy};

/// Result of one test case plus anything the orchestrator must react to
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    pub result: TestResult,
    /// Set when the failure reaches beyond this test case
    pub run_failure: Option<ExecutionFailure>,
}

#[derive(Clone)]
pub struct TestCaseRunner {
    executor: Arc<dyn Executor>,
    timeout: Duration,
}

impl TestCaseRunner {
    pub fn new(executor: Arc<dyn Executor>, timeout: Duration) -> Self {
        Self { executor, timeout }
    }

    pub fn resolve_language(&self, name: &str) -> Result<Language, EngineError> {
        self.executor.resolve_language(name)
    }

    /// Build the code once, outside the per-test timeout
    pub async fn prepare(&self, code: &str, language: Language) -> Result<(), ExecutionFailure> {
        self.executor.prepare(code, language).await
    }

    pub async fn run(&self, code: &str, language: Language, case: &TestCase) -> TestResult {
        self.run_case(code, language, case).await.result
    }

    pub async fn run_case(&self, code: &str, language: Language, case: &TestCase) -> CaseOutcome {
        let execution =
            tokio::time::timeout(self.timeout, self.executor.execute(code, language, &case.input))
                .await;

        match execution {
            Ok(Ok(output)) => {
                let passed = matching::matches(
                    Some(output.stdout.as_str()),
                    Some(case.expected_output.as_str()),
                    case.match_type,
                );
                let similarity_score = (case.match_type == MatchPolicy::Similarity)
                    .then(|| similarity::score(&output.stdout, &case.expected_output));

                debug!(
                    "Test case {}: passed={} ({}, {} ms)",
                    case.id, passed, case.match_type, output.execution_time_ms
                );

                CaseOutcome {
                    result: TestResult {
                        test_case_id: case.id,
                        actual_output: Some(output.stdout),
                        passed,
                        error_message: None,
                        execution_time_ms: output.execution_time_ms,
                        memory_usage_bytes: output.memory_usage_bytes,
                        similarity_score,
                    },
                    run_failure: None,
                }
            }
            Ok(Err(failure)) => {
                debug!(
                    "Test case {} failed: {} ({})",
                    case.id, failure.message, failure.kind
                );
                let mut result =
                    TestResult::failed(case.id, failure.message.clone(), failure.execution_time_ms);
                result.memory_usage_bytes = failure.memory_usage_bytes;
                CaseOutcome {
                    result,
                    run_failure: failure.is_whole_run().then_some(failure),
                }
            }
            Err(_) => {
                let budget_ms = self.timeout.as_millis() as u64;
                debug!("Test case {} timed out after {} ms", case.id, budget_ms);
                CaseOutcome {
                    result: TestResult::failed(
                        case.id,
                        format!("Execution timed out after {} ms", budget_ms),
                        budget_ms,
                    ),
                    run_failure: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::{ExecutionOutput, FailureKind, SimulatedExecutor};
    use async_trait::async_trait;

    /// Executor that never finishes
    struct StalledExecutor;

    #[async_trait]
    impl Executor for StalledExecutor {
        async fn execute(
            &self,
            _code: &str,
            _language: Language,
            _input: &str,
        ) -> Result<ExecutionOutput, ExecutionFailure> {
            std::future::pending().await
        }
    }

    /// Executor that fails every call the same way
    struct FailingExecutor(ExecutionFailure);

    #[async_trait]
    impl Executor for FailingExecutor {
        async fn execute(
            &self,
            _code: &str,
            _language: Language,
            _input: &str,
        ) -> Result<ExecutionOutput, ExecutionFailure> {
            Err(self.0.clone())
        }
    }

    fn simulated_runner() -> TestCaseRunner {
        TestCaseRunner::new(Arc::new(SimulatedExecutor::new(1)), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_passing_case() {
        let case = TestCase::new(1, "7", "7 processed by Python");
        let result = simulated_runner().run("print(x)", Language::Python, &case).await;

        assert!(result.passed);
        assert_eq!(result.actual_output.as_deref(), Some("7 processed by Python"));
        assert!(result.error_message.is_none());
        assert!(result.similarity_score.is_none());
    }

    #[tokio::test]
    async fn test_similarity_score_recorded() {
        let case = TestCase::new(1, "7", "7 processed by Pythons").with_policy(MatchPolicy::Similarity);
        let result = simulated_runner().run("print(x)", Language::Python, &case).await;

        assert!(result.passed);
        let score = result.similarity_score.unwrap();
        assert!(score > 0.9 && score < 1.0);
    }

    #[tokio::test]
    async fn test_runtime_error_is_data() {
        let case = TestCase::new(4, "7", "anything");
        let outcome = simulated_runner()
            .run_case("raise Exception()", Language::Python, &case)
            .await;

        assert!(!outcome.result.passed);
        assert!(outcome.result.actual_output.is_none());
        assert_eq!(outcome.result.error_message.as_deref(), Some("Python runtime error"));
        assert!(outcome.run_failure.is_none());
    }

    #[tokio::test]
    async fn test_failed_run_keeps_measured_time() {
        let failure = ExecutionFailure::test_case(FailureKind::RuntimeError, "segfault")
            .with_metrics(900, 2048);
        let runner = TestCaseRunner::new(Arc::new(FailingExecutor(failure)), Duration::from_secs(1));
        let result = runner.run("int main(", Language::C, &TestCase::new(2, "", "")).await;

        assert!(!result.passed);
        assert_eq!(result.execution_time_ms, 900);
        assert_eq!(result.memory_usage_bytes, 2048);
    }

    #[tokio::test]
    async fn test_whole_run_failure_is_reported() {
        let failure = ExecutionFailure::whole_run(FailureKind::CompileError, "syntax error");
        let runner = TestCaseRunner::new(Arc::new(FailingExecutor(failure)), Duration::from_secs(1));
        let outcome = runner
            .run_case("int main(", Language::C, &TestCase::new(1, "", ""))
            .await;

        assert!(!outcome.result.passed);
        assert_eq!(outcome.run_failure.unwrap().kind, FailureKind::CompileError);
    }

    #[tokio::test]
    async fn test_timeout() {
        let runner = TestCaseRunner::new(Arc::new(StalledExecutor), Duration::from_millis(250));
        let outcome = runner
            .run_case("loop {}", Language::Rust, &TestCase::new(9, "", ""))
            .await;

        assert!(!outcome.result.passed);
        assert!(outcome.result.actual_output.is_none());
        assert_eq!(outcome.result.execution_time_ms, 250);
        assert!(outcome
            .result
            .error_message
            .unwrap()
            .contains("timed out after 250 ms"));
        assert!(outcome.run_failure.is_none());
    }
}
