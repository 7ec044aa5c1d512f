use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::response::{
    mask_outcome, RunResponse, SolutionReport, SubmissionView, TestResultView,
    ValidationFailureResponse, ValidationReport,
};
use super::scoring::{aggregate, Aggregate};
use crate::config::EngineConfig;
use crate::core::{Language, Submission, SubmissionStatus, TestCase, TestResult};
use crate::error::{EngineError, EngineResult};
use crate::executor::{ExecutionFailure, Executor};
use crate::runner::{CaseOutcome, TestCaseRunner};
use crate::store::{ProblemSource, SubmissionStore};
use crate::validation::ValidatorChain;

/// A new submission as received from a client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub submission_id: i64,
    pub user_id: i64,
    pub problem_id: String,
    pub code: String,
    pub language: String,
}

/// Result of evaluating a submission. The submission is always terminal.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub submission: Submission,
    pub test_cases: Vec<TestCase>,
    /// Set when structural validation rejected the code
    pub validation_failure: Option<ValidationFailureResponse>,
    /// Message of the whole-run failure that decided the verdict
    pub error_message: Option<String>,
}

impl Evaluation {
    pub fn view(&self) -> SubmissionView {
        SubmissionView::new(
            &self.submission,
            &self.test_cases,
            self.validation_failure.clone(),
        )
        .with_error_message(self.error_message.clone())
    }
}

/// Everything the test case phase produced
#[derive(Debug, Default)]
struct CaseRun {
    /// Executed results, in test case order
    results: Vec<TestResult>,
    /// First whole-run failure, by test case order
    run_failure: Option<ExecutionFailure>,
    cancelled: bool,
    fault: Option<String>,
}

pub struct EvaluationOrchestrator {
    problems: Arc<dyn ProblemSource>,
    store: Arc<dyn SubmissionStore>,
    validators: Arc<ValidatorChain>,
    runner: TestCaseRunner,
    max_concurrency: usize,
}

impl EvaluationOrchestrator {
    pub fn new(
        config: &EngineConfig,
        executor: Arc<dyn Executor>,
        problems: Arc<dyn ProblemSource>,
        store: Arc<dyn SubmissionStore>,
        validators: ValidatorChain,
    ) -> Self {
        Self {
            problems,
            store,
            validators: Arc::new(validators),
            runner: TestCaseRunner::new(executor, config.test_timeout()),
            max_concurrency: config.max_concurrent_executions.max(1),
        }
    }

    /// Accept a new submission and evaluate it.
    ///
    /// Unknown languages and problems are rejected before anything is
    /// created or persisted.
    pub async fn submit(
        &self,
        request: SubmissionRequest,
        cancel: watch::Receiver<bool>,
    ) -> EngineResult<Evaluation> {
        let language = self.runner.resolve_language(&request.language)?;
        let cases = self.fetch_cases(&request.problem_id).await?;

        let submission = Submission::new(
            request.submission_id,
            request.user_id,
            request.problem_id,
            request.code,
            language,
        );

        self.evaluate_with(submission, Some(cases), cancel).await
    }

    /// Evaluate a pending submission to a terminal state.
    ///
    /// A submission that already left `pending` is a conflict: verdicts are
    /// never recomputed in place.
    pub async fn evaluate_submission(
        &self,
        submission: Submission,
        cancel: watch::Receiver<bool>,
    ) -> EngineResult<Evaluation> {
        if submission.status != SubmissionStatus::Pending {
            return Err(EngineError::AlreadyEvaluated {
                id: submission.id,
                status: submission.status,
            });
        }

        self.evaluate_with(submission, None, cancel).await
    }

    async fn evaluate_with(
        &self,
        mut submission: Submission,
        prefetched: Option<Vec<TestCase>>,
        mut cancel: watch::Receiver<bool>,
    ) -> EngineResult<Evaluation> {
        submission.transition(SubmissionStatus::Running)?;

        if let Err(e) = self.persist_submission(&submission).await {
            error!(
                "Failed to persist running state of submission {}: {:#}",
                submission.id, e
            );
            let cases = prefetched.unwrap_or_default();
            let agg = system_error(&[], cases.len());
            return self.conclude(submission, cases, Vec::new(), agg, None).await;
        }

        let mut cases = match prefetched {
            Some(cases) => cases,
            None => match self.problems.get_test_cases(&submission.problem_id).await {
                Ok(Some(cases)) => cases,
                Ok(None) => {
                    error!(
                        "Problem {} of submission {} not found",
                        submission.problem_id, submission.id
                    );
                    let agg = system_error(&[], 0);
                    return self.conclude(submission, Vec::new(), Vec::new(), agg, None).await;
                }
                Err(e) => {
                    error!(
                        "Failed to load test cases for submission {}: {:#}",
                        submission.id, e
                    );
                    let agg = system_error(&[], 0);
                    return self.conclude(submission, Vec::new(), Vec::new(), agg, None).await;
                }
            },
        };
        cases.sort_by_key(|case| case.order_index);

        info!(
            "Evaluating submission {}: problem={}, language={}, test_cases={}",
            submission.id,
            submission.problem_id,
            submission.language,
            cases.len()
        );

        let structure = self
            .validators
            .validate_structure(Some(&submission.code), &submission.problem_id);
        if !structure.success {
            info!(
                "Submission {} rejected by structural validation: {:?}",
                submission.id, structure.errors
            );
            let response = ValidationFailureResponse::new(&structure, cases.len());
            let agg = Aggregate {
                status: SubmissionStatus::CompileError,
                score: 0.0,
                passed: 0,
                total: cases.len(),
                execution_time_ms: 0,
                memory_usage_bytes: 0,
            };
            return self
                .conclude(submission, cases, Vec::new(), agg, Some(response))
                .await;
        }
        for warning in &structure.warnings {
            debug!("Submission {} structure warning: {}", submission.id, warning);
        }

        let run = self
            .run_cases(&submission.code, submission.language, &cases, &mut cancel)
            .await;

        let error_message = run.run_failure.as_ref().map(|f| f.message.clone());
        let agg = if run.cancelled {
            warn!(
                "Evaluation of submission {} cancelled after {} of {} test cases",
                submission.id,
                run.results.len(),
                cases.len()
            );
            system_error(&run.results, cases.len())
        } else if let Some(fault) = &run.fault {
            error!("Evaluation of submission {} failed: {}", submission.id, fault);
            system_error(&run.results, cases.len())
        } else {
            if let Some(failure) = &run.run_failure {
                info!(
                    "Submission {} stopped by {}: {}",
                    submission.id, failure.kind, failure.message
                );
            }
            aggregate(&run.results, cases.len(), run.run_failure.as_ref())
        };

        let mut evaluation = self.conclude(submission, cases, run.results, agg, None).await?;
        if evaluation.submission.status != SubmissionStatus::SystemError {
            evaluation.error_message = error_message;
        }
        Ok(evaluation)
    }

    /// Persist results and the terminal state
    async fn conclude(
        &self,
        mut submission: Submission,
        cases: Vec<TestCase>,
        results: Vec<TestResult>,
        mut agg: Aggregate,
        validation_failure: Option<ValidationFailureResponse>,
    ) -> EngineResult<Evaluation> {
        if let Err(e) = self.store.save_test_results(submission.id, &results).await {
            error!(
                "Failed to persist test results of submission {}: {:#}",
                submission.id, e
            );
            agg.status = SubmissionStatus::SystemError;
            agg.score = 0.0;
        }

        submission.score = agg.score;
        submission.execution_time_ms = agg.execution_time_ms;
        submission.memory_usage_bytes = agg.memory_usage_bytes;
        submission.test_results = results;
        submission.transition(agg.status)?;

        if let Err(e) = self.persist_submission(&submission).await {
            error!(
                "Failed to persist final state of submission {}: {:#}",
                submission.id, e
            );
        }

        info!(
            "Submission {} finished: status={}, score={:.2}, passed={}/{}, time={}ms, memory={}B",
            submission.id,
            submission.status,
            submission.score,
            agg.passed,
            agg.total,
            submission.execution_time_ms,
            submission.memory_usage_bytes
        );

        Ok(Evaluation {
            submission,
            test_cases: cases,
            validation_failure,
            error_message: None,
        })
    }

    /// Save with a single retry
    async fn persist_submission(&self, submission: &Submission) -> anyhow::Result<()> {
        if let Err(e) = self.store.save_submission(submission).await {
            warn!(
                "Failed to save submission {}: {:#}. Retrying...",
                submission.id, e
            );
            self.store.save_submission(submission).await?;
        }
        Ok(())
    }

    /// Build the code once, then run test cases concurrently, at most
    /// `max_concurrency` at a time.
    ///
    /// A build failure runs nothing. A whole-run failure or cancellation stops
    /// issuing new test cases; cancellation also aborts the ones in flight.
    async fn run_cases(
        &self,
        code: &str,
        language: Language,
        cases: &[TestCase],
        cancel: &mut watch::Receiver<bool>,
    ) -> CaseRun {
        let mut run = CaseRun::default();
        if cases.is_empty() {
            return run;
        }

        tokio::select! {
            biased;
            _ = cancelled(cancel) => {
                run.cancelled = true;
                return run;
            }
            prepared = self.runner.prepare(code, language) => {
                if let Err(failure) = prepared {
                    debug!("Build failed before any test case ran: {}", failure.kind);
                    run.run_failure = Some(failure);
                    return run;
                }
            }
        }

        let code: Arc<str> = Arc::from(code);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let halt = Arc::new(AtomicBool::new(false));
        let mut tasks: JoinSet<(usize, CaseOutcome)> = JoinSet::new();

        for (index, case) in cases.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                _ = cancelled(cancel) => {
                    run.cancelled = true;
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        run.fault = Some(format!("Execution slots unavailable: {}", e));
                        break;
                    }
                },
            };

            if halt.load(Ordering::SeqCst) {
                debug!(
                    "Not issuing remaining {} test cases after whole-run failure",
                    cases.len() - index
                );
                break;
            }

            let runner = self.runner.clone();
            let code = code.clone();
            let case = case.clone();
            let halt = halt.clone();
            tasks.spawn(async move {
                let outcome = runner.run_case(&code, language, &case).await;
                if outcome.run_failure.is_some() {
                    halt.store(true, Ordering::SeqCst);
                }
                drop(permit);
                (index, outcome)
            });
        }

        if run.cancelled {
            tasks.abort_all();
        }

        let mut outcomes = Vec::with_capacity(cases.len());
        loop {
            tokio::select! {
                biased;
                _ = cancelled(cancel), if !run.cancelled => {
                    run.cancelled = true;
                    tasks.abort_all();
                }
                joined = tasks.join_next() => match joined {
                    None => break,
                    Some(Ok(entry)) => outcomes.push(entry),
                    Some(Err(e)) if e.is_cancelled() => {}
                    Some(Err(e)) => {
                        error!("Test case task failed: {}", e);
                        if run.fault.is_none() {
                            run.fault = Some(format!("Test case task failed: {}", e));
                        }
                    }
                },
            }
        }

        outcomes.sort_by_key(|(index, _)| *index);
        for (_, outcome) in outcomes {
            if run.run_failure.is_none() {
                run.run_failure = outcome.run_failure;
            }
            run.results.push(outcome.result);
        }

        run
    }

    /// Run code against a problem's test cases without creating a submission
    pub async fn run_code(
        &self,
        problem_id: &str,
        code: &str,
        language: &str,
    ) -> EngineResult<RunResponse> {
        let language = self.runner.resolve_language(language)?;
        let mut cases = self.fetch_cases(problem_id).await?;
        cases.sort_by_key(|case| case.order_index);

        // Ad-hoc runs are never cancelled
        let (_cancel_tx, mut cancel) = watch::channel(false);
        let run = self.run_cases(code, language, &cases, &mut cancel).await;

        if let Some(fault) = run.fault {
            return Err(EngineError::Collaborator(anyhow::anyhow!(fault)));
        }

        // A whole-run failure leaves test cases unreported
        let success = run.results.len() == cases.len() && run.results.iter().all(|r| r.passed);

        Ok(RunResponse {
            test_results: TestResultView::collect(&cases, &run.results),
            success,
            error_message: run.run_failure.map(|failure| failure.message),
        })
    }

    /// Judge a solution through the validator chain: structure first, then
    /// every test case with the most specific behavioral validator.
    pub fn validate_solution(
        &self,
        problem_id: &str,
        code: Option<&str>,
        cases: &[TestCase],
    ) -> ValidationReport {
        let structure = self.validators.validate_structure(code, problem_id);
        if !structure.success {
            return ValidationReport::Rejected(ValidationFailureResponse::new(
                &structure,
                cases.len(),
            ));
        }

        let code = code.unwrap_or_default();
        let test_results: Vec<_> = cases
            .iter()
            .map(|case| mask_outcome(case, self.validators.validate_case(problem_id, case, code)))
            .collect();

        let passed_tests = test_results.iter().filter(|o| o.passed).count();
        let total_tests = cases.len();

        ValidationReport::Solution(SolutionReport {
            success: passed_tests == total_tests,
            passed_tests,
            total_tests,
            test_results,
            message: SolutionReport::result_message(passed_tests, total_tests),
            structure_warnings: structure.warnings,
        })
    }

    /// `validate_solution` against the problem's own test cases
    pub async fn validate_problem(
        &self,
        problem_id: &str,
        code: Option<&str>,
    ) -> EngineResult<ValidationReport> {
        let mut cases = self.fetch_cases(problem_id).await?;
        cases.sort_by_key(|case| case.order_index);
        Ok(self.validate_solution(problem_id, code, &cases))
    }

    async fn fetch_cases(&self, problem_id: &str) -> EngineResult<Vec<TestCase>> {
        match self.problems.get_test_cases(problem_id).await? {
            Some(cases) => Ok(cases),
            None => Err(EngineError::ProblemNotFound(problem_id.to_string())),
        }
    }
}

fn system_error(results: &[TestResult], total: usize) -> Aggregate {
    let mut agg = aggregate(results, total, None);
    agg.status = SubmissionStatus::SystemError;
    agg.score = 0.0;
    agg
}

/// Resolves once cancellation is requested. Never resolves if the sender is
/// gone without having cancelled.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|c| *c).await.is_err() {
        std::future::pending::<()>().await;
    }
}
