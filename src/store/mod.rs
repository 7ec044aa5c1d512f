//! Collaborators the engine reads problems from and persists verdicts to

pub mod catalog;
pub mod redis_manager;

use anyhow::bail;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::core::{Submission, SubmissionStatus, TestCase, TestResult};

pub use self::catalog::CatalogProblemSource;
pub use self::redis_manager::RedisManager;

/// Where test cases come from
#[async_trait]
pub trait ProblemSource: Send + Sync {
    /// Test cases of a problem, `None` if the problem does not exist
    async fn get_test_cases(&self, problem_id: &str) -> anyhow::Result<Option<Vec<TestCase>>>;
}

/// Where submissions and their results are persisted
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    async fn save_submission(&self, submission: &Submission) -> anyhow::Result<()>;

    async fn save_test_results(
        &self,
        submission_id: i64,
        results: &[TestResult],
    ) -> anyhow::Result<()>;
}

/// Problem source backed by a map, for tests and embedding
#[derive(Debug, Default)]
pub struct InMemoryProblemSource {
    problems: HashMap<String, Vec<TestCase>>,
}

impl InMemoryProblemSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_problem(mut self, problem_id: impl Into<String>, cases: Vec<TestCase>) -> Self {
        self.problems.insert(problem_id.into(), cases);
        self
    }
}

#[async_trait]
impl ProblemSource for InMemoryProblemSource {
    async fn get_test_cases(&self, problem_id: &str) -> anyhow::Result<Option<Vec<TestCase>>> {
        Ok(self.problems.get(problem_id).cloned())
    }
}

/// Submission store that keeps everything in memory and remembers every
/// status it was asked to persist
#[derive(Debug, Default)]
pub struct InMemorySubmissionStore {
    submissions: Mutex<HashMap<i64, Submission>>,
    history: Mutex<HashMap<i64, Vec<SubmissionStatus>>>,
    results: Mutex<HashMap<i64, Vec<TestResult>>>,
    fail_result_saves: AtomicBool,
}

impl InMemorySubmissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `save_test_results` call fail
    pub fn fail_result_saves(&self, fail: bool) {
        self.fail_result_saves.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, submission_id: i64) -> Option<Submission> {
        lock(&self.submissions).get(&submission_id).cloned()
    }

    pub fn status_history(&self, submission_id: i64) -> Vec<SubmissionStatus> {
        lock(&self.history)
            .get(&submission_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn test_results(&self, submission_id: i64) -> Option<Vec<TestResult>> {
        lock(&self.results).get(&submission_id).cloned()
    }
}

#[async_trait]
impl SubmissionStore for InMemorySubmissionStore {
    async fn save_submission(&self, submission: &Submission) -> anyhow::Result<()> {
        lock(&self.history)
            .entry(submission.id)
            .or_default()
            .push(submission.status);
        lock(&self.submissions).insert(submission.id, submission.clone());
        Ok(())
    }

    async fn save_test_results(
        &self,
        submission_id: i64,
        results: &[TestResult],
    ) -> anyhow::Result<()> {
        if self.fail_result_saves.load(Ordering::SeqCst) {
            bail!("test result store unavailable");
        }
        lock(&self.results).insert(submission_id, results.to_vec());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Language;

    #[tokio::test]
    async fn test_in_memory_store_records_history() {
        let store = InMemorySubmissionStore::new();
        let mut submission = Submission::new(5, 1, "p", "code", Language::C);

        store.save_submission(&submission).await.unwrap();
        submission.transition(SubmissionStatus::Running).unwrap();
        store.save_submission(&submission).await.unwrap();

        assert_eq!(
            store.status_history(5),
            vec![SubmissionStatus::Pending, SubmissionStatus::Running]
        );
        assert_eq!(store.get(5).unwrap().status, SubmissionStatus::Running);
        assert!(store.test_results(5).is_none());
    }

    #[tokio::test]
    async fn test_failing_result_saves() {
        let store = InMemorySubmissionStore::new();
        store.fail_result_saves(true);
        assert!(store.save_test_results(1, &[]).await.is_err());
    }

    #[test]
    fn test_in_memory_problem_source() {
        let source = InMemoryProblemSource::new().with_problem("p", vec![TestCase::new(1, "a", "b")]);
        let cases = tokio_test::block_on(source.get_test_cases("p")).unwrap().unwrap();
        assert_eq!(cases.len(), 1);
        assert!(tokio_test::block_on(source.get_test_cases("q")).unwrap().is_none());
    }
}
