//! Executor module - Execution abstraction layer
//!
//! This module provides a unified interface for running submitted code:
//! - `SimulatedExecutor`: Deterministic, source-pattern keyed simulation
//! - `ProcessExecutor`: Local processes driven by the language registry
//!
//! The executor module does NOT:
//! - Compare outputs or decide pass/fail
//! - Enforce the per-test harness timeout (the runner does)
//! - Know about submissions or scoring

pub mod process;
pub mod simulated;

use async_trait::async_trait;
use std::fmt;

use crate::core::{Language, SubmissionStatus};
use crate::error::EngineError;

/// Output of a successful execution
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub execution_time_ms: u64,
    pub memory_usage_bytes: u64,
}

/// Why an execution failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    CompileError,
    RuntimeError,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    /// The backend itself broke, not the submitted program
    Internal,
}

impl FailureKind {
    /// Terminal submission status for a whole-run failure of this kind
    pub fn status(&self) -> SubmissionStatus {
        match self {
            FailureKind::CompileError => SubmissionStatus::CompileError,
            FailureKind::RuntimeError => SubmissionStatus::RuntimeError,
            FailureKind::TimeLimitExceeded => SubmissionStatus::TimeLimitExceeded,
            FailureKind::MemoryLimitExceeded => SubmissionStatus::MemoryLimitExceeded,
            FailureKind::Internal => SubmissionStatus::SystemError,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::CompileError => "compile_error",
            FailureKind::RuntimeError => "runtime_error",
            FailureKind::TimeLimitExceeded => "time_limit_exceeded",
            FailureKind::MemoryLimitExceeded => "memory_limit_exceeded",
            FailureKind::Internal => "internal_error",
        };
        write!(f, "{}", s)
    }
}

/// How far a failure reaches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    /// Only this test case failed; the rest still run
    TestCase,
    /// The submission as a whole cannot run (e.g. it does not compile)
    WholeRun,
}

/// A failed execution, reported as data
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct ExecutionFailure {
    pub kind: FailureKind,
    pub scope: FailureScope,
    pub message: String,
    /// Time the failed run took, when the backend measured it
    pub execution_time_ms: u64,
    pub memory_usage_bytes: u64,
}

impl ExecutionFailure {
    pub fn test_case(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::new(kind, FailureScope::TestCase, message)
    }

    pub fn whole_run(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::new(kind, FailureScope::WholeRun, message)
    }

    fn new(kind: FailureKind, scope: FailureScope, message: impl Into<String>) -> Self {
        Self {
            kind,
            scope,
            message: message.into(),
            execution_time_ms: 0,
            memory_usage_bytes: 0,
        }
    }

    pub fn with_metrics(mut self, execution_time_ms: u64, memory_usage_bytes: u64) -> Self {
        self.execution_time_ms = execution_time_ms;
        self.memory_usage_bytes = memory_usage_bytes;
        self
    }

    pub fn is_whole_run(&self) -> bool {
        self.scope == FailureScope::WholeRun
    }
}

/// Executor trait for running submitted code against one input
#[async_trait]
pub trait Executor: Send + Sync {
    /// Resolve a language name or alias this backend can run
    fn resolve_language(&self, name: &str) -> Result<Language, EngineError> {
        name.parse()
    }

    /// Build `code` once before any test case runs.
    ///
    /// Called outside the per-test timeout; a failure here is whole-run.
    async fn prepare(&self, _code: &str, _language: Language) -> Result<(), ExecutionFailure> {
        Ok(())
    }

    /// Run `code` written in `language`, feeding `input` on stdin
    async fn execute(
        &self,
        code: &str,
        language: Language,
        input: &str,
    ) -> Result<ExecutionOutput, ExecutionFailure>;
}

// Re-exports
pub use process::ProcessExecutor;
pub use simulated::SimulatedExecutor;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_kind_maps_to_status() {
        assert_eq!(FailureKind::CompileError.status(), SubmissionStatus::CompileError);
        assert_eq!(
            FailureKind::TimeLimitExceeded.status(),
            SubmissionStatus::TimeLimitExceeded
        );
        assert_eq!(FailureKind::Internal.status(), SubmissionStatus::SystemError);
    }

    #[test]
    fn test_failure_display_is_message() {
        let failure = ExecutionFailure::whole_run(FailureKind::CompileError, "main.c:1: error");
        assert!(failure.is_whole_run());
        assert_eq!(failure.to_string(), "main.c:1: error");
        assert_eq!(failure.execution_time_ms, 0);
    }

    #[test]
    fn test_failure_keeps_metrics() {
        let failure = ExecutionFailure::test_case(FailureKind::RuntimeError, "boom")
            .with_metrics(900, 4096);
        assert_eq!(failure.execution_time_ms, 900);
        assert_eq!(failure.memory_usage_bytes, 4096);
        assert!(!failure.is_whole_run());
    }
}
