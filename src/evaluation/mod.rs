//! Evaluation module - submission grading
//!
//! The orchestrator drives a submission through
//! `pending -> running -> <terminal>`: structural validation, then every test
//! case through the runner, then aggregation and persistence.

pub mod orchestrator;
pub mod response;
pub mod scoring;

pub use orchestrator::{Evaluation, EvaluationOrchestrator, SubmissionRequest};
pub use response::{
    RunResponse, SolutionReport, SubmissionView, TestResultView, ValidationFailureResponse,
    ValidationReport,
};
pub use scoring::{aggregate, Aggregate};
