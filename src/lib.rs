//! Submission evaluation engine
//!
//! Grades submitted code against a problem's test cases:
//! - `matching`: output comparison policies and edit-distance similarity
//! - `executor`: execution backends (simulated and local process)
//! - `runner`: one test case through an executor
//! - `validation`: structural and behavioral validator plugins
//! - `evaluation`: the submission state machine and scoring
//! - `store`: problem and submission collaborators
//! - `jobs`: queue job formats for the worker binary

pub mod config;
pub mod core;
pub mod error;
pub mod evaluation;
pub mod executor;
pub mod jobs;
pub mod matching;
pub mod runner;
pub mod store;
pub mod validation;

pub use crate::config::EngineConfig;
pub use crate::core::{Language, LanguageRegistry, Submission, SubmissionStatus, TestCase, TestResult};
pub use crate::error::EngineError;
pub use crate::evaluation::EvaluationOrchestrator;
pub use crate::matching::MatchPolicy;
