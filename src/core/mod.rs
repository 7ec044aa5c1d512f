pub mod languages;
pub mod model;
pub mod verdict;

pub use languages::{Language, LanguageConfig, LanguageRegistry};
pub use model::{Submission, TestCase, TestResult};
pub use verdict::SubmissionStatus;
