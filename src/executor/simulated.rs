//! Simulated executor
//!
//! Reference backend: no code is run. Output is derived from the input and a
//! few well-known source patterns per language; timing and memory figures
//! come from a seeded RNG so runs are reproducible.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use tracing::debug;

use super::{ExecutionFailure, ExecutionOutput, Executor, FailureKind};
use crate::core::Language;

/// Upper bound for simulated execution time (exclusive)
const MAX_SIMULATED_TIME_MS: u64 = 1_000;
/// Upper bound for simulated memory usage (exclusive), 10 MB
const MAX_SIMULATED_MEMORY_BYTES: u64 = 10 * 1024 * 1024;

pub struct SimulatedExecutor {
    rng: Mutex<StdRng>,
}

impl SimulatedExecutor {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Simulated stdout, or a runtime failure for code that "throws"
    pub fn simulate(code: &str, language: Language, input: &str) -> Result<String, ExecutionFailure> {
        let input = input.trim();

        // (output marker, error marker, display name)
        let patterns = match language {
            Language::Java => Some(("System.out.println", "Exception", "Java")),
            Language::Python => Some(("print", "raise", "Python")),
            Language::JavaScript => Some(("console.log", "throw", "JavaScript")),
            _ => None,
        };

        if let Some((output_marker, error_marker, name)) = patterns {
            if code.contains(output_marker) {
                return Ok(format!("{} processed by {}", input, name));
            }
            if code.contains(error_marker) {
                return Err(ExecutionFailure::test_case(
                    FailureKind::RuntimeError,
                    format!("{} runtime error", name),
                ));
            }
        }

        Ok(format!("{} processed", input))
    }

    fn sample_metrics(&self) -> (u64, u64) {
        // A poisoned lock only means another test panicked mid-sample
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        (
            rng.gen_range(0..MAX_SIMULATED_TIME_MS),
            rng.gen_range(0..MAX_SIMULATED_MEMORY_BYTES),
        )
    }
}

impl Default for SimulatedExecutor {
    fn default() -> Self {
        Self::new(42)
    }
}

#[async_trait]
impl Executor for SimulatedExecutor {
    async fn execute(
        &self,
        code: &str,
        language: Language,
        input: &str,
    ) -> Result<ExecutionOutput, ExecutionFailure> {
        let (execution_time_ms, memory_usage_bytes) = self.sample_metrics();
        let stdout = Self::simulate(code, language, input)
            .map_err(|failure| failure.with_metrics(execution_time_ms, memory_usage_bytes))?;

        debug!(
            "Simulated {} execution: {} ms, {} bytes",
            language, execution_time_ms, memory_usage_bytes
        );

        Ok(ExecutionOutput {
            stdout,
            execution_time_ms,
            memory_usage_bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::FailureScope;

    #[test]
    fn test_simulated_output_per_language() {
        assert_eq!(
            SimulatedExecutor::simulate("print(x)", Language::Python, " 5 \n").unwrap(),
            "5 processed by Python"
        );
        assert_eq!(
            SimulatedExecutor::simulate("System.out.println(x);", Language::Java, "a").unwrap(),
            "a processed by Java"
        );
        assert_eq!(
            SimulatedExecutor::simulate("console.log(x)", Language::JavaScript, "a").unwrap(),
            "a processed by JavaScript"
        );
        assert_eq!(
            SimulatedExecutor::simulate("int main() {}", Language::Cpp, "a").unwrap(),
            "a processed"
        );
        assert_eq!(
            SimulatedExecutor::simulate("x = 1", Language::Python, "a").unwrap(),
            "a processed"
        );
    }

    #[test]
    fn test_simulated_runtime_error_is_test_scoped() {
        let err = SimulatedExecutor::simulate("raise ValueError()", Language::Python, "1").unwrap_err();
        assert_eq!(err.kind, FailureKind::RuntimeError);
        assert_eq!(err.scope, FailureScope::TestCase);
        assert_eq!(err.message, "Python runtime error");

        // Output marker wins over error marker
        let out = SimulatedExecutor::simulate("print(1)\nraise X", Language::Python, "1").unwrap();
        assert_eq!(out, "1 processed by Python");
    }

    #[tokio::test]
    async fn test_metrics_are_seeded() {
        let a = SimulatedExecutor::new(7);
        let b = SimulatedExecutor::new(7);

        for _ in 0..5 {
            let out_a = a.execute("print(1)", Language::Python, "x").await.unwrap();
            let out_b = b.execute("print(1)", Language::Python, "x").await.unwrap();
            assert_eq!(out_a, out_b);
            assert!(out_a.execution_time_ms < MAX_SIMULATED_TIME_MS);
            assert!(out_a.memory_usage_bytes < MAX_SIMULATED_MEMORY_BYTES);
        }
    }

    #[tokio::test]
    async fn test_runtime_error_carries_metrics() {
        let executor = SimulatedExecutor::new(7);
        let (time_ms, memory) = SimulatedExecutor::new(7).sample_metrics();

        let err = executor
            .execute("raise ValueError()", Language::Python, "x")
            .await
            .unwrap_err();
        assert_eq!(err.execution_time_ms, time_ms);
        assert_eq!(err.memory_usage_bytes, memory);
    }
}
