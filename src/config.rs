//! Engine configuration
//!
//! Configuration for the grading engine, loaded from environment variables
//! (optionally through a `.env` file) with defaults for everything.

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use tracing::warn;

/// Which execution backend the worker grades with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorKind {
    /// Deterministic, pattern-keyed simulation
    Simulated,
    /// Local unsandboxed processes (trusted environments only)
    Process,
}

impl FromStr for ExecutorKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simulated" | "simulation" => Ok(ExecutorKind::Simulated),
            "process" | "local" => Ok(ExecutorKind::Process),
            other => anyhow::bail!("Unknown executor kind: {}", other),
        }
    }
}

/// Grading engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of test cases executing at once per evaluation (default: 4)
    pub max_concurrent_executions: usize,
    /// Hard wall-clock limit for a single executor call (default: 5000ms)
    pub test_timeout_ms: u64,
    /// Seed for the simulated executor's timing/memory figures
    pub simulation_seed: u64,
    pub executor: ExecutorKind,
    pub redis_url: String,
    pub languages_path: String,
    pub problems_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: 4,
            test_timeout_ms: 5_000,
            simulation_seed: 42,
            executor: ExecutorKind::Simulated,
            redis_url: "redis://localhost:6379".into(),
            languages_path: "./files/languages.toml".into(),
            problems_path: "./files/problems.toml".into(),
        }
    }
}

impl EngineConfig {
    /// Build configuration from `GRADER_*`, `REDIS_URL`, `LANGUAGES_CONFIG`
    /// and `PROBLEMS_CONFIG`, falling back to defaults for unset variables.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let max_concurrent_executions = parse_env("GRADER_MAX_CONCURRENCY")?
            .unwrap_or(defaults.max_concurrent_executions);
        let test_timeout_ms =
            parse_env("GRADER_TEST_TIMEOUT_MS")?.unwrap_or(defaults.test_timeout_ms);
        let simulation_seed =
            parse_env("GRADER_SIMULATION_SEED")?.unwrap_or(defaults.simulation_seed);
        let executor = parse_env("GRADER_EXECUTOR")?.unwrap_or(defaults.executor);

        let config = Self {
            max_concurrent_executions,
            test_timeout_ms,
            simulation_seed,
            executor,
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            languages_path: std::env::var("LANGUAGES_CONFIG").unwrap_or(defaults.languages_path),
            problems_path: std::env::var("PROBLEMS_CONFIG").unwrap_or(defaults.problems_path),
        };

        Ok(config.sanitized())
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrent_executions = max;
        self.sanitized()
    }

    pub fn with_test_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.test_timeout_ms = timeout_ms;
        self
    }

    pub fn with_simulation_seed(mut self, seed: u64) -> Self {
        self.simulation_seed = seed;
        self
    }

    pub fn test_timeout(&self) -> Duration {
        Duration::from_millis(self.test_timeout_ms)
    }

    fn sanitized(mut self) -> Self {
        // A zero-permit semaphore would never run anything
        if self.max_concurrent_executions == 0 {
            warn!("max_concurrent_executions must be at least 1, using 1");
            self.max_concurrent_executions = 1;
        }
        self
    }
}

fn parse_env<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("Invalid value for {}: {}", name, raw)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.max_concurrent_executions, 4);
        assert_eq!(config.test_timeout(), Duration::from_millis(5000));
        assert_eq!(config.executor, ExecutorKind::Simulated);
    }

    #[test]
    fn test_zero_concurrency_is_clamped() {
        let config = EngineConfig::default().with_max_concurrency(0);
        assert_eq!(config.max_concurrent_executions, 1);
    }

    #[test]
    fn test_executor_kind_parse() {
        assert_eq!("Process".parse::<ExecutorKind>().unwrap(), ExecutorKind::Process);
        assert_eq!("simulated".parse::<ExecutorKind>().unwrap(), ExecutorKind::Simulated);
        assert!("docker".parse::<ExecutorKind>().is_err());
    }
}
