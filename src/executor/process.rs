//! Process executor
//!
//! Compiles and runs submissions as plain local processes, driven by the
//! language registry. There is no sandbox: only use this with trusted code.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, warn};

use anyhow::Context;

use super::{ExecutionFailure, ExecutionOutput, Executor, FailureKind};
use crate::core::{Language, LanguageConfig, LanguageRegistry};
use crate::error::EngineError;

/// Build directories kept before the cache is flushed
const MAX_CACHED_BUILDS: usize = 64;

type Build = Result<Arc<TempDir>, ExecutionFailure>;

pub struct ProcessExecutor {
    languages: Arc<LanguageRegistry>,
    /// Base run limit, adjusted per language
    base_time_limit_ms: u64,
    compile_timeout: Duration,
    /// Compiled workspaces keyed by a hash of (language, code)
    builds: Mutex<HashMap<String, Arc<OnceCell<Build>>>>,
}

impl ProcessExecutor {
    pub fn new(languages: Arc<LanguageRegistry>) -> Self {
        Self {
            languages,
            base_time_limit_ms: 2_000,
            compile_timeout: Duration::from_secs(30),
            builds: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_time_limit_ms(mut self, base_time_limit_ms: u64) -> Self {
        self.base_time_limit_ms = base_time_limit_ms;
        self
    }

    pub fn with_compile_timeout(mut self, timeout: Duration) -> Self {
        self.compile_timeout = timeout;
        self
    }

    fn config(&self, language: Language) -> Result<&LanguageConfig, ExecutionFailure> {
        self.languages.get(&language).ok_or_else(|| {
            internal(format!("No configuration found for language: {}", language))
        })
    }

    /// Get or create the build workspace for this code.
    ///
    /// Concurrent callers with the same code share one compilation. Builds
    /// of different code never wait on each other.
    async fn workspace(&self, code: &str, language: Language) -> Build {
        let config = self.config(language)?;
        let key = build_key(language, code);

        let cell = {
            let mut builds = self.builds.lock().await;
            if !builds.contains_key(&key) && builds.len() >= MAX_CACHED_BUILDS {
                debug!("Flushing {} cached builds", builds.len());
                builds.clear();
            }
            builds.entry(key.clone()).or_default().clone()
        };

        let build = cell.get_or_init(|| self.build(code, config)).await.clone();

        // Backend faults are retried on the next call
        if let Err(failure) = &build {
            if failure.kind == FailureKind::Internal {
                let mut builds = self.builds.lock().await;
                if builds.get(&key).is_some_and(|cached| Arc::ptr_eq(cached, &cell)) {
                    builds.remove(&key);
                }
            }
        }
        build
    }

    async fn build(&self, code: &str, config: &LanguageConfig) -> Build {
        let dir = tempfile::tempdir()
            .map_err(|e| internal(format!("Failed to create build directory: {}", e)))?;

        tokio::fs::write(dir.path().join(&config.source_file), code)
            .await
            .map_err(|e| internal(format!("Failed to write source file: {}", e)))?;

        if let Some(compile_command) = &config.compile_command {
            debug!("Compiling with {:?}", compile_command);

            let output = run_process(compile_command, dir.path(), "", self.compile_timeout)
                .await
                .map_err(|e| internal(format!("{:#}", e)))?;

            match output {
                None => {
                    return Err(ExecutionFailure::whole_run(
                        FailureKind::CompileError,
                        format!(
                            "Compilation timed out after {} ms",
                            self.compile_timeout.as_millis()
                        ),
                    ))
                }
                Some(output) if !output.status.success() => {
                    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                    let message = if stderr.trim().is_empty() { stdout } else { stderr };
                    return Err(ExecutionFailure::whole_run(FailureKind::CompileError, message));
                }
                Some(_) => {}
            }
        }

        Ok(Arc::new(dir))
    }
}

#[async_trait]
impl Executor for ProcessExecutor {
    fn resolve_language(&self, name: &str) -> Result<Language, EngineError> {
        self.languages.resolve(name)
    }

    async fn prepare(&self, code: &str, language: Language) -> Result<(), ExecutionFailure> {
        self.workspace(code, language).await.map(|_| ())
    }

    async fn execute(
        &self,
        code: &str,
        language: Language,
        input: &str,
    ) -> Result<ExecutionOutput, ExecutionFailure> {
        let config = self.config(language)?;
        let workspace = self.workspace(code, language).await?;
        let time_limit = Duration::from_millis(config.calculate_time_limit(self.base_time_limit_ms));
        let time_limit_ms = time_limit.as_millis() as u64;

        let start = Instant::now();
        let output = run_process(&config.run_command, workspace.path(), input, time_limit)
            .await
            .map_err(|e| internal(format!("{:#}", e)))?;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        let output = output.ok_or_else(|| {
            ExecutionFailure::test_case(
                FailureKind::TimeLimitExceeded,
                format!("Time limit exceeded ({} ms)", time_limit_ms),
            )
            .with_metrics(time_limit_ms, 0)
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            let message = match output.status.code() {
                Some(code) => format!("Process exited with code {}: {}", code, stderr.trim()),
                None => format!("Process terminated by signal: {}", stderr.trim()),
            };
            return Err(
                ExecutionFailure::test_case(FailureKind::RuntimeError, message)
                    .with_metrics(elapsed_ms, 0),
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);

        Ok(ExecutionOutput {
            // Trailing newlines from print/println are not part of the answer
            stdout: stdout.trim_end_matches(['\n', '\r']).to_string(),
            execution_time_ms: elapsed_ms,
            memory_usage_bytes: 0, // Not measured without a sandbox
        })
    }
}

fn internal(message: String) -> ExecutionFailure {
    warn!("Process executor failure: {}", message);
    ExecutionFailure::whole_run(FailureKind::Internal, message)
}

fn build_key(language: Language, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(language.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(code.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Run a command in `work_dir`, feeding `stdin_content`.
///
/// Returns `Ok(None)` if it did not finish within `timeout`; the child is
/// killed on drop.
async fn run_process(
    command: &[String],
    work_dir: &Path,
    stdin_content: &str,
    timeout: Duration,
) -> anyhow::Result<Option<Output>> {
    let (program, args) = command.split_first().context("Empty command")?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(work_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("Failed to spawn {}", program))?;

    // Dropping stdin closes it so the child sees EOF
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(stdin_content.as_bytes()).await {
            // The program may exit without reading its input
            debug!("Failed to write stdin: {}", e);
        }
    }

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(output) => Ok(Some(output.context("Failed to wait for process")?)),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::FailureScope;

    fn shell_registry() -> Arc<LanguageRegistry> {
        let registry = LanguageRegistry::from_toml_str(
            r#"
[python]
source_file = "main.sh"
run_command = "sh main.sh"

[cpp]
source_file = "main.cpp"
compile_command = "cp main.cpp main.sh"
run_command = "sh main.sh"

[c]
source_file = "main.c"
compile_command = "sh -c false"
run_command = "./main"
"#,
        )
        .unwrap();
        Arc::new(registry)
    }

    #[tokio::test]
    async fn test_runs_interpreted_code() {
        let executor = ProcessExecutor::new(shell_registry());
        let output = executor
            .execute("read x; echo $((x + 1))", Language::Python, "41\n")
            .await
            .unwrap();
        assert_eq!(output.stdout, "42");
        assert_eq!(output.memory_usage_bytes, 0);
    }

    #[tokio::test]
    async fn test_compiles_once_and_runs() {
        let executor = ProcessExecutor::new(shell_registry());
        let code = "read x; echo \"got $x\"";

        let first = executor.execute(code, Language::Cpp, "a").await.unwrap();
        let second = executor.execute(code, Language::Cpp, "b").await.unwrap();
        assert_eq!(first.stdout, "got a");
        assert_eq!(second.stdout, "got b");
        assert_eq!(executor.builds.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_compile_failure_is_whole_run() {
        let executor = ProcessExecutor::new(shell_registry());
        let err = executor.execute("int main(", Language::C, "").await.unwrap_err();
        assert_eq!(err.kind, FailureKind::CompileError);
        assert_eq!(err.scope, FailureScope::WholeRun);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_runtime_error() {
        let executor = ProcessExecutor::new(shell_registry());
        let err = executor
            .execute("echo boom >&2; exit 3", Language::Python, "")
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::RuntimeError);
        assert_eq!(err.scope, FailureScope::TestCase);
        assert!(err.message.contains("code 3"));
        assert!(err.message.contains("boom"));
    }

    #[tokio::test]
    async fn test_time_limit() {
        let executor = ProcessExecutor::new(shell_registry()).with_time_limit_ms(100);
        let err = executor.execute("sleep 5", Language::Python, "").await.unwrap_err();
        assert_eq!(err.kind, FailureKind::TimeLimitExceeded);
        assert_eq!(err.execution_time_ms, 100);
    }

    #[tokio::test]
    async fn test_runtime_error_records_elapsed_time() {
        let executor = ProcessExecutor::new(shell_registry());
        let err = executor
            .execute("sleep 0.2; exit 1", Language::Python, "")
            .await
            .unwrap_err();
        assert_eq!(err.kind, FailureKind::RuntimeError);
        assert!(err.execution_time_ms >= 150);
    }

    #[tokio::test]
    async fn test_prepare_builds_once_for_execute() {
        let registry = LanguageRegistry::from_toml_str(
            r#"
[cpp]
source_file = "main.sh"
compile_command = "sleep 1"
run_command = "sh main.sh"
"#,
        )
        .unwrap();
        let executor = ProcessExecutor::new(Arc::new(registry));
        let code = "echo built";

        executor.prepare(code, Language::Cpp).await.unwrap();

        // The compile step is cached, so running fits well under its duration
        let output = tokio::time::timeout(
            Duration::from_millis(500),
            executor.execute(code, Language::Cpp, ""),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(output.stdout, "built");
    }

    #[tokio::test]
    async fn test_compile_timeout_is_whole_run_compile_error() {
        let registry = LanguageRegistry::from_toml_str(
            r#"
[cpp]
source_file = "main.sh"
compile_command = "sleep 5"
run_command = "sh main.sh"
"#,
        )
        .unwrap();
        let executor = ProcessExecutor::new(Arc::new(registry))
            .with_compile_timeout(Duration::from_millis(100));

        let err = executor.prepare("echo x", Language::Cpp).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::CompileError);
        assert_eq!(err.scope, FailureScope::WholeRun);
        assert!(err.message.contains("timed out"));
    }

    #[test]
    fn test_resolve_language_uses_registry() {
        let executor = ProcessExecutor::new(shell_registry());
        assert_eq!(executor.resolve_language("CPP").unwrap(), Language::Cpp);
        assert!(matches!(
            executor.resolve_language("rust"),
            Err(EngineError::UnsupportedLanguage(_))
        ));
    }

    #[tokio::test]
    async fn test_unconfigured_language_is_internal() {
        let executor = ProcessExecutor::new(shell_registry());
        let err = executor.execute("x", Language::Rust, "").await.unwrap_err();
        assert_eq!(err.kind, FailureKind::Internal);
    }
}
