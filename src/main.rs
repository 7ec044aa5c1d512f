use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info, warn};

use grader::config::{EngineConfig, ExecutorKind};
use grader::core::LanguageRegistry;
use grader::evaluation::EvaluationOrchestrator;
use grader::executor::{Executor, ProcessExecutor, SimulatedExecutor};
use grader::jobs::{JobError, RunJob, ValidateJob, WorkerJob};
use grader::store::redis_manager::keys;
use grader::store::{CatalogProblemSource, RedisManager};
use grader::validation::ValidatorChain;

/// Seconds BLPOP waits before checking for shutdown
const POP_TIMEOUT_SECS: f64 = 5.0;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("grader=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let config = EngineConfig::from_env()?;
    info!(
        "Starting grading worker: executor={:?}, max_concurrency={}, test_timeout={}ms",
        config.executor, config.max_concurrent_executions, config.test_timeout_ms
    );

    let executor: Arc<dyn Executor> = match config.executor {
        ExecutorKind::Simulated => Arc::new(SimulatedExecutor::new(config.simulation_seed)),
        ExecutorKind::Process => {
            let languages = LanguageRegistry::load(&config.languages_path)?;
            info!(
                "Loaded language configurations from {}: {:?}",
                config.languages_path,
                languages.supported_languages()
            );
            warn!("Process executor runs submissions without a sandbox");
            Arc::new(ProcessExecutor::new(Arc::new(languages)))
        }
    };

    let catalog = CatalogProblemSource::load(&config.problems_path)?;
    info!("Loaded problem catalog from {}", config.problems_path);
    for problem in catalog.problem_ids().into_iter().filter_map(|id| catalog.get(id)) {
        info!(
            "  {} - {} ({} test cases)",
            problem.id,
            problem.title.as_deref().unwrap_or("untitled"),
            problem.test_cases.len()
        );
    }

    let redis = Arc::new(
        RedisManager::with_url(&config.redis_url)
            .await
            .context("Failed to initialize Redis")?,
    );

    let orchestrator = EvaluationOrchestrator::new(
        &config,
        executor,
        Arc::new(catalog),
        redis.clone(),
        ValidatorChain::with_defaults(),
    );

    // Flipped on ctrl-c; evaluations in flight resolve to system_error
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received shutdown signal, stopping...");
                let _ = shutdown_tx.send(true);
            }
            Err(e) => error!("Failed to listen for shutdown signal: {}", e),
        }
    });

    info!("Waiting for jobs...");

    while !*shutdown_rx.borrow() {
        let job = match redis.pop_job(POP_TIMEOUT_SECS).await {
            Ok(Some(job)) => job,
            Ok(None) => continue,
            Err(e) => {
                error!("Redis error: {}", e);
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                continue;
            }
        };

        match job {
            WorkerJob::Submit(request) => {
                let submission_id = request.submission_id;
                info!(
                    "Received submit job: submission_id={}, problem_id={}, language={}",
                    submission_id, request.problem_id, request.language
                );
                let key = format!("{}{}", keys::SUBMIT_RESULT_PREFIX, submission_id);

                let stored = match orchestrator.submit(request, shutdown_rx.clone()).await {
                    Ok(evaluation) => {
                        redis
                            .store_result(&key, Some(keys::SUBMIT_RESULT_CHANNEL), &evaluation.view())
                            .await
                    }
                    Err(e) => {
                        warn!("Rejected submission {}: {}", submission_id, e);
                        redis
                            .store_result(&key, Some(keys::SUBMIT_RESULT_CHANNEL), &JobError::new(&e))
                            .await
                    }
                };
                if let Err(e) = stored {
                    error!("Failed to store result for submission {}: {}", submission_id, e);
                }
            }
            WorkerJob::Run(job) => {
                info!(
                    "Received run job: request_id={}, problem_id={}",
                    job.request_id, job.problem_id
                );
                if let Err(e) = process_run_job(&orchestrator, &redis, &job).await {
                    error!("Failed to store run result {}: {}", job.request_id, e);
                }
            }
            WorkerJob::Validate(job) => {
                info!(
                    "Received validate job: request_id={}, problem_id={}",
                    job.request_id, job.problem_id
                );
                if let Err(e) = process_validate_job(&orchestrator, &redis, &job).await {
                    error!("Failed to store validation result {}: {}", job.request_id, e);
                }
            }
        }
    }

    info!("Worker shutdown complete");
    Ok(())
}

async fn process_run_job(
    orchestrator: &EvaluationOrchestrator,
    redis: &RedisManager,
    job: &RunJob,
) -> Result<()> {
    let key = format!("{}{}", keys::RUN_RESULT_PREFIX, job.request_id);

    match orchestrator
        .run_code(&job.problem_id, &job.code, &job.language)
        .await
    {
        Ok(response) => {
            info!(
                "Run job completed: request_id={}, success={}",
                job.request_id, response.success
            );
            redis
                .store_result(&key, Some(keys::RUN_RESULT_CHANNEL), &response)
                .await
        }
        Err(e) => {
            warn!("Run job {} failed: {}", job.request_id, e);
            redis
                .store_result(&key, Some(keys::RUN_RESULT_CHANNEL), &JobError::new(&e))
                .await
        }
    }
}

async fn process_validate_job(
    orchestrator: &EvaluationOrchestrator,
    redis: &RedisManager,
    job: &ValidateJob,
) -> Result<()> {
    let key = format!("{}{}", keys::VALIDATE_RESULT_PREFIX, job.request_id);

    let report = match &job.test_cases {
        Some(cases) => Ok(orchestrator.validate_solution(&job.problem_id, job.code.as_deref(), cases)),
        None => {
            orchestrator
                .validate_problem(&job.problem_id, job.code.as_deref())
                .await
        }
    };

    match report {
        Ok(report) => {
            info!(
                "Validate job completed: request_id={}, success={}",
                job.request_id,
                report.success()
            );
            redis
                .store_result(&key, Some(keys::VALIDATE_RESULT_CHANNEL), &report)
                .await
        }
        Err(e) => {
            warn!("Validate job {} failed: {}", job.request_id, e);
            redis
                .store_result(&key, Some(keys::VALIDATE_RESULT_CHANNEL), &JobError::new(&e))
                .await
        }
    }
}
