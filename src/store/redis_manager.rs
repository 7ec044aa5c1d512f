//! Redis Manager - Centralized Redis connection and operations
//!
//! This module handles all Redis-related operations including:
//! - Job queue operations (BLPOP)
//! - Submission persistence
//! - Result storage and publishing

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::SubmissionStore;
use crate::core::{Submission, SubmissionStatus, TestResult};
use crate::jobs::WorkerJob;

/// Redis key constants
pub mod keys {
    /// Job queue key
    pub const JOB_QUEUE: &str = "grader:queue";

    /// Submission record key prefix
    pub const SUBMISSION_PREFIX: &str = "grader:submission:";

    /// Test results key prefix
    pub const TEST_RESULTS_PREFIX: &str = "grader:test_results:";

    /// Submission status channel (for pub/sub)
    pub const SUBMISSION_CHANNEL: &str = "grader:submissions";

    /// Submission result key prefix (for polling)
    pub const SUBMIT_RESULT_PREFIX: &str = "grader:result:";

    /// Submission result channel (for pub/sub)
    pub const SUBMIT_RESULT_CHANNEL: &str = "grader:results";

    /// Run result key prefix (for polling)
    pub const RUN_RESULT_PREFIX: &str = "run:result:";

    /// Run result channel (for pub/sub)
    pub const RUN_RESULT_CHANNEL: &str = "run:results";

    /// Validation result key prefix (for polling)
    pub const VALIDATE_RESULT_PREFIX: &str = "validate:result:";

    /// Validation result channel (for pub/sub)
    pub const VALIDATE_RESULT_CHANNEL: &str = "validate:results";
}

const RESULT_EXPIRY_SECS: u64 = 3600; // 1 hour

/// Status change published for live subscribers
#[derive(Debug, Serialize)]
struct StatusEvent {
    submission_id: i64,
    status: SubmissionStatus,
    score: f64,
}

/// Centralized Redis manager for all Redis operations
pub struct RedisManager {
    client: redis::Client,
    /// Commands and publishes
    conn: Mutex<MultiplexedConnection>,
    /// Dedicated to BLPOP so blocking never stalls result writes
    queue_conn: Mutex<MultiplexedConnection>,
}

impl RedisManager {
    /// Create a new RedisManager connected to `redis_url`
    pub async fn with_url(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;

        let conn = get_connection_with_retry(&client).await?;
        let queue_conn = get_connection_with_retry(&client).await?;
        info!("Connected to Redis at {}", redis_url);

        Ok(Self {
            client,
            conn: Mutex::new(conn),
            queue_conn: Mutex::new(queue_conn),
        })
    }

    /// Wait up to `timeout_secs` for the next job from the queue.
    ///
    /// Returns `None` on timeout so callers can check for shutdown.
    /// Unparseable jobs are logged and skipped.
    pub async fn pop_job(&self, timeout_secs: f64) -> Result<Option<WorkerJob>> {
        let mut conn = self.queue_conn.lock().await;

        let result: Option<(String, String)> =
            match conn.blpop(keys::JOB_QUEUE, timeout_secs).await {
                Ok(res) => res,
                Err(e) => {
                    warn!("Redis BLPOP failed: {}. Reconnecting...", e);
                    *conn = get_connection_with_retry(&self.client).await?;
                    return Ok(None);
                }
            };

        match result {
            Some((_, job_data)) => match serde_json::from_str::<WorkerJob>(&job_data) {
                Ok(job) => Ok(Some(job)),
                Err(e) => {
                    warn!("Failed to parse job data: {}. Data: {}", e, job_data);
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    /// Store a job result with a 1-hour expiration and publish it to
    /// `channel` for real-time subscribers.
    pub async fn store_result<T: Serialize + Sync>(
        &self,
        key: &str,
        channel: Option<&str>,
        result: &T,
    ) -> Result<()> {
        let json = serde_json::to_string(result)?;
        self.set(key, &json, Some(RESULT_EXPIRY_SECS)).await?;

        // Publish to channel (ignore errors as there may be no subscribers)
        if let Some(chan) = channel {
            let mut conn = self.conn.lock().await.clone();
            let _ = conn.publish::<_, _, ()>(chan, &json).await;
        }

        Ok(())
    }

    /// SET (or SETEX), reconnecting once on failure
    async fn set(&self, key: &str, value: &str, expiry_secs: Option<u64>) -> Result<()> {
        let mut conn = self.conn.lock().await.clone();

        if let Err(e) = write(&mut conn, key, value, expiry_secs).await {
            warn!("Failed to store {}: {}. Reconnecting...", key, e);
            let fresh = self.reconnect().await?;
            conn = fresh;
            write(&mut conn, key, value, expiry_secs).await?;
        }

        Ok(())
    }

    /// Reconnect to Redis
    async fn reconnect(&self) -> Result<MultiplexedConnection> {
        let fresh = get_connection_with_retry(&self.client).await?;
        *self.conn.lock().await = fresh.clone();
        Ok(fresh)
    }
}

#[async_trait]
impl SubmissionStore for RedisManager {
    async fn save_submission(&self, submission: &Submission) -> Result<()> {
        let json = serde_json::to_string(submission)?;
        let key = format!("{}{}", keys::SUBMISSION_PREFIX, submission.id);
        self.set(&key, &json, None).await?;

        let event = StatusEvent {
            submission_id: submission.id,
            status: submission.status,
            score: submission.score,
        };
        let event = serde_json::to_string(&event)?;
        let mut conn = self.conn.lock().await.clone();
        let _ = conn
            .publish::<_, _, ()>(keys::SUBMISSION_CHANNEL, &event)
            .await;

        Ok(())
    }

    async fn save_test_results(&self, submission_id: i64, results: &[TestResult]) -> Result<()> {
        let json = serde_json::to_string(results)?;
        let key = format!("{}{}", keys::TEST_RESULTS_PREFIX, submission_id);
        self.set(&key, &json, None).await
    }
}

async fn write(
    conn: &mut MultiplexedConnection,
    key: &str,
    value: &str,
    expiry_secs: Option<u64>,
) -> redis::RedisResult<()> {
    match expiry_secs {
        Some(secs) => conn.set_ex::<_, _, ()>(key, value, secs).await,
        None => conn.set::<_, _, ()>(key, value).await,
    }
}

/// Get a Redis connection with retry logic
async fn get_connection_with_retry(client: &redis::Client) -> Result<MultiplexedConnection> {
    loop {
        match client.get_multiplexed_async_connection().await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                warn!(
                    "Failed to connect to Redis: {}. Retrying in 3 seconds...",
                    e
                );
                tokio::time::sleep(Duration::from_secs(3)).await;
            }
        }
    }
}
