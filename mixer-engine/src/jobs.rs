//! Concurrent execution of independent composition jobs
//!
//! Each job runs its stages in sequence on one worker. Jobs share nothing but the
//! read-only profile store, so any number may run side by side up to the configured
//! limit. A job that outlives its wall-clock budget is cancelled at the next stage
//! boundary and reported as timed out; partial work is discarded.

use crate::config::MixerConfig;
use crate::engineer::{Engineer, MashupJob, MashupResult, StrategyKind};
use crate::error::{MashupError, Result};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

/// Result of one job in a batch
#[derive(Debug)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub strategy: StrategyKind,
    pub result: Result<MashupResult>,
}

impl JobOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Serializable summary of a [`JobOutcome`], as printed by the CLI
#[derive(Debug, Serialize)]
pub struct JobReport {
    pub job_id: Uuid,
    pub strategy: StrategyKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<MashupResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<JobOutcome> for JobReport {
    fn from(outcome: JobOutcome) -> Self {
        let (result, error) = match outcome.result {
            Ok(result) => (Some(result), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            job_id: outcome.job_id,
            strategy: outcome.strategy,
            result,
            error,
        }
    }
}

/// Bounded worker pool over an [`Engineer`]
#[derive(Clone)]
pub struct JobRunner {
    engineer: Arc<Engineer>,
    permits: Arc<Semaphore>,
    budget: Duration,
}

impl JobRunner {
    pub fn new(engineer: Arc<Engineer>, config: &MixerConfig) -> Self {
        Self::with_limits(
            engineer,
            config.jobs.max_concurrent_jobs,
            Duration::from_secs(config.jobs.job_timeout_sec),
        )
    }

    pub fn with_limits(engineer: Arc<Engineer>, max_concurrent: usize, budget: Duration) -> Self {
        Self {
            engineer,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            budget,
        }
    }

    /// Run one job under the concurrency limit and time budget
    pub async fn run(&self, job: &MashupJob) -> JobOutcome {
        self.run_with_cancel(job, &CancellationToken::new()).await
    }

    /// Like [`JobRunner::run`]; cancelling `parent` also stops the job
    pub async fn run_with_cancel(&self, job: &MashupJob, parent: &CancellationToken) -> JobOutcome {
        let job_id = Uuid::new_v4();
        let strategy = job.kind();
        let result = self.execute(job, job_id, parent).await;

        match &result {
            Ok(r) => info!(
                job_id = %job_id,
                strategy = %strategy,
                output = %r.output_path.display(),
                "Job completed"
            ),
            Err(e) => warn!(job_id = %job_id, strategy = %strategy, error = %e, "Job failed"),
        }

        JobOutcome {
            job_id,
            strategy,
            result,
        }
    }

    async fn execute(&self, job: &MashupJob, job_id: Uuid, parent: &CancellationToken) -> Result<MashupResult> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| MashupError::audio("schedule", e))?;

        // The budget counts from the moment the job holds a worker
        let started = Instant::now();
        let cancel = parent.child_token();
        let deadline = {
            let cancel = cancel.clone();
            let budget = self.budget;
            tokio::spawn(async move {
                tokio::time::sleep(budget).await;
                cancel.cancel();
            })
        };

        let result = self.engineer.compose_with_cancel(job, job_id, &cancel).await;
        deadline.abort();

        match result {
            Err(MashupError::Cancelled { .. }) if started.elapsed() >= self.budget && !parent.is_cancelled() => {
                Err(MashupError::TimedOut {
                    job_id: job_id.to_string(),
                    budget_sec: self.budget.as_secs(),
                })
            }
            other => other,
        }
    }

    /// Run every job; outcomes are returned in job order
    pub async fn run_all(&self, jobs: &[MashupJob]) -> Vec<JobOutcome> {
        info!(jobs = jobs.len(), limit = self.permits.available_permits(), "Running batch");
        let outcomes = futures::future::join_all(jobs.iter().map(|job| self.run(job))).await;
        let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
        info!(jobs = outcomes.len(), failed, "Batch finished");
        outcomes
    }
}
