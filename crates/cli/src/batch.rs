//! Evaluate every job directory under a root, a bounded number at a time.
//!
//! Jobs share nothing but the read-only promotion decision; each one owns
//! its own lineage file and lock, so they are safe to run concurrently.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinSet};

use qcgate_core::config::EngineConfig;
use qcgate_store::layout;

use crate::evaluate::{self, EvaluationSummary, LoadedPromotion};

/// Outcome of one job in a batch.
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<EvaluationSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    fn failed(job_dir: PathBuf, error: String) -> Self {
        Self {
            job_dir,
            summary: None,
            error: Some(error),
        }
    }
}

/// Evaluate all jobs under `root`. A failing job is reported in its outcome
/// and does not stop the others. Outcomes are sorted by job directory.
pub async fn evaluate_batch(
    root: &Path,
    promotion: Option<LoadedPromotion>,
    engine: EngineConfig,
    concurrency: usize,
) -> anyhow::Result<Vec<JobOutcome>> {
    let jobs = layout::discover_jobs(root).await?;
    tracing::info!(
        root = %root.display(),
        job_count = jobs.len(),
        concurrency,
        "Starting batch evaluation",
    );

    let permits = Arc::new(Semaphore::new(concurrency.max(1)));
    let promotion = promotion.map(Arc::new);
    let mut tasks = JoinSet::new();
    let mut job_dirs = HashMap::new();

    for job in jobs {
        let permits = Arc::clone(&permits);
        let promotion = promotion.clone();
        let engine = engine.clone();
        let job_dir = job.dir.clone();
        let handle = tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            let result =
                evaluate::evaluate_job(&job, None, promotion.as_deref(), &engine).await;
            match result {
                Ok(summary) => JobOutcome {
                    job_dir: job.dir,
                    summary: Some(summary),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(job_dir = %job.dir.display(), error = %e, "Job evaluation failed");
                    JobOutcome::failed(job.dir, format!("{e:#}"))
                }
            }
        });
        job_dirs.insert(handle.id(), job_dir);
    }

    let outcomes = collect_outcomes(tasks, job_dirs).await;

    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    tracing::info!(
        evaluated = outcomes.len(),
        failed,
        "Batch evaluation complete",
    );
    Ok(outcomes)
}

/// Drain `tasks`, turning a panicked or cancelled task into a failed outcome
/// for the job it was evaluating.
async fn collect_outcomes(
    mut tasks: JoinSet<JobOutcome>,
    mut job_dirs: HashMap<Id, PathBuf>,
) -> Vec<JobOutcome> {
    let mut outcomes = Vec::with_capacity(job_dirs.len());
    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((_, outcome)) => outcomes.push(outcome),
            Err(e) => {
                let job_dir = job_dirs.remove(&e.id()).unwrap_or_default();
                tracing::error!(job_dir = %job_dir.display(), error = %e, "Job task failed");
                outcomes.push(JobOutcome::failed(job_dir, format!("job task failed: {e}")));
            }
        }
    }
    outcomes.sort_by(|a, b| a.job_dir.cmp(&b.job_dir));
    outcomes
}
