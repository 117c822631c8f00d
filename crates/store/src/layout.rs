//! On-disk layout of a job directory.
//!
//! Every job owns one directory holding its upstream artifacts and the
//! documents this engine writes. Paths recorded inside documents are relative
//! to the job directory.

use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};

pub const QUALITY_REPORT_FILE: &str = "quality_report.json";
pub const TWO_PASS_FILE: &str = "two_pass_assessment.json";
pub const RETRY_POLICY_FILE: &str = "retry_policy.json";
pub const DECISION_FILE: &str = "retry_decision.json";
pub const LINEAGE_FILE: &str = "attempt_lineage.json";
pub const FINALIZE_GATE_FILE: &str = "finalize_gate.json";

/// Lock file guarding the lineage against concurrent writers.
pub const LINEAGE_LOCK_FILE: &str = "attempt_lineage.lock";

/// Resolved paths for one job directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    pub dir: PathBuf,
}

impl JobPaths {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn quality_report(&self) -> PathBuf {
        self.dir.join(QUALITY_REPORT_FILE)
    }

    pub fn two_pass(&self) -> PathBuf {
        self.dir.join(TWO_PASS_FILE)
    }

    pub fn retry_policy(&self) -> PathBuf {
        self.dir.join(RETRY_POLICY_FILE)
    }

    pub fn decision(&self) -> PathBuf {
        self.dir.join(DECISION_FILE)
    }

    pub fn lineage(&self) -> PathBuf {
        self.dir.join(LINEAGE_FILE)
    }

    pub fn lineage_lock(&self) -> PathBuf {
        self.dir.join(LINEAGE_LOCK_FILE)
    }

    pub fn finalize_gate(&self) -> PathBuf {
        self.dir.join(FINALIZE_GATE_FILE)
    }

    /// `true` when the directory holds the three inputs of an evaluation cycle.
    pub async fn has_inputs(&self) -> bool {
        for path in [self.quality_report(), self.two_pass(), self.retry_policy()] {
            if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
                return false;
            }
        }
        true
    }
}

/// Path of `path` relative to `base`, falling back to the full path.
pub fn relpath(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}

/// Job directories directly under `root` that contain evaluation inputs,
/// sorted by name.
pub async fn discover_jobs(root: &Path) -> StoreResult<Vec<JobPaths>> {
    let mut entries = tokio::fs::read_dir(root)
        .await
        .map_err(|e| StoreError::io(root, e))?;
    let mut jobs = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoreError::io(root, e))?
    {
        let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
        if !is_dir {
            continue;
        }
        let job = JobPaths::new(entry.path());
        if job.has_inputs().await {
            jobs.push(job);
        }
    }
    jobs.sort_by(|a, b| a.dir.cmp(&b.dir));
    Ok(jobs)
}
