//! File-backed attempt lineage with a per-job exclusive writer.
//!
//! The lineage file is only ever rewritten as "previous content plus one
//! entry", while holding an OS advisory lock on the job's lock file. A
//! second writer for the same job fails fast with [`StoreError::Locked`]
//! instead of waiting. The kernel drops the lock when the holder exits, so
//! a crashed writer never leaves the job locked.

use std::fs::File;

use chrono::Utc;
use fs2::FileExt;

use qcgate_core::decision::Decision;
use qcgate_core::error::CoreError;
use qcgate_core::lineage::{AppendOutcome, AttemptLineage};

use crate::error::{StoreError, StoreResult};
use crate::intake;
use crate::layout::JobPaths;
use crate::writer;

/// Held while a job's lineage is being written; the lock is released when
/// the file handle closes.
#[derive(Debug)]
pub struct LineageLock {
    file: File,
}

impl LineageLock {
    /// Try to become the single writer for the job at `paths`.
    pub async fn acquire(paths: &JobPaths, job_id: &str) -> StoreResult<Self> {
        let path = paths.lineage_lock();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)
            .await
            .map_err(|e| StoreError::io(&path, e))?
            .into_std()
            .await;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self { file }),
            Err(e)
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.raw_os_error() == fs2::lock_contended_error().raw_os_error() =>
            {
                tracing::warn!(job_id, lock = %path.display(), "Lineage already locked");
                Err(StoreError::Locked {
                    job_id: job_id.to_string(),
                    lock_path: path,
                })
            }
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }
}

impl Drop for LineageLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::error!(error = %e, "Failed to release lineage lock");
        }
    }
}

/// Load a job's lineage, or start an empty one if none was written yet.
///
/// An existing file must still verify against its hash chain.
pub async fn load_or_new(paths: &JobPaths, job_id: &str) -> StoreResult<AttemptLineage> {
    let path = paths.lineage();
    let exists = tokio::fs::try_exists(&path)
        .await
        .map_err(|e| StoreError::io(&path, e))?;
    if !exists {
        return Ok(AttemptLineage::new(job_id));
    }

    let lineage = intake::load_lineage(&path).await?;
    if lineage.job_id() != job_id {
        return Err(CoreError::Validation(format!(
            "lineage file {} belongs to job '{}', expected '{job_id}'",
            path.display(),
            lineage.job_id()
        ))
        .into());
    }
    lineage.verify_chain()?;
    Ok(lineage)
}

/// Record `decision` in the job's lineage file.
///
/// Replays of an already-recorded attempt leave the file untouched.
pub async fn append(
    paths: &JobPaths,
    decision: &Decision,
) -> StoreResult<(AppendOutcome, AttemptLineage)> {
    let _lock = LineageLock::acquire(paths, &decision.job_id).await?;

    let mut lineage = load_or_new(paths, &decision.job_id).await?;
    let outcome = lineage.append(decision, Utc::now())?;
    if outcome == AppendOutcome::Appended {
        writer::write_json(&paths.lineage(), &lineage).await?;
    }
    Ok((outcome, lineage))
}
