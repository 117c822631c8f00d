use std::path::PathBuf;

use qcgate_core::error::CoreError;

/// Errors raised while reading or writing job artifacts.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Missing or mistyped field: a structural error.
    #[error("Malformed document {}: {source}", .path.display())]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The document parsed but failed a domain check.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Lineage for job '{job_id}' is locked by another writer ({})", .lock_path.display())]
    Locked { job_id: String, lock_path: PathBuf },
}

pub type StoreResult<T> = Result<T, StoreError>;

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
