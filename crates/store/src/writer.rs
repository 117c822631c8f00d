//! Atomic JSON document writes.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{StoreError, StoreResult};

/// Serialize `value` as pretty JSON and replace `path` atomically
/// (write to a sibling temp file, then rename).
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    let mut body = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    body.push(b'\n');

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, &body)
        .await
        .map_err(|e| StoreError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    tracing::debug!(path = %path.display(), bytes = body.len(), "Document written");
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_file_is_a_sibling() {
        assert_eq!(
            temp_path(Path::new("/jobs/job-1/retry_decision.json")),
            PathBuf::from("/jobs/job-1/retry_decision.json.tmp")
        );
    }
}
