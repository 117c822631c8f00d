/// Jobs are identified by the opaque id the pipeline assigns at bootstrap.
pub type JobId = String;

/// Caller-supplied, monotonically increasing evaluation-cycle number.
pub type AttemptSeq = u64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
