//! Append-only attempt lineage for one job.
//!
//! Each evaluation cycle adds exactly one [`LineageEntry`] derived from its
//! [`Decision`]. Entries are keyed by the caller-supplied `attempt_seq`, so
//! replaying a cycle is detected without relying on timestamps. Entries are
//! linked by a SHA-256 hash chain; rewriting or truncating history breaks
//! [`AttemptLineage::verify_chain`].

use serde::{Deserialize, Serialize};

use crate::action::{DecisionAction, Resolution, RetryType};
use crate::decision::Decision;
use crate::error::CoreError;
use crate::hashing;
use crate::types::{AttemptSeq, JobId, Timestamp};
use crate::versions;

/// Known seed value standing in for the previous hash of the first entry.
pub const CHAIN_SEED: &str = "ATTEMPT_LINEAGE_CHAIN_SEED_V1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageEntry {
    pub attempt_seq: AttemptSeq,
    pub action: DecisionAction,
    pub resolution: Resolution,
    #[serde(deserialize_with = "RetryType::deserialize_nullable")]
    pub retry_type: RetryType,
    pub retry_attempt: u32,
    /// Informational only; never used for ordering or replay detection.
    pub recorded_at: Timestamp,
    pub prev_hash: String,
    pub entry_hash: String,
}

impl LineageEntry {
    /// Canonical content hashed into the chain.
    fn canonical(&self, job_id: &str) -> String {
        format!(
            "{job_id}|{}|{}|{}|{}|{}",
            self.attempt_seq,
            self.action.as_str(),
            self.resolution.as_str(),
            self.retry_type.as_str(),
            self.retry_attempt,
        )
    }

    fn expected_hash(&self, job_id: &str) -> String {
        compute_entry_hash(&self.prev_hash, &self.canonical(job_id))
    }
}

/// `sha256(prev_hash | entry_data)`.
pub fn compute_entry_hash(prev_hash: &str, entry_data: &str) -> String {
    hashing::sha256_hex(format!("{prev_hash}|{entry_data}").as_bytes())
}

/// Result of recording a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// A new entry was added.
    Appended,
    /// The same attempt was already recorded with the same outcome.
    Replayed,
}

/// Ordered, append-only history of decisions for one job.
///
/// Fields are private: the only mutation is [`AttemptLineage::append`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptLineage {
    version: String,
    job_id: JobId,
    attempts: Vec<LineageEntry>,
}

impl AttemptLineage {
    pub fn new(job_id: impl Into<JobId>) -> Self {
        Self {
            version: versions::ATTEMPT_LINEAGE.to_string(),
            job_id: job_id.into(),
            attempts: Vec::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn attempts(&self) -> &[LineageEntry] {
        &self.attempts
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }

    /// Record a decision.
    ///
    /// - A new `attempt_seq` above every recorded one is appended.
    /// - An already-recorded `attempt_seq` with the same action and
    ///   `retry_attempt` is an idempotent replay.
    /// - Anything else would rewrite or reorder history and is a `Conflict`.
    pub fn append(
        &mut self,
        decision: &Decision,
        recorded_at: Timestamp,
    ) -> Result<AppendOutcome, CoreError> {
        if decision.job_id != self.job_id {
            return Err(CoreError::Validation(format!(
                "decision for job '{}' cannot be recorded in lineage of job '{}'",
                decision.job_id, self.job_id
            )));
        }

        let seq = decision.attempt_seq;
        let action = decision.action();
        let retry_attempt = decision.policy.retry_attempt;

        if let Some(existing) = self.attempts.iter().find(|e| e.attempt_seq == seq) {
            if existing.action == action && existing.retry_attempt == retry_attempt {
                tracing::debug!(job_id = %self.job_id, attempt_seq = seq, "Lineage replay ignored");
                return Ok(AppendOutcome::Replayed);
            }
            return Err(CoreError::Conflict(format!(
                "attempt {seq} of job '{}' is already recorded as {}; lineage entries cannot be rewritten",
                self.job_id, existing.action
            )));
        }

        if let Some(last) = self.attempts.last() {
            if seq < last.attempt_seq {
                return Err(CoreError::Conflict(format!(
                    "attempt_seq {seq} precedes last recorded attempt {} of job '{}'",
                    last.attempt_seq, self.job_id
                )));
            }
        }

        let prev_hash = self
            .attempts
            .last()
            .map_or_else(|| CHAIN_SEED.to_string(), |e| e.entry_hash.clone());
        let mut entry = LineageEntry {
            attempt_seq: seq,
            action,
            resolution: action.resolution(),
            retry_type: action.retry_type(),
            retry_attempt,
            recorded_at,
            prev_hash,
            entry_hash: String::new(),
        };
        entry.entry_hash = entry.expected_hash(&self.job_id);
        self.attempts.push(entry);
        tracing::info!(
            job_id = %self.job_id,
            attempt_seq = seq,
            action = %action,
            "Lineage entry appended",
        );
        Ok(AppendOutcome::Appended)
    }

    /// Recompute the hash chain; the first broken link is reported.
    pub fn verify_chain(&self) -> Result<(), CoreError> {
        let mut expected_prev = CHAIN_SEED.to_string();
        for entry in &self.attempts {
            if entry.prev_hash != expected_prev {
                return Err(CoreError::Conflict(format!(
                    "lineage chain broken at attempt {}: prev_hash does not match preceding entry",
                    entry.attempt_seq
                )));
            }
            if entry.entry_hash != entry.expected_hash(&self.job_id) {
                return Err(CoreError::Conflict(format!(
                    "lineage chain broken at attempt {}: entry content was modified",
                    entry.attempt_seq
                )));
            }
            expected_prev = entry.entry_hash.clone();
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
