//! The authoritative Decision document produced once per evaluation cycle.
//!
//! A `Decision` is an immutable value: each cycle builds a new one from
//! snapshots of its inputs. Earlier decisions survive only through the
//! attempt lineage.

use serde::{Deserialize, Serialize};

use crate::action::{DecisionAction, SegmentRetryMode};
use crate::error::CoreError;
use crate::types::{AttemptSeq, JobId};
use crate::versions;

/// Where the proposed action of a cycle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSource {
    GateEvaluator,
    TwoPass,
}

/// Segment routing for a motion retry.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SegmentRetry {
    pub mode: SegmentRetryMode,
    #[serde(default)]
    pub target_segments: Vec<String>,
}

impl SegmentRetry {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Self {
            mode: SegmentRetryMode::RetryAll,
            target_segments: Vec::new(),
        }
    }

    pub fn selected(target_segments: Vec<String>) -> Self {
        Self {
            mode: SegmentRetryMode::RetrySelected,
            target_segments,
        }
    }
}

/// Policy values in force when the decision was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub max_retries: u32,
    pub retry_attempt: u32,
    pub authority_trial_enabled: bool,
    pub authority_trial_rollback: bool,
    pub quality_policy: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionBody {
    pub action: DecisionAction,
    /// Action produced by the transition rules before authority-trial gating.
    pub proposed_action: DecisionAction,
    pub source: ActionSource,
    pub reason: String,
}

/// Pointers to the artifacts the decision was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionInputs {
    pub quality_report_relpath: String,
    pub two_pass_orchestration_relpath: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion_decision_relpath: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub version: String,
    pub job_id: JobId,
    pub attempt_seq: AttemptSeq,
    pub policy: PolicySnapshot,
    pub decision: DecisionBody,
    pub segment_retry: SegmentRetry,
    pub inputs: DecisionInputs,
}

impl Decision {
    pub fn validate(&self) -> Result<(), CoreError> {
        versions::ensure_version(&self.version, versions::RETRY_DECISION)
    }

    pub fn action(&self) -> DecisionAction {
        self.decision.action
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A consistent decision for `job-1` with `max_retries = 2`.
    pub fn decision(seq: AttemptSeq, action: DecisionAction, retry_attempt: u32) -> Decision {
        Decision {
            version: versions::RETRY_DECISION.to_string(),
            job_id: "job-1".to_string(),
            attempt_seq: seq,
            policy: PolicySnapshot {
                max_retries: 2,
                retry_attempt,
                authority_trial_enabled: false,
                authority_trial_rollback: false,
                quality_policy: "quality_policy.v1".to_string(),
            },
            decision: DecisionBody {
                action,
                proposed_action: action,
                source: ActionSource::TwoPass,
                reason: "fixture".to_string(),
            },
            segment_retry: if action == DecisionAction::RetryMotion {
                SegmentRetry::all()
            } else {
                SegmentRetry::none()
            },
            inputs: DecisionInputs {
                quality_report_relpath: "quality_report.json".to_string(),
                two_pass_orchestration_relpath: "two_pass_assessment.json".to_string(),
                promotion_decision_relpath: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn document_shape_matches_contract() {
        let decision = Decision {
            version: versions::RETRY_DECISION.to_string(),
            job_id: "job-7".to_string(),
            attempt_seq: 1,
            policy: PolicySnapshot {
                max_retries: 2,
                retry_attempt: 0,
                authority_trial_enabled: false,
                authority_trial_rollback: false,
                quality_policy: "quality_policy.v1".to_string(),
            },
            decision: DecisionBody {
                action: DecisionAction::RetryMotion,
                proposed_action: DecisionAction::RetryMotion,
                source: ActionSource::TwoPass,
                reason: "motion pass failed".to_string(),
            },
            segment_retry: SegmentRetry::all(),
            inputs: DecisionInputs {
                quality_report_relpath: "quality_report.json".to_string(),
                two_pass_orchestration_relpath: "two_pass_assessment.json".to_string(),
                promotion_decision_relpath: None,
            },
        };
        let value = serde_json::to_value(&decision).unwrap();
        assert_eq!(value["decision"]["action"], "retry_motion");
        assert_eq!(value["segment_retry"]["mode"], "retry_all");
        assert_eq!(value["policy"]["authority_trial_rollback"], json!(false));
        assert_eq!(
            value["inputs"]["two_pass_orchestration_relpath"],
            "two_pass_assessment.json"
        );
        assert!(value["inputs"].get("promotion_decision_relpath").is_none());
    }

    #[test]
    fn segment_retry_defaults_to_none() {
        let s: SegmentRetry = serde_json::from_value(json!({"mode": "none"})).unwrap();
        assert_eq!(s, SegmentRetry::none());
        assert!(s.target_segments.is_empty());
    }
}
