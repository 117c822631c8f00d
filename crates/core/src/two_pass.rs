//! Two-Pass Assessment: independent motion-fidelity and identity-fidelity
//! verdicts for one attempt, plus the assessor's advisory next action.

use serde::{Deserialize, Serialize};

use crate::action::DecisionAction;
use crate::error::CoreError;
use crate::types::JobId;
use crate::versions;

/// Verdict of one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    Pass,
    Fail,
    Unknown,
}

impl PassStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PassStatus::Pass => "pass",
            PassStatus::Fail => "fail",
            PassStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassVerdict {
    pub status: PassStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passes {
    pub motion: PassVerdict,
    pub identity: PassVerdict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orchestration {
    pub next_preferred_action: DecisionAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwoPassAssessment {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub passes: Passes,
    pub orchestration: Orchestration,
}

impl TwoPassAssessment {
    pub fn validate(&self) -> Result<(), CoreError> {
        versions::ensure_version(&self.version, versions::TWO_PASS_ASSESSMENT)
    }

    pub fn motion_status(&self) -> PassStatus {
        self.passes.motion.status
    }

    pub fn identity_status(&self) -> PassStatus {
        self.passes.identity.status
    }

    /// `true` when neither pass reported `fail`.
    pub fn no_pass_failed(&self) -> bool {
        self.motion_status() != PassStatus::Fail && self.identity_status() != PassStatus::Fail
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn assessment(
        motion: PassStatus,
        identity: PassStatus,
        next: DecisionAction,
    ) -> TwoPassAssessment {
        TwoPassAssessment {
            version: versions::TWO_PASS_ASSESSMENT.to_string(),
            job_id: Some("job-1".to_string()),
            passes: Passes {
                motion: PassVerdict {
                    status: motion,
                    reason: None,
                },
                identity: PassVerdict {
                    status: identity,
                    reason: None,
                },
            },
            orchestration: Orchestration {
                next_preferred_action: next,
            },
        }
    }
}
