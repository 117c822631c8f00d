//! Finalize gate: the single publish-eligibility checkpoint.
//!
//! Always derived from the latest [`Decision`]; a stored gate record is never
//! an input.

use serde::{Deserialize, Serialize};

use crate::action::DecisionAction;
use crate::decision::Decision;
use crate::error::CoreError;
use crate::types::{AttemptSeq, JobId};
use crate::versions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateStatus {
    Pass,
    Block,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gate {
    pub allow_finalize: bool,
    pub status: GateStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSource {
    pub decision_action: DecisionAction,
    pub attempt_seq: AttemptSeq,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeGateRecord {
    pub version: String,
    pub job_id: JobId,
    pub gate: Gate,
    pub source: GateSource,
}

impl FinalizeGateRecord {
    pub fn validate(&self) -> Result<(), CoreError> {
        versions::ensure_version(&self.version, versions::FINALIZE_GATE)
    }
}

/// Derive the gate from a decision. Pure and idempotent.
pub fn derive(decision: &Decision) -> FinalizeGateRecord {
    let allow_finalize = decision.action() == DecisionAction::ProceedFinalize;
    FinalizeGateRecord {
        version: versions::FINALIZE_GATE.to_string(),
        job_id: decision.job_id.clone(),
        gate: Gate {
            allow_finalize,
            status: if allow_finalize {
                GateStatus::Pass
            } else {
                GateStatus::Block
            },
        },
        source: GateSource {
            decision_action: decision.action(),
            attempt_seq: decision.attempt_seq,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::fixtures::decision;

    #[test]
    fn only_proceed_finalize_allows_publishing() {
        for action in DecisionAction::ALL {
            let record = derive(&decision(1, action, 0));
            let expected = action == DecisionAction::ProceedFinalize;
            assert_eq!(record.gate.allow_finalize, expected, "{action}");
            assert_eq!(record.gate.status == GateStatus::Pass, expected, "{action}");
            assert_eq!(record.source.decision_action, action);
        }
    }

    #[test]
    fn derivation_is_idempotent() {
        let d = decision(4, DecisionAction::ProceedFinalize, 1);
        assert_eq!(derive(&d), derive(&d));
    }

    #[test]
    fn serialized_status_strings() {
        let record = derive(&decision(1, DecisionAction::EscalateHitl, 0));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["gate"]["status"], "block");
        assert_eq!(value["gate"]["allow_finalize"], false);
        assert_eq!(value["source"]["decision_action"], "escalate_hitl");
    }
}
