//! Closed vocabularies shared by every artifact: decision actions, lineage
//! resolutions, retry types and segment-retry modes.
//!
//! The string forms match the values stored in the versioned JSON documents.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// DecisionAction
// ---------------------------------------------------------------------------

/// Outcome of one evaluation cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    ProceedFinalize,
    RetryMotion,
    RetryRecast,
    BlockForCostume,
    EscalateHitl,
}

impl DecisionAction {
    pub const ALL: [DecisionAction; 5] = [
        DecisionAction::ProceedFinalize,
        DecisionAction::RetryMotion,
        DecisionAction::RetryRecast,
        DecisionAction::BlockForCostume,
        DecisionAction::EscalateHitl,
    ];

    /// String representation used in artifacts and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionAction::ProceedFinalize => "proceed_finalize",
            DecisionAction::RetryMotion => "retry_motion",
            DecisionAction::RetryRecast => "retry_recast",
            DecisionAction::BlockForCostume => "block_for_costume",
            DecisionAction::EscalateHitl => "escalate_hitl",
        }
    }

    /// `true` for the two actions that consume retry budget.
    pub fn is_retry(&self) -> bool {
        matches!(self, DecisionAction::RetryMotion | DecisionAction::RetryRecast)
    }

    /// Lineage resolution recorded for this action.
    pub fn resolution(&self) -> Resolution {
        match self {
            DecisionAction::RetryMotion | DecisionAction::RetryRecast => Resolution::Retry,
            DecisionAction::ProceedFinalize => Resolution::Finalize,
            DecisionAction::BlockForCostume | DecisionAction::EscalateHitl => Resolution::Escalate,
        }
    }

    /// Lineage retry type recorded for this action.
    pub fn retry_type(&self) -> RetryType {
        match self {
            DecisionAction::RetryMotion => RetryType::Motion,
            DecisionAction::RetryRecast => RetryType::Recast,
            DecisionAction::ProceedFinalize
            | DecisionAction::BlockForCostume
            | DecisionAction::EscalateHitl => RetryType::None,
        }
    }
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Resolution / RetryType
// ---------------------------------------------------------------------------

/// How an attempt was resolved in the lineage log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    Retry,
    Finalize,
    Escalate,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Retry => "retry",
            Resolution::Finalize => "finalize",
            Resolution::Escalate => "escalate",
        }
    }
}

/// Kind of retry recorded in the lineage log. `null` in a document reads as
/// [`RetryType::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryType {
    Motion,
    Recast,
    None,
}

impl RetryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryType::Motion => "motion",
            RetryType::Recast => "recast",
            RetryType::None => "none",
        }
    }

    /// Accepts both `"none"` and `null`.
    pub fn deserialize_nullable<'de, D>(deserializer: D) -> Result<RetryType, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Option::<RetryType>::deserialize(deserializer)?.unwrap_or(RetryType::None))
    }
}

// ---------------------------------------------------------------------------
// SegmentRetryMode
// ---------------------------------------------------------------------------

/// Which segments a motion retry regenerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentRetryMode {
    #[default]
    None,
    RetryAll,
    RetrySelected,
}

impl SegmentRetryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentRetryMode::None => "none",
            SegmentRetryMode::RetryAll => "retry_all",
            SegmentRetryMode::RetrySelected => "retry_selected",
        }
    }
}
