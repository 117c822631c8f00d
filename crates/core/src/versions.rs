//! Document version tags.
//!
//! Every artifact carries a `"version"` field; a document whose tag does not
//! match the expected one is rejected before any semantic check runs.

use crate::error::CoreError;

pub const QUALITY_REPORT: &str = "quality_report.v1";
pub const TWO_PASS_ASSESSMENT: &str = "two_pass_assessment.v1";
pub const RETRY_POLICY: &str = "retry_policy.v1";
pub const RETRY_DECISION: &str = "retry_decision.v1";
pub const ATTEMPT_LINEAGE: &str = "attempt_lineage.v1";
pub const FINALIZE_GATE: &str = "finalize_gate.v1";
pub const BENCHMARK: &str = "benchmark.v1";
pub const PROMOTION_GATE: &str = "promotion_gate.v1";
pub const PROMOTION_DECISION: &str = "promotion_decision.v1";

/// Check a document's version tag.
pub fn ensure_version(actual: &str, expected: &str) -> Result<(), CoreError> {
    if actual == expected {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Unsupported document version '{actual}', expected '{expected}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_version_accepted() {
        assert!(ensure_version("retry_decision.v1", RETRY_DECISION).is_ok());
    }

    #[test]
    fn mismatched_version_rejected() {
        let err = ensure_version("retry_decision.v2", RETRY_DECISION).unwrap_err();
        assert!(err.to_string().contains("retry_decision.v2"));
    }
}
