//! Retry policy and the authoritative decision state machine.
//!
//! [`decide`] combines the advisory recommendation, the two-pass assessment,
//! the job's [`RetryPolicy`] and the current promotion decision into a single
//! [`Decision`]. Rules are applied in a fixed order:
//!
//! 1. retry budget exhausted: any retry becomes `escalate_hitl`;
//! 2. `retry_motion` needs a failed motion pass and resolves segment routing;
//! 3. `retry_recast` / `block_for_costume` need a failed identity pass;
//! 4. `proceed_finalize` needs no failed pass and no failed metric;
//! 5. a requested authority trial without a matching promotion is rolled back
//!    and the action falls back to `escalate_hitl`;
//! 6. emit the decision with `retry_attempt` unchanged.
//!
//! Before rule 1, a `retry_attempt` past `max_retries + 1` escalates whatever
//! was proposed.
//!
//! Cross-artifact inconsistencies are never raised: they downgrade to
//! `escalate_hitl` with a reason naming the disagreement. Only structurally
//! broken inputs make `decide` fail.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::action::{DecisionAction, SegmentRetryMode};
use crate::decision::{
    ActionSource, Decision, DecisionBody, DecisionInputs, PolicySnapshot, SegmentRetry,
};
use crate::error::CoreError;
use crate::gate_evaluator::Recommendation;
use crate::invariants;
use crate::promotion::{AuthorityTrial, PromotionDecision};
use crate::quality_report::QualityReport;
use crate::two_pass::{PassStatus, TwoPassAssessment};
use crate::types::{AttemptSeq, JobId};
use crate::versions;

/// Quality policy assumed when a job does not override it.
pub const DEFAULT_QUALITY_POLICY: &str = "quality_policy.v1";


// ---------------------------------------------------------------------------
// RetryPolicy document
// ---------------------------------------------------------------------------

/// Which artifact proposes the action for a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrchestrationMode {
    /// The gate evaluator proposes; the two-pass assessment cross-checks.
    SingleReport,
    /// The two-pass assessor's `next_preferred_action` proposes.
    #[default]
    TwoPass,
}

/// Per-job retry budget and routing config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct RetryPolicy {
    pub version: String,
    #[validate(length(min = 1))]
    pub job_id: JobId,
    pub max_retries: u32,
    pub retry_attempt: u32,
    #[serde(default)]
    pub orchestration_mode: OrchestrationMode,
    #[serde(default)]
    pub segment_retry: SegmentRetry,
    #[serde(default)]
    pub authority_trial_enabled: bool,
    /// Job-level override of the active quality-policy version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_policy: Option<String>,
}

impl RetryPolicy {
    pub fn check(&self) -> Result<(), CoreError> {
        versions::ensure_version(&self.version, versions::RETRY_POLICY)?;
        Validate::validate(self).map_err(|e| CoreError::Validation(e.to_string()))
    }

    pub fn active_quality_policy(&self) -> &str {
        self.quality_policy
            .as_deref()
            .unwrap_or(DEFAULT_QUALITY_POLICY)
    }

    pub fn budget_exhausted(&self) -> bool {
        self.retry_attempt > self.max_retries
    }

    /// `retry_attempt` past `max_retries + 1`: the scheduler kept retrying
    /// after the budget was spent.
    pub fn attempt_overshoots_budget(&self) -> bool {
        attempt_overshoots(self.retry_attempt, self.max_retries)
    }
}

/// `retry_attempt <= max_retries + 1` must hold for every cycle.
pub fn attempt_overshoots(retry_attempt: u32, max_retries: u32) -> bool {
    u64::from(retry_attempt) > u64::from(max_retries) + 1
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Snapshot of everything one evaluation cycle reads.
#[derive(Debug, Clone, Copy)]
pub struct DecisionInput<'a> {
    pub attempt_seq: AttemptSeq,
    pub recommendation: &'a Recommendation,
    pub quality_report: &'a QualityReport,
    pub two_pass: &'a TwoPassAssessment,
    pub policy: &'a RetryPolicy,
    pub promotion: Option<&'a PromotionDecision>,
    pub inputs: &'a DecisionInputs,
}

/// Intermediate state threaded through the transition rules.
struct Step {
    action: DecisionAction,
    reason: String,
    segment_retry: SegmentRetry,
}

impl Step {
    fn escalate(reason: String) -> Self {
        Self {
            action: DecisionAction::EscalateHitl,
            reason,
            segment_retry: SegmentRetry::none(),
        }
    }
}

/// Produce the authoritative decision for one cycle.
pub fn decide(input: DecisionInput<'_>) -> Result<Decision, CoreError> {
    check_structure(&input)?;

    let policy = input.policy;
    let (proposed, source, proposal_reason) = match policy.orchestration_mode {
        OrchestrationMode::SingleReport => (
            input.recommendation.action,
            ActionSource::GateEvaluator,
            input.recommendation.reason.clone(),
        ),
        OrchestrationMode::TwoPass => {
            let next = input.two_pass.orchestration.next_preferred_action;
            (next, ActionSource::TwoPass, two_pass_reason(input.two_pass, next))
        }
    };

    let step = apply_rules(proposed, proposal_reason, &input);

    // Rule 5: authority trial gating.
    let trial = AuthorityTrial::resolve(
        policy.authority_trial_enabled,
        input.promotion,
        policy.active_quality_policy(),
    );
    let proposed_action = step.action;
    let step = if trial.enabled && trial.rollback {
        tracing::warn!(
            job_id = %policy.job_id,
            quality_policy = policy.active_quality_policy(),
            observed_action = %proposed_action,
            "Authority trial not promoted; advisory outcome is observational only",
        );
        Step::escalate(format!(
            "authority trial rolled back: policy '{}' has no promoting decision; observed {proposed_action} ({})",
            policy.active_quality_policy(),
            step.reason
        ))
    } else {
        step
    };

    // Rule 6: emit.
    let decision = Decision {
        version: versions::RETRY_DECISION.to_string(),
        job_id: policy.job_id.clone(),
        attempt_seq: input.attempt_seq,
        policy: PolicySnapshot {
            max_retries: policy.max_retries,
            retry_attempt: policy.retry_attempt,
            authority_trial_enabled: trial.enabled,
            authority_trial_rollback: trial.rollback,
            quality_policy: policy.active_quality_policy().to_string(),
        },
        decision: DecisionBody {
            action: step.action,
            proposed_action,
            source,
            reason: step.reason,
        },
        segment_retry: step.segment_retry,
        inputs: input.inputs.clone(),
    };

    let check = invariants::check_decision(&decision);
    if !check.is_valid {
        return Err(CoreError::Internal(format!(
            "engine produced an inconsistent decision:\n{}",
            check.render()
        )));
    }

    tracing::info!(
        job_id = %decision.job_id,
        attempt_seq = decision.attempt_seq,
        action = %decision.action(),
        proposed = %proposed_action,
        retry_attempt = policy.retry_attempt,
        max_retries = policy.max_retries,
        "Decision emitted",
    );
    Ok(decision)
}

/// Fatal input errors: wrong versions, invalid policy, mismatched jobs.
fn check_structure(input: &DecisionInput<'_>) -> Result<(), CoreError> {
    input.policy.check()?;
    input.quality_report.validate()?;
    input.two_pass.validate()?;
    if let Some(promotion) = input.promotion {
        promotion.validate()?;
    }

    let job_id = &input.policy.job_id;
    for (artifact, other) in [
        ("quality_report", input.quality_report.job_id.as_ref()),
        ("two_pass_assessment", input.two_pass.job_id.as_ref()),
    ] {
        if let Some(other) = other {
            if other != job_id {
                return Err(CoreError::Validation(format!(
                    "{artifact} belongs to job '{other}', retry policy to job '{job_id}'"
                )));
            }
        }
    }
    Ok(())
}

/// Rules 1-4. Exhaustive over the proposed action.
fn apply_rules(proposed: DecisionAction, reason: String, input: &DecisionInput<'_>) -> Step {
    let policy = input.policy;
    let two_pass = input.two_pass;

    if policy.attempt_overshoots_budget() {
        tracing::warn!(
            job_id = %policy.job_id,
            retry_attempt = policy.retry_attempt,
            max_retries = policy.max_retries,
            proposed = %proposed,
            "Retry attempt counter past budget",
        );
        return Step::escalate(format!(
            "retry_attempt {} exceeds max_retries + 1 ({}); attempt counter is inconsistent (proposed {proposed})",
            policy.retry_attempt,
            u64::from(policy.max_retries) + 1
        ));
    }

    // Rule 1: budget exhausted overrides any retry recommendation.
    if proposed.is_retry() && policy.budget_exhausted() {
        tracing::warn!(
            job_id = %policy.job_id,
            retry_attempt = policy.retry_attempt,
            max_retries = policy.max_retries,
            "Retry budget exhausted",
        );
        return Step::escalate(format!(
            "retry budget exhausted: retry_attempt {} > max_retries {} (proposed {proposed})",
            policy.retry_attempt, policy.max_retries
        ));
    }

    match proposed {
        // Rule 2
        DecisionAction::RetryMotion => {
            if two_pass.motion_status() != PassStatus::Fail {
                return inconsistent(proposed, "motion", two_pass.motion_status(), &policy.job_id);
            }
            Step {
                action: proposed,
                reason,
                segment_retry: resolve_segments(input.quality_report, policy),
            }
        }
        // Rule 3
        DecisionAction::RetryRecast | DecisionAction::BlockForCostume => {
            if two_pass.identity_status() != PassStatus::Fail {
                return inconsistent(
                    proposed,
                    "identity",
                    two_pass.identity_status(),
                    &policy.job_id,
                );
            }
            Step {
                action: proposed,
                reason,
                segment_retry: SegmentRetry::none(),
            }
        }
        // Rule 4
        DecisionAction::ProceedFinalize => {
            if !two_pass.no_pass_failed() {
                let failed = if two_pass.motion_status() == PassStatus::Fail {
                    "motion"
                } else {
                    "identity"
                };
                tracing::warn!(job_id = %policy.job_id, pass = failed, "Finalize contradicted by two-pass");
                return Step::escalate(format!(
                    "inconsistent signals: proceed_finalize proposed but {failed} pass failed"
                ));
            }
            let failed_metrics = input.quality_report.failed_metric_names();
            if !failed_metrics.is_empty() {
                tracing::warn!(job_id = %policy.job_id, "Finalize contradicted by quality report");
                return Step::escalate(format!(
                    "inconsistent signals: proceed_finalize proposed but {} metrics failed",
                    failed_metrics.len()
                ));
            }
            Step {
                action: proposed,
                reason,
                segment_retry: SegmentRetry::none(),
            }
        }
        DecisionAction::EscalateHitl => Step::escalate(reason),
    }
}

fn inconsistent(proposed: DecisionAction, pass: &str, status: PassStatus, job_id: &str) -> Step {
    tracing::warn!(
        job_id = %job_id,
        proposed = %proposed,
        pass,
        status = status.as_str(),
        "Advisory action contradicted by two-pass assessment",
    );
    Step::escalate(format!(
        "inconsistent signals: {proposed} proposed but {pass} pass is {}",
        status.as_str()
    ))
}

/// Failing segments from the report win; otherwise a configured selection;
/// otherwise every segment.
fn resolve_segments(report: &QualityReport, policy: &RetryPolicy) -> SegmentRetry {
    let failing = report.failing_segments();
    if !failing.is_empty() {
        return SegmentRetry::selected(failing);
    }
    let configured = &policy.segment_retry;
    if configured.mode == SegmentRetryMode::RetrySelected && !configured.target_segments.is_empty()
    {
        return configured.clone();
    }
    SegmentRetry::all()
}

fn two_pass_reason(assessment: &TwoPassAssessment, next: DecisionAction) -> String {
    let mut reason = format!(
        "two-pass prefers {next} (motion={}, identity={})",
        assessment.motion_status().as_str(),
        assessment.identity_status().as_str()
    );
    for (pass, verdict) in [
        ("motion", &assessment.passes.motion),
        ("identity", &assessment.passes.identity),
    ] {
        if let Some(note) = &verdict.reason {
            reason.push_str(&format!("; {pass}: {note}"));
        }
    }
    reason
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::config::EngineConfig;
    use crate::gate_evaluator::evaluate_report;
    use crate::promotion::fixtures::promotion;
    use crate::quality_report::fixtures::report;
    use crate::quality_report::SegmentScore;
    use crate::two_pass::fixtures::assessment;

    fn policy(max_retries: u32, retry_attempt: u32) -> RetryPolicy {
        RetryPolicy {
            version: versions::RETRY_POLICY.to_string(),
            job_id: "job-1".to_string(),
            max_retries,
            retry_attempt,
            orchestration_mode: OrchestrationMode::TwoPass,
            segment_retry: SegmentRetry::none(),
            authority_trial_enabled: false,
            quality_policy: None,
        }
    }

    fn inputs() -> DecisionInputs {
        DecisionInputs {
            quality_report_relpath: "quality_report.json".to_string(),
            two_pass_orchestration_relpath: "two_pass_assessment.json".to_string(),
            promotion_decision_relpath: None,
        }
    }

    fn run(
        report: &QualityReport,
        two_pass: &TwoPassAssessment,
        policy: &RetryPolicy,
        promotion: Option<&PromotionDecision>,
    ) -> Result<Decision, CoreError> {
        let recommendation = evaluate_report(report, &EngineConfig::default());
        decide(DecisionInput {
            attempt_seq: 1,
            recommendation: &recommendation,
            quality_report: report,
            two_pass,
            policy,
            promotion,
            inputs: &inputs(),
        })
    }

    fn motion_failure() -> (QualityReport, TwoPassAssessment) {
        (
            report(&[("temporal_stability", false), ("identity_consistency", true)]),
            assessment(PassStatus::Fail, PassStatus::Pass, DecisionAction::RetryMotion),
        )
    }

    // -- rule 1: budget -------------------------------------------------------

    #[test]
    fn motion_failure_within_budget_retries_all_segments() {
        let (r, a) = motion_failure();
        let d = run(&r, &a, &policy(2, 0), None).unwrap();
        assert_eq!(d.action(), DecisionAction::RetryMotion);
        assert_eq!(d.segment_retry.mode, SegmentRetryMode::RetryAll);
        assert_eq!(d.policy.retry_attempt, 0);
    }

    #[test]
    fn attempt_beyond_budget_escalates() {
        let (r, a) = motion_failure();
        let d = run(&r, &a, &policy(2, 3), None).unwrap();
        assert_eq!(d.action(), DecisionAction::EscalateHitl);
        assert!(d.decision.reason.contains("budget exhausted"));
    }

    #[test]
    fn attempt_equal_to_max_is_last_allowed_retry() {
        let (r, a) = motion_failure();
        let actions: Vec<_> = (0..=3)
            .map(|attempt| run(&r, &a, &policy(2, attempt), None).unwrap().action())
            .collect();
        assert_eq!(
            actions,
            vec![
                DecisionAction::RetryMotion,
                DecisionAction::RetryMotion,
                DecisionAction::RetryMotion,
                DecisionAction::EscalateHitl,
            ]
        );
    }

    #[test]
    fn exhausted_budget_does_not_block_finalize() {
        let r = report(&[("loop_seam", true)]);
        let a = assessment(PassStatus::Pass, PassStatus::Pass, DecisionAction::ProceedFinalize);
        let d = run(&r, &a, &policy(2, 3), None).unwrap();
        assert_eq!(d.action(), DecisionAction::ProceedFinalize);
    }

    #[test]
    fn attempt_counter_past_budget_escalates_finalize() {
        let r = report(&[("loop_seam", true)]);
        let a = assessment(PassStatus::Pass, PassStatus::Pass, DecisionAction::ProceedFinalize);
        let d = run(&r, &a, &policy(2, 7), None).unwrap();
        assert_eq!(d.action(), DecisionAction::EscalateHitl);
        assert_eq!(d.decision.proposed_action, DecisionAction::EscalateHitl);
        assert!(d.decision.reason.contains("exceeds max_retries + 1"));
    }

    // -- rule 2: motion routing -----------------------------------------------

    #[test]
    fn failing_segments_from_report_are_targeted() {
        let (mut r, a) = motion_failure();
        r.segments = vec![
            SegmentScore {
                segment_id: "seg_01".to_string(),
                pass: true,
            },
            SegmentScore {
                segment_id: "seg_03".to_string(),
                pass: false,
            },
        ];
        let d = run(&r, &a, &policy(2, 0), None).unwrap();
        assert_eq!(d.segment_retry, SegmentRetry::selected(vec!["seg_03".to_string()]));
    }

    #[test]
    fn configured_selection_is_used_without_report_segments() {
        let (r, a) = motion_failure();
        let mut p = policy(2, 0);
        p.segment_retry = SegmentRetry::selected(vec!["seg_02".to_string()]);
        let d = run(&r, &a, &p, None).unwrap();
        assert_eq!(d.segment_retry.target_segments, vec!["seg_02".to_string()]);
    }

    #[test]
    fn retry_motion_with_passing_motion_escalates() {
        let r = report(&[("loop_seam", false)]);
        let a = assessment(PassStatus::Pass, PassStatus::Pass, DecisionAction::RetryMotion);
        let d = run(&r, &a, &policy(2, 0), None).unwrap();
        assert_eq!(d.action(), DecisionAction::EscalateHitl);
        assert_eq!(d.decision.proposed_action, DecisionAction::EscalateHitl);
        assert!(d.decision.reason.contains("motion pass is pass"));
    }

    // -- rule 3: identity cross-check -----------------------------------------

    #[test]
    fn recast_requires_identity_failure() {
        let r = report(&[("identity_consistency", false)]);
        let ok = assessment(PassStatus::Pass, PassStatus::Fail, DecisionAction::RetryRecast);
        assert_eq!(
            run(&r, &ok, &policy(2, 0), None).unwrap().action(),
            DecisionAction::RetryRecast
        );
        let disagree = assessment(PassStatus::Pass, PassStatus::Unknown, DecisionAction::RetryRecast);
        assert_eq!(
            run(&r, &disagree, &policy(2, 0), None).unwrap().action(),
            DecisionAction::EscalateHitl
        );
    }

    #[test]
    fn costume_block_passes_through_with_identity_failure() {
        let r = report(&[("costume_consistency", false)]);
        let a = assessment(PassStatus::Pass, PassStatus::Fail, DecisionAction::BlockForCostume);
        let d = run(&r, &a, &policy(0, 1), None).unwrap();
        assert_eq!(d.action(), DecisionAction::BlockForCostume);
        assert_eq!(d.segment_retry.mode, SegmentRetryMode::None);
    }

    #[test]
    fn costume_block_with_overshot_counter_escalates() {
        let r = report(&[("costume_consistency", false)]);
        let a = assessment(PassStatus::Pass, PassStatus::Fail, DecisionAction::BlockForCostume);
        let d = run(&r, &a, &policy(0, 4), None).unwrap();
        assert_eq!(d.action(), DecisionAction::EscalateHitl);
        assert!(d.decision.reason.contains("attempt counter is inconsistent"));
    }

    // -- rule 4: finalize -----------------------------------------------------

    #[test]
    fn finalize_with_failed_pass_escalates() {
        let r = report(&[("loop_seam", true)]);
        let a = assessment(PassStatus::Pass, PassStatus::Fail, DecisionAction::ProceedFinalize);
        let d = run(&r, &a, &policy(2, 0), None).unwrap();
        assert_eq!(d.action(), DecisionAction::EscalateHitl);
        assert!(d.decision.reason.contains("identity pass failed"));
    }

    #[test]
    fn finalize_with_failed_metric_escalates() {
        let r = report(&[("loop_seam", false)]);
        let a = assessment(PassStatus::Pass, PassStatus::Pass, DecisionAction::ProceedFinalize);
        let d = run(&r, &a, &policy(2, 0), None).unwrap();
        assert_eq!(d.action(), DecisionAction::EscalateHitl);
    }

    // -- single-report mode ---------------------------------------------------

    #[test]
    fn single_report_mode_uses_gate_recommendation() {
        let r = report(&[("temporal_stability", false), ("loop_seam", false)]);
        // Assessor advises escalation, but in single-report mode it only cross-checks.
        let a = assessment(PassStatus::Fail, PassStatus::Pass, DecisionAction::EscalateHitl);
        let mut p = policy(2, 1);
        p.orchestration_mode = OrchestrationMode::SingleReport;
        let d = run(&r, &a, &p, None).unwrap();
        assert_eq!(d.action(), DecisionAction::RetryMotion);
        assert_eq!(d.decision.source, ActionSource::GateEvaluator);
        assert!(d.decision.reason.contains("loop_seam"));
    }

    // -- rule 5: authority trial ----------------------------------------------

    #[test]
    fn unpromoted_trial_rolls_back_to_escalation() {
        let (r, a) = motion_failure();
        let mut p = policy(2, 0);
        p.authority_trial_enabled = true;
        let d = run(&r, &a, &p, None).unwrap();
        assert_eq!(d.action(), DecisionAction::EscalateHitl);
        assert_eq!(d.decision.proposed_action, DecisionAction::RetryMotion);
        assert!(d.policy.authority_trial_enabled);
        assert!(d.policy.authority_trial_rollback);
        assert_eq!(d.segment_retry.mode, SegmentRetryMode::None);
    }

    #[test]
    fn promoted_trial_acts_on_advisory_outcome() {
        let (r, a) = motion_failure();
        let mut p = policy(2, 0);
        p.authority_trial_enabled = true;
        p.quality_policy = Some("quality_policy.v2".to_string());
        let promoted = promotion(true, "quality_policy.v2");
        let d = run(&r, &a, &p, Some(&promoted)).unwrap();
        assert_eq!(d.action(), DecisionAction::RetryMotion);
        assert!(!d.policy.authority_trial_rollback);
        assert_eq!(d.policy.quality_policy, "quality_policy.v2");
    }

    #[test]
    fn promotion_for_other_policy_version_does_not_count() {
        let (r, a) = motion_failure();
        let mut p = policy(2, 0);
        p.authority_trial_enabled = true;
        let promoted = promotion(true, "quality_policy.v2");
        let d = run(&r, &a, &p, Some(&promoted)).unwrap();
        assert!(d.policy.authority_trial_rollback);
        assert_eq!(d.action(), DecisionAction::EscalateHitl);
    }

    #[test]
    fn no_trial_means_no_rollback_flag() {
        let (r, a) = motion_failure();
        let d = run(&r, &a, &policy(2, 0), None).unwrap();
        assert!(!d.policy.authority_trial_enabled);
        assert!(!d.policy.authority_trial_rollback);
    }

    // -- structural failures --------------------------------------------------

    #[test]
    fn mismatched_job_ids_are_fatal() {
        let (r, mut a) = motion_failure();
        a.job_id = Some("job-9".to_string());
        let err = run(&r, &a, &policy(2, 0), None).unwrap_err();
        assert_matches!(err, CoreError::Validation(_));
    }

    #[test]
    fn large_retry_budget_is_accepted() {
        let (r, a) = motion_failure();
        let d = run(&r, &a, &policy(11, 0), None).unwrap();
        assert_eq!(d.action(), DecisionAction::RetryMotion);
        assert_eq!(d.policy.max_retries, 11);
    }

    #[test]
    fn policy_document_defaults() {
        let p: RetryPolicy = serde_json::from_value(serde_json::json!({
            "version": "retry_policy.v1",
            "job_id": "job-1",
            "max_retries": 2,
            "retry_attempt": 0
        }))
        .unwrap();
        assert!(p.check().is_ok());
        assert_eq!(p.orchestration_mode, OrchestrationMode::TwoPass);
        assert_eq!(p.segment_retry.mode, SegmentRetryMode::None);
        assert_eq!(p.active_quality_policy(), DEFAULT_QUALITY_POLICY);
    }

    #[test]
    fn negative_retry_attempt_is_a_structural_error() {
        let parsed = serde_json::from_value::<RetryPolicy>(serde_json::json!({
            "version": "retry_policy.v1",
            "job_id": "job-1",
            "max_retries": 2,
            "retry_attempt": -1
        }));
        assert!(parsed.is_err());
    }
}
