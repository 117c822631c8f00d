//! Semantic invariant checks for persisted artifacts.
//!
//! Structural problems (missing or mistyped fields) are caught while parsing.
//! The checks here look at cross-field invariants and never stop at the first
//! problem: every violation is collected so an operator can fix a document in
//! one pass.

use serde::Serialize;

use crate::action::{DecisionAction, Resolution, RetryType, SegmentRetryMode};
use crate::decision::Decision;
use crate::finalize_gate::{FinalizeGateRecord, GateStatus};
use crate::lineage::AttemptLineage;
use crate::promotion::{
    find_blockers, Benchmark, PromotionBlocker, PromotionDecision, PromotionGatePolicy,
};
use crate::quality_report::QualityReport;
use crate::retry_policy::attempt_overshoots;
use crate::two_pass::{PassStatus, TwoPassAssessment};
use crate::versions;

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// A single violated invariant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvariantViolation {
    pub field: String,
    pub message: String,
}

/// All invariant violations found in one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub artifact: &'static str,
    pub is_valid: bool,
    pub errors: Vec<InvariantViolation>,
}

impl ValidationResult {
    /// One line per violation, prefixed with the artifact name.
    pub fn render(&self) -> String {
        self.errors
            .iter()
            .map(|v| format!("{}: {}: {}", self.artifact, v.field, v.message))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

struct Collector {
    artifact: &'static str,
    errors: Vec<InvariantViolation>,
}

impl Collector {
    fn new(artifact: &'static str) -> Self {
        Self {
            artifact,
            errors: Vec::new(),
        }
    }

    fn require(&mut self, holds: bool, field: &str, message: impl FnOnce() -> String) {
        if !holds {
            self.errors.push(InvariantViolation {
                field: field.to_string(),
                message: message(),
            });
        }
    }

    fn version(&mut self, actual: &str, expected: &str) {
        self.require(actual == expected, "version", || {
            format!("expected '{expected}', got '{actual}'")
        });
    }

    fn finish(self) -> ValidationResult {
        ValidationResult {
            artifact: self.artifact,
            is_valid: self.errors.is_empty(),
            errors: self.errors,
        }
    }
}

// ---------------------------------------------------------------------------
// Upstream artifacts
// ---------------------------------------------------------------------------

/// `failed_metrics` must equal the failing metrics; `overall.pass` iff none fail.
pub fn check_quality_report(report: &QualityReport) -> ValidationResult {
    let mut c = Collector::new("quality_report");
    c.version(&report.version, versions::QUALITY_REPORT);

    let derived = report.failed_metric_names();
    for name in derived.difference(&report.overall.failed_metrics) {
        c.require(false, "overall.failed_metrics", || {
            format!("metric '{name}' fails but is not listed")
        });
    }
    for name in report.overall.failed_metrics.difference(&derived) {
        let message = if report.metrics.contains_key(name) {
            format!("metric '{name}' is listed but passes")
        } else {
            format!("metric '{name}' is listed but absent from metrics")
        };
        c.require(false, "overall.failed_metrics", || message);
    }
    c.require(
        report.overall.pass == report.overall.failed_metrics.is_empty(),
        "overall.pass",
        || {
            format!(
                "overall.pass is {} but {} metrics are listed as failing",
                report.overall.pass,
                report.overall.failed_metrics.len()
            )
        },
    );
    c.finish()
}

/// The advisory next action must agree with the pass verdicts.
pub fn check_two_pass(assessment: &TwoPassAssessment) -> ValidationResult {
    let mut c = Collector::new("two_pass_assessment");
    c.version(&assessment.version, versions::TWO_PASS_ASSESSMENT);

    let next = assessment.orchestration.next_preferred_action;
    match next {
        DecisionAction::RetryMotion => {
            c.require(
                assessment.motion_status() == PassStatus::Fail,
                "orchestration.next_preferred_action",
                || {
                    format!(
                        "retry_motion requires passes.motion.status=fail, got {}",
                        assessment.motion_status().as_str()
                    )
                },
            );
        }
        DecisionAction::RetryRecast | DecisionAction::BlockForCostume => {
            c.require(
                assessment.identity_status() == PassStatus::Fail,
                "orchestration.next_preferred_action",
                || {
                    format!(
                        "{next} requires passes.identity.status=fail, got {}",
                        assessment.identity_status().as_str()
                    )
                },
            );
        }
        DecisionAction::ProceedFinalize | DecisionAction::EscalateHitl => {}
    }
    c.finish()
}

// ---------------------------------------------------------------------------
// Engine outputs
// ---------------------------------------------------------------------------

pub fn check_decision(decision: &Decision) -> ValidationResult {
    let mut c = Collector::new("retry_decision");
    c.version(&decision.version, versions::RETRY_DECISION);

    let action = decision.action();
    let policy = &decision.policy;
    let segments = &decision.segment_retry;

    c.require(!decision.job_id.is_empty(), "job_id", || {
        "job_id must not be empty".to_string()
    });
    if action.is_retry() {
        c.require(
            policy.retry_attempt <= policy.max_retries,
            "policy.retry_attempt",
            || {
                format!(
                    "{action} with retry_attempt {} exceeds max_retries {}",
                    policy.retry_attempt, policy.max_retries
                )
            },
        );
    }
    if attempt_overshoots(policy.retry_attempt, policy.max_retries) {
        c.require(
            action == DecisionAction::EscalateHitl,
            "policy.retry_attempt",
            || {
                format!(
                    "retry_attempt {} exceeds max_retries + 1 ({}); only escalate_hitl is allowed, got {action}",
                    policy.retry_attempt,
                    u64::from(policy.max_retries) + 1
                )
            },
        );
    }
    if action == DecisionAction::RetryMotion {
        c.require(
            segments.mode != SegmentRetryMode::None,
            "segment_retry.mode",
            || "retry_motion requires segment_retry.mode other than none".to_string(),
        );
    }
    if segments.mode == SegmentRetryMode::RetrySelected {
        c.require(
            !segments.target_segments.is_empty(),
            "segment_retry.target_segments",
            || "retry_selected requires at least one target segment".to_string(),
        );
    }
    c.require(
        !policy.authority_trial_rollback || policy.authority_trial_enabled,
        "policy.authority_trial_rollback",
        || "rollback is set but no authority trial is enabled".to_string(),
    );
    if policy.authority_trial_enabled && policy.authority_trial_rollback {
        c.require(
            action == DecisionAction::EscalateHitl,
            "decision.action",
            || format!("rolled-back authority trial must escalate_hitl, got {action}"),
        );
    }
    c.require(
        !decision.inputs.two_pass_orchestration_relpath.is_empty(),
        "inputs.two_pass_orchestration_relpath",
        || "two-pass assessment pointer must not be empty".to_string(),
    );
    c.finish()
}

pub fn check_lineage(lineage: &AttemptLineage) -> ValidationResult {
    let mut c = Collector::new("attempt_lineage");
    c.version(lineage.version(), versions::ATTEMPT_LINEAGE);
    c.require(!lineage.is_empty(), "attempts", || {
        "lineage must contain at least one attempt".to_string()
    });

    let mut prev_seq = None;
    for (i, entry) in lineage.attempts().iter().enumerate() {
        let field = format!("attempts[{i}]");
        match entry.resolution {
            Resolution::Retry => c.require(
                matches!(entry.retry_type, RetryType::Motion | RetryType::Recast),
                &format!("{field}.retry_type"),
                || "resolution=retry requires retry_type motion or recast".to_string(),
            ),
            Resolution::Finalize | Resolution::Escalate => c.require(
                entry.retry_type == RetryType::None,
                &format!("{field}.retry_type"),
                || {
                    format!(
                        "resolution={} requires retry_type none, got {}",
                        entry.resolution.as_str(),
                        entry.retry_type.as_str()
                    )
                },
            ),
        }
        c.require(
            entry.resolution == entry.action.resolution()
                && entry.retry_type == entry.action.retry_type(),
            &format!("{field}.action"),
            || {
                format!(
                    "action {} does not map to ({}, {})",
                    entry.action,
                    entry.resolution.as_str(),
                    entry.retry_type.as_str()
                )
            },
        );
        if let Some(prev) = prev_seq {
            c.require(
                entry.attempt_seq > prev,
                &format!("{field}.attempt_seq"),
                || format!("attempt_seq {} does not increase past {prev}", entry.attempt_seq),
            );
        }
        prev_seq = Some(entry.attempt_seq);
    }

    if let Err(e) = lineage.verify_chain() {
        c.require(false, "attempts", || e.to_string());
    }
    c.finish()
}

/// Gate invariants; with `decision`, also checks the gate is not stale.
pub fn check_finalize_gate(
    record: &FinalizeGateRecord,
    decision: Option<&Decision>,
) -> ValidationResult {
    let mut c = Collector::new("finalize_gate");
    c.version(&record.version, versions::FINALIZE_GATE);

    let allow = record.gate.allow_finalize;
    c.require(
        allow == (record.source.decision_action == DecisionAction::ProceedFinalize),
        "gate.allow_finalize",
        || {
            format!(
                "allow_finalize={allow} disagrees with source.decision_action={}",
                record.source.decision_action
            )
        },
    );
    c.require(
        (record.gate.status == GateStatus::Pass) == allow,
        "gate.status",
        || format!("status must be pass exactly when allow_finalize, got allow_finalize={allow}"),
    );

    if let Some(decision) = decision {
        c.require(
            record.source.decision_action == decision.action()
                && record.source.attempt_seq == decision.attempt_seq,
            "source",
            || {
                format!(
                    "gate derived from attempt {} ({}), latest decision is attempt {} ({})",
                    record.source.attempt_seq,
                    record.source.decision_action,
                    decision.attempt_seq,
                    decision.action()
                )
            },
        );
        c.require(record.job_id == decision.job_id, "job_id", || {
            format!(
                "gate is for job '{}', decision for job '{}'",
                record.job_id, decision.job_id
            )
        });
    }
    c.finish()
}

/// `promote` must hold exactly when no blocker is recorded.
///
/// With the gate policy, every recorded blocker must be justified by it and
/// the lift-bound blockers must match the recorded lift. With the benchmark
/// as well, the blocker list is recomputed and must match exactly.
pub fn check_promotion_decision(
    decision: &PromotionDecision,
    policy: Option<&PromotionGatePolicy>,
    benchmark: Option<&Benchmark>,
) -> ValidationResult {
    let mut c = Collector::new("promotion_decision");
    c.version(&decision.version, versions::PROMOTION_DECISION);
    c.require(!decision.decision.reason.is_empty(), "decision.reason", || {
        "reason must not be empty".to_string()
    });

    let verdict = &decision.decision;
    let lift = decision.inputs.alignment_lift;
    c.require(
        verdict.promote == verdict.blockers.is_empty(),
        "decision.blockers",
        || {
            if verdict.promote {
                format!("promote=true but {} blockers are recorded", verdict.blockers.len())
            } else {
                "promote=false but no blocker is recorded".to_string()
            }
        },
    );

    if let Some(policy) = policy {
        let t = &policy.thresholds;
        let has = |b: &PromotionBlocker| verdict.blockers.contains(b);
        c.require(
            has(&PromotionBlocker::BelowMinAlignmentLift) == (lift < t.min_alignment_lift),
            "decision.blockers",
            || {
                format!(
                    "below_min_alignment_lift recorded={} but alignment_lift {lift} vs min_alignment_lift {}",
                    has(&PromotionBlocker::BelowMinAlignmentLift),
                    t.min_alignment_lift
                )
            },
        );
        c.require(
            has(&PromotionBlocker::BelowMaxNegativeLift) == (lift < t.max_negative_lift),
            "decision.blockers",
            || {
                format!(
                    "below_max_negative_lift recorded={} but alignment_lift {lift} vs max_negative_lift {}",
                    has(&PromotionBlocker::BelowMaxNegativeLift),
                    t.max_negative_lift
                )
            },
        );
        for blocker in &verdict.blockers {
            let justified = match blocker {
                PromotionBlocker::PolicyVersionMismatch { benchmarked } => {
                    benchmarked != &policy.policy_version
                }
                PromotionBlocker::InsufficientSamples {
                    sample_size,
                    min_sample_size,
                } => {
                    t.min_sample_size == Some(*min_sample_size)
                        && sample_size.map_or(true, |n| n < *min_sample_size)
                }
                PromotionBlocker::BelowMinAlignmentLift
                | PromotionBlocker::BelowMaxNegativeLift => true,
            };
            c.require(justified, "decision.blockers", || {
                format!("{} is not supported by the gate policy", blocker.as_str())
            });
        }
        c.require(
            decision.policy_version == policy.policy_version,
            "policy_version",
            || {
                format!(
                    "decision is for '{}', gate policy promotes '{}'",
                    decision.policy_version, policy.policy_version
                )
            },
        );

        if let Some(benchmark) = benchmark {
            let expected = find_blockers(benchmark, policy);
            c.require(verdict.blockers == expected, "decision.blockers", || {
                let names: Vec<_> = expected.iter().map(PromotionBlocker::as_str).collect();
                format!("benchmark recomputes blockers [{}]", names.join(", "))
            });
        }
    }

    if let Some(benchmark) = benchmark {
        let measured = benchmark.summary.alignment_lift;
        c.require(lift == measured, "inputs.alignment_lift", || {
            format!("recorded {lift}, benchmark reports {measured}")
        });
    }
    c.finish()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
