//! Promotion of the advisory gate policy to authority.
//!
//! A [`Benchmark`] measures how well advisory recommendations align with a
//! human-labeled baseline; [`evaluate`] compares it against the thresholds of
//! a [`PromotionGatePolicy`]. The resulting [`PromotionDecision`] is the only
//! thing that can clear an authority trial's rollback flag
//! (see [`AuthorityTrial::resolve`]).

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::threshold_validation::validate_signed_unit_range;
use crate::types::JobId;
use crate::versions;

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    /// Advisory agreement rate minus baseline agreement rate; may be negative.
    pub alignment_lift: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Benchmark {
    pub version: String,
    /// Quality-policy version the advisory recommendations came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_version: Option<String>,
    pub summary: BenchmarkSummary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sample_job_ids: Vec<JobId>,
}

impl Benchmark {
    pub fn validate(&self) -> Result<(), CoreError> {
        versions::ensure_version(&self.version, versions::BENCHMARK)?;
        validate_signed_unit_range(self.summary.alignment_lift, "summary.alignment_lift")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PromotionThresholds {
    #[validate(range(min = -1.0, max = 1.0))]
    pub min_alignment_lift: f64,
    /// Tolerance floor, typically a small negative number.
    #[validate(range(min = -1.0, max = 1.0))]
    pub max_negative_lift: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1))]
    pub min_sample_size: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PromotionGatePolicy {
    pub version: String,
    /// Quality-policy version this gate promotes.
    #[validate(length(min = 1))]
    pub policy_version: String,
    #[validate(nested)]
    pub thresholds: PromotionThresholds,
}

impl PromotionGatePolicy {
    pub fn check(&self) -> Result<(), CoreError> {
        versions::ensure_version(&self.version, versions::PROMOTION_GATE)?;
        Validate::validate(self).map_err(|e| CoreError::Validation(e.to_string()))
    }
}

/// Why a benchmark was refused promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PromotionBlocker {
    /// The benchmark measured a different quality-policy version.
    PolicyVersionMismatch { benchmarked: String },
    /// Fewer samples than `min_sample_size`; `None` when unreported.
    InsufficientSamples {
        sample_size: Option<u32>,
        min_sample_size: u32,
    },
    BelowMinAlignmentLift,
    BelowMaxNegativeLift,
}

impl PromotionBlocker {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionBlocker::PolicyVersionMismatch { .. } => "policy_version_mismatch",
            PromotionBlocker::InsufficientSamples { .. } => "insufficient_samples",
            PromotionBlocker::BelowMinAlignmentLift => "below_min_alignment_lift",
            PromotionBlocker::BelowMaxNegativeLift => "below_max_negative_lift",
        }
    }

    /// Human-readable line for the decision reason.
    pub fn describe(&self, lift: f64, policy: &PromotionGatePolicy) -> String {
        let t = &policy.thresholds;
        match self {
            PromotionBlocker::PolicyVersionMismatch { benchmarked } => format!(
                "benchmark covers policy '{benchmarked}', gate promotes '{}'",
                policy.policy_version
            ),
            PromotionBlocker::InsufficientSamples {
                sample_size: Some(n),
                min_sample_size,
            } => format!("sample_size {n} below min_sample_size {min_sample_size}"),
            PromotionBlocker::InsufficientSamples {
                sample_size: None,
                min_sample_size,
            } => format!("sample_size missing, min_sample_size {min_sample_size} required"),
            PromotionBlocker::BelowMinAlignmentLift => format!(
                "alignment_lift {lift:.3} below min_alignment_lift {:.3}",
                t.min_alignment_lift
            ),
            PromotionBlocker::BelowMaxNegativeLift => format!(
                "alignment_lift {lift:.3} below max_negative_lift {:.3}",
                t.max_negative_lift
            ),
        }
    }
}

/// `promote` holds exactly when `blockers` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionVerdict {
    pub promote: bool,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blockers: Vec<PromotionBlocker>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionInputs {
    pub benchmark_relpath: String,
    pub promotion_gate_relpath: String,
    pub alignment_lift: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromotionDecision {
    pub version: String,
    pub policy_version: String,
    pub decision: PromotionVerdict,
    pub inputs: PromotionInputs,
}

impl PromotionDecision {
    pub fn validate(&self) -> Result<(), CoreError> {
        versions::ensure_version(&self.version, versions::PROMOTION_DECISION)
    }

    /// `true` only for a promoting decision about `policy_version`.
    pub fn promotes(&self, policy_version: &str) -> bool {
        self.decision.promote && self.policy_version == policy_version
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Every reason `benchmark` may not promote under `policy`, in a fixed order:
/// policy version, sample size, then the two lift bounds.
///
/// The lift bounds are checked as written (`lift >= min_alignment_lift &&
/// lift >= max_negative_lift`) even though `min_alignment_lift` is usually
/// the binding one.
pub fn find_blockers(benchmark: &Benchmark, policy: &PromotionGatePolicy) -> Vec<PromotionBlocker> {
    let lift = benchmark.summary.alignment_lift;
    let thresholds = &policy.thresholds;
    let mut blockers = Vec::new();

    if let Some(benchmarked) = &benchmark.policy_version {
        if benchmarked != &policy.policy_version {
            blockers.push(PromotionBlocker::PolicyVersionMismatch {
                benchmarked: benchmarked.clone(),
            });
        }
    }
    if let Some(min_sample_size) = thresholds.min_sample_size {
        let sample_size = benchmark.summary.sample_size;
        if sample_size.map_or(true, |n| n < min_sample_size) {
            blockers.push(PromotionBlocker::InsufficientSamples {
                sample_size,
                min_sample_size,
            });
        }
    }
    if lift < thresholds.min_alignment_lift {
        blockers.push(PromotionBlocker::BelowMinAlignmentLift);
    }
    if lift < thresholds.max_negative_lift {
        blockers.push(PromotionBlocker::BelowMaxNegativeLift);
    }
    blockers
}

/// Compare a benchmark against the promotion thresholds.
pub fn evaluate(
    benchmark: &Benchmark,
    policy: &PromotionGatePolicy,
    benchmark_relpath: &str,
    promotion_gate_relpath: &str,
) -> Result<PromotionDecision, CoreError> {
    benchmark.validate()?;
    policy.check()?;

    let lift = benchmark.summary.alignment_lift;
    let thresholds = &policy.thresholds;
    let blockers = find_blockers(benchmark, policy);

    let promote = blockers.is_empty();
    let reason = if promote {
        format!(
            "alignment_lift {lift:.3} clears min_alignment_lift {:.3} and max_negative_lift {:.3}",
            thresholds.min_alignment_lift, thresholds.max_negative_lift
        )
    } else {
        blockers
            .iter()
            .map(|b| b.describe(lift, policy))
            .collect::<Vec<_>>()
            .join("; ")
    };

    tracing::info!(
        policy_version = %policy.policy_version,
        alignment_lift = lift,
        promote,
        blockers = blockers.len(),
        reason = %reason,
        "Promotion gate evaluated",
    );

    Ok(PromotionDecision {
        version: versions::PROMOTION_DECISION.to_string(),
        policy_version: policy.policy_version.clone(),
        decision: PromotionVerdict {
            promote,
            reason,
            blockers,
        },
        inputs: PromotionInputs {
            benchmark_relpath: benchmark_relpath.to_string(),
            promotion_gate_relpath: promotion_gate_relpath.to_string(),
            alignment_lift: lift,
        },
    })
}

// ---------------------------------------------------------------------------
// Authority trial
// ---------------------------------------------------------------------------

/// Authority-trial flags carried in a decision's policy snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorityTrial {
    pub enabled: bool,
    pub rollback: bool,
}

impl AuthorityTrial {
    /// Resolve the trial flags for one job.
    ///
    /// A requested trial keeps `rollback = true` until a promoting decision
    /// for the job's active policy version exists.
    pub fn resolve(
        requested: bool,
        promotion: Option<&PromotionDecision>,
        active_policy_version: &str,
    ) -> Self {
        if !requested {
            return Self {
                enabled: false,
                rollback: false,
            };
        }
        let promoted = promotion.is_some_and(|p| p.promotes(active_policy_version));
        Self {
            enabled: true,
            rollback: !promoted,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn benchmark(lift: f64) -> Benchmark {
        Benchmark {
            version: versions::BENCHMARK.to_string(),
            policy_version: None,
            summary: BenchmarkSummary {
                alignment_lift: lift,
                sample_size: Some(120),
            },
            sample_job_ids: Vec::new(),
        }
    }

    pub fn gate_policy(min: f64, floor: f64) -> PromotionGatePolicy {
        PromotionGatePolicy {
            version: versions::PROMOTION_GATE.to_string(),
            policy_version: "quality_policy.v2".to_string(),
            thresholds: PromotionThresholds {
                min_alignment_lift: min,
                max_negative_lift: floor,
                min_sample_size: None,
            },
        }
    }

    pub fn promotion(promote: bool, policy_version: &str) -> PromotionDecision {
        PromotionDecision {
            version: versions::PROMOTION_DECISION.to_string(),
            policy_version: policy_version.to_string(),
            decision: PromotionVerdict {
                promote,
                reason: "fixture".to_string(),
                blockers: if promote {
                    Vec::new()
                } else {
                    vec![PromotionBlocker::BelowMinAlignmentLift]
                },
            },
            inputs: PromotionInputs {
                benchmark_relpath: "benchmark.json".to_string(),
                promotion_gate_relpath: "promotion_gate.json".to_string(),
                alignment_lift: 0.1,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    fn run(lift: f64, min: f64, floor: f64) -> PromotionDecision {
        evaluate(
            &benchmark(lift),
            &gate_policy(min, floor),
            "benchmark.json",
            "promotion_gate.json",
        )
        .unwrap()
    }

    // -- thresholds -----------------------------------------------------------

    #[test]
    fn positive_lift_above_both_bounds_promotes() {
        let d = run(0.10, 0.05, -0.05);
        assert!(d.decision.promote);
        assert_eq!(d.inputs.alignment_lift, 0.10);
        assert_eq!(d.policy_version, "quality_policy.v2");
    }

    #[test]
    fn negative_lift_is_refused() {
        let d = run(-0.10, 0.05, -0.05);
        assert!(!d.decision.promote);
        assert!(d.decision.reason.contains("min_alignment_lift"));
        assert!(d.decision.reason.contains("max_negative_lift"));
    }

    #[test]
    fn mild_negative_lift_above_floor_still_fails_primary_bound() {
        let d = run(-0.02, 0.05, -0.05);
        assert!(!d.decision.promote);
        assert!(d.decision.reason.contains("min_alignment_lift"));
        assert!(!d.decision.reason.contains("max_negative_lift"));
    }

    #[test]
    fn floor_binds_when_it_exceeds_the_primary_bound() {
        let d = run(0.02, 0.0, 0.03);
        assert!(!d.decision.promote);
        assert!(d.decision.reason.contains("max_negative_lift"));
    }

    #[test]
    fn lift_exactly_at_bound_promotes() {
        assert!(run(0.05, 0.05, -0.05).decision.promote);
    }

    // -- supplementary guards -------------------------------------------------

    #[test]
    fn small_sample_is_refused() {
        let mut policy = gate_policy(0.05, -0.05);
        policy.thresholds.min_sample_size = Some(500);
        let d = evaluate(&benchmark(0.2), &policy, "b.json", "p.json").unwrap();
        assert!(!d.decision.promote);
        assert!(d.decision.reason.contains("sample_size 120"));
        assert_eq!(
            d.decision.blockers,
            vec![PromotionBlocker::InsufficientSamples {
                sample_size: Some(120),
                min_sample_size: 500
            }]
        );
    }

    #[test]
    fn benchmark_for_another_policy_is_refused() {
        let mut b = benchmark(0.2);
        b.policy_version = Some("quality_policy.v1".to_string());
        let d = evaluate(&b, &gate_policy(0.05, -0.05), "b.json", "p.json").unwrap();
        assert!(!d.decision.promote);
        assert_eq!(
            d.decision.blockers,
            vec![PromotionBlocker::PolicyVersionMismatch {
                benchmarked: "quality_policy.v1".to_string()
            }]
        );
    }

    #[test]
    fn blockers_serialize_with_a_kind_tag() {
        let d = run(-0.10, 0.05, -0.05);
        let value = serde_json::to_value(&d).unwrap();
        assert_eq!(
            value["decision"]["blockers"],
            serde_json::json!([
                {"kind": "below_min_alignment_lift"},
                {"kind": "below_max_negative_lift"}
            ])
        );
        assert!(run(0.10, 0.05, -0.05).decision.blockers.is_empty());
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let policy = gate_policy(1.5, -0.05);
        assert!(evaluate(&benchmark(0.2), &policy, "b.json", "p.json").is_err());
    }

    #[test]
    fn non_finite_lift_is_rejected() {
        let policy = gate_policy(0.05, -0.05);
        assert!(evaluate(&benchmark(f64::NAN), &policy, "b.json", "p.json").is_err());
    }

    // -- authority trial ------------------------------------------------------

    #[test]
    fn trial_not_requested_has_no_rollback() {
        let t = AuthorityTrial::resolve(false, None, "quality_policy.v2");
        assert_eq!(
            t,
            AuthorityTrial {
                enabled: false,
                rollback: false
            }
        );
    }

    #[test]
    fn trial_without_promotion_rolls_back() {
        let t = AuthorityTrial::resolve(true, None, "quality_policy.v2");
        assert!(t.enabled && t.rollback);
        let refused = promotion(false, "quality_policy.v2");
        assert!(AuthorityTrial::resolve(true, Some(&refused), "quality_policy.v2").rollback);
    }

    #[test]
    fn trial_promoted_for_other_version_rolls_back() {
        let other = promotion(true, "quality_policy.v1");
        assert!(AuthorityTrial::resolve(true, Some(&other), "quality_policy.v2").rollback);
    }

    #[test]
    fn trial_with_matching_promotion_clears_rollback() {
        let p = promotion(true, "quality_policy.v2");
        let t = AuthorityTrial::resolve(true, Some(&p), "quality_policy.v2");
        assert!(t.enabled);
        assert!(!t.rollback);
    }
}
