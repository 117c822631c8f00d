//! Advisory gate evaluation.
//!
//! Classifies the failing metrics of a [`QualityReport`] into failure buckets
//! and maps the highest-priority bucket to a recommended action. The result
//! is non-authoritative: retry budgets and cross-checks are applied later by
//! [`crate::retry_policy::decide`].

use std::collections::BTreeSet;

use crate::action::DecisionAction;
use crate::config::EngineConfig;
use crate::metric_names::{classify_metric, MetricClass};
use crate::quality_report::QualityReport;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Failure bucket that drove a recommendation.
///
/// Priority when several buckets fail: `Unowned` > `Identity` > `Motion` > `Audio`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureBucket {
    None,
    Audio,
    Motion,
    Identity,
    Unowned,
}

impl FailureBucket {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureBucket::None => "none",
            FailureBucket::Audio => "audio",
            FailureBucket::Motion => "motion",
            FailureBucket::Identity => "identity",
            FailureBucket::Unowned => "unowned",
        }
    }
}

/// Non-authoritative output of the gate evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recommendation {
    pub action: DecisionAction,
    pub bucket: FailureBucket,
    pub reason: String,
    /// Every failed metric in the report, sorted.
    pub failed_metrics: Vec<String>,
}

#[derive(Default)]
struct Buckets {
    motion: BTreeSet<String>,
    identity: BTreeSet<String>,
    costume: BTreeSet<String>,
    audio: BTreeSet<String>,
    unowned: BTreeSet<String>,
}

impl Buckets {
    fn classify(failed: &BTreeSet<String>) -> Self {
        let mut buckets = Buckets::default();
        for name in failed {
            let target = match classify_metric(name) {
                Some(MetricClass::Motion) => &mut buckets.motion,
                Some(MetricClass::Identity) => &mut buckets.identity,
                Some(MetricClass::Costume) => &mut buckets.costume,
                Some(MetricClass::Audio) => &mut buckets.audio,
                None => &mut buckets.unowned,
            };
            target.insert(name.clone());
        }
        buckets
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Recommend an action from the report's failing metrics.
///
/// Failures are derived from each metric's `pass` flag, not from
/// `overall.failed_metrics`, so a stale summary cannot hide a failing gate.
pub fn evaluate_report(report: &QualityReport, config: &EngineConfig) -> Recommendation {
    let failed = report.failed_metric_names();
    let buckets = Buckets::classify(&failed);
    let limit = config.reason_metric_limit;

    let (action, bucket, reason) = if failed.is_empty() {
        (
            DecisionAction::ProceedFinalize,
            FailureBucket::None,
            format!("all {} metrics passed", report.metrics.len()),
        )
    } else if !buckets.unowned.is_empty() {
        (
            DecisionAction::EscalateHitl,
            FailureBucket::Unowned,
            format!(
                "failed metrics with no owning class: {}",
                format_metric_list(&buckets.unowned, limit)
            ),
        )
    } else if !buckets.identity.is_empty() || !buckets.costume.is_empty() {
        // Costume-only identity failures need a wardrobe fix, not a recast.
        if buckets.identity.is_empty() {
            (
                DecisionAction::BlockForCostume,
                FailureBucket::Identity,
                format!(
                    "costume-class failures: {}",
                    format_metric_list(&buckets.costume, limit)
                ),
            )
        } else {
            let all: BTreeSet<String> = buckets
                .identity
                .union(&buckets.costume)
                .cloned()
                .collect();
            (
                DecisionAction::RetryRecast,
                FailureBucket::Identity,
                format!(
                    "identity-class failures: {}",
                    format_metric_list(&all, limit)
                ),
            )
        }
    } else if !buckets.motion.is_empty() {
        (
            DecisionAction::RetryMotion,
            FailureBucket::Motion,
            format!(
                "motion-class failures: {}",
                format_metric_list(&buckets.motion, limit)
            ),
        )
    } else {
        (
            DecisionAction::EscalateHitl,
            FailureBucket::Audio,
            format!(
                "audio-class failures need manual review: {}",
                format_metric_list(&buckets.audio, limit)
            ),
        )
    };

    let deferred: BTreeSet<String> = match bucket {
        FailureBucket::Identity => buckets.motion.union(&buckets.audio).cloned().collect(),
        FailureBucket::Motion => buckets.audio.clone(),
        _ => BTreeSet::new(),
    };
    let reason = if deferred.is_empty() {
        reason
    } else {
        format!(
            "{reason}; lower-priority failures: {}",
            format_metric_list(&deferred, limit)
        )
    };

    tracing::debug!(
        action = %action,
        bucket = bucket.as_str(),
        failed_count = failed.len(),
        "Gate evaluation complete",
    );

    Recommendation {
        action,
        bucket,
        reason,
        failed_metrics: failed.into_iter().collect(),
    }
}

/// Join metric names, citing at most `limit` of them.
pub fn format_metric_list(names: &BTreeSet<String>, limit: usize) -> String {
    let shown: Vec<&str> = names.iter().take(limit).map(String::as_str).collect();
    let hidden = names.len().saturating_sub(shown.len());
    if hidden == 0 {
        shown.join(", ")
    } else {
        format!("{} (+{hidden} more)", shown.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quality_report::fixtures::report;

    fn evaluate(metrics: &[(&str, bool)]) -> Recommendation {
        evaluate_report(&report(metrics), &EngineConfig::default())
    }

    // -- single buckets -------------------------------------------------------

    #[test]
    fn all_passing_recommends_finalize() {
        let rec = evaluate(&[("temporal_stability", true), ("identity_consistency", true)]);
        assert_eq!(rec.action, DecisionAction::ProceedFinalize);
        assert_eq!(rec.bucket, FailureBucket::None);
        assert!(rec.failed_metrics.is_empty());
    }

    #[test]
    fn motion_failures_recommend_retry_motion_and_cite_metrics() {
        let rec = evaluate(&[
            ("temporal_stability", false),
            ("loop_seam", false),
            ("identity_consistency", true),
            ("mask_edge_bleed", true),
        ]);
        assert_eq!(rec.action, DecisionAction::RetryMotion);
        assert!(rec.reason.contains("temporal_stability"));
        assert!(rec.reason.contains("loop_seam"));
    }

    #[test]
    fn identity_failure_recommends_recast() {
        let rec = evaluate(&[("identity_consistency", false)]);
        assert_eq!(rec.action, DecisionAction::RetryRecast);
        assert_eq!(rec.bucket, FailureBucket::Identity);
    }

    #[test]
    fn costume_only_failure_blocks_for_costume() {
        let rec = evaluate(&[("costume_consistency", false), ("identity_consistency", true)]);
        assert_eq!(rec.action, DecisionAction::BlockForCostume);
    }

    #[test]
    fn audio_only_failure_escalates() {
        let rec = evaluate(&[("av_sync", false)]);
        assert_eq!(rec.action, DecisionAction::EscalateHitl);
        assert_eq!(rec.bucket, FailureBucket::Audio);
    }

    // -- priority -------------------------------------------------------------

    #[test]
    fn identity_takes_precedence_over_motion() {
        let rec = evaluate(&[("loop_seam", false), ("mask_edge_bleed", false)]);
        assert_eq!(rec.action, DecisionAction::RetryRecast);
        assert!(rec.reason.contains("mask_edge_bleed"));
        assert!(rec.reason.contains("lower-priority failures: loop_seam"));
    }

    #[test]
    fn identity_and_costume_together_recast() {
        let rec = evaluate(&[("identity_consistency", false), ("wardrobe_match", false)]);
        assert_eq!(rec.action, DecisionAction::RetryRecast);
    }

    #[test]
    fn motion_takes_precedence_over_audio() {
        let rec = evaluate(&[("lip_sync", false), ("pose_divergence", false)]);
        assert_eq!(rec.action, DecisionAction::RetryMotion);
        assert_eq!(rec.bucket, FailureBucket::Motion);
    }

    #[test]
    fn unowned_failure_escalates_even_with_known_failures() {
        let rec = evaluate(&[("color_banding", false), ("loop_seam", false)]);
        assert_eq!(rec.action, DecisionAction::EscalateHitl);
        assert_eq!(rec.bucket, FailureBucket::Unowned);
        assert!(rec.reason.contains("color_banding"));
    }

    // -- reason formatting ----------------------------------------------------

    #[test]
    fn metric_list_is_truncated() {
        let names: BTreeSet<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        assert_eq!(format_metric_list(&names, 2), "a, b (+2 more)");
        assert_eq!(format_metric_list(&names, 10), "a, b, c, d");
    }

    #[test]
    fn reason_respects_configured_limit() {
        let rec = evaluate_report(
            &report(&[
                ("temporal_stability", false),
                ("loop_seam", false),
                ("pose_divergence", false),
            ]),
            &EngineConfig {
                reason_metric_limit: 1,
            },
        );
        assert!(rec.reason.contains("(+2 more)"));
        assert_eq!(rec.failed_metrics.len(), 3);
    }

    #[test]
    fn stale_overall_summary_is_ignored() {
        let mut r = report(&[("loop_seam", false)]);
        r.overall.failed_metrics.clear();
        r.overall.pass = true;
        let rec = evaluate_report(&r, &EngineConfig::default());
        assert_eq!(rec.action, DecisionAction::RetryMotion);
    }
}
