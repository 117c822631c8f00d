//! Well-known quality metric names and their failure classes.
//!
//! These must match the metric keys written by the external scorers into
//! `quality_report.json` (`metrics.<name>`).

// ---------------------------------------------------------------------------
// Motion-class metrics
// ---------------------------------------------------------------------------

/// Frame-to-frame stability of the rendered motion.
pub const METRIC_TEMPORAL_STABILITY: &str = "temporal_stability";
/// Visual continuity across the loop point.
pub const METRIC_LOOP_SEAM: &str = "loop_seam";
/// Divergence of the rendered pose track from the driving pose.
pub const METRIC_POSE_DIVERGENCE: &str = "pose_divergence";
/// Jerk / jitter of the motion trajectory.
pub const METRIC_MOTION_SMOOTHNESS: &str = "motion_smoothness";

// ---------------------------------------------------------------------------
// Identity-class metrics
// ---------------------------------------------------------------------------

/// Embedding similarity of the rendered face against the reference character.
pub const METRIC_IDENTITY_CONSISTENCY: &str = "identity_consistency";
/// Bleed of the subject mask into the background at its edges.
pub const METRIC_MASK_EDGE_BLEED: &str = "mask_edge_bleed";
/// Similarity of rendered faces to the reference character.
pub const METRIC_FACE_SIMILARITY: &str = "face_similarity";

/// Costume match against the character's wardrobe reference.
pub const METRIC_COSTUME_CONSISTENCY: &str = "costume_consistency";
/// Wardrobe item presence (accessories, outfit pieces).
pub const METRIC_WARDROBE_MATCH: &str = "wardrobe_match";

// ---------------------------------------------------------------------------
// Audio-class metrics
// ---------------------------------------------------------------------------

/// Audio/video offset.
pub const METRIC_AV_SYNC: &str = "av_sync";
/// Mouth shape alignment with the voice track.
pub const METRIC_LIP_SYNC: &str = "lip_sync";
/// Clipping or dropouts in the mixed audio.
pub const METRIC_AUDIO_CLIPPING: &str = "audio_clipping";

pub const MOTION_METRICS: &[&str] = &[
    METRIC_TEMPORAL_STABILITY,
    METRIC_LOOP_SEAM,
    METRIC_POSE_DIVERGENCE,
    METRIC_MOTION_SMOOTHNESS,
];

pub const IDENTITY_METRICS: &[&str] = &[
    METRIC_IDENTITY_CONSISTENCY,
    METRIC_MASK_EDGE_BLEED,
    METRIC_FACE_SIMILARITY,
];

/// Identity-class metrics whose failure is a wardrobe problem rather than a
/// casting problem.
pub const COSTUME_METRICS: &[&str] = &[METRIC_COSTUME_CONSISTENCY, METRIC_WARDROBE_MATCH];

pub const AUDIO_METRICS: &[&str] = &[METRIC_AV_SYNC, METRIC_LIP_SYNC, METRIC_AUDIO_CLIPPING];

/// Failure class a metric belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricClass {
    Motion,
    Identity,
    Costume,
    Audio,
}

/// Classify a metric name. Returns `None` for metrics with no known owner.
pub fn classify_metric(name: &str) -> Option<MetricClass> {
    if MOTION_METRICS.contains(&name) {
        Some(MetricClass::Motion)
    } else if IDENTITY_METRICS.contains(&name) {
        Some(MetricClass::Identity)
    } else if COSTUME_METRICS.contains(&name) {
        Some(MetricClass::Costume)
    } else if AUDIO_METRICS.contains(&name) {
        Some(MetricClass::Audio)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_metrics_are_classified() {
        assert_eq!(classify_metric("loop_seam"), Some(MetricClass::Motion));
        assert_eq!(
            classify_metric("mask_edge_bleed"),
            Some(MetricClass::Identity)
        );
        assert_eq!(classify_metric("wardrobe_match"), Some(MetricClass::Costume));
        assert_eq!(classify_metric("av_sync"), Some(MetricClass::Audio));
    }

    #[test]
    fn unknown_metric_has_no_class() {
        assert_eq!(classify_metric("color_banding"), None);
    }
}
