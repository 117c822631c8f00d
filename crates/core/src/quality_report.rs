//! Quality Report: scored metrics for one rendered attempt.
//!
//! Produced by the external scorers; this crate only reads it. The per-metric
//! `pass` flags are authoritative, `overall` is a summary that must agree
//! with them (see [`crate::invariants::check_quality_report`]).

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::threshold_validation::validate_unit_range;
use crate::types::JobId;
use crate::versions;

/// A single gate: a metric score compared against its threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricScore {
    pub score: f64,
    pub threshold: f64,
    pub pass: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallScore {
    pub score: f64,
    pub pass: bool,
    pub failed_metrics: BTreeSet<String>,
}

/// Per-segment verdict, present when the scorer evaluates segments
/// independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentScore {
    pub segment_id: String,
    pub pass: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,
    pub metrics: BTreeMap<String, MetricScore>,
    pub overall: OverallScore,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<SegmentScore>,
}

impl QualityReport {
    /// Structural check run right after parsing.
    pub fn validate(&self) -> Result<(), CoreError> {
        versions::ensure_version(&self.version, versions::QUALITY_REPORT)?;
        validate_unit_range(self.overall.score, "overall.score")?;
        for (name, metric) in &self.metrics {
            if !metric.score.is_finite() || !metric.threshold.is_finite() {
                return Err(CoreError::Validation(format!(
                    "metrics.{name} has a non-finite score or threshold"
                )));
            }
        }
        Ok(())
    }

    /// Names of metrics whose `pass` flag is false, derived from `metrics`.
    pub fn failed_metric_names(&self) -> BTreeSet<String> {
        self.metrics
            .iter()
            .filter(|(_, m)| !m.pass)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Segment ids the scorer flagged as failing, in report order.
    pub fn failing_segments(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter(|s| !s.pass)
            .map(|s| s.segment_id.clone())
            .collect()
    }
}
