//! Metrics intake: load and structurally check versioned JSON artifacts.
//!
//! A document that is missing, unparseable, of the wrong version or fails its
//! structural check is fatal for the evaluation cycle that needs it.

use std::path::Path;

use serde::de::DeserializeOwned;

use qcgate_core::decision::Decision;
use qcgate_core::finalize_gate::FinalizeGateRecord;
use qcgate_core::lineage::AttemptLineage;
use qcgate_core::promotion::{Benchmark, PromotionDecision, PromotionGatePolicy};
use qcgate_core::quality_report::QualityReport;
use qcgate_core::retry_policy::RetryPolicy;
use qcgate_core::two_pass::TwoPassAssessment;
use qcgate_core::versions;

use crate::error::{StoreError, StoreResult};

/// Read and deserialize a JSON document.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Like [`load_json`], but a missing file yields `None`.
pub async fn load_json_opt<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    match tokio::fs::try_exists(path).await {
        Ok(true) => load_json(path).await.map(Some),
        Ok(false) => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

pub async fn load_quality_report(path: &Path) -> StoreResult<QualityReport> {
    let report: QualityReport = load_json(path).await?;
    report.validate()?;
    tracing::debug!(path = %path.display(), metrics = report.metrics.len(), "Quality report loaded");
    Ok(report)
}

pub async fn load_two_pass_assessment(path: &Path) -> StoreResult<TwoPassAssessment> {
    let assessment: TwoPassAssessment = load_json(path).await?;
    assessment.validate()?;
    Ok(assessment)
}

pub async fn load_retry_policy(path: &Path) -> StoreResult<RetryPolicy> {
    let policy: RetryPolicy = load_json(path).await?;
    policy.check()?;
    Ok(policy)
}

pub async fn load_decision(path: &Path) -> StoreResult<Decision> {
    let decision: Decision = load_json(path).await?;
    decision.validate()?;
    Ok(decision)
}

pub async fn load_finalize_gate(path: &Path) -> StoreResult<FinalizeGateRecord> {
    let record: FinalizeGateRecord = load_json(path).await?;
    record.validate()?;
    Ok(record)
}

pub async fn load_lineage(path: &Path) -> StoreResult<AttemptLineage> {
    let lineage: AttemptLineage = load_json(path).await?;
    versions::ensure_version(lineage.version(), versions::ATTEMPT_LINEAGE)?;
    Ok(lineage)
}

pub async fn load_benchmark(path: &Path) -> StoreResult<Benchmark> {
    let benchmark: Benchmark = load_json(path).await?;
    benchmark.validate()?;
    Ok(benchmark)
}

pub async fn load_promotion_gate_policy(path: &Path) -> StoreResult<PromotionGatePolicy> {
    let policy: PromotionGatePolicy = load_json(path).await?;
    policy.check()?;
    Ok(policy)
}

pub async fn load_promotion_decision(path: &Path) -> StoreResult<PromotionDecision> {
    let decision: PromotionDecision = load_json(path).await?;
    decision.validate()?;
    Ok(decision)
}
