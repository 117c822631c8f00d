//! Re-check persisted artifacts against their invariants.
//!
//! Every artifact found is checked and every violation is reported; a
//! document that cannot be loaded at all becomes a single `document`
//! violation instead of aborting the run.

use std::fmt::Display;
use std::path::Path;

use qcgate_core::invariants::{self, InvariantViolation, ValidationResult};
use qcgate_store::intake;
use qcgate_store::layout::JobPaths;

/// Fail with every violation of every invalid result, one per line.
pub fn ensure_valid(results: &[ValidationResult]) -> anyhow::Result<()> {
    let rendered: Vec<String> = results
        .iter()
        .filter(|r| !r.is_valid)
        .map(ValidationResult::render)
        .collect();
    if rendered.is_empty() {
        return Ok(());
    }
    anyhow::bail!("invariant violations:\n{}", rendered.join("\n"))
}

fn unreadable(artifact: &'static str, err: impl Display) -> ValidationResult {
    ValidationResult {
        artifact,
        is_valid: false,
        errors: vec![InvariantViolation {
            field: "document".to_string(),
            message: err.to_string(),
        }],
    }
}

async fn exists(path: &Path) -> bool {
    // An unreadable directory entry still counts, so the load reports it.
    tokio::fs::try_exists(path).await.unwrap_or(true)
}

/// Check every artifact present in a job directory.
pub async fn validate_job(job: &JobPaths) -> Vec<ValidationResult> {
    let mut results = Vec::new();

    if exists(&job.quality_report()).await {
        results.push(match intake::load_quality_report(&job.quality_report()).await {
            Ok(report) => invariants::check_quality_report(&report),
            Err(e) => unreadable("quality_report", e),
        });
    }

    if exists(&job.two_pass()).await {
        results.push(match intake::load_two_pass_assessment(&job.two_pass()).await {
            Ok(assessment) => invariants::check_two_pass(&assessment),
            Err(e) => unreadable("two_pass_assessment", e),
        });
    }

    let mut decision = None;
    if exists(&job.decision()).await {
        results.push(match intake::load_decision(&job.decision()).await {
            Ok(d) => {
                let result = invariants::check_decision(&d);
                decision = Some(d);
                result
            }
            Err(e) => unreadable("retry_decision", e),
        });
    }

    if exists(&job.lineage()).await {
        results.push(match intake::load_lineage(&job.lineage()).await {
            Ok(lineage) => invariants::check_lineage(&lineage),
            Err(e) => unreadable("attempt_lineage", e),
        });
    }

    if exists(&job.finalize_gate()).await {
        results.push(match intake::load_finalize_gate(&job.finalize_gate()).await {
            Ok(gate) => invariants::check_finalize_gate(&gate, decision.as_ref()),
            Err(e) => unreadable("finalize_gate", e),
        });
    }

    let invalid = results.iter().filter(|r| !r.is_valid).count();
    tracing::info!(
        job_dir = %job.dir.display(),
        checked = results.len(),
        invalid,
        "Job artifacts validated",
    );
    results
}

/// Check a promotion decision, optionally against the gate policy it was
/// computed from.
///
/// With a policy, the benchmark is reloaded (from `benchmark_path`, or else
/// from the decision's recorded `benchmark_relpath` when that file exists)
/// and the verdict is recomputed.
pub async fn validate_promotion(
    decision_path: &Path,
    policy_path: Option<&Path>,
    benchmark_path: Option<&Path>,
) -> Vec<ValidationResult> {
    let decision = match intake::load_promotion_decision(decision_path).await {
        Ok(d) => d,
        Err(e) => return vec![unreadable("promotion_decision", e)],
    };
    let policy = match policy_path {
        Some(path) => match intake::load_promotion_gate_policy(path).await {
            Ok(p) => Some(p),
            Err(e) => return vec![unreadable("promotion_gate", e)],
        },
        None => None,
    };

    let recorded = decision_path
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(&decision.inputs.benchmark_relpath);
    let benchmark_path = match benchmark_path {
        Some(path) => Some(path.to_path_buf()),
        None if exists(&recorded).await => Some(recorded),
        None => None,
    };
    let benchmark = match benchmark_path {
        Some(path) => match intake::load_benchmark(&path).await {
            Ok(b) => Some(b),
            Err(e) => return vec![unreadable("benchmark", e)],
        },
        None => None,
    };

    vec![invariants::check_promotion_decision(
        &decision,
        policy.as_ref(),
        benchmark.as_ref(),
    )]
}
