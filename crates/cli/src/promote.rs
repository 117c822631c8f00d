//! Offline policy promotion: benchmark + gate thresholds -> decision.

use std::path::Path;

use qcgate_core::invariants;
use qcgate_core::promotion::{self, PromotionDecision};
use qcgate_store::intake;
use qcgate_store::layout;
use qcgate_store::writer;

use crate::validate::ensure_valid;

/// Compute and write a promotion decision.
///
/// Input paths are recorded relative to the output file's directory. A
/// decision not to promote is still a successful run.
pub async fn run_promote(
    benchmark_path: &Path,
    policy_path: &Path,
    out: &Path,
) -> anyhow::Result<PromotionDecision> {
    let benchmark = intake::load_benchmark(benchmark_path).await?;
    let policy = intake::load_promotion_gate_policy(policy_path).await?;

    let base = out.parent().unwrap_or_else(|| Path::new(""));
    let decision = promotion::evaluate(
        &benchmark,
        &policy,
        &layout::relpath(base, benchmark_path),
        &layout::relpath(base, policy_path),
    )?;
    ensure_valid(&[invariants::check_promotion_decision(
        &decision,
        Some(&policy),
        Some(&benchmark),
    )])?;
    writer::write_json(out, &decision).await?;

    tracing::info!(
        policy_version = %decision.policy_version,
        promote = decision.decision.promote,
        alignment_lift = decision.inputs.alignment_lift,
        out = %out.display(),
        "Promotion decision written",
    );
    Ok(decision)
}
