//! Re-derive a job's finalize gate from its recorded decision.

use qcgate_core::finalize_gate::{self, FinalizeGateRecord};
use qcgate_core::invariants;
use qcgate_store::intake;
use qcgate_store::layout::JobPaths;
use qcgate_store::writer;

use crate::validate::ensure_valid;

/// Rewrite `finalize_gate.json` from `retry_decision.json`.
///
/// The gate never looks at anything but the decision, so running this
/// after a manual decision edit brings the gate back in line.
pub async fn refresh_gate(job: &JobPaths) -> anyhow::Result<FinalizeGateRecord> {
    let decision = intake::load_decision(&job.decision()).await?;
    ensure_valid(&[invariants::check_decision(&decision)])?;

    let gate = finalize_gate::derive(&decision);
    ensure_valid(&[invariants::check_finalize_gate(&gate, Some(&decision))])?;
    writer::write_json(&job.finalize_gate(), &gate).await?;

    tracing::info!(
        job_id = %gate.job_id,
        attempt_seq = gate.source.attempt_seq,
        allow_finalize = gate.gate.allow_finalize,
        "Finalize gate written",
    );
    Ok(gate)
}
