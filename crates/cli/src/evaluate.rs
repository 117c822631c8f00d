//! One evaluation cycle for one job directory.
//!
//! Reads the three cycle inputs, runs the gate evaluator and the retry
//! policy engine, records the decision in the job's lineage, then writes
//! the decision and the finalize gate derived from it. Everything written
//! is re-checked before the cycle reports success.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use qcgate_core::action::DecisionAction;
use qcgate_core::config::EngineConfig;
use qcgate_core::decision::{ActionSource, DecisionInputs};
use qcgate_core::finalize_gate;
use qcgate_core::gate_evaluator;
use qcgate_core::invariants;
use qcgate_core::lineage::AppendOutcome;
use qcgate_core::promotion::PromotionDecision;
use qcgate_core::retry_policy::{self, DecisionInput};
use qcgate_core::types::{AttemptSeq, JobId};
use qcgate_store::intake;
use qcgate_store::layout::{self, JobPaths};
use qcgate_store::lineage_store;
use qcgate_store::writer;

use crate::validate::ensure_valid;

/// A promotion decision together with where it was read from.
#[derive(Debug, Clone)]
pub struct LoadedPromotion {
    pub path: PathBuf,
    pub decision: PromotionDecision,
}

impl LoadedPromotion {
    pub async fn load(path: &Path) -> anyhow::Result<Self> {
        let decision = intake::load_promotion_decision(path)
            .await
            .with_context(|| format!("loading promotion decision {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            decision,
        })
    }
}

/// What one cycle decided, printed as a JSON line on stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    pub job_id: JobId,
    pub attempt_seq: AttemptSeq,
    pub action: DecisionAction,
    pub proposed_action: DecisionAction,
    pub source: ActionSource,
    pub reason: String,
    /// `false` when this attempt was already recorded and the run was a replay.
    pub lineage_appended: bool,
    pub allow_finalize: bool,
}

/// Run one evaluation cycle.
///
/// `attempt_seq` defaults to `retry_attempt + 1` from the job's retry
/// policy, which is unique per cycle as long as the scheduler bumps
/// `retry_attempt` before every re-render.
pub async fn evaluate_job(
    job: &JobPaths,
    attempt_seq: Option<AttemptSeq>,
    promotion: Option<&LoadedPromotion>,
    engine: &EngineConfig,
) -> anyhow::Result<EvaluationSummary> {
    let report = intake::load_quality_report(&job.quality_report()).await?;
    let two_pass = intake::load_two_pass_assessment(&job.two_pass()).await?;
    let policy = intake::load_retry_policy(&job.retry_policy()).await?;

    let attempt_seq = attempt_seq.unwrap_or(u64::from(policy.retry_attempt) + 1);
    tracing::debug!(
        job_id = %policy.job_id,
        attempt_seq,
        retry_attempt = policy.retry_attempt,
        max_retries = policy.max_retries,
        "Evaluating job",
    );

    let recommendation = gate_evaluator::evaluate_report(&report, engine);
    let inputs = DecisionInputs {
        quality_report_relpath: layout::relpath(&job.dir, &job.quality_report()),
        two_pass_orchestration_relpath: layout::relpath(&job.dir, &job.two_pass()),
        promotion_decision_relpath: promotion.map(|p| layout::relpath(&job.dir, &p.path)),
    };

    let decision = retry_policy::decide(DecisionInput {
        attempt_seq,
        recommendation: &recommendation,
        quality_report: &report,
        two_pass: &two_pass,
        policy: &policy,
        promotion: promotion.map(|p| &p.decision),
        inputs: &inputs,
    })?;

    // Lineage first: a conflicting replay must not overwrite the decision
    // already on disk.
    let (outcome, lineage) = lineage_store::append(job, &decision).await?;
    writer::write_json(&job.decision(), &decision).await?;

    let gate = finalize_gate::derive(&decision);
    writer::write_json(&job.finalize_gate(), &gate).await?;

    ensure_valid(&[
        invariants::check_decision(&decision),
        invariants::check_lineage(&lineage),
        invariants::check_finalize_gate(&gate, Some(&decision)),
    ])?;

    tracing::info!(
        job_id = %decision.job_id,
        attempt_seq,
        action = %decision.decision.action,
        allow_finalize = gate.gate.allow_finalize,
        replayed = outcome == AppendOutcome::Replayed,
        "Evaluation cycle complete",
    );

    Ok(EvaluationSummary {
        job_id: decision.job_id.clone(),
        attempt_seq,
        action: decision.decision.action,
        proposed_action: decision.decision.proposed_action,
        source: decision.decision.source,
        reason: decision.decision.reason.clone(),
        lineage_appended: outcome == AppendOutcome::Appended,
        allow_finalize: gate.gate.allow_finalize,
    })
}
