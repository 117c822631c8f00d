//! Command-line surface of the `qcgate` binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "qcgate",
    version,
    about = "QC decision and promotion engine for rendered video attempts"
)]
pub struct Cli {
    /// Log output format; overrides QCGATE_LOG_FORMAT.
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormatArg>,

    /// Failed-metric names cited per reason; overrides QCGATE_REASON_METRIC_LIMIT.
    #[arg(long, global = true)]
    pub reason_metric_limit: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one evaluation cycle for a job directory.
    Evaluate {
        /// Directory holding quality_report.json, two_pass_assessment.json
        /// and retry_policy.json.
        #[arg(long)]
        job_dir: PathBuf,

        /// Monotonic attempt number; defaults to retry_attempt + 1.
        #[arg(long)]
        attempt_seq: Option<u64>,

        /// Promotion decision consulted when the authority trial is enabled.
        #[arg(long)]
        promotion_decision: Option<PathBuf>,
    },

    /// Evaluate every job directory under a root.
    EvaluateBatch {
        #[arg(long)]
        root: PathBuf,

        /// Jobs evaluated at once; overrides QCGATE_BATCH_CONCURRENCY.
        #[arg(long)]
        concurrency: Option<usize>,

        #[arg(long)]
        promotion_decision: Option<PathBuf>,
    },

    /// Rewrite finalize_gate.json from the recorded retry decision.
    FinalizeGate {
        #[arg(long)]
        job_dir: PathBuf,
    },

    /// Compare a benchmark against promotion thresholds.
    Promote {
        #[arg(long)]
        benchmark: PathBuf,

        /// Promotion gate policy document.
        #[arg(long)]
        policy: PathBuf,

        /// Where to write the promotion decision.
        #[arg(long)]
        out: PathBuf,
    },

    /// Check persisted artifacts against their invariants.
    Validate {
        /// Check every artifact in this job directory.
        #[arg(long, conflicts_with = "promotion_decision")]
        job_dir: Option<PathBuf>,

        /// Check a promotion decision instead.
        #[arg(long, required_unless_present = "job_dir")]
        promotion_decision: Option<PathBuf>,

        /// Gate policy to recompute the promotion verdict against.
        #[arg(long, requires = "promotion_decision")]
        policy: Option<PathBuf>,

        /// Benchmark to recompute from; defaults to the decision's
        /// recorded `benchmark_relpath`.
        #[arg(long, requires = "promotion_decision")]
        benchmark: Option<PathBuf>,
    },
}
