//! `qcgate` -- QC decision and promotion engine.
//!
//! Reads per-job scoring artifacts, decides whether to retry, finalize or
//! escalate each rendered attempt, and maintains the job's attempt lineage
//! and finalize gate. Command results are printed as JSON on stdout; logs
//! go to stderr. See [`qcgate_cli::config`] for environment variables.

use std::process::ExitCode;

use clap::Parser;

use qcgate_cli::cli::{Cli, Command, LogFormatArg};
use qcgate_cli::config::{CliConfig, LogFormat};
use qcgate_cli::evaluate::LoadedPromotion;
use qcgate_cli::{batch, evaluate, finalize, logging, promote, validate};
use qcgate_store::layout::JobPaths;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match CliConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("qcgate: invalid configuration: {e:#}");
            return ExitCode::from(2);
        }
    };
    if let Some(format) = cli.log_format {
        config.log_format = match format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        };
    }
    if let Some(limit) = cli.reason_metric_limit {
        config.engine.reason_metric_limit = limit;
    }

    logging::init(config.log_format);

    match run(cli.command, config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("qcgate: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: CliConfig) -> anyhow::Result<ExitCode> {
    match command {
        Command::Evaluate {
            job_dir,
            attempt_seq,
            promotion_decision,
        } => {
            let promotion = match promotion_decision.or(config.promotion_decision) {
                Some(path) => Some(LoadedPromotion::load(&path).await?),
                None => None,
            };
            let summary = evaluate::evaluate_job(
                &JobPaths::new(job_dir),
                attempt_seq,
                promotion.as_ref(),
                &config.engine,
            )
            .await?;
            println!("{}", serde_json::to_string(&summary)?);
            Ok(ExitCode::SUCCESS)
        }

        Command::EvaluateBatch {
            root,
            concurrency,
            promotion_decision,
        } => {
            let promotion = match promotion_decision.or(config.promotion_decision) {
                Some(path) => Some(LoadedPromotion::load(&path).await?),
                None => None,
            };
            let outcomes = batch::evaluate_batch(
                &root,
                promotion,
                config.engine,
                concurrency.unwrap_or(config.batch_concurrency),
            )
            .await?;
            let mut all_ok = true;
            for outcome in &outcomes {
                all_ok &= outcome.is_ok();
                println!("{}", serde_json::to_string(outcome)?);
            }
            Ok(if all_ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::FinalizeGate { job_dir } => {
            let gate = finalize::refresh_gate(&JobPaths::new(job_dir)).await?;
            println!("{}", serde_json::to_string(&gate)?);
            Ok(ExitCode::SUCCESS)
        }

        Command::Promote {
            benchmark,
            policy,
            out,
        } => {
            let decision = promote::run_promote(&benchmark, &policy, &out).await?;
            println!("{}", serde_json::to_string(&decision)?);
            Ok(ExitCode::SUCCESS)
        }

        Command::Validate {
            job_dir,
            promotion_decision,
            policy,
            benchmark,
        } => {
            let results = match (job_dir, promotion_decision) {
                (Some(dir), _) => validate::validate_job(&JobPaths::new(dir)).await,
                (None, Some(path)) => {
                    validate::validate_promotion(&path, policy.as_deref(), benchmark.as_deref()).await
                }
                (None, None) => anyhow::bail!("validate needs --job-dir or --promotion-decision"),
            };
            for result in &results {
                println!("{}", serde_json::to_string(result)?);
                if !result.is_valid {
                    eprintln!("{}", result.render());
                }
            }
            Ok(if results.iter().all(|r| r.is_valid) {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}
