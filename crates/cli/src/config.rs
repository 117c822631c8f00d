//! Process configuration loaded from the environment.
//!
//! `.env` files are honoured (loaded by `main` through `dotenvy`); explicit
//! CLI flags override anything set here.
//!
//! | Variable                      | Default  | Description                                   |
//! |-------------------------------|----------|-----------------------------------------------|
//! | `QCGATE_LOG_FORMAT`           | `pretty` | `pretty` or `json`                            |
//! | `QCGATE_REASON_METRIC_LIMIT`  | `5`      | Failed-metric names cited per gate reason     |
//! | `QCGATE_PROMOTION_DECISION`   | --       | Default PromotionDecision document            |
//! | `QCGATE_BATCH_CONCURRENCY`    | `8`      | Jobs evaluated concurrently by `evaluate-batch` |

use std::path::PathBuf;

use anyhow::{bail, Context};

use qcgate_core::config::{EngineConfig, DEFAULT_REASON_METRIC_LIMIT};

/// Default number of jobs evaluated at once in batch mode.
const DEFAULT_BATCH_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    pub log_format: LogFormat,
    pub engine: EngineConfig,
    pub promotion_decision: Option<PathBuf>,
    pub batch_concurrency: usize,
}

impl CliConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let log_format = match lookup("QCGATE_LOG_FORMAT").as_deref() {
            None | Some("pretty") => LogFormat::Pretty,
            Some("json") => LogFormat::Json,
            Some(other) => bail!("QCGATE_LOG_FORMAT must be 'pretty' or 'json', got '{other}'"),
        };

        let reason_metric_limit = match lookup("QCGATE_REASON_METRIC_LIMIT") {
            Some(v) => v
                .parse::<usize>()
                .context("QCGATE_REASON_METRIC_LIMIT must be a non-negative integer")?,
            None => DEFAULT_REASON_METRIC_LIMIT,
        };

        let batch_concurrency = match lookup("QCGATE_BATCH_CONCURRENCY") {
            Some(v) => v
                .parse::<usize>()
                .context("QCGATE_BATCH_CONCURRENCY must be a positive integer")?,
            None => DEFAULT_BATCH_CONCURRENCY,
        };
        if batch_concurrency == 0 {
            bail!("QCGATE_BATCH_CONCURRENCY must be at least 1");
        }

        Ok(Self {
            log_format,
            engine: EngineConfig {
                reason_metric_limit,
            },
            promotion_decision: lookup("QCGATE_PROMOTION_DECISION")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            batch_concurrency,
        })
    }
}
