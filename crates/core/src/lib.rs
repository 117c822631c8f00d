//! `qcgate-core` -- quality-control decision and promotion engine.
//!
//! Pure domain logic with no filesystem or async dependencies: typed
//! artifacts, the advisory gate evaluator, the retry-policy state machine,
//! the append-only attempt lineage, the finalize gate and the promotion
//! controller. Persistence lives in `qcgate-store`.

pub mod action;
pub mod config;
pub mod decision;
pub mod error;
pub mod finalize_gate;
pub mod gate_evaluator;
pub mod hashing;
pub mod invariants;
pub mod lineage;
pub mod metric_names;
pub mod promotion;
pub mod quality_report;
pub mod retry_policy;
pub mod threshold_validation;
pub mod two_pass;
pub mod types;
pub mod versions;
