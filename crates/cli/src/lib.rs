//! `qcgate-cli` library crate.
//!
//! Re-exports internal modules for integration testing. The binary
//! entrypoint lives in `main.rs`.

pub mod batch;
pub mod cli;
pub mod config;
pub mod evaluate;
pub mod finalize;
pub mod logging;
pub mod promote;
pub mod validate;
