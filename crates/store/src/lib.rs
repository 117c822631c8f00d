//! `qcgate-store` -- artifact persistence for the decision engine.
//!
//! Loads the upstream artifacts of a job directory, writes the documents the
//! engine produces, and owns the append-only lineage file.

pub mod error;
pub mod intake;
pub mod layout;
pub mod lineage_store;
pub mod writer;
