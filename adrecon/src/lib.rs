//! adrecon
//!
//! The reconciliation pipeline itself: join the MAX baseline against every
//! network's own report, persist date-partitioned Parquet snapshots, and
//! produce the structured drift alert.
//!
//! - `comparison`: the atomic output row.
//! - `reconcile`: last-available-date discovery, the join, the run summary.
//! - `export`: partition schema, object-store seam, idempotent replace.
//! - `alert`: floor/threshold filtering, coverage, ranking, payload.
//! - `run`: the end-to-end driver used by the CLI and the daemon.
#![warn(missing_docs)]

pub mod alert;
pub mod checkpoint;
pub mod cli;
pub mod comparison;
pub mod config_file;
pub mod export;
pub mod pidlock;
pub mod reconcile;
pub mod run;
pub mod schedule;

pub use comparison::ComparisonRow;
pub use reconcile::{RunState, RunSummary};
pub use run::{RunOptions, RunOutcome, execute, execute_with};
