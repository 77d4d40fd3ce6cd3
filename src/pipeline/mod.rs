//! # Pipeline
//!
//! Stage sequencing for an incremental run, the extraction transforms that
//! denormalise custom fields and change events, and periodic scheduling.

pub mod extraction;
pub mod orchestrator;
pub mod scheduler;

pub use extraction::{register_extractions, RunState, SharedRunState};
pub use orchestrator::{ImportTotals, Orchestrator, RunReport, StageReport};
pub use scheduler::run_periodically;
