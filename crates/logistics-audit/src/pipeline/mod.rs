//! Pipeline module.
//!
//! This module provides the audit orchestrator, its result cache, and
//! progress reporting.

mod cache;
mod orchestrator;
pub mod progress;

pub use cache::AuditCache;
pub use orchestrator::{AuditOrchestrator, AuditOrchestratorBuilder};
pub use progress::{
    AuditStage, CancellationToken, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
