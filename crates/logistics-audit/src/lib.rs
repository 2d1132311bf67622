//! Logistics Data-Quality Audit Library
//!
//! Audits and repairs three related tables of a logistics business
//! (inventory, sales transactions and customer feedback) with Polars.
//!
//! # Overview
//!
//! - **Quality Scoring**: a 0-100 health score from nullity, duplication
//!   and outliers, computed before and after cleaning
//! - **Field Repair Rules**: one deterministic rule per field, each paired
//!   with a justification entry saying what changed and why
//! - **Cross-Referencing**: transactions whose SKU is missing from the
//!   catalog are flagged, never deleted, with the revenue at stake recorded
//! - **Integrity Validation**: post-hoc checks that cleaning kept revenue,
//!   quantities, dates and delivery times consistent
//! - **Reporting**: summary, justification and integrity tables plus a
//!   JSON report
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use logistics_audit::{AuditConfig, AuditOrchestrator, DatasetKind, load_csv};
//!
//! let inventory = load_csv("inventario.csv", DatasetKind::Inventory)?;
//! let transactions = load_csv("transacciones.csv", DatasetKind::Transactions)?;
//! let feedback = load_csv("feedback.csv", DatasetKind::Feedback)?;
//!
//! let orchestrator = AuditOrchestrator::builder()
//!     .config(AuditConfig::default())
//!     .on_progress(|update| println!("[{:.0}%] {}", update.progress * 100.0, update.message))
//!     .build()?;
//!
//! let result = orchestrator.run(&inventory, &transactions, &feedback)?;
//! let integrity = orchestrator.validate_integrity(&transactions, &result)?;
//!
//! for audit in result.datasets() {
//!     println!("{}: {:.2} -> {:.2}", audit.dataset, audit.score_before(), audit.score_after());
//! }
//! if integrity.has_failures() {
//!     eprintln!("integrity checks need review");
//! }
//! ```
//!
//! # Configuration
//!
//! Every threshold the rules use lives in [`AuditConfig`], including the
//! reference date that stands in for "today" in future-date checks:
//!
//! ```rust,ignore
//! use chrono::NaiveDate;
//! use logistics_audit::AuditConfig;
//!
//! let config = AuditConfig::builder()
//!     .reference_date(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap())
//!     .delivery_placeholder(999.0)
//!     .iqr_multiplier(1.5)
//!     .build()?;
//! ```

pub mod cleaner;
pub mod config;
pub mod error;
pub mod imputers;
pub mod loader;
pub mod pipeline;
pub mod quality;
pub mod reporting;
pub mod schema;
pub mod types;
pub mod utils;
pub mod validation;

// Re-exports for convenient access
pub use cleaner::{
    CleanedTable, CrossReferenceResolver, DatasetCleaner, FeedbackCleaner, InventoryCleaner,
    RepairContext, RepairOutcome, RepairStep, TransactionsCleaner,
};
pub use config::{AuditConfig, AuditConfigBuilder, ConfigValidationError};
pub use error::{AuditError, ResultExt};
pub use imputers::{GroupedMedian, IqrBounds};
pub use loader::{load_csv, parse_csv};
pub use pipeline::{
    AuditCache, AuditOrchestrator, AuditOrchestratorBuilder, AuditStage, CancellationToken,
    ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
pub use quality::{QualityScorer, ScorePenalties};
pub use reporting::{AuditReport, DatasetSummary, ReportGenerator, ReportInputs};
pub use types::{
    AuditLog, AuditResult, ColumnNullStats, DatasetAudit, DatasetKind, JustificationEntry,
    JustificationKind, OrphanDecision, QualityMetrics,
};
pub use validation::{CheckStatus, IntegrityCheck, IntegrityReport, IntegrityValidator};
