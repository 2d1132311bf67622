//! Report generation module.
//!
//! Flattens an [`AuditResult`](crate::types::AuditResult) into the summary,
//! justification and integrity tables, and serializes the full run as an
//! [`AuditReport`].
//!
//! # Example
//!
//! ```rust,ignore
//! use logistics_audit::reporting::{ReportGenerator, ReportInputs};
//!
//! let summary = ReportGenerator::summary_table(&result)?;
//!
//! let generator = ReportGenerator::new("outputs");
//! generator.write_table(&summary, "summary")?;
//!
//! let report = ReportGenerator::build_report(inputs, config.reference_date, &result, Some(&integrity));
//! generator.write_report(&report)?;
//! ```

mod generator;

pub use generator::{AuditReport, DatasetLog, DatasetSummary, ReportGenerator, ReportInputs};
