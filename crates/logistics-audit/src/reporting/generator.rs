//! Summary, justification and integrity tables, the JSON audit report,
//! and the writers that put them on disk.

use crate::error::Result;
use crate::types::{AuditLog, AuditResult, DatasetAudit, DatasetKind, OrphanDecision};
use crate::validation::IntegrityReport;
use chrono::{Local, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

// ============================================================================
// Report Types
// ============================================================================

/// Before/after figures for one dataset; one row of the summary table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub dataset: DatasetKind,
    pub original_rows: usize,
    pub final_rows: usize,
    pub rows_removed: usize,
    pub nulls_before: usize,
    pub nulls_after: usize,
    /// Nulls that no longer exist after cleaning.
    pub nulls_treated: usize,
    /// Rows deleted by the removal entries of the log.
    pub duplicates_removed: usize,
    pub score_before: f64,
    pub score_after: f64,
    pub improvement: f64,
    /// Entries that changed at least one row.
    pub changes: usize,
}

impl DatasetSummary {
    pub fn from_audit(audit: &DatasetAudit) -> Self {
        let before = &audit.metrics_before;
        let after = &audit.metrics_after;
        Self {
            dataset: audit.dataset,
            original_rows: before.row_count,
            final_rows: after.row_count,
            rows_removed: audit.rows_removed(),
            nulls_before: before.total_nulls,
            nulls_after: after.total_nulls,
            nulls_treated: before.total_nulls.saturating_sub(after.total_nulls),
            duplicates_removed: audit.log.rows_removed(),
            score_before: audit.score_before(),
            score_after: audit.score_after(),
            improvement: audit.improvement(),
            changes: audit.log.changes().count(),
        }
    }
}

/// The justification log of one dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetLog {
    pub dataset: DatasetKind,
    pub entries: AuditLog,
}

/// Paths of the three source files.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportInputs {
    pub inventory: String,
    pub transactions: String,
    pub feedback: String,
}

/// Full audit report, for `--json` output and `audit_report.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    /// Date the future-date rules were evaluated against
    pub reference_date: NaiveDate,
    pub inputs: ReportInputs,
    /// Content hash of the inputs
    pub cache_key: String,
    pub summaries: Vec<DatasetSummary>,
    pub logs: Vec<DatasetLog>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orphan_decision: Option<OrphanDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integrity: Option<IntegrityReport>,
}

// ============================================================================
// Generator
// ============================================================================

/// Flattens audit results into tables and writes them out.
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./outputs"),
        }
    }
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// One row per dataset, in cleaning order.
    pub fn summary_table(result: &AuditResult) -> Result<DataFrame> {
        let rows: Vec<DatasetSummary> = result
            .datasets()
            .into_iter()
            .map(DatasetSummary::from_audit)
            .collect();

        let count = |f: fn(&DatasetSummary) -> usize| -> Vec<u64> {
            rows.iter().map(|r| f(r) as u64).collect()
        };
        let score = |f: fn(&DatasetSummary) -> f64| -> Vec<f64> { rows.iter().map(f).collect() };

        let df = DataFrame::new(vec![
            Column::new(
                "Dataset".into(),
                rows.iter()
                    .map(|r| r.dataset.display_name())
                    .collect::<Vec<_>>(),
            ),
            Column::new("OriginalRows".into(), count(|r| r.original_rows)),
            Column::new("FinalRows".into(), count(|r| r.final_rows)),
            Column::new("RowsRemoved".into(), count(|r| r.rows_removed)),
            Column::new("NullsBefore".into(), count(|r| r.nulls_before)),
            Column::new("NullsAfter".into(), count(|r| r.nulls_after)),
            Column::new("NullsTreated".into(), count(|r| r.nulls_treated)),
            Column::new("DuplicatesRemoved".into(), count(|r| r.duplicates_removed)),
            Column::new("ScoreBefore".into(), score(|r| r.score_before)),
            Column::new("ScoreAfter".into(), score(|r| r.score_after)),
            Column::new("Improvement".into(), score(|r| r.improvement)),
        ])?;
        Ok(df)
    }

    /// One row per justification entry, datasets in cleaning order.
    pub fn justification_table(result: &AuditResult) -> Result<DataFrame> {
        let entries: Vec<_> = result
            .datasets()
            .into_iter()
            .flat_map(|audit| {
                audit
                    .log
                    .entries()
                    .iter()
                    .map(move |entry| (audit.dataset, entry))
            })
            .collect();

        let text = |f: fn(&crate::types::JustificationEntry) -> &str| -> Vec<&str> {
            entries.iter().map(|(_, e)| f(e)).collect()
        };

        let df = DataFrame::new(vec![
            Column::new(
                "Dataset".into(),
                entries
                    .iter()
                    .map(|(dataset, _)| dataset.display_name())
                    .collect::<Vec<_>>(),
            ),
            Column::new("Field".into(), text(|e| e.field.as_str())),
            Column::new("Kind".into(), text(|e| e.kind.display_name())),
            Column::new("Method".into(), text(|e| e.method.as_str())),
            Column::new("Before".into(), text(|e| e.before.as_str())),
            Column::new("After".into(), text(|e| e.after.as_str())),
            Column::new(
                "ImputedValue".into(),
                entries
                    .iter()
                    .map(|(_, e)| e.imputed_value.as_deref())
                    .collect::<Vec<_>>(),
            ),
            Column::new("Rationale".into(), text(|e| e.rationale.as_str())),
            Column::new(
                "AffectedRows".into(),
                entries
                    .iter()
                    .map(|(_, e)| e.affected_rows as u64)
                    .collect::<Vec<_>>(),
            ),
        ])?;
        Ok(df)
    }

    /// One row per integrity check.
    pub fn integrity_table(report: &IntegrityReport) -> Result<DataFrame> {
        let checks = &report.checks;
        let df = DataFrame::new(vec![
            Column::new(
                "Check".into(),
                checks.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                "Expected".into(),
                checks.iter().map(|c| c.expected.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                "Observed".into(),
                checks.iter().map(|c| c.observed.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                "Difference".into(),
                checks
                    .iter()
                    .map(|c| c.difference.as_str())
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                "Status".into(),
                checks.iter().map(|c| c.status.label()).collect::<Vec<_>>(),
            ),
        ])?;
        Ok(df)
    }

    /// Assemble the JSON report for a run.
    pub fn build_report(
        inputs: ReportInputs,
        reference_date: NaiveDate,
        result: &AuditResult,
        integrity: Option<&IntegrityReport>,
    ) -> AuditReport {
        AuditReport {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            reference_date,
            inputs,
            cache_key: result.cache_key.clone(),
            summaries: result
                .datasets()
                .into_iter()
                .map(DatasetSummary::from_audit)
                .collect(),
            logs: result
                .datasets()
                .into_iter()
                .map(|audit| DatasetLog {
                    dataset: audit.dataset,
                    entries: audit.log.clone(),
                })
                .collect(),
            orphan_decision: result.orphan_decision.clone(),
            integrity: integrity.cloned(),
        }
    }

    /// Write a table as `<name>.csv` in the output directory.
    pub fn write_table(&self, df: &DataFrame, name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{}.csv", name));
        let mut file = File::create(&path)?;
        let mut df = df.clone();

        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .with_quote_char(b'"')
            .finish(&mut df)?;

        info!("Table saved: {}", path.display());
        Ok(path)
    }

    /// Write the three cleaned tables as `<dataset>_clean.csv`.
    pub fn write_cleaned(&self, result: &AuditResult) -> Result<Vec<PathBuf>> {
        result
            .datasets()
            .into_iter()
            .map(|audit| self.write_table(&audit.cleaned, &format!("{}_clean", audit.dataset)))
            .collect()
    }

    /// Write the report as `audit_report.json`.
    pub fn write_report(&self, report: &AuditReport) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;

        let path = self.output_dir.join("audit_report.json");
        let mut file = File::create(&path)?;
        file.write_all(serde_json::to_string_pretty(report)?.as_bytes())?;

        info!("Report saved: {}", path.display());
        Ok(path)
    }
}
