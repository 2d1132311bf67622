//! Core types shared across the audit.
//!
//! Dataset identities, justification entries and the audit log, quality
//! metrics, the orphan decision, and the per-dataset and full results.

use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The three datasets the audit covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetKind {
    Inventory,
    Transactions,
    Feedback,
}

impl DatasetKind {
    /// All datasets in cleaning order.
    pub const ALL: [DatasetKind; 3] = [Self::Inventory, Self::Transactions, Self::Feedback];

    /// Lowercase identifier used in logs and file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inventory => "inventory",
            Self::Transactions => "transactions",
            Self::Feedback => "feedback",
        }
    }

    /// Get a human-readable display name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Inventory => "Inventory",
            Self::Transactions => "Transactions",
            Self::Feedback => "Feedback",
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a repair did to a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JustificationKind {
    /// Values were mapped to a canonical form or type.
    Normalization,
    /// Missing or erroneous values were replaced.
    Imputation,
    /// A derived boolean column marks rows without altering them.
    FlagAdded,
    /// Rows were deleted.
    Removal,
    /// A field was checked and left untouched.
    Validation,
}

impl JustificationKind {
    /// Get a human-readable display name for the kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Normalization => "Normalization",
            Self::Imputation => "Imputation",
            Self::FlagAdded => "Flag Added",
            Self::Removal => "Removal",
            Self::Validation => "Validation",
        }
    }
}

/// One justified repair, as recorded in a dataset's audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JustificationEntry {
    /// Column the repair touched.
    pub field: String,
    /// Category of the repair.
    pub kind: JustificationKind,
    /// Method used (e.g. "Median by city", "Sign flip").
    pub method: String,
    /// State of the field before the repair.
    pub before: String,
    /// State of the field after the repair.
    pub after: String,
    /// Representative value written, when the repair imputed one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub imputed_value: Option<String>,
    /// One-line rationale.
    pub rationale: String,
    /// Number of rows the repair changed.
    pub affected_rows: usize,
}

impl JustificationEntry {
    /// Create a new entry for `field`.
    pub fn new(
        field: impl Into<String>,
        kind: JustificationKind,
        method: impl Into<String>,
        affected_rows: usize,
    ) -> Self {
        Self {
            field: field.into(),
            kind,
            method: method.into(),
            before: String::new(),
            after: String::new(),
            imputed_value: None,
            rationale: String::new(),
            affected_rows,
        }
    }

    /// Describe the before and after states.
    pub fn with_states(mut self, before: impl Into<String>, after: impl Into<String>) -> Self {
        self.before = before.into();
        self.after = after.into();
        self
    }

    /// Record the representative imputed value.
    pub fn with_imputed_value(mut self, value: impl Into<String>) -> Self {
        self.imputed_value = Some(value.into());
        self
    }

    /// Attach the rationale.
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = rationale.into();
        self
    }

    /// Whether this entry records an actual change to the data.
    pub fn is_change(&self) -> bool {
        self.affected_rows > 0
            && !matches!(self.kind, JustificationKind::Validation)
    }
}

/// Append-only audit trail for one dataset.
///
/// Appending consumes the log and returns the extended one, so each repair
/// step hands a new value to the next instead of mutating shared state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditLog {
    entries: Vec<JustificationEntry>,
}

impl AuditLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the log extended with `entry`, if there is one.
    #[must_use]
    pub fn append(mut self, entry: Option<JustificationEntry>) -> Self {
        if let Some(entry) = entry {
            self.entries.push(entry);
        }
        self
    }

    /// All entries in the order the repairs ran.
    pub fn entries(&self) -> &[JustificationEntry] {
        &self.entries
    }

    /// Entries that changed at least one row.
    pub fn changes(&self) -> impl Iterator<Item = &JustificationEntry> {
        self.entries.iter().filter(|e| e.is_change())
    }

    /// Entries of a given kind.
    pub fn of_kind(&self, kind: JustificationKind) -> impl Iterator<Item = &JustificationEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    /// Entries for a given field.
    pub fn for_field<'a>(
        &'a self,
        field: &'a str,
    ) -> impl Iterator<Item = &'a JustificationEntry> + 'a {
        self.entries.iter().filter(move |e| e.field == field)
    }

    /// Rows deleted across all removal entries.
    pub fn rows_removed(&self) -> usize {
        self.of_kind(JustificationKind::Removal)
            .map(|e| e.affected_rows)
            .sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Null statistics for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnNullStats {
    pub column: String,
    pub null_count: usize,
    pub null_percentage: f64,
}

/// Quality snapshot of one table.
///
/// Computed fresh from a table; never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub dataset: String,
    pub row_count: usize,
    pub column_count: usize,
    /// Per-column null counts, in column order.
    pub nulls_by_column: Vec<ColumnNullStats>,
    pub columns_with_nulls: Vec<String>,
    pub total_nulls: usize,
    /// Rows identical to an earlier row across all columns.
    pub duplicate_rows: usize,
    pub duplicate_percentage: f64,
    /// Composite score in [0, 100].
    pub health_score: f64,
}

/// The documented judgment call on transactions whose SKU is missing from
/// the catalog: keep them, flag them, and state the revenue at stake.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrphanDecision {
    /// Distinct SKUs absent from the cleaned inventory, sorted.
    pub orphaned_skus: Vec<String>,
    /// Transactions carrying an orphaned SKU.
    pub affected_rows: usize,
    /// Share of all transactions, in percent.
    pub affected_share: f64,
    /// Revenue of the flagged transactions.
    pub orphan_revenue: f64,
    /// Revenue of all transactions.
    pub total_revenue: f64,
    /// Share of revenue, in percent.
    pub revenue_share: f64,
    /// Narrative record of the decision and the rejected alternatives.
    pub decision: String,
}

/// Everything the audit produced for one dataset.
#[derive(Debug, Clone)]
pub struct DatasetAudit {
    pub dataset: DatasetKind,
    pub cleaned: DataFrame,
    pub log: AuditLog,
    pub metrics_before: QualityMetrics,
    pub metrics_after: QualityMetrics,
}

impl DatasetAudit {
    pub fn score_before(&self) -> f64 {
        self.metrics_before.health_score
    }

    pub fn score_after(&self) -> f64 {
        self.metrics_after.health_score
    }

    /// Score change from cleaning (after − before).
    pub fn improvement(&self) -> f64 {
        ((self.score_after() - self.score_before()) * 100.0).round() / 100.0
    }

    pub fn rows_removed(&self) -> usize {
        self.metrics_before
            .row_count
            .saturating_sub(self.metrics_after.row_count)
    }
}

/// Result of a full audit run over the three datasets.
#[derive(Debug, Clone)]
pub struct AuditResult {
    pub inventory: DatasetAudit,
    pub transactions: DatasetAudit,
    pub feedback: DatasetAudit,
    /// Present when at least one transaction references an unknown SKU.
    pub orphan_decision: Option<OrphanDecision>,
    /// Content hash of the three inputs.
    pub cache_key: String,
}

impl AuditResult {
    /// The per-dataset audits in cleaning order.
    pub fn datasets(&self) -> [&DatasetAudit; 3] {
        [&self.inventory, &self.transactions, &self.feedback]
    }

    pub fn dataset(&self, kind: DatasetKind) -> &DatasetAudit {
        match kind {
            DatasetKind::Inventory => &self.inventory,
            DatasetKind::Transactions => &self.transactions,
            DatasetKind::Feedback => &self.feedback,
        }
    }

    /// Total number of entries that changed data, across datasets.
    pub fn total_changes(&self) -> usize {
        self.datasets().iter().map(|d| d.log.changes().count()).sum()
    }
}

// ============================================================================
// Tests
// ============================================================================
