//! Dataset cleaning module.
//!
//! Each dataset has a cleaner made of an ordered list of field repair
//! rules. A cleaner:
//! - Checks that the columns its rules read are present
//! - Runs its rules on an owned copy of the raw table
//! - Returns the cleaned table with the audit log of every repair

mod converters;
mod cross_reference;
mod feedback;
mod inventory;
pub mod rules;
mod transactions;

pub(crate) use converters::read_date_column;
pub use cross_reference::CrossReferenceResolver;
pub use feedback::FeedbackCleaner;
pub use inventory::InventoryCleaner;
pub use rules::{RepairContext, RepairOutcome, RepairStep};
pub use transactions::TransactionsCleaner;

use crate::error::{AuditError, Result};
use crate::schema::missing_columns;
use crate::types::{AuditLog, DatasetKind};
use polars::prelude::*;
use tracing::{debug, info};

/// A cleaned table and the justification of every change made to it.
#[derive(Debug, Clone)]
pub struct CleanedTable {
    pub table: DataFrame,
    pub log: AuditLog,
}

/// An ordered pipeline of repair rules over one dataset.
pub trait DatasetCleaner {
    /// Which dataset this cleaner handles.
    fn dataset(&self) -> DatasetKind;

    /// The rules, in the order they run.
    fn steps(&self) -> &'static [RepairStep];

    /// Clean `raw`. The input is never modified.
    fn clean(&self, raw: &DataFrame, ctx: &RepairContext<'_>) -> Result<CleanedTable> {
        let dataset = self.dataset();
        let missing = missing_columns(
            dataset,
            raw.get_column_names().iter().map(|name| name.as_str()),
        );
        if !missing.is_empty() {
            return Err(AuditError::MissingColumns {
                dataset: dataset.to_string(),
                columns: missing,
            });
        }

        info!(
            "Cleaning {} ({} rows, {} steps)...",
            dataset,
            raw.height(),
            self.steps().len()
        );
        let (table, log) = rules::run_steps(raw.clone(), self.steps(), ctx)?;
        debug!(
            "{}: {} entries, {} with changes",
            dataset,
            log.len(),
            log.changes().count()
        );

        Ok(CleanedTable { table, log })
    }
}
