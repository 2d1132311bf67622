//! Referential checks between transactions and the product catalog.

use crate::error::{AuditError, Result};
use crate::quality::round2;
use crate::schema::{inventory, transactions};
use crate::types::OrphanDecision;
use crate::utils::{column_f64, column_str};
use polars::prelude::*;
use std::collections::{BTreeSet, HashSet};
use tracing::warn;

/// Resolves transaction SKUs against the SKUs of a cleaned inventory.
#[derive(Debug, Clone, Default)]
pub struct CrossReferenceResolver {
    catalog: HashSet<String>,
}

impl CrossReferenceResolver {
    /// Build the catalog from a cleaned inventory table.
    pub fn from_inventory(table: &DataFrame) -> Result<Self> {
        let catalog = column_str(table, inventory::SKU_ID)?
            .into_iter()
            .flatten()
            .collect();
        Ok(Self { catalog })
    }

    /// Build the catalog from the reference table of a repair context.
    pub fn from_reference(reference: Option<&DataFrame>) -> Result<Self> {
        let table = reference.ok_or_else(|| AuditError::RepairFailed {
            field: transactions::SKU_ID.to_string(),
            reason: "cleaned inventory is required to resolve SKUs".to_string(),
        })?;
        Self::from_inventory(table)
    }

    pub fn catalog_size(&self) -> usize {
        self.catalog.len()
    }

    /// Whether `sku` is in the catalog. A missing SKU never is.
    pub fn is_known(&self, sku: Option<&str>) -> bool {
        sku.is_some_and(|s| self.catalog.contains(s))
    }

    /// One flag per transaction: `true` when its SKU is not in the catalog.
    pub fn no_catalog_flags(&self, sales: &DataFrame) -> Result<Vec<bool>> {
        Ok(column_str(sales, transactions::SKU_ID)?
            .iter()
            .map(|sku| !self.is_known(sku.as_deref()))
            .collect())
    }

    /// Distinct transaction SKUs absent from the catalog, sorted.
    pub fn orphaned_skus(&self, sales: &DataFrame) -> Result<BTreeSet<String>> {
        Ok(column_str(sales, transactions::SKU_ID)?
            .into_iter()
            .flatten()
            .filter(|sku| !self.catalog.contains(sku))
            .collect())
    }

    /// Document the decision on orphaned transactions, with the revenue at
    /// stake. `None` when every transaction resolves.
    pub fn decision(&self, sales: &DataFrame) -> Result<Option<OrphanDecision>> {
        let flags = self.no_catalog_flags(sales)?;
        let affected_rows = flags.iter().filter(|f| **f).count();
        if affected_rows == 0 {
            return Ok(None);
        }

        let prices = column_f64(sales, transactions::FINAL_SALE_PRICE)?;
        let total_revenue: f64 = prices.iter().flatten().sum();
        let orphan_revenue: f64 = prices
            .iter()
            .zip(&flags)
            .filter(|(_, orphan)| **orphan)
            .filter_map(|(price, _)| *price)
            .sum();

        let orphaned_skus: Vec<String> = self.orphaned_skus(sales)?.into_iter().collect();
        let affected_share = share(affected_rows as f64, sales.height() as f64);
        let revenue_share = share(orphan_revenue, total_revenue);

        warn!(
            "{} transactions ({:.2}%) reference {} SKUs missing from the catalog (${:.2} revenue)",
            affected_rows,
            affected_share,
            orphaned_skus.len(),
            orphan_revenue
        );

        let decision = format!(
            "Kept {affected_rows} transactions ({affected_share:.2}% of sales) whose SKU is not \
             in the catalog, flagged in {flag}. They carry ${orphan_revenue:.2} \
             ({revenue_share:.2}% of revenue). Deleting them would understate real sales and \
             creating placeholder catalog entries would invent product data, so both were \
             rejected pending a catalog audit.",
            flag = transactions::NO_CATALOG_FLAG,
        );

        Ok(Some(OrphanDecision {
            orphaned_skus,
            affected_rows,
            affected_share,
            orphan_revenue: round2(orphan_revenue),
            total_revenue: round2(total_revenue),
            revenue_share,
            decision,
        }))
    }
}

fn share(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        round2(part / whole * 100.0)
    }
}
