//! Transactions cleaning.
//!
//! Depends on the cleaned inventory, passed as the reference table of the
//! repair context, to flag sales whose SKU is not in the catalog.

use super::cross_reference::CrossReferenceResolver;
use super::rules::{
    RepairContext, RepairOutcome, RepairStep, clip_future_dates, fill_missing_text,
    flip_negative_signs, fmt_value, impute_with_grouped_median, normalize_categories,
    parse_dates, set_flag,
};
use super::{CleanedTable, DatasetCleaner};
use crate::error::Result;
use crate::schema::transactions::*;
use crate::types::{DatasetKind, OrphanDecision};
use polars::prelude::*;

const CITY_MAP: &[(&str, &str)] = &[
    ("MED", "Medellín"),
    ("med", "Medellín"),
    ("Medellin", "Medellín"),
    ("MEDELLIN", "Medellín"),
    ("BOG", "Bogotá"),
    ("bog", "Bogotá"),
    ("Bogota", "Bogotá"),
    ("BOGOTA", "Bogotá"),
    // web sales are a channel, not a city; kept as is
    ("Ventas_Web", "Ventas_Web"),
];

const STEPS: &[RepairStep] = &[
    RepairStep::new(SALE_DATE, parse_sale_date),
    RepairStep::new(SALE_DATE, clip_sale_date),
    RepairStep::new(DESTINATION_CITY, normalize_city),
    RepairStep::new(QUANTITY_SOLD, flip_negative_quantity),
    RepairStep::new(ACTUAL_DELIVERY_DAYS, impute_placeholder_delivery),
    RepairStep::new(SHIPPING_COST, impute_shipping_cost),
    RepairStep::new(SHIPPING_STATUS, fill_shipping_status),
    RepairStep::new(NO_CATALOG_FLAG, flag_orphaned_skus),
    RepairStep::new(DISCOUNT_USD, flip_negative_discount),
];

/// Cleans sales records. `FinalSalePrice` is never modified.
#[derive(Debug, Default, Clone, Copy)]
pub struct TransactionsCleaner;

impl DatasetCleaner for TransactionsCleaner {
    fn dataset(&self) -> DatasetKind {
        DatasetKind::Transactions
    }

    fn steps(&self) -> &'static [RepairStep] {
        STEPS
    }
}

impl TransactionsCleaner {
    /// Clean `raw` against `inventory` and document the orphan decision.
    pub fn clean_against(
        &self,
        raw: &DataFrame,
        inventory: &DataFrame,
        ctx: &RepairContext<'_>,
    ) -> Result<(CleanedTable, Option<OrphanDecision>)> {
        let ctx = ctx.with_reference(inventory);
        let cleaned = self.clean(raw, &ctx)?;
        let decision = CrossReferenceResolver::from_inventory(inventory)?.decision(&cleaned.table)?;
        Ok((cleaned, decision))
    }
}

fn parse_sale_date(table: DataFrame, ctx: &RepairContext<'_>) -> Result<RepairOutcome> {
    parse_dates(
        table,
        SALE_DATE,
        &ctx.config.sale_date_format,
        "Sale dates must be dates for time-series analysis",
    )
}

fn clip_sale_date(table: DataFrame, ctx: &RepairContext<'_>) -> Result<RepairOutcome> {
    clip_future_dates(
        table,
        SALE_DATE,
        ctx.config.reference_date,
        "A sale cannot happen after the reference date; the record is kept at that date",
    )
}

fn normalize_city(table: DataFrame, _: &RepairContext<'_>) -> Result<RepairOutcome> {
    normalize_categories(
        table,
        DESTINATION_CITY,
        CITY_MAP,
        "City name variants unified (MED → Medellín, BOG → Bogotá) for geographic analysis",
    )
}

fn flip_negative_quantity(table: DataFrame, _: &RepairContext<'_>) -> Result<RepairOutcome> {
    flip_negative_signs(
        table,
        QUANTITY_SOLD,
        "Negative quantities match typical sale sizes in absolute value; treated as typos",
    )
}

fn impute_placeholder_delivery(table: DataFrame, ctx: &RepairContext<'_>) -> Result<RepairOutcome> {
    let placeholder = ctx.config.delivery_placeholder;
    impute_with_grouped_median(
        table,
        ACTUAL_DELIVERY_DAYS,
        DESTINATION_CITY,
        |v| v.is_some_and(|days| days >= placeholder),
        &format!(
            "{} days is an upstream placeholder for unknown; the city median reflects real logistics times",
            fmt_value(placeholder)
        ),
    )
}

fn impute_shipping_cost(table: DataFrame, _: &RepairContext<'_>) -> Result<RepairOutcome> {
    impute_with_grouped_median(
        table,
        SHIPPING_COST,
        DESTINATION_CITY,
        |v| v.is_none(),
        "Shipping cost depends on destination; missing costs take the city median",
    )
}

fn fill_shipping_status(table: DataFrame, ctx: &RepairContext<'_>) -> Result<RepairOutcome> {
    fill_missing_text(
        table,
        SHIPPING_STATUS,
        &ctx.config.default_shipping_status,
        "A sale without a recorded shipping state is treated as not yet shipped",
    )
}

fn flag_orphaned_skus(table: DataFrame, ctx: &RepairContext<'_>) -> Result<RepairOutcome> {
    let resolver = CrossReferenceResolver::from_reference(ctx.reference)?;
    let flags = resolver.no_catalog_flags(&table)?;
    let orphaned = resolver.orphaned_skus(&table)?.len();
    set_flag(
        table,
        NO_CATALOG_FLAG,
        flags,
        "Set difference against catalog SKUs",
        &format!(
            "{orphaned} SKUs are not in the catalog; their sales are real revenue and are kept \
             for a catalog audit"
        ),
    )
}

fn flip_negative_discount(table: DataFrame, _: &RepairContext<'_>) -> Result<RepairOutcome> {
    flip_negative_signs(
        table,
        DISCOUNT_USD,
        "A negative discount has no business meaning; treated as a sign typo",
    )
}
