//! Inventory cleaning.

use super::DatasetCleaner;
use super::converters::parse_lead_time;
use super::rules::{
    RepairContext, RepairOutcome, RepairStep, clip_future_dates, flip_negative_signs,
    fmt_value, impute_with_grouped_median, impute_with_median, normalize_categories,
    parse_dates, set_flag,
};
use crate::error::Result;
use crate::imputers::IqrBounds;
use crate::schema::inventory::*;
use crate::types::{DatasetKind, JustificationEntry, JustificationKind};
use crate::utils::{column_f64, column_str, is_numeric_dtype, parse_numeric_string, replace_f64};
use polars::prelude::*;

const CATEGORY_MAP: &[(&str, &str)] = &[
    ("smart-phone", "Smartphones"),
    ("LAPTOP", "Laptops"),
    ("???", "Sin_Categoria"),
];

const WAREHOUSE_MAP: &[(&str, &str)] = &[
    ("norte", "Norte"),
    ("ZONA_FRANCA", "Zona_Franca"),
    ("BOD-EXT-99", "Bodega_Externa"),
];

const STEPS: &[RepairStep] = &[
    RepairStep::new(CATEGORY, normalize_category),
    RepairStep::new(WAREHOUSE, normalize_warehouse),
    RepairStep::new(LEAD_TIME_DAYS, coerce_lead_time),
    RepairStep::new(LEAD_TIME_DAYS, impute_lead_time),
    RepairStep::new(CURRENT_STOCK, flip_negative_stock),
    RepairStep::new(CURRENT_STOCK, impute_stock_by_category),
    RepairStep::new(UNIT_COST_USD, impute_low_unit_cost),
    RepairStep::new(COST_OUTLIER_FLAG, flag_cost_outliers),
    RepairStep::new(LAST_REVIEW_DATE, parse_review_date),
    RepairStep::new(LAST_REVIEW_DATE, clip_review_date),
];

/// Cleans the product catalog. Must run before the transactions cleaner,
/// which resolves SKUs against its output.
#[derive(Debug, Default, Clone, Copy)]
pub struct InventoryCleaner;

impl DatasetCleaner for InventoryCleaner {
    fn dataset(&self) -> DatasetKind {
        DatasetKind::Inventory
    }

    fn steps(&self) -> &'static [RepairStep] {
        STEPS
    }
}

fn normalize_category(table: DataFrame, _: &RepairContext<'_>) -> Result<RepairOutcome> {
    normalize_categories(
        table,
        CATEGORY,
        CATEGORY_MAP,
        "Spelling variants unified (smart-phone → Smartphones, LAPTOP → Laptops); \
         unknown labels (???) tagged Sin_Categoria to stay traceable",
    )
}

fn normalize_warehouse(table: DataFrame, _: &RepairContext<'_>) -> Result<RepairOutcome> {
    normalize_categories(
        table,
        WAREHOUSE,
        WAREHOUSE_MAP,
        "Standard warehouse names so per-warehouse grouping is correct",
    )
}

/// Turn lead-time text into days. Already-numeric columns are only cast.
fn coerce_lead_time(mut table: DataFrame, _: &RepairContext<'_>) -> Result<RepairOutcome> {
    let dtype = table.column(LEAD_TIME_DAYS)?.dtype().clone();
    if is_numeric_dtype(&dtype) {
        let values = column_f64(&table, LEAD_TIME_DAYS)?;
        replace_f64(&mut table, LEAD_TIME_DAYS, values)?;
        return Ok(RepairOutcome::unchanged(table));
    }

    let raw = column_str(&table, LEAD_TIME_DAYS)?;
    let mut converted = 0;
    let mut discarded = 0;
    let days: Vec<Option<f64>> = raw
        .iter()
        .map(|value| {
            let text = value.as_deref()?;
            let parsed = parse_lead_time(text);
            if parse_numeric_string(text).is_none() && !text.trim().is_empty() {
                if parsed.is_some() {
                    converted += 1;
                } else {
                    discarded += 1;
                }
            }
            parsed
        })
        .collect();
    replace_f64(&mut table, LEAD_TIME_DAYS, days)?;

    let entry = JustificationEntry::new(
        LEAD_TIME_DAYS,
        JustificationKind::Normalization,
        "Text to days",
        converted + discarded,
    )
    .with_states(
        format!("{} text values", converted + discarded),
        format!("{converted} converted (range midpoint, immediate = 1 day), {discarded} set to null"),
    )
    .with_rationale("Lead time must be numeric for aggregation; text phrases keep their meaning");
    Ok(RepairOutcome::when_changed(table, entry))
}

fn impute_lead_time(table: DataFrame, _: &RepairContext<'_>) -> Result<RepairOutcome> {
    impute_with_median(
        table,
        LEAD_TIME_DAYS,
        |v| v.is_none(),
        "Median",
        "Lead time is skewed by long ranges; the median is not pulled by extremes",
    )
}

fn flip_negative_stock(table: DataFrame, _: &RepairContext<'_>) -> Result<RepairOutcome> {
    flip_negative_signs(
        table,
        CURRENT_STOCK,
        "Negative stock is physically impossible; treated as a sign typo",
    )
}

fn impute_stock_by_category(table: DataFrame, _: &RepairContext<'_>) -> Result<RepairOutcome> {
    impute_with_grouped_median(
        table,
        CURRENT_STOCK,
        CATEGORY,
        |v| v.is_none(),
        "Missing stock follows the behavior of similar products in its category",
    )
}

/// Costs below the threshold are capture errors; missing costs are filled
/// the same way. Runs before the outlier flag so the fences are computed on
/// realistic costs.
fn impute_low_unit_cost(table: DataFrame, ctx: &RepairContext<'_>) -> Result<RepairOutcome> {
    let threshold = ctx.config.low_cost_threshold;
    let costs = column_f64(&table, UNIT_COST_USD)?;
    let missing = costs.iter().filter(|c| c.is_none()).count();
    let low = costs.iter().flatten().filter(|c| **c < threshold).count();

    impute_with_median(
        table,
        UNIT_COST_USD,
        |v| v.is_none_or(|cost| cost < threshold),
        "Median of valid costs",
        &unit_cost_rationale(low, missing, threshold),
    )
}

fn unit_cost_rationale(low: usize, missing: usize, threshold: f64) -> String {
    let low_reason = format!(
        "Costs below {} USD are capture errors; the record is kept with a realistic cost",
        fmt_value(threshold)
    );
    let missing_reason = "Missing costs are filled so every SKU keeps a usable cost";
    match (low > 0, missing > 0) {
        (true, true) => format!("{low_reason}. {missing_reason}"),
        (false, true) => missing_reason.to_string(),
        _ => low_reason,
    }
}

fn flag_cost_outliers(table: DataFrame, ctx: &RepairContext<'_>) -> Result<RepairOutcome> {
    let costs = column_f64(&table, UNIT_COST_USD)?;
    let Some(bounds) = IqrBounds::compute(costs.iter().flatten().copied(), ctx.config.iqr_multiplier)
    else {
        return Ok(RepairOutcome::unchanged(table));
    };
    let bounds = bounds.with_lower_floor(ctx.config.min_unit_cost);

    let flags = costs
        .iter()
        .map(|cost| cost.is_some_and(|c| bounds.is_outlier(c)))
        .collect();
    set_flag(
        table,
        COST_OUTLIER_FLAG,
        flags,
        "IQR fences",
        &format!(
            "Atypical costs are kept and marked for review. IQR bounds: {:.2} - {:.2} USD",
            bounds.lower, bounds.upper
        ),
    )
}

fn parse_review_date(table: DataFrame, ctx: &RepairContext<'_>) -> Result<RepairOutcome> {
    parse_dates(
        table,
        LAST_REVIEW_DATE,
        &ctx.config.review_date_format,
        "Review dates must be dates for recency analysis",
    )
}

fn clip_review_date(table: DataFrame, ctx: &RepairContext<'_>) -> Result<RepairOutcome> {
    clip_future_dates(
        table,
        LAST_REVIEW_DATE,
        ctx.config.reference_date,
        "Future review dates are system errors; the record is kept at the reference date",
    )
}
