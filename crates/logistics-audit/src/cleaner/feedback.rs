//! Customer feedback cleaning.

use super::DatasetCleaner;
use super::converters::parse_ticket_token;
use super::rules::{
    RepairContext, RepairOutcome, RepairStep, clamp_range, fmt_value, impute_with_median,
    normalize_categories, remove_exact_duplicates,
};
use crate::error::Result;
use crate::schema::feedback::*;
use crate::types::{DatasetKind, JustificationEntry, JustificationKind};
use crate::utils::{column_f64, column_str, replace_bool};
use polars::prelude::*;

/// Canonical answers for brand recommendation.
pub const RECOMMENDATION_ANSWERS: [&str; 4] = ["Yes", "No", "Maybe", "NoAnswer"];

const RECOMMENDATION_MAP: &[(&str, &str)] = &[
    ("SI", "Yes"),
    ("Si", "Yes"),
    ("si", "Yes"),
    ("Sí", "Yes"),
    ("sí", "Yes"),
    ("yes", "Yes"),
    ("YES", "Yes"),
    ("NO", "No"),
    ("no", "No"),
    ("Maybe", "Maybe"),
    ("maybe", "Maybe"),
    ("Tal vez", "Maybe"),
    ("tal vez", "Maybe"),
    ("N/A", "NoAnswer"),
    ("n/a", "NoAnswer"),
    ("No responde", "NoAnswer"),
];

const STEPS: &[RepairStep] = &[
    RepairStep::new(PRODUCT_RATING, impute_gross_rating_errors),
    RepairStep::new(PRODUCT_RATING, clamp_product_rating),
    RepairStep::new(LOGISTICS_RATING, clamp_logistics_rating),
    RepairStep::new(CUSTOMER_AGE, impute_unrealistic_age),
    RepairStep::new(RECOMMENDS_BRAND, normalize_recommendation),
    RepairStep::new(SUPPORT_TICKET_OPEN, convert_ticket_flag),
    RepairStep::new("*", remove_duplicates),
    RepairStep::new(NPS, validate_nps),
];

/// Cleans customer feedback. The only cleaner that removes rows, and only
/// exact duplicates.
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedbackCleaner;

impl DatasetCleaner for FeedbackCleaner {
    fn dataset(&self) -> DatasetKind {
        DatasetKind::Feedback
    }

    fn steps(&self) -> &'static [RepairStep] {
        STEPS
    }
}

fn impute_gross_rating_errors(table: DataFrame, ctx: &RepairContext<'_>) -> Result<RepairOutcome> {
    let threshold = ctx.config.rating_gross_error_threshold;
    impute_with_median(
        table,
        PRODUCT_RATING,
        |v| v.is_some_and(|r| r > threshold),
        "Median of plausible ratings",
        &format!(
            "Ratings above {} cannot come from a small scale; replaced by the median before clamping",
            fmt_value(threshold)
        ),
    )
}

fn clamp_product_rating(table: DataFrame, ctx: &RepairContext<'_>) -> Result<RepairOutcome> {
    let (lo, hi) = ctx.config.rating_range;
    clamp_range(
        table,
        PRODUCT_RATING,
        lo,
        hi,
        "Product ratings must lie on the survey scale",
    )
}

fn clamp_logistics_rating(table: DataFrame, ctx: &RepairContext<'_>) -> Result<RepairOutcome> {
    let (lo, hi) = ctx.config.rating_range;
    clamp_range(
        table,
        LOGISTICS_RATING,
        lo,
        hi,
        "Logistics ratings must lie on the survey scale",
    )
}

fn impute_unrealistic_age(table: DataFrame, ctx: &RepairContext<'_>) -> Result<RepairOutcome> {
    let (lo, hi) = ctx.config.age_range;
    impute_with_median(
        table,
        CUSTOMER_AGE,
        |v| v.is_some_and(|age| age < lo || age > hi),
        "Median of realistic ages",
        &format!(
            "Ages outside {}-{} are capture errors; the feedback record is kept",
            fmt_value(lo),
            fmt_value(hi)
        ),
    )
}

fn normalize_recommendation(table: DataFrame, _: &RepairContext<'_>) -> Result<RepairOutcome> {
    normalize_categories(
        table,
        RECOMMENDS_BRAND,
        RECOMMENDATION_MAP,
        "Answers mapped to Yes / No / Maybe / NoAnswer for recommendation analysis",
    )
}

/// Map ticket tokens to booleans; unrecognised tokens become null (unknown).
///
/// Always logged. A column that is already boolean is left as it is.
fn convert_ticket_flag(mut table: DataFrame, _: &RepairContext<'_>) -> Result<RepairOutcome> {
    let dtype = table.column(SUPPORT_TICKET_OPEN)?.dtype().clone();
    let (converted, unknown) = if dtype == DataType::Boolean {
        (0, 0)
    } else {
        let raw = column_str(&table, SUPPORT_TICKET_OPEN)?;
        let parsed: Vec<Option<bool>> = raw
            .iter()
            .map(|token| token.as_deref().and_then(parse_ticket_token))
            .collect();
        let converted = raw.iter().flatten().count();
        let unknown = raw
            .iter()
            .zip(&parsed)
            .filter(|(token, value)| token.is_some() && value.is_none())
            .count();
        replace_bool(&mut table, SUPPORT_TICKET_OPEN, parsed)?;
        (converted, unknown)
    };

    let entry = JustificationEntry::new(
        SUPPORT_TICKET_OPEN,
        JustificationKind::Normalization,
        "Token to boolean",
        converted,
    )
    .with_states(
        format!("{converted} text tokens (Sí/No/1/0)"),
        format!("Boolean, {unknown} unrecognised tokens set to null (unknown)"),
    )
    .with_rationale("A boolean ticket state supports support-load analysis");
    Ok(RepairOutcome::with_entry(table, entry))
}

fn remove_duplicates(table: DataFrame, _: &RepairContext<'_>) -> Result<RepairOutcome> {
    remove_exact_duplicates(
        table,
        "Exact duplicate feedback would double-count a customer's answers",
    )
}

/// NPS is already on its scale; out-of-range values are reported, never
/// changed, so the entry never counts affected rows.
fn validate_nps(table: DataFrame, ctx: &RepairContext<'_>) -> Result<RepairOutcome> {
    let (lo, hi) = ctx.config.nps_range;
    let values: Vec<f64> = column_f64(&table, NPS)?.into_iter().flatten().collect();
    let out_of_range = values.iter().filter(|v| **v < lo || **v > hi).count();
    let observed = match (
        values.iter().copied().reduce(f64::min),
        values.iter().copied().reduce(f64::max),
    ) {
        (Some(min), Some(max)) => format!("Observed range {} to {}", fmt_value(min), fmt_value(max)),
        _ => "No values".to_string(),
    };

    let entry = JustificationEntry::new(NPS, JustificationKind::Validation, "Range check", 0)
        .with_states(
            format!("{observed}; {out_of_range} outside [{}, {}]", fmt_value(lo), fmt_value(hi)),
            "Unchanged",
        )
        .with_rationale("NPS is reported on its standard scale and needs no transformation");
    Ok(RepairOutcome::with_entry(table, entry))
}
