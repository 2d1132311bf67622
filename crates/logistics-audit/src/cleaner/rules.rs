//! Field repair rules.
//!
//! A rule takes ownership of the table, repairs one field and hands the
//! table back together with at most one justification entry. The helpers
//! here are the shared strategies the dataset cleaners compose into their
//! ordered pipelines.

use super::converters::read_date_column;
use crate::config::AuditConfig;
use crate::error::{Result, ResultExt};
use crate::imputers::{GroupedMedian, median};
use crate::types::{AuditLog, JustificationEntry, JustificationKind};
use crate::utils::{
    column_bool, column_f64, column_str, has_column, replace_dates, replace_f64, replace_str,
    unique_rows,
};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashSet;
use tracing::debug;

/// Read-only inputs shared by every rule of a cleaning run.
#[derive(Debug, Clone, Copy)]
pub struct RepairContext<'a> {
    pub config: &'a AuditConfig,
    /// Cleaned table this dataset references, if any.
    pub reference: Option<&'a DataFrame>,
}

impl<'a> RepairContext<'a> {
    pub fn new(config: &'a AuditConfig) -> Self {
        Self {
            config,
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: &'a DataFrame) -> Self {
        self.reference = Some(reference);
        self
    }
}

/// The repaired table and the justification for what was done to it.
#[derive(Debug, Clone)]
pub struct RepairOutcome {
    pub table: DataFrame,
    pub entry: Option<JustificationEntry>,
}

impl RepairOutcome {
    /// Outcome of a rule that left the table as it was.
    pub fn unchanged(table: DataFrame) -> Self {
        Self { table, entry: None }
    }

    pub fn with_entry(table: DataFrame, entry: JustificationEntry) -> Self {
        Self {
            table,
            entry: Some(entry),
        }
    }

    /// Keep the entry only if it records at least one affected row.
    pub fn when_changed(table: DataFrame, entry: JustificationEntry) -> Self {
        let entry = (entry.affected_rows > 0).then_some(entry);
        Self { table, entry }
    }
}

/// Signature shared by every repair rule.
pub type RepairFn = fn(DataFrame, &RepairContext<'_>) -> Result<RepairOutcome>;

/// One named step of a cleaner's pipeline.
#[derive(Clone, Copy)]
pub struct RepairStep {
    pub field: &'static str,
    pub apply: RepairFn,
}

impl RepairStep {
    pub const fn new(field: &'static str, apply: RepairFn) -> Self {
        Self { field, apply }
    }
}

impl std::fmt::Debug for RepairStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepairStep")
            .field("field", &self.field)
            .finish()
    }
}

/// Run `steps` in order, folding each entry into the log.
pub fn run_steps(
    table: DataFrame,
    steps: &[RepairStep],
    ctx: &RepairContext<'_>,
) -> Result<(DataFrame, AuditLog)> {
    steps
        .iter()
        .try_fold((table, AuditLog::new()), |(table, log), step| {
            let outcome = (step.apply)(table, ctx)
                .context(format!("Repairing field '{}'", step.field))?;
            if let Some(entry) = &outcome.entry {
                debug!(
                    "{}: {} ({} rows)",
                    step.field, entry.method, entry.affected_rows
                );
            }
            Ok((outcome.table, log.append(outcome.entry)))
        })
}

/// Render a number the way the justification entries show it.
pub(crate) fn fmt_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value:.2}")
    }
}

fn distinct_count(values: &[Option<String>]) -> usize {
    values.iter().flatten().collect::<HashSet<_>>().len()
}

/// Map values through an exact-string lookup; unmapped values pass through.
///
/// Always yields an entry so the normalization is traceable even when a
/// table is already clean.
pub fn normalize_categories(
    mut table: DataFrame,
    field: &str,
    mapping: &[(&str, &str)],
    rationale: &str,
) -> Result<RepairOutcome> {
    let original = column_str(&table, field)?;
    let mut changed = 0;
    let normalized: Vec<Option<String>> = original
        .iter()
        .map(|value| {
            value.as_deref().map(|v| {
                match mapping.iter().find(|(from, _)| *from == v) {
                    Some((_, to)) if *to != v => {
                        changed += 1;
                        to.to_string()
                    }
                    _ => v.to_string(),
                }
            })
        })
        .collect();

    let entry = JustificationEntry::new(
        field,
        JustificationKind::Normalization,
        "Canonical value lookup",
        changed,
    )
    .with_states(
        format!("{} distinct values", distinct_count(&original)),
        format!("{} distinct values", distinct_count(&normalized)),
    )
    .with_rationale(rationale);

    replace_str(&mut table, field, normalized)?;
    Ok(RepairOutcome::with_entry(table, entry))
}

/// Replace negative values with their absolute value.
pub fn flip_negative_signs(
    mut table: DataFrame,
    field: &str,
    rationale: &str,
) -> Result<RepairOutcome> {
    let values = column_f64(&table, field)?;
    let flipped = values.iter().flatten().filter(|v| **v < 0.0).count();
    let repaired = values.into_iter().map(|v| v.map(f64::abs)).collect();
    replace_f64(&mut table, field, repaired)?;

    let entry = JustificationEntry::new(field, JustificationKind::Imputation, "Sign flip", flipped)
        .with_states(
            format!("{flipped} negative values"),
            "0 negative values".to_string(),
        )
        .with_imputed_value("Absolute value")
        .with_rationale(rationale);
    Ok(RepairOutcome::when_changed(table, entry))
}

/// Clamp values into `[lo, hi]`. Nulls stay null.
pub fn clamp_range(
    mut table: DataFrame,
    field: &str,
    lo: f64,
    hi: f64,
    rationale: &str,
) -> Result<RepairOutcome> {
    let values = column_f64(&table, field)?;
    let clamped = values
        .iter()
        .flatten()
        .filter(|v| **v < lo || **v > hi)
        .count();
    let repaired = values.into_iter().map(|v| v.map(|x| x.clamp(lo, hi))).collect();
    replace_f64(&mut table, field, repaired)?;

    let entry = JustificationEntry::new(
        field,
        JustificationKind::Normalization,
        "Clamp to valid scale",
        clamped,
    )
    .with_states(
        format!("{clamped} values outside [{}, {}]", fmt_value(lo), fmt_value(hi)),
        format!("All values within [{}, {}]", fmt_value(lo), fmt_value(hi)),
    )
    .with_rationale(rationale);
    Ok(RepairOutcome::when_changed(table, entry))
}

/// Replace every value `needs_repair` selects with the median of the rest.
///
/// The statistic never includes the values being replaced. When no valid
/// value exists the column is left as it was.
pub fn impute_with_median<F>(
    mut table: DataFrame,
    field: &str,
    needs_repair: F,
    method: &str,
    rationale: &str,
) -> Result<RepairOutcome>
where
    F: Fn(Option<f64>) -> bool,
{
    let values = column_f64(&table, field)?;
    let Some(fill) = median(values.iter().copied().filter(|v| !needs_repair(*v)).flatten())
    else {
        replace_f64(&mut table, field, values)?;
        return Ok(RepairOutcome::unchanged(table));
    };

    let mut imputed = 0;
    let repaired = values
        .into_iter()
        .map(|v| {
            if needs_repair(v) {
                imputed += 1;
                Some(fill)
            } else {
                v
            }
        })
        .collect();
    replace_f64(&mut table, field, repaired)?;

    let entry = JustificationEntry::new(field, JustificationKind::Imputation, method, imputed)
        .with_states(
            format!("{imputed} invalid or missing values"),
            format!("Replaced with median {}", fmt_value(fill)),
        )
        .with_imputed_value(fmt_value(fill))
        .with_rationale(rationale);
    Ok(RepairOutcome::when_changed(table, entry))
}

/// Like [`impute_with_median`], with the median taken within the row's
/// `group_field` value and the global median as fallback.
pub fn impute_with_grouped_median<F>(
    mut table: DataFrame,
    field: &str,
    group_field: &str,
    needs_repair: F,
    rationale: &str,
) -> Result<RepairOutcome>
where
    F: Fn(Option<f64>) -> bool,
{
    let values = column_f64(&table, field)?;
    let groups = column_str(&table, group_field)?;

    let medians = GroupedMedian::from_pairs(
        groups
            .iter()
            .cloned()
            .zip(values.iter().copied())
            .filter(|(_, v)| !needs_repair(*v)),
    );

    let mut imputed = 0;
    let repaired = values
        .into_iter()
        .zip(&groups)
        .map(|(v, group)| {
            if !needs_repair(v) {
                return v;
            }
            match medians.lookup(group.as_deref()) {
                Some(fill) => {
                    imputed += 1;
                    Some(fill)
                }
                None => v,
            }
        })
        .collect();
    replace_f64(&mut table, field, repaired)?;

    let global = medians
        .global()
        .map(fmt_value)
        .unwrap_or_else(|| "n/a".to_string());
    let entry = JustificationEntry::new(
        field,
        JustificationKind::Imputation,
        format!("Median by {group_field}"),
        imputed,
    )
    .with_states(
        format!("{imputed} invalid or missing values"),
        format!(
            "Imputed from {} group medians (global fallback {global})",
            medians.group_count()
        ),
    )
    .with_imputed_value(format!("Varies by {group_field} (global: {global})"))
    .with_rationale(rationale);
    Ok(RepairOutcome::when_changed(table, entry))
}

/// Fill null or blank text with `default`.
pub fn fill_missing_text(
    mut table: DataFrame,
    field: &str,
    default: &str,
    rationale: &str,
) -> Result<RepairOutcome> {
    let values = column_str(&table, field)?;
    let mut filled = 0;
    let repaired = values
        .into_iter()
        .map(|v| match v {
            Some(text) if !text.trim().is_empty() => Some(text),
            _ => {
                filled += 1;
                Some(default.to_string())
            }
        })
        .collect();
    replace_str(&mut table, field, repaired)?;

    let entry = JustificationEntry::new(
        field,
        JustificationKind::Imputation,
        "Default status",
        filled,
    )
    .with_states(format!("{filled} missing values"), "0 missing values")
    .with_imputed_value(default)
    .with_rationale(rationale);
    Ok(RepairOutcome::when_changed(table, entry))
}

/// Add or refresh a boolean flag column.
///
/// `affected_rows` is the number of flagged rows. The entry is recorded
/// only when some flag differs from the column already present, so
/// recomputing an up-to-date flag records nothing.
pub fn set_flag(
    mut table: DataFrame,
    flag_field: &str,
    flags: Vec<bool>,
    method: &str,
    rationale: &str,
) -> Result<RepairOutcome> {
    let previous: Vec<Option<bool>> = if has_column(&table, flag_field) {
        column_bool(&table, flag_field)?
    } else {
        vec![None; flags.len()]
    };

    let changed = flags
        .iter()
        .zip(&previous)
        .filter(|(now, before)| **before != Some(**now))
        .count();
    let flagged = flags.iter().filter(|f| **f).count();

    table
        .with_column(Series::new(flag_field.into(), flags))
        .context(format!("Adding flag column '{flag_field}'"))?;

    if changed == 0 {
        return Ok(RepairOutcome::unchanged(table));
    }

    let entry = JustificationEntry::new(flag_field, JustificationKind::FlagAdded, method, flagged)
        .with_states(
            format!("{flagged} rows flagged"),
            format!("Column {flag_field} (true/false), rows kept"),
        )
        .with_rationale(rationale);
    Ok(RepairOutcome::with_entry(table, entry))
}

/// Drop rows identical to an earlier row, keeping the first occurrence.
pub fn remove_exact_duplicates(table: DataFrame, rationale: &str) -> Result<RepairOutcome> {
    let before = table.height();
    let kept = unique_rows(&table)?;
    let removed = before - kept.height();
    if removed == 0 {
        return Ok(RepairOutcome::unchanged(table));
    }

    let entry = JustificationEntry::new(
        "*",
        JustificationKind::Removal,
        "Exact duplicate removal (keep first)",
        removed,
    )
    .with_states(format!("{before} rows"), format!("{} rows", kept.height()))
    .with_rationale(rationale);
    Ok(RepairOutcome::with_entry(kept, entry))
}

/// Convert a date field to a `Date` column.
///
/// Text that cannot be parsed becomes null; the entry counts those rows.
pub fn parse_dates(
    mut table: DataFrame,
    field: &str,
    primary_format: &str,
    rationale: &str,
) -> Result<RepairOutcome> {
    let raw = column_str(&table, field)?;
    let parsed = read_date_column(&table, field, primary_format)?;
    let unparseable = raw
        .iter()
        .zip(&parsed)
        .filter(|(raw, date)| raw.as_deref().is_some_and(|r| !r.trim().is_empty()) && date.is_none())
        .count();
    replace_dates(&mut table, field, parsed)?;

    let entry = JustificationEntry::new(
        field,
        JustificationKind::Normalization,
        format!("Date parsing ({primary_format}, ISO)"),
        unparseable,
    )
    .with_states(
        format!("{unparseable} unparseable dates"),
        "Date type, unparseable values set to null",
    )
    .with_rationale(rationale);
    Ok(RepairOutcome::when_changed(table, entry))
}

/// Replace dates after `reference` with `reference`.
pub fn clip_future_dates(
    mut table: DataFrame,
    field: &str,
    reference: NaiveDate,
    rationale: &str,
) -> Result<RepairOutcome> {
    let dates = read_date_column(&table, field, "%Y-%m-%d")?;
    let future = dates.iter().flatten().filter(|d| **d > reference).count();
    let clipped = dates
        .into_iter()
        .map(|d| d.map(|date| date.min(reference)))
        .collect();
    replace_dates(&mut table, field, clipped)?;

    let entry = JustificationEntry::new(
        field,
        JustificationKind::Imputation,
        "Clip to reference date",
        future,
    )
    .with_states(
        format!("{future} dates after {reference}"),
        format!("No dates after {reference}"),
    )
    .with_imputed_value(reference.to_string())
    .with_rationale(rationale);
    Ok(RepairOutcome::when_changed(table, entry))
}
