//! Value conversions for the messy text fields of the source files.

use crate::error::Result;
use crate::utils::{column_dates, column_str, epoch_days_to_date, parse_numeric_string};
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use polars::prelude::*;
use regex::Regex;

// "25-30 días", "3 - 5 days"
static DAY_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*-\s*(\d+(?:\.\d+)?)\s*(?:d[ií]as?|days?)?\s*$")
        .expect("Invalid regex: day range")
});

// "14 días", "7 days"
static DAY_COUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+(?:\.\d+)?)\s*(?:d[ií]as?|days?)\s*$").expect("Invalid regex: day count")
});

const IMMEDIATE_TOKENS: [&str; 3] = ["inmediato", "immediate", "inmediata"];

/// Lead time assigned to an "immediate" delivery, in days.
pub const IMMEDIATE_LEAD_TIME_DAYS: f64 = 1.0;

/// Convert a free-text lead time to days.
///
/// A range becomes its midpoint, "immediate" becomes one day, numeric text
/// is parsed, anything else is `None`.
pub(crate) fn parse_lead_time(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let lower = trimmed.to_lowercase();
    if IMMEDIATE_TOKENS.contains(&lower.as_str()) {
        return Some(IMMEDIATE_LEAD_TIME_DAYS);
    }

    if let Some(caps) = DAY_RANGE.captures(&lower) {
        let lo: f64 = caps[1].parse().ok()?;
        let hi: f64 = caps[2].parse().ok()?;
        return Some((lo + hi) / 2.0);
    }

    if let Some(caps) = DAY_COUNT.captures(&lower) {
        return caps[1].parse().ok();
    }

    parse_numeric_string(trimmed)
}

/// ISO layouts accepted for every date column on top of the configured one.
const FALLBACK_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a date with `primary_format`, then the ISO layouts.
///
/// Timestamps are cut to their date part.
pub(crate) fn parse_date(raw: &str, primary_format: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    std::iter::once(primary_format)
        .chain(FALLBACK_DATE_FORMATS)
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .or_else(|| {
            let date_part = trimmed.split(['T', ' ']).next()?;
            NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
        })
}

/// Read a date column whatever its dtype.
///
/// `Date` columns pass through, `Datetime` columns are truncated to the day
/// and text is parsed with [`parse_date`]; unparseable text becomes `None`.
pub(crate) fn read_date_column(
    df: &DataFrame,
    name: &str,
    primary_format: &str,
) -> Result<Vec<Option<NaiveDate>>> {
    if let Some(dates) = column_dates(df, name)? {
        return Ok(dates);
    }

    let column = df.column(name)?;
    if matches!(column.dtype(), DataType::Datetime(_, _)) {
        let physical = column
            .cast(&DataType::Date)?
            .cast(&DataType::Int32)?;
        return Ok(physical
            .as_materialized_series()
            .i32()?
            .into_iter()
            .map(|opt| opt.and_then(epoch_days_to_date))
            .collect());
    }

    Ok(column_str(df, name)?
        .into_iter()
        .map(|opt| opt.and_then(|raw| parse_date(&raw, primary_format)))
        .collect())
}

/// Map a support-ticket token to a boolean.
///
/// Unrecognised tokens are `None`, meaning the ticket state is unknown.
pub(crate) fn parse_ticket_token(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "sí" | "si" | "yes" | "y" | "1" | "1.0" | "true" | "t" => Some(true),
        "no" | "n" | "0" | "0.0" | "false" | "f" => Some(false),
        _ => None,
    }
}
