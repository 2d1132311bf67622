//! Shared utilities for the audit pipeline.
//!
//! Column extraction and write-back helpers used by the scorer, the repair
//! rules and the validator, plus the string parsing helpers they share.

use crate::error::{AuditError, Result};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Check if a DataType is a date or datetime type.
#[inline]
pub fn is_datetime_dtype(dtype: &DataType) -> bool {
    matches!(dtype, DataType::Datetime(_, _) | DataType::Date)
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 6] = [',', '$', '%', '€', '£', ' '];

/// Common error/missing value markers in data.
pub const ERROR_MARKERS: [&str; 9] = [
    "error", "unknown", "n/a", "na", "nan", "null", "missing", "none", "#n/a",
];

/// Clean a string for numeric parsing by removing formatting characters.
pub fn clean_numeric_string(s: &str) -> String {
    let mut result = s.trim().to_string();
    for c in NUMERIC_FORMAT_CHARS {
        result = result.replace(c, "");
    }
    result
}

/// Check if a string is an error/missing value marker.
pub fn is_error_marker(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    ERROR_MARKERS.iter().any(|&marker| lower == marker)
}

/// Try to parse a string as a numeric value (f64).
///
/// Handles currency symbols, percentages and thousands separators.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    if is_error_marker(s) {
        return None;
    }
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

// =============================================================================
// Date Utilities
// =============================================================================

/// Days from 0001-01-01 (CE) to 1970-01-01, the epoch of polars `Date`.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Convert a date to the physical representation of a polars `Date`.
pub fn date_to_epoch_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

/// Convert the physical representation of a polars `Date` back to a date.
pub fn epoch_days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days + UNIX_EPOCH_DAYS_FROM_CE)
}

// =============================================================================
// Column Extraction
// =============================================================================

fn series<'a>(df: &'a DataFrame, name: &str) -> Result<&'a Series> {
    df.column(name)
        .map(|col| col.as_materialized_series())
        .map_err(|_| AuditError::ColumnNotFound(name.to_string()))
}

/// Whether `df` has a column called `name`.
pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// Read a column as optional floats.
///
/// Numeric columns are cast; string columns are parsed value by value and
/// anything unparseable becomes `None`.
pub fn column_f64(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let s = series(df, name)?;
    if s.dtype() == &DataType::String {
        return Ok(s
            .str()?
            .into_iter()
            .map(|opt| opt.and_then(parse_numeric_string))
            .collect());
    }
    let casted = s.cast(&DataType::Float64)?;
    let values = casted
        .f64()?
        .into_iter()
        .map(|opt| opt.filter(|v| !v.is_nan()))
        .collect();
    Ok(values)
}

/// Read a column as optional strings (any dtype is rendered as text).
pub fn column_str(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let s = series(df, name)?;
    let casted = s.cast(&DataType::String)?;
    let values = casted
        .str()?
        .into_iter()
        .map(|opt| opt.map(str::to_string))
        .collect();
    Ok(values)
}

/// Read a boolean column. Non-boolean columns yield `None` for every row.
pub fn column_bool(df: &DataFrame, name: &str) -> Result<Vec<Option<bool>>> {
    let s = series(df, name)?;
    if s.dtype() != &DataType::Boolean {
        return Ok(vec![None; s.len()]);
    }
    Ok(s.bool()?.into_iter().collect())
}

/// Read a `Date` column as optional dates.
///
/// Returns `None` when the column is not already a `Date` column, so callers
/// can fall back to parsing text.
pub fn column_dates(df: &DataFrame, name: &str) -> Result<Option<Vec<Option<NaiveDate>>>> {
    let s = series(df, name)?;
    if s.dtype() != &DataType::Date {
        return Ok(None);
    }
    let physical = s.cast(&DataType::Int32)?;
    let values = physical
        .i32()?
        .into_iter()
        .map(|opt| opt.and_then(epoch_days_to_date))
        .collect();
    Ok(Some(values))
}

// =============================================================================
// Column Write-back
// =============================================================================

/// Replace (or add) a Float64 column.
pub fn replace_f64(df: &mut DataFrame, name: &str, values: Vec<Option<f64>>) -> Result<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

/// Replace (or add) a String column.
pub fn replace_str(df: &mut DataFrame, name: &str, values: Vec<Option<String>>) -> Result<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

/// Replace (or add) a Boolean column.
pub fn replace_bool(df: &mut DataFrame, name: &str, values: Vec<Option<bool>>) -> Result<()> {
    df.with_column(Series::new(name.into(), values))?;
    Ok(())
}

/// Replace (or add) a Date column.
pub fn replace_dates(
    df: &mut DataFrame,
    name: &str,
    values: Vec<Option<NaiveDate>>,
) -> Result<()> {
    let days: Vec<Option<i32>> = values
        .into_iter()
        .map(|opt| opt.map(date_to_epoch_days))
        .collect();
    let date_series = Series::new(name.into(), days).cast(&DataType::Date)?;
    df.with_column(date_series)?;
    Ok(())
}

// =============================================================================
// Row Utilities
// =============================================================================

/// Rows in first-occurrence order with exact duplicates dropped.
///
/// Rows are equal when every column is equal, nulls comparing equal to
/// each other.
pub fn unique_rows(df: &DataFrame) -> Result<DataFrame> {
    Ok(df.unique_stable(None, UniqueKeepStrategy::First, None)?)
}

/// Number of rows that repeat an earlier row exactly.
pub fn count_duplicate_rows(df: &DataFrame) -> Result<usize> {
    Ok(df.height() - unique_rows(df)?.height())
}

/// Sum of the non-null values of a numeric column.
pub fn column_sum(df: &DataFrame, name: &str) -> Result<f64> {
    Ok(column_f64(df, name)?.into_iter().flatten().sum())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
        assert!(!is_numeric_dtype(&DataType::Date));
    }

    #[test]
    fn test_parse_numeric_string() {
        assert_eq!(parse_numeric_string("42"), Some(42.0));
        assert_eq!(parse_numeric_string("$1,234.56"), Some(1234.56));
        assert_eq!(parse_numeric_string("-100"), Some(-100.0));
        assert_eq!(parse_numeric_string(""), None);
        assert_eq!(parse_numeric_string("nan"), None);
        assert_eq!(parse_numeric_string("Inmediato"), None);
    }

    #[test]
    fn test_epoch_days_roundtrip_known_values() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(date_to_epoch_days(epoch), 0);
        let reference = NaiveDate::from_ymd_opt(2026, 1, 31).unwrap();
        assert_eq!(date_to_epoch_days(reference), 20_484);
        assert_eq!(epoch_days_to_date(20_484), Some(reference));
    }

    #[test]
    fn test_column_f64_parses_strings() {
        let df = df!("x" => &[Some("1.5"), Some("abc"), None, Some("$2")]).unwrap();
        let values = column_f64(&df, "x").unwrap();
        assert_eq!(values, vec![Some(1.5), None, None, Some(2.0)]);
    }

    #[test]
    fn test_column_f64_casts_integers() {
        let df = df!("x" => &[Some(1i64), None, Some(-3)]).unwrap();
        let values = column_f64(&df, "x").unwrap();
        assert_eq!(values, vec![Some(1.0), None, Some(-3.0)]);
    }

    #[test]
    fn test_column_missing_is_error() {
        let df = df!("x" => &[1.0]).unwrap();
        let err = column_f64(&df, "y").unwrap_err();
        assert_eq!(err.error_code(), "COLUMN_NOT_FOUND");
    }

    #[test]
    fn test_replace_and_read_dates() {
        let mut df = df!("id" => &[1, 2]).unwrap();
        let d = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        replace_dates(&mut df, "when", vec![Some(d), None]).unwrap();

        assert_eq!(df.column("when").unwrap().dtype(), &DataType::Date);
        let back = column_dates(&df, "when").unwrap().unwrap();
        assert_eq!(back, vec![Some(d), None]);
    }

    #[test]
    fn test_column_dates_none_for_text() {
        let df = df!("when" => &["14/03/2025"]).unwrap();
        assert!(column_dates(&df, "when").unwrap().is_none());
    }

    #[test]
    fn test_unique_rows_keeps_first() {
        let df = df!(
            "a" => &[Some(1.0), Some(1.0), None, None, Some(2.0)],
            "b" => &["x", "x", "y", "y", "x"]
        )
        .unwrap();

        let unique = unique_rows(&df).unwrap();
        assert_eq!(unique.height(), 3);
        assert_eq!(
            column_f64(&unique, "a").unwrap(),
            vec![Some(1.0), None, Some(2.0)]
        );
        assert_eq!(count_duplicate_rows(&df).unwrap(), 2);
    }

    #[test]
    fn test_duplicates_need_all_columns_equal() {
        let df = df!(
            "a" => &[1.0, 1.0],
            "b" => &["x", "y"]
        )
        .unwrap();
        assert_eq!(count_duplicate_rows(&df).unwrap(), 0);
    }

    #[test]
    fn test_duplicates_compare_cells_not_rendered_rows() {
        // Same concatenated text, different cell boundaries
        let split = df!(
            "id" => &["x\u{1f}y", "x"],
            "answer" => &["z", "y\u{1f}z"]
        )
        .unwrap();
        assert_eq!(count_duplicate_rows(&split).unwrap(), 0);

        // A NUL string is a value, not a null
        let nul = df!("s" => &[Some("\u{0}"), None]).unwrap();
        assert_eq!(count_duplicate_rows(&nul).unwrap(), 0);
    }

    #[test]
    fn test_column_sum_skips_nulls() {
        let df = df!("p" => &[Some(10.5), None, Some(4.5)]).unwrap();
        assert_eq!(column_sum(&df, "p").unwrap(), 15.0);
    }
}
