//! Health scoring for a single table.

use crate::error::Result;
use crate::imputers::IqrBounds;
use crate::types::{ColumnNullStats, QualityMetrics};
use crate::utils::{column_f64, count_duplicate_rows, is_numeric_dtype};
use polars::prelude::*;
use tracing::debug;

/// Maximum points the nullity term can subtract.
pub const NULLITY_PENALTY_CAP: f64 = 40.0;
/// Maximum points the duplicate term can subtract.
pub const DUPLICATE_PENALTY_CAP: f64 = 30.0;
/// Maximum points the outlier term can subtract.
pub const OUTLIER_PENALTY_CAP: f64 = 30.0;

const NULLITY_WEIGHT: f64 = 4.0;
const OUTLIER_WEIGHT: f64 = 3.0;
const OUTLIER_IQR_MULTIPLIER: f64 = 1.5;

/// Breakdown of the points subtracted from a perfect score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScorePenalties {
    pub nullity: f64,
    pub duplicates: f64,
    pub outliers: f64,
}

impl ScorePenalties {
    pub fn total(&self) -> f64 {
        self.nullity + self.duplicates + self.outliers
    }

    /// Final score: `100 - penalties`, floored at 0 and rounded to 2 decimals.
    pub fn score(&self) -> f64 {
        round2((100.0 - self.total()).max(0.0))
    }
}

/// Scores tables on a 0-100 scale from nullity, duplication and outliers.
///
/// Stateless; every call reads only the table it is given.
pub struct QualityScorer;

impl QualityScorer {
    /// Health score of `df` in `[0, 100]`.
    pub fn score(df: &DataFrame) -> Result<f64> {
        Ok(Self::penalties(df)?.score())
    }

    /// Compute each penalty term.
    pub fn penalties(df: &DataFrame) -> Result<ScorePenalties> {
        let rows = df.height();
        if rows == 0 {
            return Ok(ScorePenalties::default());
        }

        let total_cells = rows * df.width();
        let total_nulls: usize = df.get_columns().iter().map(|c| c.null_count()).sum();
        let null_pct = if total_cells > 0 {
            total_nulls as f64 / total_cells as f64 * 100.0
        } else {
            0.0
        };

        let duplicate_pct = count_duplicate_rows(df)? as f64 / rows as f64 * 100.0;

        let (outliers, numeric_values) = Self::count_outliers(df)?;
        let outlier_penalty = if numeric_values > 0 {
            (OUTLIER_WEIGHT * (outliers as f64 / numeric_values as f64 * 100.0))
                .min(OUTLIER_PENALTY_CAP)
        } else {
            0.0
        };

        let penalties = ScorePenalties {
            nullity: (NULLITY_WEIGHT * null_pct).min(NULLITY_PENALTY_CAP),
            duplicates: duplicate_pct.min(DUPLICATE_PENALTY_CAP),
            outliers: outlier_penalty,
        };
        debug!(
            "Penalties: nullity={:.2}, duplicates={:.2}, outliers={:.2}",
            penalties.nullity, penalties.duplicates, penalties.outliers
        );
        Ok(penalties)
    }

    /// Outlier and value counts summed over every numeric column.
    ///
    /// Boolean columns are not numeric here, so flag columns never count.
    fn count_outliers(df: &DataFrame) -> Result<(usize, usize)> {
        let mut outliers = 0;
        let mut values_seen = 0;

        for col in df.get_columns() {
            if !is_numeric_dtype(col.dtype()) {
                continue;
            }
            let values: Vec<f64> = column_f64(df, col.name())?.into_iter().flatten().collect();
            values_seen += values.len();
            if let Some(bounds) = IqrBounds::compute(values.iter().copied(), OUTLIER_IQR_MULTIPLIER)
            {
                outliers += bounds.count_outliers(values);
            }
        }

        Ok((outliers, values_seen))
    }

    /// Full quality snapshot of `df` under the label `dataset`.
    pub fn metrics(df: &DataFrame, dataset: &str) -> Result<QualityMetrics> {
        let rows = df.height();
        let nulls_by_column: Vec<ColumnNullStats> = df
            .get_columns()
            .iter()
            .map(|c| {
                let null_count = c.null_count();
                ColumnNullStats {
                    column: c.name().to_string(),
                    null_count,
                    null_percentage: percentage(null_count, rows),
                }
            })
            .collect();

        let columns_with_nulls = nulls_by_column
            .iter()
            .filter(|s| s.null_count > 0)
            .map(|s| s.column.clone())
            .collect();
        let total_nulls = nulls_by_column.iter().map(|s| s.null_count).sum();
        let duplicate_rows = count_duplicate_rows(df)?;

        Ok(QualityMetrics {
            dataset: dataset.to_string(),
            row_count: rows,
            column_count: df.width(),
            nulls_by_column,
            columns_with_nulls,
            total_nulls,
            duplicate_rows,
            duplicate_percentage: percentage(duplicate_rows, rows),
            health_score: Self::score(df)?,
        })
    }
}

fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 / whole as f64 * 100.0)
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
