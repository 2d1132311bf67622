//! Statistical helpers for imputation and outlier detection.
//!
//! Quantiles come from polars with linear interpolation. Non-finite values
//! are dropped before any statistic is taken.

use polars::prelude::*;
use std::collections::HashMap;

fn finite(values: impl IntoIterator<Item = f64>) -> Float64Chunked {
    let values: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    Float64Chunked::from_vec(PlSmallStr::EMPTY, values)
}

fn linear_quantile(ca: &Float64Chunked, q: f64) -> Option<f64> {
    ca.quantile(q.clamp(0.0, 1.0), QuantileMethod::Linear)
        .ok()
        .flatten()
}

/// Quantile `q` in [0, 1] of the finite values, or `None` when there are none.
pub fn quantile(values: impl IntoIterator<Item = f64>, q: f64) -> Option<f64> {
    linear_quantile(&finite(values), q)
}

/// Median of the finite values, or `None` when there are none.
pub fn median(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    finite(values).median()
}

/// Tukey fences around the interquartile range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrBounds {
    pub q1: f64,
    pub q3: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrBounds {
    /// Compute `[Q1 - k·IQR, Q3 + k·IQR]` over the finite values.
    pub fn compute(values: impl IntoIterator<Item = f64>, multiplier: f64) -> Option<Self> {
        let values = finite(values);
        let q1 = linear_quantile(&values, 0.25)?;
        let q3 = linear_quantile(&values, 0.75)?;
        let iqr = q3 - q1;
        Some(Self {
            q1,
            q3,
            lower: q1 - multiplier * iqr,
            upper: q3 + multiplier * iqr,
        })
    }

    /// Raise the lower fence to at least `floor`.
    pub fn with_lower_floor(mut self, floor: f64) -> Self {
        self.lower = self.lower.max(floor);
        self
    }

    pub fn is_outlier(&self, value: f64) -> bool {
        value < self.lower || value > self.upper
    }

    /// Number of values outside the fences.
    pub fn count_outliers(&self, values: impl IntoIterator<Item = f64>) -> usize {
        values.into_iter().filter(|v| self.is_outlier(*v)).count()
    }
}

/// Per-group medians with a global fallback.
///
/// Built once from the valid values of a column, then queried row by row.
#[derive(Debug, Clone, Default)]
pub struct GroupedMedian {
    by_group: HashMap<String, f64>,
    global: Option<f64>,
}

impl GroupedMedian {
    /// Build from `(group, value)` pairs. Rows without a value are skipped;
    /// rows without a group only count toward the global median.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (Option<String>, Option<f64>)>,
    {
        let mut groups: HashMap<String, Vec<f64>> = HashMap::new();
        let mut all = Vec::new();

        for (group, value) in pairs {
            let Some(value) = value.filter(|v| v.is_finite()) else {
                continue;
            };
            all.push(value);
            if let Some(group) = group {
                groups.entry(group).or_default().push(value);
            }
        }

        let by_group = groups
            .into_iter()
            .filter_map(|(group, values)| median(values).map(|m| (group, m)))
            .collect();

        Self {
            by_group,
            global: median(all),
        }
    }

    /// Median of `group`, or the global median when the group is unknown.
    pub fn lookup(&self, group: Option<&str>) -> Option<f64> {
        group
            .and_then(|g| self.by_group.get(g).copied())
            .or(self.global)
    }

    pub fn global(&self) -> Option<f64> {
        self.global
    }

    pub fn group_count(&self) -> usize {
        self.by_group.len()
    }
}
