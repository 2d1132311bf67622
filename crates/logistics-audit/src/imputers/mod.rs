//! Statistics used by the imputing repair rules.
//!
//! - Median and linear-interpolation quantiles
//! - IQR outlier fences
//! - Per-group medians with a global fallback

mod statistical;

pub use statistical::{GroupedMedian, IqrBounds, median, quantile};
