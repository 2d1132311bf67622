//! Configuration types for the audit pipeline.
//!
//! This module provides the thresholds and reference values the repair
//! rules use, with a builder for ergonomic setup.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Default simulated "now" for future-date checks.
pub const DEFAULT_REFERENCE_DATE: (i32, u32, u32) = (2026, 1, 31);

fn default_reference_date() -> NaiveDate {
    let (y, m, d) = DEFAULT_REFERENCE_DATE;
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

/// Configuration for the audit pipeline.
///
/// Use [`AuditConfig::builder()`] to create a new configuration
/// with fluent API.
///
/// # Example
///
/// ```rust,ignore
/// use logistics_audit::config::AuditConfig;
/// use chrono::NaiveDate;
///
/// let config = AuditConfig::builder()
///     .reference_date(NaiveDate::from_ymd_opt(2026, 1, 31).unwrap())
///     .delivery_placeholder(999.0)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Fixed "current date" for every future-date check. Never the wall clock.
    /// Default: 2026-01-31
    pub reference_date: NaiveDate,

    /// Sentinel used upstream for an unknown delivery time. Values at or
    /// above it are treated as missing.
    /// Default: 999.0
    pub delivery_placeholder: f64,

    /// Unit costs below this are capture errors and get imputed.
    /// Default: 1.0 USD
    pub low_cost_threshold: f64,

    /// Floor for the lower IQR bound on unit cost.
    /// Default: 0.01 USD
    pub min_unit_cost: f64,

    /// IQR multiplier for outlier bounds.
    /// Default: 1.5
    pub iqr_multiplier: f64,

    /// Valid rating scale.
    /// Default: (1.0, 5.0)
    pub rating_range: (f64, f64),

    /// Ratings above this are gross errors, replaced by the median before clamping.
    /// Default: 10.0
    pub rating_gross_error_threshold: f64,

    /// Realistic customer age range.
    /// Default: (18.0, 100.0)
    pub age_range: (f64, f64),

    /// NPS scale, validated but never transformed.
    /// Default: (-100.0, 100.0)
    pub nps_range: (f64, f64),

    /// Allowed drift in total revenue before the integrity check flags it.
    /// Default: 0.01
    pub revenue_tolerance: f64,

    /// Status assigned to transactions with no shipping status.
    /// Default: "Pendiente"
    pub default_shipping_status: String,

    /// chrono format of the raw sale date text.
    /// Default: "%d/%m/%Y"
    pub sale_date_format: String,

    /// chrono format of the raw inventory review date text.
    /// Default: "%Y-%m-%d"
    pub review_date_format: String,

    /// Whether the orchestrator memoizes results by input content.
    /// Default: true
    pub enable_cache: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            reference_date: default_reference_date(),
            delivery_placeholder: 999.0,
            low_cost_threshold: 1.0,
            min_unit_cost: 0.01,
            iqr_multiplier: 1.5,
            rating_range: (1.0, 5.0),
            rating_gross_error_threshold: 10.0,
            age_range: (18.0, 100.0),
            nps_range: (-100.0, 100.0),
            revenue_tolerance: 0.01,
            default_shipping_status: "Pendiente".to_string(),
            sale_date_format: "%d/%m/%Y".to_string(),
            review_date_format: "%Y-%m-%d".to_string(),
            enable_cache: true,
        }
    }
}

impl AuditConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AuditConfigBuilder {
        AuditConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        for (field, (lo, hi)) in [
            ("rating_range", self.rating_range),
            ("age_range", self.age_range),
            ("nps_range", self.nps_range),
        ] {
            if !(lo < hi) {
                return Err(ConfigValidationError::InvalidRange {
                    field: field.to_string(),
                    min: lo,
                    max: hi,
                });
            }
        }

        if self.rating_gross_error_threshold < self.rating_range.1 {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "rating_gross_error_threshold".to_string(),
                value: self.rating_gross_error_threshold,
            });
        }

        for (field, value) in [
            ("delivery_placeholder", self.delivery_placeholder),
            ("iqr_multiplier", self.iqr_multiplier),
            ("low_cost_threshold", self.low_cost_threshold),
            ("min_unit_cost", self.min_unit_cost),
        ] {
            if !(value > 0.0) {
                return Err(ConfigValidationError::InvalidThreshold {
                    field: field.to_string(),
                    value,
                });
            }
        }

        if !(self.revenue_tolerance >= 0.0) {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "revenue_tolerance".to_string(),
                value: self.revenue_tolerance,
            });
        }

        if self.default_shipping_status.trim().is_empty() {
            return Err(ConfigValidationError::EmptyDefault(
                "default_shipping_status".to_string(),
            ));
        }

        // Round-trip the reference date through each format to reject
        // formats chrono cannot parse back.
        for format in [&self.sale_date_format, &self.review_date_format] {
            let rendered = self.reference_date.format(format).to_string();
            if NaiveDate::parse_from_str(&rendered, format).ok() != Some(self.reference_date) {
                return Err(ConfigValidationError::InvalidDateFormat(format.clone()));
            }
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid range for '{field}': [{min}, {max}] (min must be below max)")]
    InvalidRange { field: String, min: f64, max: f64 },

    #[error("Invalid threshold for '{field}': {value}")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Default value for '{0}' must not be empty")]
    EmptyDefault(String),

    #[error("Date format '{0}' cannot round-trip a date")]
    InvalidDateFormat(String),
}

impl From<ConfigValidationError> for crate::error::AuditError {
    fn from(err: ConfigValidationError) -> Self {
        crate::error::AuditError::InvalidConfig(err.to_string())
    }
}

/// Builder for [`AuditConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct AuditConfigBuilder {
    reference_date: Option<NaiveDate>,
    delivery_placeholder: Option<f64>,
    low_cost_threshold: Option<f64>,
    min_unit_cost: Option<f64>,
    iqr_multiplier: Option<f64>,
    rating_range: Option<(f64, f64)>,
    rating_gross_error_threshold: Option<f64>,
    age_range: Option<(f64, f64)>,
    nps_range: Option<(f64, f64)>,
    revenue_tolerance: Option<f64>,
    default_shipping_status: Option<String>,
    sale_date_format: Option<String>,
    review_date_format: Option<String>,
    enable_cache: Option<bool>,
}

impl AuditConfigBuilder {
    /// Set the simulated "now" used by every future-date check.
    pub fn reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    /// Set the delivery-time placeholder sentinel.
    pub fn delivery_placeholder(mut self, value: f64) -> Self {
        self.delivery_placeholder = Some(value);
        self
    }

    /// Set the unit cost below which a cost is a capture error.
    pub fn low_cost_threshold(mut self, value: f64) -> Self {
        self.low_cost_threshold = Some(value);
        self
    }

    /// Set the floor applied to the lower IQR cost bound.
    pub fn min_unit_cost(mut self, value: f64) -> Self {
        self.min_unit_cost = Some(value);
        self
    }

    /// Set the IQR multiplier for outlier bounds.
    pub fn iqr_multiplier(mut self, value: f64) -> Self {
        self.iqr_multiplier = Some(value);
        self
    }

    /// Set the valid rating scale.
    pub fn rating_range(mut self, min: f64, max: f64) -> Self {
        self.rating_range = Some((min, max));
        self
    }

    /// Set the threshold above which a rating is a gross error.
    pub fn rating_gross_error_threshold(mut self, value: f64) -> Self {
        self.rating_gross_error_threshold = Some(value);
        self
    }

    /// Set the realistic customer age range.
    pub fn age_range(mut self, min: f64, max: f64) -> Self {
        self.age_range = Some((min, max));
        self
    }

    /// Set the NPS scale.
    pub fn nps_range(mut self, min: f64, max: f64) -> Self {
        self.nps_range = Some((min, max));
        self
    }

    /// Set the tolerance for the revenue-conservation check.
    pub fn revenue_tolerance(mut self, value: f64) -> Self {
        self.revenue_tolerance = Some(value);
        self
    }

    /// Set the status assigned to transactions without one.
    pub fn default_shipping_status(mut self, status: impl Into<String>) -> Self {
        self.default_shipping_status = Some(status.into());
        self
    }

    /// Set the chrono format of raw sale dates.
    pub fn sale_date_format(mut self, format: impl Into<String>) -> Self {
        self.sale_date_format = Some(format.into());
        self
    }

    /// Set the chrono format of raw review dates.
    pub fn review_date_format(mut self, format: impl Into<String>) -> Self {
        self.review_date_format = Some(format.into());
        self
    }

    /// Enable or disable result memoization in the orchestrator.
    pub fn enable_cache(mut self, enable: bool) -> Self {
        self.enable_cache = Some(enable);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `AuditConfig` or an error if validation fails.
    pub fn build(self) -> Result<AuditConfig, ConfigValidationError> {
        let defaults = AuditConfig::default();
        let config = AuditConfig {
            reference_date: self.reference_date.unwrap_or(defaults.reference_date),
            delivery_placeholder: self
                .delivery_placeholder
                .unwrap_or(defaults.delivery_placeholder),
            low_cost_threshold: self
                .low_cost_threshold
                .unwrap_or(defaults.low_cost_threshold),
            min_unit_cost: self.min_unit_cost.unwrap_or(defaults.min_unit_cost),
            iqr_multiplier: self.iqr_multiplier.unwrap_or(defaults.iqr_multiplier),
            rating_range: self.rating_range.unwrap_or(defaults.rating_range),
            rating_gross_error_threshold: self
                .rating_gross_error_threshold
                .unwrap_or(defaults.rating_gross_error_threshold),
            age_range: self.age_range.unwrap_or(defaults.age_range),
            nps_range: self.nps_range.unwrap_or(defaults.nps_range),
            revenue_tolerance: self
                .revenue_tolerance
                .unwrap_or(defaults.revenue_tolerance),
            default_shipping_status: self
                .default_shipping_status
                .unwrap_or(defaults.default_shipping_status),
            sale_date_format: self.sale_date_format.unwrap_or(defaults.sale_date_format),
            review_date_format: self
                .review_date_format
                .unwrap_or(defaults.review_date_format),
            enable_cache: self.enable_cache.unwrap_or(defaults.enable_cache),
        };

        config.validate()?;
        Ok(config)
    }
}
