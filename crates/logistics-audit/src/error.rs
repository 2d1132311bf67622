//! Error types for the audit pipeline.
//!
//! Only load failures and broken tables are errors. Unparseable values,
//! missing imputation groups and orphaned SKUs are data states that the
//! repair rules handle locally, and integrity-check failures are reported
//! as statuses rather than raised.
//!
//! Errors serialize as `{ code, message }` so a presentation layer can show
//! them without matching on the enum.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the audit pipeline.
#[derive(Error, Debug)]
pub enum AuditError {
    /// Column was not found in the table.
    #[error("Column '{0}' not found in table")]
    ColumnNotFound(String),

    /// A loaded table lacks columns the cleaner for that dataset requires.
    #[error("Dataset '{dataset}' is missing required columns: {}", columns.join(", "))]
    MissingColumns {
        dataset: String,
        columns: Vec<String>,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A source table could not be loaded.
    #[error("Failed to load '{path}': {reason}")]
    Load { path: String, reason: String },

    /// A repair rule could not be applied.
    #[error("Repair of field '{field}' failed: {reason}")]
    RepairFailed { field: String, reason: String },

    /// The run was cancelled through its cancellation token.
    #[error("Audit was cancelled")]
    Cancelled,

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<AuditError>,
    },
}

impl AuditError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        AuditError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Stable error code for callers that branch on the failure kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::MissingColumns { .. } => "MISSING_COLUMNS",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Load { .. } => "LOAD_FAILED",
            Self::RepairFailed { .. } => "REPAIR_FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// True when the failure happened while materializing an input table.
    ///
    /// Load failures are fatal for the whole run; no partial result exists.
    pub fn is_load_failure(&self) -> bool {
        match self {
            Self::Load { .. } | Self::MissingColumns { .. } | Self::Io(_) => true,
            Self::WithContext { source, .. } => source.is_load_failure(),
            _ => false,
        }
    }
}

impl Serialize for AuditError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("AuditError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for audit operations.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| AuditError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            AuditError::ColumnNotFound("SKU_ID".to_string()).error_code(),
            "COLUMN_NOT_FOUND"
        );
        assert_eq!(
            AuditError::InvalidConfig("bad".to_string()).error_code(),
            "INVALID_CONFIG"
        );
    }

    #[test]
    fn test_missing_columns_message() {
        let error = AuditError::MissingColumns {
            dataset: "inventory".to_string(),
            columns: vec!["SKU_ID".to_string(), "Category".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "Dataset 'inventory' is missing required columns: SKU_ID, Category"
        );
    }

    #[test]
    fn test_is_load_failure() {
        let load = AuditError::Load {
            path: "inventario.csv".to_string(),
            reason: "not found".to_string(),
        };
        assert!(load.is_load_failure());
        assert!(load.with_context("Loading inventory").is_load_failure());
        assert!(!AuditError::ColumnNotFound("x".to_string()).is_load_failure());
    }

    #[test]
    fn test_error_serialization() {
        let error = AuditError::ColumnNotFound("FinalSalePrice".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("FinalSalePrice"));
    }

    #[test]
    fn test_with_context() {
        let error =
            AuditError::ColumnNotFound("SaleDate".to_string()).with_context("During validation");
        assert!(error.to_string().contains("During validation"));
        assert_eq!(error.error_code(), "COLUMN_NOT_FOUND");
    }
}
