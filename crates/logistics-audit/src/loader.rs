//! CSV loading for the three source datasets.
//!
//! Reads a file with polars, renames source headers to canonical column
//! names and checks the columns the dataset's cleaner needs.

use crate::error::{AuditError, Result};
use crate::schema::{canonical_name, missing_columns};
use crate::types::DatasetKind;
use polars::prelude::*;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

const INFER_SCHEMA_ROWS: usize = 100;

/// Load `path` as the given dataset.
///
/// Any failure here is fatal for the run: unreadable files become
/// [`AuditError::Load`], absent columns [`AuditError::MissingColumns`].
pub fn load_csv(path: impl AsRef<Path>, dataset: DatasetKind) -> Result<DataFrame> {
    let path = path.as_ref();
    let path_str = path.display().to_string();
    info!("Loading {} from {}", dataset, path_str);

    let df = read_with_fallbacks(path).map_err(|reason| AuditError::Load {
        path: path_str.clone(),
        reason,
    })?;
    let df = canonicalize(df, dataset)?;

    info!("{}: {} rows x {} columns", dataset, df.height(), df.width());
    Ok(df)
}

/// Parse CSV `content` already in memory as the given dataset.
pub fn parse_csv(content: &str, dataset: DatasetKind) -> Result<DataFrame> {
    let df = read_content(content.to_string()).map_err(|e| AuditError::Load {
        path: format!("<{} content>", dataset),
        reason: e.to_string(),
    })?;
    canonicalize(df, dataset)
}

/// Standard read first; on failure, retry with doubled quotes and blank
/// lines stripped.
fn read_with_fallbacks(path: &Path) -> std::result::Result<DataFrame, String> {
    let standard = CsvReadOptions::default()
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .and_then(|reader| reader.finish());

    match standard {
        Ok(df) => return Ok(df),
        Err(e) => debug!("Standard loading failed: {}", e),
    }

    let content = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    read_content(clean_csv_content(&content)).map_err(|e| e.to_string())
}

fn read_content(content: String) -> PolarsResult<DataFrame> {
    CsvReadOptions::default()
        .with_infer_schema_length(Some(INFER_SCHEMA_ROWS))
        .with_has_header(true)
        .into_reader_with_file_handle(Cursor::new(content))
        .finish()
}

fn clean_csv_content(content: &str) -> String {
    content
        .replace("\"\"\"", "\"")
        .replace("\"\"", "\"")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rename source headers to canonical names, then check required columns.
fn canonicalize(mut df: DataFrame, dataset: DatasetKind) -> Result<DataFrame> {
    let headers: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    for header in &headers {
        let canonical = canonical_name(header);
        if canonical != header {
            debug!("Renaming column '{}' to '{}'", header, canonical);
            df.rename(header, canonical.into())?;
        }
    }

    let missing = missing_columns(
        dataset,
        df.get_column_names().iter().map(|name| name.as_str()),
    );
    if !missing.is_empty() {
        return Err(AuditError::MissingColumns {
            dataset: dataset.to_string(),
            columns: missing,
        });
    }
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::feedback;
    use pretty_assertions::assert_eq;

    const FEEDBACK_CSV: &str = "\
Transaccion_ID,Rating_Producto,Rating_Logistica,Edad_Cliente,Recomienda_Marca,Ticket_Soporte_Abierto,Satisfaccion_NPS
T1,4,5,34,SI,No,80
T2,99,3,195,N/A,Sí,-10
";

    #[test]
    fn test_parse_renames_source_headers() {
        let df = parse_csv(FEEDBACK_CSV, DatasetKind::Feedback).unwrap();
        assert_eq!(df.height(), 2);
        for column in [
            feedback::TRANSACTION_ID,
            feedback::PRODUCT_RATING,
            feedback::SUPPORT_TICKET_OPEN,
            feedback::NPS,
        ] {
            assert!(df.column(column).is_ok(), "{column}");
        }
    }

    #[test]
    fn test_canonical_headers_pass_through() {
        let csv = "TransactionID,ProductRating,LogisticsRating,CustomerAge,RecommendsBrand,SupportTicketOpen,NPS\nT1,4,5,34,Yes,0,10\n";
        let df = parse_csv(csv, DatasetKind::Feedback).unwrap();
        assert_eq!(df.width(), 7);
    }

    #[test]
    fn test_missing_columns_reported() {
        let csv = "Transaccion_ID,Rating_Producto\nT1,4\n";
        let err = parse_csv(csv, DatasetKind::Feedback).unwrap_err();
        assert_eq!(err.error_code(), "MISSING_COLUMNS");
        assert!(err.to_string().contains("NPS"));
    }

    #[test]
    fn test_missing_file_is_load_failure() {
        let err = load_csv("does/not/exist.csv", DatasetKind::Inventory).unwrap_err();
        assert_eq!(err.error_code(), "LOAD_FAILED");
        assert!(err.is_load_failure());
    }

    #[test]
    fn test_clean_csv_content() {
        let cleaned = clean_csv_content("a,b\n\n\"\"x\"\",1\n");
        assert_eq!(cleaned, "a,b\n\"x\",1");
    }
}
