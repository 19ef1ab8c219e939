//! Polars helpers for text-typed survey frames.
//!
//! Survey datasets are carried as all-text frames: raw codes, labels and
//! taxonomy markers share one representation, and numeric coercion is a
//! recode decision rather than a parsing accident.

use polars::prelude::{AnyValue, Column, DataFrame, DataType, IntoColumn, NamedFrom, Series};
use survey_model::format_numeric;
use tracing::warn;

use crate::error::{IngestError, Result};

/// Converts a Polars AnyValue to a String representation.
/// Returns empty string for Null, properly formats numeric types.
pub fn any_to_string(value: AnyValue<'_>) -> String {
    match value {
        AnyValue::Null => String::new(),
        AnyValue::Int8(v) => v.to_string(),
        AnyValue::Int16(v) => v.to_string(),
        AnyValue::Int32(v) => v.to_string(),
        AnyValue::Int64(v) => v.to_string(),
        AnyValue::UInt8(v) => v.to_string(),
        AnyValue::UInt16(v) => v.to_string(),
        AnyValue::UInt32(v) => v.to_string(),
        AnyValue::UInt64(v) => v.to_string(),
        AnyValue::Float32(v) => format_numeric(f64::from(v)),
        AnyValue::Float64(v) => format_numeric(v),
        AnyValue::String(s) => s.to_string(),
        AnyValue::StringOwned(s) => s.to_string(),
        AnyValue::Boolean(b) => if b { "1" } else { "0" }.to_string(),
        other => other.to_string(),
    }
}

/// Converts AnyValue to String, returning None if the result is empty.
pub fn any_to_string_non_empty(value: AnyValue<'_>) -> Option<String> {
    let s = any_to_string(value);
    if s.trim().is_empty() { None } else { Some(s) }
}

/// Column names of a frame in frame order.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

/// Read a column as optional text cells, whatever its dtype.
pub fn column_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df
        .column(name)
        .map_err(|_| IngestError::ColumnNotFound(name.to_string()))?;
    if matches!(column.dtype(), DataType::String) {
        return Ok(column
            .str()?
            .into_iter()
            .map(|value| value.map(str::to_string))
            .collect());
    }
    let mut values = Vec::with_capacity(column.len());
    for idx in 0..column.len() {
        values.push(any_to_string_non_empty(column.get(idx)?));
    }
    Ok(values)
}

/// Build a text column from optional cells.
pub fn text_column(name: &str, values: Vec<Option<String>>) -> Column {
    Series::new(name.into(), values).into_column()
}

/// Replace (or append) a text column.
pub fn replace_column(df: &mut DataFrame, name: &str, values: Vec<Option<String>>) -> Result<()> {
    df.with_column(text_column(name, values))?;
    Ok(())
}

/// Build a frame from named text columns, preserving order.
pub fn frame_from_columns(columns: Vec<(String, Vec<Option<String>>)>) -> Result<DataFrame> {
    let columns: Vec<Column> = columns
        .into_iter()
        .map(|(name, values)| text_column(&name, values))
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Stable record identifiers for audit logs.
///
/// Uses `id_column` when present; rows without an id (or frames without the
/// column) fall back to their 1-based row number.
pub fn record_ids(df: &DataFrame, id_column: Option<&str>) -> Vec<String> {
    let ids = id_column.and_then(|name| {
        if !has_column(df, name) {
            warn!(column = name, "id column not found, falling back to row numbers");
            return None;
        }
        column_values(df, name).ok()
    });
    (0..df.height())
        .map(|idx| {
            ids.as_ref()
                .and_then(|values| values[idx].clone())
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| (idx + 1).to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataFrame {
        frame_from_columns(vec![
            (
                "ID".to_string(),
                vec![Some("S1".to_string()), None, Some("S3".to_string())],
            ),
            (
                "ST001".to_string(),
                vec![Some("1".to_string()), Some("95".to_string()), None],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn reads_text_columns() {
        let df = sample();
        let values = column_values(&df, "ST001").unwrap();
        assert_eq!(values, vec![Some("1".to_string()), Some("95".to_string()), None]);
        assert!(column_values(&df, "NOPE").is_err());
    }

    #[test]
    fn reads_numeric_columns_as_text() {
        let df = DataFrame::new(vec![
            Series::new("AGE".into(), &[15.0f64, 16.5]).into_column(),
        ])
        .unwrap();
        let values = column_values(&df, "AGE").unwrap();
        assert_eq!(values, vec![Some("15".to_string()), Some("16.5".to_string())]);
    }

    #[test]
    fn record_ids_fall_back_to_row_numbers() {
        let df = sample();
        assert_eq!(record_ids(&df, Some("ID")), vec!["S1", "2", "S3"]);
        assert_eq!(record_ids(&df, None), vec!["1", "2", "3"]);
        assert_eq!(record_ids(&df, Some("MISSING")), vec!["1", "2", "3"]);
    }

    #[test]
    fn replace_column_keeps_position() {
        let mut df = sample();
        replace_column(&mut df, "ST001", vec![None, None, Some("x".to_string())]).unwrap();
        assert_eq!(column_names(&df), vec!["ID", "ST001"]);
        assert_eq!(column_values(&df, "ST001").unwrap()[2].as_deref(), Some("x"));
    }
}
