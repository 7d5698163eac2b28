use std::sync::LazyLock;

use regex::Regex;

use crate::types::{ColumnType, SqlValue};

// `VARCHAR(255)`, `DECIMAL (10, 2)` -> base name
static PARAMETRIZED_TYPE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^([A-Z][A-Z0-9 ]*?)\s*\(.*\)$").ok());

/// Classify a declared column type. `None` means "infer from the row data".
#[must_use]
pub fn map_declared_type(decl_type: &str) -> Option<ColumnType> {
    let upper = decl_type.trim().to_ascii_uppercase();
    let base = PARAMETRIZED_TYPE
        .as_ref()
        .and_then(|re| re.captures(&upper))
        .and_then(|caps| caps.get(1))
        .map_or(upper.as_str(), |m| m.as_str());

    match base {
        "" | "NULL" => None,
        "DECIMAL" | "NUMERIC" => Some(ColumnType::Numeric),
        "FLOAT" => Some(ColumnType::Float),
        "DOUBLE" | "DOUBLE PRECISION" | "REAL" => Some(ColumnType::Double),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "INTEGER" | "SERIAL" | "INT2" => {
            Some(ColumnType::Int32)
        }
        "BIGINT" | "UNSIGNED BIG INT" | "INT8" => Some(ColumnType::Int64),
        "DATETIME" | "TIMESTAMP" => Some(ColumnType::DateTime),
        "TIME" => Some(ColumnType::Time),
        "DATE" => Some(ColumnType::Date),
        "TEXT" | "CLOB" | "CHARACTER" | "VARCHAR" | "VARYING CHARACTER" | "NCHAR"
        | "NATIVE CHARACTER" | "NVARCHAR" => Some(ColumnType::Text),
        "BLOB" => Some(ColumnType::Bytes),
        "BOOLEAN" => Some(ColumnType::Boolean),
        "JSON" | "JSONB" => Some(ColumnType::Json),
        _ => {
            tracing::debug!(decl_type, "unknown declared column type; inferring from data");
            None
        }
    }
}

/// Resolve one [`ColumnType`] per declared type.
///
/// Declared types that classify are used as-is and the rows are never consulted for them.
/// The rest are inferred from the first non-null cell in that column, defaulting to
/// [`ColumnType::Int32`] when no row has one.
#[must_use]
pub fn resolve_column_types(declared_types: &[String], rows: &[Vec<SqlValue>]) -> Vec<ColumnType> {
    declared_types
        .iter()
        .enumerate()
        .map(|(idx, decl)| {
            map_declared_type(decl).unwrap_or_else(|| infer_column_type(idx, rows))
        })
        .collect()
}

fn infer_column_type(idx: usize, rows: &[Vec<SqlValue>]) -> ColumnType {
    rows.iter()
        .filter_map(|row| row.get(idx))
        .find(|value| !value.is_null())
        .map_or(ColumnType::Int32, infer_value_type)
}

fn infer_value_type(value: &SqlValue) -> ColumnType {
    match value {
        SqlValue::Text(_) => ColumnType::Text,
        SqlValue::BigInt(_) => ColumnType::Int64,
        SqlValue::Bool(_) => ColumnType::Boolean,
        SqlValue::Int(_) => ColumnType::Int32,
        SqlValue::Float(f) if f.fract() == 0.0 => ColumnType::Int32,
        SqlValue::Float(_) => ColumnType::Double,
        SqlValue::Bytes(_) => ColumnType::Bytes,
        SqlValue::Null | SqlValue::DateTime(_) | SqlValue::Json(_) => ColumnType::Text,
    }
}
