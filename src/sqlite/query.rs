use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Statement;
use rusqlite::types::Value;

use crate::error::AdapterError;
use crate::types::{ColumnType, SqlResultSet, SqlValue};

use super::column_types::resolve_column_types;

/// Bring raw engine cells in line with their resolved column types.
///
/// Never fails: a cell that does not fit its column type is passed through unchanged and left
/// for the caller's schema validation to judge. Marshalling an already-marshalled row is a
/// no-op.
#[must_use]
pub fn map_row(row: Vec<SqlValue>, column_types: &[ColumnType]) -> Vec<SqlValue> {
    row.into_iter()
        .enumerate()
        .map(|(idx, value)| map_value(value, column_types.get(idx).copied()))
        .collect()
}

fn map_value(value: SqlValue, column_type: Option<ColumnType>) -> SqlValue {
    match (value, column_type) {
        // already an ordered byte sequence; nothing to materialize
        (value @ SqlValue::Bytes(_), _) => value,
        (SqlValue::Float(f), Some(column_type @ (ColumnType::Int32 | ColumnType::Int64)))
            if f.fract() != 0.0 =>
        {
            // re-run so the integer lands in its final (possibly stringified) shape
            match whole_number(f) {
                Some(i) => map_value(SqlValue::from(Value::Integer(i)), Some(column_type)),
                None => SqlValue::Float(f),
            }
        }
        (SqlValue::Int(ms) | SqlValue::BigInt(ms), Some(ColumnType::DateTime)) => {
            epoch_millis_to_iso(ms).unwrap_or(SqlValue::Int(ms))
        }
        (SqlValue::Float(ms), Some(ColumnType::DateTime)) => whole_number(ms)
            .and_then(epoch_millis_to_iso)
            .unwrap_or(SqlValue::Float(ms)),
        (SqlValue::BigInt(i), _) | (SqlValue::Int(i), Some(ColumnType::Int64)) => {
            SqlValue::Text(i.to_string())
        }
        (value, _) => value,
    }
}

/// `f` truncated toward zero, or `None` when it is not finite or does not fit an `i64`.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn whole_number(f: f64) -> Option<i64> {
    let t = f.trunc();
    (t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64).then_some(t as i64)
}

fn epoch_millis_to_iso(ms: i64) -> Option<SqlValue> {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|dt| SqlValue::Text(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
}

/// Run a prepared statement and eagerly materialize every row into a [`SqlResultSet`].
///
/// Column types come from the statement's declared types where those classify, otherwise from
/// the returned rows.
///
/// # Errors
/// Returns `AdapterError::SqliteError` if binding, stepping, or reading a cell fails.
pub fn build_result_set(
    stmt: &mut Statement<'_>,
    params: &[Value],
) -> Result<SqlResultSet, AdapterError> {
    let column_names: Vec<String> = stmt
        .column_names()
        .iter()
        .map(std::string::ToString::to_string)
        .collect();
    let declared_types: Vec<String> = stmt
        .columns()
        .iter()
        .map(|col| col.decl_type().unwrap_or_default().to_string())
        .collect();
    let col_count = column_names.len();

    let mut raw_rows = Vec::new();
    let mut rows_iter = stmt.query(rusqlite::params_from_iter(params.iter()))?;
    while let Some(row) = rows_iter.next()? {
        let mut row_values = Vec::with_capacity(col_count);
        for i in 0..col_count {
            let value: Value = row.get(i)?;
            row_values.push(SqlValue::from(value));
        }
        raw_rows.push(row_values);
    }

    let column_types = resolve_column_types(&declared_types, &raw_rows);
    let rows = raw_rows
        .into_iter()
        .map(|row| map_row(row, &column_types))
        .collect();

    Ok(SqlResultSet {
        column_names,
        column_types,
        rows,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn datetime_millis_become_iso_text() {
        let row = map_row(vec![SqlValue::BigInt(1_700_000_000_000)], &[ColumnType::DateTime]);
        assert_eq!(row, vec![SqlValue::Text("2023-11-14T22:13:20.000Z".into())]);
    }

    #[test]
    fn fractional_floats_in_integer_columns_truncate_toward_zero() {
        let row = map_row(
            vec![
                SqlValue::Float(7.9),
                SqlValue::Float(-7.9),
                SqlValue::Float(7.9),
                SqlValue::Float(5_000_000_000.5),
            ],
            &[
                ColumnType::Int32,
                ColumnType::Int64,
                ColumnType::Double,
                ColumnType::Int32,
            ],
        );
        assert_eq!(
            row,
            vec![
                SqlValue::Int(7),
                SqlValue::Text("-7".into()),
                SqlValue::Float(7.9),
                SqlValue::Text("5000000000".into()),
            ]
        );
    }

    #[test]
    fn non_finite_floats_pass_through() {
        let row = vec![
            SqlValue::Float(f64::INFINITY),
            SqlValue::Float(f64::NEG_INFINITY),
            SqlValue::Float(1e300),
        ];
        let types = [ColumnType::DateTime, ColumnType::DateTime, ColumnType::DateTime];
        assert_eq!(map_row(row.clone(), &types), row);

        let mapped = map_row(vec![SqlValue::Float(f64::NAN)], &[ColumnType::Int32]);
        assert!(matches!(mapped[0], SqlValue::Float(f) if f.is_nan()));
    }

    #[test]
    fn big_integers_are_stringified_regardless_of_column_type() {
        let row = map_row(
            vec![SqlValue::BigInt(9_007_199_254_740_993), SqlValue::BigInt(-5_000_000_000)],
            &[ColumnType::Int64, ColumnType::Text],
        );
        assert_eq!(
            row,
            vec![
                SqlValue::Text("9007199254740993".into()),
                SqlValue::Text("-5000000000".into()),
            ]
        );
    }

    #[test]
    fn small_integers_in_int64_columns_are_stringified() {
        let row = map_row(
            vec![SqlValue::Int(5), SqlValue::Int(5)],
            &[ColumnType::Int64, ColumnType::Int32],
        );
        assert_eq!(row, vec![SqlValue::Text("5".into()), SqlValue::Int(5)]);
    }

    #[test]
    fn mismatches_pass_through() {
        let row = vec![
            SqlValue::Text("not a date".into()),
            SqlValue::Bytes(vec![0xde, 0xad]),
            SqlValue::Int(3),
            SqlValue::Null,
        ];
        let types = [
            ColumnType::DateTime,
            ColumnType::Int32,
            ColumnType::Boolean,
            ColumnType::DateTime,
        ];
        assert_eq!(map_row(row.clone(), &types), row);
    }

    #[test]
    fn missing_column_type_still_maps() {
        let row = map_row(vec![SqlValue::BigInt(i64::MIN)], &[]);
        assert_eq!(row, vec![SqlValue::Text(i64::MIN.to_string())]);
    }

    #[test]
    fn marshalling_is_idempotent() {
        let types = [
            ColumnType::DateTime,
            ColumnType::Int64,
            ColumnType::Int32,
            ColumnType::Bytes,
            ColumnType::Text,
        ];
        let raw = vec![
            SqlValue::Int(1_000),
            SqlValue::BigInt(1 << 40),
            SqlValue::Float(2.5),
            SqlValue::Bytes(vec![1, 2, 3]),
            SqlValue::Text("x".into()),
        ];
        let once = map_row(raw, &types);
        let twice = map_row(once.clone(), &types);
        assert_eq!(once, twice);
    }

    #[test]
    fn bytes_serialize_as_ordered_byte_values() {
        let row = map_row(vec![SqlValue::Bytes(vec![0, 127, 255])], &[ColumnType::Bytes]);
        let json = serde_json::to_value(&row).expect("serialize");
        assert_eq!(json, serde_json::json!([[0, 127, 255]]));
    }
}
