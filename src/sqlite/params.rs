use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Value;

use crate::types::{QueryArg, ScalarType, SqlQuery, SqlValue};

// Explicit numeric offset instead of `Z`; SQLite's date functions only understand the former.
const SQLITE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f+00:00";

/// Encode the query's arguments into engine-native values, one per argument, in order.
///
/// Hinted text that fails to parse (bigint, decimal, datetime, base64) is bound as the original
/// text; the engine is left to report any real mismatch.
#[must_use]
pub fn map_args(query: &SqlQuery) -> Vec<Value> {
    query.args.iter().map(map_arg).collect()
}

/// Encode a single argument.
#[must_use]
pub fn map_arg(arg: &QueryArg) -> Value {
    match (&arg.value, arg.scalar_type) {
        (SqlValue::Null, _) => Value::Null,
        (SqlValue::Text(s), Some(ScalarType::BigInt)) => s
            .trim()
            .parse::<i64>()
            .map_or_else(|_| Value::Text(s.clone()), Value::Integer),
        (SqlValue::Text(s), Some(ScalarType::Decimal)) => s
            .trim()
            .parse::<f64>()
            .map_or_else(|_| Value::Text(s.clone()), Value::Real),
        (SqlValue::Text(s), Some(ScalarType::DateTime)) => parse_datetime(s)
            .map_or_else(|| Value::Text(s.clone()), |dt| Value::Text(format_datetime(dt))),
        (SqlValue::DateTime(dt), _) => Value::Text(format_datetime(dt.with_timezone(&Utc))),
        (SqlValue::Text(s), Some(ScalarType::Bytes)) => STANDARD
            .decode(s)
            .map_or_else(|_| Value::Text(s.clone()), Value::Blob),
        (SqlValue::Bytes(bytes), _) => Value::Blob(bytes.clone()),
        (SqlValue::Bool(b), _) => Value::Integer(i64::from(*b)),
        (SqlValue::Int(i) | SqlValue::BigInt(i), _) => Value::Integer(*i),
        (SqlValue::Float(f), _) => Value::Real(*f),
        (SqlValue::Text(s), _) => Value::Text(s.clone()),
        (SqlValue::Json(json), _) => Value::Text(json.to_string()),
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // offset-less timestamps are taken as UTC
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.format(SQLITE_DATETIME_FORMAT).to_string()
}
