use chrono::{DateTime, FixedOffset};
use clap::ValueEnum;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Canonical, engine-independent classification of a result column.
///
/// Every column of a [`SqlResultSet`] carries exactly one of these so the caller can decode
/// the loosely-typed cell values without knowing which engine produced them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColumnType {
    Int32,
    Int64,
    Float,
    Double,
    Numeric,
    Text,
    Bytes,
    Boolean,
    DateTime,
    Date,
    Time,
    Json,
}

/// Scalar-type hint attached to a bound parameter by the calling layer.
///
/// Hints only matter when the raw value is ambiguous, e.g. a decimal or a 64-bit integer
/// carried as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Int,
    BigInt,
    Float,
    Decimal,
    Boolean,
    Enum,
    Uuid,
    Json,
    DateTime,
    Bytes,
    #[serde(other)]
    Unknown,
}

/// Values bound as query arguments or returned as result cells.
///
/// The same enum is used in both directions so helpers never need to branch on driver types:
/// ```rust
/// use embedded_sql_adapter::prelude::*;
///
/// let args = vec![
///     QueryArg::new(SqlValue::Int(1)),
///     QueryArg::hinted(SqlValue::Text("9007199254740993".into()), ScalarType::BigInt),
/// ];
/// # let _ = args;
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "JsonValue")]
pub enum SqlValue {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Whole number that fits an ordinary (32-bit) integer
    Int(i64),
    /// Native 64-bit integer; stringified before it leaves the adapter
    BigInt(i64),
    /// Floating point value (64-bit)
    Float(f64),
    /// Text/string value
    Text(String),
    /// Binary data, serialized as an ordered sequence of byte values
    Bytes(Vec<u8>),
    /// Native date value
    DateTime(DateTime<FixedOffset>),
    /// JSON value
    Json(JsonValue),
}

impl SqlValue {
    /// Check if this value is NULL
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            SqlValue::Int(value) | SqlValue::BigInt(value) => Some(*value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(&self) -> Option<f64> {
        if let SqlValue::Float(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        if let SqlValue::Text(value) = self {
            Some(value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let SqlValue::Bytes(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }
}

impl From<JsonValue> for SqlValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => SqlValue::Null,
            JsonValue::Bool(b) => SqlValue::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    if i32::try_from(i).is_ok() {
                        SqlValue::Int(i)
                    } else {
                        SqlValue::BigInt(i)
                    }
                } else {
                    // u64 beyond i64 and fractional numbers both land here
                    SqlValue::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => SqlValue::Text(s),
            JsonValue::Array(items) => match byte_array(&items) {
                Some(bytes) => SqlValue::Bytes(bytes),
                None => SqlValue::Json(JsonValue::Array(items)),
            },
            other @ JsonValue::Object(_) => SqlValue::Json(other),
        }
    }
}

fn byte_array(items: &[JsonValue]) -> Option<Vec<u8>> {
    items
        .iter()
        .map(|item| item.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect()
}

impl From<rusqlite::types::Value> for SqlValue {
    fn from(value: rusqlite::types::Value) -> Self {
        use rusqlite::types::Value;
        match value {
            Value::Null => SqlValue::Null,
            Value::Integer(i) if i32::try_from(i).is_ok() => SqlValue::Int(i),
            Value::Integer(i) => SqlValue::BigInt(i),
            Value::Real(f) => SqlValue::Float(f),
            Value::Text(s) => SqlValue::Text(s),
            Value::Blob(b) => SqlValue::Bytes(b),
        }
    }
}

impl Serialize for SqlValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SqlValue::Null => serializer.serialize_unit(),
            SqlValue::Bool(b) => serializer.serialize_bool(*b),
            SqlValue::Int(i) | SqlValue::BigInt(i) => serializer.serialize_i64(*i),
            SqlValue::Float(f) => serializer.serialize_f64(*f),
            SqlValue::Text(s) => serializer.serialize_str(s),
            SqlValue::Bytes(bytes) => {
                let mut seq = serializer.serialize_seq(Some(bytes.len()))?;
                for byte in bytes {
                    seq.serialize_element(byte)?;
                }
                seq.end()
            }
            SqlValue::DateTime(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            SqlValue::Json(json) => json.serialize(serializer),
        }
    }
}

/// A bound parameter: the value plus the optional hint describing its logical type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryArg {
    pub value: SqlValue,
    #[serde(default)]
    pub scalar_type: Option<ScalarType>,
}

impl QueryArg {
    #[must_use]
    pub fn new(value: SqlValue) -> Self {
        Self {
            value,
            scalar_type: None,
        }
    }

    #[must_use]
    pub fn hinted(value: SqlValue, scalar_type: ScalarType) -> Self {
        Self {
            value,
            scalar_type: Some(scalar_type),
        }
    }
}

/// Query text plus its positional arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SqlQuery {
    pub sql: String,
    #[serde(default)]
    pub args: Vec<QueryArg>,
}

impl SqlQuery {
    /// A query without arguments.
    #[must_use]
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_args(sql: impl Into<String>, args: Vec<QueryArg>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    /// Append an argument without a scalar-type hint.
    #[must_use]
    pub fn arg(mut self, value: SqlValue) -> Self {
        self.args.push(QueryArg::new(value));
        self
    }

    /// Append an argument with a scalar-type hint.
    #[must_use]
    pub fn hinted_arg(mut self, value: SqlValue, scalar_type: ScalarType) -> Self {
        self.args.push(QueryArg::hinted(value, scalar_type));
        self
    }
}

/// A fully materialized query result.
///
/// `column_names` and `column_types` are aligned 1:1 and every row has exactly
/// `column_names.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlResultSet {
    pub column_names: Vec<String>,
    pub column_types: Vec<ColumnType>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl SqlResultSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get the index of a column by name
    #[must_use]
    pub fn column_index(&self, column_name: &str) -> Option<usize> {
        self.column_names.iter().position(|col| col == column_name)
    }

    /// Get a cell by row index and column name
    #[must_use]
    pub fn get(&self, row: usize, column_name: &str) -> Option<&SqlValue> {
        let idx = self.column_index(column_name)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }
}

/// Transaction isolation levels a caller may request.
///
/// The embedded engine only implements `Serializable`; anything else is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Snapshot,
    Serializable,
}

/// Options the upper layer reads off an open transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionOptions {
    /// Whether BEGIN must be emulated with a phantom query instead of being issued natively.
    pub use_phantom_query: bool,
}

/// Static facts about the backend behind an adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub provider: &'static str,
    pub adapter_name: &'static str,
    pub schema_name: Option<String>,
}
