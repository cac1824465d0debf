//! Result decoding for market-dash.
//!
//! Turns a raw columnar result set into typed records using an explicit
//! column coercion schema. Malformed data never fails a decode: bad numeric
//! cells become NULL and rows of the wrong width are skipped.

use std::collections::HashMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use tracing::warn;

use crate::service::{RawResultSet, RawRow};

/// A decoded cell value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Signed integer (up to i64).
    Int(i64),

    /// Text value.
    String(String),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int(i) => write!(f, "{i}"),
            Value::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// One decoded row: column name to value, in result column order.
///
/// Serializes as a JSON object whose keys follow column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field. A repeated column name overwrites the earlier value.
    pub fn insert(&mut self, column: impl Into<String>, value: Value) {
        let column = column.into();
        match self.fields.iter_mut().find(|(name, _)| *name == column) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.insert(column, value);
        }
        record
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// How a column's raw text is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnType {
    /// Passed through unchanged.
    #[default]
    Text,
    /// Parsed as a base-10 integer; unparsable text becomes NULL.
    Integer,
}

/// Column-name-keyed coercion rules. Columns not listed are text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoercionSchema {
    columns: HashMap<String, ColumnType>,
}

impl CoercionSchema {
    /// Creates a schema treating every column as text.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a schema with the given integer columns.
    pub fn with_integer_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        columns
            .into_iter()
            .fold(Self::new(), |schema, c| schema.with_column(c, ColumnType::Integer))
    }

    /// Integer columns of the dashboard's listings and owner-stats results.
    pub fn dashboard() -> Self {
        Self::with_integer_columns(["year", "selling_price", "km_driven", "avg_km"])
    }

    pub fn with_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.insert(name.into(), column_type);
        self
    }

    pub fn column_type(&self, name: &str) -> ColumnType {
        self.columns.get(name).copied().unwrap_or_default()
    }

    /// Applies the column's rule to one raw cell.
    pub fn coerce(&self, column: &str, cell: Option<&str>) -> Value {
        match (self.column_type(column), cell) {
            (_, None) => Value::Null,
            (ColumnType::Integer, Some(text)) => parse_leading_int(text).into(),
            (ColumnType::Text, Some(text)) => Value::String(text.to_string()),
        }
    }
}

/// Parses the leading base-10 integer of `text`.
///
/// Leading whitespace and one sign are accepted; anything after the digits
/// is ignored, so `"45321.7"` yields 45321. No digits or i64 overflow
/// yields `None`.
pub fn parse_leading_int(text: &str) -> Option<i64> {
    let trimmed = text.trim_start();
    let sign_len = match trimmed.as_bytes().first() {
        Some(b'+') | Some(b'-') => 1,
        _ => 0,
    };
    let digits = trimmed[sign_len..]
        .bytes()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    trimmed[..sign_len + digits].parse().ok()
}

/// A locally absorbed problem found while decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeAnomaly {
    /// Row width differs from the column count; the row was skipped.
    RowShape {
        /// Position in the raw row list, header row included.
        row: usize,
        expected: usize,
        actual: usize,
    },
}

impl fmt::Display for DecodeAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RowShape {
                row,
                expected,
                actual,
            } => write!(
                f,
                "row {row} has {actual} cells but the result has {expected} columns"
            ),
        }
    }
}

/// Records plus whatever anomalies were absorbed producing them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeOutcome {
    pub records: Vec<Record>,
    pub anomalies: Vec<DecodeAnomaly>,
}

/// Converts raw result rows into records under a coercion schema.
#[derive(Debug, Clone, Default)]
pub struct ResultDecoder {
    schema: CoercionSchema,
}

impl ResultDecoder {
    pub fn new(schema: CoercionSchema) -> Self {
        Self { schema }
    }

    /// Decodes rows into records, in input order.
    ///
    /// With `skip_header_row` the first row is dropped as the service's
    /// header duplicate.
    pub fn decode(&self, columns: &[String], rows: &[RawRow], skip_header_row: bool) -> Vec<Record> {
        self.decode_with_report(columns, rows, skip_header_row)
            .records
    }

    /// Like [`decode`](Self::decode), also reporting skipped rows.
    pub fn decode_with_report(
        &self,
        columns: &[String],
        rows: &[RawRow],
        skip_header_row: bool,
    ) -> DecodeOutcome {
        let offset = usize::from(skip_header_row && !rows.is_empty());
        let mut outcome = DecodeOutcome {
            records: Vec::with_capacity(rows.len().saturating_sub(offset)),
            anomalies: Vec::new(),
        };

        for (index, row) in rows.iter().enumerate().skip(offset) {
            if row.len() != columns.len() {
                let anomaly = DecodeAnomaly::RowShape {
                    row: index,
                    expected: columns.len(),
                    actual: row.len(),
                };
                warn!("Skipping malformed row: {}", anomaly);
                outcome.anomalies.push(anomaly);
                continue;
            }

            let record: Record = columns
                .iter()
                .zip(row)
                .map(|(column, cell)| {
                    (column.as_str(), self.schema.coerce(column, cell.as_deref()))
                })
                .collect();
            outcome.records.push(record);
        }

        outcome
    }

    /// Decodes a whole result set as returned by the service.
    pub fn decode_result_set(&self, result: &RawResultSet, skip_header_row: bool) -> DecodeOutcome {
        self.decode_with_report(&result.columns, &result.rows, skip_header_row)
    }
}
