//! Domain models for the batch loading pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`JobDefinition`] - Configuration of one batch run
//! - [`FieldMapping`] - One target column's full configuration
//! - [`MatchRule`] - Alternate source column name or pattern for a mapping
//! - [`FieldIndex`] - One column discovered in the uploaded file
//! - [`TargetType`] - Semantic data type of a target column
//! - [`SourceRow`] - One row handed over by a reader

pub mod job;
pub mod mapping;

pub use job::{JobDefinition, MergeColumn, MergePlan};
pub use mapping::{DefaultKind, FieldMapping, MatchRule};

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// A cleaned record: column name to typed value, in schema order.
pub type Record = Map<String, Value>;

// =============================================================================
// Source Fields
// =============================================================================

/// Index of the synthetic "nothing selected" entry.
pub const UNSELECTED_INDEX: i32 = -1;

/// Name of the synthetic "nothing selected" entry.
pub const UNSELECTED_NAME: &str = "- Unselected -";

/// A column discovered in the uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldIndex {
    pub name: String,
    pub index: i32,
}

impl FieldIndex {
    pub fn new(name: impl Into<String>, index: i32) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }

    /// The sentinel seeded at the front of every source field list.
    pub fn unselected() -> Self {
        Self::new(UNSELECTED_NAME, UNSELECTED_INDEX)
    }

    pub fn is_unselected(&self) -> bool {
        self.index < 0
    }

    /// Column position, or `None` for the sentinel.
    pub fn position(&self) -> Option<usize> {
        usize::try_from(self.index).ok()
    }
}

// =============================================================================
// Policies
// =============================================================================

/// What to do when a row is rejected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Drop the row, count it, keep going.
    #[default]
    Skip,
    /// Stop the whole run.
    Abort,
}

impl FailurePolicy {
    /// Parse a policy name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "skip" => Some(Self::Skip),
            "abort" => Some(Self::Abort),
            _ => None,
        }
    }
}

// =============================================================================
// Target Types
// =============================================================================

/// Semantic data type of a target column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetType {
    #[default]
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
}

const TRUE_VALUES: [&str; 5] = ["true", "1", "yes", "y", "x"];
const FALSE_VALUES: [&str; 4] = ["false", "0", "no", "n"];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y%m%d", "%d/%m/%Y"];
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y%m%d%H%M%S"];

impl TargetType {
    /// Convert a raw cell value into this type.
    ///
    /// Null passes through. Blank strings become null for every type but
    /// [`TargetType::Text`].
    pub fn coerce(&self, value: Value) -> Result<Value, String> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        if let Value::String(s) = &value {
            if *self != TargetType::Text && s.trim().is_empty() {
                return Ok(Value::Null);
            }
        }

        match self {
            TargetType::Text => Some(match &value {
                Value::String(s) => Value::String(s.clone()),
                other => Value::String(display_value(other)),
            }),
            TargetType::Integer => coerce_integer(&value),
            TargetType::Decimal => coerce_decimal(&value),
            TargetType::Boolean => coerce_boolean(&value),
            TargetType::Date => coerce_date(&value),
            TargetType::DateTime => coerce_datetime(&value),
        }
        .ok_or_else(|| format!("cannot convert '{}' to {:?}", display_value(&value), self))
    }
}

fn coerce_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && in_i64_range(*f)).map(|f| f as i64))
            .map(Value::from),
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
        _ => None,
    }
}

/// `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
fn in_i64_range(f: f64) -> bool {
    f >= i64::MIN as f64 && f < i64::MAX as f64
}

fn coerce_decimal(value: &Value) -> Option<Value> {
    let f = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Number::from_f64(f).map(Value::Number)
}

fn coerce_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(b) => Some(Value::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(Value::Bool(true)),
            Some(0) => Some(Value::Bool(false)),
            _ => None,
        },
        Value::String(s) => {
            let lower = s.trim().to_lowercase();
            if TRUE_VALUES.contains(&lower.as_str()) {
                Some(Value::Bool(true))
            } else if FALSE_VALUES.contains(&lower.as_str()) {
                Some(Value::Bool(false))
            } else {
                None
            }
        }
        _ => None,
    }
}

fn coerce_date(value: &Value) -> Option<Value> {
    let s = value.as_str()?.trim();
    let date = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))?;
    Some(Value::String(date.format("%Y-%m-%d").to_string()))
}

fn coerce_datetime(value: &Value) -> Option<Value> {
    let s = value.as_str()?.trim();
    let dt = parse_datetime(s).or_else(|| {
        DATE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })?;
    Some(Value::String(dt.to_rfc3339_opts(SecondsFormat::Secs, true)))
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Render a value the way it appears in messages (strings unquoted).
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// True for null and whitespace-only strings.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

// =============================================================================
// Source Rows
// =============================================================================

/// One data row handed over by a reader.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRow {
    cells: Vec<Value>,
}

impl SourceRow {
    pub fn new(cells: Vec<Value>) -> Self {
        Self { cells }
    }

    /// Build a row of text cells; empty strings are kept as-is.
    pub fn from_strs<S: AsRef<str>>(cells: &[S]) -> Self {
        Self::new(
            cells
                .iter()
                .map(|c| Value::String(c.as_ref().to_string()))
                .collect(),
        )
    }

    /// Cell at `index`; `None` past the end of the row.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.cells.get(index)
    }

    /// True when the cell is missing or null.
    pub fn is_null(&self, index: usize) -> bool {
        self.cells.get(index).map_or(true, Value::is_null)
    }

    /// True when every cell is null or whitespace-only.
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(is_blank)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[Value] {
        &self.cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unselected_sentinel() {
        let sentinel = FieldIndex::unselected();
        assert!(sentinel.is_unselected());
        assert_eq!(sentinel.position(), None);
        assert_eq!(FieldIndex::new("Email", 3).position(), Some(3));
    }

    #[test]
    fn test_policy_from_name() {
        assert_eq!(FailurePolicy::from_name(" ABORT "), Some(FailurePolicy::Abort));
        assert_eq!(FailurePolicy::from_name("skip"), Some(FailurePolicy::Skip));
        assert_eq!(FailurePolicy::from_name("retry"), None);
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(TargetType::Integer.coerce(json!(" 42 ")).unwrap(), json!(42));
        assert_eq!(TargetType::Integer.coerce(json!(7.0)).unwrap(), json!(7));
        assert_eq!(TargetType::Integer.coerce(json!("  ")).unwrap(), Value::Null);
        assert!(TargetType::Integer.coerce(json!("abc")).is_err());
    }

    #[test]
    fn test_coerce_integer_rejects_out_of_range_floats() {
        assert!(TargetType::Integer.coerce(json!(1e20)).is_err());
        assert!(TargetType::Integer.coerce(json!(-1e30)).is_err());
        assert!(TargetType::Integer.coerce(json!(9_223_372_036_854_775_808.0)).is_err());
        assert!(TargetType::Integer.coerce(json!(u64::MAX)).is_err());
        assert_eq!(
            TargetType::Integer.coerce(json!(-9_223_372_036_854_775_808.0)).unwrap(),
            json!(i64::MIN)
        );
        assert_eq!(TargetType::Integer.coerce(json!(i64::MAX)).unwrap(), json!(i64::MAX));
    }

    #[test]
    fn test_coerce_text_keeps_blank() {
        assert_eq!(TargetType::Text.coerce(json!("")).unwrap(), json!(""));
        assert_eq!(TargetType::Text.coerce(json!(12)).unwrap(), json!("12"));
    }

    #[test]
    fn test_coerce_boolean() {
        assert_eq!(TargetType::Boolean.coerce(json!("Yes")).unwrap(), json!(true));
        assert_eq!(TargetType::Boolean.coerce(json!("0")).unwrap(), json!(false));
        assert!(TargetType::Boolean.coerce(json!("maybe")).is_err());
    }

    #[test]
    fn test_coerce_dates() {
        assert_eq!(TargetType::Date.coerce(json!("20250120")).unwrap(), json!("2025-01-20"));
        assert_eq!(TargetType::Date.coerce(json!("20/01/2025")).unwrap(), json!("2025-01-20"));
        assert_eq!(
            TargetType::DateTime.coerce(json!("2025-01-20 08:30:00")).unwrap(),
            json!("2025-01-20T08:30:00Z")
        );
        assert!(TargetType::Date.coerce(json!("not a date")).is_err());
    }

    #[test]
    fn test_blank_row() {
        let row = SourceRow::new(vec![Value::Null, json!("   "), json!("")]);
        assert!(row.is_blank());
        assert!(row.is_null(0));
        assert!(row.is_null(10));

        let row = SourceRow::from_strs(&["", "x"]);
        assert!(!row.is_blank());
    }
}
