//! Row and job-definition validation.
//!
//! Two independent checks live here:
//!
//! ## Row validation
//! A [`RowValidator`] inspects each cleaned record during a run and returns a
//! tagged [`RowFailure`] when the row must be dropped. The built-in
//! [`DefaultRowValidator`] performs, in order:
//! - a null check on every active mapping with `can_be_null == false`
//! - a duplicate check on the tuple of key column values
//!
//! ## Definition validation
//! [`validate_definition`] walks a [`JobDefinition`] before a run and lists
//! structural problems (missing key, nothing selected, unresolved columns).
//!
//! # Example
//!
//! ```rust,ignore
//! use batchload::validation::{ensure_valid, DefaultRowValidator, RowValidator};
//!
//! ensure_valid(&job)?;
//!
//! let mut validator = DefaultRowValidator::new();
//! validator.reset();
//! for (i, record) in records.iter().enumerate() {
//!     validator.validate_row(&job, i + 1, record)?;
//! }
//! ```

pub mod definition;

pub use definition::{ensure_valid, validate_definition};

use serde_json::Value;
use std::collections::HashSet;

use crate::error::RowFailure;
use crate::models::{display_value, JobDefinition, Record};

/// Checks one cleaned record at a time during a run.
///
/// Instances hold per-run state and are never shared between runs; the
/// registry builds a fresh one for every run.
pub trait RowValidator: Send {
    /// Forget everything seen so far.
    fn reset(&mut self);

    /// Accept the record or say why it must be dropped.
    ///
    /// `row` is the 1-based source row number, used in failure messages.
    fn validate_row(&mut self, job: &JobDefinition, row: usize, record: &Record) -> Result<(), RowFailure>;
}

/// Null check followed by duplicate-key detection.
#[derive(Debug, Default)]
pub struct DefaultRowValidator {
    seen_keys: HashSet<u64>,
}

impl DefaultRowValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Distinct key tuples seen since the last reset.
    pub fn seen_count(&self) -> usize {
        self.seen_keys.len()
    }

    fn check_nulls(&self, job: &JobDefinition, row: usize, record: &Record) -> Result<(), RowFailure> {
        for mapping in job.active_mappings().filter(|m| !m.can_be_null) {
            let is_null = record.get(&mapping.name).map_or(true, Value::is_null);
            if is_null {
                return Err(RowFailure::invalid(
                    row,
                    format!(
                        "Field '{}' cannot be null. Row values: {}",
                        mapping.label(),
                        row_values(record)
                    ),
                ));
            }
        }
        Ok(())
    }

    fn check_duplicates(&mut self, job: &JobDefinition, row: usize, record: &Record) -> Result<(), RowFailure> {
        let key_values: Vec<&Value> = job
            .key_mappings()
            .map(|m| record.get(&m.name).unwrap_or(&Value::Null))
            .collect();
        if key_values.is_empty() {
            return Ok(());
        }

        if self.seen_keys.insert(key_hash(&key_values)) {
            Ok(())
        } else {
            let key = key_values
                .iter()
                .map(|v| display_value(v))
                .collect::<Vec<_>>()
                .join(", ");
            Err(RowFailure::duplicate(row, key))
        }
    }
}

impl RowValidator for DefaultRowValidator {
    fn reset(&mut self) {
        self.seen_keys.clear();
    }

    fn validate_row(&mut self, job: &JobDefinition, row: usize, record: &Record) -> Result<(), RowFailure> {
        self.check_nulls(job, row, record)?;
        self.check_duplicates(job, row, record)
    }
}

const KEY_HASH_SEED: u64 = 17;
const KEY_HASH_FACTOR: u64 = 31;
const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Order-sensitive hash of a key tuple, stable across processes.
pub fn key_hash(values: &[&Value]) -> u64 {
    values.iter().fold(KEY_HASH_SEED, |hash, value| {
        hash.wrapping_mul(KEY_HASH_FACTOR) ^ value_hash(value)
    })
}

/// FNV-1a over the value's JSON text, so `null` and `"null"` differ.
fn value_hash(value: &Value) -> u64 {
    value.to_string().bytes().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

fn row_values(record: &Record) -> String {
    record
        .values()
        .map(display_value)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldMapping, TargetType};
    use serde_json::json;

    fn keyed_job() -> JobDefinition {
        JobDefinition::new("alice")
            .with_mapping(FieldMapping::new("Id", TargetType::Integer).key().with_source_index(0))
            .with_mapping(FieldMapping::new("Code", TargetType::Text).key().with_source_index(1))
            .with_mapping(FieldMapping::new("Email", TargetType::Text).not_null().with_source_index(2))
    }

    fn record(id: Value, code: Value, email: Value) -> Record {
        let mut record = Record::new();
        record.insert("Id".into(), id);
        record.insert("Code".into(), code);
        record.insert("Email".into(), email);
        record
    }

    #[test]
    fn test_duplicate_key_tuples() {
        let job = keyed_job();
        let mut validator = DefaultRowValidator::new();

        assert!(validator.validate_row(&job, 1, &record(json!(1), json!("A"), json!("a@x"))).is_ok());
        let dup = validator
            .validate_row(&job, 2, &record(json!(1), json!("A"), json!("b@x")))
            .unwrap_err();
        assert_eq!(dup, RowFailure::duplicate(2, "1, A"));
        assert!(validator.validate_row(&job, 3, &record(json!(2), json!("B"), json!("c@x"))).is_ok());
        assert_eq!(validator.seen_count(), 2);
    }

    #[test]
    fn test_reset_clears_seen_keys() {
        let job = keyed_job();
        let mut validator = DefaultRowValidator::new();
        let row = record(json!(1), json!("A"), json!("a@x"));

        assert!(validator.validate_row(&job, 1, &row).is_ok());
        validator.reset();
        assert!(validator.validate_row(&job, 1, &row).is_ok());
    }

    #[test]
    fn test_null_check_runs_before_duplicate_check() {
        let job = keyed_job();
        let mut validator = DefaultRowValidator::new();

        let failure = validator
            .validate_row(&job, 5, &record(json!(1), json!("A"), Value::Null))
            .unwrap_err();
        match failure {
            RowFailure::Invalid { row, message } => {
                assert_eq!(row, 5);
                assert!(message.contains("'Email' cannot be null"));
                assert!(message.contains("1, A, NULL"));
            }
            other => panic!("expected invalid row, got {:?}", other),
        }
        assert_eq!(validator.seen_count(), 0);
    }

    #[test]
    fn test_no_key_columns_means_no_duplicates() {
        let job = JobDefinition::new("alice").with_mapping(FieldMapping::new("Name", TargetType::Text).with_source_index(0));
        let mut validator = DefaultRowValidator::new();
        let mut row = Record::new();
        row.insert("Name".into(), json!("same"));

        assert!(validator.validate_row(&job, 1, &row).is_ok());
        assert!(validator.validate_row(&job, 2, &row).is_ok());
    }

    #[test]
    fn test_key_hash_is_order_sensitive() {
        let a = json!("A");
        let b = json!("B");
        assert_ne!(key_hash(&[&a, &b]), key_hash(&[&b, &a]));
        assert_eq!(key_hash(&[&a, &b]), key_hash(&[&json!("A"), &json!("B")]));
        assert_ne!(key_hash(&[&Value::Null]), key_hash(&[&json!("null")]));
    }
}
