//! Built-in translators.
//!
//! - [`OperationTranslator`] - text clean-up operations selected by source key
//! - [`LookupTranslator`] - value replacement from lazily loaded reference tables
//!
//! Both go through [`Translator::translate`], so null values and blank or
//! `none` source keys never reach the code below.

use once_cell::sync::OnceCell;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

use crate::error::{TranslateError, TranslateResult};
use crate::models::display_value;
use crate::registry::Translator;

/// Separator for chaining operations in one source key (`"trim+uppercase"`).
pub const OPERATION_SEPARATOR: char = '+';

// =============================================================================
// Operation Translator
// =============================================================================

/// A single text clean-up step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextOperation {
    /// Remove leading and trailing whitespace
    Trim,
    Uppercase,
    Lowercase,
    /// Keep only ASCII digits
    DigitsOnly,
    /// Keep only alphanumeric characters
    Alphanumeric,
    /// Trim and squeeze inner whitespace runs to one space
    CollapseWhitespace,
}

impl TextOperation {
    pub const ALL: [TextOperation; 6] = [
        TextOperation::Trim,
        TextOperation::Uppercase,
        TextOperation::Lowercase,
        TextOperation::DigitsOnly,
        TextOperation::Alphanumeric,
        TextOperation::CollapseWhitespace,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            TextOperation::Trim => "trim",
            TextOperation::Uppercase => "uppercase",
            TextOperation::Lowercase => "lowercase",
            TextOperation::DigitsOnly => "digits_only",
            TextOperation::Alphanumeric => "alphanumeric",
            TextOperation::CollapseWhitespace => "collapse_whitespace",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim();
        Self::ALL.into_iter().find(|op| op.key().eq_ignore_ascii_case(key))
    }

    /// Apply to a value; non-text scalars are treated as their text form.
    pub fn apply(&self, value: &Value) -> Value {
        let Some(s) = as_string(value) else {
            return value.clone();
        };
        let out = match self {
            TextOperation::Trim => s.trim().to_string(),
            TextOperation::Uppercase => s.to_uppercase(),
            TextOperation::Lowercase => s.to_lowercase(),
            TextOperation::DigitsOnly => s.chars().filter(|c| c.is_ascii_digit()).collect(),
            TextOperation::Alphanumeric => s.chars().filter(|c| c.is_alphanumeric()).collect(),
            TextOperation::CollapseWhitespace => s.split_whitespace().collect::<Vec<_>>().join(" "),
        };
        Value::String(out)
    }
}

fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Applies the [`TextOperation`]s named by the source key, left to right.
#[derive(Debug, Clone)]
pub struct OperationTranslator {
    name: String,
}

impl OperationTranslator {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for OperationTranslator {
    fn default() -> Self {
        Self::new("text")
    }
}

impl Translator for OperationTranslator {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_keys(&self) -> Vec<String> {
        TextOperation::ALL.iter().map(|op| op.key().to_string()).collect()
    }

    fn translate_value(&self, source_key: &str, value: &Value) -> TranslateResult<Value> {
        let ops = source_key
            .split(OPERATION_SEPARATOR)
            .map(|key| {
                TextOperation::from_key(key).ok_or_else(|| TranslateError::UnknownSourceKey {
                    translator: self.name.clone(),
                    key: key.trim().to_string(),
                })
            })
            .collect::<TranslateResult<Vec<_>>>()?;

        Ok(ops.iter().fold(value.clone(), |v, op| op.apply(&v)))
    }
}

// =============================================================================
// Lookup Translator
// =============================================================================

/// Reference tables: table name to (source value to replacement).
pub type LookupTables = HashMap<String, HashMap<String, Value>>;

type TableLoader = Box<dyn Fn() -> Result<LookupTables, String> + Send + Sync>;

/// Replaces values through reference tables, one table per source key.
///
/// Tables are loaded on the first real translation and kept for the life of
/// the translator. Matching on table names and values ignores case.
pub struct LookupTranslator {
    name: String,
    keys: Vec<String>,
    loader: TableLoader,
    tables: OnceCell<LookupTables>,
}

impl LookupTranslator {
    /// `keys` lists the table names advertised before anything is loaded.
    pub fn new<F>(name: impl Into<String>, keys: Vec<String>, loader: F) -> Self
    where
        F: Fn() -> Result<LookupTables, String> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            keys,
            loader: Box::new(loader),
            tables: OnceCell::new(),
        }
    }

    /// Translator over tables already in memory.
    pub fn from_tables(name: impl Into<String>, tables: LookupTables) -> Self {
        let mut keys: Vec<String> = tables.keys().cloned().collect();
        keys.sort();
        Self::new(name, keys, move || Ok(tables.clone()))
    }

    pub fn is_loaded(&self) -> bool {
        self.tables.get().is_some()
    }

    fn tables(&self) -> TranslateResult<&LookupTables> {
        self.tables.get_or_try_init(|| {
            let raw = (self.loader)().map_err(TranslateError::LoadFailed)?;
            Ok(raw
                .into_iter()
                .map(|(table, entries)| {
                    let entries: HashMap<String, Value> =
                        entries.into_iter().map(|(k, v)| (k.trim().to_lowercase(), v)).collect();
                    (table.trim().to_lowercase(), entries)
                })
                .collect())
        })
    }
}

impl fmt::Debug for LookupTranslator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookupTranslator")
            .field("name", &self.name)
            .field("keys", &self.keys)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl Translator for LookupTranslator {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_keys(&self) -> Vec<String> {
        self.keys.clone()
    }

    fn translate_value(&self, source_key: &str, value: &Value) -> TranslateResult<Value> {
        let table = self
            .tables()?
            .get(&source_key.to_lowercase())
            .ok_or_else(|| TranslateError::UnknownSourceKey {
                translator: self.name.clone(),
                key: source_key.to_string(),
            })?;

        let lookup = display_value(value);
        table
            .get(&lookup.trim().to_lowercase())
            .cloned()
            .ok_or_else(|| TranslateError::MissingEntry {
                key: source_key.to_string(),
                value: lookup,
            })
    }
}
