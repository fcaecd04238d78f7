//! Plugin contracts resolved through the [`ComponentRegistry`](super::ComponentRegistry).
//!
//! - [`Reader`] - turns a staged file into a header list and rows
//! - [`Translator`] - reshapes a single cell value
//!
//! Row validators live in [`crate::validation`].

use serde_json::Value;
use std::path::Path;

use crate::error::{ReaderResult, TranslateResult};
use crate::models::{FieldIndex, SourceRow};

/// Source key meaning "no translation".
pub const NO_TRANSLATION_KEY: &str = "none";

/// Reads a staged file. Implementations are expected to be stateless.
pub trait Reader: Send + Sync {
    /// Header row as `(name, position)` pairs, in file order.
    fn read_header(&self, path: &Path) -> ReaderResult<Vec<FieldIndex>>;

    /// Every data row, header excluded, in file order.
    fn read_data(&self, path: &Path) -> ReaderResult<Vec<SourceRow>>;
}

/// Reshapes a single value according to a source key.
///
/// Implementors provide [`Translator::translate_value`]; callers go through
/// [`Translator::translate`], which handles the passthrough cases so that
/// reference data is only touched for real translations.
pub trait Translator: Send + Sync {
    /// Name used in error messages.
    fn name(&self) -> &str;

    /// Source keys this translator understands.
    fn source_keys(&self) -> Vec<String>;

    /// Translate a non-null value under a non-blank source key.
    fn translate_value(&self, source_key: &str, value: &Value) -> TranslateResult<Value>;

    /// Translate `value`; null input yields null, and a blank or `none`
    /// source key returns the value unchanged.
    fn translate(&self, source_key: Option<&str>, value: Value) -> TranslateResult<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }
        let key = source_key.map(str::trim).unwrap_or_default();
        if key.is_empty() || key.eq_ignore_ascii_case(NO_TRANSLATION_KEY) {
            return Ok(value);
        }
        self.translate_value(key, &value)
    }
}
