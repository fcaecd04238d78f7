//! Field mapping definition
//!
//! A mapping describes how one target column is filled: which source column
//! feeds it, what default applies when none does, which translator reshapes
//! the value, and what the downstream merge may do with it.

use chrono::{SecondsFormat, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TargetType;

/// How a value is synthesized for a mapping without a source column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DefaultKind {
    /// Timestamp taken when the row is built.
    CurrentDateTime,
    /// The user who created the job.
    UserName,
    /// The mapping's `default_value`.
    StaticValue,
}

/// Alternate source column name or pattern, tried before the exact name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRule {
    /// Column name, or a regular expression when `use_regex` is set.
    #[serde(default)]
    pub text: String,

    #[serde(default)]
    pub use_regex: bool,

    /// Copied onto the mapping when this rule wins.
    #[serde(default)]
    pub translator_source_key: Option<String>,
}

impl MatchRule {
    /// Case-insensitive exact name.
    pub fn exact(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            use_regex: false,
            translator_source_key: None,
        }
    }

    /// Case-insensitive regular expression.
    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            text: pattern.into(),
            use_regex: true,
            translator_source_key: None,
        }
    }

    pub fn with_source_key(mut self, key: impl Into<String>) -> Self {
        self.translator_source_key = Some(key.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Compile the rule text as a case-insensitive regular expression.
    pub fn pattern(&self) -> Result<Regex, regex::Error> {
        RegexBuilder::new(&self.text).case_insensitive(true).build()
    }

    /// Whether a source column name satisfies this rule.
    ///
    /// `pattern` must be the compiled rule text when `use_regex` is set.
    pub fn matches(&self, pattern: Option<&Regex>, column: &str) -> bool {
        match (self.use_regex, pattern) {
            (true, Some(re)) => re.is_match(column),
            (true, None) => false,
            (false, _) => names_equal(column, &self.text),
        }
    }
}

/// One target column's full configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    /// Target column name.
    pub name: String,

    #[serde(default)]
    pub display_name: String,

    /// Column type as the destination store spells it.
    #[serde(default)]
    pub native_type_name: String,

    #[serde(default)]
    pub target_type: TargetType,

    /// Resolved column position in the uploaded file.
    #[serde(default)]
    pub source_index: Option<usize>,

    /// Part of the reconciliation key.
    #[serde(default)]
    pub is_key: bool,

    /// Selected for loading; set when a source column is resolved.
    #[serde(default)]
    pub is_included: bool,

    #[serde(default)]
    pub can_be_key: bool,

    #[serde(default = "default_true")]
    pub can_insert: bool,

    #[serde(default = "default_true")]
    pub can_update: bool,

    #[serde(default = "default_true")]
    pub can_map: bool,

    #[serde(default = "default_true")]
    pub can_be_null: bool,

    /// Must resolve to a source column or carry a default.
    #[serde(default)]
    pub required: bool,

    #[serde(default)]
    pub default_kind: Option<DefaultKind>,

    #[serde(default)]
    pub default_value: Option<Value>,

    #[serde(default)]
    pub translator_name: Option<String>,

    #[serde(default)]
    pub translator_source_key: Option<String>,

    /// Tried in order before falling back to an exact name match.
    #[serde(default)]
    pub match_definitions: Vec<MatchRule>,
}

fn default_true() -> bool {
    true
}

/// Column name equality used everywhere names are compared: surrounding
/// whitespace is ignored and case is folded with Unicode lowercasing.
pub fn names_equal(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

impl FieldMapping {
    /// Create a nullable, insertable, updatable mapping.
    pub fn new(name: impl Into<String>, target_type: TargetType) -> Self {
        let name = name.into();
        Self {
            display_name: name.clone(),
            name,
            native_type_name: String::new(),
            target_type,
            source_index: None,
            is_key: false,
            is_included: false,
            can_be_key: false,
            can_insert: true,
            can_update: true,
            can_map: true,
            can_be_null: true,
            required: false,
            default_kind: None,
            default_value: None,
            translator_name: None,
            translator_source_key: None,
            match_definitions: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = display_name.into();
        self
    }

    pub fn with_native_type(mut self, native_type_name: impl Into<String>) -> Self {
        self.native_type_name = native_type_name.into();
        self
    }

    /// Mark as eligible for the reconciliation key.
    pub fn key_candidate(mut self) -> Self {
        self.can_be_key = true;
        self
    }

    /// Mark as part of the reconciliation key.
    pub fn key(mut self) -> Self {
        self.can_be_key = true;
        self.is_key = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.can_be_null = false;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.can_update = false;
        self
    }

    pub fn with_default(mut self, kind: DefaultKind) -> Self {
        self.default_kind = Some(kind);
        self
    }

    pub fn with_static_default(mut self, value: Value) -> Self {
        self.default_kind = Some(DefaultKind::StaticValue);
        self.default_value = Some(value);
        self
    }

    pub fn with_translator(mut self, name: impl Into<String>, source_key: Option<&str>) -> Self {
        self.translator_name = Some(name.into());
        self.translator_source_key = source_key.map(str::to_string);
        self
    }

    pub fn with_match(mut self, rule: MatchRule) -> Self {
        self.match_definitions.push(rule);
        self
    }

    /// Bind to a source column and select the mapping.
    pub fn with_source_index(mut self, index: usize) -> Self {
        self.source_index = Some(index);
        self.is_included = true;
        self
    }

    /// Participates in the row pipeline: has a source column or a default.
    pub fn is_active(&self) -> bool {
        self.source_index.is_some() || self.default_kind.is_some()
    }

    /// Name shown to users.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.name
        } else {
            &self.display_name
        }
    }

    /// Synthesize the default value, or `None` if no default is configured.
    pub fn default_for(&self, user_name: &str) -> Option<Value> {
        self.default_kind.map(|kind| match kind {
            DefaultKind::CurrentDateTime => {
                Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            DefaultKind::UserName => Value::String(user_name.to_string()),
            DefaultKind::StaticValue => self.default_value.clone().unwrap_or(Value::Null),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_active_requires_source_or_default() {
        let mapping = FieldMapping::new("Email", TargetType::Text);
        assert!(!mapping.is_active());
        assert!(mapping.clone().with_source_index(2).is_active());
        assert!(mapping.with_default(DefaultKind::UserName).is_active());
    }

    #[test]
    fn test_default_values() {
        let mapping = FieldMapping::new("Source", TargetType::Text).with_static_default(json!("N/A"));
        assert_eq!(mapping.default_for("alice"), Some(json!("N/A")));

        let mapping = FieldMapping::new("CreatedBy", TargetType::Text).with_default(DefaultKind::UserName);
        assert_eq!(mapping.default_for("alice"), Some(json!("alice")));

        let mapping = FieldMapping::new("Plain", TargetType::Text);
        assert_eq!(mapping.default_for("alice"), None);
    }

    #[test]
    fn test_current_datetime_default_is_a_timestamp() {
        let mapping = FieldMapping::new("Created", TargetType::DateTime).with_default(DefaultKind::CurrentDateTime);
        let value = mapping.default_for("alice").unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(value.as_str().unwrap()).is_ok());
    }

    #[test]
    fn test_deserialize_applies_flag_defaults() {
        let mapping: FieldMapping = serde_json::from_str(
            r#"{ "name": "Email", "matchDefinitions": [{ "text": "^mail", "useRegex": true }] }"#,
        )
        .unwrap();
        assert!(mapping.can_be_null);
        assert!(mapping.can_insert);
        assert!(!mapping.is_key);
        assert_eq!(mapping.target_type, TargetType::Text);
        assert!(mapping.match_definitions[0].use_regex);
    }

    #[test]
    fn test_match_rules_ignore_case() {
        let exact = MatchRule::exact("Email");
        assert!(exact.matches(None, "EMAIL"));
        assert!(!exact.matches(None, "Email Address"));

        let rule = MatchRule::regex("^mail.*");
        let re = rule.pattern().unwrap();
        assert!(rule.matches(Some(&re), "MailAddr"));
        assert!(!rule.matches(Some(&re), "Email"));
        assert!(MatchRule::regex("(").pattern().is_err());
    }

    #[test]
    fn test_label_falls_back_to_name() {
        let mut mapping = FieldMapping::new("email_address", TargetType::Text);
        mapping.display_name.clear();
        assert_eq!(mapping.label(), "email_address");
        assert_eq!(mapping.with_display_name("E-mail").label(), "E-mail");
    }
}
