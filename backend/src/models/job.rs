//! Job definition: configuration and selection state of one batch run.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::mapping::names_equal;
use super::{FailurePolicy, FieldIndex, FieldMapping};
use crate::config::Settings;

/// Configuration of one batch run.
///
/// The definition is built by the caller, completed by field extraction and
/// then read (never written) by the row pipeline, so the same definition can
/// be run again or concurrently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDefinition {
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,

    /// Name of the file as uploaded by the user.
    #[serde(default)]
    pub file_name: String,

    /// Path of the staged copy the readers work on.
    #[serde(default)]
    pub working_file: Option<PathBuf>,

    /// Kind of entity being loaded (free-form tag).
    #[serde(default)]
    pub entity_type: String,

    /// User who created the job.
    #[serde(default)]
    pub user_name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub duplicate_handling: FailurePolicy,

    #[serde(default)]
    pub error_handling: FailurePolicy,

    /// Generic row failures tolerated before the run aborts.
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,

    /// Destination table for the reconciliation engine.
    #[serde(default)]
    pub target_table: String,

    #[serde(default = "default_true")]
    pub include_insert: bool,

    #[serde(default = "default_true")]
    pub include_update: bool,

    #[serde(default)]
    pub include_delete: bool,

    /// Registry name of the reader for the working file.
    #[serde(default = "default_reader")]
    pub reader_type: String,

    /// Registry name of the row validator; `None` disables validation.
    #[serde(default = "default_validator")]
    pub validator_type: Option<String>,

    /// Columns discovered in the uploaded file, sentinel first.
    #[serde(default = "default_source_fields")]
    pub source_fields: Vec<FieldIndex>,

    /// One mapping per target column.
    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,
}

fn default_true() -> bool {
    true
}

fn default_max_errors() -> usize {
    Settings::default().max_errors
}

fn default_reader() -> String {
    Settings::default().reader
}

fn default_validator() -> Option<String> {
    Some(Settings::default().validator)
}

fn default_source_fields() -> Vec<FieldIndex> {
    vec![FieldIndex::unselected()]
}

/// Per-column flags handed to the reconciliation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeColumn {
    pub name: String,
    pub insertable: bool,
    pub updatable: bool,
    pub is_key: bool,
    pub native_type_name: String,
}

/// Everything the reconciliation engine needs besides the records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergePlan {
    pub target_table: String,
    pub include_insert: bool,
    pub include_update: bool,
    pub include_delete: bool,
    pub columns: Vec<MergeColumn>,
}

impl JobDefinition {
    /// Create a job with default settings.
    pub fn new(user_name: impl Into<String>) -> Self {
        Self::with_settings(user_name, &Settings::default())
    }

    /// Create a job seeded from process-level settings.
    pub fn with_settings(user_name: impl Into<String>, settings: &Settings) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: String::new(),
            working_file: None,
            entity_type: String::new(),
            user_name: user_name.into(),
            description: String::new(),
            duplicate_handling: settings.duplicate_handling,
            error_handling: settings.error_handling,
            max_errors: settings.max_errors,
            target_table: String::new(),
            include_insert: true,
            include_update: true,
            include_delete: false,
            reader_type: settings.reader.clone(),
            validator_type: Some(settings.validator.clone()),
            source_fields: default_source_fields(),
            field_mappings: Vec::new(),
        }
    }

    /// Parse a definition from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn with_target_table(mut self, table: impl Into<String>) -> Self {
        self.target_table = table.into();
        self
    }

    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = entity_type.into();
        self
    }

    pub fn with_reader(mut self, reader: impl Into<String>) -> Self {
        self.reader_type = reader.into();
        self
    }

    pub fn with_validator(mut self, validator: Option<&str>) -> Self {
        self.validator_type = validator.map(str::to_string);
        self
    }

    pub fn with_policies(mut self, duplicates: FailurePolicy, errors: FailurePolicy, max_errors: usize) -> Self {
        self.duplicate_handling = duplicates;
        self.error_handling = errors;
        self.max_errors = max_errors;
        self
    }

    pub fn with_mapping(mut self, mapping: FieldMapping) -> Self {
        self.field_mappings.push(mapping);
        self
    }

    /// Mappings that take part in the row pipeline, in definition order.
    pub fn active_mappings(&self) -> impl Iterator<Item = &FieldMapping> {
        self.field_mappings.iter().filter(|m| m.is_active())
    }

    /// Active mappings marked as key.
    pub fn key_mappings(&self) -> impl Iterator<Item = &FieldMapping> {
        self.active_mappings().filter(|m| m.is_key)
    }

    /// Look up a mapping by target column name, compared like source columns.
    pub fn mapping(&self, name: &str) -> Option<&FieldMapping> {
        self.field_mappings
            .iter()
            .find(|m| names_equal(&m.name, name))
    }

    pub fn mapping_mut(&mut self, name: &str) -> Option<&mut FieldMapping> {
        self.field_mappings
            .iter_mut()
            .find(|m| names_equal(&m.name, name))
    }

    /// Discovered source columns without the sentinel.
    pub fn discovered_fields(&self) -> impl Iterator<Item = &FieldIndex> {
        self.source_fields.iter().filter(|f| !f.is_unselected())
    }

    /// Merge parameters derived from the active mappings.
    pub fn merge_plan(&self) -> MergePlan {
        MergePlan {
            target_table: self.target_table.clone(),
            include_insert: self.include_insert,
            include_update: self.include_update,
            include_delete: self.include_delete,
            columns: self
                .active_mappings()
                .map(|m| MergeColumn {
                    name: m.name.clone(),
                    insertable: m.can_insert,
                    updatable: m.can_update,
                    is_key: m.is_key,
                    native_type_name: m.native_type_name.clone(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DefaultKind, TargetType};
    use serde_json::json;

    fn sample_job() -> JobDefinition {
        JobDefinition::new("alice")
            .with_target_table("customers")
            .with_mapping(FieldMapping::new("Id", TargetType::Integer).key().with_source_index(0))
            .with_mapping(FieldMapping::new("Email", TargetType::Text).with_source_index(1).read_only())
            .with_mapping(FieldMapping::new("Phone", TargetType::Text))
            .with_mapping(FieldMapping::new("Origin", TargetType::Text).with_static_default(json!("upload")))
    }

    #[test]
    fn test_new_job_defaults() {
        let job = JobDefinition::new("alice");
        assert_eq!(job.user_name, "alice");
        assert_eq!(job.duplicate_handling, FailurePolicy::Skip);
        assert_eq!(job.error_handling, FailurePolicy::Skip);
        assert_eq!(job.max_errors, 10);
        assert_eq!(job.source_fields, vec![FieldIndex::unselected()]);
        assert_eq!(job.validator_type.as_deref(), Some("default"));
    }

    #[test]
    fn test_active_and_key_mappings() {
        let job = sample_job();
        let active: Vec<_> = job.active_mappings().map(|m| m.name.as_str()).collect();
        assert_eq!(active, vec!["Id", "Email", "Origin"]);

        let keys: Vec<_> = job.key_mappings().map(|m| m.name.as_str()).collect();
        assert_eq!(keys, vec!["Id"]);
    }

    #[test]
    fn test_mapping_lookup_matches_column_comparison() {
        let mut job = sample_job().with_mapping(FieldMapping::new("Année", TargetType::Integer));
        assert_eq!(job.mapping(" email ").map(|m| m.name.as_str()), Some("Email"));
        assert_eq!(job.mapping("ANNÉE").map(|m| m.name.as_str()), Some("Année"));
        assert_eq!(job.mapping("Annee"), None);
        job.mapping_mut("année").unwrap().required = true;
        assert!(job.mapping("Année").unwrap().required);
    }

    #[test]
    fn test_merge_plan_uses_active_columns() {
        let plan = sample_job().merge_plan();
        assert_eq!(plan.target_table, "customers");
        assert!(plan.include_insert && plan.include_update && !plan.include_delete);
        assert_eq!(plan.columns.len(), 3);
        assert!(plan.columns[0].is_key);
        assert!(!plan.columns[1].updatable);
    }

    #[test]
    fn test_json_round_trip_keeps_mappings() {
        let job = sample_job().with_mapping(FieldMapping::new("Created", TargetType::DateTime).with_default(DefaultKind::CurrentDateTime));
        let parsed = JobDefinition::from_json(&job.to_json().unwrap()).unwrap();
        assert_eq!(parsed, job);
    }

    #[test]
    fn test_malformed_json_reports_position() {
        let err = JobDefinition::from_json("{ \"userName\": \"bob\",\n  \"maxErrors\": \"ten\" }").unwrap_err();
        assert!(err.is_data());
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn test_minimal_json_gets_defaults() {
        let job = JobDefinition::from_json(r#"{ "userName": "bob", "fieldMappings": [{ "name": "Id" }] }"#).unwrap();
        assert_eq!(job.max_errors, 10);
        assert_eq!(job.reader_type, "csv");
        assert_eq!(job.source_fields.len(), 1);
        assert!(job.mapping("id").is_some());
    }
}
