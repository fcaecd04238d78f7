//! Structural checks on a job definition, run once before the row pipeline.
//!
//! The walk visits the discovered source fields, then every mapping and its
//! match rules, then applies the job-wide rules. All violations are
//! collected so the caller can show them together.

use std::collections::HashSet;

use crate::error::{DefinitionError, DefinitionViolation};
use crate::models::{FieldIndex, FieldMapping, JobDefinition, MatchRule};

/// List every structural problem in `job`. Empty means runnable.
pub fn validate_definition(job: &JobDefinition) -> Vec<DefinitionViolation> {
    let positions = source_positions(&job.source_fields);
    let mut violations = Vec::new();

    for mapping in &job.field_mappings {
        check_mapping(mapping, &positions, &mut violations);
        for rule in &mapping.match_definitions {
            check_match_rule(mapping, rule, &mut violations);
        }
    }
    check_selection(job, &mut violations);

    violations
}

/// Fail with [`DefinitionError::Invalid`] if `job` has any violation.
pub fn ensure_valid(job: &JobDefinition) -> Result<(), DefinitionError> {
    let violations = validate_definition(job);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(DefinitionError::Invalid { violations })
    }
}

/// Positions of the discovered columns; the sentinel is left out.
fn source_positions(fields: &[FieldIndex]) -> HashSet<usize> {
    fields.iter().filter_map(FieldIndex::position).collect()
}

fn check_mapping(mapping: &FieldMapping, positions: &HashSet<usize>, violations: &mut Vec<DefinitionViolation>) {
    match mapping.source_index {
        None if mapping.is_included => violations.push(DefinitionViolation::MissingSourceMapping {
            display_name: mapping.label().to_string(),
        }),
        // Only checkable once a header has been read.
        Some(index) if !positions.is_empty() && !positions.contains(&index) => {
            violations.push(DefinitionViolation::SourceIndexOutOfRange {
                display_name: mapping.label().to_string(),
                index,
            })
        }
        _ => {}
    }

    if mapping.required && !mapping.is_active() {
        violations.push(DefinitionViolation::RequiredFieldUnmapped {
            display_name: mapping.label().to_string(),
        });
    }
}

fn check_match_rule(mapping: &FieldMapping, rule: &MatchRule, violations: &mut Vec<DefinitionViolation>) {
    if !rule.use_regex || rule.is_empty() {
        return;
    }
    if let Err(e) = rule.pattern() {
        violations.push(DefinitionViolation::InvalidMatchPattern {
            field: mapping.name.clone(),
            pattern: rule.text.clone(),
            message: e.to_string(),
        });
    }
}

fn check_selection(job: &JobDefinition, violations: &mut Vec<DefinitionViolation>) {
    let included = || job.field_mappings.iter().filter(|m| m.is_included);

    if !included().any(|m| m.is_key) {
        violations.push(DefinitionViolation::MissingKeyColumn);
    }
    if !included().any(|m| !m.is_key) {
        violations.push(DefinitionViolation::MissingColumnSelection);
    }
}
