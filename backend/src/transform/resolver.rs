//! Field resolution: match configured target fields to uploaded columns.
//!
//! Each mapping is resolved against the discovered columns with these rules,
//! first match wins:
//!
//! 1. The mapping's match rules, in declaration order. Exact rules compare
//!    names ignoring case; regex rules search the column name ignoring case.
//!    The winning rule's translator source key is copied onto the mapping.
//! 2. The mapping's own name, ignoring case.
//! 3. Nothing: the mapping stays unresolved (active only if it has a default).
//!
//! When exactly one mapping in the job may be a key, resolving it also marks
//! it as the key.

use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::{PipelineResult, PreconditionError};
use crate::models::mapping::names_equal;
use crate::models::{FieldIndex, FieldMapping, JobDefinition, MatchRule};
use crate::registry::ComponentRegistry;

/// A source column chosen for a mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMatch<'a> {
    pub field: &'a FieldIndex,
    /// Source key carried by the winning match rule, if any.
    pub translator_source_key: Option<String>,
}

/// Reads the header of an uploaded file and resolves a job's mappings.
pub struct FieldResolver {
    registry: Arc<ComponentRegistry>,
}

impl FieldResolver {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self { registry }
    }

    /// Attach the uploaded file to `job`, read its header and resolve every
    /// mapping against it.
    pub fn extract_fields(
        &self,
        job: &mut JobDefinition,
        file_name: &str,
        working_file: impl AsRef<Path>,
    ) -> PipelineResult<()> {
        let working_file = working_file.as_ref();
        if file_name.trim().is_empty() {
            return Err(PreconditionError::EmptyFileName.into());
        }
        if !working_file.exists() {
            return Err(PreconditionError::WorkingFileMissing(working_file.to_path_buf()).into());
        }

        let reader = self
            .registry
            .resolve_reader(&job.reader_type)
            .ok_or_else(|| PreconditionError::ReaderNotRegistered(job.reader_type.clone()))?;
        let header = reader.read_header(working_file)?;
        info!(
            job = %job.id,
            file = %file_name,
            reader = %job.reader_type,
            columns = header.len(),
            "read header"
        );

        let source_fields: Vec<FieldIndex> = std::iter::once(FieldIndex::unselected()).chain(header).collect();
        let resolutions = match_mappings(&job.field_mappings, &source_fields)?;

        job.file_name = file_name.to_string();
        job.working_file = Some(working_file.to_path_buf());
        job.source_fields = source_fields;
        apply_resolutions(job, resolutions);
        Ok(())
    }
}

/// Resolve every mapping of `job` against `job.source_fields`.
///
/// Previous resolution state is discarded, so this can be rerun after a new
/// upload. On error the job is left untouched.
pub fn resolve_mappings(job: &mut JobDefinition) -> Result<(), PreconditionError> {
    let resolutions = match_mappings(&job.field_mappings, &job.source_fields)?;
    apply_resolutions(job, resolutions);
    Ok(())
}

/// Column position and source key chosen for one mapping.
struct Resolution {
    position: usize,
    translator_source_key: Option<String>,
}

/// Match every mapping without touching it; one entry per mapping.
///
/// Every pattern must compile, whether or not an earlier rule already matched.
fn match_mappings(
    mappings: &[FieldMapping],
    fields: &[FieldIndex],
) -> Result<Vec<Option<Resolution>>, PreconditionError> {
    for mapping in mappings.iter().filter(|m| m.can_map) {
        for rule in mapping.match_definitions.iter().filter(|r| !r.is_empty()) {
            compile(mapping, rule)?;
        }
    }

    mappings
        .iter()
        .map(|mapping| {
            if !mapping.can_map {
                return Ok(None);
            }
            let found = find_source_field(mapping, fields)?;
            Ok(found.and_then(|found| {
                found.field.position().map(|position| Resolution {
                    position,
                    translator_source_key: found.translator_source_key,
                })
            }))
        })
        .collect()
}

fn apply_resolutions(job: &mut JobDefinition, resolutions: Vec<Option<Resolution>>) {
    let key_candidates = job.field_mappings.iter().filter(|m| m.can_be_key).count();

    for (mapping, resolution) in job.field_mappings.iter_mut().zip(resolutions) {
        mapping.source_index = None;
        mapping.is_included = false;
        let Some(resolution) = resolution else {
            debug!(field = %mapping.name, "no source column");
            continue;
        };

        debug!(field = %mapping.name, position = resolution.position, "resolved source column");
        mapping.source_index = Some(resolution.position);
        mapping.is_included = true;
        if let Some(key) = resolution.translator_source_key {
            mapping.translator_source_key = Some(key);
        }
        if mapping.can_be_key && key_candidates == 1 {
            info!(field = %mapping.name, "only key candidate, marking as key");
            mapping.is_key = true;
        }
    }

    let unresolved = job.field_mappings.iter().filter(|m| !m.is_active()).count();
    if unresolved > 0 {
        warn!(job = %job.id, unresolved, "some fields have no source column or default");
    }
}

/// Find the source column for one mapping. The sentinel never matches.
pub fn find_source_field<'a>(
    mapping: &FieldMapping,
    fields: &'a [FieldIndex],
) -> Result<Option<FieldMatch<'a>>, PreconditionError> {
    let mut candidates = fields.iter().filter(|f| !f.is_unselected());

    for rule in mapping.match_definitions.iter().filter(|r| !r.is_empty()) {
        let pattern = compile(mapping, rule)?;
        if let Some(field) = candidates.clone().find(|f| rule.matches(pattern.as_ref(), &f.name)) {
            return Ok(Some(FieldMatch {
                field,
                translator_source_key: rule.translator_source_key.clone(),
            }));
        }
    }

    Ok(candidates
        .find(|f| names_equal(&f.name, &mapping.name))
        .map(|field| FieldMatch {
            field,
            translator_source_key: None,
        }))
}

fn compile(mapping: &FieldMapping, rule: &MatchRule) -> Result<Option<Regex>, PreconditionError> {
    if !rule.use_regex {
        return Ok(None);
    }
    rule.pattern()
        .map(Some)
        .map_err(|e| PreconditionError::InvalidMatchPattern {
            field: mapping.name.clone(),
            pattern: rule.text.clone(),
            message: e.to_string(),
        })
}
