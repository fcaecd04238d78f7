//! Row pipeline: turn a resolved job definition into cleaned, typed records.
//!
//! The pipeline combines every per-row step:
//! reading, defaults, translation, coercion, validation and failure accounting.
//!
//! # Example
//!
//! ```rust,ignore
//! use batchload::{ComponentRegistry, RowPipeline};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ComponentRegistry::new());
//! registry.register_reader("csv", || MyCsvReader)?;
//!
//! let outcome = RowPipeline::new(registry).process(&job)?;
//! println!("{} records, {}", outcome.records.len(), outcome.summary());
//! ```

use serde::Serialize;
use serde_json::Value;
use std::error::Error as StdError;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn};

use crate::error::{PipelineError, PipelineResult, PreconditionError, RowFailure};
use crate::models::{is_blank, FailurePolicy, FieldMapping, JobDefinition, MergePlan, Record, SourceRow, TargetType};
use crate::registry::{ComponentRegistry, Translator};
use crate::validation::RowValidator;

/// One column of the cleaned record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetColumn {
    pub name: String,
    pub target_type: TargetType,
}

/// A row dropped by the run.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRow {
    /// 1-based data row number.
    pub row: usize,
    pub failure: RowFailure,
}

/// Result of a completed run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    /// Cleaned records, in source order.
    pub records: Vec<Record>,

    /// Columns of every record, in mapping order.
    pub schema: Vec<TargetColumn>,

    /// Generic row failures.
    pub error_count: usize,

    pub duplicate_count: usize,

    /// Source rows with no content.
    pub blank_rows: usize,

    /// Every dropped row, with the reason.
    #[serde(skip)]
    pub skipped: Vec<SkippedRow>,
}

impl BatchOutcome {
    /// Human-readable account of dropped rows.
    pub fn summary(&self) -> String {
        if self.error_count == 0 && self.duplicate_count == 0 {
            return format!("{} rows loaded", self.records.len());
        }
        format!(
            "{} rows loaded, {} rows skipped due to errors, {} rows skipped due to duplicates",
            self.records.len(),
            self.error_count,
            self.duplicate_count
        )
    }
}

/// External engine that merges cleaned records into the destination store.
pub trait Reconciler {
    fn reconcile(&self, plan: &MergePlan, records: &[Record]) -> Result<(), Box<dyn StdError + Send + Sync>>;
}

/// A mapping paired with the translator resolved for this run.
struct ColumnPlan<'a> {
    mapping: &'a FieldMapping,
    translator: Option<Arc<dyn Translator>>,
}

/// Running counters for one job run.
#[derive(Default)]
struct Tally {
    error_count: usize,
    duplicate_count: usize,
    skipped: Vec<SkippedRow>,
}

impl Tally {
    /// Count a dropped row; `Err` carries the failure that stops the run.
    fn record(&mut self, job: &JobDefinition, failure: RowFailure) -> Result<(), RowFailure> {
        let abort = if failure.is_duplicate() {
            self.duplicate_count += 1;
            job.duplicate_handling == FailurePolicy::Abort
        } else {
            self.error_count += 1;
            job.error_handling == FailurePolicy::Abort || self.error_count > job.max_errors
        };

        if abort {
            return Err(failure);
        }
        debug!(row = failure.row(), %failure, "row skipped");
        self.skipped.push(SkippedRow {
            row: failure.row(),
            failure,
        });
        Ok(())
    }
}

/// Runs jobs against the components of one registry.
pub struct RowPipeline {
    registry: Arc<ComponentRegistry>,
}

impl RowPipeline {
    pub fn new(registry: Arc<ComponentRegistry>) -> Self {
        Self { registry }
    }

    /// Read the job's working file and produce the cleaned record set.
    ///
    /// The job is only read, so it can be processed again or concurrently.
    pub fn process(&self, job: &JobDefinition) -> PipelineResult<BatchOutcome> {
        let span = info_span!("process", job = %job.id, file = %job.file_name);
        let _enter = span.enter();

        self.registry.reset();

        let mappings: Vec<&FieldMapping> = job.active_mappings().collect();
        let schema: Vec<TargetColumn> = mappings
            .iter()
            .map(|m| TargetColumn {
                name: m.name.clone(),
                target_type: m.target_type,
            })
            .collect();

        let working_file = job.working_file.as_deref().ok_or(PreconditionError::WorkingFileNotSet)?;
        let rows = self.read_rows(job, working_file)?;

        let mut validator: Option<Box<dyn RowValidator>> = job.validator_type.as_deref().and_then(|name| {
            let resolved = self.registry.resolve_validator(name);
            if resolved.is_none() && !name.trim().is_empty() {
                warn!(validator = %name, "validator not registered, rows will not be validated");
            }
            resolved
        });
        if let Some(v) = validator.as_mut() {
            v.reset();
        }

        let columns: Vec<ColumnPlan<'_>> = mappings
            .into_iter()
            .map(|mapping| ColumnPlan {
                mapping,
                translator: self.translator_for(mapping),
            })
            .collect();

        info!(rows = rows.len(), columns = columns.len(), "processing rows");

        let mut tally = Tally::default();
        let mut records = Vec::with_capacity(rows.len());
        let mut blank_rows = 0;

        for (i, source) in rows.iter().enumerate() {
            let row = i + 1;
            if source.is_blank() {
                blank_rows += 1;
                continue;
            }

            let result = build_record(job, &columns, row, source).and_then(|record| {
                if let Some(v) = validator.as_mut() {
                    v.validate_row(job, row, &record)?;
                }
                Ok(record)
            });

            match result {
                Ok(record) => records.push(record),
                Err(failure) => {
                    if let Err(failure) = tally.record(job, failure) {
                        warn!(
                            row,
                            errors = tally.error_count,
                            duplicates = tally.duplicate_count,
                            "run aborted"
                        );
                        return Err(PipelineError::Aborted {
                            failure,
                            error_count: tally.error_count,
                            duplicate_count: tally.duplicate_count,
                        });
                    }
                }
            }
        }

        info!(
            loaded = records.len(),
            errors = tally.error_count,
            duplicates = tally.duplicate_count,
            blank = blank_rows,
            "run finished"
        );

        Ok(BatchOutcome {
            records,
            schema,
            error_count: tally.error_count,
            duplicate_count: tally.duplicate_count,
            blank_rows,
            skipped: tally.skipped,
        })
    }

    /// Process the job, then hand the records and its merge plan to `reconciler`.
    pub fn process_and_reconcile<R>(&self, job: &JobDefinition, reconciler: &R) -> PipelineResult<BatchOutcome>
    where
        R: Reconciler + ?Sized,
    {
        let outcome = self.process(job)?;
        let plan = job.merge_plan();
        reconciler
            .reconcile(&plan, &outcome.records)
            .map_err(|e| PipelineError::Reconcile(e.to_string()))?;
        info!(table = %plan.target_table, records = outcome.records.len(), "records reconciled");
        Ok(outcome)
    }

    fn read_rows(&self, job: &JobDefinition, working_file: &Path) -> PipelineResult<Vec<SourceRow>> {
        if !working_file.exists() {
            return Err(PreconditionError::WorkingFileMissing(working_file.to_path_buf()).into());
        }
        let reader = self
            .registry
            .resolve_reader(&job.reader_type)
            .ok_or_else(|| PreconditionError::ReaderNotRegistered(job.reader_type.clone()))?;
        Ok(reader.read_data(working_file)?)
    }

    fn translator_for(&self, mapping: &FieldMapping) -> Option<Arc<dyn Translator>> {
        let name = mapping.translator_name.as_deref()?;
        let translator = self.registry.resolve_translator(name);
        if translator.is_none() && !name.trim().is_empty() {
            warn!(field = %mapping.name, translator = %name, "translator not registered, values pass through");
        }
        translator
    }
}

/// Build the target record for one source row.
fn build_record(
    job: &JobDefinition,
    columns: &[ColumnPlan<'_>],
    row: usize,
    source: &SourceRow,
) -> Result<Record, RowFailure> {
    let mut record = Record::new();
    for column in columns {
        let mapping = column.mapping;
        let raw = match mapping.source_index {
            Some(index) => source.get(index).cloned().unwrap_or(Value::Null),
            None => mapping.default_for(&job.user_name).unwrap_or(Value::Null),
        };

        let translated = match &column.translator {
            Some(_) if is_blank(&raw) => Value::Null,
            Some(translator) => translator
                .translate(mapping.translator_source_key.as_deref(), raw)
                .map_err(|e| RowFailure::invalid(row, format!("Field '{}': {}", mapping.label(), e)))?,
            None => raw,
        };

        let value = mapping
            .target_type
            .coerce(translated)
            .map_err(|e| RowFailure::invalid(row, format!("Field '{}': {}", mapping.label(), e)))?;
        record.insert(mapping.name.clone(), value);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReaderResult;
    use crate::models::FieldIndex;
    use crate::registry::Reader;
    use serde_json::json;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    struct FixedReader(Vec<Vec<&'static str>>);

    impl Reader for FixedReader {
        fn read_header(&self, _path: &Path) -> ReaderResult<Vec<FieldIndex>> {
            Ok(vec![FieldIndex::new("Id", 0), FieldIndex::new("Code", 1)])
        }

        fn read_data(&self, _path: &Path) -> ReaderResult<Vec<SourceRow>> {
            Ok(self.0.iter().map(|cells| SourceRow::from_strs(cells)).collect())
        }
    }

    fn pipeline(rows: Vec<Vec<&'static str>>) -> RowPipeline {
        let registry = Arc::new(ComponentRegistry::new());
        let rows = Arc::new(rows);
        registry
            .register_reader("fixed", move || FixedReader(rows.as_ref().clone()))
            .unwrap();
        RowPipeline::new(registry)
    }

    fn job(file: &Path) -> JobDefinition {
        let mut job = JobDefinition::new("alice")
            .with_reader("fixed")
            .with_mapping(FieldMapping::new("Id", TargetType::Integer).key().with_source_index(0))
            .with_mapping(FieldMapping::new("Code", TargetType::Text).with_source_index(1));
        job.working_file = Some(file.to_path_buf());
        job
    }

    #[test]
    fn test_process_types_and_orders_records() {
        let file = NamedTempFile::new().unwrap();
        let outcome = pipeline(vec![vec!["1", "A"], vec!["2", "B"]]).process(&job(file.path())).unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.records[0]["Id"], json!(1));
        assert_eq!(outcome.records[1]["Code"], json!("B"));
        let names: Vec<&str> = outcome.schema.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "Code"]);
        assert_eq!(outcome.summary(), "2 rows loaded");
    }

    #[test]
    fn test_coercion_failure_is_a_row_error() {
        let file = NamedTempFile::new().unwrap();
        let outcome = pipeline(vec![vec!["x", "A"], vec!["2", "B"]]).process(&job(file.path())).unwrap();

        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.error_count, 1);
        assert_eq!(outcome.skipped[0].row, 1);
        assert!(matches!(outcome.skipped[0].failure, RowFailure::Invalid { .. }));
    }

    #[test]
    fn test_missing_cells_become_null() {
        let file = NamedTempFile::new().unwrap();
        let outcome = pipeline(vec![vec!["1"]]).process(&job(file.path())).unwrap();
        assert_eq!(outcome.records[0].get("Code"), Some(&Value::Null));
    }

    #[test]
    fn test_working_file_preconditions() {
        let pipeline = pipeline(vec![]);
        let mut job = job(Path::new("unused"));

        job.working_file = None;
        assert!(matches!(
            pipeline.process(&job),
            Err(PipelineError::Precondition(PreconditionError::WorkingFileNotSet))
        ));

        job.working_file = Some(PathBuf::from("/nonexistent/batchload/upload.csv"));
        assert!(matches!(
            pipeline.process(&job),
            Err(PipelineError::Precondition(PreconditionError::WorkingFileMissing(_)))
        ));
    }

    #[test]
    fn test_unknown_reader() {
        let file = NamedTempFile::new().unwrap();
        let job = job(file.path()).with_reader("xlsx");
        assert!(matches!(
            pipeline(vec![]).process(&job),
            Err(PipelineError::Precondition(PreconditionError::ReaderNotRegistered(name))) if name == "xlsx"
        ));
    }

    #[test]
    fn test_tally_threshold_is_strict() {
        let job = JobDefinition::new("alice").with_policies(FailurePolicy::Skip, FailurePolicy::Skip, 1);
        let mut tally = Tally::default();

        assert!(tally.record(&job, RowFailure::invalid(1, "bad")).is_ok());
        assert!(tally.record(&job, RowFailure::duplicate(2, "1")).is_ok());
        assert!(tally.record(&job, RowFailure::invalid(3, "bad")).is_err());
        assert_eq!(tally.error_count, 2);
        assert_eq!(tally.duplicate_count, 1);
        assert_eq!(tally.skipped.len(), 2);
    }

    #[test]
    fn test_summary_mentions_skipped_rows() {
        let outcome = BatchOutcome {
            error_count: 2,
            duplicate_count: 1,
            ..Default::default()
        };
        assert_eq!(
            outcome.summary(),
            "0 rows loaded, 2 rows skipped due to errors, 1 rows skipped due to duplicates"
        );
    }
}
