//! Error types for the batch loading pipeline.
//!
//! This module defines one error type per concern:
//!
//! - [`ReaderError`] - Failures inside a reader plugin
//! - [`TranslateError`] - Failures inside a translator plugin
//! - [`RegistryError`] - Invalid component registrations
//! - [`RowFailure`] - Tagged outcome of a rejected row (duplicate or invalid)
//! - [`DefinitionError`] - Structural problems in a job definition
//! - [`PreconditionError`] - Missing arguments or files before a run
//! - [`PipelineError`] - Top-level errors returned by field resolution and the row pipeline
//!
//! Conversion into [`PipelineError`] is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Reader Errors
// =============================================================================

/// Errors raised by a reader while loading the header or the rows of a file.
#[derive(Debug, Error)]
pub enum ReaderError {
    /// Failed to read the file.
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file content could not be interpreted.
    #[error("Malformed data in '{path}': {message}")]
    Malformed { path: PathBuf, message: String },

    /// No header row was found.
    #[error("No header row in '{0}'")]
    NoHeader(PathBuf),
}

// =============================================================================
// Translation Errors
// =============================================================================

/// Errors raised by a translator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TranslateError {
    /// The source key is not one the translator understands.
    #[error("Unknown source key '{key}' for translator '{translator}'")]
    UnknownSourceKey { translator: String, key: String },

    /// No entry for the value in the selected reference table.
    #[error("No '{key}' entry for value '{value}'")]
    MissingEntry { key: String, value: String },

    /// Reference data could not be loaded.
    #[error("Failed to load reference data: {0}")]
    LoadFailed(String),
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the component registry.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Components must be registered under a non-blank name.
    #[error("Cannot register a {0} under an empty name")]
    EmptyName(&'static str),
}

// =============================================================================
// Row Failures
// =============================================================================

/// Why a single row was rejected.
///
/// Validators return this instead of raising; the row pipeline switches on the
/// variant to decide which counter to bump and which abort policy applies.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RowFailure {
    /// The row's key tuple was already seen in this run.
    #[error("Row {row}: duplicate key ({key})")]
    Duplicate { row: usize, key: String },

    /// Any other row-level problem (null check, translation, type coercion).
    #[error("Row {row}: {message}")]
    Invalid { row: usize, message: String },
}

impl RowFailure {
    pub fn duplicate(row: usize, key: impl Into<String>) -> Self {
        Self::Duplicate {
            row,
            key: key.into(),
        }
    }

    pub fn invalid(row: usize, message: impl Into<String>) -> Self {
        Self::Invalid {
            row,
            message: message.into(),
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate { .. })
    }

    /// Source row number (1-based, header excluded).
    pub fn row(&self) -> usize {
        match self {
            Self::Duplicate { row, .. } | Self::Invalid { row, .. } => *row,
        }
    }
}

// =============================================================================
// Definition Errors
// =============================================================================

/// One structural problem found in a job definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionViolation {
    /// No included mapping is marked as key.
    MissingKeyColumn,
    /// No non-key mapping is included.
    MissingColumnSelection,
    /// An included mapping has no resolved source column.
    MissingSourceMapping { display_name: String },
    /// A required mapping has neither a source column nor a default.
    RequiredFieldUnmapped { display_name: String },
    /// A regex match rule does not compile.
    InvalidMatchPattern {
        field: String,
        pattern: String,
        message: String,
    },
    /// A resolved source index points past the discovered source fields.
    SourceIndexOutOfRange { display_name: String, index: usize },
}

impl fmt::Display for DefinitionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKeyColumn => write!(f, "missing key column"),
            Self::MissingColumnSelection => write!(f, "missing column selection"),
            Self::MissingSourceMapping { display_name } => {
                write!(f, "missing source column mapping for '{}'", display_name)
            }
            Self::RequiredFieldUnmapped { display_name } => {
                write!(f, "required field '{}' has no source column or default", display_name)
            }
            Self::InvalidMatchPattern {
                field,
                pattern,
                message,
            } => write!(
                f,
                "invalid match pattern '{}' on field '{}': {}",
                pattern, field, message
            ),
            Self::SourceIndexOutOfRange {
                display_name,
                index,
            } => write!(
                f,
                "source column {} for '{}' is not in the uploaded file",
                index, display_name
            ),
        }
    }
}

/// Errors raised by the job-definition validator.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DefinitionError {
    /// The definition cannot be run as configured.
    #[error("Invalid job definition: {}", join_violations(.violations))]
    Invalid { violations: Vec<DefinitionViolation> },
}

impl DefinitionError {
    pub fn violations(&self) -> &[DefinitionViolation] {
        match self {
            Self::Invalid { violations } => violations,
        }
    }
}

fn join_violations(violations: &[DefinitionViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Precondition Errors
// =============================================================================

/// Missing arguments or resources detected before any row is touched.
#[derive(Debug, Error)]
pub enum PreconditionError {
    /// No file name supplied.
    #[error("File name is required")]
    EmptyFileName,

    /// The job has no working file yet.
    #[error("Job has no working file; run field extraction first")]
    WorkingFileNotSet,

    /// The working file does not exist on disk.
    #[error("Working file not found: {0}")]
    WorkingFileMissing(PathBuf),

    /// No reader is registered under the configured name.
    #[error("No reader registered for '{0}'")]
    ReaderNotRegistered(String),

    /// A regex match rule could not be compiled.
    #[error("Invalid match pattern '{pattern}' on field '{field}': {message}")]
    InvalidMatchPattern {
        field: String,
        pattern: String,
        message: String,
    },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level error returned by field extraction and the row pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Precondition violated.
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// Reader failure.
    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    /// Definition failed structural validation.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    /// The abort policy stopped the run.
    #[error("Run aborted after {error_count} error(s) and {duplicate_count} duplicate(s): {failure}")]
    Aborted {
        failure: RowFailure,
        error_count: usize,
        duplicate_count: usize,
    },

    /// The downstream reconciliation engine rejected the batch.
    #[error("Reconciliation failed: {0}")]
    Reconcile(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for reader operations.
pub type ReaderResult<T> = Result<T, ReaderError>;

/// Result type for translator operations.
pub type TranslateResult<T> = Result<T, TranslateError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
