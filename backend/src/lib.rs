//! # Batchload - field resolution and row pipeline for staged uploads
//!
//! Batchload takes a tabular file uploaded by a user, resolves its columns
//! against a configured target schema, and produces cleaned, typed records
//! ready to be merged into a destination store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Working File│────▶│  Resolver   │────▶│   Pipeline  │────▶│  Reconciler │
//! │  (staged)   │     │  (header +  │     │ (translate, │     │ (merge plan │
//! │             │     │   matching) │     │  validate)  │     │  + records) │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                            ▲                   ▲
//!                            └─── Registry ──────┘
//!                      (readers, translators, validators)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use batchload::{ensure_valid, ComponentRegistry, FieldResolver, JobDefinition, RowPipeline};
//! use std::sync::Arc;
//!
//! let registry = Arc::new(ComponentRegistry::new());
//! registry.register_reader("csv", || MyCsvReader)?;
//!
//! let mut job = JobDefinition::from_json(&definition_json)?;
//! FieldResolver::new(Arc::clone(&registry)).extract_fields(&mut job, "upload.csv", &staged_path)?;
//! ensure_valid(&job)?;
//!
//! let outcome = RowPipeline::new(registry).process(&job)?;
//! println!("{}", outcome.summary());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Job definition, field mappings, source rows
//! - [`registry`] - Named reader, translator and validator factories
//! - [`transform`] - Field resolution, translators and the row pipeline
//! - [`validation`] - Row validators and job-definition checks
//! - [`config`] - Process-level defaults from the environment
//! - [`logging`] - Tracing subscriber setup

// Core modules
pub mod error;
pub mod models;

// Configuration
pub mod config;
pub mod logging;

// Plugins
pub mod registry;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    DefinitionError,
    DefinitionViolation,
    PipelineError,
    PipelineResult,
    PreconditionError,
    ReaderError,
    RegistryError,
    RowFailure,
    TranslateError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    DefaultKind,
    FailurePolicy,
    FieldIndex,
    FieldMapping,
    JobDefinition,
    MatchRule,
    MergeColumn,
    MergePlan,
    Record,
    SourceRow,
    TargetType,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::Settings;

// =============================================================================
// Re-exports - Registry
// =============================================================================

pub use registry::{ComponentRegistry, Reader, Translator, DEFAULT_VALIDATOR};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    BatchOutcome,
    FieldResolver,
    LookupTranslator,
    OperationTranslator,
    Reconciler,
    RowPipeline,
    SkippedRow,
    TargetColumn,
};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{ensure_valid, validate_definition, DefaultRowValidator, RowValidator};
