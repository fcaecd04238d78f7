//! Transformation module.
//!
//! This module turns an uploaded file into cleaned records:
//! - Resolver: matches target fields to the file's columns
//! - Translators: built-in value translators
//! - Pipeline: row-by-row build, validate and account

pub mod pipeline;
pub mod resolver;
pub mod translators;

pub use pipeline::{BatchOutcome, Reconciler, RowPipeline, SkippedRow, TargetColumn};
pub use resolver::{find_source_field, resolve_mappings, FieldMatch, FieldResolver};
pub use translators::{LookupTables, LookupTranslator, OperationTranslator, TextOperation};
