//! Shared fixtures: an in-memory reader and typical jobs.

#![allow(dead_code)]

use batchload::error::{ReaderError, ReaderResult};
use batchload::{ComponentRegistry, FieldIndex, FieldMapping, JobDefinition, Reader, SourceRow, TargetType};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tempfile::NamedTempFile;

pub const READER: &str = "memory";

#[derive(Debug, Clone, Default)]
struct Sheet {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

/// Sheets keyed by working file path, shared by every reader instance.
#[derive(Debug, Clone, Default)]
pub struct MemoryFiles {
    sheets: Arc<RwLock<HashMap<PathBuf, Sheet>>>,
}

impl MemoryFiles {
    pub fn insert(&self, path: &Path, header: &[&str], rows: &[&[&str]]) {
        let sheet = Sheet {
            header: header.iter().map(|s| s.to_string()).collect(),
            rows: rows.iter().map(|r| r.iter().map(|s| s.to_string()).collect()).collect(),
        };
        self.sheets.write().unwrap().insert(path.to_path_buf(), sheet);
    }

    fn sheet(&self, path: &Path) -> ReaderResult<Sheet> {
        self.sheets
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| ReaderError::NoHeader(path.to_path_buf()))
    }
}

pub struct MemoryReader {
    files: MemoryFiles,
}

impl Reader for MemoryReader {
    fn read_header(&self, path: &Path) -> ReaderResult<Vec<FieldIndex>> {
        let sheet = self.files.sheet(path)?;
        Ok(sheet
            .header
            .iter()
            .enumerate()
            .map(|(i, name)| FieldIndex::new(name.clone(), i as i32))
            .collect())
    }

    fn read_data(&self, path: &Path) -> ReaderResult<Vec<SourceRow>> {
        let sheet = self.files.sheet(path)?;
        Ok(sheet.rows.iter().map(|cells| SourceRow::from_strs(cells)).collect())
    }
}

/// A registry with the in-memory reader registered, plus its backing files.
pub fn registry() -> (Arc<ComponentRegistry>, MemoryFiles) {
    batchload::logging::init_test();
    let files = MemoryFiles::default();
    let registry = Arc::new(ComponentRegistry::new());
    let shared = files.clone();
    registry
        .register_reader(READER, move || MemoryReader { files: shared.clone() })
        .unwrap();
    (registry, files)
}

/// A real staged file with the given sheet registered under its path.
pub fn staged(files: &MemoryFiles, header: &[&str], rows: &[&[&str]]) -> NamedTempFile {
    let file = NamedTempFile::new().unwrap();
    files.insert(file.path(), header, rows);
    file
}

/// `Id` (integer key) and `Code` (text), both resolved.
pub fn keyed_job(working_file: &Path) -> JobDefinition {
    let mut job = JobDefinition::new("alice")
        .with_reader(READER)
        .with_target_table("items")
        .with_mapping(FieldMapping::new("Id", TargetType::Integer).key().with_source_index(0))
        .with_mapping(FieldMapping::new("Code", TargetType::Text).with_source_index(1));
    job.file_name = "items.csv".to_string();
    job.working_file = Some(working_file.to_path_buf());
    job
}
