//! Component Registry - named factories for readers, translators and row validators
//!
//! Components are registered at startup under a logical name and resolved by
//! that name when a job runs. The registry is an ordinary value: build one,
//! register what the application provides, and pass it (usually as an
//! `Arc`) to the field resolver and the row pipeline.
//!
//! Resolution rules:
//!
//! - A blank name resolves to `None` without looking at the factories.
//! - An unknown name resolves to `None`; it is not an error.
//! - Translators are built once per name and cached until [`ComponentRegistry::reset`].
//! - Validators carry per-run state, so every resolve builds a fresh instance.
//!   The factory used is cached per name until [`ComponentRegistry::reset`].
//! - Readers are matched case-insensitively and built fresh on every resolve.

pub mod plugins;

pub use plugins::{Reader, Translator, NO_TRANSLATION_KEY};

use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

use crate::error::RegistryError;
use crate::validation::{DefaultRowValidator, RowValidator};

/// Name the built-in row validator is registered under.
pub const DEFAULT_VALIDATOR: &str = "default";

pub type TranslatorFactory = Arc<dyn Fn() -> Arc<dyn Translator> + Send + Sync>;
pub type ValidatorFactory = Arc<dyn Fn() -> Box<dyn RowValidator> + Send + Sync>;
pub type ReaderFactory = Arc<dyn Fn() -> Box<dyn Reader> + Send + Sync>;

static SHARED_REGISTRY: Lazy<Arc<ComponentRegistry>> = Lazy::new(|| Arc::new(ComponentRegistry::new()));

/// Named factories for the pipeline's plugins.
pub struct ComponentRegistry {
    translators: RwLock<HashMap<String, TranslatorFactory>>,
    validators: RwLock<HashMap<String, ValidatorFactory>>,
    readers: RwLock<HashMap<String, ReaderFactory>>,
    translator_cache: RwLock<HashMap<String, Arc<dyn Translator>>>,
    validator_cache: RwLock<HashMap<String, ValidatorFactory>>,
}

impl ComponentRegistry {
    /// Create a registry holding only the default row validator.
    pub fn new() -> Self {
        let registry = Self {
            translators: RwLock::new(HashMap::new()),
            validators: RwLock::new(HashMap::new()),
            readers: RwLock::new(HashMap::new()),
            translator_cache: RwLock::new(HashMap::new()),
            validator_cache: RwLock::new(HashMap::new()),
        };
        write(&registry.validators).insert(
            DEFAULT_VALIDATOR.to_string(),
            Arc::new(|| Box::new(DefaultRowValidator::new()) as Box<dyn RowValidator>),
        );
        registry
    }

    /// Process-wide registry for callers that want one.
    ///
    /// Nothing in this crate uses it implicitly.
    pub fn shared() -> Arc<ComponentRegistry> {
        Arc::clone(&SHARED_REGISTRY)
    }

    /// Register (or replace) a translator factory.
    pub fn register_translator<T, F>(&self, name: &str, factory: F) -> Result<(), RegistryError>
    where
        T: Translator + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let name = checked_name(name, "translator")?;
        debug!(name = %name, "registering translator");
        write(&self.translators).insert(name, Arc::new(move || Arc::new(factory()) as Arc<dyn Translator>));
        Ok(())
    }

    /// Register (or replace) a row validator factory.
    pub fn register_validator<V, F>(&self, name: &str, factory: F) -> Result<(), RegistryError>
    where
        V: RowValidator + 'static,
        F: Fn() -> V + Send + Sync + 'static,
    {
        let name = checked_name(name, "validator")?;
        debug!(name = %name, "registering validator");
        write(&self.validators).insert(name, Arc::new(move || Box::new(factory()) as Box<dyn RowValidator>));
        Ok(())
    }

    /// Register (or replace) a reader factory. Names are case-insensitive.
    pub fn register_reader<R, F>(&self, name: &str, factory: F) -> Result<(), RegistryError>
    where
        R: Reader + 'static,
        F: Fn() -> R + Send + Sync + 'static,
    {
        let name = checked_name(name, "reader")?.to_lowercase();
        debug!(name = %name, "registering reader");
        write(&self.readers).insert(name, Arc::new(move || Box::new(factory()) as Box<dyn Reader>));
        Ok(())
    }

    /// Resolve a translator, building and caching it on first use.
    pub fn resolve_translator(&self, name: &str) -> Option<Arc<dyn Translator>> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        if let Some(cached) = read(&self.translator_cache).get(name) {
            return Some(Arc::clone(cached));
        }

        // No lock is held while the factory runs.
        let factory = read(&self.translators).get(name).cloned()?;
        let built = factory();
        let mut cache = write(&self.translator_cache);
        Some(Arc::clone(cache.entry(name.to_string()).or_insert(built)))
    }

    /// Resolve a fresh validator instance for one run.
    pub fn resolve_validator(&self, name: &str) -> Option<Box<dyn RowValidator>> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        if let Some(factory) = read(&self.validator_cache).get(name) {
            return Some(factory());
        }

        let factory = {
            let mut cache = write(&self.validator_cache);
            match cache.get(name) {
                Some(factory) => Arc::clone(factory),
                None => {
                    let factory = read(&self.validators).get(name).cloned()?;
                    cache.insert(name.to_string(), Arc::clone(&factory));
                    factory
                }
            }
        };
        Some(factory())
    }

    /// Resolve a reader by case-insensitive name. Never cached.
    pub fn resolve_reader(&self, name: &str) -> Option<Box<dyn Reader>> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let factory = read(&self.readers).get(&name.to_lowercase()).cloned()?;
        Some(factory())
    }

    /// Drop cached translators and validator factories.
    pub fn reset(&self) {
        write(&self.translator_cache).clear();
        write(&self.validator_cache).clear();
    }

    /// Registered reader names (lower-cased), sorted.
    pub fn reader_names(&self) -> Vec<String> {
        let mut names: Vec<String> = read(&self.readers).keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ComponentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn checked_name(name: &str, kind: &'static str) -> Result<String, RegistryError> {
    let name = name.trim();
    if name.is_empty() {
        Err(RegistryError::EmptyName(kind))
    } else {
        Ok(name.to_string())
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
