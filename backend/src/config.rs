//! Process-level defaults for new job definitions.
//!
//! Values come from the environment (a `.env` file is loaded if present):
//!
//! | Variable | Default |
//! |---|---|
//! | `BATCHLOAD_MAX_ERRORS` | `10` |
//! | `BATCHLOAD_READER` | `csv` |
//! | `BATCHLOAD_VALIDATOR` | `default` |
//! | `BATCHLOAD_DUPLICATE_HANDLING` | `Skip` |
//! | `BATCHLOAD_ERROR_HANDLING` | `Skip` |

use serde::{Deserialize, Serialize};
use std::env;
use tracing::warn;

use crate::models::FailurePolicy;
use crate::registry::DEFAULT_VALIDATOR;

pub const ENV_MAX_ERRORS: &str = "BATCHLOAD_MAX_ERRORS";
pub const ENV_READER: &str = "BATCHLOAD_READER";
pub const ENV_VALIDATOR: &str = "BATCHLOAD_VALIDATOR";
pub const ENV_DUPLICATE_HANDLING: &str = "BATCHLOAD_DUPLICATE_HANDLING";
pub const ENV_ERROR_HANDLING: &str = "BATCHLOAD_ERROR_HANDLING";

/// Defaults applied to every new job definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub max_errors: usize,
    pub reader: String,
    pub validator: String,
    pub duplicate_handling: FailurePolicy,
    pub error_handling: FailurePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_errors: 10,
            reader: "csv".to_string(),
            validator: DEFAULT_VALIDATOR.to_string(),
            duplicate_handling: FailurePolicy::Skip,
            error_handling: FailurePolicy::Skip,
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup.
    ///
    /// Unparsable values are logged and replaced by the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(raw) = lookup(ENV_MAX_ERRORS) {
            match raw.trim().parse() {
                Ok(max) => settings.max_errors = max,
                Err(_) => warn!(variable = ENV_MAX_ERRORS, value = %raw, "ignoring invalid setting"),
            }
        }
        if let Some(reader) = lookup(ENV_READER).filter(|v| !v.trim().is_empty()) {
            settings.reader = reader.trim().to_string();
        }
        if let Some(validator) = lookup(ENV_VALIDATOR).filter(|v| !v.trim().is_empty()) {
            settings.validator = validator.trim().to_string();
        }
        if let Some(policy) = policy_setting(&lookup, ENV_DUPLICATE_HANDLING) {
            settings.duplicate_handling = policy;
        }
        if let Some(policy) = policy_setting(&lookup, ENV_ERROR_HANDLING) {
            settings.error_handling = policy;
        }

        settings
    }
}

fn policy_setting<F>(lookup: &F, key: &str) -> Option<FailurePolicy>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    let policy = FailurePolicy::from_name(&raw);
    if policy.is_none() {
        warn!(variable = key, value = %raw, "ignoring invalid setting");
    }
    policy
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(|_| None);
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.max_errors, 10);
        assert_eq!(settings.validator, "default");
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::from_lookup(lookup_from(&[
            (ENV_MAX_ERRORS, "25"),
            (ENV_READER, "xlsx"),
            (ENV_DUPLICATE_HANDLING, "abort"),
        ]));
        assert_eq!(settings.max_errors, 25);
        assert_eq!(settings.reader, "xlsx");
        assert_eq!(settings.duplicate_handling, FailurePolicy::Abort);
        assert_eq!(settings.error_handling, FailurePolicy::Skip);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let settings = Settings::from_lookup(lookup_from(&[
            (ENV_MAX_ERRORS, "lots"),
            (ENV_ERROR_HANDLING, "retry"),
            (ENV_READER, "   "),
        ]));
        assert_eq!(settings, Settings::default());
    }
}
