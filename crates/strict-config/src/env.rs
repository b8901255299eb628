// crates/strict-config/src/env.rs
// ============================================================================
// Module: Environment Source
// Description: Config source reading prefixed process environment variables.
// Purpose: Map `<PREFIX>_<KEY>` variables onto lower-case config keys.
// Dependencies: none
// ============================================================================

//! ## Overview
//! The environment source scans variables whose name starts with a prefix,
//! compared ASCII case-insensitively and followed by `_`. The remainder of the
//! name is lower-cased to form the key: with prefix `MYAPP`, `MYAPP_LANG`
//! becomes `lang`. An empty prefix selects every variable.
//!
//! Variables with non UTF-8 names or values are skipped. Two variables that
//! normalize to the same declared key fail the load rather than picking one
//! silently. Size and collision checks skip keys outside the schema, which are
//! only passed through for reporting.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::coerce::RawValue;
use crate::error::RegistryError;
use crate::source::ConfigSource;
use crate::source::SourceValues;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Separator between prefix and key in variable names.
pub const ENV_SEPARATOR: char = '_';
/// Default maximum bytes accepted for one variable value.
pub const DEFAULT_MAX_ENV_VALUE_BYTES: usize = 64 * 1024;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for [`EnvSource`].
///
/// # Invariants
/// - `overrides`, when set, replaces the process environment entirely.
/// - `max_value_bytes` is a hard upper bound for declared matching variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSourceConfig {
    /// Variable name prefix (a trailing `_` is tolerated).
    pub prefix: String,
    /// Optional variable map used instead of the process environment.
    pub overrides: Option<BTreeMap<String, String>>,
    /// Maximum bytes allowed for a single matching value.
    pub max_value_bytes: usize,
}

impl Default for EnvSourceConfig {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            overrides: None,
            max_value_bytes: DEFAULT_MAX_ENV_VALUE_BYTES,
        }
    }
}

// ============================================================================
// SECTION: Source Implementation
// ============================================================================

/// Config source backed by environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvSource {
    /// Prefix, override, and limit settings.
    config: EnvSourceConfig,
}

impl EnvSource {
    /// Creates a source reading the process environment under `prefix`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self::with_config(EnvSourceConfig {
            prefix: prefix.into(),
            ..EnvSourceConfig::default()
        })
    }

    /// Creates a source from explicit configuration.
    #[must_use]
    pub const fn with_config(config: EnvSourceConfig) -> Self {
        Self {
            config,
        }
    }

    /// Returns the configured prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.config.prefix
    }

    /// Snapshots candidate variables in name order.
    fn variables(&self) -> BTreeMap<String, String> {
        if let Some(overrides) = &self.config.overrides {
            return overrides.clone();
        }
        std::env::vars_os()
            .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
            .collect()
    }
}

impl ConfigSource for EnvSource {
    fn name(&self) -> &str {
        "env"
    }

    fn load(&self) -> Result<SourceValues, RegistryError> {
        self.load_declared(&|_| true)
    }

    fn load_declared(
        &self,
        declared: &dyn Fn(&str) -> bool,
    ) -> Result<SourceValues, RegistryError> {
        let mut values = SourceValues::new();
        let mut origins: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in self.variables() {
            let Some(key) = key_for_variable(&name, &self.config.prefix) else {
                continue;
            };
            if !declared(&key) {
                values.entry(key).or_insert(RawValue::String(value));
                continue;
            }
            if value.len() > self.config.max_value_bytes {
                return Err(RegistryError::InvalidSource(format!(
                    "environment variable {name} exceeds size limit"
                )));
            }
            if let Some(previous) = origins.insert(key.clone(), name.clone()) {
                return Err(RegistryError::InvalidSource(format!(
                    "environment variables {previous} and {name} both map to key {key}"
                )));
            }
            values.insert(key, RawValue::String(value));
        }
        Ok(values)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Maps a variable name to a config key when it carries `prefix`.
///
/// Returns `None` for non-matching names and for names with nothing after the
/// separator.
#[must_use]
pub fn key_for_variable(name: &str, prefix: &str) -> Option<String> {
    let prefix = prefix.strip_suffix(ENV_SEPARATOR).unwrap_or(prefix);
    if prefix.is_empty() {
        return (!name.is_empty()).then(|| name.to_lowercase());
    }
    let head = name.get(..prefix.len())?;
    if !head.eq_ignore_ascii_case(prefix) {
        return None;
    }
    let rest = name.get(prefix.len()..)?.strip_prefix(ENV_SEPARATOR)?;
    if rest.is_empty() {
        return None;
    }
    Some(rest.to_lowercase())
}
