// crates/strict-config/src/source.rs
// ============================================================================
// Module: Config Sources
// Description: Population interface shared by env, file, and map sources.
// Purpose: Let the registry populate itself from any flat key/value origin.
// Dependencies: none
// ============================================================================

//! ## Overview
//! A [`ConfigSource`] produces a flat mapping from key to [`RawValue`]. Sources
//! do not know the schema: the registry filters loaded keys against it, ignores
//! undeclared ones, and coerces the rest. Sources that validate individual
//! values receive the declared-key predicate through
//! [`ConfigSource::load_declared`] so undeclared input never fails a load.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::coerce::RawValue;
use crate::error::RegistryError;

// ============================================================================
// SECTION: Source Interface
// ============================================================================

/// Raw key/value pairs produced by a source.
pub type SourceValues = BTreeMap<String, RawValue>;

/// A one-shot origin of configuration values.
pub trait ConfigSource {
    /// Stable label used in audit events.
    fn name(&self) -> &str;

    /// Reads every key/value pair the source offers.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the underlying origin cannot be read or
    /// parsed.
    fn load(&self) -> Result<SourceValues, RegistryError>;

    /// Reads every key/value pair, enforcing per-value limits only on keys
    /// accepted by `declared`.
    ///
    /// Undeclared keys are still returned so callers can report them. The
    /// registry loads through this method; the default ignores the predicate.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigSource::load`].
    fn load_declared(
        &self,
        declared: &dyn Fn(&str) -> bool,
    ) -> Result<SourceValues, RegistryError> {
        let _ = declared;
        self.load()
    }
}

// ============================================================================
// SECTION: Map Source
// ============================================================================

/// In-memory source for manual initialization.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSource {
    /// Label reported in audit events.
    name: String,
    /// Values handed to the registry.
    values: SourceValues,
}

impl MapSource {
    /// Creates a map source labelled `map`.
    #[must_use]
    pub fn new<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<RawValue>,
    {
        Self::named("map", values)
    }

    /// Creates a map source with a custom label.
    #[must_use]
    pub fn named<K, V>(name: impl Into<String>, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<RawValue>,
    {
        Self {
            name: name.into(),
            values: values.into_iter().map(|(key, value)| (key.into(), value.into())).collect(),
        }
    }
}

impl ConfigSource for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load(&self) -> Result<SourceValues, RegistryError> {
        Ok(self.values.clone())
    }
}
