// crates/strict-config/src/schema.rs
// ============================================================================
// Module: Config Schema
// Description: Declared configuration keys and their default values.
// Purpose: Define the closed set of keys a registry accepts.
// Dependencies: serde, serde_yaml
// ============================================================================

//! ## Overview
//! A [`Schema`] is the immutable declaration of every configuration key an
//! application may read, each with an optional default and description. Keys
//! are compared case-sensitively. Defaults pass through the same coercion as
//! source values, so a `true` default is stored as `"true"`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::coerce::RawValue;
use crate::coerce::coerce_for;
use crate::error::RegistryError;

// ============================================================================
// SECTION: Schema Types
// ============================================================================

/// A declared configuration key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaEntry {
    /// Canonical default value, or `None` when the key has no default.
    pub default: Option<String>,
    /// Optional human-readable description.
    pub description: Option<String>,
}

/// Immutable mapping from declared key to its entry.
///
/// # Invariants
/// - Keys are unique, non-empty, and free of surrounding whitespace.
/// - Defaults are canonical strings produced by coercion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Schema {
    /// Declared entries keyed by configuration key.
    entries: BTreeMap<String, SchemaEntry>,
}

impl Schema {
    /// Starts a new schema declaration.
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    /// Returns true when `key` is declared.
    #[must_use]
    pub fn is_valid(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns the default for `key`, or `None` when absent or undeclared.
    ///
    /// Callers that need to tell the two apart check [`Schema::is_valid`] first.
    #[must_use]
    pub fn default_of(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(|entry| entry.default.as_deref())
    }

    /// Returns the full entry for `key`.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<&SchemaEntry> {
        self.entries.get(key)
    }

    /// Iterates declared keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterates declared entries in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &SchemaEntry)> {
        self.entries.iter().map(|(key, entry)| (key.as_str(), entry))
    }

    /// Number of declared keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when no keys are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parses a schema declaration document.
    ///
    /// The document is a YAML mapping from key to either a scalar default,
    /// `null` for no default, or a `{ default, description }` mapping.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Parse`] for malformed YAML and the builder
    /// errors for invalid declarations.
    pub fn from_yaml_str(content: &str) -> Result<Self, RegistryError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let declarations: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(content)
            .map_err(|err| RegistryError::Parse(format!("schema: {err}")))?;
        let mut builder = Self::builder();
        for (key, declaration) in declarations {
            builder = if declaration.is_mapping() {
                let detailed: DetailedDeclaration = serde_yaml::from_value(declaration)
                    .map_err(|err| RegistryError::Parse(format!("schema key {key}: {err}")))?;
                match detailed.description {
                    Some(description) => builder.documented(key, detailed.default, description),
                    None => builder.key(key, detailed.default),
                }
            } else {
                builder.key(key, declaration)
            };
        }
        builder.build()
    }
}

/// Mapping form of a schema file entry.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DetailedDeclaration {
    /// Default value; missing means no default.
    #[serde(default)]
    default: serde_yaml::Value,
    /// Optional description.
    description: Option<String>,
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Incremental schema declaration.
///
/// The first invalid declaration is remembered and reported by
/// [`SchemaBuilder::build`]; later declarations are ignored.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    /// Entries declared so far.
    entries: BTreeMap<String, SchemaEntry>,
    /// First declaration error, if any.
    error: Option<RegistryError>,
}

impl SchemaBuilder {
    /// Declares `key` with a default value (`RawValue::Null` for none).
    #[must_use]
    pub fn key(self, key: impl Into<String>, default: impl Into<RawValue>) -> Self {
        self.declare(key.into(), default.into(), None)
    }

    /// Declares `key` without a default.
    #[must_use]
    pub fn key_without_default(self, key: impl Into<String>) -> Self {
        self.declare(key.into(), RawValue::Null, None)
    }

    /// Declares `key` with a default and a description.
    #[must_use]
    pub fn documented(
        self,
        key: impl Into<String>,
        default: impl Into<RawValue>,
        description: impl Into<String>,
    ) -> Self {
        self.declare(key.into(), default.into(), Some(description.into()))
    }

    /// Finishes the declaration.
    ///
    /// # Errors
    ///
    /// Returns the first [`RegistryError::InvalidKey`],
    /// [`RegistryError::DuplicateKey`], or [`RegistryError::UnsupportedType`]
    /// raised while declaring keys.
    pub fn build(self) -> Result<Schema, RegistryError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        Ok(Schema {
            entries: self.entries,
        })
    }

    /// Records one declaration unless an earlier one already failed.
    fn declare(mut self, key: String, default: RawValue, description: Option<String>) -> Self {
        if self.error.is_some() {
            return self;
        }
        if let Err(error) = validate_key(&key) {
            self.error = Some(error);
            return self;
        }
        if self.entries.contains_key(&key) {
            self.error = Some(RegistryError::DuplicateKey(key));
            return self;
        }
        match coerce_for(&key, default) {
            Ok(default) => {
                self.entries.insert(
                    key,
                    SchemaEntry {
                        default,
                        description,
                    },
                );
            }
            Err(error) => self.error = Some(error),
        }
        self
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Rejects empty keys and keys with surrounding whitespace.
fn validate_key(key: &str) -> Result<(), RegistryError> {
    if key.is_empty() || key.trim() != key {
        return Err(RegistryError::InvalidKey(key.to_string()));
    }
    Ok(())
}
