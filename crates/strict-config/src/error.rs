// crates/strict-config/src/error.rs
// ============================================================================
// Module: Registry Errors
// Description: Error taxonomy for schema, source, and registry operations.
// Purpose: Fail loudly and synchronously on every misuse of the registry.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! Every fallible operation in this crate returns [`RegistryError`]. Errors are
//! never retried or swallowed internally; configuration loading is a one-shot
//! startup step where failing fast is the expected behavior.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry, schema, and source errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Key is not declared in the schema.
    #[error("unknown config variable: {key}")]
    UnknownVariable {
        /// The undeclared key.
        key: String,
    },
    /// Composite value supplied where a scalar is required.
    #[error("unsupported value type for {key}: {kind} values are not supported")]
    UnsupportedType {
        /// Key the value was destined for.
        key: String,
        /// Kind of the rejected value (`sequence` or `mapping`).
        kind: &'static str,
    },
    /// Schema was declared more than once for a registry.
    #[error("config schema already declared")]
    DuplicateSchema,
    /// Registry was built without a schema.
    #[error("config schema must be declared before building the registry")]
    MissingSchema,
    /// Key declared more than once in a schema.
    #[error("duplicate config key in schema: {0}")]
    DuplicateKey(String),
    /// Key is empty or carries surrounding whitespace.
    #[error("invalid config key: '{0}'")]
    InvalidKey(String),
    /// Initializer invoked after the registry was initialized.
    #[error("config registry already initialized")]
    AlreadyInitialized,
    /// Source file does not exist.
    #[error("config file not found: {0}")]
    FileNotFound(String),
    /// I/O failure while reading a source.
    #[error("config io error: {0}")]
    Io(String),
    /// Source content could not be parsed.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Source content violates size or encoding limits.
    #[error("invalid config source: {0}")]
    InvalidSource(String),
    /// Generated schema docs differ from the file on disk.
    #[error("schema docs out of date: {0}")]
    DocsOutOfDate(String),
    /// Registry state lock was poisoned by a panicking holder.
    #[error("config registry lock poisoned")]
    LockPoisoned,
}

impl RegistryError {
    /// Builds an [`RegistryError::UnknownVariable`] for the given key.
    #[must_use]
    pub fn unknown(key: impl Into<String>) -> Self {
        Self::UnknownVariable {
            key: key.into(),
        }
    }
}
