// crates/strict-config/src/lib.rs
// ============================================================================
// Module: Strict Config
// Description: Schema-checked configuration registry with deferred init.
// Purpose: Make every configuration read and write go through declared keys.
// Dependencies: serde, serde_json, serde_yaml, thiserror, yaml-rust2
// ============================================================================

//! ## Overview
//! This crate provides a strict configuration registry. A [`Schema`] declares
//! every valid key with an optional default; the [`Registry`] rejects access to
//! anything else with [`RegistryError::UnknownVariable`]. Values are coerced
//! to canonical strings, populated from environment variables, flat YAML
//! files, or in-memory maps, and may be temporarily overridden in a scope that
//! restores prior values on every exit path.
//! Invariants:
//! - Only declared keys are ever stored, read, or overridden.
//! - Stored values are canonical strings or absent.
//! - Initialization happens at most once between resets; `after_initialize`
//!   fires exactly once per initialization.
//!
//! ```
//! use strict_config::Registry;
//! use strict_config::Schema;
//!
//! let schema = Schema::builder().key("lang", "en").key("debug", false).build()?;
//! let registry = Registry::builder("app").declare_schema(schema)?.build()?;
//! registry.populate_from_map([("debug", true)])?;
//! assert!(registry.is_true("debug")?);
//! assert_eq!(registry.get("lang")?.as_deref(), Some("en"));
//! assert!(registry.get("missing").is_err());
//! # Ok::<(), strict_config::RegistryError>(())
//! ```

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod coerce;
pub mod docs;
pub mod env;
pub mod error;
pub mod file;
pub mod harness;
pub mod registry;
pub mod schema;
pub mod source;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::NoopAuditSink;
pub use audit::RegistryAction;
pub use audit::RegistryAuditEvent;
pub use audit::RegistryAuditSink;
pub use audit::StderrAuditSink;
pub use coerce::RawValue;
pub use coerce::TRUTHY_VALUES;
pub use coerce::coerce;
pub use coerce::is_falsy;
pub use coerce::is_truthy;
pub use docs::schema_docs_markdown;
pub use docs::verify_schema_docs;
pub use docs::write_schema_docs;
pub use env::EnvSource;
pub use env::EnvSourceConfig;
pub use error::RegistryError;
pub use file::FileSource;
pub use file::FileSourceConfig;
pub use harness::ConfigStub;
pub use harness::isolated;
pub use registry::DefaultHooks;
pub use registry::InitializationState;
pub use registry::Registry;
pub use registry::RegistryBuilder;
pub use registry::RegistryHooks;
pub use schema::Schema;
pub use schema::SchemaBuilder;
pub use schema::SchemaEntry;
pub use source::ConfigSource;
pub use source::MapSource;
pub use source::SourceValues;
