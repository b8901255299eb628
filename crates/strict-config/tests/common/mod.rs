// crates/strict-config/tests/common/mod.rs
// ============================================================================
// Module: Common Test Fixtures
// Description: Shared schemas, sources, hooks, and sinks for registry tests.
// Purpose: Provide reusable instrumentation for deterministic registry tests.
// Dependencies: strict-config
// ============================================================================

//! ## Overview
//! Fixtures shared across the integration suites: a representative schema,
//! a source that counts its loads, hooks that count and gate initialization,
//! and an audit sink that keeps every event in memory.

#![allow(dead_code, reason = "Shared test helpers may be unused in some cases.")]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use strict_config::ConfigSource;
use strict_config::MapSource;
use strict_config::RawValue;
use strict_config::Registry;
use strict_config::RegistryAction;
use strict_config::RegistryAuditEvent;
use strict_config::RegistryAuditSink;
use strict_config::RegistryError;
use strict_config::RegistryHooks;
use strict_config::Schema;
use strict_config::SourceValues;

/// Result type used by integration tests.
pub type TestResult = Result<(), String>;

// ============================================================================
// SECTION: Schemas
// ============================================================================

/// Schema with string, boolean, integer, float, and default-less keys.
pub fn sample_schema() -> Result<Schema, String> {
    Schema::builder()
        .key("lang", "en")
        .key("debug", false)
        .key("timeout", 30)
        .key("ratio", 1.5)
        .key_without_default("api_key")
        .build()
        .map_err(|err| err.to_string())
}

/// Registry over [`sample_schema`] with default hooks.
pub fn sample_registry() -> Result<Registry, String> {
    Registry::builder("test")
        .declare_schema(sample_schema()?)
        .and_then(strict_config::RegistryBuilder::build)
        .map_err(|err| err.to_string())
}

// ============================================================================
// SECTION: Counting Source
// ============================================================================

/// Map-backed source that counts how often it is loaded.
#[derive(Clone)]
pub struct CountingSource {
    /// Values returned on every load.
    inner: MapSource,
    /// Shared load counter.
    pub loads: Arc<AtomicUsize>,
}

impl CountingSource {
    /// Creates a counting source over `values`.
    pub fn new<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<RawValue>,
    {
        Self {
            inner: MapSource::named("counting", values),
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the number of completed loads.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ConfigSource for CountingSource {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn load(&self) -> Result<SourceValues, RegistryError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.inner.load()
    }
}

/// Source that always fails to load.
pub struct FailingSource;

impl ConfigSource for FailingSource {
    fn name(&self) -> &str {
        "failing"
    }

    fn load(&self) -> Result<SourceValues, RegistryError> {
        Err(RegistryError::InvalidSource("source unavailable".to_string()))
    }
}

// ============================================================================
// SECTION: Hooks
// ============================================================================

/// Hooks that count `after_initialize` calls and gate deferred runs.
#[derive(Clone)]
pub struct CountingHooks {
    /// Number of `after_initialize` calls.
    pub initialized: Arc<AtomicUsize>,
    /// Whether deferred initialization may run.
    pub allow_deferred: Arc<AtomicBool>,
}

impl CountingHooks {
    /// Creates hooks that allow deferred initialization.
    pub fn new() -> Self {
        Self {
            initialized: Arc::new(AtomicUsize::new(0)),
            allow_deferred: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns the number of `after_initialize` calls.
    pub fn initialized_count(&self) -> usize {
        self.initialized.load(Ordering::SeqCst)
    }

    /// Opens or closes the deferred initialization gate.
    pub fn set_allow_deferred(&self, allow: bool) {
        self.allow_deferred.store(allow, Ordering::SeqCst);
    }
}

impl Default for CountingHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryHooks for CountingHooks {
    fn after_initialize(&self) {
        self.initialized.fetch_add(1, Ordering::SeqCst);
    }

    fn should_run_deferred_initialization(&self) -> bool {
        self.allow_deferred.load(Ordering::SeqCst)
    }
}

/// Registry over [`sample_schema`] with the supplied hooks.
pub fn registry_with_hooks(hooks: CountingHooks) -> Result<Registry, String> {
    Registry::builder("test")
        .declare_schema(sample_schema()?)
        .map(|builder| builder.hooks(hooks))
        .and_then(strict_config::RegistryBuilder::build)
        .map_err(|err| err.to_string())
}

// ============================================================================
// SECTION: Audit Sink
// ============================================================================

/// Audit sink that keeps events in memory.
#[derive(Clone, Default)]
pub struct RecordingAuditSink {
    /// Recorded events in emission order.
    events: Arc<Mutex<Vec<RegistryAuditEvent>>>,
}

impl RecordingAuditSink {
    /// Returns a copy of every recorded event.
    pub fn events(&self) -> Vec<RegistryAuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns the recorded actions in order.
    pub fn actions(&self) -> Vec<RegistryAction> {
        self.events().into_iter().map(|event| event.action).collect()
    }
}

impl RegistryAuditSink for RecordingAuditSink {
    fn record(&self, event: &RegistryAuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Registry over [`sample_schema`] reporting to `sink`.
pub fn registry_with_sink(sink: RecordingAuditSink) -> Result<Registry, String> {
    Registry::builder("test")
        .declare_schema(sample_schema()?)
        .map(|builder| builder.audit_sink(sink))
        .and_then(strict_config::RegistryBuilder::build)
        .map_err(|err| err.to_string())
}
