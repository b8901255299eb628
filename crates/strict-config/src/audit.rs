// crates/strict-config/src/audit.rs
// ============================================================================
// Module: Registry Audit
// Description: Structured audit events for registry lifecycle and misuse.
// Purpose: Record initialization, overrides, and unknown-key access as JSON.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The registry reports lifecycle transitions and rejected keys to a
//! [`RegistryAuditSink`]. Events carry key names and source labels but never
//! configuration values, which may hold secrets.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;

use serde::Serialize;

// ============================================================================
// SECTION: Audit Events
// ============================================================================

/// Registry action recorded in an audit event.
///
/// # Invariants
/// - Labels are stable for log consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryAction {
    /// Registry transitioned into the initialized state.
    Initialized,
    /// Deferred initialization was scheduled.
    DeferredScheduled,
    /// A pending deferred routine was replaced.
    DeferredRetargeted,
    /// The deferred routine ran on first access.
    DeferredRun,
    /// The gating hook declined to run the deferred routine.
    DeferredSkipped,
    /// An undeclared key was accessed.
    UnknownKey,
    /// A source offered keys that are not declared.
    IgnoredKeys,
    /// Scoped overrides were applied.
    OverrideApplied,
    /// Scoped overrides were restored.
    OverrideRestored,
    /// Registry state was reset.
    Reset,
}

impl RegistryAction {
    /// Returns the stable label for the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Initialized => "initialized",
            Self::DeferredScheduled => "deferred_scheduled",
            Self::DeferredRetargeted => "deferred_retargeted",
            Self::DeferredRun => "deferred_run",
            Self::DeferredSkipped => "deferred_skipped",
            Self::UnknownKey => "unknown_key",
            Self::IgnoredKeys => "ignored_keys",
            Self::OverrideApplied => "override_applied",
            Self::OverrideRestored => "override_restored",
            Self::Reset => "reset",
        }
    }
}

/// Structured audit record emitted by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryAuditEvent {
    /// Event family name.
    pub event: &'static str,
    /// Registry label.
    pub registry: String,
    /// Recorded action.
    pub action: RegistryAction,
    /// Source label, when a source is involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Keys involved in the action.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
}

impl RegistryAuditEvent {
    /// Builds an event for `registry` with no source or keys.
    #[must_use]
    pub fn new(registry: &str, action: RegistryAction) -> Self {
        Self {
            event: "config_registry",
            registry: registry.to_string(),
            action,
            source: None,
            keys: Vec::new(),
        }
    }

    /// Attaches a source label.
    #[must_use]
    pub fn with_source(mut self, source: &str) -> Self {
        self.source = Some(source.to_string());
        self
    }

    /// Attaches the involved keys.
    #[must_use]
    pub fn with_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.keys = keys.into_iter().map(Into::into).collect();
        self
    }
}

// ============================================================================
// SECTION: Audit Sinks
// ============================================================================

/// Receiver for registry audit events.
pub trait RegistryAuditSink: Send + Sync {
    /// Records an audit event.
    fn record(&self, event: &RegistryAuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl RegistryAuditSink for StderrAuditSink {
    fn record(&self, event: &RegistryAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// No-op audit sink, used by default.
pub struct NoopAuditSink;

impl RegistryAuditSink for NoopAuditSink {
    fn record(&self, _event: &RegistryAuditEvent) {}
}
