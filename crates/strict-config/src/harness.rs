// crates/strict-config/src/harness.rs
// ============================================================================
// Module: Test Harness
// Description: Stub handles and isolation helpers for tests.
// Purpose: Let tests override config values without leaking state.
// Dependencies: none
// ============================================================================

//! ## Overview
//! [`ConfigStub`] applies overrides one call at a time through the same
//! machinery as [`Registry::with_config`], so stubs are validated and always
//! restored. [`isolated`] resets the registry around a test body.
//!
//! ```
//! use strict_config::Registry;
//! use strict_config::Schema;
//!
//! let schema = Schema::builder().key("lang", "en").build()?;
//! let registry = Registry::builder("app").declare_schema(schema)?.build()?;
//! {
//!     let mut stub = registry.stub();
//!     stub.set("lang", "pt")?;
//!     assert_eq!(registry.get("lang")?.as_deref(), Some("pt"));
//! }
//! assert_eq!(registry.get("lang")?.as_deref(), Some("en"));
//! # Ok::<(), strict_config::RegistryError>(())
//! ```

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::coerce::RawValue;
use crate::error::RegistryError;
use crate::registry::OverrideGuard;
use crate::registry::Registry;

// ============================================================================
// SECTION: Stub Handle
// ============================================================================

/// Incremental override handle returned by [`Registry::stub`].
///
/// Every [`ConfigStub::set`] pushes one override frame. Frames are restored in
/// reverse order by [`ConfigStub::restore`] or when the stub is dropped.
pub struct ConfigStub<'a> {
    /// Registry being stubbed.
    registry: &'a Registry,
    /// Active frames, oldest first.
    guards: Vec<OverrideGuard<'a>>,
}

impl<'a> ConfigStub<'a> {
    /// Creates an empty stub for `registry`.
    pub(crate) const fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            guards: Vec::new(),
        }
    }

    /// Overrides `key` until the stub is restored.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownVariable`] for undeclared keys and
    /// [`RegistryError::UnsupportedType`] for composite values.
    pub fn set(&mut self, key: &str, value: impl Into<RawValue>) -> Result<&mut Self, RegistryError> {
        let guard = self.registry.push_overrides([(key, value.into())])?;
        self.guards.push(guard);
        Ok(self)
    }

    /// Overrides several keys as one frame.
    ///
    /// # Errors
    ///
    /// Same as [`ConfigStub::set`]; nothing is applied when any entry fails.
    pub fn set_all<I, K, V>(&mut self, overrides: I) -> Result<&mut Self, RegistryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<RawValue>,
    {
        let guard = self.registry.push_overrides(overrides)?;
        self.guards.push(guard);
        Ok(self)
    }

    /// Returns the number of frames this stub holds.
    #[must_use]
    pub fn active(&self) -> usize {
        self.guards.len()
    }

    /// Restores every value this stub overrode.
    pub fn restore(&mut self) {
        while let Some(guard) = self.guards.pop() {
            drop(guard);
        }
    }
}

impl Drop for ConfigStub<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}

// ============================================================================
// SECTION: Isolation
// ============================================================================

/// Resets the registry when dropped.
struct ResetOnDrop<'a>(&'a Registry);

impl Drop for ResetOnDrop<'_> {
    fn drop(&mut self) {
        self.0.reset();
    }
}

/// Runs `body` against a freshly reset registry and resets it again after.
///
/// The trailing reset also runs when `body` panics.
pub fn isolated<T>(registry: &Registry, body: impl FnOnce(&Registry) -> T) -> T {
    registry.reset();
    let _reset = ResetOnDrop(registry);
    body(registry)
}
