// crates/strict-config/src/registry.rs
// ============================================================================
// Module: Config Registry
// Description: Validated value store with deferred init and scoped overrides.
// Purpose: Enforce declared keys on every access to configuration values.
// Dependencies: std::sync
// ============================================================================

//! ## Overview
//! A [`Registry`] owns one [`Schema`] and the current values for its keys.
//! Every read and write validates the key against the schema and fails with
//! [`RegistryError::UnknownVariable`] for undeclared keys.
//!
//! Initialization is a small state machine: a registry starts uninitialized,
//! may schedule a deferred source that runs on first access, and becomes
//! initialized exactly once per lifetime (or per [`Registry::reset`]).
//! Scoped overrides push frames of prior values and restore them in LIFO order
//! on every exit path, including panics. A load that lands while overrides
//! are active fills in the values the scopes will restore, and a write made
//! while a gated deferred routine is pending is never replaced by its load.
//!
//! One mutex guards all mutable state. Deferred initialization runs under it,
//! so concurrent first reads trigger the source exactly once. Interleaving
//! scoped overrides from several threads is not supported: restores assume a
//! single mutator.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use crate::audit::NoopAuditSink;
use crate::audit::RegistryAction;
use crate::audit::RegistryAuditEvent;
use crate::audit::RegistryAuditSink;
use crate::coerce::RawValue;
use crate::coerce::coerce_for;
use crate::coerce::is_falsy;
use crate::coerce::is_truthy;
use crate::env::EnvSource;
use crate::error::RegistryError;
use crate::file::FileSource;
use crate::harness::ConfigStub;
use crate::schema::Schema;
use crate::source::ConfigSource;
use crate::source::MapSource;

// ============================================================================
// SECTION: Hooks
// ============================================================================

/// Optional callbacks supplied at registry construction.
pub trait RegistryHooks: Send + Sync {
    /// Runs once after each first transition into the initialized state.
    fn after_initialize(&self) {}

    /// Decides whether a pending deferred routine runs on this access.
    ///
    /// Called before every access while deferred initialization is pending.
    /// Returning `false` leaves the routine pending and serves current values.
    fn should_run_deferred_initialization(&self) -> bool {
        true
    }
}

/// Hooks that keep the default behavior.
pub struct DefaultHooks;

impl RegistryHooks for DefaultHooks {}

// ============================================================================
// SECTION: State Types
// ============================================================================

/// Public view of the initialization state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializationState {
    /// No initializer has run or been scheduled.
    Uninitialized,
    /// A deferred routine waits for the first access.
    DeferredPending,
    /// Values have been populated from a source.
    Initialized,
}

/// Shared handle to a deferred source.
type SharedSource = Arc<dyn ConfigSource + Send + Sync>;

/// Internal initialization state, holding the deferred routine.
enum InitState {
    /// Nothing scheduled.
    Uninitialized,
    /// Routine to run on first access.
    DeferredPending(SharedSource),
    /// Populated.
    Initialized,
}

/// Store entry captured when a scoped override is applied.
struct CapturedEntry {
    /// Overridden key.
    key: String,
    /// Prior entry: `None` for no store entry, `Some(None)` for an explicit
    /// absent value.
    entry: Option<Option<String>>,
    /// False when the entry holds a write made while a deferred routine was
    /// pending; a later load must not replace it.
    loadable: bool,
}

/// Prior store entries captured when a scoped override is applied.
struct OverrideFrame {
    /// Frame id, increasing with every push.
    id: u64,
    /// Keys with their exact prior entries, in application order.
    previous: Vec<CapturedEntry>,
}

/// Mutable registry state guarded by one lock.
struct RegistryState {
    /// Current values; `None` entries shadow schema defaults with absent.
    values: BTreeMap<String, Option<String>>,
    /// Initialization state machine.
    init: InitState,
    /// Active scoped override frames.
    overrides: Vec<OverrideFrame>,
    /// Keys stored while a deferred routine was pending.
    pending_writes: BTreeSet<String>,
    /// True until `after_initialize` fires.
    hook_armed: bool,
    /// Id for the next override frame; survives reset so stale guards never
    /// match a new frame.
    next_frame: u64,
}

impl RegistryState {
    /// Returns a fresh, uninitialized state.
    const fn new() -> Self {
        Self {
            values: BTreeMap::new(),
            init: InitState::Uninitialized,
            overrides: Vec::new(),
            pending_writes: BTreeSet::new(),
            hook_armed: true,
            next_frame: 0,
        }
    }
}

/// Source output validated against the schema, ready to commit.
struct Prepared {
    /// Source label.
    source: String,
    /// Declared keys with coerced values.
    values: Vec<(String, Option<String>)>,
    /// Undeclared keys the source offered.
    ignored: Vec<String>,
}

// ============================================================================
// SECTION: Builder
// ============================================================================

/// Builder for [`Registry`].
pub struct RegistryBuilder {
    /// Label used in audit events.
    name: String,
    /// Declared schema.
    schema: Option<Schema>,
    /// Lifecycle hooks.
    hooks: Box<dyn RegistryHooks>,
    /// Audit sink.
    audit: Box<dyn RegistryAuditSink>,
}

impl RegistryBuilder {
    /// Starts a builder for a registry labelled `name`.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            hooks: Box::new(DefaultHooks),
            audit: Box::new(NoopAuditSink),
        }
    }

    /// Declares the registry schema.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateSchema`] when a schema was already
    /// declared on this builder.
    pub fn declare_schema(mut self, schema: Schema) -> Result<Self, RegistryError> {
        if self.schema.is_some() {
            return Err(RegistryError::DuplicateSchema);
        }
        self.schema = Some(schema);
        Ok(self)
    }

    /// Installs lifecycle hooks.
    #[must_use]
    pub fn hooks(mut self, hooks: impl RegistryHooks + 'static) -> Self {
        self.hooks = Box::new(hooks);
        self
    }

    /// Installs an audit sink.
    #[must_use]
    pub fn audit_sink(mut self, sink: impl RegistryAuditSink + 'static) -> Self {
        self.audit = Box::new(sink);
        self
    }

    /// Builds the registry.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::MissingSchema`] when no schema was declared.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let schema = self.schema.ok_or(RegistryError::MissingSchema)?;
        Ok(Registry {
            name: self.name,
            schema: Arc::new(schema),
            state: Mutex::new(RegistryState::new()),
            hooks: self.hooks,
            audit: self.audit,
        })
    }
}

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Strict configuration registry.
///
/// # Invariants
/// - Every key in the value store or override stack is declared in the schema.
/// - Stored values are canonical strings or absent.
/// - Override frames restore exact prior entries, LIFO, on every exit path.
pub struct Registry {
    /// Label used in audit events.
    name: String,
    /// Declared keys and defaults.
    schema: Arc<Schema>,
    /// Values, overrides, and initialization state.
    state: Mutex<RegistryState>,
    /// Lifecycle hooks.
    hooks: Box<dyn RegistryHooks>,
    /// Audit sink.
    audit: Box<dyn RegistryAuditSink>,
}

impl Registry {
    /// Starts a builder for a registry labelled `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> RegistryBuilder {
        RegistryBuilder::new(name)
    }

    /// Returns the registry label.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared schema.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the current initialization state.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::LockPoisoned`] when the state lock is poisoned.
    pub fn state(&self) -> Result<InitializationState, RegistryError> {
        Ok(match self.lock()?.init {
            InitState::Uninitialized => InitializationState::Uninitialized,
            InitState::DeferredPending(_) => InitializationState::DeferredPending,
            InitState::Initialized => InitializationState::Initialized,
        })
    }

    /// Returns the number of active override frames.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::LockPoisoned`] when the state lock is poisoned.
    pub fn override_depth(&self) -> Result<usize, RegistryError> {
        Ok(self.lock()?.overrides.len())
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Returns the value for `key`: stored value, else schema default, else
    /// absent. Runs a pending deferred routine first.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownVariable`] for undeclared keys, or the
    /// deferred routine's error when it fails.
    pub fn get(&self, key: &str) -> Result<Option<String>, RegistryError> {
        self.ensure_declared(key)?;
        self.resolve_deferred()?;
        let state = self.lock()?;
        Ok(self.resolve(&state, key))
    }

    /// Returns true when the value for `key` is truthy.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::get`].
    pub fn is_true(&self, key: &str) -> Result<bool, RegistryError> {
        Ok(self.get(key)?.as_deref().is_some_and(is_truthy))
    }

    /// Returns true when the value for `key` is absent or not truthy.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::get`].
    pub fn is_false(&self, key: &str) -> Result<bool, RegistryError> {
        Ok(is_falsy(self.get(key)?.as_deref()))
    }

    /// Returns every declared key with its resolved value, sorted by key.
    ///
    /// # Errors
    ///
    /// Returns the deferred routine's error when it fails.
    pub fn snapshot(&self) -> Result<BTreeMap<String, Option<String>>, RegistryError> {
        self.resolve_deferred()?;
        let state = self.lock()?;
        Ok(self.schema.keys().map(|key| (key.to_string(), self.resolve(&state, key))).collect())
    }

    /// Loads `source` and returns the keys it offers that are not declared.
    ///
    /// Registry state is left untouched.
    ///
    /// # Errors
    ///
    /// Returns the source's load error.
    pub fn unknown_keys(&self, source: &dyn ConfigSource) -> Result<Vec<String>, RegistryError> {
        let values = source.load_declared(&|key| self.schema.is_valid(key))?;
        Ok(values.into_keys().filter(|key| !self.schema.is_valid(key)).collect())
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Stores a coerced value for `key`.
    ///
    /// Low-level mutator intended for setup and tests; application code should
    /// treat configuration as read-only. A pending deferred routine runs first
    /// so it cannot overwrite the stored value later. When the gating hook
    /// keeps it pending, the key is remembered and the eventual load skips it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownVariable`] for undeclared keys and
    /// [`RegistryError::UnsupportedType`] for composite values.
    pub fn store(&self, key: &str, value: impl Into<RawValue>) -> Result<(), RegistryError> {
        self.ensure_declared(key)?;
        let value = coerce_for(key, value.into())?;
        self.resolve_deferred()?;
        let mut state = self.lock()?;
        if matches!(state.init, InitState::DeferredPending(_)) {
            state.pending_writes.insert(key.to_string());
        }
        state.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Runs `body` with `overrides` applied, restoring prior values afterwards.
    ///
    /// All overrides are validated before any is applied. Prior values are
    /// restored exactly when `body` returns or panics; a panic resumes after
    /// restoration. Nested calls restore in reverse order.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownVariable`] or
    /// [`RegistryError::UnsupportedType`] before running `body` when an
    /// override is invalid.
    pub fn with_config<I, K, V, F, T>(&self, overrides: I, body: F) -> Result<T, RegistryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<RawValue>,
        F: FnOnce() -> T,
    {
        let guard = self.push_overrides(overrides)?;
        let output = body();
        drop(guard);
        Ok(output)
    }

    /// Returns a stub handle for incremental scoped overrides in tests.
    #[must_use]
    pub fn stub(&self) -> ConfigStub<'_> {
        ConfigStub::new(self)
    }

    // ------------------------------------------------------------------------
    // Initialization
    // ------------------------------------------------------------------------

    /// Populates values from `source` and marks the registry initialized.
    ///
    /// Undeclared keys offered by the source are ignored. Every declared value
    /// is coerced before any is written. A pending deferred routine is
    /// discarded.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyInitialized`] once initialized, the
    /// source's load error, or [`RegistryError::UnsupportedType`].
    pub fn populate(&self, source: &dyn ConfigSource) -> Result<(), RegistryError> {
        let mut state = self.lock()?;
        if matches!(state.init, InitState::Initialized) {
            return Err(RegistryError::AlreadyInitialized);
        }
        let prepared = self.prepare(source)?;
        let fire_hook = commit(&mut state, &prepared);
        drop(state);
        self.finish_initialization(&prepared, fire_hook, false);
        Ok(())
    }

    /// Populates values from `<PREFIX>_<KEY>` environment variables.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::populate`].
    pub fn populate_from_env(&self, prefix: &str) -> Result<(), RegistryError> {
        self.populate(&EnvSource::new(prefix))
    }

    /// Populates values from a flat YAML file.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::populate`], plus [`RegistryError::FileNotFound`] and
    /// [`RegistryError::Parse`].
    pub fn populate_from_file(&self, path: impl Into<PathBuf>) -> Result<(), RegistryError> {
        self.populate(&FileSource::new(path))
    }

    /// Populates values from an in-memory map.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::populate`].
    pub fn populate_from_map<K, V>(
        &self,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<(), RegistryError>
    where
        K: Into<String>,
        V: Into<RawValue>,
    {
        self.populate(&MapSource::new(values))
    }

    /// Schedules `source` to populate the registry on first access.
    ///
    /// Scheduling again while still pending replaces the earlier routine.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyInitialized`] once initialized.
    pub fn initialize_deferred(
        &self,
        source: impl ConfigSource + Send + Sync + 'static,
    ) -> Result<(), RegistryError> {
        let mut state = self.lock()?;
        let action = match state.init {
            InitState::Initialized => return Err(RegistryError::AlreadyInitialized),
            InitState::DeferredPending(_) => RegistryAction::DeferredRetargeted,
            InitState::Uninitialized => RegistryAction::DeferredScheduled,
        };
        let source_name = source.name().to_string();
        state.init = InitState::DeferredPending(Arc::new(source));
        drop(state);
        self.record(self.event(action).with_source(&source_name));
        Ok(())
    }

    /// Clears values, overrides, and initialization state.
    ///
    /// Re-arms `after_initialize`. Override guards created before the reset
    /// no longer restore anything. A poisoned lock is recovered.
    pub fn reset(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let next_frame = state.next_frame;
        *state = RegistryState::new();
        state.next_frame = next_frame;
        drop(state);
        self.state.clear_poison();
        self.record(self.event(RegistryAction::Reset));
    }

    // ------------------------------------------------------------------------
    // Overrides
    // ------------------------------------------------------------------------

    /// Validates and applies one override frame.
    pub(crate) fn push_overrides<I, K, V>(
        &self,
        overrides: I,
    ) -> Result<OverrideGuard<'_>, RegistryError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<RawValue>,
    {
        let mut pending = Vec::new();
        for (key, value) in overrides {
            let key = key.as_ref();
            self.ensure_declared(key)?;
            pending.push((key.to_string(), coerce_for(key, value.into())?));
        }
        self.resolve_deferred()?;
        let mut state = self.lock()?;
        let previous = pending
            .iter()
            .map(|(key, _)| CapturedEntry {
                key: key.clone(),
                entry: state.values.get(key).cloned(),
                loadable: !state.pending_writes.contains(key),
            })
            .collect();
        let id = state.next_frame;
        state.next_frame = id.wrapping_add(1);
        state.overrides.push(OverrideFrame {
            id,
            previous,
        });
        let keys: Vec<String> = pending.iter().map(|(key, _)| key.clone()).collect();
        state.values.extend(pending);
        drop(state);
        self.record(self.event(RegistryAction::OverrideApplied).with_keys(keys));
        Ok(OverrideGuard {
            registry: self,
            frame: id,
        })
    }

    /// Pops frame `frame` and every frame pushed after it, restoring prior
    /// entries. Does nothing when the frame is already gone.
    fn pop_overrides(&self, frame: u64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.overrides.iter().any(|active| active.id == frame) {
            return;
        }
        let mut restored = Vec::new();
        while state.overrides.last().is_some_and(|top| top.id >= frame) {
            let Some(popped) = state.overrides.pop() else {
                break;
            };
            for captured in popped.previous.into_iter().rev() {
                if captured.loadable {
                    state.pending_writes.remove(&captured.key);
                }
                match captured.entry {
                    Some(value) => {
                        state.values.insert(captured.key.clone(), value);
                    }
                    None => {
                        state.values.remove(&captured.key);
                    }
                }
                restored.push(captured.key);
            }
        }
        drop(state);
        if !restored.is_empty() {
            restored.sort();
            restored.dedup();
            self.record(self.event(RegistryAction::OverrideRestored).with_keys(restored));
        }
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Locks registry state.
    fn lock(&self) -> Result<MutexGuard<'_, RegistryState>, RegistryError> {
        self.state.lock().map_err(|_| RegistryError::LockPoisoned)
    }

    /// Fails with `UnknownVariable` for undeclared keys.
    fn ensure_declared(&self, key: &str) -> Result<(), RegistryError> {
        if self.schema.is_valid(key) {
            return Ok(());
        }
        self.record(self.event(RegistryAction::UnknownKey).with_keys([key]));
        Err(RegistryError::unknown(key))
    }

    /// Resolves a declared key against the store and schema defaults.
    fn resolve(&self, state: &RegistryState, key: &str) -> Option<String> {
        match state.values.get(key) {
            Some(value) => value.clone(),
            None => self.schema.default_of(key).map(str::to_string),
        }
    }

    /// Runs a pending deferred routine when the gating hook allows it.
    ///
    /// On failure the routine stays pending and the error is returned.
    fn resolve_deferred(&self) -> Result<(), RegistryError> {
        if !matches!(self.lock()?.init, InitState::DeferredPending(_)) {
            return Ok(());
        }
        if !self.hooks.should_run_deferred_initialization() {
            self.record(self.event(RegistryAction::DeferredSkipped));
            return Ok(());
        }
        let mut state = self.lock()?;
        let InitState::DeferredPending(source) = &state.init else {
            return Ok(());
        };
        let source = Arc::clone(source);
        let prepared = self.prepare(&*source)?;
        let fire_hook = commit(&mut state, &prepared);
        drop(state);
        self.finish_initialization(&prepared, fire_hook, true);
        Ok(())
    }

    /// Loads `source`, drops undeclared keys, and coerces declared values.
    fn prepare(&self, source: &dyn ConfigSource) -> Result<Prepared, RegistryError> {
        let mut values = Vec::new();
        let mut ignored = Vec::new();
        for (key, raw) in source.load_declared(&|key| self.schema.is_valid(key))? {
            if self.schema.is_valid(&key) {
                let value = coerce_for(&key, raw)?;
                values.push((key, value));
            } else {
                ignored.push(key);
            }
        }
        Ok(Prepared {
            source: source.name().to_string(),
            values,
            ignored,
        })
    }

    /// Emits initialization events and fires `after_initialize` when armed.
    fn finish_initialization(&self, prepared: &Prepared, fire_hook: bool, deferred: bool) {
        if !prepared.ignored.is_empty() {
            self.record(
                self.event(RegistryAction::IgnoredKeys)
                    .with_source(&prepared.source)
                    .with_keys(prepared.ignored.iter().map(String::as_str)),
            );
        }
        if deferred {
            self.record(self.event(RegistryAction::DeferredRun).with_source(&prepared.source));
        }
        self.record(self.event(RegistryAction::Initialized).with_source(&prepared.source));
        if fire_hook {
            self.hooks.after_initialize();
        }
    }

    /// Builds an audit event for this registry.
    fn event(&self, action: RegistryAction) -> RegistryAuditEvent {
        RegistryAuditEvent::new(&self.name, action)
    }

    /// Sends an event to the audit sink.
    fn record(&self, event: RegistryAuditEvent) {
        self.audit.record(&event);
    }
}

/// Writes prepared values and marks the state initialized.
///
/// An overridden key keeps its live value: the load lands in the entry captured
/// by the bottom-most frame holding it, unless that entry is a pending write.
/// Keys stored while the routine was pending are skipped. Returns true when
/// `after_initialize` should fire.
fn commit(state: &mut RegistryState, prepared: &Prepared) -> bool {
    for (key, value) in &prepared.values {
        let captured = state
            .overrides
            .iter_mut()
            .flat_map(|frame| frame.previous.iter_mut())
            .find(|captured| captured.key == *key);
        if let Some(captured) = captured {
            if captured.loadable {
                captured.entry = Some(value.clone());
            }
        } else if !state.pending_writes.contains(key) {
            state.values.insert(key.clone(), value.clone());
        }
    }
    state.pending_writes.clear();
    state.init = InitState::Initialized;
    std::mem::replace(&mut state.hook_armed, false)
}

// ============================================================================
// SECTION: Override Guard
// ============================================================================

/// Restores one override frame (and any frames above it) when dropped.
pub(crate) struct OverrideGuard<'a> {
    /// Registry owning the frame.
    registry: &'a Registry,
    /// Id of the frame this guard pushed.
    frame: u64,
}

impl Drop for OverrideGuard<'_> {
    fn drop(&mut self) {
        self.registry.pop_overrides(self.frame);
    }
}
