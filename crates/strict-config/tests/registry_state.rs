// crates/strict-config/tests/registry_state.rs
// ============================================================================
// Module: Registry State Tests
// Description: Initialization state machine, hooks, and deferred loading.
// Purpose: Ensure initialization happens exactly once per reset.
// Dependencies: strict-config
// ============================================================================

//! ## Overview
//! Exercises the uninitialized, deferred-pending, and initialized states, the
//! `after_initialize` and gating hooks, reset, and concurrent first access.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::thread;

use strict_config::InitializationState;
use strict_config::MapSource;
use strict_config::Registry;
use strict_config::RegistryError;

use crate::common::CountingHooks;
use crate::common::CountingSource;
use crate::common::FailingSource;
use crate::common::TestResult;
use crate::common::registry_with_hooks;
use crate::common::sample_registry;

// ============================================================================
// SECTION: Reads
// ============================================================================

/// Tests that an uninitialized registry serves schema defaults.
#[test]
fn uninitialized_registry_serves_defaults() -> TestResult {
    let registry = sample_registry()?;
    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("en"));
    assert_eq!(registry.get("api_key").unwrap(), None);
    assert_eq!(registry.state().unwrap(), InitializationState::Uninitialized);
    Ok(())
}

/// Tests that undeclared keys fail on every operation.
#[test]
fn undeclared_keys_fail_everywhere() -> TestResult {
    let registry = sample_registry()?;
    let unknown = RegistryError::unknown("colour");
    assert_eq!(registry.get("colour"), Err(unknown.clone()));
    assert_eq!(registry.is_true("colour"), Err(unknown.clone()));
    assert_eq!(registry.is_false("colour"), Err(unknown.clone()));
    assert_eq!(registry.store("colour", "red"), Err(unknown.clone()));
    assert_eq!(registry.with_config([("colour", "red")], || ()), Err(unknown));
    assert_eq!(registry.get("lang ").unwrap_err().to_string(), "unknown config variable: lang ");
    Ok(())
}

/// Tests that snapshot resolves every declared key.
#[test]
fn snapshot_lists_every_key() -> TestResult {
    let registry = sample_registry()?;
    registry.store("lang", "pt").unwrap();
    let snapshot = registry.snapshot().unwrap();
    assert_eq!(snapshot.len(), 5);
    assert_eq!(snapshot["lang"].as_deref(), Some("pt"));
    assert_eq!(snapshot["timeout"].as_deref(), Some("30"));
    assert_eq!(snapshot["api_key"], None);
    Ok(())
}

// ============================================================================
// SECTION: Direct Initialization
// ============================================================================

/// Tests that direct population fires the hook once and blocks re-population.
#[test]
fn direct_population_fires_hook_once() -> TestResult {
    let hooks = CountingHooks::new();
    let registry = registry_with_hooks(hooks.clone())?;
    registry.populate_from_map([("lang", "pt")]).unwrap();
    assert_eq!(hooks.initialized_count(), 1);
    assert_eq!(registry.populate_from_map([("lang", "de")]), Err(RegistryError::AlreadyInitialized));
    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("pt"));
    assert_eq!(hooks.initialized_count(), 1);
    Ok(())
}

/// Tests that a failed population leaves the registry untouched.
#[test]
fn failed_population_is_atomic() -> TestResult {
    let hooks = CountingHooks::new();
    let registry = registry_with_hooks(hooks.clone())?;
    let result =
        registry.populate(&MapSource::new([("lang", strict_config::RawValue::Sequence)]));
    assert!(matches!(result, Err(RegistryError::UnsupportedType { .. })));
    assert_eq!(registry.state().unwrap(), InitializationState::Uninitialized);
    assert_eq!(hooks.initialized_count(), 0);
    registry.populate(&FailingSource).unwrap_err();
    assert_eq!(registry.state().unwrap(), InitializationState::Uninitialized);
    Ok(())
}

// ============================================================================
// SECTION: Deferred Initialization
// ============================================================================

/// Tests that the deferred routine runs once, on first access.
#[test]
fn deferred_routine_runs_once_on_first_access() -> TestResult {
    let hooks = CountingHooks::new();
    let registry = registry_with_hooks(hooks.clone())?;
    let source = CountingSource::new([("lang", "pt")]);
    registry.initialize_deferred(source.clone()).unwrap();
    assert_eq!(registry.state().unwrap(), InitializationState::DeferredPending);
    assert_eq!(source.load_count(), 0);

    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("pt"));
    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("pt"));
    assert!(registry.is_false("debug").unwrap());

    assert_eq!(source.load_count(), 1);
    assert_eq!(hooks.initialized_count(), 1);
    assert_eq!(registry.state().unwrap(), InitializationState::Initialized);
    Ok(())
}

/// Tests that scheduling after initialization fails.
#[test]
fn deferred_after_initialization_fails() -> TestResult {
    let registry = sample_registry()?;
    registry.populate_from_map([("lang", "pt")]).unwrap();
    let result = registry.initialize_deferred(MapSource::new([("lang", "de")]));
    assert_eq!(result, Err(RegistryError::AlreadyInitialized));
    Ok(())
}

/// Tests that scheduling twice keeps only the latest routine.
#[test]
fn rescheduling_retargets_the_routine() -> TestResult {
    let registry = sample_registry()?;
    let first = CountingSource::new([("lang", "pt")]);
    let second = CountingSource::new([("lang", "de")]);
    registry.initialize_deferred(first.clone()).unwrap();
    registry.initialize_deferred(second.clone()).unwrap();
    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("de"));
    assert_eq!(first.load_count(), 0);
    assert_eq!(second.load_count(), 1);
    Ok(())
}

/// Tests that direct population discards a pending routine.
#[test]
fn direct_population_discards_pending_routine() -> TestResult {
    let hooks = CountingHooks::new();
    let registry = registry_with_hooks(hooks.clone())?;
    let deferred = CountingSource::new([("lang", "de")]);
    registry.initialize_deferred(deferred.clone()).unwrap();
    registry.populate_from_map([("lang", "pt")]).unwrap();
    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("pt"));
    assert_eq!(deferred.load_count(), 0);
    assert_eq!(hooks.initialized_count(), 1);
    Ok(())
}

/// Tests that the gating hook keeps the routine pending.
#[test]
fn gating_hook_defers_the_routine() -> TestResult {
    let hooks = CountingHooks::new();
    hooks.set_allow_deferred(false);
    let registry = registry_with_hooks(hooks.clone())?;
    let source = CountingSource::new([("lang", "pt")]);
    registry.initialize_deferred(source.clone()).unwrap();

    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("en"));
    assert_eq!(source.load_count(), 0);
    assert_eq!(registry.state().unwrap(), InitializationState::DeferredPending);

    hooks.set_allow_deferred(true);
    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("pt"));
    assert_eq!(source.load_count(), 1);
    assert_eq!(hooks.initialized_count(), 1);
    Ok(())
}

/// Tests that a failing routine surfaces its error and stays pending.
#[test]
fn failing_routine_stays_pending() -> TestResult {
    let hooks = CountingHooks::new();
    let registry = registry_with_hooks(hooks.clone())?;
    registry.initialize_deferred(FailingSource).unwrap();
    assert!(matches!(registry.get("lang"), Err(RegistryError::InvalidSource(_))));
    assert_eq!(registry.state().unwrap(), InitializationState::DeferredPending);
    assert_eq!(hooks.initialized_count(), 0);
    Ok(())
}

/// Tests that store runs the pending routine before writing.
#[test]
fn store_resolves_pending_routine_first() -> TestResult {
    let registry = sample_registry()?;
    let source = CountingSource::new([("lang", "de"), ("timeout", "10")]);
    registry.initialize_deferred(source.clone()).unwrap();
    registry.store("lang", "pt").unwrap();
    assert_eq!(source.load_count(), 1);
    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("pt"));
    assert_eq!(registry.get("timeout").unwrap().as_deref(), Some("10"));
    Ok(())
}

// ============================================================================
// SECTION: Gated Writes
// ============================================================================

/// Builds a registry whose deferred routine is held back by a closed gate.
fn gated_registry() -> Result<(Registry, CountingHooks), String> {
    let hooks = CountingHooks::new();
    hooks.set_allow_deferred(false);
    let registry = registry_with_hooks(hooks.clone())?;
    registry
        .initialize_deferred(MapSource::new([("lang", "pt"), ("timeout", "99")]))
        .map_err(|err| err.to_string())?;
    Ok((registry, hooks))
}

/// Tests that a store made while the gate is closed survives the later load.
#[test]
fn gated_store_is_not_clobbered_by_the_load() -> TestResult {
    let (registry, hooks) = gated_registry()?;
    registry.store("lang", "explicit").unwrap();
    assert_eq!(registry.state().unwrap(), InitializationState::DeferredPending);

    hooks.set_allow_deferred(true);
    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("explicit"));
    assert_eq!(registry.get("timeout").unwrap().as_deref(), Some("99"));
    assert_eq!(registry.state().unwrap(), InitializationState::Initialized);
    assert_eq!(hooks.initialized_count(), 1);
    Ok(())
}

/// Tests that a load inside a scope keeps the override and applies after it.
#[test]
fn gate_opening_inside_scope_keeps_the_override() -> TestResult {
    let (registry, hooks) = gated_registry()?;
    let inside = registry
        .with_config([("lang", "override")], || {
            hooks.set_allow_deferred(true);
            (registry.get("timeout").unwrap(), registry.get("lang").unwrap())
        })
        .unwrap();
    assert_eq!(inside, (Some("99".to_string()), Some("override".to_string())));
    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("pt"));
    assert_eq!(registry.state().unwrap(), InitializationState::Initialized);
    Ok(())
}

/// Tests that a stub set while gated restores to the loaded value.
#[test]
fn gated_stub_restores_to_loaded_value() -> TestResult {
    let (registry, hooks) = gated_registry()?;
    {
        let mut stub = registry.stub();
        stub.set("lang", "stubbed").unwrap();
        hooks.set_allow_deferred(true);
        assert_eq!(registry.get("lang").unwrap().as_deref(), Some("stubbed"));
        assert_eq!(registry.get("timeout").unwrap().as_deref(), Some("99"));
    }
    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("pt"));
    Ok(())
}

/// Tests that an override over an earlier gated store restores the store.
#[test]
fn override_over_gated_store_restores_the_store() -> TestResult {
    let (registry, hooks) = gated_registry()?;
    registry.store("lang", "explicit").unwrap();
    registry
        .with_config([("lang", "override")], || {
            hooks.set_allow_deferred(true);
            assert_eq!(registry.get("lang").unwrap().as_deref(), Some("override"));
        })
        .unwrap();
    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("explicit"));
    Ok(())
}

/// Tests that a store undone by its scope does not shadow the later load.
#[test]
fn scoped_gated_store_does_not_block_the_load() -> TestResult {
    let (registry, hooks) = gated_registry()?;
    let stored = registry.with_config([("lang", "override")], || registry.store("lang", "inner"));
    stored.unwrap().unwrap();
    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("en"));

    hooks.set_allow_deferred(true);
    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("pt"));
    Ok(())
}

/// Tests that direct population inside a scope keeps the override.
#[test]
fn population_inside_scope_keeps_the_override() -> TestResult {
    let registry = sample_registry()?;
    registry
        .with_config([("lang", "override")], || {
            registry.populate_from_map([("lang", "pt"), ("timeout", "5")]).unwrap();
            assert_eq!(registry.get("lang").unwrap().as_deref(), Some("override"));
            assert_eq!(registry.get("timeout").unwrap().as_deref(), Some("5"));
        })
        .unwrap();
    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("pt"));
    Ok(())
}

/// Tests that concurrent first reads run the routine exactly once.
#[test]
fn concurrent_first_access_loads_once() -> TestResult {
    let hooks = CountingHooks::new();
    let registry = registry_with_hooks(hooks.clone())?;
    let source = CountingSource::new([("lang", "pt")]);
    registry.initialize_deferred(source.clone()).unwrap();

    thread::scope(|scope| {
        let handles: Vec<_> =
            (0 .. 8).map(|_| scope.spawn(|| registry.get("lang").unwrap())).collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().as_deref(), Some("pt"));
        }
    });

    assert_eq!(source.load_count(), 1);
    assert_eq!(hooks.initialized_count(), 1);
    Ok(())
}

// ============================================================================
// SECTION: Reset
// ============================================================================

/// Tests that reset clears values and re-arms initialization.
#[test]
fn reset_returns_to_uninitialized() -> TestResult {
    let hooks = CountingHooks::new();
    let registry = registry_with_hooks(hooks.clone())?;
    registry.populate_from_map([("lang", "pt")]).unwrap();
    registry.reset();

    assert_eq!(registry.state().unwrap(), InitializationState::Uninitialized);
    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("en"));

    registry.populate_from_map([("lang", "de")]).unwrap();
    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("de"));
    assert_eq!(hooks.initialized_count(), 2);
    Ok(())
}

/// Tests that reset drops a pending routine.
#[test]
fn reset_drops_pending_routine() -> TestResult {
    let registry = sample_registry()?;
    let source = CountingSource::new([("lang", "pt")]);
    registry.initialize_deferred(source.clone()).unwrap();
    registry.reset();
    assert_eq!(registry.get("lang").unwrap().as_deref(), Some("en"));
    assert_eq!(source.load_count(), 0);
    Ok(())
}
