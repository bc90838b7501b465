//! Registry and Lifecycle Tests
//!
//! Validates readiness, locking, default resolution and error surfaces of
//! modules managed by a `ModuleRegistry`.

mod common;

use common::{calls, counter, Constant, Offset, Square, Sum};
use memora_core::{Contract, ContractId, Error, FieldMetadata, InputMap, ResultMap};
use memora_engine::{LambdaModule, ModuleRegistry, ModuleSchema, Submodules};
use std::sync::Arc;

/// Anything producing a `value` an Offset can build on
struct Base;

impl Contract for Base {
    const RESULTS: &'static [&'static str] = &["value"];
}

/// Anything producing a `value` a Base can build on
struct Seed;

impl Contract for Seed {
    const RESULTS: &'static [&'static str] = &["value"];
}

/// Register `key`: satisfies `P`, yields its `inner` (contract `S`) value plus one
fn register_step<P: Contract, S: Contract>(registry: &mut ModuleRegistry, key: &str) {
    registry
        .register(
            key,
            LambdaModule::new(
                key,
                ModuleSchema::new()
                    .result("value", FieldMetadata::typed_result::<i64>())
                    .submodule::<S>("inner")
                    .satisfies::<P>(),
                |_: &InputMap, submods: &Submodules<'_>| {
                    let inner = submods.run("inner", InputMap::new())?;
                    let value = inner["value"].value::<i64>()? + 1;
                    Ok(ResultMap::from([(
                        "value".to_string(),
                        FieldMetadata::result_of(value),
                    )]))
                },
            ),
        )
        .unwrap();
}

/// Register `key`: satisfies `Seed`, yields 100
fn register_seed(registry: &mut ModuleRegistry, key: &str) {
    registry
        .register(
            key,
            LambdaModule::new(
                "seed",
                ModuleSchema::new()
                    .result("value", FieldMetadata::typed_result::<i64>())
                    .satisfies::<Seed>(),
                |_: &InputMap, _: &Submodules<'_>| {
                    Ok(ResultMap::from([(
                        "value".to_string(),
                        FieldMetadata::result_of(100i64),
                    )]))
                },
            ),
        )
        .unwrap();
}

fn sum_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    registry.register("sum", Sum { calls: counter() }).unwrap();
    registry
        .register(
            "ten",
            Constant {
                value: 10,
                needs_seed: false,
                calls: counter(),
            },
        )
        .unwrap();
    registry
}

fn sum_ready(registry: &ModuleRegistry) -> bool {
    registry
        .at("sum")
        .unwrap()
        .ready(registry.arena(), &InputMap::new())
}

#[derive(Clone, Copy, Debug)]
enum Step {
    A,
    B,
    Slot,
}

fn apply(registry: &mut ModuleRegistry, step: Step) {
    match step {
        Step::A => registry.change_input("sum", "a", 1i64).unwrap(),
        Step::B => registry.change_input("sum", "b", 2i64).unwrap(),
        Step::Slot => registry.change_submod("sum", "offset", "ten").unwrap(),
    }
}

// ============================================================================
// Readiness
// ============================================================================

/// Test: a module becomes ready exactly when its last requirement is bound
#[test]
fn test_ready_is_order_independent() {
    use Step::*;
    let orders = [
        [A, B, Slot],
        [A, Slot, B],
        [B, A, Slot],
        [B, Slot, A],
        [Slot, A, B],
        [Slot, B, A],
    ];

    for order in orders {
        let mut registry = sum_registry();
        for (i, step) in order.iter().enumerate() {
            assert!(!sum_ready(&registry), "ready too early in {:?}", order);
            apply(&mut registry, *step);
            assert_eq!(sum_ready(&registry), i == order.len() - 1, "order {:?}", order);
        }
    }
}

/// Test: not_set names every missing piece
#[test]
fn test_not_set_report_names_missing_state() {
    let registry = sum_registry();
    let report = registry
        .at("sum")
        .unwrap()
        .not_set(registry.arena(), &InputMap::new());

    assert!(!report.algorithm);
    assert!(report.inputs.contains("a"));
    assert!(report.inputs.contains("b"));
    assert!(report.submodules.contains("offset"));
}

/// Test: running an unready module reports what is missing and stays unlocked
#[test]
fn test_run_unready_module_fails() {
    let mut registry = sum_registry();
    registry.change_input("sum", "a", 1i64).unwrap();

    let err = registry.run("sum", InputMap::new()).unwrap_err();
    let report = err.not_set_report().expect("NotReadyError");
    assert!(report.inputs.contains("b"));
    assert!(report.submodules.contains("offset"));
    assert!(!registry.at("sum").unwrap().is_locked());
}

/// Test: a submodule whose own inputs are missing leaves its slot unready
#[test]
fn test_slot_not_ready_when_submodule_not_ready() {
    let mut registry = sum_registry();
    registry
        .register(
            "seeded",
            Constant {
                value: 3,
                needs_seed: true,
                calls: counter(),
            },
        )
        .unwrap();
    registry.change_input("sum", "a", 1i64).unwrap();
    registry.change_input("sum", "b", 2i64).unwrap();
    registry.change_submod("sum", "offset", "seeded").unwrap();
    assert!(!sum_ready(&registry));

    registry.change_input("seeded", "seed", 0i64).unwrap();
    assert!(sum_ready(&registry));
}

// ============================================================================
// Locking
// ============================================================================

/// Test: a locked module rejects input changes and keeps its value
#[test]
fn test_locked_module_rejects_input_change() {
    let mut registry = sum_registry();
    apply(&mut registry, Step::A);
    apply(&mut registry, Step::B);
    apply(&mut registry, Step::Slot);
    registry.at("sum").unwrap().lock(registry.arena()).unwrap();

    let err = registry.change_input("sum", "a", 100i64).unwrap_err();
    assert!(matches!(err, Error::LockedModuleError(_)));
    assert_eq!(
        registry.at("sum").unwrap().inputs()["a"].value::<i64>(),
        Ok(&1)
    );
}

/// Test: locking cascades and locked slots cannot be rebound
#[test]
fn test_lock_cascades_to_submodules() {
    let mut registry = sum_registry();
    apply(&mut registry, Step::A);
    apply(&mut registry, Step::B);
    apply(&mut registry, Step::Slot);
    registry
        .register(
            "five",
            Constant {
                value: 5,
                needs_seed: false,
                calls: counter(),
            },
        )
        .unwrap();

    let total = registry.run("sum", InputMap::new()).unwrap();
    assert_eq!(total["total"].value::<i64>(), Ok(&13));
    assert!(registry.at("ten").unwrap().is_locked());

    let err = registry.change_submod("sum", "offset", "five").unwrap_err();
    assert!(matches!(err, Error::LockedModuleError(_)));
    let ten = registry.module_id("ten").unwrap();
    assert_eq!(
        registry.at("sum").unwrap().submods()["offset"].module_id(),
        Some(ten)
    );
}

/// Test: locking fails while a slot is unready
#[test]
fn test_lock_requires_ready_slots() {
    let registry = sum_registry();
    let err = registry.at("sum").unwrap().lock(registry.arena()).unwrap_err();
    assert!(err.not_set_report().unwrap().submodules.contains("offset"));
    assert!(!registry.at("sum").unwrap().is_locked());
}

// ============================================================================
// Default Resolution
// ============================================================================

/// Test: resolve binds a ready default
#[test]
fn test_resolve_binds_ready_default() {
    let mut registry = sum_registry();
    registry.set_default::<Offset>("ten").unwrap();
    assert_eq!(
        registry.default_for(&ContractId::of::<Offset>()),
        Some("ten")
    );

    let ten = registry.module_id("ten").unwrap();
    let sum = registry.resolve("sum").unwrap();
    assert_eq!(sum.submods()["offset"].module_id(), Some(ten));
}

/// Test: resolve leaves the slot unbound when the default is not ready
#[test]
fn test_resolve_skips_unready_default() {
    let mut registry = sum_registry();
    registry
        .register(
            "seeded",
            Constant {
                value: 3,
                needs_seed: true,
                calls: counter(),
            },
        )
        .unwrap();
    registry.set_default::<Offset>("seeded").unwrap();

    let sum = registry.resolve("sum").unwrap();
    assert!(!sum.submods()["offset"].has_module());
}

/// Test: running resolves defaults first
#[test]
fn test_run_uses_default() {
    let count = counter();
    let mut registry = sum_registry();
    registry
        .register(
            "seven",
            Constant {
                value: 7,
                needs_seed: false,
                calls: Arc::clone(&count),
            },
        )
        .unwrap();
    registry.set_default::<Offset>("seven").unwrap();
    registry.change_input("sum", "a", 1i64).unwrap();
    registry.change_input("sum", "b", 1i64).unwrap();

    let total = registry.run("sum", InputMap::new()).unwrap();
    assert_eq!(total["total"].value::<i64>(), Ok(&9));
    assert_eq!(calls(&count), 1);
}

/// Test: a module that is its own contract's default is a cycle
#[test]
fn test_cyclic_default_detected() {
    let mut registry = ModuleRegistry::new();
    registry
        .register(
            "loop",
            memora_engine::LambdaModule::new(
                "loop",
                memora_engine::ModuleSchema::new()
                    .result(
                        "value",
                        memora_core::FieldMetadata::typed_result::<i64>(),
                    )
                    .submodule::<Offset>("inner")
                    .satisfies::<Offset>(),
                |_: &InputMap, _: &memora_engine::Submodules<'_>| {
                    Ok(memora_core::ResultMap::new())
                },
            ),
        )
        .unwrap();
    registry.set_default::<Offset>("loop").unwrap();

    match registry.resolve("loop") {
        Err(Error::CyclicDependency(path)) => {
            assert_eq!(path, vec!["loop".to_string(), "loop".to_string()]);
        }
        other => panic!("expected CyclicDependency, got {:?}", other.map(|_| ())),
    }
}

/// Test: defaults chain through several hops, each resolved before binding
#[test]
fn test_resolve_multi_hop_default_chain() {
    let mut registry = sum_registry();
    register_step::<Offset, Base>(&mut registry, "relay");
    register_step::<Base, Seed>(&mut registry, "lift");
    register_seed(&mut registry, "seed");
    registry.set_default::<Offset>("relay").unwrap();
    registry.set_default::<Base>("lift").unwrap();
    registry.set_default::<Seed>("seed").unwrap();
    registry.change_input("sum", "a", 1i64).unwrap();
    registry.change_input("sum", "b", 2i64).unwrap();

    let arena = registry.arena();
    assert!(!registry.at("relay").unwrap().ready(arena, &InputMap::new()));
    assert!(!registry.at("lift").unwrap().ready(arena, &InputMap::new()));

    let total = registry.run("sum", InputMap::new()).unwrap();
    assert_eq!(total["total"].value::<i64>(), Ok(&(1 + 2 + 102)));

    let bound = |key: &str, slot: &str| registry.at(key).unwrap().submods()[slot].module_id();
    assert_eq!(bound("sum", "offset"), Some(registry.module_id("relay").unwrap()));
    assert_eq!(bound("relay", "inner"), Some(registry.module_id("lift").unwrap()));
    assert_eq!(bound("lift", "inner"), Some(registry.module_id("seed").unwrap()));
}

/// Test: a default that already depends on the target is never bound to it
#[test]
fn test_resolve_skips_default_depending_on_target() {
    let mut registry = ModuleRegistry::new();
    register_step::<Offset, Base>(&mut registry, "relay");
    register_step::<Base, Seed>(&mut registry, "lift");
    register_step::<Seed, Offset>(&mut registry, "echo");
    registry.change_submod("echo", "inner", "relay").unwrap();
    registry.change_submod("lift", "inner", "echo").unwrap();
    registry.set_default::<Base>("lift").unwrap();

    // lift reaches relay, so it can never be ready while relay is not
    registry.resolve("relay").unwrap();
    let relay = registry.at("relay").unwrap();
    assert!(!relay.submods()["inner"].has_module());
    assert!(!relay.ready(registry.arena(), &InputMap::new()));
    assert!(matches!(
        registry.change_submod("relay", "inner", "lift"),
        Err(Error::CyclicDependency(_))
    ));

    // Following defaults back to relay is a cycle
    registry.set_default::<Offset>("relay").unwrap();
    registry.set_default::<Seed>("echo").unwrap();
    match registry.resolve("relay") {
        Err(Error::CyclicDependency(path)) => {
            assert_eq!(path, vec!["relay", "lift", "echo", "relay"]);
        }
        other => panic!("expected CyclicDependency, got {:?}", other.map(|_| ())),
    }
}

// ============================================================================
// Contracts and Keys
// ============================================================================

/// Test: binding a module that lacks the slot's contract fails
#[test]
fn test_change_submod_checks_contract() {
    let mut registry = sum_registry();
    registry
        .register("square", Square { calls: counter() })
        .unwrap();

    let err = registry
        .change_submod("sum", "offset", "square")
        .unwrap_err();
    assert!(matches!(err, Error::ModuleDoesNotSatisfyContract { .. }));
    assert!(matches!(
        registry.change_submod("sum", "missing", "ten"),
        Err(Error::KeyNotFound(_))
    ));
}

/// Test: registry bookkeeping
#[test]
fn test_registry_keys_and_lookup() {
    let mut registry = sum_registry();
    assert_eq!(registry.len(), 2);
    assert!(registry.contains("sum"));
    assert!(!registry.contains("nope"));
    assert_eq!(registry.keys().collect::<Vec<_>>(), vec!["sum", "ten"]);
    assert!(matches!(registry.at("nope"), Err(Error::KeyNotFound(_))));

    registry.duplicate("sum", "").unwrap();
    assert_eq!(registry.len(), 3);
    assert_eq!(registry.arena().len(), 3);
}

/// Test: description and citations come from the schema
#[test]
fn test_module_metadata() {
    let mut registry = ModuleRegistry::new();
    registry
        .register("square", Square { calls: counter() })
        .unwrap();
    let square = registry.at("square").unwrap();
    assert_eq!(square.description(), Some("Squares x"));
    assert!(square.citations().is_empty());
    assert_eq!(square.results().len(), 1);
    assert!(square.has_algorithm());
}

/// Test: a module cannot be bound into its own slot
#[test]
fn test_self_binding_rejected() {
    let mut registry = ModuleRegistry::new();
    registry
        .register(
            "plain",
            LambdaModule::new(
                "plain",
                ModuleSchema::new().submodule::<Offset>("inner"),
                |_: &InputMap, _: &Submodules<'_>| Ok(ResultMap::new()),
            ),
        )
        .unwrap();
    register_step::<Offset, Base>(&mut registry, "relay");

    assert!(matches!(
        registry.change_submod("plain", "inner", "plain"),
        Err(Error::CyclicDependency(_))
    ));
    assert!(matches!(
        registry.change_submod("relay", "inner", "relay"),
        Err(Error::CyclicDependency(_))
    ));
    // plain does not satisfy Offset, relay does
    registry.change_submod("plain", "inner", "relay").unwrap();
    assert!(matches!(
        registry.change_submod("relay", "inner", "plain"),
        Err(Error::CyclicDependency(_))
    ));

    let arena = registry.arena();
    assert!(!registry.at("plain").unwrap().ready(arena, &InputMap::new()));
    assert!(!registry.at("plain").unwrap().satisfies(&ContractId::of::<Offset>()));
}

// ============================================================================
// Equality
// ============================================================================

/// Test: instances bound to equal copies of a module are equal by value
#[test]
fn test_instances_equal_by_bound_value() {
    let mut registry = sum_registry();
    apply(&mut registry, Step::A);
    apply(&mut registry, Step::B);
    apply(&mut registry, Step::Slot);
    registry.duplicate("ten", "ten_copy").unwrap();
    registry.duplicate("sum", "sum_copy").unwrap();
    registry.change_submod("sum_copy", "offset", "ten_copy").unwrap();

    let arena = registry.arena();
    let sum = registry.at("sum").unwrap();
    let copy = registry.at("sum_copy").unwrap();
    assert_ne!(sum, copy);
    assert!(sum.eq_in(copy, arena));
    assert_eq!(
        sum.digest(arena, &InputMap::new()),
        copy.digest(arena, &InputMap::new())
    );

    registry.change_input("sum_copy", "a", 5i64).unwrap();
    let arena = registry.arena();
    assert!(!registry
        .at("sum")
        .unwrap()
        .eq_in(registry.at("sum_copy").unwrap(), arena));
}
