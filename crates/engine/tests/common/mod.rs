//! Shared algorithms and contracts for engine integration tests

#![allow(dead_code)]

use memora_core::{Contract, FieldMetadata, InputMap, Result, ResultMap};
use memora_engine::{Algorithm, AlgorithmId, ModuleSchema, Submodules};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Anything producing a single `value: i64`
pub struct Offset;

impl Contract for Offset {
    const RESULTS: &'static [&'static str] = &["value"];
}

/// Scales a caller-supplied `x`
pub struct Scale;

impl Contract for Scale {
    const INPUTS: &'static [&'static str] = &["x"];
    const RESULTS: &'static [&'static str] = &["y"];
}

/// Shared invocation counter
pub fn counter() -> Arc<AtomicUsize> {
    Arc::new(AtomicUsize::new(0))
}

/// Read a counter
pub fn calls(counter: &Arc<AtomicUsize>) -> usize {
    counter.load(Ordering::SeqCst)
}

/// `y = x * x`, with an optional transparent `note`
pub struct Square {
    pub calls: Arc<AtomicUsize>,
}

impl Algorithm for Square {
    fn schema(&self) -> ModuleSchema {
        ModuleSchema::new()
            .with_description("Squares x")
            .input("x", FieldMetadata::typed_input::<i64>())
            .input(
                "note",
                FieldMetadata::typed_input::<String>().optional().transparent(),
            )
            .result("y", FieldMetadata::typed_result::<i64>())
            .satisfies::<Scale>()
    }

    fn compute(&self, inputs: &InputMap, _: &Submodules<'_>) -> Result<ResultMap> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let x = inputs["x"].value::<i64>()?;
        Ok(ResultMap::from([(
            "y".to_string(),
            FieldMetadata::result_of(x * x),
        )]))
    }
}

/// Produces a fixed `value`, optionally needing a `seed` first
pub struct Constant {
    pub value: i64,
    pub needs_seed: bool,
    pub calls: Arc<AtomicUsize>,
}

impl Algorithm for Constant {
    fn algorithm_id(&self) -> AlgorithmId {
        AlgorithmId::named(format!("constant({}, seed: {})", self.value, self.needs_seed))
    }

    fn schema(&self) -> ModuleSchema {
        let mut schema = ModuleSchema::new()
            .result("value", FieldMetadata::typed_result::<i64>())
            .satisfies::<Offset>();
        if self.needs_seed {
            schema = schema.input("seed", FieldMetadata::typed_input::<i64>());
        }
        schema
    }

    fn compute(&self, _: &InputMap, _: &Submodules<'_>) -> Result<ResultMap> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ResultMap::from([(
            "value".to_string(),
            FieldMetadata::result_of(self.value),
        )]))
    }
}

/// `total = a + b + offset.value`
pub struct Sum {
    pub calls: Arc<AtomicUsize>,
}

impl Algorithm for Sum {
    fn schema(&self) -> ModuleSchema {
        ModuleSchema::new()
            .input("a", FieldMetadata::typed_input::<i64>())
            .input("b", FieldMetadata::typed_input::<i64>())
            .result("total", FieldMetadata::typed_result::<i64>())
            .submodule::<Offset>("offset")
    }

    fn compute(&self, inputs: &InputMap, submods: &Submodules<'_>) -> Result<ResultMap> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let offset = submods.run("offset", InputMap::new())?;
        let total = inputs["a"].value::<i64>()?
            + inputs["b"].value::<i64>()?
            + offset["value"].value::<i64>()?;
        Ok(ResultMap::from([(
            "total".to_string(),
            FieldMetadata::result_of(total),
        )]))
    }
}
