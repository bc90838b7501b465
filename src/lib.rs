//! Memora - module execution runtime with memoization
//!
//! Memora runs developer-supplied algorithms ("modules") over typed,
//! validated inputs. Modules can depend on other modules through
//! contract-typed submodule slots, and every result is memoized under a
//! digest of the module's effective state.
//!
//! # Quick Start
//!
//! ```ignore
//! use memora::{
//!     Algorithm, AnyValue, FieldMetadata, InputMap, ModuleRegistry, ModuleSchema,
//!     Result, ResultMap, Submodules,
//! };
//!
//! struct Square;
//!
//! impl Algorithm for Square {
//!     fn schema(&self) -> ModuleSchema {
//!         ModuleSchema::new()
//!             .input("x", FieldMetadata::typed_input::<i64>())
//!             .result("y", FieldMetadata::typed_result::<i64>())
//!     }
//!
//!     fn compute(&self, inputs: &InputMap, _: &Submodules<'_>) -> Result<ResultMap> {
//!         let x = inputs["x"].value::<i64>()?;
//!         Ok(ResultMap::from([("y".into(), FieldMetadata::result_of(x * x))]))
//!     }
//! }
//!
//! let mut registry = ModuleRegistry::new();
//! registry.register("square", Square)?;
//!
//! // Computed once, then served from the cache
//! let first = registry.run_with("square", [("x", AnyValue::new(5i64))])?;
//! let again = registry.run_with("square", [("x", AnyValue::new(5i64))])?;
//! assert_eq!(first["y"].value::<i64>()?, &25);
//! ```
//!
//! # Architecture
//!
//! - `memora-core`: values, fields, checks, identity tokens, hashing, errors
//! - `memora-engine`: algorithms, module instances, cache, registry, config
//!
//! Both crates are re-exported here.

pub use memora_core::*;
pub use memora_engine::*;

