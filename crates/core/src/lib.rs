//! Core types and traits for Memora
//!
//! This crate defines the foundational types used throughout the runtime:
//! - AnyValue: type-erased, cloneable, hashable, comparable value box
//! - FieldMetadata: typed input/result field with checks and traits
//! - Bounds checks: reusable, self-describing validity predicates
//! - TypeInfo / ContractId: identity tokens for value types and contracts
//! - ModuleHasher: SHA-256 accumulator used for memoization digests
//! - Error: error type hierarchy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod any;
pub mod bounds;
pub mod error;
pub mod field;
pub mod hash;
pub mod types;

pub use any::{AnyValue, Storable};
pub use bounds::BoundsCheck;
pub use error::{Error, Result};
pub use field::{CheckFn, FieldKind, FieldMetadata, InputMap, ResultMap};
pub use hash::ModuleHasher;
pub use types::{Contract, ContractId, NotSetReport, TypeInfo};
