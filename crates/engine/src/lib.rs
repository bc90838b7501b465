//! Module execution engine for Memora
//!
//! This crate runs modules on top of the core types:
//! - Algorithm: developer-supplied compute function plus declared schema
//! - ModuleInstance: configured use of an algorithm, locked on first run
//! - SubmoduleSlot: contract-typed dependency on another module
//! - MemoizationCache: digest-keyed results shared per algorithm
//! - ModuleRegistry: keyed instances, shared caches and contract defaults
//! - RuntimeConfig: registry-wide settings from `memora.toml`
//!
//! Every instance lives in a `ModuleArena`; submodule bindings are
//! `ModuleId` handles into it rather than owning pointers.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algorithm;
pub mod cache;
pub mod config;
pub mod module;
pub mod registry;
pub mod submodule;

pub use algorithm::{Algorithm, AlgorithmId, AlgorithmPrototype, LambdaModule, ModuleSchema};
pub use cache::MemoizationCache;
pub use config::RuntimeConfig;
pub use module::{ModuleArena, ModuleId, ModuleInstance, RunStats};
pub use registry::ModuleRegistry;
pub use submodule::{SubmoduleSlot, Submodules};
