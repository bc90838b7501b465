//! Core identity types for Memora
//!
//! This module defines:
//! - TypeInfo: copyable identity token for a Rust type
//! - Contract / ContractId: the named input/result shape a module can be run through
//! - NotSetReport: why a module is not ready to run

use std::any::TypeId;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity token for a concrete Rust type
///
/// Equality, ordering and hashing use the `TypeId` only; the name is carried
/// for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
}

impl TypeInfo {
    /// Identity of `T`
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Identity reported by an empty container
    pub fn void() -> Self {
        Self::of::<()>()
    }

    /// Is this the void token?
    pub fn is_void(&self) -> bool {
        self.id == TypeId::of::<()>()
    }

    /// Underlying `TypeId`
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Full type name as reported by `std::any::type_name`
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A named shape of inputs/results a module may be invoked through
///
/// Implemented on zero-sized marker types:
///
/// ```rust
/// use memora_core::Contract;
///
/// struct Energy;
///
/// impl Contract for Energy {
///     const INPUTS: &'static [&'static str] = &["geometry"];
///     const RESULTS: &'static [&'static str] = &["energy"];
/// }
/// ```
pub trait Contract: 'static {
    /// Inputs the caller supplies when running through this contract
    const INPUTS: &'static [&'static str] = &[];
    /// Results a module running through this contract must produce
    const RESULTS: &'static [&'static str] = &[];
}

/// Runtime identity of a [`Contract`]
#[derive(Debug, Clone, Copy)]
pub struct ContractId {
    info: TypeInfo,
    inputs: &'static [&'static str],
    results: &'static [&'static str],
}

impl ContractId {
    /// Identity of contract `C`
    pub fn of<C: Contract>() -> Self {
        Self {
            info: TypeInfo::of::<C>(),
            inputs: C::INPUTS,
            results: C::RESULTS,
        }
    }

    /// Type identity of the marker type
    pub fn type_info(&self) -> TypeInfo {
        self.info
    }

    /// Contract name (the marker type's name)
    pub fn name(&self) -> &'static str {
        self.info.name()
    }

    /// Input names supplied at call time
    pub fn inputs(&self) -> &'static [&'static str] {
        self.inputs
    }

    /// Result names the contract produces
    pub fn results(&self) -> &'static [&'static str] {
        self.results
    }
}

impl PartialEq for ContractId {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info
    }
}

impl Eq for ContractId {}

impl Hash for ContractId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.info.hash(state);
    }
}

impl fmt::Display for ContractId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Report of the state preventing a module from running
///
/// Partitioned the same way `not_set` inspects a module: the algorithm
/// itself, required inputs, and required submodules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotSetReport {
    /// The module wraps no algorithm
    pub algorithm: bool,
    /// Required inputs without a value
    pub inputs: BTreeSet<String>,
    /// Submodule slots that are unbound or whose module is not ready
    pub submodules: BTreeSet<String>,
}

impl NotSetReport {
    /// Nothing is missing
    pub fn is_empty(&self) -> bool {
        !self.algorithm && self.inputs.is_empty() && self.submodules.is_empty()
    }
}

impl fmt::Display for NotSetReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("nothing missing");
        }
        let mut parts = Vec::new();
        if self.algorithm {
            parts.push("Algorithm: not set".to_string());
        }
        if !self.inputs.is_empty() {
            let names: Vec<&str> = self.inputs.iter().map(String::as_str).collect();
            parts.push(format!("Inputs: {}", names.join(", ")));
        }
        if !self.submodules.is_empty() {
            let names: Vec<&str> = self.submodules.iter().map(String::as_str).collect();
            parts.push(format!("Submodules: {}", names.join(", ")));
        }
        f.write_str(&parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Energy;
    impl Contract for Energy {
        const INPUTS: &'static [&'static str] = &["geometry"];
        const RESULTS: &'static [&'static str] = &["energy"];
    }

    struct Gradient;
    impl Contract for Gradient {}

    #[test]
    fn test_type_info_equality_ignores_name_formatting() {
        assert_eq!(TypeInfo::of::<i64>(), TypeInfo::of::<i64>());
        assert_ne!(TypeInfo::of::<i64>(), TypeInfo::of::<i32>());
        assert!(TypeInfo::void().is_void());
        assert!(!TypeInfo::of::<String>().is_void());
    }

    #[test]
    fn test_contract_id_carries_shape() {
        let id = ContractId::of::<Energy>();
        assert_eq!(id.inputs(), &["geometry"]);
        assert_eq!(id.results(), &["energy"]);
        assert!(id.name().ends_with("Energy"));
        assert_ne!(id, ContractId::of::<Gradient>());
        assert!(ContractId::of::<Gradient>().inputs().is_empty());
    }

    #[test]
    fn test_not_set_report_display() {
        let mut report = NotSetReport::default();
        assert!(report.is_empty());
        assert_eq!(report.to_string(), "nothing missing");

        report.inputs.insert("b".into());
        report.inputs.insert("a".into());
        report.algorithm = true;
        assert!(!report.is_empty());
        assert_eq!(report.to_string(), "Algorithm: not set; Inputs: a, b");
    }
}
