//! Algorithm prototypes
//!
//! An algorithm is the developer-supplied part of a module: a declared
//! schema (inputs, results, submodule slots, satisfied contracts) and a
//! compute function. The runtime wraps it in an immutable
//! [`AlgorithmPrototype`], shared by every instance of the same identity.
//!
//! ## Usage
//!
//! ```rust,ignore
//! struct Rescale;
//!
//! impl Algorithm for Rescale {
//!     fn schema(&self) -> ModuleSchema {
//!         ModuleSchema::new()
//!             .with_description("Multiplies x by a factor")
//!             .input("x", FieldMetadata::typed_input::<i64>())
//!             .input("factor", FieldMetadata::typed_input::<i64>())
//!             .result("y", FieldMetadata::typed_result::<i64>())
//!     }
//!
//!     fn compute(&self, inputs: &InputMap, _: &Submodules<'_>) -> Result<ResultMap> {
//!         let x = inputs["x"].value::<i64>()?;
//!         let factor = inputs["factor"].value::<i64>()?;
//!         Ok(ResultMap::from([("y".into(), FieldMetadata::result_of(x * factor))]))
//!     }
//! }
//! ```

use crate::submodule::{SubmoduleSlot, Submodules};
use memora_core::{Contract, ContractId, FieldMetadata, InputMap, Result, ResultMap};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Identity of an algorithm
///
/// Instances sharing an identity share a prototype and a memoization cache.
/// The identity also enters every digest the algorithm's instances compute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AlgorithmId(String);

impl AlgorithmId {
    /// Identity derived from a Rust type's name
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self(std::any::type_name::<T>().to_string())
    }

    /// Identity with an explicit name
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The identity as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AlgorithmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Developer-supplied algorithm
pub trait Algorithm: Send + Sync + 'static {
    /// Identity used for cache sharing and hashing
    ///
    /// Defaults to the implementing type's name.
    fn algorithm_id(&self) -> AlgorithmId {
        AlgorithmId::of::<Self>()
    }

    /// Declared inputs, results, submodules and contracts
    fn schema(&self) -> ModuleSchema;

    /// Compute the results for fully merged `inputs`
    fn compute(&self, inputs: &InputMap, submods: &Submodules<'_>) -> Result<ResultMap>;
}

/// Declaration of a module's shape, accumulated builder style
#[derive(Debug, Clone, Default)]
pub struct ModuleSchema {
    description: Option<String>,
    citations: Vec<String>,
    inputs: InputMap,
    results: ResultMap,
    submodules: BTreeMap<String, SubmoduleSlot>,
    contracts: Vec<ContractId>,
}

impl ModuleSchema {
    /// Empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Human-readable description of the algorithm
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Add a reference to cite when the algorithm is used
    pub fn with_citation(mut self, citation: impl Into<String>) -> Self {
        self.citations.push(citation.into());
        self
    }

    /// Declare an input
    pub fn input(mut self, name: impl Into<String>, field: FieldMetadata) -> Self {
        self.inputs.insert(name.into(), field);
        self
    }

    /// Declare a result
    pub fn result(mut self, name: impl Into<String>, field: FieldMetadata) -> Self {
        self.results.insert(name.into(), field);
        self
    }

    /// Declare a submodule slot requiring contract `C`
    pub fn submodule<C: Contract>(self, name: impl Into<String>) -> Self {
        self.submodule_slot(name, SubmoduleSlot::for_contract(ContractId::of::<C>()))
    }

    /// Declare a submodule slot from a prepared slot
    pub fn submodule_slot(mut self, name: impl Into<String>, slot: SubmoduleSlot) -> Self {
        self.submodules.insert(name.into(), slot);
        self
    }

    /// Declare that the algorithm can be run through contract `C`
    pub fn satisfies<C: Contract>(mut self) -> Self {
        let id = ContractId::of::<C>();
        if !self.contracts.contains(&id) {
            self.contracts.push(id);
        }
        self
    }

    /// The description, if set
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// References to cite
    pub fn citations(&self) -> &[String] {
        &self.citations
    }

    /// Declared inputs
    pub fn inputs(&self) -> &InputMap {
        &self.inputs
    }

    /// Declared results
    pub fn results(&self) -> &ResultMap {
        &self.results
    }

    /// Declared submodule slots
    pub fn submodules(&self) -> &BTreeMap<String, SubmoduleSlot> {
        &self.submodules
    }

    /// Declared contracts
    pub fn contracts(&self) -> &[ContractId] {
        &self.contracts
    }

    /// Is `contract` declared, with every input and result it names?
    pub fn implements(&self, contract: &ContractId) -> bool {
        self.contracts.contains(contract)
            && contract.inputs().iter().all(|name| self.inputs.contains_key(*name))
            && contract.results().iter().all(|name| self.results.contains_key(*name))
    }
}

/// Immutable algorithm wrapper shared by all instances of one identity
pub struct AlgorithmPrototype {
    id: AlgorithmId,
    schema: ModuleSchema,
    algorithm: Arc<dyn Algorithm>,
}

impl AlgorithmPrototype {
    /// Capture `algorithm`'s identity and schema
    pub fn new(algorithm: Arc<dyn Algorithm>) -> Self {
        Self {
            id: algorithm.algorithm_id(),
            schema: algorithm.schema(),
            algorithm,
        }
    }

    /// Algorithm identity
    pub fn id(&self) -> &AlgorithmId {
        &self.id
    }

    /// Schema captured at construction
    pub fn schema(&self) -> &ModuleSchema {
        &self.schema
    }

    /// Does the algorithm implement `contract`?
    pub fn satisfies(&self, contract: &ContractId) -> bool {
        self.schema.implements(contract)
    }

    /// Invoke the compute function
    pub fn compute(&self, inputs: &InputMap, submods: &Submodules<'_>) -> Result<ResultMap> {
        self.algorithm.compute(inputs, submods)
    }
}

impl fmt::Debug for AlgorithmPrototype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlgorithmPrototype")
            .field("id", &self.id)
            .field("schema", &self.schema)
            .finish()
    }
}

/// An algorithm built from a closure
///
/// The identity is given explicitly; closure type names are not stable
/// identities.
pub struct LambdaModule<F> {
    id: AlgorithmId,
    schema: ModuleSchema,
    body: F,
}

impl<F> LambdaModule<F>
where
    F: for<'s> Fn(&InputMap, &Submodules<'s>) -> Result<ResultMap> + Send + Sync + 'static,
{
    /// Wrap `body` under identity `name`
    pub fn new(name: impl Into<String>, schema: ModuleSchema, body: F) -> Self {
        Self {
            id: AlgorithmId::named(name),
            schema,
            body,
        }
    }
}

impl<F> Algorithm for LambdaModule<F>
where
    F: for<'s> Fn(&InputMap, &Submodules<'s>) -> Result<ResultMap> + Send + Sync + 'static,
{
    fn algorithm_id(&self) -> AlgorithmId {
        self.id.clone()
    }

    fn schema(&self) -> ModuleSchema {
        self.schema.clone()
    }

    fn compute(&self, inputs: &InputMap, submods: &Submodules<'_>) -> Result<ResultMap> {
        (self.body)(inputs, submods)
    }
}
