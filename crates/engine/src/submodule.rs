//! Submodule slots
//!
//! A slot is a module's declared dependency on another module. It names the
//! contract the dependency must satisfy and, once bound, holds the
//! [`ModuleId`] of the module filling it. The module itself lives in the
//! [`ModuleArena`]; slots never own modules.
//!
//! A slot is ready when its bound module could run through the slot's
//! contract, i.e. with the contract's inputs treated as supplied by the
//! caller.

use crate::module::{ModuleArena, ModuleId, ModuleInstance};
use memora_core::{
    AnyValue, Contract, ContractId, Error, InputMap, NotSetReport, Result, ResultMap,
};
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A declared dependency of a module on another module
///
/// `==` compares the bound handle; [`SubmoduleSlot::eq_in`] compares the
/// bound module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmoduleSlot {
    contract: Option<ContractId>,
    description: Option<String>,
    module: Option<ModuleId>,
}

impl SubmoduleSlot {
    /// Slot with no contract yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot requiring `contract`
    pub fn for_contract(contract: ContractId) -> Self {
        Self {
            contract: Some(contract),
            ..Self::default()
        }
    }

    /// Set the description, builder style
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Require contract `C`
    pub fn set_type<C: Contract>(&mut self) -> Result<&mut Self> {
        self.set_contract(ContractId::of::<C>())
    }

    /// Require `contract`
    ///
    /// Setting the contract already required is a no-op.
    ///
    /// # Errors
    ///
    /// `DoubleTypeSet` if a different contract was set.
    pub fn set_contract(&mut self, contract: ContractId) -> Result<&mut Self> {
        match self.contract {
            Some(existing) if existing != contract => Err(Error::DoubleTypeSet(format!(
                "slot already requires {}, cannot require {}",
                existing, contract
            ))),
            _ => {
                self.contract = Some(contract);
                Ok(self)
            }
        }
    }

    /// Set the human-readable description
    pub fn set_description(&mut self, desc: impl Into<String>) -> &mut Self {
        self.description = Some(desc.into());
        self
    }

    /// Bind the module `id`, whose instance is `candidate`
    ///
    /// Callers must pass the instance behind `id`; see
    /// [`ModuleArena::bind`].
    ///
    /// # Errors
    ///
    /// - `TypeNotSet` if the slot has no contract
    /// - `ModuleDoesNotSatisfyContract` if `candidate` does not declare it
    pub(crate) fn change(&mut self, id: ModuleId, candidate: &ModuleInstance) -> Result<&mut Self> {
        let contract = self.contract.ok_or_else(|| {
            Error::TypeNotSet("slot contract must be set before binding a module".into())
        })?;
        if !candidate.satisfies(&contract) {
            return Err(Error::ModuleDoesNotSatisfyContract {
                module: candidate
                    .algorithm_id()
                    .map(|id| id.to_string())
                    .unwrap_or_else(|| "<no algorithm>".to_string()),
                contract: contract.name().to_string(),
            });
        }
        self.module = Some(id);
        Ok(self)
    }

    /// The same slot with its binding dropped
    pub(crate) fn unbound(&self) -> Self {
        Self {
            module: None,
            ..self.clone()
        }
    }

    /// Is a contract set?
    pub fn has_type(&self) -> bool {
        self.contract.is_some()
    }

    /// Is a module bound?
    pub fn has_module(&self) -> bool {
        self.module.is_some()
    }

    /// The bound module, if any
    pub fn module_id(&self) -> Option<ModuleId> {
        self.module
    }

    /// The required contract, if set
    pub fn contract(&self) -> Option<ContractId> {
        self.contract
    }

    /// Is a description set?
    pub fn has_description(&self) -> bool {
        self.description.is_some()
    }

    /// The description, if set
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Contract set, module bound, and the module ready to run through it
    pub fn ready(&self, arena: &ModuleArena) -> bool {
        match (self.contract, self.module) {
            (Some(contract), Some(id)) => arena
                .get(id)
                .map(|module| module.ready_for(arena, &contract))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Lock the bound module and everything below it
    ///
    /// # Errors
    ///
    /// `NotReadyError` if the slot is not ready.
    pub fn lock(&self, arena: &ModuleArena) -> Result<()> {
        if !self.ready(arena) {
            return Err(Error::NotReadyError(NotSetReport {
                submodules: self.unready_names(),
                ..Default::default()
            }));
        }
        match self.module {
            Some(id) => arena.get(id)?.lock(arena),
            None => Ok(()),
        }
    }

    fn unready_names(&self) -> std::collections::BTreeSet<String> {
        let name = self
            .description
            .clone()
            .or_else(|| self.contract.map(|c| c.name().to_string()))
            .unwrap_or_else(|| "<untyped slot>".to_string());
        std::iter::once(name).collect()
    }

    /// Same contract and description, and bound modules equal by value
    pub fn eq_in(&self, other: &Self, arena: &ModuleArena) -> bool {
        if self.contract != other.contract || self.description != other.description {
            return false;
        }
        match (self.module, other.module) {
            (None, None) => true,
            (Some(l), Some(r)) if l == r => true,
            (Some(l), Some(r)) => match (arena.get(l), arena.get(r)) {
                (Ok(l), Ok(r)) => l.eq_in(r, arena),
                _ => false,
            },
            _ => false,
        }
    }

    /// Feed the bound module's state into `state`
    ///
    /// Submodules are always hashed; field transparency stops at the
    /// module boundary.
    pub fn hash(&self, arena: &ModuleArena, mut state: &mut dyn Hasher) {
        match self.module.and_then(|id| arena.get(id).ok()) {
            Some(module) => module.hash(arena, state),
            None => "<unbound>".hash(&mut state),
        }
    }
}

/// Read-only view of a module's bound submodules, handed to `compute`
#[derive(Debug, Clone, Copy)]
pub struct Submodules<'a> {
    slots: &'a BTreeMap<String, SubmoduleSlot>,
    arena: &'a ModuleArena,
}

impl<'a> Submodules<'a> {
    pub(crate) fn new(slots: &'a BTreeMap<String, SubmoduleSlot>, arena: &'a ModuleArena) -> Self {
        Self { slots, arena }
    }

    /// The module bound to slot `name`
    ///
    /// # Errors
    ///
    /// - `KeyNotFound` for an undeclared slot
    /// - `NotReadyError` if nothing is bound
    pub fn get(&self, name: &str) -> Result<&'a ModuleInstance> {
        let slot = self
            .slots
            .get(name)
            .ok_or_else(|| Error::KeyNotFound(name.to_string()))?;
        match slot.module_id() {
            Some(id) => self.arena.get(id),
            None => Err(Error::NotReadyError(NotSetReport {
                submodules: std::iter::once(name.to_string()).collect(),
                ..Default::default()
            })),
        }
    }

    /// Run the module bound to slot `name` with call-time `inputs`
    pub fn run(&self, name: &str, inputs: InputMap) -> Result<Arc<ResultMap>> {
        self.get(name)?.run(self.arena, inputs)
    }

    /// Call-time inputs for slot `name`, built from its module's templates
    pub fn make_inputs<I, K>(&self, name: &str, values: I) -> Result<InputMap>
    where
        I: IntoIterator<Item = (K, AnyValue)>,
        K: Into<String>,
    {
        self.get(name)?.make_inputs(values)
    }

    /// Bind `values` to slot `name`'s inputs and run it
    pub fn run_with<I, K>(&self, name: &str, values: I) -> Result<Arc<ResultMap>>
    where
        I: IntoIterator<Item = (K, AnyValue)>,
        K: Into<String>,
    {
        let inputs = self.make_inputs(name, values)?;
        self.run(name, inputs)
    }

    /// Declared slot names
    pub fn names(&self) -> impl Iterator<Item = &'a str> + 'a {
        self.slots.keys().map(String::as_str)
    }

    /// The arena the bound modules live in
    pub fn arena(&self) -> &'a ModuleArena {
        self.arena
    }
}
