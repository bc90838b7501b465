//! Module registry
//!
//! The registry owns every module instance (in a [`ModuleArena`]) and the
//! per-algorithm state instances share:
//! - one [`AlgorithmPrototype`] per algorithm identity
//! - one [`MemoizationCache`] per algorithm identity
//! - a default module key per contract, used by [`ModuleRegistry::resolve`]
//!
//! Configuration needs `&mut self`. Running through [`ModuleRegistry::call`]
//! only needs `&self`, so a configured registry can be shared between
//! threads.

use crate::algorithm::{Algorithm, AlgorithmId, AlgorithmPrototype};
use crate::cache::MemoizationCache;
use crate::config::RuntimeConfig;
use crate::module::{ModuleArena, ModuleId, ModuleInstance};
use memora_core::{AnyValue, Contract, ContractId, Error, InputMap, Result, ResultMap, Storable};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

/// Keyed collection of module instances
#[derive(Debug, Default)]
pub struct ModuleRegistry {
    config: RuntimeConfig,
    prototypes: HashMap<AlgorithmId, Arc<AlgorithmPrototype>>,
    caches: HashMap<AlgorithmId, Arc<MemoizationCache>>,
    keys: BTreeMap<String, ModuleId>,
    defaults: HashMap<ContractId, String>,
    arena: ModuleArena,
}

impl ModuleRegistry {
    /// Empty registry with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty registry using `config`
    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The registry's configuration
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register `algorithm` under `key`
    ///
    /// See [`ModuleRegistry::register_shared`].
    pub fn register<A: Algorithm>(
        &mut self,
        key: impl Into<String>,
        algorithm: A,
    ) -> Result<ModuleId> {
        self.register_shared(key, Arc::new(algorithm))
    }

    /// Register an already shared algorithm under `key`
    ///
    /// The first registration of an algorithm identity creates its prototype
    /// and cache. Later registrations of the same identity reuse both, and
    /// the algorithm object passed in is dropped.
    ///
    /// # Errors
    ///
    /// `DuplicateKey` if `key` is empty or already registered.
    pub fn register_shared(
        &mut self,
        key: impl Into<String>,
        algorithm: Arc<dyn Algorithm>,
    ) -> Result<ModuleId> {
        let key = key.into();
        self.assert_free(&key)?;

        let algorithm_id = algorithm.algorithm_id();
        let prototype = Arc::clone(
            self.prototypes
                .entry(algorithm_id.clone())
                .or_insert_with(|| Arc::new(AlgorithmPrototype::new(algorithm))),
        );
        let cache = Arc::clone(self.caches.entry(algorithm_id.clone()).or_default());

        let mut module = ModuleInstance::new(prototype, cache);
        if !self.config.memoize {
            module.turn_off_memoization();
        }
        let id = self.arena.insert(module);
        self.keys.insert(key.clone(), id);

        info!(target: "memora::registry", key = %key, algorithm = %algorithm_id, module = %id, "Registered module");
        Ok(id)
    }

    fn assert_free(&self, key: &str) -> Result<()> {
        if key.is_empty() || self.keys.contains_key(key) {
            return Err(Error::DuplicateKey(key.to_string()));
        }
        Ok(())
    }

    /// Register an unlocked deep copy of module `old`
    ///
    /// A blank `new` picks `"{old}{sep}{n}"` with the smallest free `n >= 1`,
    /// `sep` being the configured separator. The copy shares the original's
    /// prototype and cache. Returns the key used.
    ///
    /// # Errors
    ///
    /// - `KeyNotFound` if `old` is not registered
    /// - `DuplicateKey` if `new` is already registered
    pub fn duplicate(&mut self, old: &str, new: &str) -> Result<String> {
        let source = self.module_id(old)?;
        let key = if new.is_empty() {
            self.generate_key(old)
        } else {
            self.assert_free(new)?;
            new.to_string()
        };

        let copy = self.arena.get(source)?.unlocked_copy();
        let id = self.arena.insert(copy);
        self.keys.insert(key.clone(), id);

        info!(target: "memora::registry", from = old, key = %key, module = %id, "Duplicated module");
        Ok(key)
    }

    fn generate_key(&self, old: &str) -> String {
        (1..)
            .map(|n| format!("{}{}{}", old, self.config.duplicate_separator, n))
            .find(|candidate| !self.keys.contains_key(candidate))
            .unwrap_or_else(|| format!("{}{}", old, self.config.duplicate_separator))
    }

    // ========================================================================
    // Defaults and resolution
    // ========================================================================

    /// Make module `key` the default for contract `C`
    pub fn set_default<C: Contract>(&mut self, key: &str) -> Result<()> {
        self.set_default_for(ContractId::of::<C>(), key)
    }

    /// Make module `key` the default for `contract`
    ///
    /// # Errors
    ///
    /// - `KeyNotFound` if `key` is not registered
    /// - `ModuleDoesNotSatisfyContract` if the module does not implement it
    pub fn set_default_for(&mut self, contract: ContractId, key: &str) -> Result<()> {
        let module = self.at(key)?;
        if !module.satisfies(&contract) {
            return Err(Error::ModuleDoesNotSatisfyContract {
                module: key.to_string(),
                contract: contract.name().to_string(),
            });
        }
        self.defaults.insert(contract, key.to_string());
        debug!(target: "memora::registry", contract = %contract, key, "Set default module");
        Ok(())
    }

    /// Key of the default module for `contract`
    pub fn default_for(&self, contract: &ContractId) -> Option<&str> {
        self.defaults.get(contract).map(String::as_str)
    }

    /// Fill unready slots of module `key` with contract defaults
    ///
    /// Defaults are resolved recursively first. A default is bound only if
    /// it is then ready to run through the slot's contract; otherwise the
    /// slot is left as it was. Locked modules are left untouched.
    ///
    /// # Errors
    ///
    /// - `KeyNotFound` if `key` (or a default key) is not registered
    /// - `CyclicDependency` if resolution would make a module depend on
    ///   itself
    pub fn resolve(&mut self, key: &str) -> Result<&ModuleInstance> {
        let mut path = Vec::new();
        self.resolve_inner(key, &mut path)?;
        self.at(key)
    }

    fn resolve_inner(&mut self, key: &str, path: &mut Vec<String>) -> Result<()> {
        if path.iter().any(|seen| seen == key) {
            path.push(key.to_string());
            return Err(Error::CyclicDependency(path.clone()));
        }
        let id = self.module_id(key)?;
        let module = self.arena.get(id)?;
        if module.is_locked() {
            return Ok(());
        }

        let pending: Vec<(String, ContractId, String)> = module
            .submods()
            .iter()
            .filter(|(_, slot)| !slot.ready(&self.arena))
            .filter_map(|(name, slot)| {
                let contract = slot.contract()?;
                let default = self.defaults.get(&contract)?;
                Some((name.clone(), contract, default.clone()))
            })
            .collect();

        path.push(key.to_string());
        for (slot, contract, default_key) in pending {
            self.resolve_inner(&default_key, path)?;
            let default_id = self.module_id(&default_key)?;

            if !self.arena.get(default_id)?.ready_for(&self.arena, &contract) {
                debug!(target: "memora::registry", key, slot = %slot, default = %default_key, "Default not ready; slot left unbound");
                continue;
            }
            self.arena.bind(id, &slot, default_id)?;
            debug!(target: "memora::registry", key, slot = %slot, default = %default_key, "Bound default submodule");
        }
        path.pop();
        Ok(())
    }

    // ========================================================================
    // Configuration of registered modules
    // ========================================================================

    /// Bind `value` to input `input` of module `key`
    pub fn change_input<T: Storable>(&mut self, key: &str, input: &str, value: T) -> Result<()> {
        self.at_mut(key)?.change_input(input, value)?;
        Ok(())
    }

    /// Bind module `target` to slot `slot` of module `key`
    ///
    /// # Errors
    ///
    /// - `KeyNotFound` if either key is not registered, or `slot` is not
    ///   declared
    /// - `CyclicDependency` if `target` is `key` or already depends on it
    /// - any error of [`ModuleArena::bind`]
    pub fn change_submod(&mut self, key: &str, slot: &str, target: &str) -> Result<()> {
        let id = self.module_id(key)?;
        let target_id = self.module_id(target)?;
        if self.arena.depends_on(target_id, id) {
            return Err(Error::CyclicDependency(vec![
                key.to_string(),
                target.to_string(),
                key.to_string(),
            ]));
        }
        self.arena.bind(id, slot, target_id)
    }

    // ========================================================================
    // Running
    // ========================================================================

    /// Resolve defaults for module `key`, then run it
    pub fn run(&mut self, key: &str, inputs: InputMap) -> Result<Arc<ResultMap>> {
        self.resolve(key)?;
        self.call(key, inputs)
    }

    /// Resolve, build call-time inputs from `values`, then run
    pub fn run_with<I, K>(&mut self, key: &str, values: I) -> Result<Arc<ResultMap>>
    where
        I: IntoIterator<Item = (K, AnyValue)>,
        K: Into<String>,
    {
        let inputs = self.resolve(key)?.make_inputs(values)?;
        self.call(key, inputs)
    }

    /// Run module `key` as currently configured, without resolving
    pub fn call(&self, key: &str, inputs: InputMap) -> Result<Arc<ResultMap>> {
        self.at(key)?.run(&self.arena, inputs)
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    /// Module registered under `key`
    pub fn at(&self, key: &str) -> Result<&ModuleInstance> {
        self.arena.get(self.module_id(key)?)
    }

    /// Mutable access to module `key`
    pub fn at_mut(&mut self, key: &str) -> Result<&mut ModuleInstance> {
        let id = self.module_id(key)?;
        self.arena.get_mut(id)
    }

    /// Handle of module `key`
    ///
    /// # Errors
    ///
    /// `KeyNotFound` if `key` is not registered.
    pub fn module_id(&self, key: &str) -> Result<ModuleId> {
        self.keys
            .get(key)
            .copied()
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Is `key` registered?
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    /// Number of registered modules
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Is nothing registered?
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Registered keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// Arena owning every registered module
    pub fn arena(&self) -> &ModuleArena {
        &self.arena
    }

    /// Cache shared by instances of `algorithm`
    pub fn cache_for(&self, algorithm: &AlgorithmId) -> Option<&Arc<MemoizationCache>> {
        self.caches.get(algorithm)
    }

    /// Clear every algorithm's cache
    pub fn reset_caches(&self) {
        for cache in self.caches.values() {
            cache.reset();
        }
    }
}
