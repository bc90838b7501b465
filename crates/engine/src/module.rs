//! Module instances and the arena that owns them
//!
//! A `ModuleInstance` is one configured use of an algorithm: its bound
//! inputs, its submodule bindings, and a handle on the memoization cache
//! shared by every instance of the same algorithm.
//!
//! ## Lifecycle
//!
//! ```text
//! Configured --lock()/run()--> Locked
//! ```
//!
//! Locked is terminal. Locking cascades to every bound submodule, and a
//! locked module rejects further configuration with `LockedModuleError`.
//! An unlocked copy comes from `ModuleRegistry::duplicate`.
//!
//! ## Running
//!
//! `run` merges the bound inputs beneath the call-time inputs, locks, and
//! digests the merged state (opaque inputs, every bound submodule, and the
//! algorithm identity). A digest already in the cache returns the stored
//! result without calling the algorithm.

use crate::algorithm::{AlgorithmId, AlgorithmPrototype};
use crate::cache::MemoizationCache;
use crate::submodule::{SubmoduleSlot, Submodules};
use chrono::{DateTime, Utc};
use memora_core::{
    AnyValue, ContractId, Error, FieldMetadata, InputMap, ModuleHasher, NotSetReport, Result,
    ResultMap, Storable,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

/// Handle of a module stored in a [`ModuleArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(usize);

impl ModuleId {
    /// Handle for arena slot `index`
    pub fn from_index(index: usize) -> Self {
        Self(index)
    }

    /// Arena slot index
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module#{}", self.0)
    }
}

/// Owner of every module instance, addressed by [`ModuleId`]
///
/// Instances are never removed, so a handle stays valid for the arena's
/// lifetime.
#[derive(Debug, Default)]
pub struct ModuleArena {
    modules: Vec<ModuleInstance>,
}

impl ModuleArena {
    /// Empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `module`
    pub fn insert(&mut self, module: ModuleInstance) -> ModuleId {
        self.modules.push(module);
        ModuleId(self.modules.len() - 1)
    }

    /// The module behind `id`
    ///
    /// # Errors
    ///
    /// `KeyNotFound` if `id` belongs to no module here.
    pub fn get(&self, id: ModuleId) -> Result<&ModuleInstance> {
        self.modules
            .get(id.0)
            .ok_or_else(|| Error::KeyNotFound(id.to_string()))
    }

    /// Mutable access to the module behind `id`
    pub fn get_mut(&mut self, id: ModuleId) -> Result<&mut ModuleInstance> {
        self.modules
            .get_mut(id.0)
            .ok_or_else(|| Error::KeyNotFound(id.to_string()))
    }

    /// `target` mutably alongside `other` immutably; `None` if they coincide
    pub(crate) fn pair_mut(
        &mut self,
        target: ModuleId,
        other: ModuleId,
    ) -> Option<(&mut ModuleInstance, &ModuleInstance)> {
        let (t, o) = (target.0, other.0);
        if t == o || t >= self.modules.len() || o >= self.modules.len() {
            return None;
        }
        if t < o {
            let (head, tail) = self.modules.split_at_mut(o);
            Some((&mut head[t], &tail[0]))
        } else {
            let (head, tail) = self.modules.split_at_mut(t);
            Some((&mut tail[0], &head[o]))
        }
    }

    /// Does `from` reach `target` through bound submodules?
    ///
    /// A module reaches itself.
    pub fn depends_on(&self, from: ModuleId, target: ModuleId) -> bool {
        let mut stack = vec![from];
        let mut visited = HashSet::new();
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Ok(module) = self.get(current) {
                stack.extend(module.submods().values().filter_map(SubmoduleSlot::module_id));
            }
        }
        false
    }

    /// Bind module `module` to slot `slot` of module `target`
    ///
    /// Every submodule binding goes through here, which keeps the graph of
    /// bindings acyclic.
    ///
    /// # Errors
    ///
    /// - `KeyNotFound` if either handle is unknown or `slot` is not declared
    /// - `CyclicDependency` if `module` is `target` or already depends on it
    /// - `LockedModuleError` if `target` is locked
    /// - `ModuleDoesNotSatisfyContract` if `module` does not implement the
    ///   slot's contract
    pub fn bind(&mut self, target: ModuleId, slot: &str, module: ModuleId) -> Result<()> {
        self.get(target)?;
        self.get(module)?;
        if self.depends_on(module, target) {
            let mut cycle = vec![target.to_string()];
            if module != target {
                cycle.push(module.to_string());
            }
            cycle.push(target.to_string());
            return Err(Error::CyclicDependency(cycle));
        }
        let (instance, candidate) = self
            .pair_mut(target, module)
            .ok_or_else(|| Error::KeyNotFound(module.to_string()))?;
        instance.change_submod(slot, module, candidate)?;
        Ok(())
    }

    /// Number of modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Is the arena empty?
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Every module with its handle
    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, &ModuleInstance)> {
        self.modules
            .iter()
            .enumerate()
            .map(|(i, module)| (ModuleId(i), module))
    }
}

/// Timing and cache statistics of a module's runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Successful runs, cache hits included
    pub runs: u64,
    /// Runs answered from the cache
    pub cache_hits: u64,
    /// Wall time of the latest run
    pub last_elapsed: Option<Duration>,
    /// When the latest run finished
    pub last_run_at: Option<DateTime<Utc>>,
}

/// A configured use of an algorithm
pub struct ModuleInstance {
    uuid: Uuid,
    prototype: Option<Arc<AlgorithmPrototype>>,
    cache: Option<Arc<MemoizationCache>>,
    inputs: InputMap,
    results: ResultMap,
    submods: BTreeMap<String, SubmoduleSlot>,
    locked: AtomicBool,
    memoizable: bool,
    stats: Mutex<RunStats>,
}

impl ModuleInstance {
    /// Instance of `prototype` whose results go into `cache`
    ///
    /// Inputs, results and submodule slots start as the schema's templates.
    pub fn new(prototype: Arc<AlgorithmPrototype>, cache: Arc<MemoizationCache>) -> Self {
        let schema = prototype.schema();
        Self {
            uuid: Uuid::new_v4(),
            inputs: schema.inputs().clone(),
            results: schema.results().clone(),
            submods: schema
                .submodules()
                .iter()
                .map(|(name, slot)| (name.clone(), slot.unbound()))
                .collect(),
            prototype: Some(prototype),
            cache: Some(cache),
            locked: AtomicBool::new(false),
            memoizable: true,
            stats: Mutex::new(RunStats::default()),
        }
    }

    /// Placeholder instance wrapping no algorithm
    ///
    /// It can never run; `not_set` reports the missing algorithm.
    pub fn empty() -> Self {
        Self {
            uuid: Uuid::new_v4(),
            prototype: None,
            cache: None,
            inputs: InputMap::new(),
            results: ResultMap::new(),
            submods: BTreeMap::new(),
            locked: AtomicBool::new(false),
            memoizable: true,
            stats: Mutex::new(RunStats::default()),
        }
    }

    /// Deep copy with a fresh identity, unlocked, sharing prototype and cache
    pub(crate) fn unlocked_copy(&self) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            prototype: self.prototype.clone(),
            cache: self.cache.clone(),
            inputs: self.inputs.clone(),
            results: self.results.clone(),
            submods: self.submods.clone(),
            locked: AtomicBool::new(false),
            memoizable: self.memoizable,
            stats: Mutex::new(RunStats::default()),
        }
    }

    /// Unique identity of this instance
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    // ========================================================================
    // Readiness
    // ========================================================================

    /// What stops the module from running with call-time `inputs`
    ///
    /// A declared input counts as set if `inputs` supplies a ready entry for
    /// it, or otherwise if the bound field is ready.
    pub fn not_set(&self, arena: &ModuleArena, inputs: &InputMap) -> NotSetReport {
        let mut report = NotSetReport {
            algorithm: self.prototype.is_none(),
            ..Default::default()
        };
        for (name, declared) in &self.inputs {
            let ready = match inputs.get(name) {
                Some(field) => field.ready(),
                None => declared.ready(),
            };
            if !ready {
                report.inputs.insert(name.clone());
            }
        }
        for (name, slot) in &self.submods {
            if !slot.ready(arena) {
                report.submodules.insert(name.clone());
            }
        }
        report
    }

    /// Could the module run with call-time `inputs`?
    pub fn ready(&self, arena: &ModuleArena, inputs: &InputMap) -> bool {
        self.not_set(arena, inputs).is_empty()
    }

    /// Could the module run through `contract`, the caller supplying the
    /// contract's inputs?
    pub fn ready_for(&self, arena: &ModuleArena, contract: &ContractId) -> bool {
        let mut report = self.not_set(arena, &InputMap::new());
        for name in contract.inputs() {
            report.inputs.remove(*name);
        }
        report.is_empty()
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    fn assert_unlocked(&self) -> Result<()> {
        if self.is_locked() {
            return Err(Error::LockedModuleError(format!(
                "{} ({}) cannot be modified",
                self.label(),
                self.uuid
            )));
        }
        Ok(())
    }

    /// Bind `value` to input `key`
    ///
    /// # Errors
    ///
    /// - `LockedModuleError` if the module is locked
    /// - `KeyNotFound` if `key` is not a declared input
    /// - any error of [`FieldMetadata::change`]
    pub fn change_input<T: Storable>(&mut self, key: &str, value: T) -> Result<&mut Self> {
        self.change_input_any(key, AnyValue::new(value))
    }

    /// Bind an erased value to input `key`; same rules as `change_input`
    pub fn change_input_any(&mut self, key: &str, value: AnyValue) -> Result<&mut Self> {
        self.input_mut(key)?.change_any(value)?;
        Ok(self)
    }

    /// Mutable access to input `key`, e.g. to add checks
    pub fn input_mut(&mut self, key: &str) -> Result<&mut FieldMetadata> {
        self.assert_unlocked()?;
        self.inputs
            .get_mut(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    /// Bind the module `id` (whose instance is `candidate`) to slot `key`
    ///
    /// Reached only through [`ModuleArena::bind`], which guarantees that
    /// `candidate` is the module behind `id` and that no cycle forms.
    ///
    /// # Errors
    ///
    /// - `LockedModuleError` if the module is locked
    /// - `KeyNotFound` if `key` is not a declared slot
    /// - any error of [`SubmoduleSlot::change`]
    pub(crate) fn change_submod(
        &mut self,
        key: &str,
        id: ModuleId,
        candidate: &ModuleInstance,
    ) -> Result<&mut Self> {
        self.assert_unlocked()?;
        let slot = self
            .submods
            .get_mut(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))?;
        slot.change(id, candidate)?;
        debug!(target: "memora::module", slot = key, module = %id, "Bound submodule");
        Ok(self)
    }

    /// Lock every submodule, then this module
    ///
    /// # Errors
    ///
    /// `NotReadyError` naming the slots that are not ready; nothing is
    /// locked in that case.
    pub fn lock(&self, arena: &ModuleArena) -> Result<()> {
        if self.is_locked() {
            return Ok(());
        }
        let unready: BTreeSet<String> = self
            .submods
            .iter()
            .filter(|(_, slot)| !slot.ready(arena))
            .map(|(name, _)| name.clone())
            .collect();
        if !unready.is_empty() {
            return Err(Error::NotReadyError(NotSetReport {
                submodules: unready,
                ..Default::default()
            }));
        }
        for slot in self.submods.values() {
            slot.lock(arena)?;
        }
        if !self.locked.swap(true, Ordering::AcqRel) {
            debug!(target: "memora::module", module = %self.label(), uuid = %self.uuid, "Locked");
        }
        Ok(())
    }

    /// Call-time inputs built from the declared templates
    ///
    /// Each template is cloned, so checks and traits carry over, then
    /// bound to its value. Only the named inputs are returned.
    ///
    /// # Errors
    ///
    /// `KeyNotFound` for an undeclared input, or any error of
    /// [`FieldMetadata::change`].
    pub fn make_inputs<I, K>(&self, values: I) -> Result<InputMap>
    where
        I: IntoIterator<Item = (K, AnyValue)>,
        K: Into<String>,
    {
        let mut out = InputMap::new();
        for (key, value) in values {
            let key = key.into();
            let mut field = self
                .inputs
                .get(&key)
                .cloned()
                .ok_or_else(|| Error::KeyNotFound(key.clone()))?;
            field.change_any(value)?;
            out.insert(key, field);
        }
        Ok(out)
    }

    // ========================================================================
    // Running
    // ========================================================================

    /// Call-time inputs with the bound inputs filled in beneath them
    fn merge(&self, mut inputs: InputMap) -> InputMap {
        for (name, field) in &self.inputs {
            if field.has_value() && !inputs.contains_key(name) {
                inputs.insert(name.clone(), field.clone());
            }
        }
        inputs
    }

    /// Run the algorithm with call-time `inputs`
    ///
    /// Locks the module (and its submodules) on the way. A memoizable module
    /// whose merged state was seen before returns the stored result.
    ///
    /// # Errors
    ///
    /// - `NotReadyError` if the algorithm, a call-time input, a required
    ///   input or a submodule is missing
    /// - whatever the algorithm's compute returns
    pub fn run(&self, arena: &ModuleArena, inputs: InputMap) -> Result<Arc<ResultMap>> {
        let prototype = self.prototype.as_ref().ok_or_else(|| {
            Error::NotReadyError(NotSetReport {
                algorithm: true,
                ..Default::default()
            })
        })?;

        let unready: BTreeSet<String> = inputs
            .iter()
            .filter(|(_, field)| !field.ready())
            .map(|(name, _)| name.clone())
            .collect();
        if !unready.is_empty() {
            return Err(Error::NotReadyError(NotSetReport {
                inputs: unready,
                ..Default::default()
            }));
        }

        let merged = self.merge(inputs);
        let report = self.not_set(arena, &merged);
        if !report.is_empty() {
            return Err(Error::NotReadyError(report));
        }
        self.lock(arena)?;

        let started = Instant::now();
        let memoize = self.is_memoizable(arena);
        let digest = self.digest_merged(arena, &merged);

        if memoize {
            if let Some(hit) = self.cache.as_ref().and_then(|cache| cache.get(&digest)) {
                debug!(target: "memora::module", algorithm = %prototype.id(), digest = %digest, "Cache hit");
                self.record_run(started, true);
                return Ok(hit);
            }
        }

        debug!(target: "memora::module", algorithm = %prototype.id(), digest = %digest, memoize, "Computing");
        let results = prototype.compute(&merged, &Submodules::new(&self.submods, arena))?;
        let stored = match (&self.cache, memoize) {
            (Some(cache), true) => cache.cache(digest, results),
            _ => Arc::new(results),
        };
        self.record_run(started, false);
        Ok(stored)
    }

    fn record_run(&self, started: Instant, cache_hit: bool) {
        let mut stats = self.stats.lock();
        stats.runs += 1;
        if cache_hit {
            stats.cache_hits += 1;
        }
        stats.last_elapsed = Some(started.elapsed());
        stats.last_run_at = Some(Utc::now());
    }

    // ========================================================================
    // Hashing and memoization
    // ========================================================================

    fn hash_fields(&self, arena: &ModuleArena, fields: &InputMap, mut state: &mut dyn Hasher) {
        for (name, field) in fields {
            let transparent = field.is_transparent()
                || self.inputs.get(name).is_some_and(FieldMetadata::is_transparent);
            if !transparent {
                name.hash(&mut state);
                field.hash(state);
            }
        }
        for (name, slot) in &self.submods {
            name.hash(&mut state);
            slot.hash(arena, state);
        }
        if let Some(id) = self.algorithm_id() {
            id.as_str().hash(&mut state);
        }
    }

    /// Feed the bound state into `state`
    ///
    /// Covers opaque bound inputs, every submodule, and the algorithm
    /// identity.
    pub fn hash(&self, arena: &ModuleArena, state: &mut dyn Hasher) {
        self.hash_fields(arena, &self.inputs, state);
    }

    fn digest_merged(&self, arena: &ModuleArena, merged: &InputMap) -> String {
        let mut hasher = ModuleHasher::new();
        self.hash_fields(arena, merged, &mut hasher);
        hasher.finalize()
    }

    /// The cache key `run` would use for call-time `inputs`
    pub fn digest(&self, arena: &ModuleArena, inputs: &InputMap) -> String {
        self.digest_merged(arena, &self.merge(inputs.clone()))
    }

    /// Is a result for call-time `inputs` already cached?
    pub fn is_cached(&self, arena: &ModuleArena, inputs: &InputMap) -> bool {
        match &self.cache {
            Some(cache) => cache.contains(&self.digest(arena, inputs)),
            None => false,
        }
    }

    /// Clear the cache shared by every instance of this algorithm
    pub fn reset_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.reset();
        }
    }

    /// Bypass the cache when running
    pub fn turn_off_memoization(&mut self) {
        self.memoizable = false;
    }

    /// Use the cache when running
    pub fn turn_on_memoization(&mut self) {
        self.memoizable = true;
    }

    /// Is memoization on here and in every bound submodule?
    pub fn is_memoizable(&self, arena: &ModuleArena) -> bool {
        self.memoizable
            && self.submods.values().all(|slot| {
                slot.module_id()
                    .and_then(|id| arena.get(id).ok())
                    .map_or(true, |module| module.is_memoizable(arena))
            })
    }

    /// Statistics of this instance's runs
    pub fn stats(&self) -> RunStats {
        self.stats.lock().clone()
    }

    /// Last run time of this module and, indented, its submodules
    pub fn profile_info(&self, arena: &ModuleArena) -> String {
        let mut out = String::new();
        self.write_profile(arena, &self.label(), 0, &mut out);
        out
    }

    fn write_profile(&self, arena: &ModuleArena, label: &str, depth: usize, out: &mut String) {
        let stats = self.stats();
        let elapsed = match stats.last_elapsed {
            Some(d) => format!("{:?}", d),
            None => "not run".to_string(),
        };
        out.push_str(&format!(
            "{}{} : {} (runs: {}, cache hits: {})\n",
            "  ".repeat(depth),
            label,
            elapsed,
            stats.runs,
            stats.cache_hits
        ));
        for (name, slot) in &self.submods {
            if let Some(module) = slot.module_id().and_then(|id| arena.get(id).ok()) {
                module.write_profile(arena, name, depth + 1, out);
            }
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    fn label(&self) -> String {
        match self.algorithm_id() {
            Some(id) => id.to_string(),
            None => "<no algorithm>".to_string(),
        }
    }

    /// Does the algorithm implement `contract`?
    pub fn satisfies(&self, contract: &ContractId) -> bool {
        self.prototype
            .as_ref()
            .is_some_and(|prototype| prototype.satisfies(contract))
    }

    /// Bound inputs
    pub fn inputs(&self) -> &InputMap {
        &self.inputs
    }

    /// Declared results
    pub fn results(&self) -> &ResultMap {
        &self.results
    }

    /// Submodule slots
    pub fn submods(&self) -> &BTreeMap<String, SubmoduleSlot> {
        &self.submods
    }

    /// Algorithm description
    pub fn description(&self) -> Option<&str> {
        self.prototype
            .as_ref()
            .and_then(|prototype| prototype.schema().description())
    }

    /// References to cite for the algorithm
    pub fn citations(&self) -> &[String] {
        match &self.prototype {
            Some(prototype) => prototype.schema().citations(),
            None => &[],
        }
    }

    /// Algorithm identity, if an algorithm is wrapped
    pub fn algorithm_id(&self) -> Option<&AlgorithmId> {
        self.prototype.as_ref().map(|prototype| prototype.id())
    }

    /// Is an algorithm wrapped?
    pub fn has_algorithm(&self) -> bool {
        self.prototype.is_some()
    }

    /// Value equality, following submodule bindings into `arena`
    ///
    /// `==` compares slots by the handle they hold. Here the bound modules
    /// are compared themselves, so instances bound to equal copies of a
    /// module are equal.
    pub fn eq_in(&self, other: &Self, arena: &ModuleArena) -> bool {
        self.algorithm_id() == other.algorithm_id()
            && self.inputs == other.inputs
            && self.is_locked() == other.is_locked()
            && self.submods.len() == other.submods.len()
            && self
                .submods
                .iter()
                .zip(&other.submods)
                .all(|((lname, lslot), (rname, rslot))| lname == rname && lslot.eq_in(rslot, arena))
    }

    /// Is the module locked?
    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// The shared cache, if an algorithm is wrapped
    pub fn cache(&self) -> Option<&Arc<MemoizationCache>> {
        self.cache.as_ref()
    }
}

/// Equality with submodules compared by handle; see [`ModuleInstance::eq_in`]
impl PartialEq for ModuleInstance {
    fn eq(&self, other: &Self) -> bool {
        self.algorithm_id() == other.algorithm_id()
            && self.inputs == other.inputs
            && self.submods == other.submods
            && self.is_locked() == other.is_locked()
    }
}

impl fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("uuid", &self.uuid)
            .field("algorithm", &self.algorithm_id())
            .field("inputs", &self.inputs)
            .field("submods", &self.submods)
            .field("locked", &self.is_locked())
            .field("memoizable", &self.memoizable)
            .finish()
    }
}
