//! Typed input/result fields
//!
//! A `FieldMetadata` wraps an [`AnyValue`] with the metadata a module
//! declares for one of its inputs or results:
//! - a value type, set exactly once before any value is bound
//! - named validity checks (the type check is added automatically)
//! - the `optional` trait (module may run without a value)
//! - the `transparent` trait (value excluded from memoization hashing)
//!
//! ## Invariants
//!
//! - A bound value satisfies every registered check
//! - `ready()` is `optional || has_value()`
//! - A rejected `change` leaves the previous value in place

use crate::any::{AnyValue, Storable};
use crate::bounds::BoundsCheck;
use crate::error::{Error, Result};
use crate::types::TypeInfo;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::Hasher;
use std::sync::Arc;

/// Type-erased validity predicate
pub type CheckFn = Arc<dyn Fn(&AnyValue) -> bool + Send + Sync>;

/// Named input fields of a module
pub type InputMap = BTreeMap<String, FieldMetadata>;

/// Named result fields produced by a module
pub type ResultMap = BTreeMap<String, FieldMetadata>;

/// Whether a field is consumed or produced by a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// Consumed by the algorithm
    Input,
    /// Produced by the algorithm
    Result,
}

/// Typed wrapper around a module input or result
#[derive(Clone)]
pub struct FieldMetadata {
    kind: FieldKind,
    description: Option<String>,
    value_type: Option<TypeInfo>,
    checks: Vec<(String, CheckFn)>,
    value: AnyValue,
    optional: bool,
    transparent: bool,
}

impl FieldMetadata {
    fn with_kind(kind: FieldKind) -> Self {
        Self {
            kind,
            description: None,
            value_type: None,
            checks: Vec::new(),
            value: AnyValue::empty(),
            optional: false,
            transparent: false,
        }
    }

    /// An untyped input field
    pub fn input() -> Self {
        Self::with_kind(FieldKind::Input)
    }

    /// An untyped result field
    pub fn result() -> Self {
        Self::with_kind(FieldKind::Result)
    }

    /// An input field whose type is already `T`
    pub fn typed_input<T: Storable>() -> Self {
        let mut field = Self::input();
        field.install_type::<T>();
        field
    }

    /// A result field whose type is already `T`
    pub fn typed_result<T: Storable>() -> Self {
        let mut field = Self::result();
        field.install_type::<T>();
        field
    }

    /// A result field of type `T` bound to `value`
    pub fn result_of<T: Storable>(value: T) -> Self {
        let mut field = Self::typed_result::<T>();
        field.value = AnyValue::new(value);
        field
    }

    /// Set the description, builder style
    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Mark optional, builder style
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Mark transparent, builder style
    pub fn transparent(mut self) -> Self {
        self.transparent = true;
        self
    }

    /// Bind a default value, builder style
    pub fn with_default<T: Storable>(mut self, value: T) -> Result<Self> {
        self.change(value)?;
        Ok(self)
    }

    /// Establish the value type
    ///
    /// Also registers the automatic type check.
    ///
    /// # Errors
    ///
    /// `DoubleTypeSet` if a type was already set.
    pub fn set_type<T: Storable>(&mut self) -> Result<&mut Self> {
        if let Some(existing) = self.value_type {
            return Err(Error::DoubleTypeSet(format!(
                "field already has type {}, cannot set {}",
                existing,
                std::any::type_name::<T>()
            )));
        }
        self.install_type::<T>();
        Ok(self)
    }

    fn install_type<T: Storable>(&mut self) {
        let info = TypeInfo::of::<T>();
        let type_check: CheckFn = Arc::new(|v: &AnyValue| v.is_convertible::<T>());
        self.value_type = Some(info);
        self.checks.push((format!("Type == {}", info.name()), type_check));
    }

    /// Add a typed validity check
    ///
    /// Values of any other type fail the check. An empty `desc` is replaced
    /// with a generated one.
    ///
    /// # Errors
    ///
    /// `InvalidValue` if the currently bound value fails `predicate`; the
    /// check is not registered in that case.
    pub fn add_check<T, F>(&mut self, predicate: F, desc: impl Into<String>) -> Result<&mut Self>
    where
        T: Storable,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let check: CheckFn =
            Arc::new(move |v: &AnyValue| v.cast::<T>().map(|x| predicate(x)).unwrap_or(false));
        self.add_any_check(check, desc)
    }

    /// Add a check over the erased value
    pub fn add_any_check(&mut self, check: CheckFn, desc: impl Into<String>) -> Result<&mut Self> {
        let mut desc = desc.into();
        if desc.is_empty() {
            desc = format!("Check #{}", self.checks.len());
        }
        if self.value.has_value() && !check(&self.value) {
            return Err(Error::InvalidValue(format!(
                "bound value {} fails new check '{}'",
                self.value, desc
            )));
        }
        self.checks.push((desc, check));
        Ok(self)
    }

    /// Add a [`BoundsCheck`], named by its own description
    pub fn add_bounds<T, B>(&mut self, bounds: B) -> Result<&mut Self>
    where
        T: Storable,
        B: BoundsCheck<T>,
    {
        let desc = bounds.describe();
        self.add_check(move |v: &T| bounds.check(v), desc)
    }

    /// Would `value` pass every check?
    ///
    /// # Errors
    ///
    /// `TypeNotSet` if no type was established.
    pub fn is_valid(&self, value: &AnyValue) -> Result<bool> {
        self.assert_type()?;
        Ok(self.first_failed(value).is_none())
    }

    fn first_failed(&self, value: &AnyValue) -> Option<&str> {
        self.checks
            .iter()
            .find(|(_, check)| !check(value))
            .map(|(desc, _)| desc.as_str())
    }

    fn assert_type(&self) -> Result<()> {
        if self.value_type.is_none() {
            return Err(Error::TypeNotSet("field type must be set before binding a value".into()));
        }
        Ok(())
    }

    /// Bind `value`
    ///
    /// # Errors
    ///
    /// - `TypeNotSet` if no type was established
    /// - `InvalidValue` if any check rejects the value (prior value retained)
    pub fn change<T: Storable>(&mut self, value: T) -> Result<&mut Self> {
        self.change_any(AnyValue::new(value))
    }

    /// Bind an already erased value; same rules as [`FieldMetadata::change`]
    pub fn change_any(&mut self, value: AnyValue) -> Result<&mut Self> {
        self.assert_type()?;
        if let Some(desc) = self.first_failed(&value) {
            return Err(Error::InvalidValue(format!(
                "{} fails check '{}'",
                value, desc
            )));
        }
        self.value = value;
        Ok(self)
    }

    /// Read the bound value
    ///
    /// # Errors
    ///
    /// `NotBound` if unset, otherwise as [`AnyValue::cast`].
    pub fn value<T: Storable>(&self) -> Result<&T> {
        if !self.value.has_value() {
            return Err(Error::NotBound);
        }
        self.value.cast::<T>()
    }

    /// The erased bound value (empty if unset)
    pub fn any_value(&self) -> &AnyValue {
        &self.value
    }

    /// The module may run without a value
    pub fn make_optional(&mut self) -> &mut Self {
        self.optional = true;
        self
    }

    /// The module needs a value to run
    pub fn make_required(&mut self) -> &mut Self {
        self.optional = false;
        self
    }

    /// Exclude the value from memoization hashing
    pub fn make_transparent(&mut self) -> &mut Self {
        self.transparent = true;
        self
    }

    /// Include the value in memoization hashing
    pub fn make_opaque(&mut self) -> &mut Self {
        self.transparent = false;
        self
    }

    /// Set the human-readable description
    pub fn set_description(&mut self, desc: impl Into<String>) -> &mut Self {
        self.description = Some(desc.into());
        self
    }

    /// Optional fields, or bound ones, are ready
    pub fn ready(&self) -> bool {
        self.optional || self.value.has_value()
    }

    /// Feed the bound value into `state` if this field is opaque
    pub fn hash(&self, state: &mut dyn Hasher) {
        if !self.transparent {
            self.value.hash(state);
        }
    }

    /// Input or result
    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Is a value bound?
    pub fn has_value(&self) -> bool {
        self.value.has_value()
    }

    /// Has the type been established?
    pub fn has_type(&self) -> bool {
        self.value_type.is_some()
    }

    /// The established type
    pub fn type_info(&self) -> Option<TypeInfo> {
        self.value_type
    }

    /// Is a description set?
    pub fn has_description(&self) -> bool {
        self.description.is_some()
    }

    /// The description, if set
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Is the field optional?
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Is the field transparent?
    pub fn is_transparent(&self) -> bool {
        self.transparent
    }

    /// Descriptions of every registered check, in registration order
    pub fn check_descriptions(&self) -> Vec<&str> {
        self.checks.iter().map(|(desc, _)| desc.as_str()).collect()
    }
}

// Checks are closures and are not compared
impl PartialEq for FieldMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.value_type == other.value_type
            && self.description == other.description
            && self.optional == other.optional
            && self.transparent == other.transparent
            && self.value == other.value
    }
}

impl fmt::Debug for FieldMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMetadata")
            .field("kind", &self.kind)
            .field("type", &self.value_type.map(|t| t.name()))
            .field("value", &self.value)
            .field("optional", &self.optional)
            .field("transparent", &self.transparent)
            .field("checks", &self.check_descriptions())
            .finish()
    }
}
