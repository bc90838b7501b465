//! Type-erased value container
//!
//! `AnyValue` holds at most one value of an arbitrary type. The erased value
//! lives behind a private trait implemented by a generic wrapper, which
//! carries the per-type clone, equality, hashing and rendering operations.
//! Downcasts compare the stored `TypeId` before granting access; there is no
//! widening to related types.
//!
//! ## Type Rules
//!
//! - Different held types are NEVER equal, even if the values look the same
//! - Two empty containers are equal; empty vs non-empty is not
//! - Hashing an empty container feeds nothing
//! - Hashing feeds the held type's name before the value

use crate::error::{Error, Result};
use crate::types::TypeInfo;
use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Bounds required of a type stored in an [`AnyValue`]
///
/// Blanket-implemented; there is nothing to implement by hand.
pub trait Storable: Any + Clone + PartialEq + Hash + fmt::Debug + Send + Sync {}

impl<T> Storable for T where T: Any + Clone + PartialEq + Hash + fmt::Debug + Send + Sync {}

/// Operations every erased value exposes
trait ErasedValue: Send + Sync {
    fn type_info(&self) -> TypeInfo;
    fn clone_box(&self) -> Box<dyn ErasedValue>;
    fn eq_dyn(&self, other: &dyn ErasedValue) -> bool;
    fn hash_dyn(&self, state: &mut dyn Hasher);
    fn render(&self) -> String;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

struct Wrapper<T>(T);

impl<T: Storable> ErasedValue for Wrapper<T> {
    fn type_info(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }

    fn clone_box(&self) -> Box<dyn ErasedValue> {
        Box::new(Wrapper(self.0.clone()))
    }

    fn eq_dyn(&self, other: &dyn ErasedValue) -> bool {
        // Mismatched types compare unequal rather than failing
        match other.as_any().downcast_ref::<Wrapper<T>>() {
            Some(rhs) => self.0 == rhs.0,
            None => false,
        }
    }

    fn hash_dyn(&self, mut state: &mut dyn Hasher) {
        // Equal bytes of different types must not collide
        std::any::type_name::<T>().hash(&mut state);
        self.0.hash(&mut state);
    }

    fn render(&self) -> String {
        format!("{:?}", self.0)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl Clone for Box<dyn ErasedValue> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Type-erased, cloneable, hashable, comparable box for a single value
#[derive(Clone, Default)]
pub struct AnyValue {
    value: Option<Box<dyn ErasedValue>>,
}

impl AnyValue {
    /// Create a container holding `value`
    pub fn new<T: Storable>(value: T) -> Self {
        Self {
            value: Some(Box::new(Wrapper(value))),
        }
    }

    /// Create an empty container
    pub fn empty() -> Self {
        Self { value: None }
    }

    /// Replace whatever is held with `value`
    ///
    /// The held type becomes `T` regardless of the previous type.
    pub fn emplace<T: Storable>(&mut self, value: T) {
        self.value = Some(Box::new(Wrapper(value)));
    }

    /// Drop the held value, leaving the container empty
    pub fn reset(&mut self) {
        self.value = None;
    }

    /// Is a value held?
    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Identity of the held type, or `TypeInfo::void()` when empty
    pub fn type_info(&self) -> TypeInfo {
        self.value
            .as_ref()
            .map(|v| v.type_info())
            .unwrap_or_else(TypeInfo::void)
    }

    /// Name of the held type (`"()"` when empty)
    pub fn type_name(&self) -> &'static str {
        self.type_info().name()
    }

    /// Read-only access to the held value
    ///
    /// # Errors
    ///
    /// - `EmptyValue` if nothing is held
    /// - `TypeMismatch` if the held type is not exactly `T`
    pub fn cast<T: Storable>(&self) -> Result<&T> {
        let value = self.value.as_ref().ok_or(Error::EmptyValue)?;
        value
            .as_any()
            .downcast_ref::<Wrapper<T>>()
            .map(|w| &w.0)
            .ok_or_else(|| Self::mismatch::<T>(value.type_info()))
    }

    /// Mutable access to the held value
    ///
    /// Same failure modes as [`AnyValue::cast`].
    pub fn cast_mut<T: Storable>(&mut self) -> Result<&mut T> {
        let value = self.value.as_mut().ok_or(Error::EmptyValue)?;
        let actual = value.type_info();
        value
            .as_any_mut()
            .downcast_mut::<Wrapper<T>>()
            .map(|w| &mut w.0)
            .ok_or_else(|| Self::mismatch::<T>(actual))
    }

    /// Move the held value out, leaving the container consumed
    pub fn into_inner<T: Storable>(self) -> Result<T> {
        let value = self.value.ok_or(Error::EmptyValue)?;
        let actual = value.type_info();
        value
            .into_any()
            .downcast::<Wrapper<T>>()
            .map(|w| w.0)
            .map_err(|_| Self::mismatch::<T>(actual))
    }

    /// Would `cast::<T>()` succeed?
    pub fn is_convertible<T: Storable>(&self) -> bool {
        self.value
            .as_ref()
            .map(|v| v.as_any().is::<Wrapper<T>>())
            .unwrap_or(false)
    }

    /// Exchange contents with `other`
    pub fn swap(&mut self, other: &mut AnyValue) {
        std::mem::swap(&mut self.value, &mut other.value);
    }

    /// Human-readable rendering of the held value
    ///
    /// Uses the held type's `Debug` form; `"<empty>"` when nothing is held.
    pub fn str(&self) -> String {
        match &self.value {
            Some(v) => v.render(),
            None => "<empty>".to_string(),
        }
    }

    /// Feed the held value into `state`; no-op when empty
    pub fn hash(&self, state: &mut dyn Hasher) {
        if let Some(v) = &self.value {
            v.hash_dyn(state);
        }
    }

    fn mismatch<T: 'static>(actual: TypeInfo) -> Error {
        Error::TypeMismatch {
            expected: std::any::type_name::<T>().to_string(),
            actual: actual.name().to_string(),
        }
    }
}

impl PartialEq for AnyValue {
    fn eq(&self, other: &Self) -> bool {
        match (&self.value, &other.value) {
            (None, None) => true,
            (Some(lhs), Some(rhs)) => lhs.eq_dyn(rhs.as_ref()),
            _ => false,
        }
    }
}

impl fmt::Debug for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(v) => write!(f, "AnyValue<{}>({})", v.type_info().name(), v.render()),
            None => f.write_str("AnyValue(<empty>)"),
        }
    }
}

impl fmt::Display for AnyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.str())
    }
}
