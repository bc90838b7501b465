//! Reusable bounds checks for input fields
//!
//! Each check renders its own description, which becomes the check's name
//! when added through [`FieldMetadata::add_bounds`](crate::FieldMetadata::add_bounds).
//!
//! ```rust
//! use memora_core::bounds::{BoundsCheck, GreaterThan, InRange};
//!
//! assert!(GreaterThan(0).check(&3));
//! assert_eq!(InRange::new(0, 10).describe(), "in [0, 10)");
//! ```

use std::fmt::Display;

/// A predicate over `T` with a printable description
pub trait BoundsCheck<T>: Send + Sync + 'static {
    /// Does `value` satisfy the bound?
    fn check(&self, value: &T) -> bool;

    /// Human-readable form, e.g. `"> 0"`
    fn describe(&self) -> String;
}

macro_rules! compare_to {
    ($(#[$doc:meta])* $name:ident, $op:tt, $sym:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub struct $name<T>(pub T);

        impl<T> BoundsCheck<T> for $name<T>
        where
            T: PartialOrd + Display + Send + Sync + 'static,
        {
            fn check(&self, value: &T) -> bool {
                *value $op self.0
            }

            fn describe(&self) -> String {
                format!("{} {}", $sym, self.0)
            }
        }
    };
}

compare_to!(
    /// Value must be strictly greater than the bound
    GreaterThan, >, ">"
);
compare_to!(
    /// Value must be strictly less than the bound
    LessThan, <, "<"
);
compare_to!(
    /// Value must be greater than or equal to the bound
    GreaterThanEqualTo, >=, ">="
);
compare_to!(
    /// Value must be less than or equal to the bound
    LessThanEqualTo, <=, "<="
);
compare_to!(
    /// Value must differ from the bound
    NotEqualTo, !=, "!="
);

/// Value must lie in the half-open range `[low, high)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InRange<T> {
    low: T,
    high: T,
}

impl<T> InRange<T> {
    /// Range `[low, high)`
    pub fn new(low: T, high: T) -> Self {
        Self { low, high }
    }
}

impl<T> BoundsCheck<T> for InRange<T>
where
    T: PartialOrd + Display + Send + Sync + 'static,
{
    fn check(&self, value: &T) -> bool {
        self.low <= *value && *value < self.high
    }

    fn describe(&self) -> String {
        format!("in [{}, {})", self.low, self.high)
    }
}
