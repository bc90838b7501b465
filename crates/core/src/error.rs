//! Error types for Memora
//!
//! This module defines every error raised by the runtime. Errors are raised
//! at the point of detection and surfaced unmodified; nothing in the core
//! retries or degrades silently.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.

use crate::types::NotSetReport;
use thiserror::Error;

/// Result type alias for Memora operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the module runtime
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A value was requested from an empty `AnyValue`
    #[error("Empty value: no value is stored")]
    EmptyValue,

    /// The stored type differs from the requested one
    #[error("Type mismatch: expected {expected}, stored {actual}")]
    TypeMismatch {
        /// Type that was requested
        expected: String,
        /// Type that is actually held
        actual: String,
    },

    /// The type of a field or slot was set a second time
    #[error("Type already set: {0}")]
    DoubleTypeSet(String),

    /// A value was bound before the type was established
    #[error("Type not set: {0}")]
    TypeNotSet(String),

    /// A value failed a validity check
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A field was read before a value was bound
    #[error("Field is not bound to a value")]
    NotBound,

    /// A module was bound to a slot whose contract it does not implement
    #[error("Module {module} does not satisfy contract {contract}")]
    ModuleDoesNotSatisfyContract {
        /// Algorithm identity of the rejected module
        module: String,
        /// Contract the slot requires
        contract: String,
    },

    /// Mutation attempted on a locked module
    #[error("Module is locked: {0}")]
    LockedModuleError(String),

    /// A module or submodule is missing required state
    #[error("Module is not ready: {0}")]
    NotReadyError(NotSetReport),

    /// Key already in use (or empty)
    #[error("Duplicate key: {0:?}")]
    DuplicateKey(String),

    /// Key not present
    #[error("Key not found: {0:?}")]
    KeyNotFound(String),

    /// Resolving or binding submodules would make a module depend on itself
    #[error("Cyclic submodule dependency: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    /// An algorithm's compute function failed
    #[error("Algorithm {algorithm} failed: {reason}")]
    AlgorithmFailed {
        /// Algorithm identity
        algorithm: String,
        /// Failure description
        reason: String,
    },

    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an `AlgorithmFailed` error
    pub fn algorithm_failed(algorithm: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::AlgorithmFailed {
            algorithm: algorithm.into(),
            reason: reason.into(),
        }
    }

    /// Returns the not-set report carried by a `NotReadyError`
    pub fn not_set_report(&self) -> Option<&NotSetReport> {
        match self {
            Error::NotReadyError(report) => Some(report),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_type_mismatch() {
        let err = Error::TypeMismatch {
            expected: "i64".to_string(),
            actual: "alloc::string::String".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Type mismatch"));
        assert!(msg.contains("i64"));
        assert!(msg.contains("String"));
    }

    #[test]
    fn test_error_display_not_ready_lists_missing() {
        let mut report = NotSetReport::default();
        report.inputs.insert("charge".to_string());
        report.submodules.insert("force".to_string());
        let msg = Error::NotReadyError(report).to_string();
        assert!(msg.contains("charge"));
        assert!(msg.contains("force"));
    }

    #[test]
    fn test_error_display_cyclic_dependency() {
        let err = Error::CyclicDependency(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "Cyclic submodule dependency: a -> b -> a");
    }

    #[test]
    fn test_not_set_report_accessor() {
        let report = NotSetReport {
            algorithm: true,
            ..Default::default()
        };
        let err = Error::NotReadyError(report.clone());
        assert_eq!(err.not_set_report(), Some(&report));
        assert_eq!(Error::NotBound.not_set_report(), None);
    }

    #[test]
    fn test_error_pattern_matching() {
        let err = Error::algorithm_failed("Rescale", "division by zero");
        match err {
            Error::AlgorithmFailed { algorithm, reason } => {
                assert_eq!(algorithm, "Rescale");
                assert_eq!(reason, "division by zero");
            }
            _ => panic!("Wrong error variant"),
        }
    }
}
