//! CEL-level error values
//!
//! Errors here are *values*: they travel on the evaluator's stack and
//! propagate through operators instead of unwinding. Fatal host-level
//! failures (plan errors, budget exhaustion) live in the planner and
//! runtime crates and are returned out-of-band.

use crate::value::Kind;
use std::fmt;

/// Classification of a CEL error value.
///
/// The kind is part of the observable result: hosts match on it to decide
/// whether a policy failure is a missing input, a bad conversion, etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A referenced variable was not found in the activation
    NoSuchAttribute,
    /// A record field access named a field the type does not have
    NoSuchField,
    /// A map index named a key the map does not contain
    NoSuchKey,
    /// A function exists but no overload accepts the argument kinds
    NoSuchOverload,
    /// No candidate overload survived resolution (iteration ranges, loop conditions)
    NoMatchingOverload,
    /// A value could not be converted to the requested type
    TypeConversion,
    /// Integer or temporal arithmetic left the representable range
    Overflow,
    /// Integer division or modulo by zero
    DivisionByZero,
    /// A structurally invalid argument (duplicate map key, bad field value)
    InvalidArgument,
    /// An attribute matched a missing-attribute pattern
    Missing,
    /// A comprehension exceeded the configured iteration budget
    IterationLimit,
    /// The evaluation deadline passed
    Cancelled,
    /// An internal invariant failed
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NoSuchAttribute => "no_such_attribute",
            ErrorKind::NoSuchField => "no_such_field",
            ErrorKind::NoSuchKey => "no_such_key",
            ErrorKind::NoSuchOverload => "no_such_overload",
            ErrorKind::NoMatchingOverload => "no_matching_overload",
            ErrorKind::TypeConversion => "type_conversion",
            ErrorKind::Overflow => "overflow",
            ErrorKind::DivisionByZero => "division_by_zero",
            ErrorKind::InvalidArgument => "invalid_argument",
            ErrorKind::Missing => "missing_attribute",
            ErrorKind::IterationLimit => "iteration_limit",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A CEL error value: kind plus a human-readable message.
///
/// Equality includes the message so that first-error-wins propagation is
/// observable in tests.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CelError {
    pub kind: ErrorKind,
    pub message: String,
}

impl CelError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        CelError {
            kind,
            message: message.into(),
        }
    }

    /// Variable lookup failed in the activation
    pub fn no_such_attribute(name: &str) -> Self {
        CelError::new(
            ErrorKind::NoSuchAttribute,
            format!("undeclared reference to '{}'", name),
        )
    }

    /// Field access named an unknown field
    pub fn no_such_field(field: &str) -> Self {
        CelError::new(ErrorKind::NoSuchField, format!("no_such_field '{}'", field))
    }

    /// Map lookup missed
    pub fn no_such_key(key: &str) -> Self {
        CelError::new(ErrorKind::NoSuchKey, format!("no such key: {}", key))
    }

    /// A function call had no overload for the given argument kinds
    pub fn no_such_overload(function: &str, arg_kinds: &[Kind]) -> Self {
        let kinds: Vec<&str> = arg_kinds.iter().map(Kind::as_str).collect();
        CelError::new(
            ErrorKind::NoSuchOverload,
            format!("no such overload: {}({})", function, kinds.join(", ")),
        )
    }

    /// Overload resolution found no candidate for a synthetic call site
    /// such as `<iter-range>` or `<loop-condition>`
    pub fn no_matching_overload(site: &str) -> Self {
        CelError::new(
            ErrorKind::NoMatchingOverload,
            format!("no matching overload for {}", site),
        )
    }

    pub fn type_conversion(message: impl Into<String>) -> Self {
        CelError::new(ErrorKind::TypeConversion, message)
    }

    pub fn overflow(operation: &str) -> Self {
        CelError::new(ErrorKind::Overflow, format!("{}: overflow", operation))
    }

    pub fn division_by_zero() -> Self {
        CelError::new(ErrorKind::DivisionByZero, "division by zero")
    }

    pub fn modulus_by_zero() -> Self {
        CelError::new(ErrorKind::DivisionByZero, "modulus by zero")
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        CelError::new(ErrorKind::InvalidArgument, message)
    }

    /// Access to an attribute marked missing by the activation
    pub fn missing_attribute(attribute: &str) -> Self {
        CelError::new(
            ErrorKind::Missing,
            format!("MissingAttributeError: {}", attribute),
        )
    }

    pub fn iteration_limit(limit: u32) -> Self {
        CelError::new(
            ErrorKind::IterationLimit,
            format!("iteration budget exceeded: {}", limit),
        )
    }

    pub fn cancelled() -> Self {
        CelError::new(ErrorKind::Cancelled, "evaluation deadline exceeded")
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CelError::new(ErrorKind::Internal, message)
    }
}

impl fmt::Display for CelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CelError {}
