//! Standard library
//!
//! Registers the CEL standard function set into a `FunctionRegistry`:
//! arithmetic, comparisons, string and bytes helpers, container
//! membership, type conversions, and temporal accessors. Overload ids
//! follow the `<op>_<kinds>` convention (`add_int64`, `contains_string`)
//! so checkers can pre-resolve call sites.

pub mod arithmetic;
pub mod comparisons;
pub mod containers;
pub mod conversions;
pub mod strings;
pub mod temporal;

use cel_core::{
    CelError, FunctionContext, FunctionRegistry, Kind, Overload, ParamKind, Value,
};
use cel_planner::operators;

/// Shorthand for an exact parameter kind.
pub(crate) fn x(kind: Kind) -> ParamKind {
    ParamKind::Exact(kind)
}

pub(crate) fn dyn_() -> ParamKind {
    ParamKind::Dyn
}

/// Register one overload, panicking on id collisions (a programming
/// error in the table below, not a runtime condition).
pub(crate) fn add(
    reg: &mut FunctionRegistry,
    function: &str,
    id: &str,
    receiver: bool,
    params: Vec<ParamKind>,
    result: ParamKind,
    f: impl Fn(&[Value], &FunctionContext<'_>) -> Value + Send + Sync + 'static,
) -> Result<(), CelError> {
    reg.register(Overload::new(function, id, receiver, params, result, f))
}

/// Build a registry with the full standard library.
pub fn standard_registry() -> FunctionRegistry {
    let mut reg = FunctionRegistry::new();
    register_standard_functions(&mut reg).expect("standard library ids are unique");
    reg
}

/// Register the standard function set into an existing registry.
pub fn register_standard_functions(reg: &mut FunctionRegistry) -> Result<(), CelError> {
    arithmetic::register(reg)?;
    comparisons::register(reg)?;
    strings::register(reg)?;
    containers::register(reg)?;
    conversions::register(reg)?;
    temporal::register(reg)?;

    // Comprehension guard for the exists/all macro expansions. The
    // evaluator treats this name as an operator; the registry entry
    // covers direct calls and plan-time folding.
    add(
        reg,
        operators::NOT_STRICTLY_FALSE,
        "not_strictly_false",
        false,
        vec![dyn_()],
        x(Kind::Bool),
        |args, _| match args[0] {
            Value::Bool(false) => Value::Bool(false),
            _ => Value::Bool(true),
        },
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry_builds() {
        let reg = standard_registry();
        for function in [
            "_+_", "_-_", "_*_", "_/_", "_%_", "-_", "!_", "_==_", "_!=_", "_<_", "_<=_",
            "_>_", "_>=_", "_in_", "size", "contains", "startsWith", "endsWith", "matches",
            "int", "uint", "double", "string", "bytes", "bool", "type", "dyn", "duration",
            "timestamp", "getFullYear", "getHours",
        ] {
            assert!(reg.has_function(function), "missing stdlib function {}", function);
        }
    }
}
