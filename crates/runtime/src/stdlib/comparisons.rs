//! Equality and ordering operators
//!
//! Equality is total over values and honors the heterogeneous-equality
//! option: `1 == 1u == 1.0` when enabled, cross-numeric false otherwise.
//! Ordering is defined per kind plus the six cross-numeric pairs, which
//! only engage under heterogeneous equality. Comparisons involving NaN
//! are false, never errors.

use super::{add, dyn_, x};
use cel_core::{
    CelError, FunctionContext, FunctionRegistry, Kind, Value, numeric_compare,
};
use cel_planner::operators;
use std::cmp::Ordering;

/// Total order for one comparable kind pair; None only for NaN.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bytes(a), Value::Bytes(b)) => Some(a.cmp(b)),
        (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        _ => numeric_compare(left, right),
    }
}

fn ordering_overload(
    reg: &mut FunctionRegistry,
    function: &'static str,
    id: String,
    kinds: (Kind, Kind),
    cross_numeric: bool,
    pred: fn(Ordering) -> bool,
) -> Result<(), CelError> {
    add(
        reg,
        function,
        &id,
        false,
        vec![x(kinds.0), x(kinds.1)],
        x(Kind::Bool),
        move |args, ctx| {
            if cross_numeric && !ctx.hetero {
                return Value::error(CelError::no_such_overload(
                    function,
                    &[args[0].kind(), args[1].kind()],
                ));
            }
            match compare(&args[0], &args[1]) {
                Some(ordering) => Value::Bool(pred(ordering)),
                // NaN compares false against everything
                None => Value::Bool(false),
            }
        },
    )
}

pub fn register(reg: &mut FunctionRegistry) -> Result<(), CelError> {
    use Kind::*;

    add(reg, operators::EQUALS, "equals", false, vec![dyn_(), dyn_()], x(Bool), |args, ctx| {
        Value::Bool(args[0].equals(&args[1], ctx.hetero))
    })?;
    add(reg, operators::NOT_EQUALS, "not_equals", false, vec![dyn_(), dyn_()], x(Bool), |args, ctx| {
        Value::Bool(!args[0].equals(&args[1], ctx.hetero))
    })?;

    let same_kind: [(Kind, &str); 8] = [
        (Bool, "bool"),
        (Int, "int64"),
        (Uint, "uint64"),
        (Double, "double"),
        (String, "string"),
        (Bytes, "bytes"),
        (Duration, "duration"),
        (Timestamp, "timestamp"),
    ];
    let cross_numeric: [(Kind, Kind, &str); 6] = [
        (Int, Uint, "int64_uint64"),
        (Int, Double, "int64_double"),
        (Uint, Int, "uint64_int64"),
        (Uint, Double, "uint64_double"),
        (Double, Int, "double_int64"),
        (Double, Uint, "double_uint64"),
    ];
    let ops: [(&'static str, &str, fn(Ordering) -> bool); 4] = [
        (operators::LESS, "less", |o| o == Ordering::Less),
        (operators::LESS_EQUALS, "less_equals", |o| o != Ordering::Greater),
        (operators::GREATER, "greater", |o| o == Ordering::Greater),
        (operators::GREATER_EQUALS, "greater_equals", |o| o != Ordering::Less),
    ];

    for (function, prefix, pred) in ops {
        for (kind, suffix) in same_kind {
            ordering_overload(
                reg,
                function,
                format!("{}_{}", prefix, suffix),
                (kind, kind),
                false,
                pred,
            )?;
        }
        for (left, right, suffix) in cross_numeric {
            ordering_overload(
                reg,
                function,
                format!("{}_{}", prefix, suffix),
                (left, right),
                true,
                pred,
            )?;
        }
    }
    Ok(())
}
