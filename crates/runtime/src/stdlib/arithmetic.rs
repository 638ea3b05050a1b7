//! Arithmetic operators
//!
//! Int/Uint arithmetic is checked: overflow and division by zero are CEL
//! error values. Double arithmetic is plain IEEE-754; NaN and infinities
//! flow through without errors. Addition doubles as concatenation for
//! strings, bytes, and lists, and as checked arithmetic for temporal
//! values.

use super::{add, x};
use cel_core::{
    CelBytes, CelError, CelString, FunctionContext, FunctionRegistry, Kind, StringBacking, Value,
};
use cel_planner::operators;

fn int2(args: &[Value]) -> (i64, i64) {
    (args[0].as_int().unwrap(), args[1].as_int().unwrap())
}

fn uint2(args: &[Value]) -> (u64, u64) {
    (args[0].as_uint().unwrap(), args[1].as_uint().unwrap())
}

fn double2(args: &[Value]) -> (f64, f64) {
    (args[0].as_double().unwrap(), args[1].as_double().unwrap())
}

fn checked_int(op: &'static str, result: Option<i64>) -> Value {
    match result {
        Some(v) => Value::Int(v),
        None => Value::error(CelError::overflow(op)),
    }
}

fn checked_uint(op: &'static str, result: Option<u64>) -> Value {
    match result {
        Some(v) => Value::Uint(v),
        None => Value::error(CelError::overflow(op)),
    }
}

fn from_temporal<T>(result: Result<T, CelError>, wrap: impl Fn(T) -> Value) -> Value {
    match result {
        Ok(v) => wrap(v),
        Err(e) => Value::error(e),
    }
}

/// String concatenation honors the configured backing: contiguous builds
/// one shared allocation through the arena-backed allocator, chunked
/// shares both operands' chunks.
pub(crate) fn concat_strings(a: &CelString, b: &CelString, ctx: &FunctionContext<'_>) -> CelString {
    match ctx.string_backing {
        StringBacking::Chunked => a.concat(b, StringBacking::Chunked),
        StringBacking::Contiguous => {
            let a = a.as_cow();
            let b = b.as_cow();
            CelString::new(ctx.alloc.concat_str(&[&a, &b]))
        }
    }
}

fn concat_bytes(a: &CelBytes, b: &CelBytes, ctx: &FunctionContext<'_>) -> CelBytes {
    match ctx.string_backing {
        StringBacking::Chunked => a.concat(b, StringBacking::Chunked),
        StringBacking::Contiguous => {
            let a = a.as_cow();
            let b = b.as_cow();
            CelBytes::new(ctx.alloc.concat_bytes(&[&a, &b]))
        }
    }
}

fn mixed_add(l: i128, r: i128, ctx: &FunctionContext<'_>) -> Value {
    if !ctx.hetero {
        return Value::error(CelError::no_such_overload(
            operators::ADD,
            &[Kind::Int, Kind::Uint],
        ));
    }
    let sum = l + r; // i128 cannot overflow on two 64-bit operands
    if let Ok(i) = i64::try_from(sum) {
        Value::Int(i)
    } else if let Ok(u) = u64::try_from(sum) {
        Value::Uint(u)
    } else {
        Value::error(CelError::overflow("_+_"))
    }
}

pub fn register(reg: &mut FunctionRegistry) -> Result<(), CelError> {
    use Kind::*;

    // _+_
    add(reg, operators::ADD, "add_int64", false, vec![x(Int), x(Int)], x(Int), |a, _| {
        let (l, r) = int2(a);
        checked_int("_+_", l.checked_add(r))
    })?;
    add(reg, operators::ADD, "add_uint64", false, vec![x(Uint), x(Uint)], x(Uint), |a, _| {
        let (l, r) = uint2(a);
        checked_uint("_+_", l.checked_add(r))
    })?;
    add(reg, operators::ADD, "add_double", false, vec![x(Double), x(Double)], x(Double), |a, _| {
        let (l, r) = double2(a);
        Value::Double(l + r)
    })?;
    add(reg, operators::ADD, "add_string", false, vec![x(String), x(String)], x(String), |a, ctx| {
        Value::String(concat_strings(
            a[0].as_string().unwrap(),
            a[1].as_string().unwrap(),
            ctx,
        ))
    })?;
    add(reg, operators::ADD, "add_bytes", false, vec![x(Bytes), x(Bytes)], x(Bytes), |a, ctx| {
        Value::Bytes(concat_bytes(
            a[0].as_bytes().unwrap(),
            a[1].as_bytes().unwrap(),
            ctx,
        ))
    })?;
    add(reg, operators::ADD, "add_list", false, vec![x(List), x(List)], x(List), |a, _| {
        Value::List(a[0].as_list().unwrap().concat(a[1].as_list().unwrap()).into())
    })?;
    // Mixed signed/unsigned addition engages only under heterogeneous
    // equality; the exact sum lands in whichever 64-bit type fits it.
    add(reg, operators::ADD, "add_int64_uint64", false, vec![x(Int), x(Uint)], x(Int), |a, ctx| {
        mixed_add(a[0].as_int().unwrap() as i128, a[1].as_uint().unwrap() as i128, ctx)
    })?;
    add(reg, operators::ADD, "add_uint64_int64", false, vec![x(Uint), x(Int)], x(Int), |a, ctx| {
        mixed_add(a[0].as_uint().unwrap() as i128, a[1].as_int().unwrap() as i128, ctx)
    })?;
    add(
        reg,
        operators::ADD,
        "add_timestamp_duration",
        false,
        vec![x(Timestamp), x(Duration)],
        x(Timestamp),
        |a, _| {
            from_temporal(
                a[0].as_timestamp().unwrap().checked_add(a[1].as_duration().unwrap()),
                Value::Timestamp,
            )
        },
    )?;
    add(
        reg,
        operators::ADD,
        "add_duration_timestamp",
        false,
        vec![x(Duration), x(Timestamp)],
        x(Timestamp),
        |a, _| {
            from_temporal(
                a[1].as_timestamp().unwrap().checked_add(a[0].as_duration().unwrap()),
                Value::Timestamp,
            )
        },
    )?;
    add(
        reg,
        operators::ADD,
        "add_duration_duration",
        false,
        vec![x(Duration), x(Duration)],
        x(Duration),
        |a, _| {
            from_temporal(
                a[0].as_duration().unwrap().checked_add(a[1].as_duration().unwrap()),
                Value::Duration,
            )
        },
    )?;

    // _-_
    add(reg, operators::SUBTRACT, "subtract_int64", false, vec![x(Int), x(Int)], x(Int), |a, _| {
        let (l, r) = int2(a);
        checked_int("_-_", l.checked_sub(r))
    })?;
    add(reg, operators::SUBTRACT, "subtract_uint64", false, vec![x(Uint), x(Uint)], x(Uint), |a, _| {
        let (l, r) = uint2(a);
        checked_uint("_-_", l.checked_sub(r))
    })?;
    add(reg, operators::SUBTRACT, "subtract_double", false, vec![x(Double), x(Double)], x(Double), |a, _| {
        let (l, r) = double2(a);
        Value::Double(l - r)
    })?;
    add(
        reg,
        operators::SUBTRACT,
        "subtract_timestamp_timestamp",
        false,
        vec![x(Timestamp), x(Timestamp)],
        x(Duration),
        |a, _| {
            from_temporal(
                a[0].as_timestamp().unwrap().checked_since(a[1].as_timestamp().unwrap()),
                Value::Duration,
            )
        },
    )?;
    add(
        reg,
        operators::SUBTRACT,
        "subtract_timestamp_duration",
        false,
        vec![x(Timestamp), x(Duration)],
        x(Timestamp),
        |a, _| {
            from_temporal(
                a[0].as_timestamp().unwrap().checked_sub(a[1].as_duration().unwrap()),
                Value::Timestamp,
            )
        },
    )?;
    add(
        reg,
        operators::SUBTRACT,
        "subtract_duration_duration",
        false,
        vec![x(Duration), x(Duration)],
        x(Duration),
        |a, _| {
            from_temporal(
                a[0].as_duration().unwrap().checked_sub(a[1].as_duration().unwrap()),
                Value::Duration,
            )
        },
    )?;

    // _*_
    add(reg, operators::MULTIPLY, "multiply_int64", false, vec![x(Int), x(Int)], x(Int), |a, _| {
        let (l, r) = int2(a);
        checked_int("_*_", l.checked_mul(r))
    })?;
    add(reg, operators::MULTIPLY, "multiply_uint64", false, vec![x(Uint), x(Uint)], x(Uint), |a, _| {
        let (l, r) = uint2(a);
        checked_uint("_*_", l.checked_mul(r))
    })?;
    add(reg, operators::MULTIPLY, "multiply_double", false, vec![x(Double), x(Double)], x(Double), |a, _| {
        let (l, r) = double2(a);
        Value::Double(l * r)
    })?;

    // _/_
    add(reg, operators::DIVIDE, "divide_int64", false, vec![x(Int), x(Int)], x(Int), |a, _| {
        let (l, r) = int2(a);
        if r == 0 {
            return Value::error(CelError::division_by_zero());
        }
        checked_int("_/_", l.checked_div(r))
    })?;
    add(reg, operators::DIVIDE, "divide_uint64", false, vec![x(Uint), x(Uint)], x(Uint), |a, _| {
        let (l, r) = uint2(a);
        if r == 0 {
            return Value::error(CelError::division_by_zero());
        }
        Value::Uint(l / r)
    })?;
    add(reg, operators::DIVIDE, "divide_double", false, vec![x(Double), x(Double)], x(Double), |a, _| {
        let (l, r) = double2(a);
        // IEEE semantics: x/0.0 is ±inf or NaN, never an error
        Value::Double(l / r)
    })?;

    // _%_
    add(reg, operators::MODULO, "modulo_int64", false, vec![x(Int), x(Int)], x(Int), |a, _| {
        let (l, r) = int2(a);
        if r == 0 {
            return Value::error(CelError::modulus_by_zero());
        }
        // MIN % -1 is mathematically 0; wrapping_rem gets it right
        Value::Int(l.wrapping_rem(r))
    })?;
    add(reg, operators::MODULO, "modulo_uint64", false, vec![x(Uint), x(Uint)], x(Uint), |a, _| {
        let (l, r) = uint2(a);
        if r == 0 {
            return Value::error(CelError::modulus_by_zero());
        }
        Value::Uint(l % r)
    })?;

    // unary negation
    add(reg, operators::NEGATE, "negate_int64", false, vec![x(Int)], x(Int), |a, _| {
        checked_int("-_", a[0].as_int().unwrap().checked_neg())
    })?;
    add(reg, operators::NEGATE, "negate_double", false, vec![x(Double)], x(Double), |a, _| {
        Value::Double(-a[0].as_double().unwrap())
    })?;

    // logical not
    add(reg, operators::LOGICAL_NOT, "logical_not", false, vec![x(Bool)], x(Bool), |a, _| {
        Value::Bool(!a[0].as_bool().unwrap())
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cel_core::{Allocator, CelDuration, CelTimestamp, EmptyProvider, ErrorKind};

    fn ctx() -> FunctionContext<'static> {
        static PROVIDER: EmptyProvider = EmptyProvider;
        FunctionContext {
            provider: &PROVIDER,
            alloc: Allocator::Heap,
            hetero: true,
            string_backing: StringBacking::Contiguous,
        }
    }

    fn reg() -> FunctionRegistry {
        let mut reg = FunctionRegistry::new();
        register(&mut reg).unwrap();
        reg
    }

    fn call(function: &str, args: &[Value]) -> Value {
        reg().dispatch(function, false, args, &ctx())
    }

    #[test]
    fn test_int_overflow_is_error() {
        let out = call("_+_", &[Value::Int(i64::MAX), Value::Int(1)]);
        assert_eq!(out.as_error().unwrap().kind, ErrorKind::Overflow);

        let out = call("-_", &[Value::Int(i64::MIN)]);
        assert_eq!(out.as_error().unwrap().kind, ErrorKind::Overflow);

        let out = call("_/_", &[Value::Int(i64::MIN), Value::Int(-1)]);
        assert_eq!(out.as_error().unwrap().kind, ErrorKind::Overflow);
    }

    #[test]
    fn test_division_and_modulo_by_zero() {
        let out = call("_/_", &[Value::Int(1), Value::Int(0)]);
        assert_eq!(out.as_error().unwrap().kind, ErrorKind::DivisionByZero);
        let out = call("_%_", &[Value::Uint(1), Value::Uint(0)]);
        assert_eq!(out.as_error().unwrap().kind, ErrorKind::DivisionByZero);
        assert_eq!(call("_%_", &[Value::Int(i64::MIN), Value::Int(-1)]), Value::Int(0));
    }

    #[test]
    fn test_double_follows_ieee() {
        let out = call("_/_", &[Value::Double(1.0), Value::Double(0.0)]);
        assert_eq!(out, Value::Double(f64::INFINITY));
        let out = call("_/_", &[Value::Double(0.0), Value::Double(0.0)]);
        assert!(out.as_double().unwrap().is_nan());
    }

    #[test]
    fn test_concatenation() {
        assert_eq!(
            call("_+_", &[Value::from("ab"), Value::from("cd")]),
            Value::from("abcd")
        );
        assert_eq!(
            call("_+_", &[Value::bytes(&b"ab"[..]), Value::bytes(&b"cd"[..])]),
            Value::bytes(&b"abcd"[..])
        );
        assert_eq!(
            call(
                "_+_",
                &[
                    Value::list(vec![Value::Int(1)]),
                    Value::list(vec![Value::Int(2)])
                ]
            ),
            Value::list(vec![Value::Int(1), Value::Int(2)])
        );
    }

    #[test]
    fn test_temporal_arithmetic() {
        let ts = Value::Timestamp(CelTimestamp::parse("2024-01-01T00:00:00Z").unwrap());
        let day = Value::Duration(CelDuration::parse("24h").unwrap());
        let next = call("_+_", &[ts.clone(), day.clone()]);
        assert_eq!(
            next,
            Value::Timestamp(CelTimestamp::parse("2024-01-02T00:00:00Z").unwrap())
        );
        // commuted form picks the duration+timestamp overload
        assert_eq!(call("_+_", &[day.clone(), ts.clone()]), next);

        let diff = call("_-_", &[next, ts]);
        assert_eq!(diff, Value::Duration(CelDuration::parse("24h").unwrap()));
    }

    #[test]
    fn test_near_max_timestamp_overflows() {
        let near_max = Value::Timestamp(CelTimestamp::parse("9999-12-31T00:00:00Z").unwrap());
        let huge = Value::Duration(CelDuration::parse("1000000h").unwrap());
        let out = call("_+_", &[near_max, huge]);
        assert_eq!(out.as_error().unwrap().kind, ErrorKind::Overflow);
    }
}
