//! Type conversion functions
//!
//! Conversions fail with `TypeConversion` error values: non-finite or
//! out-of-range doubles cannot become integers, sign loss is rejected,
//! and bytes must be valid UTF-8 to become strings. Identity conversions
//! exist for every target so `int(x)` is total over int inputs.

use super::{add, dyn_, x};
use cel_core::{CelBytes, CelDuration, CelError, CelTimestamp, FunctionRegistry, Kind, Value};

/// Exact i64 bounds as doubles: [-2^63, 2^63)
const I64_MIN_D: f64 = -9_223_372_036_854_775_808.0;
const I64_MAX_D: f64 = 9_223_372_036_854_775_808.0;
/// u64 upper bound as a double: 2^64
const U64_MAX_D: f64 = 18_446_744_073_709_551_616.0;

fn range_error(target: &str, value: impl std::fmt::Display) -> Value {
    Value::error(CelError::type_conversion(format!(
        "{} out of {} range",
        value, target
    )))
}

fn double_to_int(d: f64) -> Value {
    if d.is_finite() && (I64_MIN_D..I64_MAX_D).contains(&d) {
        Value::Int(d.trunc() as i64)
    } else {
        range_error("int", d)
    }
}

fn double_to_uint(d: f64) -> Value {
    if d.is_finite() && (0.0..U64_MAX_D).contains(&d) {
        Value::Uint(d.trunc() as u64)
    } else {
        range_error("uint", d)
    }
}

fn double_to_string(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d == f64::INFINITY {
        "+Inf".to_string()
    } else if d == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{}", d)
    }
}

pub fn register(reg: &mut FunctionRegistry) -> Result<(), CelError> {
    use Kind::*;

    // type and dyn
    add(reg, "type", "type_of", false, vec![dyn_()], x(Type), |a, _| {
        Value::Type(a[0].runtime_type())
    })?;
    add(reg, "dyn", "to_dyn", false, vec![dyn_()], dyn_(), |a, _| a[0].clone())?;

    // int()
    add(reg, "int", "int64_to_int64", false, vec![x(Int)], x(Int), |a, _| a[0].clone())?;
    add(reg, "int", "uint64_to_int64", false, vec![x(Uint)], x(Int), |a, _| {
        let u = a[0].as_uint().unwrap();
        match i64::try_from(u) {
            Ok(i) => Value::Int(i),
            Err(_) => range_error("int", u),
        }
    })?;
    add(reg, "int", "double_to_int64", false, vec![x(Double)], x(Int), |a, _| {
        double_to_int(a[0].as_double().unwrap())
    })?;
    add(reg, "int", "string_to_int64", false, vec![x(String)], x(Int), |a, _| {
        let s = a[0].as_string().unwrap().as_cow();
        match s.parse::<i64>() {
            Ok(i) => Value::Int(i),
            Err(_) => Value::error(CelError::type_conversion(format!(
                "cannot convert '{}' to int",
                s
            ))),
        }
    })?;
    add(reg, "int", "timestamp_to_int64", false, vec![x(Timestamp)], x(Int), |a, _| {
        Value::Int(a[0].as_timestamp().unwrap().unix_seconds())
    })?;

    // uint()
    add(reg, "uint", "uint64_to_uint64", false, vec![x(Uint)], x(Uint), |a, _| a[0].clone())?;
    add(reg, "uint", "int64_to_uint64", false, vec![x(Int)], x(Uint), |a, _| {
        let i = a[0].as_int().unwrap();
        match u64::try_from(i) {
            Ok(u) => Value::Uint(u),
            Err(_) => range_error("uint", i),
        }
    })?;
    add(reg, "uint", "double_to_uint64", false, vec![x(Double)], x(Uint), |a, _| {
        double_to_uint(a[0].as_double().unwrap())
    })?;
    add(reg, "uint", "string_to_uint64", false, vec![x(String)], x(Uint), |a, _| {
        let s = a[0].as_string().unwrap().as_cow();
        match s.parse::<u64>() {
            Ok(u) => Value::Uint(u),
            Err(_) => Value::error(CelError::type_conversion(format!(
                "cannot convert '{}' to uint",
                s
            ))),
        }
    })?;

    // double()
    add(reg, "double", "double_to_double", false, vec![x(Double)], x(Double), |a, _| a[0].clone())?;
    add(reg, "double", "int64_to_double", false, vec![x(Int)], x(Double), |a, _| {
        Value::Double(a[0].as_int().unwrap() as f64)
    })?;
    add(reg, "double", "uint64_to_double", false, vec![x(Uint)], x(Double), |a, _| {
        Value::Double(a[0].as_uint().unwrap() as f64)
    })?;
    add(reg, "double", "string_to_double", false, vec![x(String)], x(Double), |a, _| {
        let s = a[0].as_string().unwrap().as_cow();
        match s.parse::<f64>() {
            Ok(d) => Value::Double(d),
            Err(_) => Value::error(CelError::type_conversion(format!(
                "cannot convert '{}' to double",
                s
            ))),
        }
    })?;

    // string()
    add(reg, "string", "string_to_string", false, vec![x(String)], x(String), |a, _| a[0].clone())?;
    add(reg, "string", "int64_to_string", false, vec![x(Int)], x(String), |a, _| {
        Value::from(a[0].as_int().unwrap().to_string())
    })?;
    add(reg, "string", "uint64_to_string", false, vec![x(Uint)], x(String), |a, _| {
        Value::from(a[0].as_uint().unwrap().to_string())
    })?;
    add(reg, "string", "double_to_string", false, vec![x(Double)], x(String), |a, _| {
        Value::from(double_to_string(a[0].as_double().unwrap()))
    })?;
    add(reg, "string", "bool_to_string", false, vec![x(Bool)], x(String), |a, _| {
        Value::from(a[0].as_bool().unwrap().to_string())
    })?;
    add(reg, "string", "bytes_to_string", false, vec![x(Bytes)], x(String), |a, _| {
        match std::string::String::from_utf8(a[0].as_bytes().unwrap().to_vec()) {
            Ok(s) => Value::from(s),
            Err(_) => Value::error(CelError::type_conversion(
                "bytes are not valid UTF-8".to_string(),
            )),
        }
    })?;
    add(reg, "string", "timestamp_to_string", false, vec![x(Timestamp)], x(String), |a, _| {
        Value::from(a[0].as_timestamp().unwrap().format())
    })?;
    add(reg, "string", "duration_to_string", false, vec![x(Duration)], x(String), |a, _| {
        Value::from(a[0].as_duration().unwrap().format())
    })?;

    // bytes()
    add(reg, "bytes", "bytes_to_bytes", false, vec![x(Bytes)], x(Bytes), |a, _| a[0].clone())?;
    add(reg, "bytes", "string_to_bytes", false, vec![x(String)], x(Bytes), |a, _| {
        Value::Bytes(CelBytes::from(
            a[0].as_string().unwrap().as_cow().as_bytes().to_vec(),
        ))
    })?;

    // bool()
    add(reg, "bool", "bool_to_bool", false, vec![x(Bool)], x(Bool), |a, _| a[0].clone())?;
    add(reg, "bool", "string_to_bool", false, vec![x(String)], x(Bool), |a, _| {
        let s = a[0].as_string().unwrap().as_cow();
        match s.as_ref() {
            "true" | "True" | "TRUE" | "t" | "1" => Value::Bool(true),
            "false" | "False" | "FALSE" | "f" | "0" => Value::Bool(false),
            other => Value::error(CelError::type_conversion(format!(
                "cannot convert '{}' to bool",
                other
            ))),
        }
    })?;

    // duration()
    add(reg, "duration", "duration_to_duration", false, vec![x(Duration)], x(Duration), |a, _| {
        a[0].clone()
    })?;
    add(reg, "duration", "string_to_duration", false, vec![x(String)], x(Duration), |a, _| {
        match CelDuration::parse(&a[0].as_string().unwrap().as_cow()) {
            Ok(d) => Value::Duration(d),
            Err(e) => Value::error(e),
        }
    })?;

    // timestamp()
    add(reg, "timestamp", "timestamp_to_timestamp", false, vec![x(Timestamp)], x(Timestamp), |a, _| {
        a[0].clone()
    })?;
    add(reg, "timestamp", "string_to_timestamp", false, vec![x(String)], x(Timestamp), |a, _| {
        match CelTimestamp::parse(&a[0].as_string().unwrap().as_cow()) {
            Ok(t) => Value::Timestamp(t),
            Err(e) => Value::error(e),
        }
    })?;
    add(reg, "timestamp", "int64_to_timestamp", false, vec![x(Int)], x(Timestamp), |a, _| {
        match CelTimestamp::from_unix_seconds(a[0].as_int().unwrap()) {
            Ok(t) => Value::Timestamp(t),
            Err(e) => Value::error(e),
        }
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cel_core::{Allocator, CelType, EmptyProvider, ErrorKind, FunctionContext, StringBacking};

    static PROVIDER: EmptyProvider = EmptyProvider;

    fn call(function: &str, args: &[Value]) -> Value {
        let mut reg = FunctionRegistry::new();
        register(&mut reg).unwrap();
        let ctx = FunctionContext {
            provider: &PROVIDER,
            alloc: Allocator::Heap,
            hetero: true,
            string_backing: StringBacking::Contiguous,
        };
        reg.dispatch(function, false, args, &ctx)
    }

    #[test]
    fn test_int_conversions() {
        assert_eq!(call("int", &[Value::Uint(5)]), Value::Int(5));
        assert_eq!(call("int", &[Value::Double(-2.9)]), Value::Int(-2));
        assert_eq!(call("int", &[Value::from("-42")]), Value::Int(-42));

        let out = call("int", &[Value::Uint(u64::MAX)]);
        assert_eq!(out.as_error().unwrap().kind, ErrorKind::TypeConversion);
        let out = call("int", &[Value::Double(f64::INFINITY)]);
        assert_eq!(out.as_error().unwrap().kind, ErrorKind::TypeConversion);
        let out = call("int", &[Value::Double(1e19)]);
        assert_eq!(out.as_error().unwrap().kind, ErrorKind::TypeConversion);
    }

    #[test]
    fn test_uint_sign_loss_rejected() {
        assert_eq!(call("uint", &[Value::Int(5)]), Value::Uint(5));
        let out = call("uint", &[Value::Int(-1)]);
        assert_eq!(out.as_error().unwrap().kind, ErrorKind::TypeConversion);
        let out = call("uint", &[Value::Double(-0.5)]);
        assert_eq!(out.as_error().unwrap().kind, ErrorKind::TypeConversion);
    }

    #[test]
    fn test_string_conversions() {
        assert_eq!(call("string", &[Value::Int(-3)]), Value::from("-3"));
        assert_eq!(call("string", &[Value::Double(1.5)]), Value::from("1.5"));
        assert_eq!(call("string", &[Value::Double(f64::NAN)]), Value::from("NaN"));
        assert_eq!(call("string", &[Value::Bool(true)]), Value::from("true"));
        assert_eq!(call("string", &[Value::bytes(&b"ok"[..])]), Value::from("ok"));

        let out = call("string", &[Value::bytes(&b"\xff"[..])]);
        assert_eq!(out.as_error().unwrap().kind, ErrorKind::TypeConversion);
    }

    #[test]
    fn test_temporal_conversions() {
        assert_eq!(
            call("duration", &[Value::from("90m")]),
            Value::Duration(CelDuration::parse("90m").unwrap())
        );
        assert_eq!(
            call("timestamp", &[Value::from("2024-01-01T00:00:00Z")]),
            Value::Timestamp(CelTimestamp::parse("2024-01-01T00:00:00Z").unwrap())
        );
        assert_eq!(
            call("int", &[call("timestamp", &[Value::from("1970-01-01T00:01:00Z")])]),
            Value::Int(60)
        );
        let out = call("duration", &[Value::from("not a duration")]);
        assert_eq!(out.as_error().unwrap().kind, ErrorKind::TypeConversion);
    }

    #[test]
    fn test_type_and_dyn() {
        assert_eq!(call("type", &[Value::Int(1)]), Value::Type(CelType::Int));
        assert_eq!(
            call("type", &[Value::list(vec![Value::Int(1)])]),
            Value::Type(CelType::list_of(CelType::Int))
        );
        assert_eq!(call("dyn", &[Value::from("x")]), Value::from("x"));
    }

    #[test]
    fn test_bool_conversion() {
        assert_eq!(call("bool", &[Value::from("true")]), Value::Bool(true));
        assert_eq!(call("bool", &[Value::from("0")]), Value::Bool(false));
        let out = call("bool", &[Value::from("yes")]);
        assert_eq!(out.as_error().unwrap().kind, ErrorKind::TypeConversion);
    }
}
