//! String and bytes functions
//!
//! `size` counts Unicode code points for strings and octets for bytes.
//! `matches` evaluates an anchored-nowhere regular expression (partial
//! match), compiling the pattern per call; invalid patterns are CEL error
//! values, not host failures.

use super::{add, x};
use cel_core::{CelError, FunctionRegistry, Kind, Value};

fn str_arg(args: &[Value], i: usize) -> std::borrow::Cow<'_, str> {
    args[i].as_string().unwrap().as_cow()
}

fn regex_match(text: &str, pattern: &str) -> Value {
    match regex::Regex::new(pattern) {
        Ok(re) => Value::Bool(re.is_match(text)),
        Err(e) => Value::error(CelError::invalid_argument(format!(
            "invalid regex '{}': {}",
            pattern, e
        ))),
    }
}

pub fn register(reg: &mut FunctionRegistry) -> Result<(), CelError> {
    use Kind::*;

    // size: global and receiver style, like the rest of the stdlib
    add(reg, "size", "size_string", false, vec![x(String)], x(Int), |a, _| {
        Value::Int(a[0].as_string().unwrap().size() as i64)
    })?;
    add(reg, "size", "string_size", true, vec![x(String)], x(Int), |a, _| {
        Value::Int(a[0].as_string().unwrap().size() as i64)
    })?;
    add(reg, "size", "size_bytes", false, vec![x(Bytes)], x(Int), |a, _| {
        Value::Int(a[0].as_bytes().unwrap().size() as i64)
    })?;
    add(reg, "size", "bytes_size", true, vec![x(Bytes)], x(Int), |a, _| {
        Value::Int(a[0].as_bytes().unwrap().size() as i64)
    })?;

    add(reg, "contains", "contains_string", true, vec![x(String), x(String)], x(Bool), |a, _| {
        Value::Bool(str_arg(a, 0).contains(str_arg(a, 1).as_ref()))
    })?;
    add(reg, "startsWith", "starts_with_string", true, vec![x(String), x(String)], x(Bool), |a, _| {
        Value::Bool(str_arg(a, 0).starts_with(str_arg(a, 1).as_ref()))
    })?;
    add(reg, "endsWith", "ends_with_string", true, vec![x(String), x(String)], x(Bool), |a, _| {
        Value::Bool(str_arg(a, 0).ends_with(str_arg(a, 1).as_ref()))
    })?;

    add(reg, "matches", "matches_string", true, vec![x(String), x(String)], x(Bool), |a, _| {
        regex_match(&str_arg(a, 0), &str_arg(a, 1))
    })?;
    add(reg, "matches", "matches", false, vec![x(String), x(String)], x(Bool), |a, _| {
        regex_match(&str_arg(a, 0), &str_arg(a, 1))
    })?;

    Ok(())
}
