//! Container functions
//!
//! Sizes, membership, and map lookup with a default. `_in_` uses the same
//! equality rules as `==`, so `1 in [1u]` holds under heterogeneous
//! equality.

use super::{add, dyn_, x};
use cel_core::{CelError, FunctionRegistry, Kind, MapKey, Value};
use cel_planner::operators;

pub fn register(reg: &mut FunctionRegistry) -> Result<(), CelError> {
    use Kind::*;

    add(reg, "size", "size_list", false, vec![x(List)], x(Int), |a, _| {
        Value::Int(a[0].as_list().unwrap().len() as i64)
    })?;
    add(reg, "size", "list_size", true, vec![x(List)], x(Int), |a, _| {
        Value::Int(a[0].as_list().unwrap().len() as i64)
    })?;
    add(reg, "size", "size_map", false, vec![x(Map)], x(Int), |a, _| {
        Value::Int(a[0].as_map().unwrap().len() as i64)
    })?;
    add(reg, "size", "map_size", true, vec![x(Map)], x(Int), |a, _| {
        Value::Int(a[0].as_map().unwrap().len() as i64)
    })?;

    add(reg, operators::IN, "in_list", false, vec![dyn_(), x(List)], x(Bool), |a, ctx| {
        let needle = &a[0];
        let found = a[1]
            .as_list()
            .unwrap()
            .iter()
            .any(|elem| needle.equals(elem, ctx.hetero));
        Value::Bool(found)
    })?;
    add(reg, operators::IN, "in_map", false, vec![dyn_(), x(Map)], x(Bool), |a, ctx| {
        let found = MapKey::from_value(&a[0], ctx.hetero)
            .map(|key| a[1].as_map().unwrap().contains_key(&key, ctx.hetero))
            .unwrap_or(false);
        Value::Bool(found)
    })?;

    // map.get(key) and map.get(key, default): total lookups that never
    // produce a no-such-key error
    add(reg, "get", "map_get_key", true, vec![x(Map), dyn_()], dyn_(), |a, ctx| {
        map_get(&a[0], &a[1], ctx.hetero).unwrap_or(Value::Null)
    })?;
    add(
        reg,
        "get",
        "map_get_key_default",
        true,
        vec![x(Map), dyn_(), dyn_()],
        dyn_(),
        |a, ctx| map_get(&a[0], &a[1], ctx.hetero).unwrap_or_else(|| a[2].clone()),
    )?;

    Ok(())
}

fn map_get(map: &Value, key: &Value, hetero: bool) -> Option<Value> {
    let key = MapKey::from_value(key, hetero)?;
    map.as_map().unwrap().get(&key, hetero).cloned()
}
