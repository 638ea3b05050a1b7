//! Temporal accessors
//!
//! Timestamp component accessors follow the CEL zero-based conventions:
//! `getMonth` is 0-11, `getDayOfMonth` and `getDayOfYear` are 0-based,
//! `getDate` is the 1-based day of month, `getDayOfWeek` counts from
//! Sunday. Each accessor takes an optional time-zone argument; an
//! unparseable zone is a CEL error value. Duration accessors return
//! truncated totals.

use super::{add, x};
use cel_core::{CelError, FunctionRegistry, Kind, TimeComponents, Value};

type Component = fn(&TimeComponents) -> i64;

fn ts_accessor(
    reg: &mut FunctionRegistry,
    function: &'static str,
    id_base: &str,
    component: Component,
) -> Result<(), CelError> {
    use Kind::*;
    let utc = move |args: &[Value], _ctx: &cel_core::FunctionContext<'_>| {
        components(&args[0], "", component)
    };
    let zoned = move |args: &[Value], _ctx: &cel_core::FunctionContext<'_>| {
        let tz = args[1].as_string().unwrap().as_cow();
        components(&args[0], &tz, component)
    };
    add(reg, function, id_base, true, vec![x(Timestamp)], x(Int), utc)?;
    add(
        reg,
        function,
        &format!("{}_with_tz", id_base),
        true,
        vec![x(Timestamp), x(String)],
        x(Int),
        zoned,
    )
}

fn components(ts: &Value, tz: &str, component: Component) -> Value {
    match ts.as_timestamp().unwrap().components(tz) {
        Ok(parts) => Value::Int(component(&parts)),
        Err(e) => Value::error(e),
    }
}

pub fn register(reg: &mut FunctionRegistry) -> Result<(), CelError> {
    use Kind::*;

    ts_accessor(reg, "getFullYear", "timestamp_to_year", |c| c.year)?;
    ts_accessor(reg, "getMonth", "timestamp_to_month", |c| c.month0)?;
    ts_accessor(reg, "getDate", "timestamp_to_day_of_month_1_based", |c| {
        c.day_of_month
    })?;
    ts_accessor(reg, "getDayOfMonth", "timestamp_to_day_of_month", |c| {
        c.day_of_month - 1
    })?;
    ts_accessor(reg, "getDayOfWeek", "timestamp_to_day_of_week", |c| {
        c.day_of_week0
    })?;
    ts_accessor(reg, "getDayOfYear", "timestamp_to_day_of_year", |c| {
        c.day_of_year0
    })?;
    ts_accessor(reg, "getHours", "timestamp_to_hours", |c| c.hours)?;
    ts_accessor(reg, "getMinutes", "timestamp_to_minutes", |c| c.minutes)?;
    ts_accessor(reg, "getSeconds", "timestamp_to_seconds", |c| c.seconds)?;
    ts_accessor(reg, "getMilliseconds", "timestamp_to_milliseconds", |c| {
        c.milliseconds
    })?;

    add(reg, "getHours", "duration_to_hours", true, vec![x(Duration)], x(Int), |a, _| {
        Value::Int(a[0].as_duration().unwrap().total_hours())
    })?;
    add(reg, "getMinutes", "duration_to_minutes", true, vec![x(Duration)], x(Int), |a, _| {
        Value::Int(a[0].as_duration().unwrap().total_minutes())
    })?;
    add(reg, "getSeconds", "duration_to_seconds", true, vec![x(Duration)], x(Int), |a, _| {
        Value::Int(a[0].as_duration().unwrap().seconds())
    })?;
    add(
        reg,
        "getMilliseconds",
        "duration_to_milliseconds",
        true,
        vec![x(Duration)],
        x(Int),
        |a, _| Value::Int(a[0].as_duration().unwrap().total_milliseconds()),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cel_core::{Allocator, CelDuration, CelTimestamp, EmptyProvider, FunctionContext, StringBacking};

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
        reg.dispatch(function, true, args, &ctx)
    }

    fn ts(text: &str) -> Value {
        Value::Timestamp(CelTimestamp::parse(text).unwrap())
    }

    #[test]
    fn test_zero_based_conventions() {
        let v = ts("2024-03-10T12:30:45.250Z");
        assert_eq!(call("getFullYear", &[v.clone()]), Value::Int(2024));
        assert_eq!(call("getMonth", &[v.clone()]), Value::Int(2), "March is 2");
        assert_eq!(call("getDate", &[v.clone()]), Value::Int(10));
        assert_eq!(call("getDayOfMonth", &[v.clone()]), Value::Int(9));
        assert_eq!(call("getDayOfWeek", &[v.clone()]), Value::Int(0), "a Sunday");
        assert_eq!(call("getMilliseconds", &[v]), Value::Int(250));
    }

    #[test]
    fn test_zoned_accessors() {
        let v = ts("2024-03-10T12:30:45Z");
        assert_eq!(
            call("getHours", &[v.clone(), Value::from("+05:30")]),
            Value::Int(18)
        );
        assert_eq!(
            call("getHours", &[v.clone(), Value::from("America/New_York")]),
            Value::Int(8)
        );
        let bad = call("getHours", &[v, Value::from("Nowhere/Else")]);
        assert!(bad.is_error());
    }

    #[test]
    fn test_duration_totals() {
        let d = Value::Duration(CelDuration::parse("90m").unwrap());
        assert_eq!(call("getHours", &[d.clone()]), Value::Int(1));
        assert_eq!(call("getMinutes", &[d.clone()]), Value::Int(90));
        assert_eq!(call("getSeconds", &[d.clone()]), Value::Int(5400));
        assert_eq!(call("getMilliseconds", &[d]), Value::Int(5_400_000));
    }
}
