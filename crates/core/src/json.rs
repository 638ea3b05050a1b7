//! Value ↔ JSON conversion
//!
//! Follows the proto3 JSON mapping: bytes become base64 strings, 64-bit
//! integers outside the double-safe range become decimal strings,
//! timestamps and durations become their string forms, non-finite doubles
//! become the strings "NaN" / "Infinity" / "-Infinity".
//!
//! Type, error, and unknown values have no JSON form; converting them is
//! a `TypeConversion` error.

use crate::celstring::CelString;
use crate::duration::CelDuration;
use crate::error::CelError;
use crate::map::MapKey;
use crate::value::Value;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Map as JsonMap, Number, Value as Json};

/// Largest integer a double represents exactly (2^53).
const MAX_SAFE_JSON_INT: i64 = 9_007_199_254_740_992;

pub fn to_json(value: &Value) -> Result<Json, CelError> {
    match value {
        Value::Null => Ok(Json::Null),
        Value::Bool(b) => Ok(Json::Bool(*b)),
        Value::Int(i) => {
            if (-MAX_SAFE_JSON_INT..=MAX_SAFE_JSON_INT).contains(i) {
                Ok(Json::Number(Number::from(*i)))
            } else {
                Ok(Json::String(i.to_string()))
            }
        }
        Value::Uint(u) => {
            if *u <= MAX_SAFE_JSON_INT as u64 {
                Ok(Json::Number(Number::from(*u)))
            } else {
                Ok(Json::String(u.to_string()))
            }
        }
        Value::Double(d) => {
            if d.is_nan() {
                Ok(Json::String("NaN".to_string()))
            } else if d.is_infinite() {
                Ok(Json::String(
                    if *d > 0.0 { "Infinity" } else { "-Infinity" }.to_string(),
                ))
            } else {
                Number::from_f64(*d)
                    .map(Json::Number)
                    .ok_or_else(|| CelError::type_conversion("unrepresentable double"))
            }
        }
        Value::String(s) => Ok(Json::String(s.as_cow().into_owned())),
        Value::Bytes(b) => Ok(Json::String(BASE64.encode(b.to_vec()))),
        Value::Duration(d) => Ok(Json::String(duration_json(d))),
        Value::Timestamp(t) => Ok(Json::String(t.format())),
        Value::List(l) => {
            let mut out = Vec::with_capacity(l.len());
            for elem in l.iter() {
                out.push(to_json(elem)?);
            }
            Ok(Json::Array(out))
        }
        Value::Map(m) => {
            let mut out = JsonMap::with_capacity(m.len());
            for (key, v) in m.iter() {
                let key = match key {
                    MapKey::String(s) => s.as_cow().into_owned(),
                    MapKey::Bool(b) => b.to_string(),
                    MapKey::Int(i) => i.to_string(),
                    MapKey::Uint(u) => u.to_string(),
                };
                out.insert(key, to_json(v)?);
            }
            Ok(Json::Object(out))
        }
        Value::Record(r) => {
            let mut out = JsonMap::new();
            for (name, v) in r.set_fields() {
                out.insert(name, to_json(&v)?);
            }
            Ok(Json::Object(out))
        }
        Value::Opt(inner) => match inner {
            Some(v) => to_json(v),
            None => Ok(Json::Null),
        },
        Value::Type(_) | Value::Error(_) | Value::Unknown(_) => Err(CelError::type_conversion(
            format!("{} has no JSON representation", value.kind()),
        )),
    }
}

/// proto3 JSON duration form: decimal seconds with an `s` suffix.
fn duration_json(d: &CelDuration) -> String {
    let nanos = d.total_nanos();
    let (sign, nanos) = if nanos < 0 { ("-", -nanos) } else { ("", nanos) };
    let seconds = nanos / 1_000_000_000;
    let frac = (nanos % 1_000_000_000) as u32;
    if frac == 0 {
        format!("{}{}s", sign, seconds)
    } else {
        let frac = format!("{:09}", frac);
        format!("{}{}.{}s", sign, seconds, frac.trim_end_matches('0'))
    }
}

/// JSON → Value. Numbers become Int when they are exact 64-bit integers,
/// Uint when only an unsigned fits, Double otherwise.
pub fn from_json(json: Json) -> Value {
    match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else if let Some(u) = n.as_u64() {
                Value::Uint(u)
            } else {
                Value::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Json::String(s) => Value::String(CelString::new(s)),
        Json::Array(elems) => Value::list(elems.into_iter().map(from_json).collect()),
        Json::Object(fields) => {
            let entries = fields
                .into_iter()
                .map(|(k, v)| (MapKey::String(CelString::new(k)), from_json(v)))
                .collect();
            // JSON object keys are unique, construction cannot fail
            Value::map(entries, true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars() {
        assert_eq!(to_json(&Value::Int(3)).unwrap(), json!(3));
        assert_eq!(to_json(&Value::Uint(3)).unwrap(), json!(3));
        assert_eq!(to_json(&Value::Double(1.5)).unwrap(), json!(1.5));
        assert_eq!(
            to_json(&Value::Int(i64::MAX)).unwrap(),
            json!("9223372036854775807"),
            "large ints are strings in proto3 JSON"
        );
        assert_eq!(to_json(&Value::Double(f64::NAN)).unwrap(), json!("NaN"));
    }

    #[test]
    fn test_bytes_are_base64() {
        assert_eq!(to_json(&Value::bytes(&b"ok"[..])).unwrap(), json!("b2s="));
    }

    #[test]
    fn test_temporal_forms() {
        let d = CelDuration::parse("1.5s").unwrap();
        assert_eq!(to_json(&Value::Duration(d)).unwrap(), json!("1.5s"));
        let t = crate::timestamp::CelTimestamp::parse("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(to_json(&Value::Timestamp(t)).unwrap(), json!("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn test_error_has_no_json() {
        let err = Value::error(CelError::division_by_zero());
        assert!(to_json(&err).is_err());
    }

    #[test]
    fn test_round_trip_containers() {
        let v = from_json(json!({"a": [1, 2.5, "x"], "b": null}));
        let back = to_json(&v).unwrap();
        assert_eq!(back, json!({"a": [1, 2.5, "x"], "b": null}));
    }
}
