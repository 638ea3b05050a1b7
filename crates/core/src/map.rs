//! Map values
//!
//! Finite Value→Value mappings. Keys are restricted to the hashable kinds
//! (bool, int, uint, string). Iteration preserves insertion order; lookup
//! goes through a canonical-key index so integer keys can be found by any
//! numeric representation of the same value when heterogeneous equality is
//! enabled.

use crate::celstring::CelString;
use crate::error::CelError;
use crate::types::CelType;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

/// The hashable subset of Value usable as a map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Bool(bool),
    Int(i64),
    Uint(u64),
    String(CelString),
}

impl MapKey {
    /// Key from a value; None for kinds that cannot key a map.
    /// Doubles convert only when they denote an integer exactly, which is
    /// the heterogeneous-lookup path.
    pub fn from_value(value: &Value, allow_double: bool) -> Option<MapKey> {
        match value {
            Value::Bool(b) => Some(MapKey::Bool(*b)),
            Value::Int(i) => Some(MapKey::Int(*i)),
            Value::Uint(u) => Some(MapKey::Uint(*u)),
            Value::String(s) => Some(MapKey::String(s.clone())),
            Value::Double(d) if allow_double => {
                if d.is_finite() && d.trunc() == *d {
                    if *d >= 0.0 && *d <= u64::MAX as f64 {
                        Some(MapKey::Uint(*d as u64))
                    } else if *d >= i64::MIN as f64 && *d <= i64::MAX as f64 {
                        Some(MapKey::Int(*d as i64))
                    } else {
                        None
                    }
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            MapKey::Bool(b) => Value::Bool(*b),
            MapKey::Int(i) => Value::Int(*i),
            MapKey::Uint(u) => Value::Uint(*u),
            MapKey::String(s) => Value::String(s.clone()),
        }
    }

    fn canonical(&self) -> CanonicalKey {
        match self {
            MapKey::Bool(b) => CanonicalKey::Bool(*b),
            MapKey::Int(i) => CanonicalKey::Num(*i as i128),
            MapKey::Uint(u) => CanonicalKey::Num(*u as i128),
            MapKey::String(s) => CanonicalKey::String(s.clone()),
        }
    }

    /// Same mathematical key: int/uint merge, used under heterogeneous
    /// equality.
    fn loose_eq(&self, other: &MapKey) -> bool {
        self.canonical() == other.canonical()
    }
}

impl fmt::Display for MapKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MapKey::Bool(b) => write!(f, "{}", b),
            MapKey::Int(i) => write!(f, "{}", i),
            MapKey::Uint(u) => write!(f, "{}u", u),
            MapKey::String(s) => write!(f, "{:?}", s),
        }
    }
}

/// Numeric keys collapse to one canonical form so the index can answer
/// heterogeneous lookups in O(1).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CanonicalKey {
    Bool(bool),
    Num(i128),
    String(CelString),
}

#[derive(Debug, Default)]
pub struct MapValue {
    entries: Vec<(MapKey, Value)>,
    index: HashMap<CanonicalKey, Vec<usize>>,
    key_type: OnceLock<CelType>,
    value_type: OnceLock<CelType>,
}

impl MapValue {
    /// Build a map from entries in insertion order.
    ///
    /// Duplicate keys are an `InvalidArgument` error; with heterogeneous
    /// equality enabled `1` and `1u` count as the same key.
    pub fn new(entries: Vec<(MapKey, Value)>, hetero: bool) -> Result<MapValue, CelError> {
        let mut index: HashMap<CanonicalKey, Vec<usize>> = HashMap::with_capacity(entries.len());
        for (pos, (key, _)) in entries.iter().enumerate() {
            let bucket = index.entry(key.canonical()).or_default();
            let duplicate = bucket.iter().any(|&i| {
                let existing = &entries[i].0;
                if hetero {
                    existing.loose_eq(key)
                } else {
                    existing == key
                }
            });
            if duplicate {
                return Err(CelError::invalid_argument(format!(
                    "repeated key in map: {}",
                    key
                )));
            }
            bucket.push(pos);
        }
        Ok(MapValue {
            entries,
            index,
            key_type: OnceLock::new(),
            value_type: OnceLock::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, (MapKey, Value)> {
        self.entries.iter()
    }

    /// Keys in insertion order (the comprehension iteration domain).
    pub fn keys(&self) -> impl Iterator<Item = &MapKey> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn get(&self, key: &MapKey, hetero: bool) -> Option<&Value> {
        let bucket = self.index.get(&key.canonical())?;
        bucket
            .iter()
            .find(|&&i| {
                let existing = &self.entries[i].0;
                if hetero {
                    existing.loose_eq(key)
                } else {
                    existing == key
                }
            })
            .map(|&i| &self.entries[i].1)
    }

    pub fn contains_key(&self, key: &MapKey, hetero: bool) -> bool {
        self.get(key, hetero).is_some()
    }

    /// Key type when homogeneous, `dyn` otherwise.
    pub fn key_type(&self) -> &CelType {
        self.key_type.get_or_init(|| {
            common_type(self.entries.iter().map(|(k, _)| k.to_value().runtime_type()))
        })
    }

    /// Value type when homogeneous, `dyn` otherwise.
    pub fn value_type(&self) -> &CelType {
        self.value_type
            .get_or_init(|| common_type(self.entries.iter().map(|(_, v)| v.runtime_type())))
    }
}

fn common_type(mut types: impl Iterator<Item = CelType>) -> CelType {
    match types.next() {
        None => CelType::Dyn,
        Some(first) => {
            if types.all(|t| t == first) {
                first
            } else {
                CelType::Dyn
            }
        }
    }
}

impl PartialEq for MapValue {
    /// Order-insensitive equality: same size and every entry present in
    /// the other map with an equal value. Numeric keys match loosely,
    /// mirroring heterogeneous equality.
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.entries
            .iter()
            .all(|(k, v)| other.get(k, true) == Some(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_of(entries: Vec<(MapKey, Value)>) -> MapValue {
        MapValue::new(entries, true).unwrap()
    }

    #[test]
    fn test_insertion_order_preserved() {
        let m = map_of(vec![
            (MapKey::String("b".into()), Value::Int(2)),
            (MapKey::String("a".into()), Value::Int(1)),
        ]);
        let keys: Vec<String> = m.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["\"b\"", "\"a\""]);
    }

    #[test]
    fn test_heterogeneous_lookup() {
        let m = map_of(vec![(MapKey::Int(7), Value::from("seven"))]);
        assert!(m.get(&MapKey::Uint(7), true).is_some(), "uint finds int key");
        assert!(m.get(&MapKey::Uint(7), false).is_none(), "strict mode keeps kinds apart");
        let by_double = MapKey::from_value(&Value::Double(7.0), true).unwrap();
        assert!(m.get(&by_double, true).is_some(), "integral double finds int key");
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let dup = MapValue::new(
            vec![
                (MapKey::Int(1), Value::Int(1)),
                (MapKey::Uint(1), Value::Int(2)),
            ],
            true,
        );
        assert!(dup.is_err(), "1 and 1u are the same key under heterogeneous equality");

        let distinct = MapValue::new(
            vec![
                (MapKey::Int(1), Value::Int(1)),
                (MapKey::Uint(1), Value::Int(2)),
            ],
            false,
        );
        assert!(distinct.is_ok(), "strict mode keeps them distinct");
    }

    #[test]
    fn test_fractional_double_is_not_a_key() {
        assert!(MapKey::from_value(&Value::Double(1.5), true).is_none());
        assert!(MapKey::from_value(&Value::Double(2.0), false).is_none());
    }

    #[test]
    fn test_map_equality_ignores_order() {
        let a = map_of(vec![
            (MapKey::Int(1), Value::from("a")),
            (MapKey::Int(2), Value::from("b")),
        ]);
        let b = map_of(vec![
            (MapKey::Int(2), Value::from("b")),
            (MapKey::Int(1), Value::from("a")),
        ]);
        assert_eq!(a, b);
    }
}
