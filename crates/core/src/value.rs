//! Value: the runtime universe the language talks about
//!
//! A closed tagged sum with an inline payload for primitives and shared
//! handles (`Arc`) for compound kinds, so cloning a value is O(1) and
//! results can outlive the evaluation that produced them.
//!
//! Three disjoint categories matter to the evaluator: normal values,
//! error values, and unknown values. Errors and unknowns flow on the
//! stack like any value and propagate through operators.

use crate::attribute::UnknownSet;
use crate::celstring::{CelBytes, CelString};
use crate::duration::CelDuration;
use crate::error::CelError;
use crate::list::ListValue;
use crate::map::{MapKey, MapValue};
use crate::record::RecordRef;
use crate::timestamp::CelTimestamp;
use crate::types::CelType;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Discriminant of a Value, retrievable in O(1) without allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Null,
    Bool,
    Int,
    Uint,
    Double,
    String,
    Bytes,
    Duration,
    Timestamp,
    List,
    Map,
    Record,
    Type,
    Error,
    Unknown,
    Opt,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::Null => "null",
            Kind::Bool => "bool",
            Kind::Int => "int",
            Kind::Uint => "uint",
            Kind::Double => "double",
            Kind::String => "string",
            Kind::Bytes => "bytes",
            Kind::Duration => "duration",
            Kind::Timestamp => "timestamp",
            Kind::List => "list",
            Kind::Map => "map",
            Kind::Record => "record",
            Kind::Type => "type",
            Kind::Error => "error",
            Kind::Unknown => "unknown",
            Kind::Opt => "optional",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A CEL runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(CelString),
    Bytes(CelBytes),
    Duration(CelDuration),
    Timestamp(CelTimestamp),
    List(Arc<ListValue>),
    Map(Arc<MapValue>),
    /// Structured record; the handle is provided by a RecordProvider and
    /// may outlive any single evaluation
    Record(RecordRef),
    /// Reified type value
    Type(CelType),
    /// CEL-level error, propagating through operators
    Error(Box<CelError>),
    /// Set of attributes whose concrete values were withheld
    Unknown(Box<UnknownSet>),
    /// Optional wrapper: present with an inner value, or absent
    Opt(Option<Arc<Value>>),
}

impl Value {
    pub fn kind(&self) -> Kind {
        match self {
            Value::Null => Kind::Null,
            Value::Bool(_) => Kind::Bool,
            Value::Int(_) => Kind::Int,
            Value::Uint(_) => Kind::Uint,
            Value::Double(_) => Kind::Double,
            Value::String(_) => Kind::String,
            Value::Bytes(_) => Kind::Bytes,
            Value::Duration(_) => Kind::Duration,
            Value::Timestamp(_) => Kind::Timestamp,
            Value::List(_) => Kind::List,
            Value::Map(_) => Kind::Map,
            Value::Record(_) => Kind::Record,
            Value::Type(_) => Kind::Type,
            Value::Error(_) => Kind::Error,
            Value::Unknown(_) => Kind::Unknown,
            Value::Opt(_) => Kind::Opt,
        }
    }

    /// The runtime type, as reported by the `type()` function.
    pub fn runtime_type(&self) -> CelType {
        match self {
            Value::Null => CelType::Null,
            Value::Bool(_) => CelType::Bool,
            Value::Int(_) => CelType::Int,
            Value::Uint(_) => CelType::Uint,
            Value::Double(_) => CelType::Double,
            Value::String(_) => CelType::String,
            Value::Bytes(_) => CelType::Bytes,
            Value::Duration(_) => CelType::Duration,
            Value::Timestamp(_) => CelType::Timestamp,
            Value::List(l) => CelType::list_of(l.elem_type().clone()),
            Value::Map(m) => CelType::map_of(m.key_type().clone(), m.value_type().clone()),
            Value::Record(r) => CelType::Record(r.type_name().to_string()),
            Value::Type(_) => CelType::TypeOfType,
            Value::Error(_) => CelType::Error,
            Value::Unknown(_) => CelType::Unknown,
            Value::Opt(inner) => CelType::Opt(Box::new(
                inner
                    .as_ref()
                    .map(|v| v.runtime_type())
                    .unwrap_or(CelType::Dyn),
            )),
        }
    }

    // Constructors

    pub fn error(err: CelError) -> Value {
        Value::Error(Box::new(err))
    }

    pub fn unknown(set: UnknownSet) -> Value {
        Value::Unknown(Box::new(set))
    }

    pub fn string(s: impl Into<CelString>) -> Value {
        Value::String(s.into())
    }

    pub fn bytes(b: impl Into<CelBytes>) -> Value {
        Value::Bytes(b.into())
    }

    pub fn list(elems: Vec<Value>) -> Value {
        Value::List(Arc::new(ListValue::new(elems)))
    }

    pub fn map(entries: Vec<(MapKey, Value)>, hetero: bool) -> Value {
        match MapValue::new(entries, hetero) {
            Ok(m) => Value::Map(Arc::new(m)),
            Err(e) => Value::error(e),
        }
    }

    pub fn optional_of(inner: Value) -> Value {
        Value::Opt(Some(Arc::new(inner)))
    }

    pub fn optional_none() -> Value {
        Value::Opt(None)
    }

    // Category predicates

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Value::Unknown(_))
    }

    /// Neither error nor unknown
    pub fn is_value(&self) -> bool {
        !self.is_error() && !self.is_unknown()
    }

    // Conversion helpers

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::Uint(u) => Some(*u),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&CelString> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&CelBytes> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_duration(&self) -> Option<&CelDuration> {
        match self {
            Value::Duration(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<&CelTimestamp> {
        match self {
            Value::Timestamp(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&ListValue> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&MapValue> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&RecordRef> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&CelError> {
        match self {
            Value::Error(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_unknown(&self) -> Option<&UnknownSet> {
        match self {
            Value::Unknown(u) => Some(u),
            _ => None,
        }
    }

    /// Structural equality.
    ///
    /// With `hetero` set, Int/Uint/Double compare as mathematical values;
    /// without it, cross-numeric comparison is false. Cross-kind
    /// comparison is always false; there is no error channel here, the
    /// standard library decides how `==` treats errors and unknowns.
    pub fn equals(&self, other: &Value, hetero: bool) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Uint(a), Value::Uint(b)) => a == b,
            // IEEE equality: NaN != NaN
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Int(_), Value::Uint(_))
            | (Value::Int(_), Value::Double(_))
            | (Value::Uint(_), Value::Int(_))
            | (Value::Uint(_), Value::Double(_))
            | (Value::Double(_), Value::Int(_))
            | (Value::Double(_), Value::Uint(_)) => {
                hetero && numeric_compare(self, other) == Some(Ordering::Equal)
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::Timestamp(a), Value::Timestamp(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                a.len() == b.len()
                    && a.iter().zip(b.iter()).all(|(x, y)| x.equals(y, hetero))
            }
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(k, v)| match b.get(k, hetero) {
                        Some(w) => v.equals(w, hetero),
                        None => false,
                    })
            }
            (Value::Record(a), Value::Record(b)) => a.record_eq(b.as_ref()),
            (Value::Type(a), Value::Type(b)) => a == b,
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Unknown(a), Value::Unknown(b)) => a == b,
            (Value::Opt(a), Value::Opt(b)) => match (a, b) {
                (None, None) => true,
                (Some(x), Some(y)) => x.equals(y, hetero),
                _ => false,
            },
            _ => false,
        }
    }

    /// Hash stable within a process, with the guarantee that
    /// heterogeneously-equal numerics hash identically.
    pub fn stable_hash(&self) -> u64 {
        let mut h = Fnv1a::new();
        self.feed_hash(&mut h);
        h.finish()
    }

    fn feed_hash(&self, h: &mut Fnv1a) {
        match self {
            Value::Null => h.write_u8(0x01),
            Value::Bool(b) => {
                h.write_u8(0x02);
                h.write_u8(*b as u8);
            }
            Value::Int(i) => feed_numeric(h, Numeric::Integral(*i as i128)),
            Value::Uint(u) => feed_numeric(h, Numeric::Integral(*u as i128)),
            Value::Double(d) => {
                if d.is_finite() && d.trunc() == *d && in_i128_range(*d) {
                    feed_numeric(h, Numeric::Integral(*d as i128));
                } else {
                    feed_numeric(h, Numeric::Bits(d.to_bits()));
                }
            }
            Value::String(s) => {
                h.write_u8(0x04);
                for chunk in s.chunks() {
                    h.write(chunk.as_bytes());
                }
            }
            Value::Bytes(b) => {
                h.write_u8(0x05);
                for chunk in b.chunks() {
                    h.write(chunk);
                }
            }
            Value::Duration(d) => {
                h.write_u8(0x06);
                h.write(&d.total_nanos().to_le_bytes());
            }
            Value::Timestamp(t) => {
                h.write_u8(0x07);
                h.write(&t.total_nanos().to_le_bytes());
            }
            Value::List(l) => {
                h.write_u8(0x08);
                h.write(&(l.len() as u64).to_le_bytes());
                for elem in l.iter() {
                    elem.feed_hash(h);
                }
            }
            Value::Map(m) => {
                // Order-insensitive combine so equal maps with different
                // insertion orders hash the same.
                h.write_u8(0x09);
                h.write(&(m.len() as u64).to_le_bytes());
                let mut acc: u64 = 0;
                for (k, v) in m.iter() {
                    let mut entry = Fnv1a::new();
                    k.to_value().feed_hash(&mut entry);
                    v.feed_hash(&mut entry);
                    acc = acc.wrapping_add(entry.finish());
                }
                h.write(&acc.to_le_bytes());
            }
            Value::Record(r) => {
                h.write_u8(0x0a);
                h.write(r.type_name().as_bytes());
                for (name, value) in r.set_fields() {
                    h.write(name.as_bytes());
                    value.feed_hash(h);
                }
            }
            Value::Type(t) => {
                h.write_u8(0x0b);
                h.write(t.to_string().as_bytes());
            }
            Value::Error(e) => {
                h.write_u8(0x0c);
                h.write(e.kind.as_str().as_bytes());
                h.write(e.message.as_bytes());
            }
            Value::Unknown(u) => {
                h.write_u8(0x0d);
                for trail in u.attributes() {
                    h.write(trail.to_string().as_bytes());
                }
            }
            Value::Opt(inner) => {
                h.write_u8(0x0e);
                match inner {
                    Some(v) => {
                        h.write_u8(1);
                        v.feed_hash(h);
                    }
                    None => h.write_u8(0),
                }
            }
        }
    }

    /// CEL literal syntax for the value, parseable back by
    /// `parse_literal` for scalar kinds.
    pub fn debug_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Uint(u) => format!("{}u", u),
            Value::Double(d) => format_double(*d),
            Value::String(s) => format!("{:?}", s),
            Value::Bytes(b) => format!("{:?}", b),
            Value::Duration(d) => format!("duration(\"{}\")", d.format()),
            Value::Timestamp(t) => format!("timestamp(\"{}\")", t.format()),
            Value::List(l) => {
                let elems: Vec<String> = l.iter().map(Value::debug_string).collect();
                format!("[{}]", elems.join(", "))
            }
            Value::Map(m) => {
                let entries: Vec<String> = m
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.debug_string()))
                    .collect();
                format!("{{{}}}", entries.join(", "))
            }
            Value::Record(r) => {
                let fields: Vec<String> = r
                    .set_fields()
                    .iter()
                    .map(|(name, v)| format!("{}: {}", name, v.debug_string()))
                    .collect();
                format!("{}{{{}}}", r.type_name(), fields.join(", "))
            }
            Value::Type(t) => t.to_string(),
            Value::Error(e) => format!("error({})", e),
            Value::Unknown(u) => u.to_string(),
            Value::Opt(inner) => match inner {
                Some(v) => format!("optional.of({})", v.debug_string()),
                None => "optional.none()".to_string(),
            },
        }
    }

    /// Parse a scalar literal produced by `debug_string`: null, bool,
    /// int, uint, double, string, bytes, duration and timestamp calls.
    pub fn parse_literal(text: &str) -> Result<Value, CelError> {
        let text = text.trim();
        let bad = || CelError::type_conversion(format!("unparseable literal: {}", text));
        match text {
            "null" => return Ok(Value::Null),
            "true" => return Ok(Value::Bool(true)),
            "false" => return Ok(Value::Bool(false)),
            _ => {}
        }
        if let Some(inner) = text
            .strip_prefix("duration(\"")
            .and_then(|t| t.strip_suffix("\")"))
        {
            return CelDuration::parse(inner).map(Value::Duration);
        }
        if let Some(inner) = text
            .strip_prefix("timestamp(\"")
            .and_then(|t| t.strip_suffix("\")"))
        {
            return CelTimestamp::parse(inner).map(Value::Timestamp);
        }
        if let Some(rest) = text.strip_prefix("b\"") {
            let inner = rest.strip_suffix('"').ok_or_else(bad)?;
            return unescape_bytes(inner).map(Value::bytes).ok_or_else(bad);
        }
        if let Some(rest) = text.strip_prefix('"') {
            let inner = rest.strip_suffix('"').ok_or_else(bad)?;
            return unescape_string(inner)
                .map(|s| Value::string(s))
                .ok_or_else(bad);
        }
        if let Some(digits) = text.strip_suffix('u') {
            if let Ok(u) = digits.parse::<u64>() {
                return Ok(Value::Uint(u));
            }
        }
        let looks_double = text.contains('.')
            || text.contains('e')
            || text.contains('E')
            || text.contains("inf")
            || text.contains("NaN");
        if looks_double {
            if let Ok(d) = text.parse::<f64>() {
                return Ok(Value::Double(d));
            }
        } else if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Int(i));
        }
        Err(bad())
    }
}

/// PartialEq uses heterogeneous equality; stricter comparisons go through
/// `Value::equals` directly.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.equals(other, true)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<u64> for Value {
    fn from(u: u64) -> Self {
        Value::Uint(u)
    }
}

impl From<f64> for Value {
    fn from(d: f64) -> Self {
        Value::Double(d)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<CelError> for Value {
    fn from(e: CelError) -> Self {
        Value::error(e)
    }
}

/// Exact mathematical comparison across Int/Uint/Double, None when either
/// side is NaN or the kinds are non-numeric.
pub fn numeric_compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Uint(x), Value::Uint(y)) => Some(x.cmp(y)),
        (Value::Double(x), Value::Double(y)) => x.partial_cmp(y),
        (Value::Int(x), Value::Uint(y)) => Some(compare_int_uint(*x, *y)),
        (Value::Uint(x), Value::Int(y)) => Some(compare_int_uint(*y, *x).reverse()),
        (Value::Int(x), Value::Double(y)) => compare_int_double(*x, *y),
        (Value::Double(x), Value::Int(y)) => compare_int_double(*y, *x).map(Ordering::reverse),
        (Value::Uint(x), Value::Double(y)) => compare_uint_double(*x, *y),
        (Value::Double(x), Value::Uint(y)) => compare_uint_double(*y, *x).map(Ordering::reverse),
        _ => None,
    }
}

fn compare_int_uint(i: i64, u: u64) -> Ordering {
    if i < 0 {
        Ordering::Less
    } else {
        (i as u64).cmp(&u)
    }
}

/// Compare without rounding through f64: the double is split into its
/// integral floor and fractional remainder.
fn compare_int_double(i: i64, d: f64) -> Option<Ordering> {
    if d.is_nan() {
        return None;
    }
    if d >= 9_223_372_036_854_775_808.0 {
        return Some(Ordering::Less);
    }
    if d < -9_223_372_036_854_775_808.0 {
        return Some(Ordering::Greater);
    }
    let floor = d.floor();
    match (i as i128).cmp(&(floor as i128)) {
        Ordering::Equal => {
            if d > floor {
                Some(Ordering::Less)
            } else {
                Some(Ordering::Equal)
            }
        }
        other => Some(other),
    }
}

fn compare_uint_double(u: u64, d: f64) -> Option<Ordering> {
    if d.is_nan() {
        return None;
    }
    if d >= 18_446_744_073_709_551_616.0 {
        return Some(Ordering::Less);
    }
    if d < 0.0 {
        return Some(Ordering::Greater);
    }
    let floor = d.floor();
    match (u as u128).cmp(&(floor as u128)) {
        Ordering::Equal => {
            if d > floor {
                Some(Ordering::Less)
            } else {
                Some(Ordering::Equal)
            }
        }
        other => Some(other),
    }
}

fn in_i128_range(d: f64) -> bool {
    d >= -1.7014118346046923e38 && d <= 1.7014118346046923e38
}

fn format_double(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 { "inf".to_string() } else { "-inf".to_string() }
    } else {
        format!("{:?}", d)
    }
}

enum Numeric {
    Integral(i128),
    Bits(u64),
}

fn feed_numeric(h: &mut Fnv1a, n: Numeric) {
    h.write_u8(0x03);
    match n {
        Numeric::Integral(i) => {
            h.write_u8(0);
            h.write(&i.to_le_bytes());
        }
        Numeric::Bits(bits) => {
            h.write_u8(1);
            h.write(&bits.to_le_bytes());
        }
    }
}

/// FNV-1a. Deterministic across runs, unlike the std RandomState hasher.
struct Fnv1a {
    state: u64,
}

impl Fnv1a {
    fn new() -> Self {
        Fnv1a {
            state: 0xcbf2_9ce4_8422_2325,
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        for b in bytes {
            self.state ^= *b as u64;
            self.state = self.state.wrapping_mul(0x0000_0100_0000_01b3);
        }
    }

    fn write_u8(&mut self, b: u8) {
        self.write(&[b]);
    }

    fn finish(&self) -> u64 {
        self.state
    }
}

fn unescape_string(input: &str) -> Option<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '\\' => out.push('\\'),
            '"' => out.push('"'),
            '\'' => out.push('\''),
            '0' => out.push('\0'),
            'x' => {
                let hi = chars.next()?;
                let lo = chars.next()?;
                let byte = u8::from_str_radix(&format!("{}{}", hi, lo), 16).ok()?;
                out.push(byte as char);
            }
            'u' => {
                // Rust-style \u{XXXX}
                if chars.next()? != '{' {
                    return None;
                }
                let mut hex = String::new();
                loop {
                    match chars.next()? {
                        '}' => break,
                        c => hex.push(c),
                    }
                }
                let code = u32::from_str_radix(&hex, 16).ok()?;
                out.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(out)
}

fn unescape_bytes(input: &str) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0u8; 4];
            out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        match chars.next()? {
            '\\' => out.push(b'\\'),
            '"' => out.push(b'"'),
            'n' => out.push(b'\n'),
            'r' => out.push(b'\r'),
            't' => out.push(b'\t'),
            'x' => {
                let hi = chars.next()?;
                let lo = chars.next()?;
                out.push(u8::from_str_radix(&format!("{}{}", hi, lo), 16).ok()?);
            }
            _ => return None,
        }
    }
    Some(out)
}
