//! Dynamic record provider
//!
//! `DynRecordProvider` serves descriptor-driven records: hosts register
//! `RecordDescriptor`s by fully qualified name, and records store only
//! their explicitly set fields. Presence follows protobuf rules: message,
//! wrapper, and temporal fields track presence explicitly; scalar fields
//! treat their zero value as unset.
//!
//! The well-known protobuf types are recognized by name without
//! registration and build directly into their native Value forms:
//! wrappers unwrap, Duration/Timestamp become temporal values, Struct and
//! ListValue become maps and lists.

use cel_core::{
    CelDuration, CelError, CelTimestamp, CelType, FieldDescriptor, Kind, RecordBuilder,
    RecordProvider, RecordValue, Value,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Declared shape of one record type.
#[derive(Debug, Clone)]
pub struct RecordDescriptor {
    type_name: String,
    fields: Vec<FieldDescriptor>,
}

impl RecordDescriptor {
    pub fn new(
        type_name: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> Result<RecordDescriptor, CelError> {
        let type_name = type_name.into();
        for (i, field) in fields.iter().enumerate() {
            let clash = fields[..i]
                .iter()
                .any(|f| f.name == field.name || f.number == field.number);
            if clash {
                return Err(CelError::invalid_argument(format!(
                    "duplicate field '{}' ({}) in {}",
                    field.name, field.number, type_name
                )));
            }
        }
        Ok(RecordDescriptor { type_name, fields })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_number(&self, number: i32) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.number == number)
    }
}

type TypeTable = Arc<HashMap<String, Arc<RecordDescriptor>>>;

/// Provider over a fixed set of registered descriptors plus the
/// well-known types.
#[derive(Debug, Clone)]
pub struct DynRecordProvider {
    types: TypeTable,
}

impl DynRecordProvider {
    pub fn new(descriptors: Vec<RecordDescriptor>) -> Result<DynRecordProvider, CelError> {
        let mut types = HashMap::with_capacity(descriptors.len() + 1);
        // Any carries an opaque payload; it round-trips as a plain record
        let any = RecordDescriptor::new(
            "google.protobuf.Any",
            vec![
                FieldDescriptor::new("type_url", 1, CelType::String),
                FieldDescriptor::new("value", 2, CelType::Bytes),
            ],
        )?;
        types.insert(any.type_name.clone(), Arc::new(any));
        for descriptor in descriptors {
            let name = descriptor.type_name.clone();
            if types.insert(name.clone(), Arc::new(descriptor)).is_some() {
                return Err(CelError::invalid_argument(format!(
                    "duplicate record type: {}",
                    name
                )));
            }
        }
        Ok(DynRecordProvider {
            types: Arc::new(types),
        })
    }

    pub fn empty() -> DynRecordProvider {
        DynRecordProvider::new(Vec::new()).expect("built-in descriptors are valid")
    }

    /// An empty record of a registered type.
    pub fn empty_record(&self, type_name: &str) -> Option<Value> {
        let descriptor = self.types.get(type_name)?.clone();
        Some(Value::Record(Arc::new(DynRecord {
            types: self.types.clone(),
            descriptor,
            fields: Vec::new(),
        })))
    }
}

impl RecordProvider for DynRecordProvider {
    fn field_descriptors(&self, type_name: &str) -> Option<Vec<FieldDescriptor>> {
        if let Some(descriptor) = self.types.get(type_name) {
            return Some(descriptor.fields.clone());
        }
        well_known_fields(type_name)
    }

    fn new_builder(&self, type_name: &str) -> Option<Box<dyn RecordBuilder + '_>> {
        if let Some(kind) = WrapperKind::for_type(type_name) {
            return Some(Box::new(WrapperBuilder { kind, value: None }));
        }
        match type_name {
            "google.protobuf.Duration" => Some(Box::new(TemporalBuilder {
                is_duration: true,
                seconds: 0,
                nanos: 0,
            })),
            "google.protobuf.Timestamp" => Some(Box::new(TemporalBuilder {
                is_duration: false,
                seconds: 0,
                nanos: 0,
            })),
            "google.protobuf.Struct" => Some(Box::new(StructBuilder { fields: None })),
            "google.protobuf.ListValue" => Some(Box::new(ListValueBuilder { values: None })),
            "google.protobuf.Value" => Some(Box::new(JsonValueBuilder { value: None })),
            _ => {
                let descriptor = self.types.get(type_name)?.clone();
                Some(Box::new(DynRecordBuilder {
                    record: DynRecord {
                        types: self.types.clone(),
                        descriptor,
                        fields: Vec::new(),
                    },
                }))
            }
        }
    }
}

/// A record value storing only its explicitly set fields, in declaration
/// order.
#[derive(Debug, Clone)]
pub struct DynRecord {
    types: TypeTable,
    descriptor: Arc<RecordDescriptor>,
    fields: Vec<(String, Value)>,
}

impl DynRecord {
    fn stored(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    fn default_for(&self, field: &FieldDescriptor) -> Value {
        match &field.field_type {
            CelType::Bool => Value::Bool(false),
            CelType::Int => Value::Int(0),
            CelType::Uint => Value::Uint(0),
            CelType::Double => Value::Double(0.0),
            CelType::String => Value::from(""),
            CelType::Bytes => Value::bytes(&[][..]),
            CelType::List(_) => Value::list(Vec::new()),
            CelType::Map(_, _) => Value::map(Vec::new(), true),
            CelType::Duration => Value::Duration(CelDuration::ZERO),
            CelType::Timestamp => Value::Timestamp(CelTimestamp::UNIX_EPOCH),
            // unset wrappers read as null
            CelType::Wrapper(_) => Value::Null,
            CelType::Opt(_) => Value::optional_none(),
            CelType::Record(name) => match self.types.get(name) {
                Some(descriptor) => Value::Record(Arc::new(DynRecord {
                    types: self.types.clone(),
                    descriptor: descriptor.clone(),
                    fields: Vec::new(),
                })),
                None => Value::Null,
            },
            _ => Value::Null,
        }
    }
}

impl RecordValue for DynRecord {
    fn type_name(&self) -> &str {
        &self.descriptor.type_name
    }

    fn get_field(&self, name: &str) -> Option<Value> {
        let field = self.descriptor.field(name)?;
        Some(match self.stored(name) {
            Some(value) => value.clone(),
            None => self.default_for(field),
        })
    }

    fn get_field_by_number(&self, number: i32) -> Option<Value> {
        let name = self.descriptor.field_by_number(number)?.name.clone();
        self.get_field(&name)
    }

    fn has_field(&self, name: &str) -> Option<bool> {
        let field = self.descriptor.field(name)?;
        Some(match self.stored(name) {
            None => false,
            Some(value) => field.explicit_presence || !is_zero_value(value),
        })
    }

    fn set_fields(&self) -> Vec<(String, Value)> {
        self.fields.clone()
    }
}

/// The proto3 zero values that read as unset for implicit-presence fields.
fn is_zero_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Int(i) => *i == 0,
        Value::Uint(u) => *u == 0,
        Value::Double(d) => *d == 0.0,
        Value::String(s) => s.is_empty(),
        Value::Bytes(b) => b.is_empty(),
        Value::List(l) => l.is_empty(),
        Value::Map(m) => m.is_empty(),
        _ => false,
    }
}

fn type_accepts(field_type: &CelType, value: &Value) -> bool {
    match (field_type, value) {
        (CelType::Dyn | CelType::Any, _) => true,
        (CelType::Bool, Value::Bool(_)) => true,
        (CelType::Int, Value::Int(_)) => true,
        (CelType::Uint, Value::Uint(_)) => true,
        (CelType::Double, Value::Double(_)) => true,
        (CelType::String, Value::String(_)) => true,
        (CelType::Bytes, Value::Bytes(_)) => true,
        (CelType::Duration, Value::Duration(_)) => true,
        (CelType::Timestamp, Value::Timestamp(_)) => true,
        (CelType::List(_), Value::List(_)) => true,
        (CelType::Map(_, _), Value::Map(_)) => true,
        (CelType::Wrapper(inner), value) => {
            value.kind() == Kind::Null || type_accepts(inner, value)
        }
        (CelType::Opt(inner), Value::Opt(v)) => match v {
            Some(v) => type_accepts(inner, v),
            None => true,
        },
        (CelType::Record(name), Value::Record(r)) => r.type_name() == name,
        (CelType::Record(_), Value::Null) => true,
        _ => false,
    }
}

struct DynRecordBuilder {
    record: DynRecord,
}

impl RecordBuilder for DynRecordBuilder {
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), CelError> {
        let field = self
            .record
            .descriptor
            .field(name)
            .ok_or_else(|| CelError::no_such_field(name))?;
        if !type_accepts(&field.field_type, &value) {
            return Err(CelError::invalid_argument(format!(
                "field '{}' of {} expects {}, got {}",
                name,
                self.record.descriptor.type_name,
                field.field_type,
                value.kind()
            )));
        }
        if let Some(existing) = self.record.fields.iter_mut().find(|(n, _)| n == name) {
            existing.1 = value;
        } else {
            self.record.fields.push((name.to_string(), value));
        }
        Ok(())
    }

    fn build(self: Box<Self>) -> Result<Value, CelError> {
        Ok(Value::Record(Arc::new(self.record)))
    }
}

// ============================================================
//              Well-known protobuf types
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WrapperKind {
    Bool,
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float,
    Double,
    String,
    Bytes,
}

impl WrapperKind {
    fn for_type(type_name: &str) -> Option<WrapperKind> {
        match type_name {
            "google.protobuf.BoolValue" => Some(WrapperKind::Bool),
            "google.protobuf.Int32Value" => Some(WrapperKind::Int32),
            "google.protobuf.Int64Value" => Some(WrapperKind::Int64),
            "google.protobuf.UInt32Value" => Some(WrapperKind::UInt32),
            "google.protobuf.UInt64Value" => Some(WrapperKind::UInt64),
            "google.protobuf.FloatValue" => Some(WrapperKind::Float),
            "google.protobuf.DoubleValue" => Some(WrapperKind::Double),
            "google.protobuf.StringValue" => Some(WrapperKind::String),
            "google.protobuf.BytesValue" => Some(WrapperKind::Bytes),
            _ => None,
        }
    }

    fn value_type(&self) -> CelType {
        match self {
            WrapperKind::Bool => CelType::Bool,
            WrapperKind::Int32 | WrapperKind::Int64 => CelType::Int,
            WrapperKind::UInt32 | WrapperKind::UInt64 => CelType::Uint,
            WrapperKind::Float | WrapperKind::Double => CelType::Double,
            WrapperKind::String => CelType::String,
            WrapperKind::Bytes => CelType::Bytes,
        }
    }

    fn zero(&self) -> Value {
        match self {
            WrapperKind::Bool => Value::Bool(false),
            WrapperKind::Int32 | WrapperKind::Int64 => Value::Int(0),
            WrapperKind::UInt32 | WrapperKind::UInt64 => Value::Uint(0),
            WrapperKind::Float | WrapperKind::Double => Value::Double(0.0),
            WrapperKind::String => Value::from(""),
            WrapperKind::Bytes => Value::bytes(&[][..]),
        }
    }

    fn check_range(&self, value: &Value) -> Result<(), CelError> {
        match (self, value) {
            (WrapperKind::Int32, Value::Int(i)) if i32::try_from(*i).is_err() => Err(
                CelError::invalid_argument(format!("{} out of int32 range", i)),
            ),
            (WrapperKind::UInt32, Value::Uint(u)) if u32::try_from(*u).is_err() => Err(
                CelError::invalid_argument(format!("{} out of uint32 range", u)),
            ),
            _ => Ok(()),
        }
    }
}

/// Wrapper messages build straight to their unwrapped value.
struct WrapperBuilder {
    kind: WrapperKind,
    value: Option<Value>,
}

impl RecordBuilder for WrapperBuilder {
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), CelError> {
        if name != "value" {
            return Err(CelError::no_such_field(name));
        }
        if !type_accepts(&self.kind.value_type(), &value) {
            return Err(CelError::invalid_argument(format!(
                "wrapper value expects {}, got {}",
                self.kind.value_type(),
                value.kind()
            )));
        }
        self.kind.check_range(&value)?;
        self.value = Some(value);
        Ok(())
    }

    fn build(self: Box<Self>) -> Result<Value, CelError> {
        Ok(self.value.unwrap_or_else(|| self.kind.zero()))
    }
}

struct TemporalBuilder {
    is_duration: bool,
    seconds: i64,
    nanos: i64,
}

impl RecordBuilder for TemporalBuilder {
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), CelError> {
        let target = match name {
            "seconds" => &mut self.seconds,
            "nanos" => &mut self.nanos,
            _ => return Err(CelError::no_such_field(name)),
        };
        match value {
            Value::Int(i) => {
                *target = i;
                Ok(())
            }
            other => Err(CelError::invalid_argument(format!(
                "field '{}' expects int, got {}",
                name,
                other.kind()
            ))),
        }
    }

    fn build(self: Box<Self>) -> Result<Value, CelError> {
        let nanos = self.seconds as i128 * 1_000_000_000 + self.nanos as i128;
        if self.is_duration {
            CelDuration::from_nanos(nanos).map(Value::Duration)
        } else {
            CelTimestamp::from_nanos(nanos).map(Value::Timestamp)
        }
    }
}

struct StructBuilder {
    fields: Option<Value>,
}

impl RecordBuilder for StructBuilder {
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), CelError> {
        if name != "fields" {
            return Err(CelError::no_such_field(name));
        }
        if value.kind() != Kind::Map {
            return Err(CelError::invalid_argument(format!(
                "Struct fields expects map, got {}",
                value.kind()
            )));
        }
        self.fields = Some(value);
        Ok(())
    }

    fn build(self: Box<Self>) -> Result<Value, CelError> {
        Ok(self.fields.unwrap_or_else(|| Value::map(Vec::new(), true)))
    }
}

struct ListValueBuilder {
    values: Option<Value>,
}

impl RecordBuilder for ListValueBuilder {
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), CelError> {
        if name != "values" {
            return Err(CelError::no_such_field(name));
        }
        if value.kind() != Kind::List {
            return Err(CelError::invalid_argument(format!(
                "ListValue values expects list, got {}",
                value.kind()
            )));
        }
        self.values = Some(value);
        Ok(())
    }

    fn build(self: Box<Self>) -> Result<Value, CelError> {
        Ok(self.values.unwrap_or_else(|| Value::list(Vec::new())))
    }
}

/// google.protobuf.Value: exactly one variant field may be set.
struct JsonValueBuilder {
    value: Option<Value>,
}

impl RecordBuilder for JsonValueBuilder {
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), CelError> {
        let (expected, out) = match name {
            "null_value" => (Kind::Null, Value::Null),
            "bool_value" => (Kind::Bool, value.clone()),
            "number_value" => (Kind::Double, value.clone()),
            "string_value" => (Kind::String, value.clone()),
            "struct_value" => (Kind::Map, value.clone()),
            "list_value" => (Kind::List, value.clone()),
            _ => return Err(CelError::no_such_field(name)),
        };
        if value.kind() != expected {
            return Err(CelError::invalid_argument(format!(
                "field '{}' expects {}, got {}",
                name,
                expected,
                value.kind()
            )));
        }
        if self.value.is_some() {
            return Err(CelError::invalid_argument(
                "google.protobuf.Value accepts a single variant field",
            ));
        }
        self.value = Some(out);
        Ok(())
    }

    fn build(self: Box<Self>) -> Result<Value, CelError> {
        Ok(self.value.unwrap_or(Value::Null))
    }
}

fn well_known_fields(type_name: &str) -> Option<Vec<FieldDescriptor>> {
    if let Some(kind) = WrapperKind::for_type(type_name) {
        return Some(vec![FieldDescriptor::new("value", 1, kind.value_type())]);
    }
    match type_name {
        "google.protobuf.Duration" | "google.protobuf.Timestamp" => Some(vec![
            FieldDescriptor::new("seconds", 1, CelType::Int),
            FieldDescriptor::new("nanos", 2, CelType::Int),
        ]),
        "google.protobuf.Struct" => Some(vec![FieldDescriptor::new(
            "fields",
            1,
            CelType::map_of(CelType::String, CelType::Dyn),
        )]),
        "google.protobuf.ListValue" => Some(vec![FieldDescriptor::new(
            "values",
            1,
            CelType::list_of(CelType::Dyn),
        )]),
        "google.protobuf.Value" => Some(vec![
            FieldDescriptor::new("null_value", 1, CelType::Null),
            FieldDescriptor::new("number_value", 2, CelType::Double),
            FieldDescriptor::new("string_value", 3, CelType::String),
            FieldDescriptor::new("bool_value", 4, CelType::Bool),
            FieldDescriptor::new("struct_value", 5, CelType::map_of(CelType::String, CelType::Dyn)),
            FieldDescriptor::new("list_value", 6, CelType::list_of(CelType::Dyn)),
        ]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cel_core::MapKey;

    fn message_provider() -> DynRecordProvider {
        DynRecordProvider::new(vec![
            RecordDescriptor::new(
                "test.Account",
                vec![
                    FieldDescriptor::new("name", 1, CelType::String),
                    FieldDescriptor::new("balance", 2, CelType::Int),
                    FieldDescriptor::new("owner", 3, CelType::Record("test.User".into())),
                    FieldDescriptor::new(
                        "nickname",
                        4,
                        CelType::Wrapper(Box::new(CelType::String)),
                    ),
                    FieldDescriptor::new("tags", 5, CelType::list_of(CelType::String)),
                ],
            )
            .unwrap(),
            RecordDescriptor::new(
                "test.User",
                vec![FieldDescriptor::new("id", 1, CelType::Int)],
            )
            .unwrap(),
        ])
        .unwrap()
    }

    fn build_account(fields: Vec<(&str, Value)>) -> Value {
        let provider = message_provider();
        let mut builder = provider.new_builder("test.Account").unwrap();
        for (name, value) in fields {
            builder.set_field(name, value).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_scalar_defaults_and_presence() {
        let account = build_account(vec![("name", Value::from("acct"))]);
        let record = account.as_record().unwrap();

        assert_eq!(record.get_field("balance"), Some(Value::Int(0)));
        assert_eq!(record.has_field("balance"), Some(false));
        assert_eq!(record.has_field("name"), Some(true));
        assert_eq!(record.get_field("tags"), Some(Value::list(vec![])));
        assert_eq!(record.get_field("missing"), None);
        assert_eq!(record.has_field("missing"), None);
    }

    #[test]
    fn test_zero_scalar_reads_as_unset() {
        let account = build_account(vec![("balance", Value::Int(0))]);
        let record = account.as_record().unwrap();
        assert_eq!(
            record.has_field("balance"),
            Some(false),
            "proto3 scalars have no explicit presence"
        );
    }

    #[test]
    fn test_message_field_presence_is_explicit() {
        let provider = message_provider();
        let owner = {
            let mut b = provider.new_builder("test.User").unwrap();
            b.set_field("id", Value::Int(0)).unwrap();
            b.build().unwrap()
        };
        let account = build_account(vec![("owner", owner)]);
        let record = account.as_record().unwrap();
        assert_eq!(record.has_field("owner"), Some(true));

        let unset = build_account(vec![]);
        let unset = unset.as_record().unwrap();
        assert_eq!(unset.has_field("owner"), Some(false));
        // unset message fields read as the empty record
        let default_owner = unset.get_field("owner").unwrap();
        assert_eq!(default_owner.as_record().unwrap().type_name(), "test.User");
    }

    #[test]
    fn test_unset_wrapper_reads_null() {
        let account = build_account(vec![]);
        let record = account.as_record().unwrap();
        assert_eq!(record.get_field("nickname"), Some(Value::Null));
    }

    #[test]
    fn test_builder_rejects_bad_fields() {
        let provider = message_provider();
        let mut builder = provider.new_builder("test.Account").unwrap();
        let err = builder.set_field("nope", Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, cel_core::ErrorKind::NoSuchField);
        let err = builder.set_field("balance", Value::from("text")).unwrap_err();
        assert_eq!(err.kind, cel_core::ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_field_access_by_number() {
        let account = build_account(vec![("balance", Value::Int(7))]);
        let record = account.as_record().unwrap();
        assert_eq!(record.get_field_by_number(2), Some(Value::Int(7)));
        assert_eq!(record.get_field_by_number(99), None);
    }

    #[test]
    fn test_wrappers_unwrap() {
        let provider = DynRecordProvider::empty();
        let mut b = provider.new_builder("google.protobuf.Int64Value").unwrap();
        b.set_field("value", Value::Int(42)).unwrap();
        assert_eq!(b.build().unwrap(), Value::Int(42));

        let empty = provider.new_builder("google.protobuf.BoolValue").unwrap();
        assert_eq!(empty.build().unwrap(), Value::Bool(false));

        let mut out_of_range = provider.new_builder("google.protobuf.Int32Value").unwrap();
        assert!(out_of_range.set_field("value", Value::Int(1 << 40)).is_err());
    }

    #[test]
    fn test_duration_and_timestamp_build_native() {
        let provider = DynRecordProvider::empty();
        let mut b = provider.new_builder("google.protobuf.Duration").unwrap();
        b.set_field("seconds", Value::Int(90)).unwrap();
        assert_eq!(
            b.build().unwrap(),
            Value::Duration(CelDuration::from_seconds(90).unwrap())
        );

        let mut b = provider.new_builder("google.protobuf.Timestamp").unwrap();
        b.set_field("seconds", Value::Int(0)).unwrap();
        assert_eq!(b.build().unwrap(), Value::Timestamp(CelTimestamp::UNIX_EPOCH));
    }

    #[test]
    fn test_struct_and_value_build_native() {
        let provider = DynRecordProvider::empty();
        let mut b = provider.new_builder("google.protobuf.Struct").unwrap();
        let fields = Value::map(
            vec![(MapKey::String("k".into()), Value::from("v"))],
            true,
        );
        b.set_field("fields", fields.clone()).unwrap();
        assert_eq!(b.build().unwrap(), fields);

        let mut b = provider.new_builder("google.protobuf.Value").unwrap();
        b.set_field("number_value", Value::Double(1.5)).unwrap();
        assert_eq!(b.build().unwrap(), Value::Double(1.5));
        let b = provider.new_builder("google.protobuf.Value").unwrap();
        assert_eq!(b.build().unwrap(), Value::Null);
    }

    #[test]
    fn test_well_known_descriptors_visible() {
        let provider = DynRecordProvider::empty();
        let fields = provider
            .field_descriptors("google.protobuf.Duration")
            .unwrap();
        assert_eq!(fields.len(), 2);
        assert!(provider.field_descriptors("absent.Type").is_none());
    }
}
