//! Record contracts
//!
//! Structured values (protobuf-shaped records) are provided by the host
//! through two seams: `RecordValue` is the runtime handle a `Value::Record`
//! carries, and `RecordProvider` introspects and constructs records by
//! fully qualified type name. The engine never sees concrete message
//! types, only these traits.

use crate::error::CelError;
use crate::types::CelType;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Descriptor for one record field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub number: i32,
    pub field_type: CelType,
    /// Whether the field tracks presence explicitly (message and wrapper
    /// fields) or treats the zero value as unset (proto3 scalars).
    pub explicit_presence: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, number: i32, field_type: CelType) -> Self {
        let explicit_presence = matches!(
            field_type,
            CelType::Record(_) | CelType::Wrapper(_) | CelType::Duration | CelType::Timestamp
        );
        FieldDescriptor {
            name: name.into(),
            number,
            field_type,
            explicit_presence,
        }
    }
}

/// Runtime handle for a structured value.
///
/// `get_field` returns None for fields the type does not have; for unset
/// fields it returns the well-defined default (zero, empty record, empty
/// list). `has_field` follows protobuf presence rules.
pub trait RecordValue: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &str;

    fn get_field(&self, name: &str) -> Option<Value>;

    fn get_field_by_number(&self, number: i32) -> Option<Value>;

    /// None when the field does not exist on this type.
    fn has_field(&self, name: &str) -> Option<bool>;

    /// Set fields in declaration order, for equality, debug, and JSON.
    fn set_fields(&self) -> Vec<(String, Value)>;

    fn record_eq(&self, other: &dyn RecordValue) -> bool {
        self.type_name() == other.type_name() && self.set_fields() == other.set_fields()
    }
}

pub type RecordRef = Arc<dyn RecordValue>;

/// Incremental record construction.
pub trait RecordBuilder {
    /// `NoSuchField` for unknown names, `InvalidArgument` for
    /// type-incompatible values.
    fn set_field(&mut self, name: &str, value: Value) -> Result<(), CelError>;

    /// Finish. Returns a `Value` rather than a record handle so providers
    /// can build well-known types (wrappers, Duration, Struct) directly in
    /// their native form.
    fn build(self: Box<Self>) -> Result<Value, CelError>;
}

/// Field introspection and construction, keyed by fully qualified name.
pub trait RecordProvider: Send + Sync {
    /// Declared fields in declaration order; None for unknown types.
    fn field_descriptors(&self, type_name: &str) -> Option<Vec<FieldDescriptor>>;

    /// A fresh builder; None for unknown types.
    fn new_builder(&self, type_name: &str) -> Option<Box<dyn RecordBuilder + '_>>;

    fn has_type(&self, type_name: &str) -> bool {
        self.field_descriptors(type_name).is_some()
    }
}

/// Provider with no types, for evaluations that never touch records.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyProvider;

impl RecordProvider for EmptyProvider {
    fn field_descriptors(&self, _type_name: &str) -> Option<Vec<FieldDescriptor>> {
        None
    }

    fn new_builder(&self, _type_name: &str) -> Option<Box<dyn RecordBuilder + '_>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_inference() {
        assert!(!FieldDescriptor::new("count", 1, CelType::Int).explicit_presence);
        assert!(
            FieldDescriptor::new("nested", 2, CelType::Record("a.B".into())).explicit_presence
        );
        assert!(
            FieldDescriptor::new("opt", 3, CelType::Wrapper(Box::new(CelType::Int)))
                .explicit_presence
        );
    }

    #[test]
    fn test_empty_provider_knows_nothing() {
        let p = EmptyProvider;
        assert!(!p.has_type("google.rpc.Status"));
        assert!(p.new_builder("google.rpc.Status").is_none());
    }
}
