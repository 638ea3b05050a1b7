//! Type universe
//!
//! Types are value objects: structural equality, no allocation identity.
//! They appear both as static annotations on checked expressions and as
//! first-class `Value::Type` results of the `type()` function.

use std::fmt;

/// A CEL type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CelType {
    /// The dynamic type: matches any kind during overload resolution
    Dyn,
    Null,
    Bool,
    Int,
    Uint,
    Double,
    String,
    Bytes,
    Duration,
    Timestamp,
    /// List with element type
    List(Box<CelType>),
    /// Map with key and value types
    Map(Box<CelType>, Box<CelType>),
    /// Structured record identified by fully qualified type name
    Record(String),
    /// Protobuf wrapper around a primitive (google.protobuf.Int64Value, ...)
    Wrapper(Box<CelType>),
    /// Optional wrapper
    Opt(Box<CelType>),
    /// Host-defined opaque type with parameters
    Opaque { name: String, params: Vec<CelType> },
    /// Function type: result plus argument types
    Function {
        result: Box<CelType>,
        args: Vec<CelType>,
    },
    /// Type parameter introduced by the checker
    TypeParam(String),
    Error,
    Any,
    Unknown,
    /// The type of type values themselves
    TypeOfType,
}

impl CelType {
    pub fn list_of(elem: CelType) -> CelType {
        CelType::List(Box::new(elem))
    }

    pub fn map_of(key: CelType, value: CelType) -> CelType {
        CelType::Map(Box::new(key), Box::new(value))
    }

    /// Parameters of generic kinds, for inspection: list element, map
    /// key/value, wrapper/optional inner, opaque parameters.
    pub fn parameters(&self) -> Vec<&CelType> {
        match self {
            CelType::List(elem) => vec![elem],
            CelType::Map(key, value) => vec![key, value],
            CelType::Wrapper(inner) | CelType::Opt(inner) => vec![inner],
            CelType::Opaque { params, .. } => params.iter().collect(),
            CelType::Function { result, args } => {
                let mut out: Vec<&CelType> = vec![result];
                out.extend(args.iter());
                out
            }
            _ => Vec::new(),
        }
    }

    /// The fully qualified name for named kinds, None otherwise.
    pub fn name(&self) -> Option<&str> {
        match self {
            CelType::Record(name) | CelType::TypeParam(name) => Some(name),
            CelType::Opaque { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for CelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CelType::Dyn => write!(f, "dyn"),
            CelType::Null => write!(f, "null_type"),
            CelType::Bool => write!(f, "bool"),
            CelType::Int => write!(f, "int"),
            CelType::Uint => write!(f, "uint"),
            CelType::Double => write!(f, "double"),
            CelType::String => write!(f, "string"),
            CelType::Bytes => write!(f, "bytes"),
            CelType::Duration => write!(f, "google.protobuf.Duration"),
            CelType::Timestamp => write!(f, "google.protobuf.Timestamp"),
            CelType::List(elem) => write!(f, "list({})", elem),
            CelType::Map(key, value) => write!(f, "map({}, {})", key, value),
            CelType::Record(name) => write!(f, "{}", name),
            CelType::Wrapper(inner) => write!(f, "wrapper({})", inner),
            CelType::Opt(inner) => write!(f, "optional_type({})", inner),
            CelType::Opaque { name, params } => {
                if params.is_empty() {
                    write!(f, "{}", name)
                } else {
                    write!(f, "{}(", name)?;
                    for (i, p) in params.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", p)?;
                    }
                    write!(f, ")")
                }
            }
            CelType::Function { result, args } => {
                write!(f, "function(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", a)?;
                }
                write!(f, ") -> {}", result)
            }
            CelType::TypeParam(name) => write!(f, "{}", name),
            CelType::Error => write!(f, "*error*"),
            CelType::Any => write!(f, "any"),
            CelType::Unknown => write!(f, "*unknown*"),
            CelType::TypeOfType => write!(f, "type"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        let a = CelType::map_of(CelType::String, CelType::list_of(CelType::Int));
        let b = CelType::map_of(CelType::String, CelType::list_of(CelType::Int));
        assert_eq!(a, b);
        assert_ne!(a, CelType::map_of(CelType::String, CelType::Dyn));
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(CelType::list_of(CelType::Int).to_string(), "list(int)");
        assert_eq!(
            CelType::map_of(CelType::String, CelType::Dyn).to_string(),
            "map(string, dyn)"
        );
        assert_eq!(CelType::Record("google.rpc.Status".into()).to_string(), "google.rpc.Status");
    }

    #[test]
    fn test_parameter_inspection() {
        let t = CelType::map_of(CelType::Int, CelType::String);
        let params = t.parameters();
        assert_eq!(params, vec![&CelType::Int, &CelType::String]);
        assert!(CelType::Bool.parameters().is_empty());
    }
}
