//! CEL core: the value and type universe
//!
//! Key design principles:
//! - Value: a closed tagged sum with O(1) kind access and O(1) cloning
//! - Errors and unknowns are values, propagating through operators
//! - Host seams are traits: RecordProvider for structured records,
//!   FunctionRegistry overloads for callables
//! - The Arena bounds scratch allocation for a single evaluation

pub mod arena;
pub mod attribute;
pub mod celstring;
pub mod duration;
pub mod error;
pub mod json;
pub mod list;
pub mod map;
pub mod record;
pub mod registry;
pub mod timestamp;
pub mod types;
pub mod value;

// Re-export key types
pub use arena::{Allocator, Arena};
pub use attribute::{AttributePattern, AttributeTrail, PatternQualifier, Qualifier, UnknownSet};
pub use celstring::{CelBytes, CelString, StringBacking};
pub use duration::CelDuration;
pub use error::{CelError, ErrorKind};
pub use list::ListValue;
pub use map::{MapKey, MapValue};
pub use record::{
    EmptyProvider, FieldDescriptor, RecordBuilder, RecordProvider, RecordRef, RecordValue,
};
pub use registry::{FunctionContext, FunctionRegistry, Overload, ParamKind};
pub use timestamp::{CelTimestamp, TimeComponents};
pub use types::CelType;
pub use value::{Kind, Value, numeric_compare};
