//! List values
//!
//! Ordered finite sequences with a lazily computed element type. Lists are
//! immutable once constructed; concatenation builds a new list.

use crate::types::CelType;
use crate::value::Value;
use std::sync::OnceLock;

#[derive(Debug, Default)]
pub struct ListValue {
    elems: Vec<Value>,
    elem_type: OnceLock<CelType>,
}

impl ListValue {
    pub fn new(elems: Vec<Value>) -> Self {
        ListValue {
            elems,
            elem_type: OnceLock::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.elems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.elems.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.elems.iter()
    }

    pub fn elems(&self) -> &[Value] {
        &self.elems
    }

    /// Element type: the common runtime type when homogeneous, `dyn`
    /// otherwise. Computed once and cached.
    pub fn elem_type(&self) -> &CelType {
        self.elem_type.get_or_init(|| {
            let mut iter = self.elems.iter().map(Value::runtime_type);
            match iter.next() {
                None => CelType::Dyn,
                Some(first) => {
                    if iter.all(|t| t == first) {
                        first
                    } else {
                        CelType::Dyn
                    }
                }
            }
        })
    }

    pub fn concat(&self, other: &ListValue) -> ListValue {
        let mut elems = Vec::with_capacity(self.len() + other.len());
        elems.extend(self.elems.iter().cloned());
        elems.extend(other.elems.iter().cloned());
        ListValue::new(elems)
    }
}

impl PartialEq for ListValue {
    fn eq(&self, other: &Self) -> bool {
        self.elems == other.elems
    }
}

impl From<Vec<Value>> for ListValue {
    fn from(elems: Vec<Value>) -> Self {
        ListValue::new(elems)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elem_type_homogeneous() {
        let list = ListValue::new(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(*list.elem_type(), CelType::Int);
    }

    #[test]
    fn test_elem_type_mixed_is_dyn() {
        let list = ListValue::new(vec![Value::Int(1), Value::from("x")]);
        assert_eq!(*list.elem_type(), CelType::Dyn);
        assert_eq!(*ListValue::new(vec![]).elem_type(), CelType::Dyn);
    }

    #[test]
    fn test_concat_preserves_order() {
        let a = ListValue::new(vec![Value::Int(1)]);
        let b = ListValue::new(vec![Value::Int(2), Value::Int(3)]);
        let joined = a.concat(&b);
        assert_eq!(joined.elems(), &[Value::Int(1), Value::Int(2), Value::Int(3)]);
    }
}
