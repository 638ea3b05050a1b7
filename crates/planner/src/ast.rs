//! Checked AST
//!
//! The input contract with the external checker: every node carries the
//! checker's integer id, and a side table may pre-resolve call sites to
//! overload ids. Nodes without reference entries force runtime overload
//! resolution.

use cel_core::{CelDuration, CelTimestamp, CelType, Value};
use std::collections::HashMap;

/// Well-known operator function names used by the parser and checker.
pub mod operators {
    pub const ADD: &str = "_+_";
    pub const SUBTRACT: &str = "_-_";
    pub const MULTIPLY: &str = "_*_";
    pub const DIVIDE: &str = "_/_";
    pub const MODULO: &str = "_%_";
    pub const NEGATE: &str = "-_";
    pub const LOGICAL_AND: &str = "_&&_";
    pub const LOGICAL_OR: &str = "_||_";
    pub const LOGICAL_NOT: &str = "!_";
    pub const CONDITIONAL: &str = "_?_:_";
    pub const EQUALS: &str = "_==_";
    pub const NOT_EQUALS: &str = "_!=_";
    pub const LESS: &str = "_<_";
    pub const LESS_EQUALS: &str = "_<=_";
    pub const GREATER: &str = "_>_";
    pub const GREATER_EQUALS: &str = "_>=_";
    pub const INDEX: &str = "_[_]";
    pub const IN: &str = "_in_";
    /// Comprehension loop-condition guard used by the exists/all macros:
    /// true unless the argument is exactly `false`
    pub const NOT_STRICTLY_FALSE: &str = "@not_strictly_false";
}

/// Scalar literal as produced by the parser.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Duration(CelDuration),
    Timestamp(CelTimestamp),
}

impl Constant {
    /// Literal as a runtime value. Literals always start contiguous;
    /// the chunked backing only matters for concatenation results.
    pub fn to_value(&self) -> Value {
        match self {
            Constant::Null => Value::Null,
            Constant::Bool(b) => Value::Bool(*b),
            Constant::Int(i) => Value::Int(*i),
            Constant::Uint(u) => Value::Uint(*u),
            Constant::Double(d) => Value::Double(*d),
            Constant::String(s) => Value::from(s.as_str()),
            Constant::Bytes(b) => Value::bytes(b.as_slice()),
            Constant::Duration(d) => Value::Duration(*d),
            Constant::Timestamp(t) => Value::Timestamp(*t),
        }
    }
}

/// One expression node with its checker-assigned id.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: i64,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Const(Constant),
    /// Pre-evaluated literal inserted by constant folding; never produced
    /// by the checker
    Lit(Value),
    Ident(String),
    Select {
        operand: Box<Expr>,
        field: String,
        /// has(x.f) presence test instead of value access
        test_only: bool,
    },
    Call {
        function: String,
        target: Option<Box<Expr>>,
        args: Vec<Expr>,
    },
    CreateList {
        elements: Vec<Expr>,
    },
    CreateMap {
        entries: Vec<(Expr, Expr)>,
    },
    CreateRecord {
        type_name: String,
        fields: Vec<(String, Expr)>,
    },
    Comprehension {
        iter_var: String,
        iter_range: Box<Expr>,
        accu_var: String,
        accu_init: Box<Expr>,
        loop_condition: Box<Expr>,
        loop_step: Box<Expr>,
        result: Box<Expr>,
    },
}

impl Expr {
    pub fn new(id: i64, kind: ExprKind) -> Expr {
        Expr { id, kind }
    }

    pub fn const_(id: i64, c: Constant) -> Expr {
        Expr::new(id, ExprKind::Const(c))
    }

    pub fn int(id: i64, value: i64) -> Expr {
        Expr::const_(id, Constant::Int(value))
    }

    pub fn uint(id: i64, value: u64) -> Expr {
        Expr::const_(id, Constant::Uint(value))
    }

    pub fn double(id: i64, value: f64) -> Expr {
        Expr::const_(id, Constant::Double(value))
    }

    pub fn bool_(id: i64, value: bool) -> Expr {
        Expr::const_(id, Constant::Bool(value))
    }

    pub fn string(id: i64, value: impl Into<String>) -> Expr {
        Expr::const_(id, Constant::String(value.into()))
    }

    pub fn ident(id: i64, name: impl Into<String>) -> Expr {
        Expr::new(id, ExprKind::Ident(name.into()))
    }

    pub fn select(id: i64, operand: Expr, field: impl Into<String>) -> Expr {
        Expr::new(
            id,
            ExprKind::Select {
                operand: Box::new(operand),
                field: field.into(),
                test_only: false,
            },
        )
    }

    pub fn has(id: i64, operand: Expr, field: impl Into<String>) -> Expr {
        Expr::new(
            id,
            ExprKind::Select {
                operand: Box::new(operand),
                field: field.into(),
                test_only: true,
            },
        )
    }

    /// Global (non-receiver) call
    pub fn call(id: i64, function: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::new(
            id,
            ExprKind::Call {
                function: function.into(),
                target: None,
                args,
            },
        )
    }

    /// Receiver-style call `target.function(args)`
    pub fn rcall(id: i64, function: impl Into<String>, target: Expr, args: Vec<Expr>) -> Expr {
        Expr::new(
            id,
            ExprKind::Call {
                function: function.into(),
                target: Some(Box::new(target)),
                args,
            },
        )
    }

    pub fn list(id: i64, elements: Vec<Expr>) -> Expr {
        Expr::new(id, ExprKind::CreateList { elements })
    }

    pub fn map(id: i64, entries: Vec<(Expr, Expr)>) -> Expr {
        Expr::new(id, ExprKind::CreateMap { entries })
    }

    pub fn record(id: i64, type_name: impl Into<String>, fields: Vec<(String, Expr)>) -> Expr {
        Expr::new(
            id,
            ExprKind::CreateRecord {
                type_name: type_name.into(),
                fields,
            },
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn comprehension(
        id: i64,
        iter_var: impl Into<String>,
        iter_range: Expr,
        accu_var: impl Into<String>,
        accu_init: Expr,
        loop_condition: Expr,
        loop_step: Expr,
        result: Expr,
    ) -> Expr {
        Expr::new(
            id,
            ExprKind::Comprehension {
                iter_var: iter_var.into(),
                iter_range: Box::new(iter_range),
                accu_var: accu_var.into(),
                accu_init: Box::new(accu_init),
                loop_condition: Box::new(loop_condition),
                loop_step: Box::new(loop_step),
                result: Box::new(result),
            },
        )
    }
}

/// Reference resolution for one call site: the candidate overload ids the
/// checker narrowed the call to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reference {
    pub overload_ids: Vec<String>,
}

/// A checked expression: the tree plus the checker's side tables.
#[derive(Debug, Clone, Default)]
pub struct CheckedExpr {
    pub expr: Option<Expr>,
    /// node id → pre-resolved overload candidates
    pub references: HashMap<i64, Reference>,
    /// node id → static type annotation (absent entries force runtime
    /// dispatch)
    pub types: HashMap<i64, CelType>,
}

impl CheckedExpr {
    pub fn unchecked(expr: Expr) -> CheckedExpr {
        CheckedExpr {
            expr: Some(expr),
            references: HashMap::new(),
            types: HashMap::new(),
        }
    }

    pub fn with_reference(mut self, id: i64, overload_ids: Vec<String>) -> CheckedExpr {
        self.references.insert(id, Reference { overload_ids });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_assign_ids() {
        let e = Expr::call(
            3,
            operators::ADD,
            vec![Expr::int(1, 1), Expr::int(2, 2)],
        );
        assert_eq!(e.id, 3);
        match &e.kind {
            ExprKind::Call { function, args, target } => {
                assert_eq!(function, "_+_");
                assert_eq!(args.len(), 2);
                assert!(target.is_none());
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_constant_to_value() {
        let v = Constant::String("hi".into()).to_value();
        assert_eq!(v, Value::from("hi"));
        assert_eq!(Constant::Null.to_value(), Value::Null);
    }
}
