//! Constant folding
//!
//! An AST → AST pass that evaluates constant subtrees at plan time:
//! literals, pure function calls over constant arguments, and constant
//! list/map literals collapse into pre-evaluated `Lit` nodes.
//!
//! Folding never changes semantics: a fold whose plan-time result is an
//! error or unknown value is abandoned and the subtree left in place, so
//! conditional evaluation and short-circuiting still decide whether that
//! error surfaces. Logicals, conditionals, and comprehensions are never
//! folded as a whole; their constant children are.

use crate::ast::{Expr, ExprKind, operators};
use crate::planner::PlanOptions;
use cel_core::{
    Allocator, EmptyProvider, FunctionContext, FunctionRegistry, Kind, MapKey, StringBacking,
    Value,
};
use tracing::trace;

pub fn fold_constants(expr: &Expr, registry: &FunctionRegistry, options: &PlanOptions) -> Expr {
    Folder { registry, options }.fold(expr)
}

struct Folder<'a> {
    registry: &'a FunctionRegistry,
    options: &'a PlanOptions,
}

impl Folder<'_> {
    fn fold(&self, expr: &Expr) -> Expr {
        let kind = match &expr.kind {
            ExprKind::Const(c) => ExprKind::Lit(c.to_value()),
            ExprKind::Lit(v) => ExprKind::Lit(v.clone()),
            ExprKind::Ident(name) => ExprKind::Ident(name.clone()),
            ExprKind::Select {
                operand,
                field,
                test_only,
            } => ExprKind::Select {
                operand: Box::new(self.fold(operand)),
                field: field.clone(),
                test_only: *test_only,
            },
            ExprKind::Call {
                function,
                target,
                args,
            } => {
                let target = target.as_ref().map(|t| Box::new(self.fold(t)));
                let args: Vec<Expr> = args.iter().map(|a| self.fold(a)).collect();
                if let Some(value) = self.try_fold_call(function, target.as_deref(), &args) {
                    trace!(function, id = expr.id, "folded constant call");
                    ExprKind::Lit(value)
                } else {
                    ExprKind::Call {
                        function: function.clone(),
                        target,
                        args,
                    }
                }
            }
            ExprKind::CreateList { elements } => {
                let elements: Vec<Expr> = elements.iter().map(|e| self.fold(e)).collect();
                match all_literals(&elements) {
                    Some(values) => ExprKind::Lit(Value::list(values)),
                    None => ExprKind::CreateList { elements },
                }
            }
            ExprKind::CreateMap { entries } => {
                let entries: Vec<(Expr, Expr)> = entries
                    .iter()
                    .map(|(k, v)| (self.fold(k), self.fold(v)))
                    .collect();
                match self.try_fold_map(&entries) {
                    Some(value) => ExprKind::Lit(value),
                    None => ExprKind::CreateMap { entries },
                }
            }
            // Records need the provider, which only exists at run time
            ExprKind::CreateRecord { type_name, fields } => ExprKind::CreateRecord {
                type_name: type_name.clone(),
                fields: fields
                    .iter()
                    .map(|(name, value)| (name.clone(), self.fold(value)))
                    .collect(),
            },
            ExprKind::Comprehension {
                iter_var,
                iter_range,
                accu_var,
                accu_init,
                loop_condition,
                loop_step,
                result,
            } => ExprKind::Comprehension {
                iter_var: iter_var.clone(),
                iter_range: Box::new(self.fold(iter_range)),
                accu_var: accu_var.clone(),
                accu_init: Box::new(self.fold(accu_init)),
                loop_condition: Box::new(self.fold(loop_condition)),
                loop_step: Box::new(self.fold(loop_step)),
                result: Box::new(self.fold(result)),
            },
        };
        Expr::new(expr.id, kind)
    }

    /// Fold a call when every operand is a literal and the resolved
    /// overload is pure. None leaves the call in place.
    fn try_fold_call(
        &self,
        function: &str,
        target: Option<&Expr>,
        args: &[Expr],
    ) -> Option<Value> {
        // Short-circuit shapes keep their structure so conditional
        // evaluation semantics survive folding.
        if matches!(
            function,
            operators::LOGICAL_AND | operators::LOGICAL_OR | operators::CONDITIONAL
        ) {
            return None;
        }

        let mut values: Vec<Value> = Vec::with_capacity(args.len() + 1);
        if let Some(target) = target {
            values.push(as_literal(target)?.clone());
        }
        for arg in args {
            values.push(as_literal(arg)?.clone());
        }

        if function == operators::INDEX && target.is_none() && values.len() == 2 {
            return self.try_fold_index(&values[0], &values[1]);
        }

        let kinds: Vec<Kind> = values.iter().map(Value::kind).collect();
        let overload = self
            .registry
            .resolve(function, target.is_some(), &kinds)?;
        if !overload.pure {
            return None;
        }
        let provider = EmptyProvider;
        let ctx = FunctionContext {
            provider: &provider,
            alloc: Allocator::Heap,
            hetero: self.options.hetero,
            string_backing: StringBacking::Contiguous,
        };
        let result = overload.invoke(&values, &ctx);
        result.is_value().then_some(result)
    }

    fn try_fold_index(&self, container: &Value, key: &Value) -> Option<Value> {
        match container {
            Value::List(list) => {
                let index = match key {
                    Value::Int(i) if *i >= 0 => *i as usize,
                    Value::Uint(u) => usize::try_from(*u).ok()?,
                    _ => return None,
                };
                list.get(index).cloned()
            }
            Value::Map(map) => {
                let key = MapKey::from_value(key, self.options.hetero)?;
                map.get(&key, self.options.hetero).cloned()
            }
            _ => None,
        }
    }

    fn try_fold_map(&self, entries: &[(Expr, Expr)]) -> Option<Value> {
        let mut pairs = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            let key = MapKey::from_value(as_literal(key)?, false)?;
            pairs.push((key, as_literal(value)?.clone()));
        }
        let folded = Value::map(pairs, self.options.hetero);
        // duplicate keys stay unfolded so the error surfaces (or not)
        // exactly where evaluation would produce it
        folded.is_value().then_some(folded)
    }
}

fn as_literal(expr: &Expr) -> Option<&Value> {
    match &expr.kind {
        ExprKind::Lit(v) => Some(v),
        _ => None,
    }
}

fn all_literals(exprs: &[Expr]) -> Option<Vec<Value>> {
    exprs.iter().map(|e| as_literal(e).cloned()).collect()
}
