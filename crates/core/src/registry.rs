//! Function registry and overload resolution
//!
//! Functions are registered before any evaluation runs (append-only) and
//! the registry is then shared immutably across evaluations. Resolution
//! at a call site:
//! 1. Filter by arity and receiver style.
//! 2. Keep overloads whose parameter kinds accept the argument kinds;
//!    `Dyn` parameters accept anything.
//! 3. Prefer the most specific surviving overload (most exact-kind
//!    parameters); registration order breaks ties.
//! 4. No survivor: a `no_such_overload` error value.

use crate::arena::Allocator;
use crate::celstring::StringBacking;
use crate::error::CelError;
use crate::record::RecordProvider;
use crate::value::{Kind, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A parameter (or result) kind in an overload signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Exact(Kind),
    Dyn,
}

impl ParamKind {
    pub fn accepts(&self, kind: Kind) -> bool {
        match self {
            ParamKind::Dyn => true,
            ParamKind::Exact(expected) => *expected == kind,
        }
    }

    fn is_exact(&self) -> bool {
        matches!(self, ParamKind::Exact(_))
    }
}

/// Everything a function implementation may touch besides its arguments.
pub struct FunctionContext<'a> {
    pub provider: &'a dyn RecordProvider,
    pub alloc: Allocator<'a>,
    /// Heterogeneous numeric equality enabled for this evaluation
    pub hetero: bool,
    /// Backing for strings and bytes the function produces
    pub string_backing: StringBacking,
}

pub type FunctionImpl = Arc<dyn Fn(&[Value], &FunctionContext<'_>) -> Value + Send + Sync>;

/// One concrete implementation of a named function.
#[derive(Clone)]
pub struct Overload {
    pub id: String,
    pub function: String,
    pub receiver_style: bool,
    pub params: Vec<ParamKind>,
    pub result: ParamKind,
    /// Pure overloads may be evaluated at plan time by constant folding.
    /// Host functions that observe ambient state opt out via `impure()`.
    pub pure: bool,
    implementation: FunctionImpl,
}

impl Overload {
    pub fn new(
        function: impl Into<String>,
        id: impl Into<String>,
        receiver_style: bool,
        params: Vec<ParamKind>,
        result: ParamKind,
        implementation: impl Fn(&[Value], &FunctionContext<'_>) -> Value + Send + Sync + 'static,
    ) -> Self {
        Overload {
            id: id.into(),
            function: function.into(),
            receiver_style,
            params,
            result,
            pure: true,
            implementation: Arc::new(implementation),
        }
    }

    /// Mark this overload as not plan-time evaluable.
    pub fn impure(mut self) -> Self {
        self.pure = false;
        self
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn accepts(&self, arg_kinds: &[Kind]) -> bool {
        self.params.len() == arg_kinds.len()
            && self.params.iter().zip(arg_kinds).all(|(p, k)| p.accepts(*k))
    }

    fn specificity(&self) -> usize {
        self.params.iter().filter(|p| p.is_exact()).count()
    }

    pub fn invoke(&self, args: &[Value], ctx: &FunctionContext<'_>) -> Value {
        (self.implementation)(args, ctx)
    }
}

impl fmt::Debug for Overload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overload")
            .field("id", &self.id)
            .field("function", &self.function)
            .field("receiver_style", &self.receiver_style)
            .field("params", &self.params)
            .field("result", &self.result)
            .finish()
    }
}

/// Name → overload-list table with unique overload ids.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    by_function: HashMap<String, Vec<Overload>>,
    by_id: HashMap<String, (String, usize)>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        FunctionRegistry::default()
    }

    /// Append an overload. Duplicate overload ids are rejected.
    pub fn register(&mut self, overload: Overload) -> Result<(), CelError> {
        if self.by_id.contains_key(&overload.id) {
            return Err(CelError::invalid_argument(format!(
                "duplicate overload id: {}",
                overload.id
            )));
        }
        let function = overload.function.clone();
        let list = self.by_function.entry(function.clone()).or_default();
        self.by_id
            .insert(overload.id.clone(), (function, list.len()));
        list.push(overload);
        Ok(())
    }

    pub fn overloads_for(&self, function: &str) -> &[Overload] {
        self.by_function
            .get(function)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Overload> {
        let (function, index) = self.by_id.get(id)?;
        self.by_function.get(function)?.get(*index)
    }

    pub fn has_function(&self, function: &str) -> bool {
        self.by_function.contains_key(function)
    }

    /// Resolve per the rules above; None when nothing matches.
    pub fn resolve(
        &self,
        function: &str,
        receiver_style: bool,
        arg_kinds: &[Kind],
    ) -> Option<&Overload> {
        let mut best: Option<&Overload> = None;
        for overload in self.overloads_for(function) {
            if overload.receiver_style != receiver_style || !overload.accepts(arg_kinds) {
                continue;
            }
            match best {
                None => best = Some(overload),
                // strictly more specific wins; equal keeps the earlier
                // registration
                Some(current) if overload.specificity() > current.specificity() => {
                    best = Some(overload)
                }
                Some(_) => {}
            }
        }
        best
    }

    /// Resolve and invoke. Arguments must already be normal values; the
    /// evaluator handles error/unknown propagation before dispatch.
    pub fn dispatch(
        &self,
        function: &str,
        receiver_style: bool,
        args: &[Value],
        ctx: &FunctionContext<'_>,
    ) -> Value {
        let arg_kinds: Vec<Kind> = args.iter().map(Value::kind).collect();
        match self.resolve(function, receiver_style, &arg_kinds) {
            Some(overload) => overload.invoke(args, ctx),
            None => Value::error(CelError::no_such_overload(function, &arg_kinds)),
        }
    }

    /// Dispatch within a plan-resolved overload set: first id whose
    /// signature accepts the argument kinds wins.
    pub fn dispatch_ids(
        &self,
        function: &str,
        overload_ids: &[String],
        args: &[Value],
        ctx: &FunctionContext<'_>,
    ) -> Value {
        let arg_kinds: Vec<Kind> = args.iter().map(Value::kind).collect();
        for id in overload_ids {
            if let Some(overload) = self.find_by_id(id) {
                if overload.accepts(&arg_kinds) {
                    return overload.invoke(args, ctx);
                }
            }
        }
        Value::error(CelError::no_such_overload(function, &arg_kinds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::EmptyProvider;

    fn ctx() -> FunctionContext<'static> {
        static PROVIDER: EmptyProvider = EmptyProvider;
        FunctionContext {
            provider: &PROVIDER,
            alloc: Allocator::Heap,
            hetero: true,
            string_backing: StringBacking::Contiguous,
        }
    }

    fn registry() -> FunctionRegistry {
        let mut reg = FunctionRegistry::new();
        reg.register(Overload::new(
            "f",
            "f_int",
            false,
            vec![ParamKind::Exact(Kind::Int)],
            ParamKind::Exact(Kind::Int),
            |args, _| Value::Int(args[0].as_int().unwrap() + 1),
        ))
        .unwrap();
        reg.register(Overload::new(
            "f",
            "f_dyn",
            false,
            vec![ParamKind::Dyn],
            ParamKind::Dyn,
            |_, _| Value::from("dyn"),
        ))
        .unwrap();
        reg
    }

    #[test]
    fn test_exact_beats_dyn() {
        let reg = registry();
        let out = reg.dispatch("f", false, &[Value::Int(1)], &ctx());
        assert_eq!(out, Value::Int(2), "exact overload must win over dyn");

        let out = reg.dispatch("f", false, &[Value::from("x")], &ctx());
        assert_eq!(out, Value::from("dyn"));
    }

    #[test]
    fn test_no_overload_is_error_value() {
        let reg = registry();
        let out = reg.dispatch("g", false, &[Value::Int(1)], &ctx());
        let err = out.as_error().expect("missing function must yield error value");
        assert_eq!(err.kind, crate::error::ErrorKind::NoSuchOverload);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut reg = registry();
        let dup = Overload::new(
            "other",
            "f_int",
            false,
            vec![ParamKind::Dyn],
            ParamKind::Dyn,
            |_, _| Value::Null,
        );
        assert!(reg.register(dup).is_err());
    }

    #[test]
    fn test_dispatch_ids_respects_order_and_kinds() {
        let reg = registry();
        let ids = vec!["f_dyn".to_string(), "f_int".to_string()];
        let out = reg.dispatch_ids("f", &ids, &[Value::Int(1)], &ctx());
        assert_eq!(out, Value::from("dyn"), "first matching id in set order wins");
    }

    #[test]
    fn test_receiver_style_filtered() {
        let mut reg = registry();
        reg.register(Overload::new(
            "size",
            "string_size",
            true,
            vec![ParamKind::Exact(Kind::String)],
            ParamKind::Exact(Kind::Int),
            |args, _| Value::Int(args[0].as_string().unwrap().size() as i64),
        ))
        .unwrap();
        assert!(reg.resolve("size", false, &[Kind::String]).is_none());
        assert!(reg.resolve("size", true, &[Kind::String]).is_some());
    }
}
