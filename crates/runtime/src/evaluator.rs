//! Stack evaluator
//!
//! Executes a flat program against an activation. The frame owns a
//! bounded value stack with a parallel attribute-trail stack, the
//! comprehension slot table, the iterator stack, and the per-evaluation
//! lazy-binding memo.
//!
//! Two error planes meet here: CEL-level errors travel the stack as
//! values and propagate through operators; fatal conditions (iteration
//! budget, deadline, trace aborts, internal invariant failures) return
//! out-of-band as `EvalError` and the evaluation has no result.

use crate::activation::Activation;
use crate::options::RuntimeOptions;
use cel_core::{
    Allocator, Arena, AttributeTrail, CelError, EmptyProvider, ErrorKind, FunctionContext,
    FunctionRegistry, MapKey, Qualifier, RecordProvider, UnknownSet, Value,
};
use cel_planner::{Program, SYNTHETIC_ID, StepKind, operators};
use std::collections::HashMap;
use std::time::Instant;
use tracing::debug;

/// Fatal evaluator failure: the evaluation did not complete and there is
/// no result value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The comprehension iteration budget was exhausted
    IterationLimit(u32),
    /// The evaluation deadline passed
    Cancelled,
    /// The trace callback asked to abort
    TraceAborted(String),
    /// An internal invariant failed; always a bug
    Internal(String),
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::IterationLimit(max) => {
                write!(f, "comprehension iteration budget exceeded: {}", max)
            }
            EvalError::Cancelled => write!(f, "evaluation deadline exceeded"),
            EvalError::TraceAborted(msg) => write!(f, "trace callback aborted: {}", msg),
            EvalError::Internal(msg) => write!(f, "internal evaluator error: {}", msg),
        }
    }
}

impl std::error::Error for EvalError {}

/// Per-step observer: `(node id, produced top-of-stack value)`.
/// Returning an error aborts the evaluation.
pub type TraceFn<'t> = dyn FnMut(i64, &Value) -> Result<(), String> + 't;

static EMPTY_PROVIDER: EmptyProvider = EmptyProvider;

/// One evaluation of one program. Borrows everything; many evaluators may
/// share the same program, registry, and provider concurrently.
pub struct Evaluator<'a> {
    program: &'a Program,
    activation: &'a dyn Activation,
    registry: &'a FunctionRegistry,
    provider: &'a dyn RecordProvider,
    options: &'a RuntimeOptions,
    arena: Option<&'a Arena>,
    deadline: Option<Instant>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        program: &'a Program,
        activation: &'a dyn Activation,
        registry: &'a FunctionRegistry,
        options: &'a RuntimeOptions,
    ) -> Self {
        Evaluator {
            program,
            activation,
            registry,
            provider: &EMPTY_PROVIDER,
            options,
            arena: None,
            deadline: None,
        }
    }

    pub fn with_provider(mut self, provider: &'a dyn RecordProvider) -> Self {
        self.provider = provider;
        self
    }

    /// Use a caller-owned arena for scratch allocation instead of a
    /// per-evaluation one.
    pub fn with_arena(mut self, arena: &'a Arena) -> Self {
        self.arena = Some(arena);
        self
    }

    /// Absolute deadline, checked on every step.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn evaluate(&self) -> Result<Value, EvalError> {
        self.run(None)
    }

    pub fn evaluate_with_trace(&self, trace: &mut TraceFn<'_>) -> Result<Value, EvalError> {
        self.run(Some(trace))
    }

    fn run(&self, mut trace: Option<&mut TraceFn<'_>>) -> Result<Value, EvalError> {
        let local_arena;
        let alloc = match self.arena {
            Some(arena) => Allocator::Pool(arena),
            None => {
                local_arena = Arena::new();
                Allocator::Pool(&local_arena)
            }
        };

        let mut frame = Frame {
            stack: Vec::with_capacity(self.program.max_stack_depth()),
            limit: self.program.max_stack_depth(),
            slots: vec![None; self.program.slot_count()],
            iters: Vec::new(),
            iterations: 0,
            lazy_cache: HashMap::new(),
        };

        let steps = self.program.steps();
        let mut pc = 0usize;
        while pc < steps.len() {
            if let Some(deadline) = self.deadline {
                if Instant::now() >= deadline {
                    return Err(EvalError::Cancelled);
                }
            }

            let step = &steps[pc];
            let mut next = pc + 1;
            match &step.kind {
                StepKind::PushConst(value) => {
                    frame.push(value.clone(), AttributeTrail::empty())?;
                }
                StepKind::Ident { name } => {
                    let trail = AttributeTrail::root(name.clone());
                    let value = match self.intercept(&trail) {
                        Some(replaced) => replaced,
                        None => self
                            .lookup(&mut frame, name)
                            .unwrap_or_else(|| Value::error(CelError::no_such_attribute(name))),
                    };
                    frame.push(value, trail)?;
                }
                StepKind::Slot { index } => {
                    let (value, trail) = frame
                        .slots
                        .get(*index)
                        .and_then(Option::as_ref)
                        .cloned()
                        .ok_or_else(|| {
                            EvalError::Internal(format!("read of empty slot {}", index))
                        })?;
                    frame.push(value, trail)?;
                }
                StepKind::Select { field } => {
                    let (operand, trail) = frame.pop()?;
                    let new_trail = trail.extend(Qualifier::Field(field.clone()));
                    let value = if !operand.is_value() {
                        operand
                    } else if let Some(replaced) = self.intercept(&new_trail) {
                        replaced
                    } else {
                        self.select_field(&operand, field)
                    };
                    frame.push(value, new_trail)?;
                }
                StepKind::TestOnlySelect { field } => {
                    let (operand, trail) = frame.pop()?;
                    let new_trail = trail.extend(Qualifier::Field(field.clone()));
                    let value = if !operand.is_value() {
                        operand
                    } else if let Some(replaced) = self.intercept(&new_trail) {
                        replaced
                    } else {
                        self.test_field(&operand, field)
                    };
                    frame.push(value, AttributeTrail::empty())?;
                }
                StepKind::Index => {
                    let (key, _key_trail) = frame.pop()?;
                    let (operand, trail) = frame.pop()?;
                    match propagate_pair(&operand, &key) {
                        Some(out) => frame.push(out, trail)?,
                        None => match key_qualifier(&key, self.hetero()) {
                            None => {
                                let err = CelError::no_such_overload(
                                    operators::INDEX,
                                    &[operand.kind(), key.kind()],
                                );
                                frame.push(Value::error(err), trail)?;
                            }
                            Some(qualifier) => {
                                let new_trail = trail.extend(qualifier);
                                let value = match self.intercept(&new_trail) {
                                    Some(replaced) => replaced,
                                    None => self.index_value(&operand, &key),
                                };
                                frame.push(value, new_trail)?;
                            }
                        },
                    }
                }
                StepKind::Call {
                    function,
                    arity,
                    receiver_style,
                    overload_ids,
                } => {
                    let args = frame.split_off(*arity)?;
                    let value = self.call_function(
                        function,
                        *receiver_style,
                        overload_ids,
                        args,
                        &alloc,
                    );
                    frame.push(value, AttributeTrail::empty())?;
                }
                StepKind::CreateList { size } => {
                    let elems = frame.split_off(*size)?;
                    let value = match propagate(&elems) {
                        Some(out) => out,
                        None => Value::list(elems.into_iter().map(|(v, _)| v).collect()),
                    };
                    frame.push(value, AttributeTrail::empty())?;
                }
                StepKind::CreateMap { entries } => {
                    let parts = frame.split_off(entries * 2)?;
                    let value = match propagate(&parts) {
                        Some(out) => out,
                        None => self.build_map(parts),
                    };
                    frame.push(value, AttributeTrail::empty())?;
                }
                StepKind::CreateRecord {
                    type_name,
                    field_names,
                } => {
                    let values = frame.split_off(field_names.len())?;
                    let value = match propagate(&values) {
                        Some(out) => out,
                        None => self.build_record(type_name, field_names, values),
                    };
                    frame.push(value, AttributeTrail::empty())?;
                }
                StepKind::Jump { target } => {
                    next = *target;
                }
                StepKind::JumpIfFalseOrError { on_false, on_done } => {
                    let (cond, trail) = frame.pop()?;
                    match cond {
                        Value::Bool(true) => {}
                        Value::Bool(false) => next = *on_false,
                        other => {
                            let value = if other.is_value() {
                                Value::error(CelError::no_such_overload(
                                    operators::CONDITIONAL,
                                    &[other.kind()],
                                ))
                            } else {
                                other
                            };
                            frame.push(value, trail)?;
                            next = *on_done;
                        }
                    }
                }
                StepKind::JumpIfAbsorbing { is_and, target } => {
                    let absorbing = !is_and;
                    if frame.peek()?.0.as_bool() == Some(absorbing) {
                        next = *target;
                    }
                }
                StepKind::And2 | StepKind::Or2 => {
                    let is_and = matches!(step.kind, StepKind::And2);
                    let (right, _) = frame.pop()?;
                    let (left, _) = frame.pop()?;
                    frame.push(logical_combine(is_and, left, right), AttributeTrail::empty())?;
                }
                StepKind::IterRangeCheck { done } => {
                    if !frame.peek()?.0.is_value() {
                        next = *done;
                    }
                }
                StepKind::IterInit {
                    iter_slot,
                    accu_slot,
                    done,
                } => {
                    let (accu, accu_trail) = frame.pop()?;
                    let (range, range_trail) = frame.pop()?;
                    frame.slots[*accu_slot] = Some((accu, accu_trail));
                    match iter_items(&range) {
                        Some(items) => frame.iters.push(IterState {
                            items,
                            pos: 0,
                            base_trail: range_trail,
                            iter_slot: *iter_slot,
                            accu_slot: *accu_slot,
                        }),
                        None => {
                            frame.slots[*accu_slot] = None;
                            frame.push(
                                Value::error(CelError::no_matching_overload("<iter-range>")),
                                AttributeTrail::empty(),
                            )?;
                            next = *done;
                        }
                    }
                }
                StepKind::IterNext { iter_slot, finish } => {
                    let state = frame
                        .iters
                        .last_mut()
                        .ok_or_else(|| EvalError::Internal("iterator underflow".into()))?;
                    if state.pos >= state.items.len() {
                        frame.iters.pop();
                        next = *finish;
                    } else {
                        frame.iterations += 1;
                        let max = self.options.comprehension_max_iterations;
                        if max > 0 && frame.iterations > max {
                            return Err(EvalError::IterationLimit(max));
                        }
                        let (value, qualifier) = state.items[state.pos].clone();
                        state.pos += 1;
                        let elem_trail = state.base_trail.extend(qualifier);
                        let value = self.intercept(&elem_trail).unwrap_or(value);
                        frame.slots[*iter_slot] = Some((value, elem_trail));
                    }
                }
                StepKind::LoopCheck { finish, done } => {
                    let (cond, _) = frame.pop()?;
                    match cond {
                        Value::Bool(true) => {}
                        Value::Bool(false) => {
                            if self.options.enable_short_circuiting {
                                frame.close_iter();
                                next = *finish;
                            }
                            // exhaustive mode keeps stepping
                        }
                        other => {
                            let value = if other.is_value() {
                                Value::error(CelError::no_matching_overload("<loop-condition>"))
                            } else {
                                other
                            };
                            frame.close_iter();
                            frame.push(value, AttributeTrail::empty())?;
                            next = *done;
                        }
                    }
                }
                StepKind::StoreAccu {
                    accu_slot,
                    loop_top,
                } => {
                    let entry = frame.pop()?;
                    frame.slots[*accu_slot] = Some(entry);
                    next = *loop_top;
                }
                StepKind::IterFinish {
                    iter_slot,
                    accu_slot,
                } => {
                    frame.slots[*iter_slot] = None;
                    frame.slots[*accu_slot] = None;
                }
            }

            if let Some(trace) = trace.as_deref_mut() {
                if step.id != SYNTHETIC_ID && produces_value(&step.kind) {
                    if let Some((top, _)) = frame.stack.last() {
                        trace(step.id, top).map_err(EvalError::TraceAborted)?;
                    }
                }
            }
            pc = next;
        }

        if frame.stack.len() != 1 {
            return Err(EvalError::Internal(format!(
                "program left {} values on the stack",
                frame.stack.len()
            )));
        }
        let (result, _) = frame.stack.pop().expect("length checked above");
        debug!(kind = %result.kind(), "evaluation finished");
        Ok(result)
    }

    fn hetero(&self) -> bool {
        self.options.enable_heterogeneous_equality
    }

    /// Unknown/missing pattern interception for the trail a step just
    /// produced.
    fn intercept(&self, trail: &AttributeTrail) -> Option<Value> {
        if trail.is_empty() {
            return None;
        }
        if self.options.unknown_tracking_enabled()
            && self
                .activation
                .unknown_patterns()
                .iter()
                .any(|p| p.matches(trail))
        {
            return Some(Value::unknown(UnknownSet::single(trail.clone())));
        }
        if self.options.enable_missing_attribute_errors
            && self
                .activation
                .missing_patterns()
                .iter()
                .any(|p| p.matches(trail))
        {
            return Some(Value::error(CelError::missing_attribute(&trail.to_string())));
        }
        None
    }

    fn lookup(&self, frame: &mut Frame, name: &str) -> Option<Value> {
        if let Some(cached) = frame.lazy_cache.get(name) {
            return Some(cached.clone());
        }
        if let Some(value) = self.activation.find(name) {
            return Some(value);
        }
        let thunk = self.activation.find_lazy(name)?;
        let value = thunk();
        frame.lazy_cache.insert(name.to_string(), value.clone());
        Some(value)
    }

    fn select_field(&self, operand: &Value, field: &str) -> Value {
        match operand {
            Value::Record(record) => record
                .get_field(field)
                .unwrap_or_else(|| Value::error(CelError::no_such_field(field))),
            Value::Map(map) => map
                .get(&MapKey::String(field.into()), self.hetero())
                .cloned()
                .unwrap_or_else(|| Value::error(CelError::no_such_key(field))),
            _ => Value::error(CelError::new(
                ErrorKind::NoSuchOverload,
                format!("type '{}' does not support field selection", operand.kind()),
            )),
        }
    }

    fn test_field(&self, operand: &Value, field: &str) -> Value {
        match operand {
            Value::Record(record) => record
                .has_field(field)
                .map(Value::Bool)
                .unwrap_or_else(|| Value::error(CelError::no_such_field(field))),
            Value::Map(map) => {
                Value::Bool(map.contains_key(&MapKey::String(field.into()), self.hetero()))
            }
            _ => Value::error(CelError::new(
                ErrorKind::NoSuchOverload,
                format!("type '{}' does not support presence tests", operand.kind()),
            )),
        }
    }

    fn index_value(&self, operand: &Value, key: &Value) -> Value {
        match operand {
            Value::List(list) => {
                let index = match list_index(key, self.hetero()) {
                    Some(i) => i,
                    None => {
                        return Value::error(CelError::no_such_overload(
                            operators::INDEX,
                            &[operand.kind(), key.kind()],
                        ));
                    }
                };
                match index.and_then(|i| list.get(i)) {
                    Some(elem) => elem.clone(),
                    None => Value::error(CelError::invalid_argument(format!(
                        "index {} out of range in list of size {}",
                        key.debug_string(),
                        list.len()
                    ))),
                }
            }
            Value::Map(map) => match MapKey::from_value(key, self.hetero()) {
                Some(map_key) => match map.get(&map_key, self.hetero()) {
                    Some(value) => value.clone(),
                    None => Value::error(CelError::no_such_key(&key.debug_string())),
                },
                None => Value::error(CelError::no_such_overload(
                    operators::INDEX,
                    &[operand.kind(), key.kind()],
                )),
            },
            _ => Value::error(CelError::no_such_overload(
                operators::INDEX,
                &[operand.kind(), key.kind()],
            )),
        }
    }

    fn call_function(
        &self,
        function: &str,
        receiver_style: bool,
        overload_ids: &[String],
        args: Vec<(Value, AttributeTrail)>,
        alloc: &Allocator<'_>,
    ) -> Value {
        // The comprehension guard is an operator, not a strict function:
        // errors and unknowns mean "keep iterating".
        if function == operators::NOT_STRICTLY_FALSE && args.len() == 1 && !receiver_style {
            return match args[0].0 {
                Value::Bool(false) => Value::Bool(false),
                _ => Value::Bool(true),
            };
        }
        if let Some(out) = propagate(&args) {
            return out;
        }
        let values: Vec<Value> = args.into_iter().map(|(v, _)| v).collect();
        let ctx = FunctionContext {
            provider: self.provider,
            alloc: *alloc,
            hetero: self.hetero(),
            string_backing: self.options.string_backing,
        };
        if overload_ids.is_empty() {
            self.registry.dispatch(function, receiver_style, &values, &ctx)
        } else {
            self.registry
                .dispatch_ids(function, overload_ids, &values, &ctx)
        }
    }

    fn build_map(&self, parts: Vec<(Value, AttributeTrail)>) -> Value {
        let mut entries = Vec::with_capacity(parts.len() / 2);
        let mut parts = parts.into_iter();
        while let (Some((key, _)), Some((value, _))) = (parts.next(), parts.next()) {
            match MapKey::from_value(&key, false) {
                Some(map_key) => entries.push((map_key, value)),
                None => {
                    return Value::error(CelError::invalid_argument(format!(
                        "unsupported map key type: {}",
                        key.kind()
                    )));
                }
            }
        }
        Value::map(entries, self.hetero())
    }

    fn build_record(
        &self,
        type_name: &str,
        field_names: &[String],
        values: Vec<(Value, AttributeTrail)>,
    ) -> Value {
        let Some(mut builder) = self.provider.new_builder(type_name) else {
            return Value::error(CelError::invalid_argument(format!(
                "unknown message type: {}",
                type_name
            )));
        };
        for (name, (value, _)) in field_names.iter().zip(values) {
            if let Err(err) = builder.set_field(name, value) {
                return Value::error(err);
            }
        }
        match builder.build() {
            Ok(value) => value,
            Err(err) => Value::error(err),
        }
    }
}

/// Transient evaluation state.
struct Frame {
    stack: Vec<(Value, AttributeTrail)>,
    /// planner-computed bound; exceeding it at run time is a plan bug
    limit: usize,
    slots: Vec<Option<(Value, AttributeTrail)>>,
    iters: Vec<IterState>,
    iterations: u32,
    lazy_cache: HashMap<String, Value>,
}

impl Frame {
    fn push(&mut self, value: Value, trail: AttributeTrail) -> Result<(), EvalError> {
        if self.stack.len() >= self.limit {
            return Err(EvalError::Internal("value stack overflow".into()));
        }
        self.stack.push((value, trail));
        Ok(())
    }

    fn pop(&mut self) -> Result<(Value, AttributeTrail), EvalError> {
        self.stack
            .pop()
            .ok_or_else(|| EvalError::Internal("value stack underflow".into()))
    }

    fn peek(&self) -> Result<&(Value, AttributeTrail), EvalError> {
        self.stack
            .last()
            .ok_or_else(|| EvalError::Internal("peek of empty stack".into()))
    }

    fn split_off(&mut self, count: usize) -> Result<Vec<(Value, AttributeTrail)>, EvalError> {
        if self.stack.len() < count {
            return Err(EvalError::Internal("value stack underflow".into()));
        }
        Ok(self.stack.split_off(self.stack.len() - count))
    }

    /// Ends the innermost comprehension early, clearing its slots.
    fn close_iter(&mut self) {
        if let Some(state) = self.iters.pop() {
            self.slots[state.iter_slot] = None;
            self.slots[state.accu_slot] = None;
        }
    }
}

struct IterState {
    items: Vec<(Value, Qualifier)>,
    pos: usize,
    base_trail: AttributeTrail,
    iter_slot: usize,
    accu_slot: usize,
}

/// Materialize the iteration domain: list elements with their indexes, or
/// map keys in insertion order. None for non-iterable ranges.
fn iter_items(range: &Value) -> Option<Vec<(Value, Qualifier)>> {
    match range {
        Value::List(list) => Some(
            list.iter()
                .enumerate()
                .map(|(i, v)| (v.clone(), Qualifier::IntIndex(i as i64)))
                .collect(),
        ),
        Value::Map(map) => Some(
            map.keys()
                .map(|k| (k.to_value(), key_to_qualifier(k)))
                .collect(),
        ),
        _ => None,
    }
}

fn key_to_qualifier(key: &MapKey) -> Qualifier {
    match key {
        MapKey::Bool(b) => Qualifier::BoolIndex(*b),
        MapKey::Int(i) => Qualifier::IntIndex(*i),
        MapKey::Uint(u) => Qualifier::UintIndex(*u),
        MapKey::String(s) => Qualifier::Field(s.as_cow().into_owned()),
    }
}

fn key_qualifier(key: &Value, hetero: bool) -> Option<Qualifier> {
    MapKey::from_value(key, hetero).map(|k| key_to_qualifier(&k))
}

fn list_index(key: &Value, hetero: bool) -> Option<Option<usize>> {
    // outer None: not an index kind; inner None: out of range
    match key {
        Value::Int(i) => Some(usize::try_from(*i).ok()),
        Value::Uint(u) => Some(usize::try_from(*u).ok()),
        Value::Double(d) if hetero => {
            if d.is_finite() && d.trunc() == *d && *d >= 0.0 && *d <= u64::MAX as f64 {
                Some(usize::try_from(*d as u64).ok())
            } else if d.is_finite() && d.trunc() == *d {
                // negative integral double: valid kind, out of range
                Some(None)
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Steps that leave a freshly produced value on top of the stack; only
/// these fire the trace callback.
fn produces_value(kind: &StepKind) -> bool {
    matches!(
        kind,
        StepKind::PushConst(_)
            | StepKind::Ident { .. }
            | StepKind::Slot { .. }
            | StepKind::Select { .. }
            | StepKind::TestOnlySelect { .. }
            | StepKind::Index
            | StepKind::Call { .. }
            | StepKind::CreateList { .. }
            | StepKind::CreateMap { .. }
            | StepKind::CreateRecord { .. }
            | StepKind::And2
            | StepKind::Or2
    )
}

/// Operand propagation for strict operators: unknowns union and win over
/// errors; among errors the first in evaluation order wins.
fn propagate(args: &[(Value, AttributeTrail)]) -> Option<Value> {
    let mut unknown: Option<UnknownSet> = None;
    for (value, _) in args {
        if let Value::Unknown(u) = value {
            unknown = Some(match unknown {
                None => (**u).clone(),
                Some(acc) => acc.union(u),
            });
        }
    }
    if let Some(set) = unknown {
        return Some(Value::unknown(set));
    }
    args.iter()
        .map(|(v, _)| v)
        .find(|v| v.is_error())
        .cloned()
}

fn propagate_pair(left: &Value, right: &Value) -> Option<Value> {
    match (left, right) {
        (Value::Unknown(a), Value::Unknown(b)) => Some(Value::unknown(a.union(b))),
        (Value::Unknown(_), _) => Some(left.clone()),
        (_, Value::Unknown(_)) => Some(right.clone()),
        (Value::Error(_), _) => Some(left.clone()),
        (_, Value::Error(_)) => Some(right.clone()),
        _ => None,
    }
}

/// Commutative short-circuit combine: the absorbing Bool wins over
/// everything, unknowns win over errors, first error wins otherwise.
fn logical_combine(is_and: bool, left: Value, right: Value) -> Value {
    let absorbing = !is_and;
    if left.as_bool() == Some(absorbing) || right.as_bool() == Some(absorbing) {
        return Value::Bool(absorbing);
    }
    match (&left, &right) {
        (Value::Unknown(a), Value::Unknown(b)) => Value::unknown(a.union(b)),
        (Value::Unknown(_), _) => left,
        (_, Value::Unknown(_)) => right,
        (Value::Error(_), _) => left,
        (_, Value::Error(_)) => right,
        (Value::Bool(a), Value::Bool(b)) => Value::Bool(if is_and { *a && *b } else { *a || *b }),
        _ => Value::error(CelError::no_such_overload(
            if is_and {
                operators::LOGICAL_AND
            } else {
                operators::LOGICAL_OR
            },
            &[left.kind(), right.kind()],
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cel_core::AttributeTrail;

    fn unknown(root: &str) -> Value {
        Value::unknown(UnknownSet::single(AttributeTrail::root(root)))
    }

    #[test]
    fn test_logical_combine_table() {
        let err = Value::error(CelError::division_by_zero());

        // absorbing bool beats everything
        assert_eq!(
            logical_combine(true, Value::Bool(false), err.clone()),
            Value::Bool(false)
        );
        assert_eq!(
            logical_combine(true, unknown("a"), Value::Bool(false)),
            Value::Bool(false)
        );
        assert_eq!(
            logical_combine(false, err.clone(), Value::Bool(true)),
            Value::Bool(true)
        );

        // unknown wins over error, both orders
        assert!(logical_combine(true, err.clone(), unknown("a")).is_unknown());
        assert!(logical_combine(true, unknown("a"), err.clone()).is_unknown());

        // unknown && unknown unions
        let combined = logical_combine(true, unknown("a"), unknown("b"));
        assert_eq!(combined.as_unknown().unwrap().len(), 2);

        // plain booleans
        assert_eq!(
            logical_combine(true, Value::Bool(true), Value::Bool(true)),
            Value::Bool(true)
        );
        assert_eq!(
            logical_combine(false, Value::Bool(false), Value::Bool(false)),
            Value::Bool(false)
        );

        // non-bool operand without an absorbing side is an error
        assert!(logical_combine(true, Value::Int(1), Value::Bool(true)).is_error());
    }

    #[test]
    fn test_logical_combine_is_commutative() {
        let err = Value::error(CelError::division_by_zero());
        let cases = vec![
            Value::Bool(true),
            Value::Bool(false),
            err,
            unknown("a"),
            Value::Int(3),
        ];
        for a in &cases {
            for b in &cases {
                for is_and in [true, false] {
                    let ab = logical_combine(is_and, a.clone(), b.clone());
                    let ba = logical_combine(is_and, b.clone(), a.clone());
                    // first-error-wins is the one order-sensitive rule;
                    // everything else must agree in category and content
                    if a.is_error() && b.is_error() {
                        continue;
                    }
                    assert!(
                        ab.equals(&ba, true) || (ab.is_error() && ba.is_error()),
                        "combine({:?}, {:?}) not commutative: {:?} vs {:?}",
                        a,
                        b,
                        ab,
                        ba
                    );
                }
            }
        }
    }

    #[test]
    fn test_propagate_prefers_unknowns() {
        let err = Value::error(CelError::division_by_zero());
        let args = vec![
            (err.clone(), AttributeTrail::empty()),
            (unknown("a"), AttributeTrail::empty()),
        ];
        assert!(propagate(&args).unwrap().is_unknown());

        let args = vec![
            (Value::Int(1), AttributeTrail::empty()),
            (err, AttributeTrail::empty()),
        ];
        assert!(propagate(&args).unwrap().is_error());

        let args = vec![(Value::Int(1), AttributeTrail::empty())];
        assert!(propagate(&args).is_none());
    }

    #[test]
    fn test_list_index_kinds() {
        assert_eq!(list_index(&Value::Int(2), true), Some(Some(2)));
        assert_eq!(list_index(&Value::Int(-1), true), Some(None));
        assert_eq!(list_index(&Value::Double(2.0), true), Some(Some(2)));
        assert_eq!(list_index(&Value::Double(2.5), true), None);
        assert_eq!(list_index(&Value::Double(2.0), false), None);
        assert_eq!(list_index(&Value::from("x"), true), None);
    }
}
