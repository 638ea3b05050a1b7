//! Shared helpers for the evaluator integration tests: macro-style
//! comprehension desugaring and one-call evaluation.

#![allow(dead_code)]

use cel_core::{FunctionRegistry, RecordProvider, Value};
use cel_planner::{CheckedExpr, Expr, operators, plan};
use cel_runtime::{Activation, EvalError, Evaluator, RuntimeOptions, standard_registry};
use std::sync::Once;

static TRACING: Once = Once::new();

/// Honor RUST_LOG in test runs; safe to call from every test.
pub fn init_logging() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

/// Unique expression ids for hand-built ASTs.
pub struct Ids(i64);

impl Ids {
    pub fn new() -> Ids {
        Ids(0)
    }

    pub fn next(&mut self) -> i64 {
        self.0 += 1;
        self.0
    }
}

pub fn eval(
    expr: Expr,
    activation: &dyn Activation,
    options: &RuntimeOptions,
) -> Result<Value, EvalError> {
    let registry = standard_registry();
    eval_with(expr, activation, options, &registry, None)
}

pub fn eval_with(
    expr: Expr,
    activation: &dyn Activation,
    options: &RuntimeOptions,
    registry: &FunctionRegistry,
    provider: Option<&dyn RecordProvider>,
) -> Result<Value, EvalError> {
    init_logging();
    let program = plan(
        &CheckedExpr::unchecked(expr),
        registry,
        &options.plan_options(),
    )
    .expect("test expressions must plan");
    let evaluator = Evaluator::new(&program, activation, registry, options);
    let evaluator = match provider {
        Some(provider) => evaluator.with_provider(provider),
        None => evaluator,
    };
    evaluator.evaluate()
}

/// `range.exists(var, pred)` desugared the way the macro expander does.
pub fn exists_expr(ids: &mut Ids, range: Expr, var: &str, pred: Expr) -> Expr {
    Expr::comprehension(
        ids.next(),
        var,
        range,
        "__result__",
        Expr::bool_(ids.next(), false),
        Expr::call(
            ids.next(),
            operators::NOT_STRICTLY_FALSE,
            vec![Expr::call(
                ids.next(),
                operators::LOGICAL_NOT,
                vec![Expr::ident(ids.next(), "__result__")],
            )],
        ),
        Expr::call(
            ids.next(),
            operators::LOGICAL_OR,
            vec![Expr::ident(ids.next(), "__result__"), pred],
        ),
        Expr::ident(ids.next(), "__result__"),
    )
}

/// `range.all(var, pred)` desugared.
pub fn all_expr(ids: &mut Ids, range: Expr, var: &str, pred: Expr) -> Expr {
    Expr::comprehension(
        ids.next(),
        var,
        range,
        "__result__",
        Expr::bool_(ids.next(), true),
        Expr::call(
            ids.next(),
            operators::NOT_STRICTLY_FALSE,
            vec![Expr::ident(ids.next(), "__result__")],
        ),
        Expr::call(
            ids.next(),
            operators::LOGICAL_AND,
            vec![Expr::ident(ids.next(), "__result__"), pred],
        ),
        Expr::ident(ids.next(), "__result__"),
    )
}

/// `range.map(var, step)` desugared: accumulate `accu + [step]`.
pub fn map_expr(ids: &mut Ids, range: Expr, var: &str, step: Expr) -> Expr {
    Expr::comprehension(
        ids.next(),
        var,
        range,
        "__result__",
        Expr::list(ids.next(), vec![]),
        Expr::bool_(ids.next(), true),
        Expr::call(
            ids.next(),
            operators::ADD,
            vec![
                Expr::ident(ids.next(), "__result__"),
                Expr::list(ids.next(), vec![step]),
            ],
        ),
        Expr::ident(ids.next(), "__result__"),
    )
}

pub fn int_list(ids: &mut Ids, values: &[i64]) -> Expr {
    let elems = values.iter().map(|v| Expr::int(ids.next(), *v)).collect();
    Expr::list(ids.next(), elems)
}
