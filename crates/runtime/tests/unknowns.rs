//! Unknown and missing attribute handling: pattern interception on
//! idents, selects, and indexes; propagation and union through operators;
//! the commutative logical table; and lazy-binding memoization.

mod common;

use cel_core::{AttributePattern, AttributeTrail, ErrorKind, Value};
use cel_planner::{Expr, operators};
use cel_runtime::{EmptyActivation, MapActivation, RuntimeOptions, UnknownTracking};
use common::{Ids, eval, exists_expr, int_list};

fn unknown_options() -> RuntimeOptions {
    RuntimeOptions {
        unknown_tracking: UnknownTracking::AttributeOnly,
        enable_missing_attribute_errors: true,
        ..RuntimeOptions::default()
    }
}

#[test]
fn test_ident_interception() {
    let activation = MapActivation::new()
        .bind("x", Value::Int(1))
        .mark_unknown(AttributePattern::new("x"));
    let mut ids = Ids::new();
    let out = eval(Expr::ident(ids.next(), "x"), &activation, &unknown_options()).unwrap();
    let set = out.as_unknown().expect("bound but marked unknown");
    assert_eq!(set.attributes(), &[AttributeTrail::root("x")]);
}

#[test]
fn test_select_trail_interception() {
    // only request.auth is unknown; request.path still resolves
    let request = Value::map(
        vec![
            (cel_core::MapKey::String("auth".into()), Value::from("token")),
            (cel_core::MapKey::String("path".into()), Value::from("/v1")),
        ],
        true,
    );
    let activation = MapActivation::new()
        .bind("request", request)
        .mark_unknown(AttributePattern::new("request").field("auth"));

    let mut ids = Ids::new();
    let auth = Expr::select(ids.next(), Expr::ident(ids.next(), "request"), "auth");
    let out = eval(auth, &activation, &unknown_options()).unwrap();
    let set = out.as_unknown().expect("request.auth must be unknown");
    assert_eq!(set.attributes()[0].to_string(), "request.auth");

    let path = Expr::select(ids.next(), Expr::ident(ids.next(), "request"), "path");
    let out = eval(path, &activation, &unknown_options()).unwrap();
    assert_eq!(out, Value::from("/v1"));
}

#[test]
fn test_index_trail_interception() {
    let tags = Value::list(vec![Value::from("a"), Value::from("b")]);
    let activation = MapActivation::new()
        .bind("tags", tags)
        .mark_unknown(AttributePattern::new("tags").index(1));

    let mut ids = Ids::new();
    let hit = Expr::call(
        ids.next(),
        operators::INDEX,
        vec![Expr::ident(ids.next(), "tags"), Expr::int(ids.next(), 1)],
    );
    let out = eval(hit, &activation, &unknown_options()).unwrap();
    assert_eq!(out.as_unknown().unwrap().attributes()[0].to_string(), "tags[1]");

    let miss = Expr::call(
        ids.next(),
        operators::INDEX,
        vec![Expr::ident(ids.next(), "tags"), Expr::int(ids.next(), 0)],
    );
    assert_eq!(eval(miss, &activation, &unknown_options()).unwrap(), Value::from("a"));
}

#[test]
fn test_missing_pattern_is_error() {
    let activation = MapActivation::new()
        .bind("secret", Value::from("hunter2"))
        .mark_missing(AttributePattern::new("secret"));
    let mut ids = Ids::new();
    let out = eval(Expr::ident(ids.next(), "secret"), &activation, &unknown_options()).unwrap();
    let err = out.as_error().unwrap();
    assert_eq!(err.kind, ErrorKind::Missing);
    assert!(err.message.contains("secret"));
}

#[test]
fn test_patterns_ignored_when_tracking_disabled() {
    let activation = MapActivation::new()
        .bind("x", Value::Int(1))
        .mark_unknown(AttributePattern::new("x"));
    let mut ids = Ids::new();
    let out = eval(Expr::ident(ids.next(), "x"), &activation, &RuntimeOptions::default()).unwrap();
    assert_eq!(out, Value::Int(1));
}

#[test]
fn test_unknown_absorbed_by_false_and() {
    // x && false == false even when x is unknown
    let activation = MapActivation::new().mark_unknown(AttributePattern::new("x"));
    let mut ids = Ids::new();
    let expr = Expr::call(
        ids.next(),
        operators::LOGICAL_AND,
        vec![Expr::ident(ids.next(), "x"), Expr::bool_(ids.next(), false)],
    );
    assert_eq!(eval(expr, &activation, &unknown_options()).unwrap(), Value::Bool(false));
}

#[test]
fn test_logical_commutativity_end_to_end() {
    // operand pool: true, false, an error, an unknown
    let activation = MapActivation::new().mark_unknown(AttributePattern::new("u"));
    let options = unknown_options();
    let operand = |ids: &mut Ids, tag: usize| match tag {
        0 => Expr::bool_(ids.next(), true),
        1 => Expr::bool_(ids.next(), false),
        2 => Expr::call(
            ids.next(),
            operators::DIVIDE,
            vec![Expr::int(ids.next(), 1), Expr::int(ids.next(), 0)],
        ),
        _ => Expr::ident(ids.next(), "u"),
    };

    for op in [operators::LOGICAL_AND, operators::LOGICAL_OR] {
        for a in 0..4 {
            for b in 0..4 {
                let mut ids = Ids::new();
                let ab = Expr::call(
                    ids.next(),
                    op,
                    vec![operand(&mut ids, a), operand(&mut ids, b)],
                );
                let mut ids = Ids::new();
                let ba = Expr::call(
                    ids.next(),
                    op,
                    vec![operand(&mut ids, b), operand(&mut ids, a)],
                );
                let left = eval(ab, &activation, &options).unwrap();
                let right = eval(ba, &activation, &options).unwrap();
                assert!(
                    left.equals(&right, true),
                    "{} not commutative for operands ({}, {}): {} vs {}",
                    op,
                    a,
                    b,
                    left.debug_string(),
                    right.debug_string()
                );
            }
        }
    }
}

#[test]
fn test_unknowns_union_through_calls() {
    let activation = MapActivation::new()
        .mark_unknown(AttributePattern::new("a"))
        .mark_unknown(AttributePattern::new("b"));
    let mut ids = Ids::new();
    let expr = Expr::call(
        ids.next(),
        operators::ADD,
        vec![Expr::ident(ids.next(), "a"), Expr::ident(ids.next(), "b")],
    );
    let out = eval(expr, &activation, &unknown_options()).unwrap();
    let set = out.as_unknown().expect("call over unknowns is unknown");
    assert_eq!(set.len(), 2);
}

#[test]
fn test_unknown_beats_error_in_strict_calls() {
    let activation = MapActivation::new().mark_unknown(AttributePattern::new("u"));
    let mut ids = Ids::new();
    let error = Expr::call(
        ids.next(),
        operators::DIVIDE,
        vec![Expr::int(ids.next(), 1), Expr::int(ids.next(), 0)],
    );
    let expr = Expr::call(
        ids.next(),
        operators::ADD,
        vec![error, Expr::ident(ids.next(), "u")],
    );
    let out = eval(expr, &activation, &unknown_options()).unwrap();
    assert!(out.is_unknown(), "unknowns win over errors: {}", out.debug_string());
}

#[test]
fn test_unknown_range_short_circuits_comprehension() {
    let activation = MapActivation::new().mark_unknown(AttributePattern::new("xs"));
    let mut ids = Ids::new();
    let range = Expr::ident(ids.next(), "xs");
    let pred = Expr::bool_(ids.next(), true);
    let expr = exists_expr(&mut ids, range, "x", pred);
    let out = eval(expr, &activation, &unknown_options()).unwrap();
    assert!(out.is_unknown(), "unknown range becomes the comprehension result");
}

#[test]
fn test_comprehension_element_interception() {
    // marking xs[1] unknown makes the exists result unknown when no
    // other element matches
    let activation = MapActivation::new()
        .bind(
            "xs",
            Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)]),
        )
        .mark_unknown(AttributePattern::new("xs").index(1));
    let mut ids = Ids::new();
    let range = Expr::ident(ids.next(), "xs");
    let x = Expr::ident(ids.next(), "x");
    let pred = Expr::call(
        ids.next(),
        operators::GREATER,
        vec![x, Expr::int(ids.next(), 100)],
    );
    let expr = exists_expr(&mut ids, range, "x", pred);
    let out = eval(expr, &activation, &unknown_options()).unwrap();
    assert!(
        out.is_unknown(),
        "the withheld element could still satisfy the predicate: {}",
        out.debug_string()
    );
}

#[test]
fn test_exhaustive_mode_still_matches_short_circuit_answers() {
    let build = |short: bool| {
        let mut ids = Ids::new();
        let range = int_list(&mut ids, &[1, 2, 3]);
        let x = Expr::ident(ids.next(), "x");
        let pred = Expr::call(
            ids.next(),
            operators::GREATER,
            vec![x, Expr::int(ids.next(), 1)],
        );
        let expr = exists_expr(&mut ids, range, "x", pred);
        let options = RuntimeOptions {
            enable_short_circuiting: short,
            ..RuntimeOptions::default()
        };
        eval(expr, &EmptyActivation, &options).unwrap()
    };
    assert_eq!(build(true), build(false));
    assert_eq!(build(true), Value::Bool(true));
}

#[test]
fn test_lazy_bindings_force_once_per_evaluation() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    static CALLS: AtomicUsize = AtomicUsize::new(0);

    let activation = MapActivation::new().bind_lazy("expensive", || {
        CALLS.fetch_add(1, Ordering::SeqCst);
        Value::Int(21)
    });

    // expensive + expensive: two reads, one forcing
    let mut ids = Ids::new();
    let expr = Expr::call(
        ids.next(),
        operators::ADD,
        vec![
            Expr::ident(ids.next(), "expensive"),
            Expr::ident(ids.next(), "expensive"),
        ],
    );
    let out = eval(expr.clone(), &activation, &RuntimeOptions::default()).unwrap();
    assert_eq!(out, Value::Int(42));
    assert_eq!(CALLS.load(Ordering::SeqCst), 1, "thunk forced once per evaluation");

    let _ = eval(expr, &activation, &RuntimeOptions::default()).unwrap();
    assert_eq!(CALLS.load(Ordering::SeqCst), 2, "fresh evaluation forces again");
}

#[test]
fn test_missing_attribute_lookup_is_error_value() {
    let mut ids = Ids::new();
    let out = eval(
        Expr::ident(ids.next(), "nowhere"),
        &EmptyActivation,
        &RuntimeOptions::default(),
    )
    .unwrap();
    assert_eq!(out.as_error().unwrap().kind, ErrorKind::NoSuchAttribute);
}
