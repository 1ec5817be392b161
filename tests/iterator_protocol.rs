//! Iterator Protocol Tests
//!
//! - next() with nothing pending is a flow error, with FATAL severity
//! - close() is idempotent
//! - reset() restarts against a new context
//! - clone_box() always yields a closed copy

use std::sync::Arc;

use serde_json::json;
use tidequery::context::{Bindings, DynamicContext, Value};
use tidequery::errors::ErrorCode;
use tidequery::expression::{analyse, QueryModule};
use tidequery::functions::FunctionRegistry;
use tidequery::item::Item;
use tidequery::runtime::{Compiler, Runtime};
use tidequery::session::{EngineConfig, Session};

// =============================================================================
// Helper Functions
// =============================================================================

fn lit(value: serde_json::Value) -> serde_json::Value {
    json!({"kind": "literal", "value": value})
}

fn compile(
    session: &Arc<Session>,
    body: serde_json::Value,
) -> (Arc<FunctionRegistry>, Box<dyn Runtime<Item>>) {
    let module = QueryModule::from_value(json!({ "body": body })).unwrap();
    analyse(&module).unwrap();
    Compiler::new(session.catalogue())
        .compile_module(&module)
        .unwrap()
}

fn range(to: serde_json::Value) -> serde_json::Value {
    json!({"kind": "range", "from": lit(json!(1)), "to": to})
}

// =============================================================================
// Lookahead Tests
// =============================================================================

/// Exhausting an iterator and calling next() once more fails with a flow error.
#[test]
fn test_next_past_end_is_flow_error() {
    let session = Session::start(EngineConfig::default()).unwrap();
    let (registry, template) = compile(&session, range(lit(json!(3))));
    let context = DynamicContext::root(Arc::clone(&session), registry);

    let mut iterator = template.clone_box();
    iterator.open(&context).unwrap();

    let mut seen = Vec::new();
    while iterator.has_next() {
        seen.push(iterator.next().unwrap());
    }
    assert_eq!(seen, vec![Item::Integer(1), Item::Integer(2), Item::Integer(3)]);

    let err = iterator.next().unwrap_err();
    assert_eq!(err.code(), ErrorCode::IteratorFlow);
    assert!(err.is_fatal());
}

/// next() on an iterator that was never opened is a flow error.
#[test]
fn test_next_before_open_is_flow_error() {
    let session = Session::start(EngineConfig::default()).unwrap();
    let (_, template) = compile(&session, lit(json!("x")));

    let mut iterator = template.clone_box();
    assert!(!iterator.is_open());
    assert!(!iterator.has_next());
    assert_eq!(iterator.next().unwrap_err().code(), ErrorCode::IteratorFlow);
}

/// has_next() has no side effects.
#[test]
fn test_has_next_is_repeatable() {
    let session = Session::start(EngineConfig::default()).unwrap();
    let (registry, template) = compile(&session, range(lit(json!(1))));
    let context = DynamicContext::root(Arc::clone(&session), registry);

    let mut iterator = template.clone_box();
    iterator.open(&context).unwrap();
    for _ in 0..5 {
        assert!(iterator.has_next());
    }
    assert_eq!(iterator.next().unwrap(), Item::Integer(1));
    assert!(!iterator.has_next());
}

// =============================================================================
// Close / Reset Tests
// =============================================================================

/// close() can be called any number of times, open or not.
#[test]
fn test_close_is_idempotent() {
    let session = Session::start(EngineConfig::default()).unwrap();
    let (registry, template) = compile(&session, range(lit(json!(10))));
    let context = DynamicContext::root(Arc::clone(&session), registry);

    let mut iterator = template.clone_box();
    iterator.close();
    iterator.open(&context).unwrap();
    iterator.next().unwrap();
    iterator.close();
    iterator.close();
    assert!(!iterator.is_open());
    assert!(!iterator.has_next());
}

/// reset() re-drives the iterator against a different context.
#[test]
fn test_reset_uses_new_context() {
    let session = Session::start(EngineConfig::default()).unwrap();

    // A variable reference compiled inside a function body reads its binding
    // from whatever context it is opened against.
    let module = QueryModule::from_value(json!({
        "functions": [{"name": "upto", "parameters": [{"name": "n"}],
                       "body": range(json!({"kind": "variable", "name": "n"}))}],
        "body": lit(json!(0))
    }))
    .unwrap();
    analyse(&module).unwrap();
    let (registry, _) = Compiler::new(session.catalogue())
        .compile_module(&module)
        .unwrap();
    let body = registry.get("upto", 1).unwrap().body().clone_box();
    let root = DynamicContext::root(Arc::clone(&session), Arc::clone(&registry));

    let two = DynamicContext::detached(
        Arc::clone(&session),
        Arc::clone(&registry),
        Bindings::new().with("n", Value::single(Item::Integer(2))),
    );
    let three = root.child(Bindings::new().with("n", Value::single(Item::Integer(3))));

    let mut iterator = body;
    iterator.open(&two).unwrap();
    assert_eq!(iterator.next().unwrap(), Item::Integer(1));

    iterator.reset(&three).unwrap();
    let mut count = 0;
    while iterator.has_next() {
        iterator.next().unwrap();
        count += 1;
    }
    assert_eq!(count, 3);
    iterator.close();
}

/// A copy of an open iterator starts closed and does not disturb the original.
#[test]
fn test_clone_box_is_closed() {
    let session = Session::start(EngineConfig::default()).unwrap();
    let (registry, template) = compile(&session, range(lit(json!(2))));
    let context = DynamicContext::root(Arc::clone(&session), registry);

    let mut iterator = template.clone_box();
    iterator.open(&context).unwrap();
    let copy = iterator.clone_box();

    assert!(!copy.is_open());
    assert_eq!(iterator.next().unwrap(), Item::Integer(1));
    assert_eq!(iterator.next().unwrap(), Item::Integer(2));
}

// =============================================================================
// Distributed Form Tests
// =============================================================================

/// A local iterator has no distributed form.
#[test]
fn test_collection_of_local_iterator_is_flow_error() {
    let session = Session::start(EngineConfig::default()).unwrap();
    let (registry, template) = compile(&session, lit(json!(1)));
    let context = DynamicContext::root(Arc::clone(&session), registry);

    let err = template.clone_box().collection(&context).unwrap_err();
    assert_eq!(err.code(), ErrorCode::IteratorFlow);
}

/// Opening a parallel iterator materializes its collection once.
#[test]
fn test_parallel_iterator_materializes_on_open() {
    let session = Session::start(EngineConfig::default()).unwrap();
    let body = json!({
        "kind": "function-call",
        "name": "parallelize",
        "arguments": [range(lit(json!(5)))]
    });
    let (registry, template) = compile(&session, body);
    let context = DynamicContext::root(Arc::clone(&session), registry);

    let mut iterator = template.clone_box();
    iterator.open(&context).unwrap();
    let mut items = Vec::new();
    while iterator.has_next() {
        items.push(iterator.next().unwrap());
    }
    iterator.close();

    assert_eq!(items, (1..=5).map(Item::Integer).collect::<Vec<_>>());
    let snapshot = session.metrics().snapshot();
    assert_eq!(snapshot.materializations, 1);
    assert_eq!(snapshot.items_materialized, 5);
}
