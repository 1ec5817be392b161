//! Source and Boundary Tests
//!
//! - missing sources fail with the position of the call
//! - peeks and counts never materialize a collection
//! - the materialization cap bounds every distributed-to-local crossing

use std::io::Write;
use std::sync::Arc;

use serde_json::{json, Value as Json};
use tempfile::NamedTempFile;
use tidequery::errors::{ErrorCode, SourcePosition};
use tidequery::expression::QueryModule;
use tidequery::session::{EngineConfig, Session};

// =============================================================================
// Helper Functions
// =============================================================================

fn lit(value: Json) -> Json {
    json!({"kind": "literal", "value": value})
}

fn call(name: &str, arguments: Vec<Json>) -> Json {
    json!({"kind": "function-call", "name": name, "arguments": arguments})
}

fn people() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, r#"{{"name": "ada", "age": 36}}"#).unwrap();
    writeln!(file).unwrap();
    writeln!(file, r#"{{"name": "grace", "age": 45}}"#).unwrap();
    writeln!(file, r#"{{"name": "alan"}}"#).unwrap();
    file
}

fn path(file: &NamedTempFile) -> Json {
    lit(json!(file.path().to_string_lossy()))
}

fn run(session: &Arc<Session>, body: Json) -> Vec<Json> {
    let module = QueryModule::from_value(json!({ "body": body })).unwrap();
    session
        .evaluate(&module)
        .unwrap()
        .iter()
        .map(|item| item.to_json())
        .collect()
}

// =============================================================================
// Ingestion Tests
// =============================================================================

/// A missing file is a resource error located at the call.
#[test]
fn test_missing_source_reports_position() {
    let session = Session::start(EngineConfig::default()).unwrap();
    let module = QueryModule::from_value(json!({
        "body": {
            "kind": "function-call",
            "name": "json-file",
            "arguments": [lit(json!("/nonexistent/people.json"))],
            "position": {"line": 2, "column": 5}
        }
    }))
    .unwrap();

    let err = session.evaluate(&module).unwrap_err();
    assert_eq!(err.code(), ErrorCode::ResourceUnavailable);
    assert_eq!(err.position(), Some(&SourcePosition::new(2, 5)));
}

/// Only local files are readable; remote schemes are recognized but not implemented.
#[test]
fn test_unsupported_scheme() {
    let session = Session::start(EngineConfig::default()).unwrap();
    let module = QueryModule::from_value(json!({
        "body": call("text-file", vec![lit(json!("hdfs://cluster/people.json"))])
    }))
    .unwrap();

    let err = session.evaluate(&module).unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnsupportedFeature);
}

/// Blank lines are skipped and each record is counted once.
#[test]
fn test_json_file_reads_records() {
    let session = Session::start(EngineConfig::default()).unwrap();
    let file = people();

    let mut names = run(
        &session,
        json!({"kind": "object-lookup",
               "object": call("json-file", vec![path(&file)]),
               "key": lit(json!("name"))}),
    );
    names.sort_by_key(|n| n.to_string());

    assert_eq!(names, vec![json!("ada"), json!("alan"), json!("grace")]);
    assert_eq!(session.metrics().snapshot().records_ingested, 3);
}

/// text-file yields every line, blank ones included.
#[test]
fn test_text_file_count() {
    let session = Session::start(EngineConfig::default()).unwrap();
    let file = people();

    let result = run(&session, call("count", vec![call("text-file", vec![path(&file)])]));
    assert_eq!(result, vec![json!(4)]);
}

/// Projection over a columnar source reads a single column.
#[test]
fn test_structured_source_projection() {
    let session = Session::start(EngineConfig::default()).unwrap();
    let file = people();

    let mut ages = run(
        &session,
        json!({"kind": "object-lookup",
               "object": call("structured-json-file", vec![path(&file)]),
               "key": lit(json!("age"))}),
    );
    ages.sort_by_key(|a| a.as_i64());

    assert_eq!(ages, vec![json!(36), json!(45)]);
    assert_eq!(
        run(&session, call("count", vec![call("structured-json-file", vec![path(&file)])])),
        vec![json!(3)]
    );
}

// =============================================================================
// Materialization Tests
// =============================================================================

/// Probing and counting a distributed source pulls nothing to the host.
#[test]
fn test_peeks_do_not_materialize() {
    let session = Session::start(EngineConfig::default()).unwrap();
    let file = people();
    let source = call("json-file", vec![path(&file)]);

    assert_eq!(run(&session, call("empty", vec![source.clone()])), vec![json!(false)]);
    assert_eq!(run(&session, call("exists", vec![source.clone()])), vec![json!(true)]);
    assert_eq!(run(&session, call("count", vec![source.clone()])), vec![json!(3)]);
    assert_eq!(run(&session, call("head", vec![source])).len(), 1);

    assert_eq!(session.metrics().snapshot().materializations, 0);
}

/// A crossing larger than the cap fails; bounded work under the cap succeeds.
#[test]
fn test_materialization_cap() {
    let config = EngineConfig {
        materialization_cap: Some(2),
        ..EngineConfig::default()
    };
    let session = Session::start(config).unwrap();
    let file = people();

    let module = QueryModule::from_value(json!({
        "body": call("json-file", vec![path(&file)])
    }))
    .unwrap();
    let err = session.evaluate(&module).unwrap_err();
    assert_eq!(err.code(), ErrorCode::MaterializationLimit);

    assert_eq!(
        run(&session, call("count", vec![call("json-file", vec![path(&file)])])),
        vec![json!(3)]
    );
}

// =============================================================================
// Partitioning Tests
// =============================================================================

/// The partition argument must be a positive integer.
#[test]
fn test_parallelize_rejects_zero_partitions() {
    let session = Session::start(EngineConfig::default()).unwrap();
    let module = QueryModule::from_value(json!({
        "body": call("parallelize", vec![
            json!({"kind": "range", "from": lit(json!(1)), "to": lit(json!(3))}),
            lit(json!(0))
        ])
    }))
    .unwrap();

    let err = session.evaluate(&module).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

/// A configuration without partitions never starts a session.
#[test]
fn test_zero_default_partitions_rejected() {
    let text = r#"{"default_partitions": 0}"#;
    assert!(EngineConfig::from_json(text).is_err());

    let config: EngineConfig = serde_json::from_str(text).unwrap();
    let err = Session::start(config).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

/// Results are the same whatever the partition count.
#[test]
fn test_partitioning_does_not_change_results() {
    let session = Session::start(EngineConfig::default()).unwrap();
    let numbers = json!({"kind": "range", "from": lit(json!(1)), "to": lit(json!(100))});

    for partitions in [1, 3, 7, 100] {
        let result = run(
            &session,
            call("sum", vec![call("parallelize", vec![numbers.clone(), lit(json!(partitions))])]),
        );
        assert_eq!(result, vec![json!(5050)]);
    }
}
