mod common;

use std::sync::Arc;

use common::{doc, fixture_path};
use grader_extract::{
    mapper::{RecordMapper, SchemaRecordMapper},
    path::get_property,
    record::RecordValue,
    schema::{FieldKind, FieldSpec, Schema, SchemaCatalog},
    stream::Stream,
};
use serde_json::json;

fn dashboard_mapper() -> SchemaRecordMapper {
    let schema = Schema::load(&fixture_path("schemas/dashboard.json")).expect("load schema");
    SchemaRecordMapper::new(Arc::new(schema), "grader")
}

#[test]
fn advertiser_id_resolves_through_nested_identifier() {
    assert_eq!(
        get_property("advertiser_id", &doc(json!({"advertiser": {"_id": "A1"}}))),
        Some(&json!("A1"))
    );
    assert_eq!(
        get_property("advertiser_id", &doc(json!({"advertiser": {}}))),
        None
    );
}

#[test]
fn absent_fields_map_to_empty_strings() {
    let record = dashboard_mapper().map(&doc(json!({"_id": "d9"}))).unwrap();
    for name in ["name", "owner_id", "widgetCount", "conversionRate", "created_at", "tags"] {
        assert_eq!(record.get(name), Some(&RecordValue::empty()), "field {name}");
    }
    assert_eq!(record.len(), 8);
}

#[test]
fn declared_types_drive_coercion() {
    let record = dashboard_mapper()
        .map(&doc(json!({
            "_id": "d1",
            "name": "Main\r\ndashboard\u{0}",
            "owner": {"_id": "u1"},
            "widgetCount": "4",
            "conversionRate": "0.25",
            "created_at": "2024-03-01",
            "created": {"at": "wrong"},
            "tags": ["sales", "q1"],
        })))
        .unwrap();
    assert_eq!(record.get("name"), Some(&RecordValue::from("Main  dashboard ")));
    assert_eq!(record.get("owner_id"), Some(&RecordValue::from("u1")));
    assert_eq!(record.get("widgetCount"), Some(&RecordValue::Integer(4)));
    assert_eq!(record.get("conversionRate"), Some(&RecordValue::Number(0.25)));
    assert_eq!(record.get("created_at"), Some(&RecordValue::from("2024-03-01")));
    assert_eq!(record.get("tags"), Some(&RecordValue::from("sales,q1")));
    assert_eq!(record.get("platform"), Some(&RecordValue::from("grader")));
}

#[test]
fn zero_counts_are_treated_as_absent() {
    let record = dashboard_mapper()
        .map(&doc(json!({"_id": "d2", "widgetCount": 0, "conversionRate": 0.0})))
        .unwrap();
    assert_eq!(record.get("widgetCount"), Some(&RecordValue::empty()));
    assert_eq!(record.get("conversionRate"), Some(&RecordValue::empty()));
}

#[test]
fn mapping_is_deterministic() {
    let mapper = dashboard_mapper();
    let source = doc(json!({"_id": "d3", "name": "Ops", "tags": ["a"], "widgetCount": 2}));
    let first = serde_json::to_string(&mapper.map(&source).unwrap()).unwrap();
    let second = serde_json::to_string(&mapper.map(&source).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn unparseable_integer_fails_the_record() {
    let schema = Schema::from_fields(vec![FieldSpec::new("visits", FieldKind::Integer)]);
    let mapper = SchemaRecordMapper::new(Arc::new(schema), "grader");
    let err = mapper.map(&doc(json!({"visits": "lots"}))).unwrap_err();
    assert_eq!(err.field, "visits");
    assert!(err.to_string().contains("integer"));
}

#[test]
fn catalog_loads_json_and_yaml_schemas() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("batch_job.yaml"),
        "properties:\n  _id:\n    type: string\n  attempts:\n    type: [\"null\", integer]\n",
    )
    .unwrap();
    std::fs::copy(
        fixture_path("schemas/dashboard.json"),
        dir.path().join("dashboard.json"),
    )
    .unwrap();
    let catalog = SchemaCatalog::load_dir(dir.path()).unwrap();
    assert_eq!(
        catalog.streams().collect::<Vec<_>>(),
        vec![Stream::BatchJob, Stream::Dashboard]
    );
    let batch = catalog.get(Stream::BatchJob).unwrap();
    assert_eq!(batch.field("attempts").unwrap().kind, FieldKind::Integer);
    assert!(catalog.get(Stream::Proposal).is_none());
}
