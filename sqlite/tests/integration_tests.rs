//! Integration tests for the record-store-sqlite crate.

use std::sync::Arc;
use std::thread;

use record_store_core::{Record, SchemaError, Value};
use record_store_sqlite::{ErrorKind, OnConflict, RecordStore, StoreError};

fn rec(json: &str) -> Record {
    serde_json::from_str(json).unwrap()
}

fn temp_store() -> (tempfile::TempDir, RecordStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = RecordStore::open(dir.path().join("records.db"));
    (dir, store)
}

fn row_by_id(store: &RecordStore, table: &str, id: &str) -> record_store_sqlite::Row {
    store
        .fetch_rows(table, None)
        .unwrap()
        .into_iter()
        .find(|row| row.get("id") == Some(id))
        .unwrap_or_else(|| panic!("row {id} not found"))
}

// ---------------------------------------------------------------------------
// Round trip
// ---------------------------------------------------------------------------

#[test]
fn round_trip_scalars_nested_and_sequences() {
    let (_dir, store) = temp_store();
    let record = rec(
        r#"{
            "id": "p1",
            "name": "Ada",
            "age": 36,
            "ratio": 0.5,
            "active": true,
            "note": null,
            "dims": {"w": 3, "depth": {"cm": 2}},
            "tags": ["a", {"b": 1}]
        }"#,
    );
    store
        .add_records("people", &[record], "id", OnConflict::Ignore)
        .unwrap();

    let row = row_by_id(&store, "people", "p1");
    assert_eq!(row.get("name"), Some("Ada"));
    assert_eq!(row.get("age"), Some("36"));
    assert_eq!(row.get("ratio"), Some("0.5"));
    assert_eq!(row.get("active"), Some("true"));
    assert!(row.is_null("note"));
    assert_eq!(row.get("dims_w"), Some("3"));
    assert_eq!(row.get("dims_depth_cm"), Some("2"));

    let tags = row.decode("tags").unwrap().unwrap();
    let expected = Value::from(vec![
        Value::from("a"),
        Value::from(Record::new().with("b", 1)),
    ]);
    assert_eq!(tags, expected);
}

#[test]
fn columns_follow_creation_order() {
    let (_dir, store) = temp_store();
    store
        .add_records("t", &[rec(r#"{"id": "1", "b": 1, "a": 2}"#)], "id", OnConflict::Ignore)
        .unwrap();
    store
        .add_records("t", &[rec(r#"{"id": "2", "c": 3}"#)], "id", OnConflict::Ignore)
        .unwrap();
    assert_eq!(store.list_columns("t").unwrap(), ["id", "a", "b", "c"]);
}

// ---------------------------------------------------------------------------
// Conflict policies
// ---------------------------------------------------------------------------

#[test]
fn ignore_inserts_are_idempotent() {
    let (_dir, store) = temp_store();
    let batch = [rec(r#"{"id": "1", "color": "red"}"#)];

    let first = store.add_records("t", &batch, "id", OnConflict::Ignore).unwrap();
    assert_eq!(first.inserted, 1);
    let second = store.add_records("t", &batch, "id", OnConflict::Ignore).unwrap();
    assert_eq!((second.inserted, second.ignored), (0, 1));

    assert_eq!(store.count_rows("t").unwrap(), 1);
}

#[test]
fn ignore_keeps_existing_values() {
    let (_dir, store) = temp_store();
    store
        .add_records("t", &[rec(r#"{"id": "1", "color": "red"}"#)], "id", OnConflict::Ignore)
        .unwrap();
    store
        .add_records("t", &[rec(r#"{"id": "1", "color": "blue"}"#)], "id", OnConflict::Ignore)
        .unwrap();
    assert_eq!(row_by_id(&store, "t", "1").get("color"), Some("red"));
}

#[test]
fn overwrite_replaces_batch_columns_and_nulls_absent_ones() {
    let (_dir, store) = temp_store();
    store
        .add_records(
            "t",
            &[rec(r#"{"id": "1", "color": "red", "size": "M", "kept": "yes"}"#)],
            "id",
            OnConflict::Ignore,
        )
        .unwrap();

    // "size" is in the batch union through record 2 but absent from record 1.
    let report = store
        .add_records(
            "t",
            &[
                rec(r#"{"id": "1", "color": "blue"}"#),
                rec(r#"{"id": "2", "color": "green", "size": "L"}"#),
            ],
            "id",
            OnConflict::Overwrite,
        )
        .unwrap();
    assert_eq!((report.inserted, report.updated), (1, 1));

    let row = row_by_id(&store, "t", "1");
    assert_eq!(row.get("color"), Some("blue"));
    assert!(row.is_null("size"));
    // Outside the batch union, so untouched.
    assert_eq!(row.get("kept"), Some("yes"));
}

// ---------------------------------------------------------------------------
// Schema evolution and collisions
// ---------------------------------------------------------------------------

#[test]
fn new_field_adds_column_and_leaves_old_rows_null() {
    let (_dir, store) = temp_store();
    store
        .add_records("t", &[rec(r#"{"id": "1", "a": "x"}"#)], "id", OnConflict::Ignore)
        .unwrap();
    let report = store
        .add_records("t", &[rec(r#"{"id": "2", "a": "y", "x": 5}"#)], "id", OnConflict::Ignore)
        .unwrap();
    assert_eq!(report.columns_added, ["x"]);
    assert!(!report.table_created);

    assert!(store.list_columns("t").unwrap().contains(&"x".to_string()));
    assert!(row_by_id(&store, "t", "1").is_null("x"));
    assert_eq!(row_by_id(&store, "t", "2").get("x"), Some("5"));
}

#[test]
fn colliding_paths_are_rejected_without_writing() {
    let (_dir, store) = temp_store();
    store
        .add_records("t", &[rec(r#"{"id": "0"}"#)], "id", OnConflict::Ignore)
        .unwrap();

    let err = store
        .add_records(
            "t",
            &[rec(r#"{"id": "1", "a-b": 1}"#), rec(r#"{"id": "2", "a.b": 2}"#)],
            "id",
            OnConflict::Ignore,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert!(matches!(
        err,
        StoreError::Schema(SchemaError::IdentifierCollision { .. })
    ));

    assert_eq!(store.count_rows("t").unwrap(), 1);
    assert_eq!(store.list_columns("t").unwrap(), ["id"]);
}

#[test]
fn nested_and_flat_spellings_collide() {
    let (_dir, store) = temp_store();
    let err = store
        .add_records(
            "t",
            &[rec(r#"{"id": "1", "dims": {"w": 1}, "dims_w": 2}"#)],
            "id",
            OnConflict::Ignore,
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Schema);
    assert!(!store.table_exists("t").unwrap());
}

#[test]
fn non_finite_number_is_serialization_error() {
    let (_dir, store) = temp_store();
    let record = Record::new().with("id", "1").with("score", f64::INFINITY);
    let err = store
        .add_records("t", &[record], "id", OnConflict::Ignore)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Serialization);
}

// ---------------------------------------------------------------------------
// Update and delete by id
// ---------------------------------------------------------------------------

#[test]
fn sparse_update_leaves_other_columns() {
    let (_dir, store) = temp_store();
    store
        .add_records(
            "t",
            &[rec(r#"{"id": "1", "color": "blue", "size": "M"}"#)],
            "id",
            OnConflict::Ignore,
        )
        .unwrap();

    let changed = store
        .update_by_id("t", "1", &rec(r#"{"size": "XL", "weight": 2}"#), "id")
        .unwrap();
    assert_eq!(changed, 1);

    let row = row_by_id(&store, "t", "1");
    assert_eq!(row.get("color"), Some("blue"));
    assert_eq!(row.get("size"), Some("XL"));
    assert_eq!(row.get("weight"), Some("2"));
}

#[test]
fn missing_ids_are_no_ops() {
    let (_dir, store) = temp_store();
    store
        .add_records("t", &[rec(r#"{"id": "1", "a": "x"}"#)], "id", OnConflict::Ignore)
        .unwrap();

    assert_eq!(
        store
            .update_by_id("t", "nope", &rec(r#"{"a": "y"}"#), "id")
            .unwrap(),
        0
    );
    assert_eq!(store.delete_by_id("t", "nope").unwrap(), 0);
    assert_eq!(store.count_rows("t").unwrap(), 1);

    assert_eq!(store.delete_by_id("t", "1").unwrap(), 1);
    assert_eq!(store.count_rows("t").unwrap(), 0);
}

#[test]
fn delete_uses_declared_primary_key() {
    let (_dir, store) = temp_store();
    store
        .add_records("t", &[rec(r#"{"sku": "A1", "id": "other"}"#)], "sku", OnConflict::Ignore)
        .unwrap();
    assert_eq!(store.primary_key("t").unwrap(), "sku");
    assert_eq!(store.delete_by_id("t", "other").unwrap(), 0);
    assert_eq!(store.delete_by_id("t", "A1").unwrap(), 1);
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[test]
fn exists_value_matches_encoded_leaves() {
    let (_dir, store) = temp_store();
    store
        .add_records(
            "t",
            &[rec(r#"{"id": "1", "qty": 3, "tags": ["x"], "color": "red"}"#)],
            "id",
            OnConflict::Ignore,
        )
        .unwrap();

    assert!(store.exists_value("t", "qty", &Value::from(3)).unwrap());
    assert!(store.exists_value("t", "qty", &Value::from("3")).unwrap());
    assert!(store
        .exists_value("t", "tags", &Value::from(vec![Value::from("x")]))
        .unwrap());
    assert!(!store.exists_value("t", "color", &Value::from("blue")).unwrap());

    let err = store
        .exists_value("t", "missing", &Value::from("x"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn missing_table_and_store_are_not_found() {
    let (dir, store) = temp_store();
    assert!(matches!(
        store.count_rows("t").unwrap_err(),
        StoreError::StoreNotFound(_)
    ));

    store
        .add_records("t", &[rec(r#"{"id": "1"}"#)], "id", OnConflict::Ignore)
        .unwrap();
    for err in [
        store.count_rows("other").unwrap_err(),
        store.list_columns("other").unwrap_err(),
        store.fetch_rows("other", None).unwrap_err(),
        store.delete_by_id("other", "1").unwrap_err(),
    ] {
        assert!(matches!(err, StoreError::TableNotFound(_)), "{err}");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    let missing = RecordStore::open(dir.path().join("nowhere.db"));
    assert_eq!(
        missing.list_columns("t").unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn concurrent_writers_evolve_one_table() {
    let (_dir, store) = temp_store();
    let store = Arc::new(store);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..5 {
                    let record = Record::new()
                        .with("id", format!("{worker}-{i}"))
                        .with(format!("field_{worker}"), i);
                    store
                        .add_records("shared", &[record], "id", OnConflict::Ignore)
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.count_rows("shared").unwrap(), 20);
    let columns = store.list_columns("shared").unwrap();
    assert_eq!(columns.len(), 5);
    for worker in 0..4 {
        assert!(columns.contains(&format!("field_{worker}")));
    }
}
