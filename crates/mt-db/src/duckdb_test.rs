use super::*;
use mt_core::Value;

fn source() -> DuckDbSource {
    let src = DuckDbSource::in_memory("warehouse").unwrap();
    src.execute_batch(
        "CREATE TABLE tasks (id INTEGER, a INTEGER, b VARCHAR);
         INSERT INTO tasks VALUES (1, 10, 'x'), (2, 20, NULL);
         CREATE SCHEMA staging;
         CREATE TABLE staging.events (ts TIMESTAMP);
         CREATE VIEW task_ids AS SELECT id FROM tasks;",
    )
    .unwrap();
    src
}

#[tokio::test]
async fn test_list_relations() {
    let src = source();
    assert_eq!(src.name(), "warehouse");
    assert_eq!(src.source_type(), "duckdb");
    let rels = src.list_relations().await.unwrap();
    assert_eq!(rels, vec!["staging.events", "task_ids", "tasks"]);
}

#[tokio::test]
async fn test_fetch_all_columns() {
    let src = source();
    let batch = src.fetch("tasks", &[]).await.unwrap();
    assert_eq!(batch.column_names(), vec!["id", "a", "b"]);
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.get(1, "b"), Some(&Value::Null));
}

#[tokio::test]
async fn test_fetch_projected_case_insensitive() {
    let src = source();
    let batch = src.fetch("TASKS", &["a".to_string()]).await.unwrap();
    assert_eq!(batch.column_names(), vec!["a"]);
    assert_eq!(batch.rows[0][0], Value::Integer(10));
}

#[tokio::test]
async fn test_fetch_view_and_schema_table() {
    let src = source();
    assert_eq!(src.fetch("task_ids", &[]).await.unwrap().len(), 2);
    assert!(src.fetch("staging.events", &[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_missing() {
    let src = source();
    let err = src.fetch("nope", &[]).await.unwrap_err();
    assert!(matches!(err, DbError::TableNotFound(_)));
    assert_eq!(err.kind(), mt_core::ErrorKind::EntityNotExists);
}

#[tokio::test]
async fn test_describe() {
    let src = source();
    let cols = src.describe("tasks").await.unwrap();
    assert_eq!(
        cols,
        vec![
            ("id".to_string(), ScalarType::Integer),
            ("a".to_string(), ScalarType::Integer),
            ("b".to_string(), ScalarType::Text),
        ]
    );
    let cols = src.describe("staging.events").await.unwrap();
    assert_eq!(cols, vec![("ts".to_string(), ScalarType::Timestamp)]);
}

#[tokio::test]
async fn test_has_relation() {
    let src = source();
    assert!(src.has_relation("Tasks").await.unwrap());
    assert!(!src.has_relation("events").await.unwrap());
}

#[tokio::test]
async fn test_from_file_persists() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("w.duckdb");
    {
        let src = DuckDbSource::from_path("w", &path).unwrap();
        src.execute_batch("CREATE TABLE t AS SELECT 1 AS x").unwrap();
    }
    let src = DuckDbSource::new("w", path.to_str().unwrap()).unwrap();
    assert_eq!(src.fetch("t", &[]).await.unwrap().len(), 1);
}
