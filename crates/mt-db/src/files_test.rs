use super::*;
use mt_core::Value;
use tempfile::TempDir;

fn dir_with_files() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("tasks.csv"), "id,a\n1,10\n2,20\n3,30\n").unwrap();
    std::fs::write(
        dir.path().join("people.json"),
        "[{\"name\": \"ann\", \"age\": 31}, {\"name\": \"bo\", \"age\": 7}]",
    )
    .unwrap();
    std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();
    dir
}

#[tokio::test]
async fn test_lists_only_allowed_files() {
    let dir = dir_with_files();
    let src = FileSource::new("files", dir.path()).unwrap();
    assert_eq!(
        src.list_relations().await.unwrap(),
        vec!["people.json", "tasks.csv"]
    );
}

#[tokio::test]
async fn test_fetch_csv_by_full_name_and_stem() {
    let dir = dir_with_files();
    let src = FileSource::new("files", dir.path()).unwrap();
    let full = src.fetch("tasks.csv", &[]).await.unwrap();
    assert_eq!(full.column_names(), vec!["id", "a"]);
    assert_eq!(full.len(), 3);
    let stem = src.fetch("tasks", &["a".to_string()]).await.unwrap();
    assert_eq!(stem.column_names(), vec!["a"]);
    assert_eq!(stem.rows[2][0], Value::Integer(30));
}

#[tokio::test]
async fn test_fetch_json() {
    let dir = dir_with_files();
    let src = FileSource::new("files", dir.path()).unwrap();
    let batch = src.fetch("people", &[]).await.unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.get(0, "name"), Some(&Value::from("ann")));
}

#[tokio::test]
async fn test_unsupported_extension_names_allowed_ones() {
    let dir = dir_with_files();
    let src = FileSource::new("files", dir.path()).unwrap();
    let err = src.fetch("notes.txt", &[]).await.unwrap_err();
    assert!(matches!(err, DbError::UnsupportedFileType { .. }));
    assert_eq!(err.kind(), mt_core::ErrorKind::Validation);
    let msg = err.to_string();
    assert!(msg.contains(".csv, .json, .parquet"), "{msg}");

    let err = src.fetch("missing.xlsx", &[]).await.unwrap_err();
    assert!(matches!(err, DbError::UnsupportedFileType { .. }));
}

#[tokio::test]
async fn test_missing_relation() {
    let dir = dir_with_files();
    let src = FileSource::new("files", dir.path()).unwrap();
    assert!(matches!(
        src.fetch("orders", &[]).await,
        Err(DbError::TableNotFound(_))
    ));
    assert!(!src.has_relation("orders").await.unwrap());
    assert!(src.has_relation("TASKS").await.unwrap());
}

#[tokio::test]
async fn test_describe_csv() {
    let dir = dir_with_files();
    let src = FileSource::new("files", dir.path()).unwrap();
    let cols = src.describe("tasks.csv").await.unwrap();
    assert_eq!(cols.len(), 2);
    assert_eq!(cols[0].0, "id");
    assert_eq!(cols[0].1, ScalarType::Integer);
}

#[test]
fn test_rejects_non_directory() {
    let dir = dir_with_files();
    assert!(FileSource::new("files", &dir.path().join("tasks.csv")).is_err());
}
