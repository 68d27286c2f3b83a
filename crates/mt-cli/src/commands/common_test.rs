use super::*;

#[test]
fn test_column_widths_cover_header_and_cells() {
    let widths = calculate_column_widths(
        &["NAME", "V"],
        &[
            vec!["orders".to_string(), "1".to_string()],
            vec!["x".to_string(), "12345".to_string()],
        ],
    );
    assert_eq!(widths, vec![6, 5]);
}

#[test]
fn test_render_table_alignment() {
    let table = render_table(
        &["NAME", "TYPE"],
        &[vec!["orders".to_string(), "model".to_string()]],
    );
    assert_eq!(table, "NAME    TYPE\n------  -----\norders  model");
}

#[test]
fn test_batch_to_json() {
    let batch = RowBatch::from_named(
        &["id", "name", "score"],
        vec![
            vec![Value::Integer(1), Value::Text("a".into()), Value::Float(0.5)],
            vec![Value::Integer(2), Value::Null, Value::Float(f64::NAN)],
        ],
    );
    let json = batch_to_json(&batch);
    assert_eq!(
        json,
        serde_json::json!([
            {"id": 1, "name": "a", "score": 0.5},
            {"id": 2, "name": null, "score": null},
        ])
    );
}
