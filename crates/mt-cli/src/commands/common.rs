//! Shared output helpers

use chrono::NaiveDateTime;
use mt_core::{RowBatch, Value, TIMESTAMP_FORMAT};

/// Widest cell per column, header included, counted in chars
pub(crate) fn calculate_column_widths<S: AsRef<str>>(
    headers: &[S],
    rows: &[Vec<String>],
) -> Vec<usize> {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.as_ref().chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(cell.chars().count());
        }
    }
    widths
}

/// Render a left-aligned table: header row, dashed separator, data rows.
/// Columns are separated by two spaces.
pub(crate) fn render_table<S: AsRef<str>>(headers: &[S], rows: &[Vec<String>]) -> String {
    let widths = calculate_column_widths(headers, rows);
    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{:<width$}", cell, width = w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = Vec::with_capacity(rows.len() + 2);
    out.push(line(headers.iter().map(|h| h.as_ref()).collect()));
    out.push(
        widths
            .iter()
            .map(|&w| "-".repeat(w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    for row in rows {
        out.push(line(row.iter().map(String::as_str).collect()));
    }
    out.join("\n")
}

pub(crate) fn print_table<S: AsRef<str>>(headers: &[S], rows: &[Vec<String>]) {
    println!("{}", render_table(headers, rows));
}

/// Print a batch as a table followed by its row count
pub(crate) fn print_batch(batch: &RowBatch) {
    let headers = batch.column_names();
    let rows: Vec<Vec<String>> = batch
        .rows
        .iter()
        .map(|row| row.iter().map(Value::to_string).collect())
        .collect();
    print_table(&headers, &rows);
    println!(
        "({} row{})",
        batch.len(),
        if batch.len() == 1 { "" } else { "s" }
    );
}

/// A batch as a JSON array of `{column: value}` objects
pub(crate) fn batch_to_json(batch: &RowBatch) -> serde_json::Value {
    let names = batch.column_names();
    let rows = batch
        .rows
        .iter()
        .map(|row| {
            let object: serde_json::Map<String, serde_json::Value> = names
                .iter()
                .cloned()
                .zip(row.iter().map(value_to_json))
                .collect();
            serde_json::Value::Object(object)
        })
        .collect();
    serde_json::Value::Array(rows)
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Timestamp(t) => serde_json::Value::String(format_timestamp(t)),
        Value::Text(s) => serde_json::Value::String(s.clone()),
    }
}

pub(crate) fn format_timestamp(t: &NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

pub(crate) fn format_optional_timestamp(t: Option<&NaiveDateTime>) -> String {
    t.map(format_timestamp).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
