//! In-memory row batches with qualified column identity

use crate::value::{ScalarType, Value};
use serde::Serialize;
use std::fmt;

/// Identity of a column inside a batch: an optional relation qualifier
/// (table name or alias) plus the column name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ColumnId {
    pub qualifier: Option<String>,
    pub name: String,
}

impl ColumnId {
    /// An unqualified column
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            qualifier: None,
            name: name.into(),
        }
    }

    /// A column qualified by a relation alias
    pub fn qualified(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            qualifier: Some(qualifier.into()),
            name: name.into(),
        }
    }

    /// Replace the qualifier, keeping the name
    pub fn with_qualifier(&self, qualifier: Option<&str>) -> Self {
        Self {
            qualifier: qualifier.map(str::to_string),
            name: self.name.clone(),
        }
    }

    /// Whether a reference `qualifier.name` (qualifier optional) denotes
    /// this column. Matching is case-insensitive.
    pub fn matches(&self, qualifier: Option<&str>, name: &str) -> bool {
        if !self.name.eq_ignore_ascii_case(name) {
            return false;
        }
        match (qualifier, &self.qualifier) {
            (None, _) => true,
            (Some(q), Some(own)) => own.eq_ignore_ascii_case(q),
            (Some(_), None) => false,
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{}", q, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Outcome of looking a column reference up in a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnLookup {
    Found(usize),
    Missing,
    Ambiguous,
}

/// Resolve a column reference against a list of column identities.
///
/// Several matches are ambiguous unless they all carry the same identity
/// (e.g. `SELECT a, a`), in which case the first wins.
pub fn lookup_column(columns: &[ColumnId], qualifier: Option<&str>, name: &str) -> ColumnLookup {
    let mut found: Option<usize> = None;
    for (idx, col) in columns.iter().enumerate() {
        if !col.matches(qualifier, name) {
            continue;
        }
        match found {
            None => found = Some(idx),
            Some(first) if columns[first] == *col => {}
            Some(_) => return ColumnLookup::Ambiguous,
        }
    }
    match found {
        Some(idx) => ColumnLookup::Found(idx),
        None => ColumnLookup::Missing,
    }
}

/// A fully materialized relation: column identities plus row-major values.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RowBatch {
    pub columns: Vec<ColumnId>,
    pub rows: Vec<Vec<Value>>,
}

impl RowBatch {
    /// Create a batch from columns and rows
    pub fn new(columns: Vec<ColumnId>, rows: Vec<Vec<Value>>) -> Self {
        Self { columns, rows }
    }

    /// Create an empty batch with the given columns
    pub fn empty(columns: Vec<ColumnId>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a batch with unqualified column names
    pub fn from_named<S: AsRef<str>>(names: &[S], rows: Vec<Vec<Value>>) -> Self {
        let columns = names.iter().map(|n| ColumnId::bare(n.as_ref())).collect();
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Column names without qualifiers, in order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// Resolve a column reference, see [`lookup_column`]
    pub fn lookup(&self, qualifier: Option<&str>, name: &str) -> ColumnLookup {
        lookup_column(&self.columns, qualifier, name)
    }

    /// Index of an unqualified column by name, if unambiguous
    pub fn index_of(&self, name: &str) -> Option<usize> {
        match self.lookup(None, name) {
            ColumnLookup::Found(idx) => Some(idx),
            _ => None,
        }
    }

    /// Values of one column, top to bottom
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().map(move |r| r.get(idx).unwrap_or(&Value::Null))
    }

    /// Value at `(row, column name)`, for assertions and printing
    pub fn get(&self, row: usize, name: &str) -> Option<&Value> {
        let idx = self.index_of(name)?;
        self.rows.get(row).and_then(|r| r.get(idx))
    }

    /// Re-qualify every column under a single alias (derived tables, views)
    pub fn requalify(mut self, alias: Option<&str>) -> Self {
        for col in &mut self.columns {
            col.qualifier = alias.map(str::to_string);
        }
        self
    }

    /// Append another batch's rows. Widths must agree; the caller checks.
    pub fn extend(&mut self, other: RowBatch) {
        self.rows.extend(other.rows);
    }

    /// Infer a scalar type per column from the first non-null value
    pub fn infer_types(&self) -> Vec<(String, ScalarType)> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let ty = self
                    .column_values(idx)
                    .find(|v| !v.is_null())
                    .map(Value::scalar_type)
                    .unwrap_or(ScalarType::Unknown);
                (col.name.clone(), ty)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined() -> RowBatch {
        RowBatch::new(
            vec![
                ColumnId::qualified("t1", "a"),
                ColumnId::qualified("t1", "c"),
                ColumnId::qualified("t2", "a"),
            ],
            vec![vec![1.into(), 1.into(), 6.into()]],
        )
    }

    #[test]
    fn test_lookup_qualified_and_bare() {
        let b = joined();
        assert_eq!(b.lookup(Some("t2"), "a"), ColumnLookup::Found(2));
        assert_eq!(b.lookup(Some("T1"), "A"), ColumnLookup::Found(0));
        assert_eq!(b.lookup(None, "c"), ColumnLookup::Found(1));
        assert_eq!(b.lookup(None, "a"), ColumnLookup::Ambiguous);
        assert_eq!(b.lookup(Some("t3"), "a"), ColumnLookup::Missing);
    }

    #[test]
    fn test_duplicate_identity_is_not_ambiguous() {
        let b = RowBatch::from_named(&["x", "x"], vec![]);
        assert_eq!(b.lookup(None, "x"), ColumnLookup::Found(0));
    }

    #[test]
    fn test_requalify() {
        let b = joined().requalify(Some("v"));
        assert!(b.columns.iter().all(|c| c.qualifier.as_deref() == Some("v")));
        assert_eq!(b.lookup(Some("v"), "c"), ColumnLookup::Found(1));
    }

    #[test]
    fn test_infer_types_skips_nulls() {
        let b = RowBatch::from_named(
            &["a", "b"],
            vec![
                vec![Value::Null, "x".into()],
                vec![Value::Float(1.5), Value::Null],
            ],
        );
        assert_eq!(
            b.infer_types(),
            vec![
                ("a".to_string(), ScalarType::Float),
                ("b".to_string(), ScalarType::Text)
            ]
        );
    }
}
