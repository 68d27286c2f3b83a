//! Conversion between DuckDB rows and Modeltable values

use crate::error::{DbError, DbResult};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};
use duckdb::types::{TimeUnit, Value as DuckValue};
use mt_core::{RowBatch, ScalarType, Value};

/// Convert one DuckDB cell. Nested and binary types render as text.
pub(crate) fn from_duck(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Boolean(b),
        DuckValue::TinyInt(i) => Value::Integer(i as i64),
        DuckValue::SmallInt(i) => Value::Integer(i as i64),
        DuckValue::Int(i) => Value::Integer(i as i64),
        DuckValue::BigInt(i) => Value::Integer(i),
        DuckValue::HugeInt(i) => i64::try_from(i)
            .map(Value::Integer)
            .unwrap_or(Value::Float(i as f64)),
        DuckValue::UTinyInt(i) => Value::Integer(i as i64),
        DuckValue::USmallInt(i) => Value::Integer(i as i64),
        DuckValue::UInt(i) => Value::Integer(i as i64),
        DuckValue::UBigInt(i) => i64::try_from(i)
            .map(Value::Integer)
            .unwrap_or(Value::Float(i as f64)),
        DuckValue::Float(f) => Value::Float(f as f64),
        DuckValue::Double(f) => Value::Float(f),
        DuckValue::Decimal(d) => d
            .to_string()
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or_else(|_| Value::Text(d.to_string())),
        DuckValue::Timestamp(unit, raw) => timestamp(unit, raw)
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        DuckValue::Date32(days) => NaiveDate::from_ymd_opt(1970, 1, 1)
            .and_then(|epoch| epoch.checked_add_signed(Duration::days(days as i64)))
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        DuckValue::Text(s) => Value::Text(s),
        DuckValue::Enum(s) => Value::Text(s),
        other => Value::Text(format!("{other:?}")),
    }
}

fn timestamp(unit: TimeUnit, raw: i64) -> Option<NaiveDateTime> {
    let micros = match unit {
        TimeUnit::Second => raw.checked_mul(1_000_000)?,
        TimeUnit::Millisecond => raw.checked_mul(1_000)?,
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    };
    DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}

/// Map a DuckDB type name (as printed by DESCRIBE) to a scalar type
pub(crate) fn scalar_type_of(duck_type: &str) -> ScalarType {
    let upper = duck_type.to_ascii_uppercase();
    let base = upper.split('(').next().unwrap_or("").trim();
    match base {
        "BOOLEAN" | "BOOL" => ScalarType::Boolean,
        "TINYINT" | "SMALLINT" | "INTEGER" | "INT" | "BIGINT" | "HUGEINT" | "UTINYINT"
        | "USMALLINT" | "UINTEGER" | "UBIGINT" => ScalarType::Integer,
        "FLOAT" | "REAL" | "DOUBLE" | "DECIMAL" | "NUMERIC" => ScalarType::Float,
        "VARCHAR" | "TEXT" | "STRING" | "UUID" | "ENUM" => ScalarType::Text,
        b if b.starts_with("TIMESTAMP") || b == "DATE" || b == "DATETIME" => ScalarType::Timestamp,
        _ => ScalarType::Unknown,
    }
}

/// Run a query and collect every row into a batch.
///
/// Column metadata is only available after execution, so rows are collected
/// through `query_map` first.
pub(crate) fn query_batch(conn: &duckdb::Connection, sql: &str) -> DbResult<RowBatch> {
    let mut stmt = conn.prepare(sql)?;
    let rows: Vec<Vec<Value>> = stmt
        .query_map([], |row| {
            let count = row.as_ref().column_count();
            (0..count)
                .map(|i| row.get::<_, DuckValue>(i).map(from_duck))
                .collect::<Result<Vec<_>, _>>()
        })?
        .collect::<Result<Vec<_>, _>>()?;
    let names = stmt.column_names();
    Ok(RowBatch::from_named(&names, rows))
}

/// Describe the columns produced by a SELECT
pub(crate) fn describe_select(
    conn: &duckdb::Connection,
    select: &str,
) -> DbResult<Vec<(String, ScalarType)>> {
    let batch = query_batch(conn, &format!("DESCRIBE {}", select))?;
    let name_idx = batch
        .index_of("column_name")
        .ok_or_else(|| DbError::Internal("DESCRIBE returned no column_name".to_string()))?;
    let type_idx = batch
        .index_of("column_type")
        .ok_or_else(|| DbError::Internal("DESCRIBE returned no column_type".to_string()))?;
    Ok(batch
        .rows
        .iter()
        .map(|row| {
            let name = row[name_idx].to_string();
            let ty = row[type_idx].as_str().map(scalar_type_of).unwrap_or(ScalarType::Unknown);
            (name, ty)
        })
        .collect())
}

/// Double-quote an identifier
pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Build the projection list for a fetch
pub(crate) fn projection(columns: &[String]) -> String {
    if columns.is_empty() {
        "*".to_string()
    } else {
        columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_type_of() {
        assert_eq!(scalar_type_of("INTEGER"), ScalarType::Integer);
        assert_eq!(scalar_type_of("DECIMAL(18,3)"), ScalarType::Float);
        assert_eq!(scalar_type_of("TIMESTAMP WITH TIME ZONE"), ScalarType::Timestamp);
        assert_eq!(scalar_type_of("varchar"), ScalarType::Text);
        assert_eq!(scalar_type_of("INTEGER[]"), ScalarType::Unknown);
    }

    #[test]
    fn test_timestamp_units() {
        let a = timestamp(TimeUnit::Second, 86_400).unwrap();
        let b = timestamp(TimeUnit::Microsecond, 86_400_000_000).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "1970-01-02 00:00:00");
    }

    #[test]
    fn test_from_duck_integers_widen() {
        assert_eq!(from_duck(DuckValue::TinyInt(3)), Value::Integer(3));
        assert_eq!(from_duck(DuckValue::Double(2.5)), Value::Float(2.5));
        assert_eq!(from_duck(DuckValue::Null), Value::Null);
    }

    #[test]
    fn test_query_batch_collects_names() {
        let conn = duckdb::Connection::open_in_memory().unwrap();
        let batch = query_batch(&conn, "SELECT 1 AS a, 'x' AS b UNION ALL SELECT 2, NULL").unwrap();
        assert_eq!(batch.column_names(), vec!["a", "b"]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.rows[1][1], Value::Null);
    }

    #[test]
    fn test_projection() {
        assert_eq!(projection(&[]), "*");
        assert_eq!(
            projection(&["a".to_string(), "b c".to_string()]),
            "\"a\", \"b c\""
        );
    }
}
