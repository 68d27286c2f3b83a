//! Hash grouping and aggregate accumulation

use super::eval::{evaluate, is_true};
use crate::error::ExecResult;
use crate::plan::{aggregate_column, AggregateCall, AggregateFunc, Expr};
use mt_core::{ColumnId, GroupKey, RowBatch, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Group `batch` by `group_by` and evaluate `aggregates` per group.
///
/// Each output row is the group's first input row followed by the aggregate
/// values. Groups appear in order of first occurrence. Without GROUP BY an
/// empty input still yields one row, so `COUNT(*)` reports 0.
pub(crate) fn aggregate(
    batch: RowBatch,
    group_by: &[Expr],
    aggregates: &[AggregateCall],
    having: Option<&Expr>,
) -> ExecResult<RowBatch> {
    let mut index: HashMap<Vec<GroupKey>, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for (row_idx, row) in batch.rows.iter().enumerate() {
        let key = group_by
            .iter()
            .map(|e| evaluate(e, &batch.columns, row).map(|v| v.group_key()))
            .collect::<ExecResult<Vec<_>>>()?;
        match index.get(&key) {
            Some(&g) => groups[g].push(row_idx),
            None => {
                index.insert(key, groups.len());
                groups.push(vec![row_idx]);
            }
        }
    }
    if groups.is_empty() && group_by.is_empty() {
        groups.push(Vec::new());
    }

    let mut columns = batch.columns.clone();
    columns.extend((0..aggregates.len()).map(|i| ColumnId::bare(aggregate_column(i))));

    let mut rows = Vec::with_capacity(groups.len());
    for members in &groups {
        let mut out = match members.first() {
            Some(&first) => batch.rows[first].clone(),
            None => vec![Value::Null; batch.width()],
        };
        for call in aggregates {
            out.push(accumulate(call, &batch, members)?);
        }
        if let Some(predicate) = having {
            if !is_true(&evaluate(predicate, &columns, &out)?) {
                continue;
            }
        }
        rows.push(out);
    }
    Ok(RowBatch::new(columns, rows))
}

fn accumulate(call: &AggregateCall, batch: &RowBatch, members: &[usize]) -> ExecResult<Value> {
    let Some(arg) = &call.arg else {
        return Ok(Value::Integer(members.len() as i64));
    };

    let mut values = Vec::with_capacity(members.len());
    let mut seen = HashSet::new();
    for &idx in members {
        let v = evaluate(arg, &batch.columns, &batch.rows[idx])?;
        if v.is_null() {
            continue;
        }
        if call.distinct && !seen.insert(v.group_key()) {
            continue;
        }
        values.push(v);
    }

    Ok(match call.func {
        AggregateFunc::Count => Value::Integer(values.len() as i64),
        AggregateFunc::Min => values
            .into_iter()
            .min_by(|a, b| a.sort_cmp(b))
            .unwrap_or(Value::Null),
        AggregateFunc::Max => values
            .into_iter()
            .reduce(|best, v| match v.sort_cmp(&best) {
                Ordering::Greater => v,
                _ => best,
            })
            .unwrap_or(Value::Null),
        AggregateFunc::Sum => sum(&values),
        AggregateFunc::Avg => match sum(&values).as_f64() {
            Some(total) if !values.is_empty() => Value::Float(total / values.len() as f64),
            _ => Value::Null,
        },
    })
}

/// Integer sum while every input is an integer and nothing overflows
fn sum(values: &[Value]) -> Value {
    if values.is_empty() {
        return Value::Null;
    }
    let mut exact: Option<i64> = Some(0);
    let mut total = 0f64;
    for v in values {
        exact = match (exact, v) {
            (Some(acc), Value::Integer(i)) => acc.checked_add(*i),
            _ => None,
        };
        total += v.as_f64().unwrap_or(0.0);
    }
    match exact {
        Some(i) => Value::Integer(i),
        None => Value::Float(total),
    }
}
