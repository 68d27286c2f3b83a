//! Plan execution over materialized row batches
//!
//! Every operator consumes its children's full output and produces a new
//! [`RowBatch`]. Subqueries are uncorrelated: they run once per operator,
//! before any row is evaluated, and their results are substituted into the
//! expression as literals.

mod aggregate;
mod eval;
mod join;

use crate::error::{ExecError, ExecResult};
use crate::plan::{BinaryOp, Expr, Plan, ProjectItem, Scan, ScanSource, SortKey};
use eval::{column_index, evaluate, is_true};
use join::{joined_predictors, predictor_input};
use futures::future::BoxFuture;
use mt_core::config::ExecutionConfig;
use mt_core::{ColumnId, GroupKey, ModelVersion, RowBatch, Value};
use mt_meta::MetaStore;
use mt_models::PredictorAdapter;
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Evaluates a bound plan.
pub struct Executor<'a> {
    store: &'a dyn MetaStore,
    predictor: &'a PredictorAdapter,
    settings: &'a ExecutionConfig,
}

impl<'a> Executor<'a> {
    pub fn new(
        store: &'a dyn MetaStore,
        predictor: &'a PredictorAdapter,
        settings: &'a ExecutionConfig,
    ) -> Self {
        Self {
            store,
            predictor,
            settings,
        }
    }

    /// Run `plan` to completion
    pub fn execute<'s>(&'s self, plan: &'s Plan) -> BoxFuture<'s, ExecResult<RowBatch>> {
        Box::pin(async move {
            match plan {
                Plan::Dual => Ok(RowBatch::new(Vec::new(), vec![Vec::new()])),
                Plan::Scan(scan) => self.scan(scan).await,
                Plan::Derived { input, alias } => {
                    Ok(self.execute(input).await?.requalify(alias.as_deref()))
                }
                Plan::Join {
                    left,
                    right,
                    kind,
                    condition,
                } => self.join(left, right, *kind, condition.as_ref(), &[]).await,
                Plan::Filter { input, predicate } => {
                    let predicate = self.prepare(predicate).await?;
                    match input.as_ref() {
                        Plan::Scan(scan) => {
                            if let Some(ScanSource::Predictor { version }) = &scan.source {
                                return self.predict_filtered(scan, version, &predicate).await;
                            }
                        }
                        Plan::Join {
                            left,
                            right,
                            kind,
                            condition,
                        } => {
                            let qualifiers = joined_predictors(input);
                            let mut inputs = Vec::new();
                            let mut rest = Vec::new();
                            for conjunct in predicate.conjuncts() {
                                match predictor_input(conjunct, &qualifiers) {
                                    Some(binding) => inputs.push(binding),
                                    None => rest.push(conjunct),
                                }
                            }
                            if !inputs.is_empty() {
                                let batch = self
                                    .join(left, right, *kind, condition.as_ref(), &inputs)
                                    .await?;
                                return filter_all(batch, &rest);
                            }
                        }
                        _ => {}
                    }
                    let batch = self.execute(input).await?;
                    filter(batch, &predicate)
                }
                Plan::Project { input, items } => {
                    let batch = self.execute(input).await?;
                    let mut prepared = Vec::with_capacity(items.len());
                    for item in items {
                        prepared.push(match item {
                            ProjectItem::Expr { expr, alias } => ProjectItem::Expr {
                                expr: self.prepare(expr).await?.into_owned(),
                                alias: alias.clone(),
                            },
                            wildcard => wildcard.clone(),
                        });
                    }
                    project(batch, &prepared)
                }
                Plan::Aggregate {
                    input,
                    group_by,
                    aggregates,
                    having,
                } => {
                    let batch = self.execute(input).await?;
                    let mut keys = Vec::with_capacity(group_by.len());
                    for expr in group_by {
                        keys.push(self.prepare(expr).await?.into_owned());
                    }
                    let mut calls = aggregates.clone();
                    for call in &mut calls {
                        if let Some(arg) = &call.arg {
                            let prepared = self.prepare(arg).await?.into_owned();
                            call.arg = Some(prepared);
                        }
                    }
                    let having = match having {
                        Some(h) => Some(self.prepare(h).await?.into_owned()),
                        None => None,
                    };
                    aggregate::aggregate(batch, &keys, &calls, having.as_ref())
                }
                Plan::Distinct { input } => Ok(distinct(self.execute(input).await?)),
                Plan::Union { inputs, all } => {
                    let mut out: Option<RowBatch> = None;
                    for input in inputs {
                        let batch = self.execute(input).await?;
                        match out.as_mut() {
                            None => out = Some(batch),
                            Some(acc) => {
                                if acc.width() != batch.width() {
                                    return Err(ExecError::UnionArity {
                                        left: acc.width(),
                                        right: batch.width(),
                                    });
                                }
                                acc.extend(batch);
                            }
                        }
                    }
                    let out = out.unwrap_or_default();
                    if !*all && self.settings.union_deduplicate {
                        Ok(distinct(out))
                    } else {
                        Ok(out)
                    }
                }
                Plan::Sort { input, keys } => {
                    let batch = self.execute(input).await?;
                    let mut prepared = Vec::with_capacity(keys.len());
                    for key in keys {
                        prepared.push(SortKey {
                            expr: self.prepare(&key.expr).await?.into_owned(),
                            ascending: key.ascending,
                            nulls_first: key.nulls_first,
                        });
                    }
                    sort(batch, &prepared)
                }
                Plan::Limit {
                    input,
                    limit,
                    offset,
                } => {
                    let mut batch = self.execute(input).await?;
                    let rows = std::mem::take(&mut batch.rows);
                    batch.rows = rows
                        .into_iter()
                        .skip(*offset)
                        .take(limit.unwrap_or(usize::MAX))
                        .collect();
                    Ok(batch)
                }
            }
        })
    }

    async fn scan(&self, scan: &Scan) -> ExecResult<RowBatch> {
        let Some(source) = &scan.source else {
            return Err(ExecError::Internal(format!(
                "relation '{}' was not bound",
                scan.relation
            )));
        };
        let batch = match source {
            ScanSource::Table { source, relation } => {
                log::debug!("Fetching {}.{}", source.name(), relation);
                let fetch = source.fetch(relation, &[]);
                match self.settings.fetch_timeout() {
                    Some(limit) => tokio::time::timeout(limit, fetch).await.map_err(|_| {
                        ExecError::Timeout {
                            relation: format!("{}.{}", source.name(), relation),
                            after: limit,
                        }
                    })??,
                    None => fetch.await?,
                }
            }
            ScanSource::Predictor { version } => {
                self.predictor.invoke(&RowBatch::default(), version).await?
            }
            ScanSource::System { table, project } => table.scan(self.store, project.as_ref())?,
        };
        Ok(batch.requalify(Some(scan.qualifier())))
    }

    /// Query a predictor on its own: `col = literal` conjuncts become the
    /// single input row and the rest filter the prediction.
    async fn predict_filtered(
        &self,
        scan: &Scan,
        version: &ModelVersion,
        predicate: &Expr,
    ) -> ExecResult<RowBatch> {
        let qualifier = scan.qualifier();
        let mut names = Vec::new();
        let mut values = Vec::new();
        let mut rest = Vec::new();
        for conjunct in predicate.conjuncts() {
            match input_binding(conjunct, qualifier) {
                Some((name, value)) => {
                    names.push(name);
                    values.push(value);
                }
                None => rest.push(conjunct),
            }
        }
        let input = RowBatch::from_named(&names, vec![values]);
        let batch = self
            .predictor
            .invoke(&input, version)
            .await?
            .requalify(Some(qualifier));
        filter_all(batch, &rest)
    }

    /// Run the subqueries of `expr` and substitute their results
    async fn prepare<'e>(&self, expr: &'e Expr) -> ExecResult<Cow<'e, Expr>> {
        if !expr.has_subquery() {
            return Ok(Cow::Borrowed(expr));
        }

        let mut plans: Vec<&Plan> = Vec::new();
        expr.walk(&mut |e| match e {
            Expr::Subquery(plan) | Expr::InSubquery { subquery: plan, .. } => plans.push(plan),
            _ => {}
        });
        let mut results = Vec::with_capacity(plans.len());
        for plan in plans {
            results.push(self.execute(plan).await?);
        }

        let mut results = results.into_iter();
        let mut failure = None;
        let mut prepared = expr.clone();
        prepared.walk_mut(&mut |e| {
            if failure.is_some() {
                return;
            }
            let replacement = match e {
                Expr::Subquery(_) => results.next().map(|batch| scalar(batch).map(Expr::Literal)),
                Expr::InSubquery { expr, negated, .. } => results.next().map(|batch| {
                    column_values(batch).map(|values| Expr::InList {
                        expr: expr.clone(),
                        list: values.into_iter().map(Expr::Literal).collect(),
                        negated: *negated,
                    })
                }),
                _ => return,
            };
            match replacement {
                Some(Ok(new)) => *e = new,
                Some(Err(err)) => failure = Some(err),
                None => {
                    failure = Some(ExecError::Internal("subquery result missing".to_string()))
                }
            }
        });
        match failure {
            Some(err) => Err(err),
            None => Ok(Cow::Owned(prepared)),
        }
    }
}

/// `qualifier.col = literal` (either side) binds a predictor input column
fn input_binding(conjunct: &Expr, qualifier: &str) -> Option<(String, Value)> {
    let Expr::Binary {
        left,
        op: BinaryOp::Eq,
        right,
    } = conjunct
    else {
        return None;
    };
    let (column, value) = match (left.as_ref(), right.as_ref()) {
        (Expr::Column(c), Expr::Literal(v)) | (Expr::Literal(v), Expr::Column(c)) => (c, v),
        _ => return None,
    };
    match &column.qualifier {
        Some(q) if !q.eq_ignore_ascii_case(qualifier) => None,
        _ => Some((column.name.clone(), value.clone())),
    }
}

/// Single value of a scalar subquery; no rows is NULL
fn scalar(batch: RowBatch) -> ExecResult<Value> {
    if batch.len() > 1 || batch.width() != 1 {
        return Err(ExecError::SubqueryCardinality {
            rows: batch.len(),
            columns: batch.width(),
        });
    }
    Ok(batch
        .rows
        .into_iter()
        .next()
        .and_then(|row| row.into_iter().next())
        .unwrap_or(Value::Null))
}

fn column_values(batch: RowBatch) -> ExecResult<Vec<Value>> {
    if batch.width() != 1 {
        return Err(ExecError::SubqueryCardinality {
            rows: batch.len(),
            columns: batch.width(),
        });
    }
    Ok(batch
        .rows
        .into_iter()
        .filter_map(|row| row.into_iter().next())
        .collect())
}

fn filter(batch: RowBatch, predicate: &Expr) -> ExecResult<RowBatch> {
    let mut rows = Vec::with_capacity(batch.len());
    for row in batch.rows {
        if is_true(&evaluate(predicate, &batch.columns, &row)?) {
            rows.push(row);
        }
    }
    Ok(RowBatch::new(batch.columns, rows))
}

/// Keep the rows on which every conjunct holds
fn filter_all(batch: RowBatch, conjuncts: &[&Expr]) -> ExecResult<RowBatch> {
    let mut rows = Vec::with_capacity(batch.len());
    'rows: for row in batch.rows {
        for conjunct in conjuncts {
            if !is_true(&evaluate(conjunct, &batch.columns, &row)?) {
                continue 'rows;
            }
        }
        rows.push(row);
    }
    Ok(RowBatch::new(batch.columns, rows))
}

fn is_internal(column: &ColumnId) -> bool {
    column.name.starts_with('#')
}

fn project(batch: RowBatch, items: &[ProjectItem]) -> ExecResult<RowBatch> {
    enum Output<'p> {
        Copy(usize),
        Eval(&'p Expr),
    }

    let mut columns = Vec::new();
    let mut outputs = Vec::new();
    for item in items {
        match item {
            ProjectItem::Wildcard { qualifier } => {
                let before = outputs.len();
                for (idx, col) in batch.columns.iter().enumerate() {
                    if is_internal(col) {
                        continue;
                    }
                    let visible = match qualifier {
                        None => true,
                        Some(q) => col
                            .qualifier
                            .as_deref()
                            .is_some_and(|own| own.eq_ignore_ascii_case(q)),
                    };
                    if visible {
                        columns.push(col.clone());
                        outputs.push(Output::Copy(idx));
                    }
                }
                if let (Some(q), true) = (qualifier, outputs.len() == before) {
                    return Err(ExecError::ColumnNotFound(format!("{}.*", q)));
                }
            }
            ProjectItem::Expr {
                expr: Expr::Column(col),
                alias: None,
            } => {
                let idx = column_index(&batch.columns, col)?;
                columns.push(batch.columns[idx].clone());
                outputs.push(Output::Copy(idx));
            }
            ProjectItem::Expr { expr, alias } => {
                let name = alias.clone().unwrap_or_else(|| expr.default_name());
                columns.push(ColumnId::bare(name));
                outputs.push(Output::Eval(expr));
            }
        }
    }

    let mut rows = Vec::with_capacity(batch.len());
    for row in &batch.rows {
        let mut out = Vec::with_capacity(outputs.len());
        for output in &outputs {
            out.push(match output {
                Output::Copy(idx) => row[*idx].clone(),
                Output::Eval(expr) => evaluate(expr, &batch.columns, row)?,
            });
        }
        rows.push(out);
    }
    Ok(RowBatch::new(columns, rows))
}

/// Keep the first occurrence of every row
fn distinct(batch: RowBatch) -> RowBatch {
    let mut seen: HashSet<Vec<GroupKey>> = HashSet::new();
    let rows = batch
        .rows
        .into_iter()
        .filter(|row| seen.insert(row.iter().map(Value::group_key).collect()))
        .collect();
    RowBatch::new(batch.columns, rows)
}

/// Stable sort on the evaluated keys
fn sort(batch: RowBatch, keys: &[SortKey]) -> ExecResult<RowBatch> {
    let mut keyed = Vec::with_capacity(batch.len());
    for row in batch.rows {
        let values = keys
            .iter()
            .map(|k| evaluate(&k.expr, &batch.columns, &row))
            .collect::<ExecResult<Vec<_>>>()?;
        keyed.push((values, row));
    }
    keyed.sort_by(|(a, _), (b, _)| {
        for (key, (x, y)) in keys.iter().zip(a.iter().zip(b)) {
            let ord = match (x.is_null(), y.is_null()) {
                (true, true) => Ordering::Equal,
                (true, false) if key.nulls_first => Ordering::Less,
                (true, false) => Ordering::Greater,
                (false, true) if key.nulls_first => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ if key.ascending => x.sort_cmp(y),
                _ => y.sort_cmp(x),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
    Ok(RowBatch::new(
        batch.columns,
        keyed.into_iter().map(|(_, row)| row).collect(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> RowBatch {
        RowBatch::new(
            vec![ColumnId::qualified("t", "a"), ColumnId::qualified("t", "b")],
            vec![
                vec![Value::Integer(2), Value::from("x")],
                vec![Value::Null, Value::from("y")],
                vec![Value::Integer(1), Value::from("x")],
                vec![Value::Integer(2), Value::from("x")],
            ],
        )
    }

    fn key(name: &str, ascending: bool, nulls_first: bool) -> SortKey {
        SortKey {
            expr: Expr::column(None, name),
            ascending,
            nulls_first,
        }
    }

    #[test]
    fn test_sort_nulls_placement() {
        let asc = sort(batch(), &[key("a", true, false)]).unwrap();
        let firsts: Vec<&Value> = asc.column_values(0).collect();
        assert_eq!(
            firsts,
            vec![&Value::Integer(1), &Value::Integer(2), &Value::Integer(2), &Value::Null]
        );

        let desc = sort(batch(), &[key("a", false, true)]).unwrap();
        assert_eq!(desc.rows[0][0], Value::Null);
        assert_eq!(desc.rows[1][0], Value::Integer(2));
    }

    #[test]
    fn test_distinct_keeps_first() {
        let out = distinct(batch());
        assert_eq!(out.len(), 3);
        assert_eq!(out.rows[0][0], Value::Integer(2));
    }

    #[test]
    fn test_project_wildcards() {
        let mut input = batch();
        input.columns.push(ColumnId::bare("#agg0"));
        for row in &mut input.rows {
            row.push(Value::Integer(0));
        }
        let out = project(input.clone(), &[ProjectItem::Wildcard { qualifier: None }]).unwrap();
        assert_eq!(out.column_names(), vec!["a", "b"]);

        let err = project(
            input,
            &[ProjectItem::Wildcard {
                qualifier: Some("zz".to_string()),
            }],
        )
        .unwrap_err();
        assert!(matches!(err, ExecError::ColumnNotFound(_)));
    }

    #[test]
    fn test_project_keeps_column_identity() {
        let out = project(
            batch(),
            &[
                ProjectItem::Expr {
                    expr: Expr::column(Some("t"), "a"),
                    alias: None,
                },
                ProjectItem::Expr {
                    expr: Expr::column(None, "b"),
                    alias: Some("bee".to_string()),
                },
            ],
        )
        .unwrap();
        assert_eq!(out.columns[0], ColumnId::qualified("t", "a"));
        assert_eq!(out.columns[1], ColumnId::bare("bee"));
    }

    #[test]
    fn test_scalar_subquery_cardinality() {
        let one = RowBatch::from_named(&["x"], vec![vec![Value::Integer(1)]]);
        assert_eq!(scalar(one).unwrap(), Value::Integer(1));
        let none = RowBatch::from_named(&["x"], vec![]);
        assert_eq!(scalar(none).unwrap(), Value::Null);
        let many = RowBatch::from_named(&["x"], vec![vec![1.into()], vec![2.into()]]);
        assert!(matches!(
            scalar(many),
            Err(ExecError::SubqueryCardinality { rows: 2, columns: 1 })
        ));
    }

    #[test]
    fn test_input_binding() {
        let eq = Expr::binary(
            Expr::literal(5),
            BinaryOp::Eq,
            Expr::column(Some("m"), "a"),
        );
        assert_eq!(
            input_binding(&eq, "m"),
            Some(("a".to_string(), Value::Integer(5)))
        );
        assert_eq!(input_binding(&eq, "other"), None);
        let gt = Expr::binary(Expr::column(None, "a"), BinaryOp::Gt, Expr::literal(5));
        assert_eq!(input_binding(&gt, "m"), None);
    }
}
