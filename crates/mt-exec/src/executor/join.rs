//! Joins, including joins that feed rows into a predictor

use super::eval::{evaluate, is_true};
use super::Executor;
use crate::error::{ExecError, ExecResult};
use crate::plan::{BinaryOp, Expr, JoinKind, Plan, ScanSource};
use futures::future::BoxFuture;
use mt_core::{ColumnId, ModelVersion, RowBatch, Value};

/// Which side of a join a predictor sits on
#[derive(Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// A constant input column for the predictor joined under `qualifier`
#[derive(Debug, Clone, PartialEq)]
pub(super) struct PredictorInput {
    pub qualifier: String,
    pub column: String,
    pub value: Value,
}

fn predictor_of(plan: &Plan) -> Option<(&str, &ModelVersion)> {
    match plan {
        Plan::Scan(scan) => match &scan.source {
            Some(ScanSource::Predictor { version }) => Some((scan.qualifier(), version)),
            _ => None,
        },
        _ => None,
    }
}

/// Qualifiers of the predictors joined anywhere in a join tree
pub(super) fn joined_predictors(plan: &Plan) -> Vec<&str> {
    match plan {
        Plan::Join { left, right, .. } => {
            let mut out = joined_predictors(left);
            out.extend(joined_predictors(right));
            out
        }
        other => predictor_of(other).map(|(q, _)| q).into_iter().collect(),
    }
}

/// `alias.col = literal` (either side) where `alias` names a joined predictor
pub(super) fn predictor_input(conjunct: &Expr, qualifiers: &[&str]) -> Option<PredictorInput> {
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
    let qualifier = column.qualifier.as_deref()?;
    qualifiers
        .iter()
        .find(|q| q.eq_ignore_ascii_case(qualifier))
        .map(|q| PredictorInput {
            qualifier: q.to_string(),
            column: column.name.clone(),
            value: value.clone(),
        })
}

impl Executor<'_> {
    /// Join two plans. `inputs` are passed to every predictor in the tree.
    pub(super) fn join<'s>(
        &'s self,
        left: &'s Plan,
        right: &'s Plan,
        kind: JoinKind,
        condition: Option<&'s Expr>,
        inputs: &'s [PredictorInput],
    ) -> BoxFuture<'s, ExecResult<RowBatch>> {
        Box::pin(async move {
            let condition = match condition {
                Some(c) => Some(self.prepare(c).await?),
                None => None,
            };
            let condition = condition.as_deref();
            match (predictor_of(left), predictor_of(right)) {
                (Some(_), Some(_)) => Err(ExecError::Unsupported(
                    "joining two predictors".to_string(),
                )),
                (None, Some((qualifier, version))) => {
                    let data = self.join_side(left, inputs).await?;
                    let join = PredictorJoin {
                        qualifier,
                        version,
                        side: Side::Right,
                        kind,
                        condition,
                        inputs,
                    };
                    self.predictor_join(data, join).await
                }
                (Some((qualifier, version)), None) => {
                    let data = self.join_side(right, inputs).await?;
                    let join = PredictorJoin {
                        qualifier,
                        version,
                        side: Side::Left,
                        kind,
                        condition,
                        inputs,
                    };
                    self.predictor_join(data, join).await
                }
                (None, None) => {
                    let (l, r) = futures::try_join!(
                        self.join_side(left, inputs),
                        self.join_side(right, inputs)
                    )?;
                    nested_loop(l, r, kind, condition)
                }
            }
        })
    }

    fn join_side<'s>(
        &'s self,
        plan: &'s Plan,
        inputs: &'s [PredictorInput],
    ) -> BoxFuture<'s, ExecResult<RowBatch>> {
        match plan {
            Plan::Join {
                left,
                right,
                kind,
                condition,
            } if !inputs.is_empty() => self.join(left, right, *kind, condition.as_ref(), inputs),
            other => self.execute(other),
        }
    }

    /// Pair every data row with the prediction made from it
    async fn predictor_join(&self, data: RowBatch, join: PredictorJoin<'_>) -> ExecResult<RowBatch> {
        let PredictorJoin {
            qualifier,
            version,
            side,
            kind,
            condition,
            inputs,
        } = join;
        self.predictor.check_ready(version)?;

        let (pred_columns, pred_rows) = if data.is_empty() {
            let columns: Vec<ColumnId> = self
                .predictor
                .output_columns(version)?
                .into_iter()
                .map(|(name, _)| ColumnId::qualified(qualifier, name))
                .collect();
            (columns, Vec::new())
        } else {
            let input = with_inputs(data.clone().requalify(None), qualifier, inputs);
            let predicted = self.predictor.predict(&input, version).await?;
            let columns: Vec<ColumnId> = predicted
                .columns
                .iter()
                .map(|c| ColumnId::qualified(qualifier, c.name.clone()))
                .collect();
            (columns, predicted.rows)
        };

        let columns: Vec<ColumnId> = match side {
            Side::Right => data.columns.iter().chain(&pred_columns).cloned().collect(),
            Side::Left => pred_columns.iter().chain(&data.columns).cloned().collect(),
        };
        let data_width = data.width();

        let mut rows = Vec::with_capacity(data.len());
        for (data_row, pred_row) in data.rows.into_iter().zip(pred_rows) {
            let combined = match side {
                Side::Right => concat(&data_row, &pred_row),
                Side::Left => concat(&pred_row, &data_row),
            };
            let matched = match condition {
                Some(c) => is_true(&evaluate(c, &columns, &combined)?),
                None => true,
            };
            if matched {
                rows.push(combined);
            } else if kind == JoinKind::Left {
                rows.push(match side {
                    Side::Right => concat(&data_row, &vec![Value::Null; pred_columns.len()]),
                    Side::Left => concat(&pred_row, &vec![Value::Null; data_width]),
                });
            }
        }
        Ok(RowBatch::new(columns, rows))
    }
}

struct PredictorJoin<'a> {
    qualifier: &'a str,
    version: &'a ModelVersion,
    side: Side,
    kind: JoinKind,
    condition: Option<&'a Expr>,
    inputs: &'a [PredictorInput],
}

/// Set the constant inputs meant for `qualifier` on every row, replacing a
/// column of the same name or appending a new one
fn with_inputs(mut batch: RowBatch, qualifier: &str, inputs: &[PredictorInput]) -> RowBatch {
    for input in inputs
        .iter()
        .filter(|i| i.qualifier.eq_ignore_ascii_case(qualifier))
    {
        match batch.index_of(&input.column) {
            Some(idx) => {
                for row in &mut batch.rows {
                    row[idx] = input.value.clone();
                }
            }
            None => {
                batch.columns.push(ColumnId::bare(input.column.clone()));
                for row in &mut batch.rows {
                    row.push(input.value.clone());
                }
            }
        }
    }
    batch
}

fn concat(a: &[Value], b: &[Value]) -> Vec<Value> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    out.extend_from_slice(a);
    out.extend_from_slice(b);
    out
}

fn nested_loop(
    left: RowBatch,
    right: RowBatch,
    kind: JoinKind,
    condition: Option<&Expr>,
) -> ExecResult<RowBatch> {
    let columns: Vec<ColumnId> = left.columns.iter().chain(&right.columns).cloned().collect();
    let null_right = vec![Value::Null; right.width()];

    let mut rows = Vec::new();
    for l in &left.rows {
        let mut matched = false;
        for r in &right.rows {
            let combined = concat(l, r);
            let keep = match condition {
                Some(c) => is_true(&evaluate(c, &columns, &combined)?),
                None => true,
            };
            if keep {
                matched = true;
                rows.push(combined);
            }
        }
        if !matched && kind == JoinKind::Left {
            rows.push(concat(l, &null_right));
        }
    }
    Ok(RowBatch::new(columns, rows))
}
