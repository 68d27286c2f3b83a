//! Query-level lowering: Query → Limit → Sort → body

use crate::error::{ExecError, ExecResult};
use crate::lowering::expr::lower_expr;
use crate::lowering::select::lower_select;
use crate::plan::{Expr, Plan, SortKey};
use sqlparser::ast::{
    self, LimitClause, OrderByExpr, OrderByKind, Query, SetExpr, SetOperator, SetQuantifier,
};

/// Lower a Query AST node into a plan
pub(crate) fn lower_query(query: &Query) -> ExecResult<Plan> {
    if query.with.is_some() {
        return Err(ExecError::Unsupported("WITH clause".to_string()));
    }

    let order_by: &[OrderByExpr] = match &query.order_by {
        Some(order_by) => match &order_by.kind {
            OrderByKind::Expressions(exprs) => exprs,
            _ => return Err(ExecError::Unsupported("ORDER BY ALL".to_string())),
        },
        None => &[],
    };

    // A plain SELECT sorts before projecting so that keys may use columns
    // and aggregates the projection drops
    let mut plan = match query.body.as_ref() {
        SetExpr::Select(select) => lower_select(select, order_by)?,
        other => {
            let plan = lower_set_expr(other)?;
            if order_by.is_empty() {
                plan
            } else {
                Plan::Sort {
                    input: Box::new(plan),
                    keys: lower_output_order_by(order_by)?,
                }
            }
        }
    };

    if let Some(limit_clause) = &query.limit_clause {
        let (limit_expr, offset_expr) = match limit_clause {
            LimitClause::LimitOffset { limit, offset, .. } => {
                (limit.as_ref(), offset.as_ref().map(|o| &o.value))
            }
            LimitClause::OffsetCommaLimit { offset, limit } => (Some(limit), Some(offset)),
        };
        let limit = limit_expr.map(expr_to_usize).transpose()?;
        let offset = offset_expr.map(expr_to_usize).transpose()?.unwrap_or(0);
        if limit.is_some() || offset > 0 {
            plan = Plan::Limit {
                input: Box::new(plan),
                limit,
                offset,
            };
        }
    }

    Ok(plan)
}

/// Lower a SetExpr (SELECT, parenthesized query, UNION)
fn lower_set_expr(set_expr: &SetExpr) -> ExecResult<Plan> {
    match set_expr {
        SetExpr::Select(select) => lower_select(select, &[]),
        SetExpr::Query(q) => lower_query(q),
        SetExpr::SetOperation {
            op: SetOperator::Union,
            set_quantifier,
            left,
            right,
        } => {
            let all = matches!(set_quantifier, SetQuantifier::All | SetQuantifier::AllByName);
            let mut inputs = Vec::new();
            for side in [left, right] {
                match lower_set_expr(side)? {
                    // Flatten chains of the same flavour: a UNION b UNION c
                    Plan::Union {
                        inputs: nested,
                        all: nested_all,
                    } if nested_all == all => inputs.extend(nested),
                    plan => inputs.push(plan),
                }
            }
            Ok(Plan::Union { inputs, all })
        }
        SetExpr::SetOperation { op, .. } => Err(ExecError::Unsupported(format!("{}", op))),
        other => Err(ExecError::Unsupported(format!("query body {}", other))),
    }
}

/// ORDER BY over a finished result: ordinals select output columns
fn lower_output_order_by(exprs: &[OrderByExpr]) -> ExecResult<Vec<SortKey>> {
    exprs
        .iter()
        .map(|obe| {
            let expr = match ordinal(&obe.expr) {
                Some(pos) => Expr::Position(pos),
                None => lower_expr(&obe.expr, None)?,
            };
            Ok(sort_key(obe, expr))
        })
        .collect()
}

pub(crate) fn sort_key(obe: &OrderByExpr, expr: Expr) -> SortKey {
    let ascending = obe.options.asc.unwrap_or(true);
    SortKey {
        expr,
        ascending,
        nulls_first: obe.options.nulls_first.unwrap_or(!ascending),
    }
}

/// A positive integer literal used as a column position
pub(crate) fn ordinal(expr: &ast::Expr) -> Option<usize> {
    match expr {
        ast::Expr::Value(v) => match &v.value {
            ast::Value::Number(n, _) => n.parse::<usize>().ok().filter(|n| *n > 0),
            _ => None,
        },
        _ => None,
    }
}

/// LIMIT/OFFSET must be non-negative integer literals
fn expr_to_usize(expr: &ast::Expr) -> ExecResult<usize> {
    match expr {
        ast::Expr::Value(v) => match &v.value {
            ast::Value::Number(n, _) => n
                .parse()
                .map_err(|_| ExecError::TypeError(format!("invalid LIMIT/OFFSET '{}'", n))),
            other => Err(ExecError::TypeError(format!("invalid LIMIT/OFFSET '{}'", other))),
        },
        other => Err(ExecError::Unsupported(format!("LIMIT/OFFSET {}", other))),
    }
}
