//! SELECT lowering: FROM → WHERE → GROUP BY/HAVING → ORDER BY → projection → DISTINCT

use crate::error::{ExecError, ExecResult};
use crate::lowering::expr::lower_expr;
use crate::lowering::query::{lower_query, ordinal, sort_key};
use crate::plan::{
    AggregateCall, BinaryOp, Expr, JoinKind, Plan, ProjectItem, RelationRef, Scan, SortKey,
};
use sqlparser::ast::{
    self, Distinct, GroupByExpr, Join, JoinConstraint, JoinOperator, OrderByExpr, Select,
    SelectItem, SelectItemQualifiedWildcardKind, TableFactor, TableWithJoins,
};

/// Lower a SELECT, sorting by `order_by` before the projection
pub(crate) fn lower_select(select: &Select, order_by: &[OrderByExpr]) -> ExecResult<Plan> {
    let mut plan = lower_from(&select.from)?;

    if let Some(selection) = &select.selection {
        plan = Plan::Filter {
            input: Box::new(plan),
            predicate: lower_expr(selection, None)?,
        };
    }

    // Aggregate calls may appear in the projection, HAVING and ORDER BY
    let mut aggregates: Vec<AggregateCall> = Vec::new();

    let mut items = Vec::with_capacity(select.projection.len());
    for item in &select.projection {
        items.push(lower_select_item(item, &mut aggregates)?);
    }

    let having = select
        .having
        .as_ref()
        .map(|h| lower_expr(h, Some(&mut aggregates)))
        .transpose()?;

    let mut keys: Vec<SortKey> = Vec::with_capacity(order_by.len());
    for obe in order_by {
        let expr = match select_item_for(&obe.expr, &select.projection, &items)? {
            Some(expr) => expr,
            None => lower_expr(&obe.expr, Some(&mut aggregates))?,
        };
        keys.push(sort_key(obe, expr));
    }

    let group_by = lower_group_by(&select.group_by, &select.projection)?;

    if !group_by.is_empty() || !aggregates.is_empty() {
        plan = Plan::Aggregate {
            input: Box::new(plan),
            group_by,
            aggregates,
            having,
        };
    } else if let Some(predicate) = having {
        plan = Plan::Filter {
            input: Box::new(plan),
            predicate,
        };
    }

    if !keys.is_empty() {
        plan = Plan::Sort {
            input: Box::new(plan),
            keys,
        };
    }

    plan = Plan::Project {
        input: Box::new(plan),
        items,
    };

    match &select.distinct {
        None => {}
        Some(Distinct::Distinct) => {
            plan = Plan::Distinct {
                input: Box::new(plan),
            }
        }
        Some(other) => return Err(ExecError::Unsupported(other.to_string())),
    }

    Ok(plan)
}

fn lower_select_item(
    item: &SelectItem,
    aggregates: &mut Vec<AggregateCall>,
) -> ExecResult<ProjectItem> {
    match item {
        SelectItem::UnnamedExpr(expr) => {
            let alias = match expr {
                ast::Expr::Identifier(_) | ast::Expr::CompoundIdentifier(_) => None,
                other => Some(infer_column_name(other)),
            };
            Ok(ProjectItem::Expr {
                expr: lower_expr(expr, Some(aggregates))?,
                alias,
            })
        }
        SelectItem::ExprWithAlias { expr, alias } => Ok(ProjectItem::Expr {
            expr: lower_expr(expr, Some(aggregates))?,
            alias: Some(alias.value.clone()),
        }),
        SelectItem::Wildcard(_) => Ok(ProjectItem::Wildcard { qualifier: None }),
        SelectItem::QualifiedWildcard(SelectItemQualifiedWildcardKind::ObjectName(name), _) => {
            let qualifier = name
                .0
                .last()
                .and_then(|part| part.as_ident())
                .map(|ident| ident.value.clone())
                .ok_or_else(|| ExecError::Unsupported(format!("{}.*", name)))?;
            Ok(ProjectItem::Wildcard {
                qualifier: Some(qualifier),
            })
        }
        SelectItem::QualifiedWildcard(kind, _) => {
            Err(ExecError::Unsupported(format!("wildcard {}", kind)))
        }
    }
}

/// Output name of an unaliased computed column
fn infer_column_name(expr: &ast::Expr) -> String {
    match expr {
        ast::Expr::Function(f) => f.name.to_string().to_lowercase(),
        ast::Expr::Nested(inner) => infer_column_name(inner),
        other => other.to_string(),
    }
}

/// Resolve an ORDER BY key naming a select item by position or alias
fn select_item_for(
    key: &ast::Expr,
    projection: &[SelectItem],
    items: &[ProjectItem],
) -> ExecResult<Option<Expr>> {
    if let Some(pos) = ordinal(key) {
        return match items.get(pos - 1) {
            Some(ProjectItem::Expr { expr, .. }) => Ok(Some(expr.clone())),
            Some(ProjectItem::Wildcard { .. }) => Err(ExecError::Unsupported(format!(
                "ORDER BY position {} refers to a wildcard",
                pos
            ))),
            None => Err(ExecError::ColumnNotFound(format!("position {}", pos))),
        };
    }
    if let ast::Expr::Identifier(ident) = key {
        for (item, lowered) in projection.iter().zip(items) {
            if let (SelectItem::ExprWithAlias { alias, .. }, ProjectItem::Expr { expr, .. }) =
                (item, lowered)
            {
                if alias.value.eq_ignore_ascii_case(&ident.value) {
                    return Ok(Some(expr.clone()));
                }
            }
        }
    }
    Ok(None)
}

fn lower_group_by(group_by: &GroupByExpr, projection: &[SelectItem]) -> ExecResult<Vec<Expr>> {
    let exprs = match group_by {
        GroupByExpr::Expressions(exprs, _) => exprs,
        GroupByExpr::All(_) => return Err(ExecError::Unsupported("GROUP BY ALL".to_string())),
    };
    exprs
        .iter()
        .map(|e| match ordinal(e) {
            Some(pos) => match projection.get(pos - 1) {
                Some(SelectItem::UnnamedExpr(expr)) | Some(SelectItem::ExprWithAlias { expr, .. }) => {
                    lower_expr(expr, None)
                }
                _ => Err(ExecError::ColumnNotFound(format!("GROUP BY position {}", pos))),
            },
            None => lower_expr(e, None),
        })
        .collect()
}

/// Lower the FROM clause; additional comma-separated items are cross joins
fn lower_from(from: &[TableWithJoins]) -> ExecResult<Plan> {
    let Some((first, rest)) = from.split_first() else {
        return Ok(Plan::Dual);
    };
    let mut plan = lower_table_with_joins(first)?;
    for twj in rest {
        plan = Plan::Join {
            left: Box::new(plan),
            right: Box::new(lower_table_with_joins(twj)?),
            kind: JoinKind::Inner,
            condition: None,
        };
    }
    Ok(plan)
}

fn lower_table_with_joins(twj: &TableWithJoins) -> ExecResult<Plan> {
    let mut plan = lower_table_factor(&twj.relation)?;
    for join in &twj.joins {
        plan = lower_join(plan, join)?;
    }
    Ok(plan)
}

fn lower_table_factor(factor: &TableFactor) -> ExecResult<Plan> {
    match factor {
        TableFactor::Table {
            name, alias, args, ..
        } => {
            if args.is_some() {
                return Err(ExecError::Unsupported(format!("table function {}", name)));
            }
            let parts = name
                .0
                .iter()
                .map(|p| p.as_ident().map(|i| i.value.clone()))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| ExecError::Unsupported(format!("relation name {}", name)))?;
            let relation = RelationRef::from_parts(&parts)
                .ok_or_else(|| ExecError::Unsupported(format!("relation name {}", name)))?;
            Ok(Plan::Scan(Scan {
                relation,
                alias: alias.as_ref().map(|a| a.name.value.clone()),
                source: None,
            }))
        }
        TableFactor::Derived {
            subquery, alias, ..
        } => Ok(Plan::Derived {
            input: Box::new(lower_query(subquery)?),
            alias: alias.as_ref().map(|a| a.name.value.clone()),
        }),
        TableFactor::NestedJoin {
            table_with_joins,
            alias,
        } => {
            let plan = lower_table_with_joins(table_with_joins)?;
            Ok(match alias {
                Some(a) => Plan::Derived {
                    input: Box::new(plan),
                    alias: Some(a.name.value.clone()),
                },
                None => plan,
            })
        }
        other => Err(ExecError::Unsupported(format!("FROM item {}", other))),
    }
}

fn lower_join(left: Plan, join: &Join) -> ExecResult<Plan> {
    let right = lower_table_factor(&join.relation)?;
    let (kind, constraint) = match &join.join_operator {
        JoinOperator::Join(c) | JoinOperator::Inner(c) => (JoinKind::Inner, Some(c)),
        JoinOperator::Left(c) | JoinOperator::LeftOuter(c) => (JoinKind::Left, Some(c)),
        _ if join
            .to_string()
            .trim_start()
            .to_ascii_uppercase()
            .starts_with("CROSS JOIN") =>
        {
            (JoinKind::Inner, None)
        }
        _ => {
            return Err(ExecError::Unsupported(format!(
                "join {}",
                join.to_string().trim()
            )))
        }
    };

    let condition = match constraint {
        Some(JoinConstraint::On(expr)) => Some(lower_expr(expr, None)?),
        Some(JoinConstraint::Using(columns)) => Some(using_condition(&left, &right, columns)?),
        Some(JoinConstraint::Natural) => {
            return Err(ExecError::Unsupported("NATURAL JOIN".to_string()))
        }
        Some(JoinConstraint::None) | None => None,
    };

    Ok(Plan::Join {
        left: Box::new(left),
        right: Box::new(right),
        kind,
        condition,
    })
}

/// Qualifier under which a FROM item's columns are visible
fn plan_label(plan: &Plan) -> Option<&str> {
    match plan {
        Plan::Scan(scan) => Some(scan.qualifier()),
        Plan::Derived {
            alias: Some(alias), ..
        } => Some(alias),
        _ => None,
    }
}

/// `USING (a, b)` → `l.a = r.a AND l.b = r.b`
fn using_condition(left: &Plan, right: &Plan, columns: &[ast::ObjectName]) -> ExecResult<Expr> {
    let (Some(l), Some(r)) = (plan_label(left), plan_label(right)) else {
        return Err(ExecError::Unsupported(
            "USING needs named relations on both sides".to_string(),
        ));
    };
    let mut condition: Option<Expr> = None;
    for column in columns {
        let name = column
            .0
            .last()
            .and_then(|p| p.as_ident())
            .map(|i| i.value.clone())
            .ok_or_else(|| ExecError::Unsupported(format!("USING column {}", column)))?;
        let eq = Expr::binary(
            Expr::column(Some(l), &name),
            BinaryOp::Eq,
            Expr::column(Some(r), &name),
        );
        condition = Some(match condition {
            Some(prev) => Expr::binary(prev, BinaryOp::And, eq),
            None => eq,
        });
    }
    condition.ok_or_else(|| ExecError::Unsupported("empty USING list".to_string()))
}
