//! Expression lowering: sqlparser Expr → plan Expr

use crate::error::{ExecError, ExecResult};
use crate::lowering::query::lower_query;
use crate::plan::{
    aggregate_column, AggregateCall, AggregateFunc, BinaryOp, ColumnRef, Expr, ScalarFunc,
    UnaryOp,
};
use mt_core::{ScalarType, Value};
use sqlparser::ast::{
    self, BinaryOperator, DuplicateTreatment, FunctionArg, FunctionArgExpr, FunctionArguments,
    UnaryOperator,
};

/// Lower an expression.
///
/// `aggs` collects aggregate calls when they are allowed at this position;
/// each call is replaced by a reference to its aggregate column. With
/// `None`, an aggregate call is an error.
pub(crate) fn lower_expr(
    expr: &ast::Expr,
    mut aggs: Option<&mut Vec<AggregateCall>>,
) -> ExecResult<Expr> {
    match expr {
        ast::Expr::Identifier(ident) => Ok(Expr::Column(ColumnRef {
            qualifier: None,
            name: ident.value.clone(),
        })),

        ast::Expr::CompoundIdentifier(idents) => match idents.as_slice() {
            [] => Err(ExecError::Unsupported("empty identifier".to_string())),
            [column] => Ok(Expr::column(None, &column.value)),
            // db.table.column: the relation is addressed by its last part
            [.., table, column] => Ok(Expr::column(Some(&table.value), &column.value)),
        },

        ast::Expr::Value(v) => lower_value(&v.value).map(Expr::Literal),

        ast::Expr::Nested(inner) => lower_expr(inner, aggs),

        ast::Expr::BinaryOp { left, op, right } => {
            let op = lower_binary_op(op)?;
            let left = lower_expr(left, aggs.as_deref_mut())?;
            let right = lower_expr(right, aggs)?;
            Ok(Expr::binary(left, op, right))
        }

        ast::Expr::UnaryOp { op, expr: inner } => {
            let inner = lower_expr(inner, aggs)?;
            match op {
                UnaryOperator::Not => Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(inner),
                }),
                UnaryOperator::Minus => Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(inner),
                }),
                UnaryOperator::Plus => Ok(inner),
                other => Err(ExecError::Unsupported(format!("unary operator {}", other))),
            }
        }

        ast::Expr::IsNull(inner) => Ok(Expr::IsNull {
            expr: Box::new(lower_expr(inner, aggs)?),
            negated: false,
        }),

        ast::Expr::IsNotNull(inner) => Ok(Expr::IsNull {
            expr: Box::new(lower_expr(inner, aggs)?),
            negated: true,
        }),

        ast::Expr::InList {
            expr: inner,
            list,
            negated,
        } => {
            let inner = lower_expr(inner, aggs.as_deref_mut())?;
            let list = list
                .iter()
                .map(|e| lower_expr(e, aggs.as_deref_mut()))
                .collect::<ExecResult<Vec<_>>>()?;
            Ok(Expr::InList {
                expr: Box::new(inner),
                list,
                negated: *negated,
            })
        }

        ast::Expr::InSubquery {
            expr: inner,
            subquery,
            negated,
        } => Ok(Expr::InSubquery {
            expr: Box::new(lower_expr(inner, aggs)?),
            subquery: Box::new(lower_query(subquery)?),
            negated: *negated,
        }),

        ast::Expr::Subquery(query) => Ok(Expr::Subquery(Box::new(lower_query(query)?))),

        ast::Expr::Between {
            expr: inner,
            negated,
            low,
            high,
        } => Ok(Expr::Between {
            expr: Box::new(lower_expr(inner, aggs.as_deref_mut())?),
            low: Box::new(lower_expr(low, aggs.as_deref_mut())?),
            high: Box::new(lower_expr(high, aggs)?),
            negated: *negated,
        }),

        ast::Expr::Like {
            negated,
            expr: inner,
            pattern,
            ..
        } => lower_like(inner, pattern, *negated, false, aggs),

        ast::Expr::ILike {
            negated,
            expr: inner,
            pattern,
            ..
        } => lower_like(inner, pattern, *negated, true, aggs),

        ast::Expr::Case {
            operand,
            conditions,
            else_result,
            ..
        } => {
            let operand = operand
                .as_ref()
                .map(|o| lower_expr(o, aggs.as_deref_mut()))
                .transpose()?;
            let mut branches = Vec::with_capacity(conditions.len());
            for when in conditions {
                let condition = lower_expr(&when.condition, aggs.as_deref_mut())?;
                // Simple CASE compares the operand against each WHEN value
                let condition = match &operand {
                    Some(op) => Expr::binary(op.clone(), BinaryOp::Eq, condition),
                    None => condition,
                };
                let result = lower_expr(&when.result, aggs.as_deref_mut())?;
                branches.push((condition, result));
            }
            let else_result = else_result
                .as_ref()
                .map(|e| lower_expr(e, aggs).map(Box::new))
                .transpose()?;
            Ok(Expr::Case {
                branches,
                else_result,
            })
        }

        ast::Expr::Cast {
            expr: inner,
            data_type,
            ..
        } => Ok(Expr::Cast {
            expr: Box::new(lower_expr(inner, aggs)?),
            to: lower_data_type(data_type)?,
        }),

        ast::Expr::Function(func) => lower_function(func, aggs),

        other => Err(ExecError::Unsupported(format!("expression {}", other))),
    }
}

fn lower_like(
    expr: &ast::Expr,
    pattern: &ast::Expr,
    negated: bool,
    case_insensitive: bool,
    mut aggs: Option<&mut Vec<AggregateCall>>,
) -> ExecResult<Expr> {
    Ok(Expr::Like {
        expr: Box::new(lower_expr(expr, aggs.as_deref_mut())?),
        pattern: Box::new(lower_expr(pattern, aggs)?),
        negated,
        case_insensitive,
    })
}

/// Lower a literal value
pub(crate) fn lower_value(value: &ast::Value) -> ExecResult<Value> {
    match value {
        ast::Value::Number(n, _) => {
            if let Ok(i) = n.parse::<i64>() {
                Ok(Value::Integer(i))
            } else {
                n.parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| ExecError::TypeError(format!("invalid number literal '{}'", n)))
            }
        }
        ast::Value::SingleQuotedString(s) => Ok(Value::Text(s.clone())),
        ast::Value::Boolean(b) => Ok(Value::Boolean(*b)),
        ast::Value::Null => Ok(Value::Null),
        other => Err(ExecError::Unsupported(format!("literal {}", other))),
    }
}

fn lower_binary_op(op: &BinaryOperator) -> ExecResult<BinaryOp> {
    Ok(match op {
        BinaryOperator::Eq => BinaryOp::Eq,
        BinaryOperator::NotEq => BinaryOp::NotEq,
        BinaryOperator::Lt => BinaryOp::Lt,
        BinaryOperator::LtEq => BinaryOp::LtEq,
        BinaryOperator::Gt => BinaryOp::Gt,
        BinaryOperator::GtEq => BinaryOp::GtEq,
        BinaryOperator::And => BinaryOp::And,
        BinaryOperator::Or => BinaryOp::Or,
        BinaryOperator::Plus => BinaryOp::Plus,
        BinaryOperator::Minus => BinaryOp::Minus,
        BinaryOperator::Multiply => BinaryOp::Multiply,
        BinaryOperator::Divide => BinaryOp::Divide,
        BinaryOperator::Modulo => BinaryOp::Modulo,
        BinaryOperator::StringConcat => BinaryOp::Concat,
        other => return Err(ExecError::Unsupported(format!("operator {}", other))),
    })
}

/// Map a SQL type name onto a scalar type
fn lower_data_type(data_type: &ast::DataType) -> ExecResult<ScalarType> {
    let name = data_type.to_string().to_ascii_uppercase();
    let base = name.split('(').next().unwrap_or_default().trim();
    let ty = match base {
        "BOOL" | "BOOLEAN" => ScalarType::Boolean,
        "TINYINT" | "SMALLINT" | "INT" | "INTEGER" | "BIGINT" | "INT2" | "INT4" | "INT8"
        | "HUGEINT" => ScalarType::Integer,
        "FLOAT" | "FLOAT4" | "FLOAT8" | "REAL" | "DOUBLE" | "DOUBLE PRECISION" | "DECIMAL"
        | "NUMERIC" => ScalarType::Float,
        "TEXT" | "STRING" | "VARCHAR" | "CHAR" | "CHARACTER VARYING" => ScalarType::Text,
        "TIMESTAMP" | "DATETIME" | "DATE" => ScalarType::Timestamp,
        _ => return Err(ExecError::Unsupported(format!("cast to {}", data_type))),
    };
    Ok(ty)
}

fn lower_function(
    func: &ast::Function,
    aggs: Option<&mut Vec<AggregateCall>>,
) -> ExecResult<Expr> {
    let name = func.name.to_string();
    if func.over.is_some() {
        return Err(ExecError::Unsupported(format!("window function {}", name)));
    }

    let (args, distinct) = match &func.args {
        FunctionArguments::None => (Vec::new(), false),
        FunctionArguments::List(list) => (
            list.args.iter().collect::<Vec<_>>(),
            matches!(list.duplicate_treatment, Some(DuplicateTreatment::Distinct)),
        ),
        FunctionArguments::Subquery(_) => {
            return Err(ExecError::Unsupported(format!(
                "subquery argument to {}",
                name
            )))
        }
    };

    if let Some(agg) = AggregateFunc::from_name(&name) {
        let Some(collected) = aggs else {
            return Err(ExecError::Unsupported(format!(
                "aggregate function {} is not allowed here",
                name.to_ascii_uppercase()
            )));
        };
        let arg = match args.as_slice() {
            [FunctionArg::Unnamed(FunctionArgExpr::Wildcard)] if agg == AggregateFunc::Count => {
                None
            }
            [FunctionArg::Unnamed(FunctionArgExpr::Expr(e))] => Some(lower_expr(e, None)?),
            _ => {
                return Err(ExecError::Unsupported(format!(
                    "{} expects a single argument",
                    name.to_ascii_uppercase()
                )))
            }
        };
        collected.push(AggregateCall {
            func: agg,
            arg,
            distinct,
        });
        return Ok(Expr::column(None, &aggregate_column(collected.len() - 1)));
    }

    let Some(scalar) = ScalarFunc::from_name(&name) else {
        return Err(ExecError::Unsupported(format!("function {}", name)));
    };
    let mut aggs = aggs;
    let mut lowered = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            FunctionArg::Unnamed(FunctionArgExpr::Expr(e)) => {
                lowered.push(lower_expr(e, aggs.as_deref_mut())?)
            }
            _ => {
                return Err(ExecError::Unsupported(format!(
                    "argument {} to {}",
                    arg, name
                )))
            }
        }
    }
    Ok(Expr::Function {
        func: scalar,
        args: lowered,
    })
}

#[cfg(test)]
#[path = "expr_test.rs"]
mod tests;
