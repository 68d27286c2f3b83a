//! Row-level expression evaluation with SQL three-valued logic

use crate::error::{ExecError, ExecResult};
use crate::plan::{BinaryOp, ColumnRef, Expr, ScalarFunc, UnaryOp};
use mt_core::{lookup_column, parse_timestamp, ColumnId, ColumnLookup, ScalarType, Value};
use regex::Regex;
use std::cmp::Ordering;

/// Evaluate `expr` against one row whose layout is `columns`
pub(crate) fn evaluate(expr: &Expr, columns: &[ColumnId], row: &[Value]) -> ExecResult<Value> {
    match expr {
        Expr::Column(col) => {
            let idx = column_index(columns, col)?;
            Ok(row[idx].clone())
        }
        Expr::Literal(v) => Ok(v.clone()),
        Expr::Position(pos) => pos
            .checked_sub(1)
            .and_then(|idx| row.get(idx))
            .cloned()
            .ok_or_else(|| ExecError::ColumnNotFound(format!("position {}", pos))),

        Expr::Binary { left, op, right } => match op {
            BinaryOp::And => {
                let l = truth(&evaluate(left, columns, row)?)?;
                if l == Some(false) {
                    return Ok(Value::Boolean(false));
                }
                let r = truth(&evaluate(right, columns, row)?)?;
                Ok(match (l, r) {
                    (_, Some(false)) => Value::Boolean(false),
                    (Some(true), Some(true)) => Value::Boolean(true),
                    _ => Value::Null,
                })
            }
            BinaryOp::Or => {
                let l = truth(&evaluate(left, columns, row)?)?;
                if l == Some(true) {
                    return Ok(Value::Boolean(true));
                }
                let r = truth(&evaluate(right, columns, row)?)?;
                Ok(match (l, r) {
                    (_, Some(true)) => Value::Boolean(true),
                    (Some(false), Some(false)) => Value::Boolean(false),
                    _ => Value::Null,
                })
            }
            _ => {
                let l = evaluate(left, columns, row)?;
                let r = evaluate(right, columns, row)?;
                binary(&l, *op, &r)
            }
        },

        Expr::Unary { op, expr } => {
            let v = evaluate(expr, columns, row)?;
            match (op, v) {
                (_, Value::Null) => Ok(Value::Null),
                (UnaryOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
                (UnaryOp::Neg, Value::Integer(i)) => Ok(i
                    .checked_neg()
                    .map_or(Value::Float(-(i as f64)), Value::Integer)),
                (UnaryOp::Neg, Value::Float(f)) => Ok(Value::Float(-f)),
                (op, v) => Err(ExecError::TypeError(format!(
                    "cannot apply {:?} to {}",
                    op,
                    v.scalar_type()
                ))),
            }
        }

        Expr::IsNull { expr, negated } => {
            let is_null = evaluate(expr, columns, row)?.is_null();
            Ok(Value::Boolean(is_null != *negated))
        }

        Expr::InList {
            expr,
            list,
            negated,
        } => {
            let needle = evaluate(expr, columns, row)?;
            let candidates = list
                .iter()
                .map(|e| evaluate(e, columns, row))
                .collect::<ExecResult<Vec<_>>>()?;
            Ok(in_list(&needle, &candidates, *negated))
        }

        Expr::Between {
            expr,
            low,
            high,
            negated,
        } => {
            let v = evaluate(expr, columns, row)?;
            let lo = compare(&v, &evaluate(low, columns, row)?)?;
            let hi = compare(&v, &evaluate(high, columns, row)?)?;
            Ok(match (lo, hi) {
                (Some(lo), Some(hi)) => {
                    Value::Boolean((lo != Ordering::Less && hi != Ordering::Greater) != *negated)
                }
                _ => Value::Null,
            })
        }

        Expr::Like {
            expr,
            pattern,
            negated,
            case_insensitive,
        } => {
            let v = evaluate(expr, columns, row)?;
            let p = evaluate(pattern, columns, row)?;
            if v.is_null() || p.is_null() {
                return Ok(Value::Null);
            }
            let re = like_regex(&p.to_string(), *case_insensitive)?;
            Ok(Value::Boolean(re.is_match(&v.to_string()) != *negated))
        }

        Expr::Case {
            branches,
            else_result,
        } => {
            for (condition, result) in branches {
                if truth(&evaluate(condition, columns, row)?)? == Some(true) {
                    return evaluate(result, columns, row);
                }
            }
            match else_result {
                Some(e) => evaluate(e, columns, row),
                None => Ok(Value::Null),
            }
        }

        Expr::Cast { expr, to } => cast(evaluate(expr, columns, row)?, *to),

        Expr::Function { func, args } => {
            let args = args
                .iter()
                .map(|e| evaluate(e, columns, row))
                .collect::<ExecResult<Vec<_>>>()?;
            call(*func, args)
        }

        Expr::Subquery(_) | Expr::InSubquery { .. } => Err(ExecError::Internal(
            "subquery reached row evaluation unprepared".to_string(),
        )),
    }
}

/// Index of a column reference in a row layout
pub(crate) fn column_index(columns: &[ColumnId], col: &ColumnRef) -> ExecResult<usize> {
    match lookup_column(columns, col.qualifier.as_deref(), &col.name) {
        ColumnLookup::Found(idx) => Ok(idx),
        ColumnLookup::Missing => Err(ExecError::ColumnNotFound(col.to_string())),
        ColumnLookup::Ambiguous => Err(ExecError::AmbiguousColumn(col.to_string())),
    }
}

/// Whether a predicate result keeps a row: only TRUE does
pub(crate) fn is_true(v: &Value) -> bool {
    matches!(v, Value::Boolean(true))
}

fn truth(v: &Value) -> ExecResult<Option<bool>> {
    match v {
        Value::Null => Ok(None),
        Value::Boolean(b) => Ok(Some(*b)),
        other => Err(ExecError::TypeError(format!(
            "expected boolean, got {}",
            other.scalar_type()
        ))),
    }
}

/// Compare two values; text against a number is compared numerically
fn compare(l: &Value, r: &Value) -> ExecResult<Option<Ordering>> {
    if l.is_null() || r.is_null() {
        return Ok(None);
    }
    if let Some(ord) = l.sql_cmp(r) {
        return Ok(Some(ord));
    }
    let coerced = match (l, r) {
        (Value::Text(t), n) | (n, Value::Text(t)) if n.as_f64().is_some() => {
            t.trim().parse::<f64>().ok().map(|parsed| {
                let other = n.as_f64().unwrap_or_default();
                if matches!(l, Value::Text(_)) {
                    parsed.partial_cmp(&other)
                } else {
                    other.partial_cmp(&parsed)
                }
            })
        }
        _ => None,
    };
    match coerced {
        Some(ord) => Ok(ord),
        None => Err(ExecError::TypeError(format!(
            "cannot compare {} with {}",
            l.scalar_type(),
            r.scalar_type()
        ))),
    }
}

fn in_list(needle: &Value, candidates: &[Value], negated: bool) -> Value {
    if needle.is_null() {
        return Value::Null;
    }
    let mut saw_null = false;
    for c in candidates {
        match compare(needle, c) {
            Ok(Some(Ordering::Equal)) => return Value::Boolean(!negated),
            Ok(None) => saw_null = true,
            _ => {}
        }
    }
    if saw_null {
        Value::Null
    } else {
        Value::Boolean(negated)
    }
}

fn binary(l: &Value, op: BinaryOp, r: &Value) -> ExecResult<Value> {
    use BinaryOp::*;
    match op {
        Eq | NotEq | Lt | LtEq | Gt | GtEq => {
            let Some(ord) = compare(l, r)? else {
                return Ok(Value::Null);
            };
            let result = match op {
                Eq => ord == Ordering::Equal,
                NotEq => ord != Ordering::Equal,
                Lt => ord == Ordering::Less,
                LtEq => ord != Ordering::Greater,
                Gt => ord == Ordering::Greater,
                _ => ord != Ordering::Less,
            };
            Ok(Value::Boolean(result))
        }
        Concat => {
            if l.is_null() || r.is_null() {
                Ok(Value::Null)
            } else {
                Ok(Value::Text(format!("{}{}", l, r)))
            }
        }
        Plus | Minus | Multiply | Divide | Modulo => arithmetic(l, op, r),
        And | Or => Err(ExecError::Internal("logical operator in arithmetic".to_string())),
    }
}

fn arithmetic(l: &Value, op: BinaryOp, r: &Value) -> ExecResult<Value> {
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    if let (Value::Integer(a), Value::Integer(b)) = (l, r) {
        let (a, b) = (*a, *b);
        let exact = match op {
            BinaryOp::Plus => a.checked_add(b),
            BinaryOp::Minus => a.checked_sub(b),
            BinaryOp::Multiply => a.checked_mul(b),
            BinaryOp::Modulo => {
                if b == 0 {
                    return Ok(Value::Null);
                }
                a.checked_rem(b)
            }
            _ => None,
        };
        if let Some(v) = exact {
            return Ok(Value::Integer(v));
        }
    }
    let (Some(a), Some(b)) = (l.as_f64(), r.as_f64()) else {
        return Err(ExecError::TypeError(format!(
            "cannot apply {:?} to {} and {}",
            op,
            l.scalar_type(),
            r.scalar_type()
        )));
    };
    let v = match op {
        BinaryOp::Plus => a + b,
        BinaryOp::Minus => a - b,
        BinaryOp::Multiply => a * b,
        BinaryOp::Divide | BinaryOp::Modulo if b == 0.0 => return Ok(Value::Null),
        BinaryOp::Divide => a / b,
        _ => a % b,
    };
    Ok(Value::Float(v))
}

/// Translate a LIKE pattern (`%`, `_`) into an anchored regex
fn like_regex(pattern: &str, case_insensitive: bool) -> ExecResult<Regex> {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push_str(if case_insensitive { "(?is)^" } else { "(?s)^" });
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| ExecError::TypeError(format!("invalid LIKE pattern: {}", e)))
}

pub(crate) fn cast(v: Value, to: ScalarType) -> ExecResult<Value> {
    let fail = |v: &Value| {
        ExecError::TypeError(format!("cannot cast {} '{}' to {}", v.scalar_type(), v, to))
    };
    Ok(match (to, v) {
        (_, Value::Null) => Value::Null,
        (ScalarType::Unknown, v) => v,
        (ScalarType::Text, v) => Value::Text(v.to_string()),
        (ScalarType::Integer, Value::Integer(i)) => Value::Integer(i),
        (ScalarType::Integer, Value::Float(f)) => Value::Integer(f.round() as i64),
        (ScalarType::Integer, Value::Boolean(b)) => Value::Integer(b as i64),
        (ScalarType::Integer, Value::Text(s)) => {
            let t = s.trim();
            match t.parse::<i64>() {
                Ok(i) => Value::Integer(i),
                Err(_) => match t.parse::<f64>() {
                    Ok(f) => Value::Integer(f.round() as i64),
                    Err(_) => return Err(fail(&Value::Text(s))),
                },
            }
        }
        (ScalarType::Float, Value::Integer(i)) => Value::Float(i as f64),
        (ScalarType::Float, Value::Float(f)) => Value::Float(f),
        (ScalarType::Float, Value::Boolean(b)) => Value::Float(if b { 1.0 } else { 0.0 }),
        (ScalarType::Float, Value::Text(s)) => match s.trim().parse::<f64>() {
            Ok(f) => Value::Float(f),
            Err(_) => return Err(fail(&Value::Text(s))),
        },
        (ScalarType::Boolean, Value::Boolean(b)) => Value::Boolean(b),
        (ScalarType::Boolean, Value::Integer(i)) => Value::Boolean(i != 0),
        (ScalarType::Boolean, Value::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "yes" => Value::Boolean(true),
            "false" | "f" | "0" | "no" => Value::Boolean(false),
            _ => return Err(fail(&Value::Text(s))),
        },
        (ScalarType::Timestamp, Value::Timestamp(t)) => Value::Timestamp(t),
        (ScalarType::Timestamp, Value::Text(s)) => match parse_timestamp(&s) {
            Some(t) => Value::Timestamp(t),
            None => return Err(fail(&Value::Text(s))),
        },
        (_, v) => return Err(fail(&v)),
    })
}

fn call(func: ScalarFunc, args: Vec<Value>) -> ExecResult<Value> {
    let arity = |n: usize| {
        if args.len() == n {
            Ok(())
        } else {
            Err(ExecError::TypeError(format!(
                "{:?} expects {} argument(s), got {}",
                func,
                n,
                args.len()
            )))
        }
    };
    match func {
        ScalarFunc::Coalesce => Ok(args.into_iter().find(|v| !v.is_null()).unwrap_or(Value::Null)),
        ScalarFunc::Upper | ScalarFunc::Lower => {
            arity(1)?;
            Ok(match &args[0] {
                Value::Null => Value::Null,
                v if func == ScalarFunc::Upper => Value::Text(v.to_string().to_uppercase()),
                v => Value::Text(v.to_string().to_lowercase()),
            })
        }
        ScalarFunc::Length => {
            arity(1)?;
            Ok(match &args[0] {
                Value::Null => Value::Null,
                v => Value::Integer(v.to_string().chars().count() as i64),
            })
        }
        ScalarFunc::Abs => {
            arity(1)?;
            match &args[0] {
                Value::Null => Ok(Value::Null),
                Value::Integer(i) => Ok(i
                    .checked_abs()
                    .map_or(Value::Float((*i as f64).abs()), Value::Integer)),
                Value::Float(f) => Ok(Value::Float(f.abs())),
                v => Err(ExecError::TypeError(format!("ABS of {}", v.scalar_type()))),
            }
        }
        ScalarFunc::Round => {
            if args.is_empty() || args.len() > 2 {
                return Err(ExecError::TypeError(format!(
                    "Round expects 1 or 2 arguments, got {}",
                    args.len()
                )));
            }
            let digits = match args.get(1) {
                Some(Value::Null) => return Ok(Value::Null),
                Some(d) => d
                    .as_i64()
                    .ok_or_else(|| ExecError::TypeError("ROUND digits must be an integer".into()))?,
                None => 0,
            };
            match &args[0] {
                Value::Null => Ok(Value::Null),
                Value::Integer(i) => Ok(Value::Integer(*i)),
                Value::Float(f) => {
                    let scale = 10f64.powi(digits as i32);
                    Ok(Value::Float((f * scale).round() / scale))
                }
                v => Err(ExecError::TypeError(format!("ROUND of {}", v.scalar_type()))),
            }
        }
    }
}
