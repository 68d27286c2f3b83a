//! AST-to-plan lowering: converts sqlparser statements into plan trees
//!
//! Lowering is purely syntactic. Relation names stay unbound until the
//! resolver runs, so a lowered view definition can be cached or inlined
//! into any project.

pub(crate) mod expr;
pub(crate) mod query;
pub(crate) mod select;

use crate::error::{ExecError, ExecResult};
use crate::plan::Plan;
use sqlparser::ast::Statement;

/// Lower a sqlparser Statement into a plan
///
/// Only `Statement::Query` is supported. Other statement types return an error.
pub fn lower_statement(stmt: &Statement) -> ExecResult<Plan> {
    match stmt {
        Statement::Query(query) => query::lower_query(query),
        other => Err(ExecError::Unsupported(format!(
            "only SELECT queries can be executed, got {}",
            statement_kind(other)
        ))),
    }
}

/// Return a human-readable name for a statement variant
fn statement_kind(stmt: &Statement) -> &'static str {
    match stmt {
        Statement::Query { .. } => "SELECT",
        Statement::Insert { .. } => "INSERT",
        Statement::Update { .. } => "UPDATE",
        Statement::Delete { .. } => "DELETE",
        Statement::CreateTable { .. } => "CREATE TABLE",
        Statement::Drop { .. } => "DROP",
        _ => "unsupported statement",
    }
}

#[cfg(test)]
#[path = "lowering_test.rs"]
mod tests;
