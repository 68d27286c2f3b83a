//! SQL parser wrapper

use crate::dialect::DuckDbDialect;
use crate::error::{SqlError, SqlResult};
use sqlparser::ast::Statement;
use std::borrow::Cow;

/// SQL parser for Modeltable queries, using the DuckDB dialect
#[derive(Debug, Default)]
pub struct SqlParser {
    dialect: DuckDbDialect,
}

impl SqlParser {
    pub fn duckdb() -> Self {
        Self::default()
    }

    /// Parse SQL into AST statements.
    ///
    /// Version pins such as `task_model.3` are quoted first so they survive
    /// tokenization as identifier parts.
    pub fn parse(&self, sql: &str) -> SqlResult<Vec<Statement>> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(SqlError::EmptySql);
        }

        let normalized = normalize_version_pins(sql);
        let statements = self.dialect.parse(&normalized)?;
        if statements.is_empty() {
            return Err(SqlError::EmptySql);
        }
        Ok(statements)
    }

    /// Parse SQL and return the first statement
    pub fn parse_single(&self, sql: &str) -> SqlResult<Statement> {
        let stmts = self.parse(sql)?;
        stmts.into_iter().next().ok_or(SqlError::EmptySql)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Run {
    None,
    Ident,
    QuotedIdent,
    Number,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Rewrite `ident.<digits>` into `ident."<digits>"` outside literals and
/// comments, so a numeric version suffix parses as an identifier part.
pub fn normalize_version_pins(sql: &str) -> Cow<'_, str> {
    if !sql.contains('.') {
        return Cow::Borrowed(sql);
    }

    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len() + 8);
    let mut changed = false;
    let mut run = Run::None;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' => {
                let end = closing_quote(&chars, i);
                out.extend(&chars[i..end]);
                run = if c == '"' { Run::QuotedIdent } else { Run::None };
                i = end;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| ch == '\n')
                    .map(|p| i + p)
                    .unwrap_or(chars.len());
                out.extend(&chars[i..end]);
                run = Run::None;
                i = end;
            }
            '.' if matches!(run, Run::Ident | Run::QuotedIdent) => {
                let digits_end = chars[i + 1..]
                    .iter()
                    .position(|ch| !ch.is_ascii_digit())
                    .map(|p| i + 1 + p)
                    .unwrap_or(chars.len());
                let has_digits = digits_end > i + 1;
                let terminated = chars
                    .get(digits_end)
                    .map_or(true, |&ch| !is_word_char(ch) && ch != '.');
                if has_digits && terminated {
                    out.push_str(".\"");
                    out.extend(&chars[i + 1..digits_end]);
                    out.push('"');
                    changed = true;
                    run = Run::QuotedIdent;
                    i = digits_end;
                } else {
                    out.push('.');
                    run = Run::None;
                    i += 1;
                }
            }
            c if c.is_ascii_digit() && run == Run::None => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| !(is_word_char(ch) || ch == '.'))
                    .map(|p| i + p)
                    .unwrap_or(chars.len());
                out.extend(&chars[i..end]);
                run = Run::Number;
                i = end;
            }
            c if is_word_char(c) => {
                let end = chars[i..]
                    .iter()
                    .position(|&ch| !is_word_char(ch))
                    .map(|p| i + p)
                    .unwrap_or(chars.len());
                out.extend(&chars[i..end]);
                if run != Run::Number {
                    run = Run::Ident;
                }
                i = end;
            }
            _ => {
                out.push(c);
                run = Run::None;
                i += 1;
            }
        }
    }

    if changed {
        Cow::Owned(out)
    } else {
        Cow::Borrowed(sql)
    }
}

/// Index one past the quote closing the literal opened at `start`.
/// Doubled quotes are escapes.
fn closing_quote(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

#[cfg(test)]
#[path = "parser_test.rs"]
mod tests;
