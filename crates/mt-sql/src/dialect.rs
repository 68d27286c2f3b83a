//! DuckDB dialect with located parse errors

use sqlparser::ast::Statement;
use sqlparser::dialect::DuckDbDialect as SqlParserDuckDb;
use sqlparser::parser::Parser;

use crate::error::{SqlError, SqlResult};

/// DuckDB SQL dialect
#[derive(Debug, Default)]
pub struct DuckDbDialect {
    dialect: SqlParserDuckDb,
}

impl DuckDbDialect {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse SQL into AST statements
    pub fn parse(&self, sql: &str) -> SqlResult<Vec<Statement>> {
        Parser::parse_sql(&self.dialect, sql).map_err(|e| {
            let message = e.to_string();
            let (line, column) = parse_location_from_error(&message);
            SqlError::ParseError {
                message,
                line,
                column,
            }
        })
    }
}

/// Extract "Line: N, Column: M" from a sqlparser error message.
///
/// `ParserError` carries no structured location, only text.
fn parse_location_from_error(msg: &str) -> (usize, usize) {
    let Some(line_idx) = msg.find("Line: ") else {
        return (0, 0);
    };
    let line_start = line_idx + 6;
    let Some(comma_idx) = msg[line_start..].find(',') else {
        return (0, 0);
    };
    let Ok(line) = msg[line_start..line_start + comma_idx]
        .trim()
        .parse::<usize>()
    else {
        return (0, 0);
    };
    let Some(col_idx) = msg.find("Column: ") else {
        return (0, 0);
    };
    let col_start = col_idx + 8;
    let col_end = msg[col_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map(|i| col_start + i)
        .unwrap_or(msg.len());
    let Ok(column) = msg[col_start..col_end].trim().parse::<usize>() else {
        return (0, 0);
    };
    (line, column)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_extracted() {
        assert_eq!(
            parse_location_from_error("Expected: an expression, found: EOF at Line: 2, Column: 14"),
            (2, 14)
        );
        assert_eq!(parse_location_from_error("no location here"), (0, 0));
    }

    #[test]
    fn test_parse_error_has_code_and_location() {
        let err = DuckDbDialect::new().parse("SELECT *\nFROM WHERE").unwrap_err();
        assert!(err.to_string().starts_with("[S001]"));
        assert!(matches!(err, SqlError::ParseError { line: 2, .. }), "{}", err);
    }
}
