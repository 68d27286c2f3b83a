use super::*;

#[test]
fn test_parse_select() {
    let parser = SqlParser::duckdb();
    let stmts = parser
        .parse("SELECT id, name FROM users WHERE id = 1")
        .unwrap();
    assert_eq!(stmts.len(), 1);
}

#[test]
fn test_parse_multiple_statements() {
    let parser = SqlParser::duckdb();
    let stmts = parser.parse("SELECT 1; SELECT 2;").unwrap();
    assert_eq!(stmts.len(), 2);
}

#[test]
fn test_parse_empty() {
    let parser = SqlParser::duckdb();
    assert!(matches!(parser.parse(""), Err(SqlError::EmptySql)));
    assert!(matches!(parser.parse("   \n"), Err(SqlError::EmptySql)));
}

#[test]
fn test_parse_error() {
    let parser = SqlParser::duckdb();
    assert!(matches!(
        parser.parse("SELECT FROM WHERE"),
        Err(SqlError::ParseError { .. })
    ));
}

#[test]
fn test_version_pin_quoted() {
    assert_eq!(
        normalize_version_pins("select * from proj.task_model.3 as m"),
        "select * from proj.task_model.\"3\" as m"
    );
    assert_eq!(
        normalize_version_pins("select * from task_model.12"),
        "select * from task_model.\"12\""
    );
}

#[test]
fn test_version_pin_leaves_numbers_and_literals() {
    for sql in [
        "select 1.5, t.a from t",
        "select 'model.3' from t",
        "select \"weird.3\" from t",
        "select 2.0 * x.y from x -- model.3",
        "select * from t where t.a3 = 1",
    ] {
        assert!(
            matches!(normalize_version_pins(sql), Cow::Borrowed(_)),
            "{sql} should be untouched"
        );
    }
}

#[test]
fn test_parse_pinned_model() {
    let parser = SqlParser::duckdb();
    let stmt = parser
        .parse_single("SELECT m.predicted FROM proj.task_model.3 AS m")
        .unwrap();
    let text = stmt.to_string();
    assert!(text.contains("proj.task_model.\"3\""), "{text}");
}
