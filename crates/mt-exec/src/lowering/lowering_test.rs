use super::*;
use crate::plan::{AggregateFunc, Expr, JoinKind, ProjectItem};
use mt_sql::SqlParser;

fn lower(sql: &str) -> Plan {
    let stmt = SqlParser::duckdb().parse_single(sql).expect("SQL parse failed");
    lower_statement(&stmt).expect("Lowering failed")
}

fn lower_err(sql: &str) -> ExecError {
    let stmt = SqlParser::duckdb().parse_single(sql).expect("SQL parse failed");
    lower_statement(&stmt).unwrap_err()
}

#[test]
fn test_lower_simple_select() {
    let plan = lower("SELECT a, b AS bee FROM files.tasks");
    let Plan::Project { input, items } = &plan else {
        panic!("Expected Project, got: {:?}", plan);
    };
    assert_eq!(items.len(), 2);
    assert!(matches!(&items[0], ProjectItem::Expr { alias: None, .. }));
    assert!(matches!(&items[1], ProjectItem::Expr { alias: Some(a), .. } if a == "bee"));
    let Plan::Scan(scan) = input.as_ref() else {
        panic!("Expected Scan");
    };
    assert_eq!(scan.relation.namespace.as_deref(), Some("files"));
    assert_eq!(scan.relation.name, "tasks");
    assert_eq!(scan.qualifier(), "tasks");
}

#[test]
fn test_lower_qualified_wildcards() {
    let plan = lower("SELECT t.*, m.a, files.t2.* FROM files.t1 AS t JOIN files.t2");
    let Plan::Project { items, .. } = &plan else {
        panic!("Expected Project, got: {:?}", plan);
    };
    assert!(matches!(&items[0], ProjectItem::Wildcard { qualifier: Some(q) } if q == "t"));
    assert!(matches!(&items[1], ProjectItem::Expr { .. }));
    assert!(matches!(&items[2], ProjectItem::Wildcard { qualifier: Some(q) } if q == "t2"));
}

#[test]
fn test_lower_version_pin() {
    let plan = lower("SELECT * FROM proj.task_model.3 AS m");
    let Plan::Project { input, .. } = &plan else {
        panic!("Expected Project");
    };
    let Plan::Scan(scan) = input.as_ref() else {
        panic!("Expected Scan");
    };
    assert_eq!(scan.relation.namespace.as_deref(), Some("proj"));
    assert_eq!(scan.relation.name, "task_model");
    assert_eq!(scan.relation.version, Some(3));
    assert_eq!(scan.qualifier(), "m");
}

#[test]
fn test_lower_joins() {
    let plan = lower(
        "SELECT * FROM files.t1 AS a \
         JOIN files.t2 AS b ON a.c = b.c \
         LEFT JOIN files.t1 AS x ON b.a = x.a",
    );
    let Plan::Project { input, .. } = &plan else {
        panic!("Expected Project");
    };
    let Plan::Join {
        left, kind, condition, ..
    } = input.as_ref()
    else {
        panic!("Expected Join");
    };
    assert_eq!(*kind, JoinKind::Left);
    assert!(condition.is_some());
    assert!(matches!(
        left.as_ref(),
        Plan::Join {
            kind: JoinKind::Inner,
            ..
        }
    ));
}

#[test]
fn test_lower_comma_and_cross_join() {
    for sql in [
        "SELECT * FROM files.t1, files.t2",
        "SELECT * FROM files.t1 CROSS JOIN files.t2",
    ] {
        let plan = lower(sql);
        let Plan::Project { input, .. } = &plan else {
            panic!("Expected Project");
        };
        assert!(
            matches!(
                input.as_ref(),
                Plan::Join {
                    kind: JoinKind::Inner,
                    condition: None,
                    ..
                }
            ),
            "{}",
            sql
        );
    }
}

#[test]
fn test_lower_using() {
    let plan = lower("SELECT * FROM files.t1 AS a JOIN files.t2 AS b USING (c)");
    let Plan::Project { input, .. } = &plan else {
        panic!("Expected Project");
    };
    let Plan::Join {
        condition: Some(Expr::Binary { left, .. }),
        ..
    } = input.as_ref()
    else {
        panic!("Expected Join with condition");
    };
    assert!(matches!(left.as_ref(), Expr::Column(c) if c.qualifier.as_deref() == Some("a")));
}

#[test]
fn test_lower_aggregate_order() {
    let plan = lower(
        "SELECT c, MAX(a) AS top FROM files.t1 \
         WHERE a > 0 GROUP BY c HAVING COUNT(*) > 1 ORDER BY top DESC",
    );
    // Project(Sort(Aggregate(Filter(Scan))))
    let Plan::Project { input, .. } = &plan else {
        panic!("Expected Project");
    };
    let Plan::Sort { input, keys } = input.as_ref() else {
        panic!("Expected Sort");
    };
    assert!(!keys[0].ascending);
    assert!(matches!(&keys[0].expr, Expr::Column(c) if c.name == "#agg0"));
    let Plan::Aggregate {
        input,
        group_by,
        aggregates,
        having,
    } = input.as_ref()
    else {
        panic!("Expected Aggregate");
    };
    assert_eq!(group_by.len(), 1);
    assert_eq!(aggregates.len(), 2);
    assert_eq!(aggregates[1].func, AggregateFunc::Count);
    assert!(having.is_some());
    assert!(matches!(input.as_ref(), Plan::Filter { .. }));
}

#[test]
fn test_lower_global_aggregate_without_group_by() {
    let plan = lower("SELECT COUNT(*) FROM files.t1");
    let Plan::Project { input, items } = &plan else {
        panic!("Expected Project");
    };
    assert!(matches!(&items[0], ProjectItem::Expr { alias: Some(a), .. } if a == "count"));
    assert!(matches!(
        input.as_ref(),
        Plan::Aggregate { group_by, .. } if group_by.is_empty()
    ));
}

#[test]
fn test_lower_union_flattens() {
    let plan = lower("SELECT 1 AS x UNION ALL SELECT 2 UNION ALL SELECT 3");
    let Plan::Union { inputs, all } = &plan else {
        panic!("Expected Union, got {:?}", plan);
    };
    assert!(*all);
    assert_eq!(inputs.len(), 3);

    let plan = lower("SELECT 1 UNION SELECT 2");
    assert!(matches!(plan, Plan::Union { all: false, .. }));
}

#[test]
fn test_lower_union_order_by_position() {
    let plan = lower("SELECT a FROM files.t1 UNION ALL SELECT a FROM files.t2 ORDER BY 1 LIMIT 2");
    let Plan::Limit {
        input,
        limit,
        offset,
    } = &plan
    else {
        panic!("Expected Limit");
    };
    assert_eq!((*limit, *offset), (Some(2), 0));
    let Plan::Sort { input, keys } = input.as_ref() else {
        panic!("Expected Sort");
    };
    assert!(matches!(keys[0].expr, Expr::Position(1)));
    assert!(matches!(input.as_ref(), Plan::Union { .. }));
}

#[test]
fn test_lower_limit_offset() {
    let plan = lower("SELECT * FROM files.t1 LIMIT 10 OFFSET 5");
    assert!(matches!(
        plan,
        Plan::Limit {
            limit: Some(10),
            offset: 5,
            ..
        }
    ));
}

#[test]
fn test_lower_distinct_and_derived() {
    let plan = lower("SELECT DISTINCT s.a FROM (SELECT a FROM files.t1) AS s");
    let Plan::Distinct { input } = &plan else {
        panic!("Expected Distinct");
    };
    let Plan::Project { input, .. } = input.as_ref() else {
        panic!("Expected Project");
    };
    assert!(matches!(input.as_ref(), Plan::Derived { alias: Some(a), .. } if a == "s"));
}

#[test]
fn test_lower_select_without_from() {
    let plan = lower("SELECT 1 + 1 AS two");
    let Plan::Project { input, .. } = &plan else {
        panic!("Expected Project");
    };
    assert!(matches!(input.as_ref(), Plan::Dual));
}

#[test]
fn test_lower_non_select_fails() {
    let err = lower_err("INSERT INTO t VALUES (1)");
    assert!(err.to_string().contains("INSERT"));
}

#[test]
fn test_lower_aggregate_in_where_fails() {
    let err = lower_err("SELECT a FROM files.t1 WHERE MAX(a) > 1");
    assert!(matches!(err, ExecError::Unsupported(_)));
}

#[test]
fn test_lower_with_clause_unsupported() {
    let err = lower_err("WITH x AS (SELECT 1) SELECT * FROM x");
    assert!(err.to_string().contains("WITH"));
}
