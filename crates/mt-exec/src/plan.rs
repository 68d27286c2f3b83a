//! Plan IR: relational operators and the expressions they evaluate

use crate::system::SystemTable;
use mt_core::{ModelVersion, ProjectName, ScalarType, Value};
use mt_db::DataSource;
use std::fmt;
use std::sync::Arc;

/// A FROM-clause identifier split into namespace, name and version pin.
///
/// `ns.name.3` pins predictor `name` to version 3; the namespace is either a
/// data source or a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRef {
    pub namespace: Option<String>,
    pub name: String,
    pub version: Option<u32>,
}

impl RelationRef {
    /// Build from identifier parts. A trailing all-digit part is a version pin.
    pub fn from_parts(parts: &[String]) -> Option<Self> {
        let (version, rest) = match parts.split_last() {
            Some((last, rest))
                if !rest.is_empty() && !last.is_empty() && last.chars().all(|c| c.is_ascii_digit()) =>
            {
                (last.parse::<u32>().ok(), rest)
            }
            _ => (None, parts),
        };
        match rest {
            [] => None,
            [name] => Some(Self {
                namespace: None,
                name: name.clone(),
                version,
            }),
            [ns, tail @ ..] => Some(Self {
                namespace: Some(ns.clone()),
                name: tail.join("."),
                version,
            }),
        }
    }

    /// Parse a dotted identifier such as `proj.task_model.3`
    pub fn parse(text: &str) -> Option<Self> {
        let parts: Vec<String> = text
            .split('.')
            .map(|p| p.trim().trim_matches('"').to_string())
            .collect();
        if parts.iter().any(String::is_empty) {
            return None;
        }
        Self::from_parts(&parts)
    }
}

impl fmt::Display for RelationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ns) = &self.namespace {
            write!(f, "{}.", ns)?;
        }
        f.write_str(&self.name)?;
        if let Some(v) = self.version {
            write!(f, ".{}", v)?;
        }
        Ok(())
    }
}

/// What a scan reads once bound
#[derive(Clone)]
pub enum ScanSource {
    /// A relation of an external data source
    Table {
        source: Arc<dyn DataSource>,
        relation: String,
    },
    /// A model version, fed by the rows joined to it
    Predictor { version: ModelVersion },
    /// A project system table; `None` spans every project
    System {
        table: SystemTable,
        project: Option<ProjectName>,
    },
}

impl fmt::Debug for ScanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanSource::Table { source, relation } => {
                write!(f, "Table({}.{})", source.name(), relation)
            }
            ScanSource::Predictor { version } => {
                write!(f, "Predictor({}.{})", version.model, version.version)
            }
            ScanSource::System { table, project } => match project {
                Some(p) => write!(f, "System({}.{})", p, table.name()),
                None => write!(f, "System(information_schema.{})", table.name()),
            },
        }
    }
}

/// Leaf scan of a named relation
#[derive(Debug, Clone)]
pub struct Scan {
    pub relation: RelationRef,
    pub alias: Option<String>,
    /// Filled in by the resolver
    pub source: Option<ScanSource>,
}

impl Scan {
    /// Qualifier given to this scan's columns
    pub fn qualifier(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.relation.name)
    }

    pub fn is_predictor(&self) -> bool {
        matches!(self.source, Some(ScanSource::Predictor { .. }))
    }
}

/// Join type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    /// Inner join (also CROSS JOIN and comma joins, without condition)
    Inner,
    /// Left outer join
    Left,
}

/// Aggregate function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunc {
    Min,
    Max,
    Sum,
    Count,
    Avg,
}

impl AggregateFunc {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "MIN" => Some(AggregateFunc::Min),
            "MAX" => Some(AggregateFunc::Max),
            "SUM" => Some(AggregateFunc::Sum),
            "COUNT" => Some(AggregateFunc::Count),
            "AVG" => Some(AggregateFunc::Avg),
            _ => None,
        }
    }
}

/// One aggregate computed per group
#[derive(Debug, Clone)]
pub struct AggregateCall {
    pub func: AggregateFunc,
    /// `None` for `COUNT(*)`
    pub arg: Option<Expr>,
    pub distinct: bool,
}

/// Name of the synthetic column holding aggregate `idx` of a group
pub fn aggregate_column(idx: usize) -> String {
    format!("#agg{}", idx)
}

/// ORDER BY key
#[derive(Debug, Clone)]
pub struct SortKey {
    pub expr: Expr,
    pub ascending: bool,
    pub nulls_first: bool,
}

/// SELECT list entry
#[derive(Debug, Clone)]
pub enum ProjectItem {
    /// `*` or `alias.*`
    Wildcard { qualifier: Option<String> },
    /// An expression with its output name
    Expr { expr: Expr, alias: Option<String> },
}

/// Relational operator
#[derive(Debug, Clone)]
pub enum Plan {
    /// Single row without columns (SELECT without FROM)
    Dual,
    Scan(Scan),
    /// Aliased sub-plan: derived tables and inlined views
    Derived {
        input: Box<Plan>,
        alias: Option<String>,
    },
    Join {
        left: Box<Plan>,
        right: Box<Plan>,
        kind: JoinKind,
        condition: Option<Expr>,
    },
    Filter {
        input: Box<Plan>,
        predicate: Expr,
    },
    Project {
        input: Box<Plan>,
        items: Vec<ProjectItem>,
    },
    /// Output: each group's first input row followed by one column per
    /// aggregate (see [`aggregate_column`]), filtered by `having`
    Aggregate {
        input: Box<Plan>,
        group_by: Vec<Expr>,
        aggregates: Vec<AggregateCall>,
        having: Option<Expr>,
    },
    Distinct {
        input: Box<Plan>,
    },
    /// `all = false` is plain UNION
    Union {
        inputs: Vec<Plan>,
        all: bool,
    },
    Sort {
        input: Box<Plan>,
        keys: Vec<SortKey>,
    },
    Limit {
        input: Box<Plan>,
        limit: Option<usize>,
        offset: usize,
    },
}

impl Plan {
    /// Direct children of this node
    pub fn inputs_mut(&mut self) -> Vec<&mut Plan> {
        match self {
            Plan::Dual | Plan::Scan(_) => vec![],
            Plan::Derived { input, .. }
            | Plan::Distinct { input }
            | Plan::Filter { input, .. }
            | Plan::Project { input, .. }
            | Plan::Aggregate { input, .. }
            | Plan::Sort { input, .. }
            | Plan::Limit { input, .. } => vec![input.as_mut()],
            Plan::Join { left, right, .. } => vec![left.as_mut(), right.as_mut()],
            Plan::Union { inputs, .. } => inputs.iter_mut().collect(),
        }
    }

    /// Expressions owned by this node, children excluded
    pub fn exprs_mut(&mut self) -> Vec<&mut Expr> {
        match self {
            Plan::Dual
            | Plan::Scan(_)
            | Plan::Derived { .. }
            | Plan::Distinct { .. }
            | Plan::Union { .. }
            | Plan::Limit { .. } => vec![],
            Plan::Join { condition, .. } => condition.iter_mut().collect(),
            Plan::Filter { predicate, .. } => vec![predicate],
            Plan::Project { items, .. } => items
                .iter_mut()
                .filter_map(|item| match item {
                    ProjectItem::Expr { expr, .. } => Some(expr),
                    ProjectItem::Wildcard { .. } => None,
                })
                .collect(),
            Plan::Aggregate {
                group_by,
                aggregates,
                having,
                ..
            } => {
                let mut out: Vec<&mut Expr> = group_by.iter_mut().collect();
                out.extend(aggregates.iter_mut().filter_map(|a| a.arg.as_mut()));
                out.extend(having.iter_mut());
                out
            }
            Plan::Sort { keys, .. } => keys.iter_mut().map(|k| &mut k.expr).collect(),
        }
    }
}

/// Binary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
    Modulo,
    Concat,
}

/// Unary operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

/// Scalar function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarFunc {
    Coalesce,
    Upper,
    Lower,
    Abs,
    Length,
    Round,
}

impl ScalarFunc {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "COALESCE" => Some(ScalarFunc::Coalesce),
            "UPPER" => Some(ScalarFunc::Upper),
            "LOWER" => Some(ScalarFunc::Lower),
            "ABS" => Some(ScalarFunc::Abs),
            "LENGTH" | "LEN" => Some(ScalarFunc::Length),
            "ROUND" => Some(ScalarFunc::Round),
            _ => None,
        }
    }
}

/// Column reference, optionally qualified by a relation alias
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub name: String,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{}", q, self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Scalar expression
#[derive(Debug, Clone)]
pub enum Expr {
    Column(ColumnRef),
    Literal(Value),
    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    /// `expr IN (SELECT ...)`
    InSubquery {
        expr: Box<Expr>,
        subquery: Box<Plan>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
        case_insensitive: bool,
    },
    /// Searched CASE; a simple CASE is lowered to equality conditions
    Case {
        branches: Vec<(Expr, Expr)>,
        else_result: Option<Box<Expr>>,
    },
    Cast {
        expr: Box<Expr>,
        to: ScalarType,
    },
    Function {
        func: ScalarFunc,
        args: Vec<Expr>,
    },
    /// Uncorrelated scalar subquery, replaced by its value before the
    /// enclosing operator runs
    Subquery(Box<Plan>),
    /// 1-based output column; only produced for ORDER BY over a UNION
    Position(usize),
}

impl Expr {
    pub fn column(qualifier: Option<&str>, name: &str) -> Self {
        Expr::Column(ColumnRef {
            qualifier: qualifier.map(str::to_string),
            name: name.to_string(),
        })
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expr::Literal(value.into())
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    /// Pre-order traversal
    pub fn walk<'a>(&'a self, f: &mut dyn FnMut(&'a Expr)) {
        f(self);
        match self {
            Expr::Column(_) | Expr::Literal(_) | Expr::Subquery(_) | Expr::Position(_) => {}
            Expr::Binary { left, right, .. } => {
                left.walk(f);
                right.walk(f);
            }
            Expr::Unary { expr, .. }
            | Expr::IsNull { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::InSubquery { expr, .. } => expr.walk(f),
            Expr::InList { expr, list, .. } => {
                expr.walk(f);
                list.iter().for_each(|e| e.walk(f));
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.walk(f);
                low.walk(f);
                high.walk(f);
            }
            Expr::Like { expr, pattern, .. } => {
                expr.walk(f);
                pattern.walk(f);
            }
            Expr::Case {
                branches,
                else_result,
            } => {
                for (cond, result) in branches {
                    cond.walk(f);
                    result.walk(f);
                }
                if let Some(e) = else_result {
                    e.walk(f);
                }
            }
            Expr::Function { args, .. } => args.iter().for_each(|e| e.walk(f)),
        }
    }

    /// Whether any subquery appears in this expression
    pub fn has_subquery(&self) -> bool {
        let mut found = false;
        self.walk(&mut |e| {
            if matches!(e, Expr::Subquery(_) | Expr::InSubquery { .. }) {
                found = true;
            }
        });
        found
    }

    /// Pre-order traversal with mutable access
    pub fn walk_mut(&mut self, f: &mut dyn FnMut(&mut Expr)) {
        f(self);
        match self {
            Expr::Column(_) | Expr::Literal(_) | Expr::Subquery(_) | Expr::Position(_) => {}
            Expr::Binary { left, right, .. } => {
                left.walk_mut(f);
                right.walk_mut(f);
            }
            Expr::Unary { expr, .. }
            | Expr::IsNull { expr, .. }
            | Expr::Cast { expr, .. }
            | Expr::InSubquery { expr, .. } => expr.walk_mut(f),
            Expr::InList { expr, list, .. } => {
                expr.walk_mut(f);
                list.iter_mut().for_each(|e| e.walk_mut(f));
            }
            Expr::Between {
                expr, low, high, ..
            } => {
                expr.walk_mut(f);
                low.walk_mut(f);
                high.walk_mut(f);
            }
            Expr::Like { expr, pattern, .. } => {
                expr.walk_mut(f);
                pattern.walk_mut(f);
            }
            Expr::Case {
                branches,
                else_result,
            } => {
                for (cond, result) in branches {
                    cond.walk_mut(f);
                    result.walk_mut(f);
                }
                if let Some(e) = else_result {
                    e.walk_mut(f);
                }
            }
            Expr::Function { args, .. } => args.iter_mut().for_each(|e| e.walk_mut(f)),
        }
    }

    /// Split a predicate on top-level ANDs
    pub fn conjuncts(&self) -> Vec<&Expr> {
        match self {
            Expr::Binary {
                left,
                op: BinaryOp::And,
                right,
            } => {
                let mut out = left.conjuncts();
                out.extend(right.conjuncts());
                out
            }
            other => vec![other],
        }
    }

    /// Output name of an unaliased SELECT item
    pub fn default_name(&self) -> String {
        match self {
            Expr::Column(c) => c.name.clone(),
            Expr::Literal(v) => v.to_string(),
            Expr::Function { func, .. } => format!("{:?}", func).to_ascii_lowercase(),
            _ => "?column?".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(s: &[&str]) -> Vec<String> {
        s.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn test_relation_ref_parts() {
        let r = RelationRef::from_parts(&parts(&["task_model"])).unwrap();
        assert_eq!((r.namespace, r.name.as_str(), r.version), (None, "task_model", None));

        let r = RelationRef::from_parts(&parts(&["task_model", "3"])).unwrap();
        assert_eq!(r.version, Some(3));
        assert_eq!(r.namespace, None);

        let r = RelationRef::from_parts(&parts(&["proj", "task_model", "3"])).unwrap();
        assert_eq!(r.namespace.as_deref(), Some("proj"));
        assert_eq!(r.name, "task_model");
        assert_eq!(r.version, Some(3));

        let r = RelationRef::from_parts(&parts(&["warehouse", "analytics", "orders"])).unwrap();
        assert_eq!(r.name, "analytics.orders");
        assert_eq!(r.version, None);
    }

    #[test]
    fn test_relation_ref_parse_and_display() {
        let r = RelationRef::parse("proj.task_model.2").unwrap();
        assert_eq!(r.to_string(), "proj.task_model.2");
        assert!(RelationRef::parse("proj..x").is_none());
        // A lone number is a name, not a pin
        assert_eq!(RelationRef::parse("3").unwrap().version, None);
    }

    #[test]
    fn test_conjuncts() {
        let e = Expr::binary(
            Expr::binary(Expr::column(None, "a"), BinaryOp::Eq, Expr::literal(1)),
            BinaryOp::And,
            Expr::binary(Expr::column(None, "b"), BinaryOp::Eq, Expr::literal(2)),
        );
        assert_eq!(e.conjuncts().len(), 2);
    }

    #[test]
    fn test_has_subquery() {
        let plain = Expr::binary(Expr::column(Some("t"), "a"), BinaryOp::Gt, Expr::literal(1));
        assert!(!plain.has_subquery());

        let nested = Expr::InList {
            expr: Box::new(Expr::Subquery(Box::new(Plan::Dual))),
            list: vec![Expr::literal(1)],
            negated: false,
        };
        assert!(nested.has_subquery());
    }

    #[test]
    fn test_exprs_mut_collects_node_expressions() {
        let mut plan = Plan::Aggregate {
            input: Box::new(Plan::Dual),
            group_by: vec![Expr::column(None, "a")],
            aggregates: vec![
                AggregateCall {
                    func: AggregateFunc::Count,
                    arg: None,
                    distinct: false,
                },
                AggregateCall {
                    func: AggregateFunc::Max,
                    arg: Some(Expr::column(None, "b")),
                    distinct: false,
                },
            ],
            having: Some(Expr::literal(true)),
        };
        assert_eq!(plan.exprs_mut().len(), 3);
        assert_eq!(plan.inputs_mut().len(), 1);
    }
}
