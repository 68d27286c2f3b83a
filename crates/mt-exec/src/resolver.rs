//! Relation resolution: binds FROM-clause identifiers to tables, views,
//! predictors and system tables

use crate::error::{ExecError, ExecResult};
use crate::lowering::lower_statement;
use crate::plan::{Expr, Plan, RelationRef, ScanSource};
use crate::system::{SystemTable, INFORMATION_SCHEMA};
use mt_core::{ModelId, ModelName, ModelVersion, ProjectName};
use mt_db::DataSource;
use mt_meta::{MetaStore, ViewRecord};
use mt_models::ModelVersionManager;
use mt_sql::SqlParser;
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a relation identifier denotes
#[derive(Clone)]
pub enum Resolved {
    /// A relation of an external data source, checked when fetched
    Table {
        source: Arc<dyn DataSource>,
        relation: String,
    },
    /// A stored query, expanded on every use
    View(ViewRecord),
    /// A model, at its pinned version or else its active one
    Predictor(ModelVersion),
    /// A metadata table of one project, or of all of them
    System {
        table: SystemTable,
        project: Option<ProjectName>,
    },
}

/// Binds the relations of a lowered plan for one statement.
///
/// Resolution happens once per FROM-clause occurrence, so a statement sees
/// one version per predictor reference even if a retrain completes while it
/// runs.
pub struct Resolver<'a> {
    store: &'a dyn MetaStore,
    models: &'a ModelVersionManager,
    sources: &'a BTreeMap<String, Arc<dyn DataSource>>,
    parser: &'a SqlParser,
    project: ProjectName,
}

impl<'a> Resolver<'a> {
    pub fn new(
        store: &'a dyn MetaStore,
        models: &'a ModelVersionManager,
        sources: &'a BTreeMap<String, Arc<dyn DataSource>>,
        parser: &'a SqlParser,
        project: ProjectName,
    ) -> Self {
        Self {
            store,
            models,
            sources,
            parser,
            project,
        }
    }

    /// Classify an identifier relative to the session project
    pub fn resolve(&self, relation: &RelationRef) -> ExecResult<Resolved> {
        self.resolve_in(relation, &self.project)
    }

    fn resolve_in(&self, relation: &RelationRef, project: &ProjectName) -> ExecResult<Resolved> {
        if let Some(ns) = &relation.namespace {
            if let Some(source) = self.sources.get(&ns.to_ascii_lowercase()) {
                if relation.version.is_some() {
                    return Err(ExecError::Unsupported(format!(
                        "version pin on table '{}'",
                        relation
                    )));
                }
                return Ok(Resolved::Table {
                    source: Arc::clone(source),
                    relation: relation.name.clone(),
                });
            }
            if ns.eq_ignore_ascii_case(INFORMATION_SCHEMA) {
                return match SystemTable::from_name(&relation.name) {
                    Some(table) if relation.version.is_none() => Ok(Resolved::System {
                        table,
                        project: None,
                    }),
                    _ => Err(ExecError::RelationNotFound(relation.to_string())),
                };
            }
        }

        let project = match &relation.namespace {
            Some(ns) => ProjectName::try_new(ns.as_str())?,
            None => project.clone(),
        };

        if relation.version.is_none() {
            if let Some(view) = self.store.get_view(&project, &relation.name)? {
                return Ok(Resolved::View(view));
            }
        }

        if let Ok(name) = ModelName::try_new(relation.name.as_str()) {
            let id = ModelId::new(project.clone(), name);
            if self.models.get_model(&id)?.is_some() {
                let version = self.models.resolve_version(&id, relation.version)?;
                return Ok(Resolved::Predictor(version));
            }
        }

        if relation.version.is_none() {
            if let Some(table) = SystemTable::from_name(&relation.name) {
                return Ok(Resolved::System {
                    table,
                    project: Some(project),
                });
            }
        }

        Err(ExecError::RelationNotFound(relation.to_string()))
    }

    /// Bind every scan of `plan`, including those inside subqueries.
    /// Views are parsed, lowered and inlined as derived tables.
    pub fn bind(&self, plan: &mut Plan) -> ExecResult<()> {
        let project = self.project.clone();
        self.bind_plan(plan, &project, &mut Vec::new())
    }

    fn bind_plan(
        &self,
        plan: &mut Plan,
        project: &ProjectName,
        views: &mut Vec<String>,
    ) -> ExecResult<()> {
        for expr in plan.exprs_mut() {
            self.bind_subqueries(expr, project, views)?;
        }

        if let Plan::Scan(scan) = plan {
            let alias = scan.qualifier().to_string();
            match self.resolve_in(&scan.relation, project)? {
                Resolved::Table { source, relation } => {
                    scan.source = Some(ScanSource::Table { source, relation })
                }
                Resolved::Predictor(version) => {
                    scan.source = Some(ScanSource::Predictor { version })
                }
                Resolved::System { table, project } => {
                    scan.source = Some(ScanSource::System { table, project })
                }
                Resolved::View(view) => {
                    let inlined = self.expand_view(&view, views)?;
                    *plan = Plan::Derived {
                        input: Box::new(inlined),
                        alias: Some(alias),
                    };
                }
            }
            return Ok(());
        }

        for child in plan.inputs_mut() {
            self.bind_plan(child, project, views)?;
        }
        Ok(())
    }

    fn bind_subqueries(
        &self,
        expr: &mut Expr,
        project: &ProjectName,
        views: &mut Vec<String>,
    ) -> ExecResult<()> {
        let mut result = Ok(());
        expr.walk_mut(&mut |e| {
            if result.is_err() {
                return;
            }
            if let Expr::Subquery(plan) | Expr::InSubquery { subquery: plan, .. } = e {
                result = self.bind_plan(plan, project, views);
            }
        });
        result
    }

    /// Lower a view body, binding it relative to the view's own project.
    /// `views` holds the chain of views being expanded.
    fn expand_view(&self, view: &ViewRecord, views: &mut Vec<String>) -> ExecResult<Plan> {
        let key = format!("{}.{}", view.project, view.name).to_ascii_lowercase();
        if views.contains(&key) {
            let mut chain = views.clone();
            chain.push(key);
            return Err(ExecError::CyclicView(chain.join(" -> ")));
        }

        let statement = self.parser.parse_single(&view.query)?;
        let mut plan = lower_statement(&statement)?;
        views.push(key);
        let bound = self.bind_plan(&mut plan, &view.project, views);
        views.pop();
        bound?;
        log::debug!("Expanded view {}.{}", view.project, view.name);
        Ok(plan)
    }
}
