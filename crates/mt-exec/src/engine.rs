//! QueryEngine: parse, lower, bind and execute SQL against one deployment

use crate::error::{ExecError, ExecResult};
use crate::executor::Executor;
use crate::lowering::lower_statement;
use crate::plan::{Plan, RelationRef, Scan};
use crate::resolver::{Resolved, Resolver};
use async_trait::async_trait;
use mt_core::config::{ExecutionConfig, TrainingConfig};
use mt_core::{Clock, ProjectName, RowBatch, ScalarType, ViewName};
use mt_db::DataSource;
use mt_meta::{MetaError, MetaStore, ViewRecord};
use mt_models::{
    EngineRegistry, ModelError, ModelResult, ModelVersionManager, PredictorAdapter,
    TrainingDataLoader,
};
use mt_sql::SqlParser;
use sqlparser::ast::Statement;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Entry point for running queries.
///
/// Owns the model manager and the registered data sources. Call
/// [`into_shared`](Self::into_shared) once configured so that training
/// queries can be routed back through the engine.
pub struct QueryEngine {
    store: Arc<dyn MetaStore>,
    models: Arc<ModelVersionManager>,
    predictor: PredictorAdapter,
    sources: BTreeMap<String, Arc<dyn DataSource>>,
    parser: SqlParser,
    clock: Arc<dyn Clock>,
    settings: ExecutionConfig,
}

impl QueryEngine {
    pub fn new(
        store: Arc<dyn MetaStore>,
        engines: Arc<EngineRegistry>,
        clock: Arc<dyn Clock>,
        settings: ExecutionConfig,
        training: TrainingConfig,
    ) -> Self {
        let models = Arc::new(ModelVersionManager::new(
            Arc::clone(&store),
            Arc::clone(&engines),
            Arc::clone(&clock),
            training,
        ));
        let predictor = PredictorAdapter::new(engines, settings.predict_timeout());
        Self {
            store,
            models,
            predictor,
            sources: BTreeMap::new(),
            parser: SqlParser::duckdb(),
            clock,
            settings,
        }
    }

    /// Register a data source under its own name
    pub fn register_source(&mut self, source: Arc<dyn DataSource>) {
        log::debug!(
            "Registered {} source '{}'",
            source.source_type(),
            source.name()
        );
        self.sources
            .insert(source.name().to_ascii_lowercase(), source);
    }

    pub fn with_source(mut self, source: Arc<dyn DataSource>) -> Self {
        self.register_source(source);
        self
    }

    /// Freeze the engine and install it as the model manager's training
    /// data loader
    pub fn into_shared(self) -> Arc<Self> {
        let engine = Arc::new(self);
        let loader: Arc<dyn TrainingDataLoader> = engine.clone();
        engine.models.set_training_loader(Arc::downgrade(&loader));
        engine
    }

    pub fn models(&self) -> &Arc<ModelVersionManager> {
        &self.models
    }

    pub fn store(&self) -> &Arc<dyn MetaStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.values().map(|s| s.name()).collect()
    }

    fn resolver(&self, project: &ProjectName) -> Resolver<'_> {
        Resolver::new(
            self.store.as_ref(),
            &self.models,
            &self.sources,
            &self.parser,
            project.clone(),
        )
    }

    fn executor(&self) -> Executor<'_> {
        Executor::new(self.store.as_ref(), &self.predictor, &self.settings)
    }

    /// Run every `;`-separated statement in order and return the last result
    pub async fn execute_sql(&self, project: &ProjectName, sql: &str) -> ExecResult<RowBatch> {
        let statements = self.parser.parse(sql)?;
        let mut last = RowBatch::default();
        for statement in &statements {
            last = self.execute_statement(project, statement).await?;
        }
        Ok(last)
    }

    async fn execute_statement(
        &self,
        project: &ProjectName,
        statement: &Statement,
    ) -> ExecResult<RowBatch> {
        let mut plan = lower_statement(statement)?;
        self.resolver(project).bind(&mut plan)?;
        let batch = self.executor().execute(&plan).await?;
        log::debug!("Query returned {} rows", batch.len());
        Ok(batch)
    }

    /// Lowered and bound plan of a single statement
    pub fn plan_sql(&self, project: &ProjectName, sql: &str) -> ExecResult<Plan> {
        let statement = self.parser.parse_single(sql)?;
        let mut plan = lower_statement(&statement)?;
        self.resolver(project).bind(&mut plan)?;
        Ok(plan)
    }

    /// Column names and types of any relation an identifier can denote
    pub async fn describe_relation(
        &self,
        project: &ProjectName,
        name: &str,
    ) -> ExecResult<Vec<(String, ScalarType)>> {
        let relation = RelationRef::parse(name)
            .ok_or_else(|| ExecError::RelationNotFound(name.to_string()))?;
        let resolver = self.resolver(project);
        match resolver.resolve(&relation)? {
            Resolved::Table { source, relation } => Ok(source.describe(&relation).await?),
            Resolved::Predictor(version) => Ok(self.predictor.output_columns(&version)?),
            Resolved::System { table, project } => Ok(table
                .scan(self.store.as_ref(), project.as_ref())?
                .infer_types()),
            Resolved::View(_) => {
                let mut plan = Plan::Scan(Scan {
                    relation,
                    alias: None,
                    source: None,
                });
                resolver.bind(&mut plan)?;
                Ok(self.executor().execute(&plan).await?.infer_types())
            }
        }
    }

    /// Store a view after checking that its query is executable SQL
    pub fn create_view(&self, project: &ProjectName, name: &str, query: &str) -> ExecResult<()> {
        let name = ViewName::try_new(name)?;
        let statement = self.parser.parse_single(query)?;
        lower_statement(&statement)?;

        let view = ViewRecord {
            project: project.clone(),
            name: name.clone(),
            query: query.trim().to_string(),
            created_at: self.clock.now(),
        };
        match self.store.create_view(&view) {
            Ok(()) => {
                log::info!("Created view {}.{}", project, name);
                Ok(())
            }
            Err(MetaError::AlreadyExists { .. }) => {
                Err(ExecError::ViewExists(format!("{}.{}", project, name)))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn drop_view(&self, project: &ProjectName, name: &str) -> ExecResult<()> {
        if !self.store.drop_view(project, name)? {
            return Err(ExecError::ViewNotFound(format!("{}.{}", project, name)));
        }
        log::info!("Dropped view {}.{}", project, name);
        Ok(())
    }
}

#[async_trait]
impl TrainingDataLoader for QueryEngine {
    async fn load(&self, project: &ProjectName, query: &str) -> ModelResult<RowBatch> {
        self.execute_sql(project, query)
            .await
            .map_err(|e| ModelError::TrainingData(e.to_string()))
    }
}
