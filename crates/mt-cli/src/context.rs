//! Runtime context for CLI commands

use anyhow::{Context, Result};
use mt_core::config::SourceType;
use mt_core::{Clock, Config, ProjectName, SystemClock};
use mt_db::{DataSource, DuckDbSource, FileSource};
use mt_exec::QueryEngine;
use mt_jobs::{JobService, Scheduler};
use mt_meta::{MetaDb, MetaStore};
use mt_models::EngineRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::GlobalArgs;

/// Loaded configuration plus the services built from it
pub struct RuntimeContext {
    pub config: Config,
    pub store: Arc<dyn MetaStore>,
    pub clock: Arc<dyn Clock>,
    pub engine: Arc<QueryEngine>,
    pub jobs: JobService,
}

impl RuntimeContext {
    /// Load the configuration and open the meta store and every source
    pub fn new(args: &GlobalArgs) -> Result<Self> {
        let project_dir = Path::new(&args.project_dir);
        let (config, base_dir) = match &args.config {
            Some(path) => {
                let path = Path::new(path);
                let config =
                    Config::load(path).context("Failed to load configuration file")?;
                let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
                (config, base)
            }
            None => (
                Config::load_from_dir(project_dir).context("Failed to load configuration")?,
                project_dir.to_path_buf(),
            ),
        };
        log::debug!("Loaded configuration '{}'", config.name);

        let store: Arc<dyn MetaStore> = if config.meta.path == ":memory:" {
            Arc::new(MetaDb::open_memory().context("Failed to open meta store")?)
        } else {
            let path = resolve(&base_dir, &config.meta.path);
            Arc::new(
                MetaDb::open(&path)
                    .with_context(|| format!("Failed to open meta store {}", path.display()))?,
            )
        };

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let mut engine = QueryEngine::new(
            Arc::clone(&store),
            Arc::new(EngineRegistry::default()),
            Arc::clone(&clock),
            config.execution.clone(),
            config.training.clone(),
        );
        for (name, source) in &config.sources {
            let path = resolve(&base_dir, &source.path);
            let adapter: Arc<dyn DataSource> = match source.source_type {
                SourceType::DuckDb => Arc::new(
                    DuckDbSource::from_path(name.as_str(), &path)
                        .with_context(|| format!("Failed to open source '{}'", name))?,
                ),
                SourceType::Files => Arc::new(
                    FileSource::new(name.as_str(), &path)
                        .with_context(|| format!("Failed to open source '{}'", name))?,
                ),
            };
            engine.register_source(adapter);
        }
        let engine = engine.into_shared();
        let jobs = JobService::new(Arc::clone(&store), Arc::clone(&clock));

        Ok(Self {
            config,
            store,
            clock,
            engine,
            jobs,
        })
    }

    /// Project named on the command line, or the configured default
    pub fn project(&self, name: Option<&str>) -> Result<ProjectName> {
        match name {
            Some(name) => ProjectName::try_new(name).context("Invalid project name"),
            None => self
                .config
                .default_project_name()
                .context("Invalid default project"),
        }
    }

    /// Optional project filter for listing commands
    pub fn project_filter(&self, name: Option<&str>) -> Result<Option<ProjectName>> {
        name.map(|n| ProjectName::try_new(n).context("Invalid project name"))
            .transpose()
    }

    pub fn scheduler(&self) -> Scheduler {
        Scheduler::new(
            Arc::clone(&self.store),
            self.engine.clone(),
            Arc::clone(&self.clock),
        )
    }
}

fn resolve(base: &Path, path: &str) -> PathBuf {
    let path = Path::new(path);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_relative_to_config_dir() {
        assert_eq!(
            resolve(Path::new("/srv/app"), "target/meta.duckdb"),
            PathBuf::from("/srv/app/target/meta.duckdb")
        );
        assert_eq!(
            resolve(Path::new("/srv/app"), "/data/meta.duckdb"),
            PathBuf::from("/data/meta.duckdb")
        );
    }
}
