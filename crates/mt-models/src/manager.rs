//! Model Version Manager
//!
//! Every mutation of a model's version set or active pointer runs under a
//! per-model lock. Version numbers come from the store's atomic counter, so
//! they are never reused, even after deletion. Training runs in a spawned
//! task that flips the version to `complete` or `error`; only a completed
//! version that asked for activation and is newer than the current active
//! one moves the pointer.

use crate::engine::{EngineRegistry, MlEngine, TrainingDataLoader};
use crate::error::{ModelError, ModelResult};
use mt_core::config::TrainingConfig;
use mt_core::{
    Clock, KeyedLocks, ModelId, ModelRecord, ModelVersion, ProjectName, TrainingParams,
    VersionStatus,
};
use mt_meta::MetaStore;
use std::sync::{Arc, RwLock, Weak};
use tokio::time::Instant;

type LockKey = (String, String);

fn lock_key(id: &ModelId) -> LockKey {
    (
        id.project.to_ascii_lowercase(),
        id.name.to_ascii_lowercase(),
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    /// CREATE MODEL: the model must not exist yet
    Create,
    /// A new version from explicit parameters only
    Version,
    /// RETRAIN: unset parameters inherit from the active version
    Retrain,
}

/// Owns the lifecycle of every model and its versions
pub struct ModelVersionManager {
    store: Arc<dyn MetaStore>,
    engines: Arc<EngineRegistry>,
    clock: Arc<dyn Clock>,
    locks: Arc<KeyedLocks<LockKey>>,
    loader: RwLock<Option<Weak<dyn TrainingDataLoader>>>,
    config: TrainingConfig,
}

impl ModelVersionManager {
    pub fn new(
        store: Arc<dyn MetaStore>,
        engines: Arc<EngineRegistry>,
        clock: Arc<dyn Clock>,
        config: TrainingConfig,
    ) -> Self {
        Self {
            store,
            engines,
            clock,
            locks: Arc::new(KeyedLocks::new()),
            loader: RwLock::new(None),
            config,
        }
    }

    /// Install the component that runs training queries.
    ///
    /// Held weakly: the loader is normally the query engine, which itself
    /// owns this manager.
    pub fn set_training_loader(&self, loader: Weak<dyn TrainingDataLoader>) {
        *self.loader.write().unwrap_or_else(|p| p.into_inner()) = Some(loader);
    }

    pub fn engines(&self) -> &EngineRegistry {
        &self.engines
    }

    fn training_loader(&self) -> Option<Arc<dyn TrainingDataLoader>> {
        self.loader
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// CREATE MODEL: create the model and its first version.
    ///
    /// Fails with `AlreadyExists` if the model exists.
    pub async fn create_model(
        &self,
        id: &ModelId,
        params: TrainingParams,
    ) -> ModelResult<ModelVersion> {
        self.start_version(id, params, Origin::Create).await
    }

    /// Allocate the next version from explicit parameters, creating the
    /// model if it does not exist yet.
    pub async fn create_version(
        &self,
        id: &ModelId,
        params: TrainingParams,
    ) -> ModelResult<ModelVersion> {
        self.start_version(id, params, Origin::Version).await
    }

    /// RETRAIN: like [`create_version`](Self::create_version), but the
    /// target, tag, engine, training query and options default to the active
    /// version's (the latest version's if none is active yet). With
    /// `active = Some(false)` the new version never becomes active on its own.
    pub async fn retrain(&self, id: &ModelId, params: TrainingParams) -> ModelResult<ModelVersion> {
        self.start_version(id, params, Origin::Retrain).await
    }

    async fn start_version(
        &self,
        id: &ModelId,
        params: TrainingParams,
        origin: Origin,
    ) -> ModelResult<ModelVersion> {
        let wait = params.wait;
        let version = {
            let _guard = self.locks.lock(&lock_key(id)).await;

            let existing = self.store.get_model(id)?;
            let params = match (&existing, origin) {
                (Some(_), Origin::Create) => {
                    return Err(ModelError::AlreadyExists(id.to_string()));
                }
                (None, Origin::Retrain) => return Err(ModelError::ModelNotFound(id.to_string())),
                (Some(model), Origin::Retrain) => self.inherit(model, params)?,
                _ => params,
            };

            let engine_name = params
                .engine
                .clone()
                .or_else(|| existing.as_ref().map(|m| m.engine.clone()))
                .unwrap_or_else(|| self.engines.default_engine().to_string());
            let engine = self.engines.get(&engine_name)?;
            engine.validate(&params)?;

            let now = self.clock.now();
            if existing.is_none() {
                self.store.create_model(&ModelRecord {
                    id: id.clone(),
                    engine: engine.name().to_string(),
                    active_version: None,
                    last_version: 0,
                    created_at: now,
                })?;
            }

            let number = self.store.allocate_version(id)?;
            let version = ModelVersion {
                model: id.clone(),
                version: number,
                status: VersionStatus::Generating,
                engine: engine.name().to_string(),
                predict: params.predict,
                tag: params.tag,
                training_query: params.training_query,
                options: params.options,
                activate_on_complete: params.active.unwrap_or(true),
                error: None,
                created_at: now,
                completed_at: None,
            };
            self.store.insert_version(&version)?;
            log::info!(
                "Allocated version {} of {} (engine {}, activate on complete: {})",
                number,
                id,
                version.engine,
                version.activate_on_complete
            );

            TrainingTask {
                store: Arc::clone(&self.store),
                clock: Arc::clone(&self.clock),
                locks: Arc::clone(&self.locks),
                loader: self.training_loader(),
                engine,
                version: version.clone(),
            }
            .spawn();
            version
        };

        if wait {
            return self.wait_for_completion(id, version.version).await;
        }
        Ok(version)
    }

    /// Fill unset retrain parameters from the active version
    fn inherit(&self, model: &ModelRecord, mut params: TrainingParams) -> ModelResult<TrainingParams> {
        let base = match model.active_version {
            Some(active) => self.store.get_version(&model.id, active)?,
            None => self.store.list_versions(&model.id)?.pop(),
        };
        let Some(base) = base else {
            return Ok(params);
        };

        params.predict = params.predict.or(base.predict);
        params.tag = params.tag.or(base.tag);
        params.engine = params.engine.or(Some(base.engine));
        params.training_query = params.training_query.or(base.training_query);
        let mut options = base.options;
        options.extend(std::mem::take(&mut params.options));
        params.options = options;
        Ok(params)
    }

    /// Bounded poll until the version leaves `generating`
    pub async fn wait_for_completion(
        &self,
        id: &ModelId,
        version: u32,
    ) -> ModelResult<ModelVersion> {
        let timeout = self.config.wait_timeout();
        let started = Instant::now();
        loop {
            let current = self.get_version(id, version)?;
            match current.status {
                VersionStatus::Complete => return Ok(current),
                VersionStatus::Error => {
                    return Err(ModelError::TrainingFailed {
                        model: id.to_string(),
                        version,
                        message: current.error.unwrap_or_default(),
                    });
                }
                VersionStatus::Generating => {}
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(ModelError::WaitTimeout {
                    model: id.to_string(),
                    version,
                    waited,
                });
            }
            tokio::time::sleep(self.config.poll_interval().min(timeout - waited)).await;
        }
    }

    /// Make `version` the active version, replacing the previous one in a
    /// single write.
    pub async fn activate(&self, id: &ModelId, version: u32) -> ModelResult<()> {
        let _guard = self.locks.lock(&lock_key(id)).await;
        self.require_model(id)?;
        let target = self.get_version(id, version)?;
        if !target.is_complete() {
            return Err(ModelError::NotReady {
                model: id.to_string(),
                version,
                status: target.status,
            });
        }
        self.store.set_active_version(id, Some(version))?;
        log::info!("Activated version {} of {}", version, id);
        Ok(())
    }

    /// Delete one version. The active version and versions still training
    /// cannot be deleted.
    pub async fn delete_version(&self, id: &ModelId, version: u32) -> ModelResult<()> {
        let _guard = self.locks.lock(&lock_key(id)).await;
        let model = self.require_model(id)?;
        let target = self.get_version(id, version)?;
        if model.is_active(version) {
            return Err(ModelError::ActiveVersionDelete {
                model: id.to_string(),
                version,
            });
        }
        if target.status == VersionStatus::Generating {
            return Err(ModelError::VersionGenerating {
                model: id.to_string(),
                version,
            });
        }
        if !self.store.delete_version(id, version)? {
            return Err(ModelError::VersionNotFound {
                model: id.to_string(),
                version,
            });
        }
        log::info!("Deleted version {} of {}", version, id);
        Ok(())
    }

    /// Delete a model and all of its versions
    pub async fn drop_model(&self, id: &ModelId) -> ModelResult<()> {
        let _guard = self.locks.lock(&lock_key(id)).await;
        if !self.store.delete_model(id)? {
            return Err(ModelError::ModelNotFound(id.to_string()));
        }
        log::info!("Dropped model {}", id);
        Ok(())
    }

    pub fn get_model(&self, id: &ModelId) -> ModelResult<Option<ModelRecord>> {
        Ok(self.store.get_model(id)?)
    }

    pub fn list_models(&self, project: Option<&ProjectName>) -> ModelResult<Vec<ModelRecord>> {
        Ok(self.store.list_models(project)?)
    }

    pub fn list_versions(&self, id: &ModelId) -> ModelResult<Vec<ModelVersion>> {
        self.require_model(id)?;
        Ok(self.store.list_versions(id)?)
    }

    /// A single version, including the error text of failed trainings
    pub fn get_version(&self, id: &ModelId, version: u32) -> ModelResult<ModelVersion> {
        self.store
            .get_version(id, version)?
            .ok_or_else(|| ModelError::VersionNotFound {
                model: id.to_string(),
                version,
            })
    }

    /// The version a query should use: the pinned one if given, else the
    /// active one, else the latest (whose status then decides readiness).
    pub fn resolve_version(&self, id: &ModelId, pinned: Option<u32>) -> ModelResult<ModelVersion> {
        let model = self.require_model(id)?;
        match pinned.or(model.active_version) {
            Some(version) => self.get_version(id, version),
            None => self
                .store
                .list_versions(id)?
                .pop()
                .ok_or_else(|| ModelError::ModelNotFound(id.to_string())),
        }
    }

    /// Engine serving a version
    pub fn engine_for(&self, version: &ModelVersion) -> ModelResult<Arc<dyn MlEngine>> {
        self.engines.get(&version.engine)
    }

    fn require_model(&self, id: &ModelId) -> ModelResult<ModelRecord> {
        self.store
            .get_model(id)?
            .ok_or_else(|| ModelError::ModelNotFound(id.to_string()))
    }
}

/// Background training of one version
struct TrainingTask {
    store: Arc<dyn MetaStore>,
    clock: Arc<dyn Clock>,
    locks: Arc<KeyedLocks<LockKey>>,
    loader: Option<Arc<dyn TrainingDataLoader>>,
    engine: Arc<dyn MlEngine>,
    version: ModelVersion,
}

impl TrainingTask {
    fn spawn(self) {
        tokio::spawn(async move {
            let id = self.version.model.clone();
            let number = self.version.version;
            if let Err(e) = self.run().await {
                log::warn!("Recording outcome of {}.{} failed: {}", id, number, e);
            }
        });
    }

    async fn run(self) -> ModelResult<()> {
        let id = &self.version.model;
        let number = self.version.version;

        let outcome = match self.load_data().await {
            Ok(data) => self.engine.train(&self.version, data.as_ref()).await,
            Err(e) => Err(e),
        };

        let _guard = self.locks.lock(&lock_key(id)).await;
        let Some(model) = self.store.get_model(id)? else {
            log::debug!("Model {} was dropped while training version {}", id, number);
            return Ok(());
        };

        let now = self.clock.now();
        match outcome {
            Ok(()) => {
                self.store
                    .set_version_status(id, number, VersionStatus::Complete, None, Some(now))?;
                log::info!("Training of {}.{} complete", id, number);
                let newer = model.active_version.map_or(true, |active| number > active);
                if self.version.activate_on_complete && newer {
                    self.store.set_active_version(id, Some(number))?;
                    log::info!("Activated version {} of {}", number, id);
                }
            }
            Err(e) => {
                let message = e.to_string();
                self.store.set_version_status(
                    id,
                    number,
                    VersionStatus::Error,
                    Some(&message),
                    Some(now),
                )?;
                log::warn!("Training of {}.{} failed: {}", id, number, message);
            }
        }
        Ok(())
    }

    async fn load_data(&self) -> ModelResult<Option<mt_core::RowBatch>> {
        let Some(query) = &self.version.training_query else {
            return Ok(None);
        };
        let Some(loader) = &self.loader else {
            return Err(ModelError::TrainingData(
                "no training data loader is configured".to_string(),
            ));
        };
        loader
            .load(&self.version.model.project, query)
            .await
            .map(Some)
    }
}

#[cfg(test)]
#[path = "manager_test.rs"]
mod tests;
