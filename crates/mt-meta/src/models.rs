//! `ModelStore` over the meta database.

use crate::connection::MetaDb;
use crate::error::{MetaError, MetaResult, MetaResultExt};
use crate::row_helpers::{from_micros, opt_from_micros, options_from_json, options_to_json, to_micros};
use crate::store::ModelStore;
use chrono::NaiveDateTime;
use duckdb::Connection;
use mt_core::{ModelId, ModelName, ModelRecord, ModelVersion, ProjectName, VersionStatus};

const MODEL_COLUMNS: &str = "project, name, engine, active_version, last_version, created_at";

const VERSION_COLUMNS: &str = "project, name, version, status, engine, predict, tag, \
     training_query, options, activate_on_complete, error, created_at, completed_at";

struct RawModel {
    project: String,
    name: String,
    engine: String,
    active_version: Option<i64>,
    last_version: i64,
    created_at: i64,
}

fn read_model(row: &duckdb::Row<'_>) -> duckdb::Result<RawModel> {
    Ok(RawModel {
        project: row.get(0)?,
        name: row.get(1)?,
        engine: row.get(2)?,
        active_version: row.get(3)?,
        last_version: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn decode_model(raw: RawModel) -> MetaResult<ModelRecord> {
    Ok(ModelRecord {
        id: model_id(raw.project, raw.name)?,
        engine: raw.engine,
        active_version: raw.active_version.map(version_number).transpose()?,
        last_version: version_number(raw.last_version)?,
        created_at: from_micros(raw.created_at)?,
    })
}

struct RawVersion {
    project: String,
    name: String,
    version: i64,
    status: String,
    engine: String,
    predict: Option<String>,
    tag: Option<String>,
    training_query: Option<String>,
    options: String,
    activate_on_complete: bool,
    error: Option<String>,
    created_at: i64,
    completed_at: Option<i64>,
}

fn read_version(row: &duckdb::Row<'_>) -> duckdb::Result<RawVersion> {
    Ok(RawVersion {
        project: row.get(0)?,
        name: row.get(1)?,
        version: row.get(2)?,
        status: row.get(3)?,
        engine: row.get(4)?,
        predict: row.get(5)?,
        tag: row.get(6)?,
        training_query: row.get(7)?,
        options: row.get(8)?,
        activate_on_complete: row.get(9)?,
        error: row.get(10)?,
        created_at: row.get(11)?,
        completed_at: row.get(12)?,
    })
}

fn decode_version(raw: RawVersion) -> MetaResult<ModelVersion> {
    let status = VersionStatus::parse(&raw.status)
        .ok_or_else(|| MetaError::CorruptRow(format!("unknown version status '{}'", raw.status)))?;
    Ok(ModelVersion {
        model: model_id(raw.project, raw.name)?,
        version: version_number(raw.version)?,
        status,
        engine: raw.engine,
        predict: raw.predict,
        tag: raw.tag,
        training_query: raw.training_query,
        options: options_from_json(&raw.options)?,
        activate_on_complete: raw.activate_on_complete,
        error: raw.error,
        created_at: from_micros(raw.created_at)?,
        completed_at: opt_from_micros(raw.completed_at)?,
    })
}

fn model_id(project: String, name: String) -> MetaResult<ModelId> {
    let project = ProjectName::try_new(project).map_err(|e| MetaError::CorruptRow(e.to_string()))?;
    let name = ModelName::try_new(name).map_err(|e| MetaError::CorruptRow(e.to_string()))?;
    Ok(ModelId::new(project, name))
}

fn version_number(v: i64) -> MetaResult<u32> {
    u32::try_from(v).map_err(|_| MetaError::CorruptRow(format!("invalid version number {v}")))
}

fn model_not_found(id: &ModelId) -> MetaError {
    MetaError::NotFound {
        entity: "Model",
        name: id.to_string(),
    }
}

fn fetch_model(conn: &Connection, id: &ModelId) -> MetaResult<Option<ModelRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {MODEL_COLUMNS} FROM mt_meta.models \
             WHERE lower(project) = lower(?) AND lower(name) = lower(?)"
        ))
        .query_context("prepare get_model")?;
    let mut rows = stmt
        .query_map(duckdb::params![id.project.as_str(), id.name.as_str()], read_model)
        .query_context("query get_model")?;
    match rows.next() {
        Some(raw) => Ok(Some(decode_model(raw.query_context("row get_model")?)?)),
        None => Ok(None),
    }
}

impl ModelStore for MetaDb {
    fn get_model(&self, id: &ModelId) -> MetaResult<Option<ModelRecord>> {
        let conn = self.conn()?;
        fetch_model(&conn, id)
    }

    fn list_models(&self, project: Option<&ProjectName>) -> MetaResult<Vec<ModelRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {MODEL_COLUMNS} FROM mt_meta.models \
                 WHERE CAST(? AS VARCHAR) IS NULL OR lower(project) = lower(CAST(? AS VARCHAR)) \
                 ORDER BY project, name"
            ))
            .query_context("prepare list_models")?;
        let filter = project.map(|p| p.as_str());
        let rows = stmt
            .query_map(duckdb::params![filter, filter], read_model)
            .query_context("query list_models")?;
        rows.map(|r| decode_model(r.query_context("row list_models")?))
            .collect()
    }

    fn create_model(&self, record: &ModelRecord) -> MetaResult<()> {
        self.transaction(|conn| {
            if fetch_model(conn, &record.id)?.is_some() {
                return Err(MetaError::AlreadyExists {
                    entity: "Model",
                    name: record.id.to_string(),
                });
            }
            conn.execute(
                &format!("INSERT INTO mt_meta.models ({MODEL_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"),
                duckdb::params![
                    record.id.project.as_str(),
                    record.id.name.as_str(),
                    record.engine,
                    record.active_version.map(i64::from),
                    i64::from(record.last_version),
                    to_micros(record.created_at),
                ],
            )
            .query_context("insert model")?;
            Ok(())
        })
    }

    fn allocate_version(&self, id: &ModelId) -> MetaResult<u32> {
        self.transaction(|conn| {
            let updated = conn
                .execute(
                    "UPDATE mt_meta.models SET last_version = last_version + 1 \
                     WHERE lower(project) = lower(?) AND lower(name) = lower(?)",
                    duckdb::params![id.project.as_str(), id.name.as_str()],
                )
                .query_context("increment last_version")?;
            if updated == 0 {
                return Err(model_not_found(id));
            }
            let next: i64 = conn
                .query_row(
                    "SELECT last_version FROM mt_meta.models \
                     WHERE lower(project) = lower(?) AND lower(name) = lower(?)",
                    duckdb::params![id.project.as_str(), id.name.as_str()],
                    |row| row.get(0),
                )
                .query_context("read last_version")?;
            version_number(next)
        })
    }

    fn insert_version(&self, v: &ModelVersion) -> MetaResult<()> {
        let options = options_to_json(&v.options)?;
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO mt_meta.model_versions ({VERSION_COLUMNS}) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            duckdb::params![
                v.model.project.as_str(),
                v.model.name.as_str(),
                i64::from(v.version),
                v.status.as_str(),
                v.engine,
                v.predict,
                v.tag,
                v.training_query,
                options,
                v.activate_on_complete,
                v.error,
                to_micros(v.created_at),
                v.completed_at.map(to_micros),
            ],
        )
        .query_context("insert model version")?;
        Ok(())
    }

    fn get_version(&self, id: &ModelId, version: u32) -> MetaResult<Option<ModelVersion>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {VERSION_COLUMNS} FROM mt_meta.model_versions \
                 WHERE lower(project) = lower(?) AND lower(name) = lower(?) AND version = ?"
            ))
            .query_context("prepare get_version")?;
        let mut rows = stmt
            .query_map(
                duckdb::params![id.project.as_str(), id.name.as_str(), i64::from(version)],
                read_version,
            )
            .query_context("query get_version")?;
        match rows.next() {
            Some(raw) => Ok(Some(decode_version(raw.query_context("row get_version")?)?)),
            None => Ok(None),
        }
    }

    fn list_versions(&self, id: &ModelId) -> MetaResult<Vec<ModelVersion>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {VERSION_COLUMNS} FROM mt_meta.model_versions \
                 WHERE lower(project) = lower(?) AND lower(name) = lower(?) \
                 ORDER BY version"
            ))
            .query_context("prepare list_versions")?;
        let rows = stmt
            .query_map(
                duckdb::params![id.project.as_str(), id.name.as_str()],
                read_version,
            )
            .query_context("query list_versions")?;
        rows.map(|r| decode_version(r.query_context("row list_versions")?))
            .collect()
    }

    fn set_version_status(
        &self,
        id: &ModelId,
        version: u32,
        status: VersionStatus,
        error: Option<&str>,
        completed_at: Option<NaiveDateTime>,
    ) -> MetaResult<()> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE mt_meta.model_versions SET status = ?, error = ?, completed_at = ? \
                 WHERE lower(project) = lower(?) AND lower(name) = lower(?) AND version = ?",
                duckdb::params![
                    status.as_str(),
                    error,
                    completed_at.map(to_micros),
                    id.project.as_str(),
                    id.name.as_str(),
                    i64::from(version),
                ],
            )
            .query_context("update version status")?;
        if updated == 0 {
            return Err(MetaError::NotFound {
                entity: "Model version",
                name: format!("{}.{}", id, version),
            });
        }
        Ok(())
    }

    fn set_active_version(&self, id: &ModelId, version: Option<u32>) -> MetaResult<()> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE mt_meta.models SET active_version = ? \
                 WHERE lower(project) = lower(?) AND lower(name) = lower(?)",
                duckdb::params![
                    version.map(i64::from),
                    id.project.as_str(),
                    id.name.as_str()
                ],
            )
            .query_context("update active_version")?;
        if updated == 0 {
            return Err(model_not_found(id));
        }
        Ok(())
    }

    fn delete_version(&self, id: &ModelId, version: u32) -> MetaResult<bool> {
        let conn = self.conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM mt_meta.model_versions \
                 WHERE lower(project) = lower(?) AND lower(name) = lower(?) AND version = ?",
                duckdb::params![id.project.as_str(), id.name.as_str(), i64::from(version)],
            )
            .query_context("delete model version")?;
        Ok(deleted > 0)
    }

    fn delete_model(&self, id: &ModelId) -> MetaResult<bool> {
        self.transaction(|conn| {
            conn.execute(
                "DELETE FROM mt_meta.model_versions \
                 WHERE lower(project) = lower(?) AND lower(name) = lower(?)",
                duckdb::params![id.project.as_str(), id.name.as_str()],
            )
            .query_context("delete model versions")?;
            let deleted = conn
                .execute(
                    "DELETE FROM mt_meta.models \
                     WHERE lower(project) = lower(?) AND lower(name) = lower(?)",
                    duckdb::params![id.project.as_str(), id.name.as_str()],
                )
                .query_context("delete model")?;
            Ok(deleted > 0)
        })
    }
}
