//! `ViewStore` over the meta database.

use crate::connection::MetaDb;
use crate::error::{MetaError, MetaResult, MetaResultExt};
use crate::row_helpers::{from_micros, to_micros};
use crate::store::{ViewRecord, ViewStore};
use mt_core::{ProjectName, ViewName};

fn decode_view(raw: (String, String, String, i64)) -> MetaResult<ViewRecord> {
    let (project, name, query, created_at) = raw;
    let corrupt = |e: mt_core::CoreError| MetaError::CorruptRow(e.to_string());
    Ok(ViewRecord {
        project: ProjectName::try_new(project).map_err(corrupt)?,
        name: ViewName::try_new(name).map_err(corrupt)?,
        query,
        created_at: from_micros(created_at)?,
    })
}

fn read_view(row: &duckdb::Row<'_>) -> duckdb::Result<(String, String, String, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

impl ViewStore for MetaDb {
    fn create_view(&self, view: &ViewRecord) -> MetaResult<()> {
        let exists = self.get_view(&view.project, view.name.as_str())?.is_some();
        if exists {
            return Err(MetaError::AlreadyExists {
                entity: "View",
                name: format!("{}.{}", view.project, view.name),
            });
        }
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO mt_meta.views (project, name, query, created_at) VALUES (?, ?, ?, ?)",
            duckdb::params![
                view.project.as_str(),
                view.name.as_str(),
                view.query,
                to_micros(view.created_at),
            ],
        )
        .query_context("insert view")?;
        Ok(())
    }

    fn get_view(&self, project: &ProjectName, name: &str) -> MetaResult<Option<ViewRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT project, name, query, created_at FROM mt_meta.views \
                 WHERE lower(project) = lower(?) AND lower(name) = lower(?)",
            )
            .query_context("prepare get_view")?;
        let mut rows = stmt
            .query_map(duckdb::params![project.as_str(), name], read_view)
            .query_context("query get_view")?;
        match rows.next() {
            Some(raw) => Ok(Some(decode_view(raw.query_context("row get_view")?)?)),
            None => Ok(None),
        }
    }

    fn list_views(&self, project: Option<&ProjectName>) -> MetaResult<Vec<ViewRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT project, name, query, created_at FROM mt_meta.views \
                 WHERE CAST(? AS VARCHAR) IS NULL OR lower(project) = lower(CAST(? AS VARCHAR)) \
                 ORDER BY project, name",
            )
            .query_context("prepare list_views")?;
        let filter = project.map(|p| p.as_str());
        let rows = stmt
            .query_map(duckdb::params![filter, filter], read_view)
            .query_context("query list_views")?;
        rows.map(|r| decode_view(r.query_context("row list_views")?))
            .collect()
    }

    fn drop_view(&self, project: &ProjectName, name: &str) -> MetaResult<bool> {
        let conn = self.conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM mt_meta.views WHERE lower(project) = lower(?) AND lower(name) = lower(?)",
                duckdb::params![project.as_str(), name],
            )
            .query_context("delete view")?;
        Ok(deleted > 0)
    }
}
