//! File-directory data source
//!
//! Every `.csv`, `.json` and `.parquet` file in a directory is a relation,
//! addressed by its full file name (`files."tasks.csv"`) or, when unique, by
//! its stem (`files.tasks`). Files are read through an in-memory DuckDB.

use crate::convert::{describe_select, projection, query_batch};
use crate::error::{DbError, DbResult};
use crate::traits::DataSource;
use async_trait::async_trait;
use duckdb::Connection;
use mt_core::{RowBatch, ScalarType};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// File extensions this source can read
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["csv", "json", "parquet"];

/// A directory of data files
pub struct FileSource {
    name: String,
    dir: PathBuf,
    conn: Mutex<Connection>,
}

impl FileSource {
    pub fn new(name: impl Into<String>, dir: &Path) -> DbResult<Self> {
        if !dir.is_dir() {
            return Err(DbError::ConnectionError(format!(
                "'{}' is not a directory",
                dir.display()
            )));
        }
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            name: name.into(),
            dir: dir.to_path_buf(),
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    fn allowed_list() -> String {
        ALLOWED_EXTENSIONS
            .iter()
            .map(|e| format!(".{}", e))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn extension_of(file: &str) -> Option<String> {
        Path::new(file)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    fn is_allowed(file: &str) -> bool {
        Self::extension_of(file).is_some_and(|e| ALLOWED_EXTENSIONS.contains(&e.as_str()))
    }

    /// Every regular file in the directory, sorted
    fn files(&self) -> DbResult<Vec<String>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    files.push(name.to_string());
                }
            }
        }
        files.sort();
        Ok(files)
    }

    /// Map a relation name onto a readable file
    fn locate(&self, relation: &str) -> DbResult<PathBuf> {
        let files = self.files()?;

        if let Some(file) = files.iter().find(|f| f.eq_ignore_ascii_case(relation)) {
            if !Self::is_allowed(file) {
                return Err(DbError::UnsupportedFileType {
                    file: file.clone(),
                    allowed: Self::allowed_list(),
                });
            }
            return Ok(self.dir.join(file));
        }

        if Self::extension_of(relation).is_some() && !Self::is_allowed(relation) {
            return Err(DbError::UnsupportedFileType {
                file: relation.to_string(),
                allowed: Self::allowed_list(),
            });
        }

        let by_stem: Vec<&String> = files
            .iter()
            .filter(|f| Self::is_allowed(f))
            .filter(|f| {
                Path::new(f.as_str())
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .is_some_and(|s| s.eq_ignore_ascii_case(relation))
            })
            .collect();
        match by_stem.as_slice() {
            [file] => Ok(self.dir.join(file.as_str())),
            [] => Err(DbError::TableNotFound(format!("{}.{}", self.name, relation))),
            _ => Err(DbError::ExecutionError(format!(
                "'{}' matches several files in {}; use the full file name",
                relation, self.name
            ))),
        }
    }

    fn reader(path: &Path) -> DbResult<String> {
        let literal = path.display().to_string().replace('\'', "''");
        let ext = Self::extension_of(&path.display().to_string()).unwrap_or_default();
        let func = match ext.as_str() {
            "csv" => "read_csv_auto",
            "json" => "read_json_auto",
            "parquet" => "read_parquet",
            _ => {
                return Err(DbError::UnsupportedFileType {
                    file: path.display().to_string(),
                    allowed: Self::allowed_list(),
                })
            }
        };
        Ok(format!("{}('{}')", func, literal))
    }
}

#[async_trait]
impl DataSource for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn source_type(&self) -> &'static str {
        "files"
    }

    async fn list_relations(&self) -> DbResult<Vec<String>> {
        Ok(self
            .files()?
            .into_iter()
            .filter(|f| Self::is_allowed(f))
            .collect())
    }

    async fn fetch(&self, relation: &str, columns: &[String]) -> DbResult<RowBatch> {
        let path = self.locate(relation)?;
        let sql = format!("SELECT {} FROM {}", projection(columns), Self::reader(&path)?);
        let conn = self.lock()?;
        let batch = query_batch(&conn, &sql)?;
        log::debug!("Read {} rows from {}", batch.len(), path.display());
        Ok(batch)
    }

    async fn describe(&self, relation: &str) -> DbResult<Vec<(String, ScalarType)>> {
        let path = self.locate(relation)?;
        let conn = self.lock()?;
        describe_select(&conn, &format!("SELECT * FROM {}", Self::reader(&path)?))
    }

    async fn has_relation(&self, relation: &str) -> DbResult<bool> {
        match self.locate(relation) {
            Ok(_) => Ok(true),
            Err(DbError::TableNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "files_test.rs"]
mod tests;
