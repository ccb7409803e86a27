//! `SQLite` database for tracking and registry metadata.

use crate::error::{RegflowError, Result};
use crate::model::{ModelStage, ModelVersion, RegisteredModel};
use crate::storage::ContentAddress;
use crate::tracking::{Run, RunId};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const VERSION_COLUMNS: &str =
    "name, version, stage, source, run_id, content_hash, content_size, created_at, updated_at";

/// `SQLite` database for registry metadata.
pub struct RegistryDb {
    conn: Connection,
}

impl RegistryDb {
    /// Open or create a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Open a throwaway in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let db = Self {
            conn: Connection::open_in_memory()?,
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r"
            PRAGMA foreign_keys = ON;

            -- Runs
            CREATE TABLE IF NOT EXISTS runs (
                id TEXT PRIMARY KEY,
                experiment TEXT NOT NULL,
                run_name TEXT,
                status TEXT NOT NULL,
                started_at TEXT NOT NULL,
                finished_at TEXT,
                run_json TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_runs_experiment ON runs(experiment);

            -- Registered models
            CREATE TABLE IF NOT EXISTS registered_models (
                name TEXT PRIMARY KEY,
                description TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Model versions
            CREATE TABLE IF NOT EXISTS model_versions (
                name TEXT NOT NULL REFERENCES registered_models(name),
                version INTEGER NOT NULL,
                stage TEXT NOT NULL DEFAULT 'None',
                source TEXT NOT NULL,
                run_id TEXT NOT NULL REFERENCES runs(id),
                content_hash TEXT NOT NULL,
                content_size INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (name, version)
            );

            CREATE INDEX IF NOT EXISTS idx_versions_stage ON model_versions(name, stage);
            ",
        )?;
        Ok(())
    }

    // ==================== Runs ====================

    /// Insert a new run.
    pub fn insert_run(&self, run: &Run) -> Result<()> {
        self.conn.execute(
            r"INSERT INTO runs (id, experiment, run_name, status, started_at, finished_at, run_json)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run.run_id.to_string(),
                run.experiment_name,
                run.run_name,
                run.status.to_string(),
                run.started_at.to_rfc3339(),
                run.finished_at.map(|t| t.to_rfc3339()),
                serde_json::to_string(run)?,
            ],
        )?;
        Ok(())
    }

    /// Persist the current state of a run.
    pub fn update_run(&self, run: &Run) -> Result<()> {
        let changed = self.conn.execute(
            r"UPDATE runs SET status = ?1, finished_at = ?2, run_json = ?3 WHERE id = ?4",
            params![
                run.status.to_string(),
                run.finished_at.map(|t| t.to_rfc3339()),
                serde_json::to_string(run)?,
                run.run_id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(RegflowError::not_found("run", run.run_id.to_string()));
        }
        Ok(())
    }

    /// Get a run by ID.
    pub fn get_run(&self, run_id: &RunId) -> Result<Run> {
        let run_json: String = self
            .conn
            .query_row(
                "SELECT run_json FROM runs WHERE id = ?1",
                params![run_id.to_string()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| RegflowError::not_found("run", run_id.to_string()))?;

        Ok(serde_json::from_str(&run_json)?)
    }

    /// List runs of an experiment, newest first.
    pub fn list_runs(&self, experiment: &str) -> Result<Vec<Run>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_json FROM runs WHERE experiment = ?1 ORDER BY started_at DESC",
        )?;
        let rows = stmt.query_map(params![experiment], |row| row.get::<_, String>(0))?;

        let mut runs = Vec::new();
        for row in rows {
            runs.push(serde_json::from_str(&row?)?);
        }
        Ok(runs)
    }

    /// Count runs.
    pub fn count_runs(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM runs")
    }

    // ==================== Registered models ====================

    /// Insert a registered model.
    pub fn insert_registered_model(&self, model: &RegisteredModel) -> Result<()> {
        self.conn
            .execute(
                r"INSERT INTO registered_models (name, description, created_at, updated_at)
                  VALUES (?1, ?2, ?3, ?4)",
                params![
                    model.name,
                    model.description,
                    model.created_at.to_rfc3339(),
                    model.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    RegflowError::AlreadyExists(model.name.clone())
                }
                e => RegflowError::Database(e),
            })?;
        Ok(())
    }

    /// Get a registered model by name.
    pub fn get_registered_model(&self, name: &str) -> Result<RegisteredModel> {
        self.conn
            .query_row(
                "SELECT name, description, created_at, updated_at FROM registered_models WHERE name = ?1",
                params![name],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?
            .ok_or_else(|| RegflowError::not_found("registered model", name))
            .and_then(|(name, description, created, updated)| {
                Ok(RegisteredModel {
                    name,
                    description,
                    created_at: parse_timestamp(&created)?,
                    updated_at: parse_timestamp(&updated)?,
                })
            })
    }

    /// List registered model names.
    pub fn list_registered_model_names(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM registered_models ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut names = Vec::new();
        for row in rows {
            names.push(row?);
        }
        Ok(names)
    }

    /// Count registered models.
    pub fn count_registered_models(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM registered_models")
    }

    // ==================== Model versions ====================

    /// Append a version to a registered model, assigning the next number.
    ///
    /// The number is computed and inserted inside one transaction, so it is
    /// always greater than every version previously issued for `version.name`.
    /// The `version` field of the argument is ignored.
    pub fn insert_next_version(&self, version: &ModelVersion) -> Result<ModelVersion> {
        let tx = self.conn.unchecked_transaction()?;

        let next: u32 = tx.query_row(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM model_versions WHERE name = ?1",
            params![version.name],
            |row| row.get(0),
        )?;

        let mut inserted = version.clone();
        inserted.version = next;

        tx.execute(
            r"INSERT INTO model_versions (name, version, stage, source, run_id, content_hash, content_size, created_at, updated_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                inserted.name,
                inserted.version,
                inserted.current_stage.to_string(),
                inserted.source.to_string(),
                inserted.run_id.to_string(),
                inserted.content_address.hash_hex(),
                inserted.content_address.size(),
                inserted.created_at.to_rfc3339(),
                inserted.updated_at.to_rfc3339(),
            ],
        )?;
        tx.execute(
            "UPDATE registered_models SET updated_at = ?1 WHERE name = ?2",
            params![inserted.created_at.to_rfc3339(), inserted.name],
        )?;

        tx.commit()?;
        Ok(inserted)
    }

    /// Get a model version.
    pub fn get_model_version(&self, name: &str, version: u32) -> Result<ModelVersion> {
        let sql = format!("SELECT {VERSION_COLUMNS} FROM model_versions WHERE name = ?1 AND version = ?2");
        self.conn
            .query_row(&sql, params![name, version], VersionRow::from_row)
            .optional()?
            .ok_or_else(|| RegflowError::NotFound {
                kind: "model version".to_string(),
                name: name.to_string(),
                version: version.to_string(),
            })?
            .into_model_version()
    }

    /// List all versions of a model in ascending order.
    pub fn list_model_versions(&self, name: &str) -> Result<Vec<ModelVersion>> {
        let sql = format!("SELECT {VERSION_COLUMNS} FROM model_versions WHERE name = ?1 ORDER BY version");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![name], VersionRow::from_row)?;

        let mut versions = Vec::new();
        for row in rows {
            versions.push(row?.into_model_version()?);
        }
        Ok(versions)
    }

    /// Set a version's stage, optionally archiving siblings already in that stage.
    ///
    /// Returns the number of sibling versions archived.
    pub fn update_stage(
        &self,
        name: &str,
        version: u32,
        stage: ModelStage,
        archive_existing: bool,
    ) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.unchecked_transaction()?;

        let changed = tx.execute(
            "UPDATE model_versions SET stage = ?1, updated_at = ?2 WHERE name = ?3 AND version = ?4",
            params![stage.to_string(), now, name, version],
        )?;
        if changed == 0 {
            return Err(RegflowError::NotFound {
                kind: "model version".to_string(),
                name: name.to_string(),
                version: version.to_string(),
            });
        }

        let archived = if archive_existing && stage.is_deployment() {
            tx.execute(
                r"UPDATE model_versions SET stage = ?1, updated_at = ?2
                  WHERE name = ?3 AND version != ?4 AND stage = ?5",
                params![
                    ModelStage::Archived.to_string(),
                    now,
                    name,
                    version,
                    stage.to_string()
                ],
            )?
        } else {
            0
        };

        tx.execute(
            "UPDATE registered_models SET updated_at = ?1 WHERE name = ?2",
            params![now, name],
        )?;
        tx.commit()?;
        Ok(archived)
    }

    /// Count model versions across all models.
    pub fn count_model_versions(&self) -> Result<usize> {
        self.count("SELECT COUNT(*) FROM model_versions")
    }

    fn count(&self, sql: &str) -> Result<usize> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }
}

/// Raw `model_versions` row before parsing.
struct VersionRow {
    name: String,
    version: u32,
    stage: String,
    source: String,
    run_id: String,
    content_hash: String,
    content_size: i64,
    created_at: String,
    updated_at: String,
}

impl VersionRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            version: row.get(1)?,
            stage: row.get(2)?,
            source: row.get(3)?,
            run_id: row.get(4)?,
            content_hash: row.get(5)?,
            content_size: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
        })
    }

    fn into_model_version(self) -> Result<ModelVersion> {
        // Safe conversion: size from DB should always be non-negative
        let size = u64::try_from(self.content_size).unwrap_or(0);

        Ok(ModelVersion {
            name: self.name,
            version: self.version,
            current_stage: self.stage.parse()?,
            source: self.source.parse()?,
            run_id: self
                .run_id
                .parse()
                .map_err(|_| RegflowError::Validation(format!("invalid run id: {}", self.run_id)))?,
            content_address: ContentAddress::from_hex(&self.content_hash, size)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| RegflowError::Validation(format!("invalid timestamp: {s}")))
}
