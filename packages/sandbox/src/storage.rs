// ABOUTME: Storage layer for teams and the generated-file catalog
// ABOUTME: Defines the collaborator traits consumed by the engine and their SQLite implementation

use crate::classifier::ProjectType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already set: {0}")]
    AlreadySet(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub team_id: i64,
    pub team_name: String,
    pub project_type: Option<ProjectType>,
    /// Host port assigned once at team creation
    pub port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub title: String,
    pub path: String,
    pub team_id: i64,
}

/// Team registry owned by the surrounding application
#[async_trait]
pub trait TeamStore: Send + Sync {
    async fn get_team(&self, team_id: i64) -> Result<Team>;

    /// Write-once: fails with [`StorageError::AlreadySet`] when a port exists
    async fn set_port(&self, team_id: i64, port: u16) -> Result<()>;

    async fn set_project_type(&self, team_id: i64, project_type: ProjectType) -> Result<()>;
}

/// Catalog of files generated on behalf of a team
#[async_trait]
pub trait FileCatalog: Send + Sync {
    /// Insert or update the record keyed by `path`
    async fn register(&self, record: &FileRecord) -> Result<()>;

    /// Returns false when no record matched
    async fn unregister(&self, team_id: i64, path: &str) -> Result<bool>;

    async fn files_for_team(&self, team_id: i64) -> Result<Vec<FileRecord>>;
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `url` and apply migrations
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let mut pool_options = SqlitePoolOptions::new().max_connections(5);
        if url.contains(":memory:") {
            // every connection to an in-memory url is its own database
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub async fn create_team(&self, team_id: i64, team_name: &str) -> Result<Team> {
        if team_name.trim().is_empty() {
            return Err(StorageError::InvalidData("Team name is empty".to_string()));
        }

        sqlx::query("INSERT INTO teams (team_id, team_name) VALUES (?, ?)")
            .bind(team_id)
            .bind(team_name)
            .execute(&self.pool)
            .await?;

        debug!("Created team {} ({})", team_id, team_name);
        self.get_team(team_id).await
    }

    fn row_to_team(row: &SqliteRow) -> Result<Team> {
        let project_type = row
            .try_get::<Option<String>, _>("project_type")?
            .map(|raw| {
                ProjectType::parse(&raw)
                    .ok_or_else(|| StorageError::InvalidData(format!("project type '{}'", raw)))
            })
            .transpose()?;

        let port = row
            .try_get::<Option<i64>, _>("port")?
            .map(|raw| {
                u16::try_from(raw)
                    .map_err(|_| StorageError::InvalidData(format!("port {} out of range", raw)))
            })
            .transpose()?;

        Ok(Team {
            team_id: row.try_get("team_id")?,
            team_name: row.try_get("team_name")?,
            project_type,
            port,
        })
    }
}

#[async_trait]
impl TeamStore for SqliteStore {
    async fn get_team(&self, team_id: i64) -> Result<Team> {
        let row = sqlx::query(
            "SELECT team_id, team_name, project_type, port FROM teams WHERE team_id = ?",
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StorageError::NotFound(format!("team {}", team_id)))?;

        Self::row_to_team(&row)
    }

    async fn set_port(&self, team_id: i64, port: u16) -> Result<()> {
        let result = sqlx::query(
            "UPDATE teams SET port = ?, updated_at = datetime('now') WHERE team_id = ? AND port IS NULL",
        )
        .bind(i64::from(port))
        .bind(team_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // distinguish a missing team from one whose port is already fixed
            let team = self.get_team(team_id).await?;
            return Err(StorageError::AlreadySet(format!(
                "team {} already has port {}",
                team_id,
                team.port.map(|p| p.to_string()).unwrap_or_default()
            )));
        }

        Ok(())
    }

    async fn set_project_type(&self, team_id: i64, project_type: ProjectType) -> Result<()> {
        let result = sqlx::query(
            "UPDATE teams SET project_type = ?, updated_at = datetime('now') WHERE team_id = ?",
        )
        .bind(project_type.as_str())
        .bind(team_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::NotFound(format!("team {}", team_id)));
        }

        Ok(())
    }
}

#[async_trait]
impl FileCatalog for SqliteStore {
    async fn register(&self, record: &FileRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO files (title, path, team_id)
            VALUES (?, ?, ?)
            ON CONFLICT(path) DO UPDATE SET
                title = excluded.title,
                team_id = excluded.team_id,
                updated_at = datetime('now')
            "#,
        )
        .bind(&record.title)
        .bind(&record.path)
        .bind(record.team_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn unregister(&self, team_id: i64, path: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE team_id = ? AND path = ?")
            .bind(team_id)
            .bind(path)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn files_for_team(&self, team_id: i64) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query("SELECT title, path, team_id FROM files WHERE team_id = ? ORDER BY path")
            .bind(team_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<FileRecord> {
                Ok(FileRecord {
                    title: row.try_get("title")?,
                    path: row.try_get("path")?,
                    team_id: row.try_get("team_id")?,
                })
            })
            .collect()
    }
}
