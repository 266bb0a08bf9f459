use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tracing::{debug, info};

use super::domain::{LogEntry, NewUser, Role, User, UserId};
use super::store::{LogStore, StoreError, UserDirectory};
use crate::mood::Score;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        email TEXT NOT NULL UNIQUE,
        role TEXT NOT NULL DEFAULT 'user',
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        score REAL NOT NULL,
        recorded_at TEXT NOT NULL,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE
    )",
    "CREATE INDEX IF NOT EXISTS logs_user_recorded ON logs (user_id, recorded_at)",
];

/// SQLite-backed history. Foreign keys are enforced so that deleting a user
/// removes their log rows.
#[derive(Debug, Clone)]
pub struct SqliteHistoryStore {
    pool: SqlitePool,
}

impl SqliteHistoryStore {
    /// Opens (creating if needed) the database at `url` and applies the schema.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(unavailable)?
            .create_if_missing(true)
            .foreign_keys(true);

        if let Some(parent) = database_path(url).as_deref().and_then(Path::parent) {
            if !parent.as_os_str().is_empty() {
                ensure_dir(parent)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(if is_memory(url) { 1 } else { 4 })
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect_with(options)
            .await
            .map_err(unavailable)?;

        let store = Self { pool };
        store.migrate().await?;
        info!(%url, "history database ready");
        Ok(store)
    }

    /// Fresh private in-memory database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        Self::connect("sqlite::memory:").await
    }

    async fn migrate(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(*statement)
                .execute(&self.pool)
                .await
                .map_err(unavailable)?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn is_memory(url: &str) -> bool {
    url.contains(":memory:") || url.contains("mode=memory")
}

/// Filesystem path behind a `sqlite:` URL, if it names one.
fn database_path(url: &str) -> Option<PathBuf> {
    if is_memory(url) {
        return None;
    }
    let without_scheme = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    let path = without_scheme.split('?').next().unwrap_or_default();
    (!path.is_empty()).then(|| PathBuf::from(path))
}

fn ensure_dir(path: &Path) -> Result<(), StoreError> {
    std::fs::create_dir_all(path).map_err(|err| {
        StoreError::Unavailable(format!(
            "unable to create database directory {}: {err}",
            path.display()
        ))
    })
}

fn unavailable(err: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn map_write_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Conflict(db.message().to_string())
        }
        _ => unavailable(err),
    }
}

fn user_from_row(row: &SqliteRow) -> Result<User, sqlx::Error> {
    let role: String = row.try_get("role")?;
    Ok(User {
        id: UserId(row.try_get("id")?),
        username: row.try_get("username")?,
        email: row.try_get("email")?,
        role: Role::from_label(&role),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn entry_from_row(row: &SqliteRow) -> Result<LogEntry, sqlx::Error> {
    Ok(LogEntry {
        id: row.try_get("id")?,
        user_id: UserId(row.try_get("user_id")?),
        score: Score::new(row.try_get("score")?),
        recorded_at: row.try_get::<DateTime<Utc>, _>("recorded_at")?,
    })
}

#[async_trait]
impl LogStore for SqliteHistoryStore {
    async fn append(&self, user_id: UserId, score: Score) -> Result<LogEntry, StoreError> {
        let recorded_at = Utc::now();
        let result = sqlx::query("INSERT INTO logs (score, recorded_at, user_id) VALUES (?, ?, ?)")
            .bind(score.value())
            .bind(recorded_at)
            .bind(user_id.0)
            .execute(&self.pool)
            .await;

        let done = match result {
            Ok(done) => done,
            Err(sqlx::Error::Database(db)) if db.is_foreign_key_violation() => {
                return Err(StoreError::UnknownUser(user_id));
            }
            Err(err) => return Err(unavailable(err)),
        };

        let entry = LogEntry {
            id: done.last_insert_rowid(),
            user_id,
            score,
            recorded_at,
        };
        debug!(user_id = %user_id, score = %score, "score logged");
        Ok(entry)
    }

    async fn list(&self, user_id: UserId) -> Result<Vec<LogEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, user_id, score, recorded_at FROM logs
             WHERE user_id = ? ORDER BY recorded_at ASC, id ASC",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        rows.iter()
            .map(entry_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(unavailable)
    }
}

#[async_trait]
impl UserDirectory for SqliteHistoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, StoreError> {
        let created_at = Utc::now();
        let done = sqlx::query(
            "INSERT INTO users (username, email, role, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(user.role.label())
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(User {
            id: UserId(done.last_insert_rowid()),
            username: user.username,
            email: user.email,
            role: user.role,
            created_at,
        })
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, username, email, role, created_at FROM users WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(unavailable)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query(
            "SELECT id, username, email, role, created_at FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.as_ref()
            .map(user_from_row)
            .transpose()
            .map_err(unavailable)
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query("SELECT id, username, email, role, created_at FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;

        rows.iter()
            .map(user_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(unavailable)
    }

    async fn delete_user(&self, id: UserId) -> Result<(), StoreError> {
        let done = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;

        if done.rows_affected() == 0 {
            return Err(StoreError::UnknownUser(id));
        }
        Ok(())
    }
}
