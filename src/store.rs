use std::collections::HashSet;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params_from_iter};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};

use crate::config::DbConfig;
use crate::models::{DedupKey, NewJobPost};

const INSERT_COLUMNS: &str = "title, description, company, location, function, schedule, deadline, responsibilities, \
    requirements, posted_by_id, is_scraped, is_premium, premium_days, priority_level, posted_at, deleted, apply_link";
const COLUMN_COUNT: usize = 17;

/// Largest chunk one multi-row insert can carry. SQLite caps a statement at
/// 32766 bound parameters (PostgreSQL at 65535), one per column per row.
pub const MAX_ROWS_PER_INSERT: usize = 32_766 / COLUMN_COUNT;

/// The destination job table. Rows are only ever added, never updated.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// `(company, title)` of every row posted at or after `since`.
    async fn existing_keys(&self, since: DateTime<Utc>) -> Result<HashSet<DedupKey>>;

    /// Inserts `rows` as one multi-row statement; rows hitting a unique constraint
    /// are skipped. Returns how many rows were actually written.
    async fn insert_batch(&self, rows: &[NewJobPost]) -> Result<u64>;
}

// --- PostgreSQL ---

/// The production store. The table belongs to the web application and is
/// never created or altered here.
pub struct PostgresStore {
    pool: PgPool,
    table: String,
}

impl PostgresStore {
    pub async fn connect(db: &DbConfig, table: &str) -> Result<Self> {
        let missing = db.missing();
        if !missing.is_empty() {
            bail!("database settings missing: {}", missing.join(", "));
        }

        let mut options = PgConnectOptions::new()
            .host(db.host.as_deref().unwrap_or_default())
            .port(db.port)
            .database(db.name.as_deref().unwrap_or_default())
            .username(db.user.as_deref().unwrap_or_default());
        if let Some(password) = &db.password {
            options = options.password(password);
        }

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .with_context(|| format!("Failed to connect to {:?} on {:?}", db.name, db.host))?;
        info!("Connected to PostgreSQL, table {}", table);

        Ok(Self { pool, table: table.to_string() })
    }
}

#[async_trait]
impl JobStore for PostgresStore {
    async fn existing_keys(&self, since: DateTime<Utc>) -> Result<HashSet<DedupKey>> {
        let sql = format!("SELECT company, title FROM {} WHERE posted_at >= $1", self.table);
        let rows: Vec<(String, String)> = sqlx::query_as(&sql)
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .context("Failed to read existing job keys")?;
        Ok(rows.into_iter().map(|(company, title)| DedupKey::new(company, title)).collect())
    }

    async fn insert_batch(&self, rows: &[NewJobPost]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO {} ({}) ", self.table, INSERT_COLUMNS));
        builder.push_values(rows, |mut b, row| {
            b.push_bind(row.title.clone())
                .push_bind(row.description.clone())
                .push_bind(row.company.clone())
                .push_bind(row.location.clone())
                .push_bind(row.function.clone())
                .push_bind(row.schedule.clone())
                .push_bind(row.deadline)
                .push_bind(row.responsibilities.clone())
                .push_bind(row.requirements.clone())
                .push_bind(row.posted_by_id)
                .push_bind(row.is_scraped)
                .push_bind(row.is_premium)
                .push_bind(row.premium_days)
                .push_bind(row.priority_level)
                .push_bind(row.posted_at)
                .push_bind(row.deleted)
                .push_bind(row.apply_link.clone());
        });
        builder.push(" ON CONFLICT DO NOTHING");

        let mut tx = self.pool.begin().await.context("Failed to open transaction")?;
        let result = builder.build().execute(&mut *tx).await.context("Batch insert failed")?;
        tx.commit().await.context("Failed to commit batch")?;

        debug!("inserted {} of {} rows", result.rows_affected(), rows.len());
        Ok(result.rows_affected())
    }
}

// --- SQLite ---

/// Local-mode store. Creates the table on open so a fresh file works out of the box.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>, table: &str) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        info!("Using local SQLite store at {}", path.display());
        Self::from_connection(conn, table)
    }

    pub fn open_in_memory(table: &str) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, table)
    }

    pub fn from_connection(conn: Connection, table: &str) -> Result<Self> {
        let store = Self { conn: Mutex::new(conn), table: table.to_string() };
        store.ensure_schema()?;
        Ok(store)
    }

    fn ensure_schema(&self) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                company TEXT NOT NULL,
                location TEXT NOT NULL DEFAULT '',
                function TEXT,
                schedule TEXT,
                deadline TEXT,
                responsibilities TEXT,
                requirements TEXT,
                posted_by_id INTEGER NOT NULL,
                is_scraped INTEGER NOT NULL DEFAULT 0,
                is_premium INTEGER NOT NULL DEFAULT 0,
                premium_days INTEGER NOT NULL DEFAULT 0,
                priority_level INTEGER NOT NULL DEFAULT 0,
                posted_at TEXT NOT NULL,
                deleted INTEGER NOT NULL DEFAULT 0,
                apply_link TEXT NOT NULL DEFAULT ''
            );
            CREATE INDEX IF NOT EXISTS {0}_posted_at ON {0} (posted_at);",
            self.table
        );
        self.lock()?.execute_batch(&sql).context("Failed to create job table")?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("SQLite connection poisoned"))
    }

    #[cfg(test)]
    pub fn execute(&self, sql: &str) -> Result<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    #[cfg(test)]
    pub fn count(&self) -> Result<i64> {
        let sql = format!("SELECT count(*) FROM {}", self.table);
        Ok(self.lock()?.query_row(&sql, [], |row| row.get(0))?)
    }
}

/// Fixed-width UTC text so timestamps compare correctly as strings.
fn sqlite_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn text_or_null(value: &Option<String>) -> SqlValue {
    value.clone().map(SqlValue::Text).unwrap_or(SqlValue::Null)
}

fn sqlite_row(row: &NewJobPost) -> [SqlValue; COLUMN_COUNT] {
    [
        SqlValue::Text(row.title.clone()),
        SqlValue::Text(row.description.clone()),
        SqlValue::Text(row.company.clone()),
        SqlValue::Text(row.location.clone()),
        text_or_null(&row.function),
        text_or_null(&row.schedule),
        row.deadline.map(|d| SqlValue::Text(d.to_string())).unwrap_or(SqlValue::Null),
        text_or_null(&row.responsibilities),
        text_or_null(&row.requirements),
        SqlValue::Integer(row.posted_by_id),
        SqlValue::Integer(row.is_scraped as i64),
        SqlValue::Integer(row.is_premium as i64),
        SqlValue::Integer(row.premium_days as i64),
        SqlValue::Integer(row.priority_level as i64),
        SqlValue::Text(sqlite_timestamp(row.posted_at)),
        SqlValue::Integer(row.deleted as i64),
        SqlValue::Text(row.apply_link.clone()),
    ]
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn existing_keys(&self, since: DateTime<Utc>) -> Result<HashSet<DedupKey>> {
        let conn = self.lock()?;
        let sql = format!("SELECT company, title FROM {} WHERE posted_at >= ?1", self.table);
        let mut stmt = conn.prepare(&sql)?;
        let keys = stmt
            .query_map([sqlite_timestamp(since)], |row| Ok(DedupKey::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(keys)
    }

    async fn insert_batch(&self, rows: &[NewJobPost]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let placeholders: Vec<String> = (0..rows.len())
            .map(|r| {
                let cols: Vec<String> = (1..=COLUMN_COUNT).map(|c| format!("?{}", r * COLUMN_COUNT + c)).collect();
                format!("({})", cols.join(", "))
            })
            .collect();
        let sql = format!("INSERT OR IGNORE INTO {} ({}) VALUES {}", self.table, INSERT_COLUMNS, placeholders.join(", "));
        let params: Vec<SqlValue> = rows.iter().flat_map(sqlite_row).collect();

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let inserted = tx.execute(&sql, params_from_iter(params)).context("Batch insert failed")?;
        tx.commit()?;
        Ok(inserted as u64)
    }
}
