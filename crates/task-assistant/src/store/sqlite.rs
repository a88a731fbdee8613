//! SQLite Task Store
//!
//! Durable store over an `sqlx` pool. Tags live in a JSON array column so
//! that every operation stays a single statement.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use tokio::sync::OnceCell;

use super::TaskStore;
use crate::error::{Result, StoreError};
use crate::model::{
    NewTask, Task, TaskFilter, TaskId, TaskPatch, UpdateOutcome, normalize_tags,
};

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS tasks (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        raw_input TEXT,
        subject TEXT,
        topic TEXT,
        tags TEXT NOT NULL DEFAULT '[]',
        task_type TEXT NOT NULL,
        status TEXT NOT NULL,
        priority TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        search_text TEXT NOT NULL DEFAULT ''
    )",
    "CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status)",
    "CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at)",
];

const COLUMNS: &str =
    "id, title, raw_input, subject, topic, tags, task_type, status, priority, created_at, updated_at";

const FIND: &str = "
    WHERE (?1 IS NULL OR EXISTS (
            SELECT 1 FROM json_each(tasks.tags) AS t
            WHERE t.value IN (SELECT value FROM json_each(?1))))
      AND (?2 IS NULL OR status = ?2)
      AND (?3 IS NULL OR search_text LIKE ?3 ESCAPE '\\')
    ORDER BY rowid
    LIMIT ?4";

// Existing tags keep their order; new ones are appended once.
const UPDATE: &str = "
    UPDATE tasks SET
        status = COALESCE(?2, status),
        priority = COALESCE(?3, priority),
        tags = (
            SELECT json_group_array(value) FROM (
                SELECT value FROM json_each(tasks.tags)
                UNION ALL
                SELECT value FROM json_each(?4)
                WHERE value NOT IN (SELECT value FROM json_each(tasks.tags))
            )
        ),
        updated_at = ?5
    WHERE id = ?1";

/// SQLite-backed task store
#[derive(Debug, Clone)]
pub struct SqliteTaskStore {
    pool: SqlitePool,
    initialized: Arc<OnceCell<()>>,
}

impl SqliteTaskStore {
    /// Create a store for `url` (e.g. `sqlite://tasks.db?mode=rwc`).
    ///
    /// No connection is opened until the first operation.
    pub fn new(url: &str, pool_size: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .connect_lazy(url)
            .map_err(|err| StoreError::Unavailable(format!("failed to create SQLite pool: {err}")))?;

        Ok(Self::from_pool(pool))
    }

    /// Private in-memory database, mostly for tests.
    ///
    /// Each SQLite connection to `:memory:` is its own database, so the pool
    /// holds exactly one connection and never recycles it.
    pub fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_lazy("sqlite::memory:")
            .map_err(|err| StoreError::Unavailable(format!("failed to create SQLite pool: {err}")))?;

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            initialized: Arc::new(OnceCell::new()),
        }
    }

    async fn ensure_initialized(&self) -> Result<()> {
        self.initialized
            .get_or_try_init(|| async {
                for statement in SCHEMA {
                    sqlx::query(statement).execute(&self.pool).await?;
                }
                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(StoreError::from)
            .map(|_| ())
    }

    fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(value)
            .map(|timestamp| timestamp.with_timezone(&Utc))
            .map_err(|err| StoreError::Corrupt(format!("failed to parse timestamp '{value}': {err}")))
    }

    fn decode_row(row: &SqliteRow) -> Result<Task> {
        let id: String = row.try_get("id")?;
        let tags: String = row.try_get("tags")?;
        let task_type: String = row.try_get("task_type")?;
        let status: String = row.try_get("status")?;
        let priority: String = row.try_get("priority")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        Ok(Task {
            id: TaskId::parse(&id)
                .map_err(|_| StoreError::Corrupt(format!("invalid task id '{id}'")))?,
            title: row.try_get("title")?,
            raw_input: row.try_get("raw_input")?,
            subject: row.try_get("subject")?,
            topic: row.try_get("topic")?,
            tags: serde_json::from_str(&tags)
                .map_err(|err| StoreError::Corrupt(format!("invalid tags for task {id}: {err}")))?,
            task_type: task_type.parse().map_err(StoreError::Corrupt)?,
            status: status.parse().map_err(StoreError::Corrupt)?,
            priority: priority.parse().map_err(StoreError::Corrupt)?,
            created_at: Self::parse_timestamp(&created_at)?,
            updated_at: Self::parse_timestamp(&updated_at)?,
        })
    }
}

/// Lowercased title and topic, matched by text filters.
///
/// SQLite's `lower()` and `LIKE` only fold ASCII, so folding happens here.
fn search_text(title: &str, topic: Option<&str>) -> String {
    let mut text = title.to_lowercase();
    if let Some(topic) = topic {
        text.push('\n');
        text.push_str(&topic.to_lowercase());
    }
    text
}

fn tags_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

/// `%text%` with LIKE wildcards in `text` escaped
fn like_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn create(&self, task: NewTask) -> Result<TaskId> {
        self.ensure_initialized().await?;

        let id = TaskId::new();
        let task = Task::from_new(id, task, Utc::now());

        sqlx::query(&format!(
            "INSERT INTO tasks({COLUMNS}, search_text) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(task.id.to_string())
        .bind(&task.title)
        .bind(&task.raw_input)
        .bind(&task.subject)
        .bind(&task.topic)
        .bind(tags_json(&task.tags))
        .bind(task.task_type.as_str())
        .bind(task.status.as_str())
        .bind(task.priority.as_str())
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .bind(search_text(&task.title, task.topic.as_deref()))
        .execute(&self.pool)
        .await?;

        tracing::debug!(task_id = %id, "task inserted");
        Ok(id)
    }

    async fn find(&self, filter: &TaskFilter, limit: usize) -> Result<Vec<Task>> {
        self.ensure_initialized().await?;

        let tags = (!filter.tags.is_empty()).then(|| tags_json(&filter.tags));
        let status = filter.status.map(|s| s.as_str());
        let text = filter.text.as_deref().map(|t| like_pattern(&t.to_lowercase()));

        let rows = sqlx::query(&format!("SELECT {COLUMNS} FROM tasks {FIND}"))
            .bind(tags)
            .bind(status)
            .bind(text)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::decode_row).collect()
    }

    async fn update(&self, id: &str, patch: TaskPatch) -> Result<UpdateOutcome> {
        let id = TaskId::parse(id)?;
        self.ensure_initialized().await?;

        let result = sqlx::query(UPDATE)
            .bind(id.to_string())
            .bind(patch.status.map(|s| s.as_str()))
            .bind(patch.priority.map(|p| p.as_str()))
            .bind(tags_json(&normalize_tags(&patch.add_tags)))
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;

        // updated_at is always rewritten, so a matched row is a modified row
        let matched = result.rows_affected() > 0;
        Ok(UpdateOutcome {
            matched,
            modified: matched,
        })
    }

    async fn get(&self, id: &TaskId) -> Result<Option<Task>> {
        self.ensure_initialized().await?;

        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM tasks WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::decode_row).transpose()
    }

    async fn health_check(&self) -> bool {
        if self.ensure_initialized().await.is_err() {
            return false;
        }
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}
