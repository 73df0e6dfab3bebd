//! SQLite-backed task store.
//!
//! Each task is one row; `save` rewrites the full record in a single
//! statement, so a concurrent reader never observes a partially written
//! task. WAL mode keeps independent tasks from blocking each other.

use super::{Stage, Task, TaskError};
use crate::config::{AsrEngine, RenderEngine};
use crate::error::{ErrorKind, RecastError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Parameters for creating a fresh task.
#[derive(Debug, Clone)]
pub struct NewTask {
    /// Original input reference (file path or remote URL).
    pub source: String,
    /// Display name.
    pub name: String,
    /// ASR engine, fixed for the lifetime of the task.
    pub asr_engine: AsrEngine,
    /// Render engine, fixed for the lifetime of the task.
    pub render_engine: RenderEngine,
}

/// Trait for task store implementations.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Create and durably persist a fresh task at `Created`.
    async fn create(&self, new: NewTask) -> Result<Task>;

    /// Load a task by id. Fails with `NotFound` if the id is absent.
    async fn load(&self, id: Uuid) -> Result<Task>;

    /// Overwrite the full record for `task.id`.
    async fn save(&self, task: &Task) -> Result<()>;

    /// All tasks, most recently created first.
    async fn list(&self) -> Result<Vec<Task>>;

    /// Delete a task by id. Fails with `NotFound` if the id is absent.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    stage TEXT NOT NULL,
    source TEXT NOT NULL,
    asr_engine TEXT NOT NULL,
    render_engine TEXT NOT NULL,
    media_path TEXT,
    transcript TEXT,
    asr_task_id TEXT,
    script TEXT,
    audio_path TEXT,
    video_path TEXT,
    error_kind TEXT,
    error_message TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);
"#;

/// SQLite-based task store.
pub struct SqliteTaskStore {
    conn: Mutex<Connection>,
}

impl SqliteTaskStore {
    /// Open (or create) a task store at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized task store at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory task store (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RecastError::Unrecoverable(format!("Task store lock poisoned: {}", e)))
    }

    fn write_row(conn: &Connection, task: &Task) -> Result<()> {
        conn.execute(
            r#"
            INSERT OR REPLACE INTO tasks
            (id, name, stage, source, asr_engine, render_engine, media_path, transcript,
             asr_task_id, script, audio_path, video_path, error_kind, error_message,
             created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                task.id.to_string(),
                task.name,
                task.stage.to_string(),
                task.source,
                task.asr_engine.to_string(),
                task.render_engine.to_string(),
                task.media_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
                task.transcript,
                task.asr_task_id,
                task.script,
                task.audio_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
                task.video_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
                task.error.as_ref().map(|e| e.kind.to_string()),
                task.error.as_ref().map(|e| e.message.clone()),
                task.created_at.to_rfc3339(),
                task.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

/// Raw row as read from SQLite, before field parsing.
struct TaskRow {
    id: String,
    name: String,
    stage: String,
    source: String,
    asr_engine: String,
    render_engine: String,
    media_path: Option<String>,
    transcript: Option<String>,
    asr_task_id: Option<String>,
    script: Option<String>,
    audio_path: Option<String>,
    video_path: Option<String>,
    error_kind: Option<String>,
    error_message: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TaskRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            stage: row.get("stage")?,
            source: row.get("source")?,
            asr_engine: row.get("asr_engine")?,
            render_engine: row.get("render_engine")?,
            media_path: row.get("media_path")?,
            transcript: row.get("transcript")?,
            asr_task_id: row.get("asr_task_id")?,
            script: row.get("script")?,
            audio_path: row.get("audio_path")?,
            video_path: row.get("video_path")?,
            error_kind: row.get("error_kind")?,
            error_message: row.get("error_message")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_task(self) -> Result<Task> {
        let corrupt = |what: &str, detail: String| {
            RecastError::Unrecoverable(format!("Corrupt task record ({}): {}", what, detail))
        };

        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt("id", e.to_string()))?;
        let stage: Stage = self.stage.parse().map_err(|e| corrupt("stage", e))?;
        let asr_engine: AsrEngine = self
            .asr_engine
            .parse()
            .map_err(|e| corrupt("asr_engine", e))?;
        let render_engine: RenderEngine = self
            .render_engine
            .parse()
            .map_err(|e| corrupt("render_engine", e))?;

        let error = match (self.error_kind, self.error_message) {
            (Some(kind), Some(message)) => Some(TaskError {
                kind: kind
                    .parse::<ErrorKind>()
                    .map_err(|e| corrupt("error_kind", e))?,
                message,
            }),
            _ => None,
        };

        let parse_ts = |s: &str, what: &str| -> Result<DateTime<Utc>> {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| corrupt(what, e.to_string()))
        };

        Ok(Task {
            id,
            name: self.name,
            stage,
            source: self.source,
            asr_engine,
            render_engine,
            media_path: self.media_path.map(PathBuf::from),
            transcript: self.transcript,
            asr_task_id: self.asr_task_id,
            script: self.script,
            audio_path: self.audio_path.map(PathBuf::from),
            video_path: self.video_path.map(PathBuf::from),
            error,
            created_at: parse_ts(&self.created_at, "created_at")?,
            updated_at: parse_ts(&self.updated_at, "updated_at")?,
        })
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    #[instrument(skip(self), fields(source = %new.source))]
    async fn create(&self, new: NewTask) -> Result<Task> {
        let task = Task::new(new.source, new.name, new.asr_engine, new.render_engine);
        let conn = self.lock()?;
        Self::write_row(&conn, &task)?;
        info!("Created task {}", task.id);
        Ok(task)
    }

    async fn load(&self, id: Uuid) -> Result<Task> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id.to_string()], TaskRow::from_row)?;

        match rows.next() {
            Some(row) => row?.into_task(),
            None => Err(RecastError::NotFound(id.to_string())),
        }
    }

    #[instrument(skip(self, task), fields(task_id = %task.id, stage = %task.stage))]
    async fn save(&self, task: &Task) -> Result<()> {
        let conn = self.lock()?;
        Self::write_row(&conn, task)?;
        debug!("Saved task {}", task.id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Task>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT * FROM tasks ORDER BY created_at DESC, id DESC")?;
        let rows = stmt.query_map([], TaskRow::from_row)?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.into_task()?);
        }
        Ok(tasks)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let conn = self.lock()?;
        let deleted = conn.execute("DELETE FROM tasks WHERE id = ?1", params![id.to_string()])?;
        if deleted == 0 {
            return Err(RecastError::NotFound(id.to_string()));
        }
        info!("Deleted task {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::StageOutput;

    fn new_task() -> NewTask {
        NewTask {
            source: "https://example.com/clip.mp4".into(),
            name: "Clip".into(),
            asr_engine: AsrEngine::DashScope,
            render_engine: RenderEngine::Mux,
        }
    }

    #[tokio::test]
    async fn test_create_then_load() {
        let store = SqliteTaskStore::in_memory().unwrap();
        let created = store.create(new_task()).await.unwrap();

        let loaded = store.load(created.id).await.unwrap();
        assert_eq!(loaded.id, created.id);
        assert_eq!(loaded.stage, Stage::Created);
        assert_eq!(loaded.source, created.source);
        assert_eq!(loaded.created_at, created.created_at);
    }

    #[tokio::test]
    async fn test_save_round_trip_preserves_all_fields() {
        let store = SqliteTaskStore::in_memory().unwrap();
        let mut task = store.create(new_task()).await.unwrap();

        task.advance(
            Stage::Transcribed,
            StageOutput {
                media_path: Some(PathBuf::from("/tmp/audio.mp3")),
                transcript: Some("hello world".into()),
                asr_task_id: Some("volc-123".into()),
                ..Default::default()
            },
        );
        task.fail(ErrorKind::Transient, "rate limited");
        store.save(&task).await.unwrap();

        let loaded = store.load(task.id).await.unwrap();
        assert_eq!(loaded.stage, Stage::Failed);
        assert_eq!(loaded.transcript.as_deref(), Some("hello world"));
        assert_eq!(loaded.asr_task_id.as_deref(), Some("volc-123"));
        assert_eq!(
            loaded.media_path.as_deref(),
            Some(Path::new("/tmp/audio.mp3"))
        );
        let err = loaded.error.unwrap();
        assert_eq!(err.kind, ErrorKind::Transient);
        assert_eq!(err.message, "rate limited");
    }

    #[tokio::test]
    async fn test_load_unknown_id_is_not_found() {
        let store = SqliteTaskStore::in_memory().unwrap();
        let err = store.load(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RecastError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_then_load_is_not_found() {
        let store = SqliteTaskStore::in_memory().unwrap();
        let task = store.create(new_task()).await.unwrap();

        store.delete(task.id).await.unwrap();
        let err = store.load(task.id).await.unwrap_err();
        assert!(matches!(err, RecastError::NotFound(_)));

        let err = store.delete(task.id).await.unwrap_err();
        assert!(matches!(err, RecastError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = SqliteTaskStore::in_memory().unwrap();
        let first = store.create(new_task()).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = store.create(new_task()).await.unwrap();

        let tasks = store.list().await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, second.id);
        assert_eq!(tasks[1].id, first.id);
    }

    #[tokio::test]
    async fn test_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.db");

        let id = {
            let store = SqliteTaskStore::new(&path).unwrap();
            store.create(new_task()).await.unwrap().id
        };

        let store = SqliteTaskStore::new(&path).unwrap();
        let loaded = store.load(id).await.unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.stage, Stage::Created);
    }

    #[tokio::test]
    async fn test_concurrent_saves_do_not_interfere() {
        let store = std::sync::Arc::new(SqliteTaskStore::in_memory().unwrap());
        let a = store.create(new_task()).await.unwrap();
        let b = store.create(new_task()).await.unwrap();

        let (store_a, store_b) = (store.clone(), store.clone());
        let (mut ta, mut tb) = (a.clone(), b.clone());
        let ha = tokio::spawn(async move {
            for i in 0..20 {
                ta.transcript = Some(format!("a-{}", i));
                store_a.save(&ta).await.unwrap();
            }
        });
        let hb = tokio::spawn(async move {
            for i in 0..20 {
                tb.transcript = Some(format!("b-{}", i));
                store_b.save(&tb).await.unwrap();
            }
        });
        ha.await.unwrap();
        hb.await.unwrap();

        let la = store.load(a.id).await.unwrap();
        let lb = store.load(b.id).await.unwrap();
        assert_eq!(la.transcript.as_deref(), Some("a-19"));
        assert_eq!(lb.transcript.as_deref(), Some("b-19"));
    }
}
