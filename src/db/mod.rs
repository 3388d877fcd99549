pub mod models;
pub mod rest;

use async_trait::async_trait;
use models::{ChatTurn, NewChatTurn};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Append-only chat history.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Insert one turn. Not idempotent: a repeated call stores a second row.
    async fn append(&self, turn: &NewChatTurn) -> Result<(), StoreError>;

    /// Turns for `user_id`, optionally narrowed to one document, newest first.
    async fn query(
        &self,
        user_id: &str,
        document_id: Option<&str>,
    ) -> Result<Vec<ChatTurn>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("database lock poisoned")]
    LockPoisoned,
    #[error("database task failed: {0}")]
    Task(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Http(err.without_url())
    }
}

/// Embedded SQLite store. Clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;

            CREATE TABLE IF NOT EXISTS chat_history (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                document_id TEXT,
                question TEXT NOT NULL,
                answer TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            );

            CREATE INDEX IF NOT EXISTS idx_chat_history_user
                ON chat_history (user_id, document_id, created_at);
            ",
        )?;
        Ok(())
    }

    // ── Chat history ──

    pub fn insert_turn(&self, turn: &NewChatTurn) -> Result<ChatTurn, StoreError> {
        let conn = self.lock()?;
        let id = uuid::Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO chat_history (id, user_id, document_id, question, answer) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![id, turn.user_id, turn.document_id, turn.question, turn.answer],
        )?;
        let row = conn.query_row(
            "SELECT user_id, document_id, question, answer, created_at FROM chat_history WHERE id = ?1",
            params![id],
            row_to_turn,
        )?;
        Ok(row)
    }

    pub fn list_turns(
        &self,
        user_id: &str,
        document_id: Option<&str>,
    ) -> Result<Vec<ChatTurn>, StoreError> {
        let conn = self.lock()?;
        // rowid breaks ties between turns stored within the same millisecond.
        let mut stmt = conn.prepare(
            "SELECT user_id, document_id, question, answer, created_at FROM chat_history
             WHERE user_id = ?1 AND (?2 IS NULL OR document_id = ?2)
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![user_id, document_id], row_to_turn)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn row_to_turn(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatTurn> {
    Ok(ChatTurn {
        user_id: row.get(0)?,
        document_id: row.get(1)?,
        question: row.get(2)?,
        answer: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[async_trait]
impl ChatStore for Database {
    async fn append(&self, turn: &NewChatTurn) -> Result<(), StoreError> {
        let db = self.clone();
        let turn = turn.clone();
        run_blocking(move || db.insert_turn(&turn).map(|_| ())).await
    }

    async fn query(
        &self,
        user_id: &str,
        document_id: Option<&str>,
    ) -> Result<Vec<ChatTurn>, StoreError> {
        let db = self.clone();
        let user_id = user_id.to_string();
        let document_id = document_id.map(str::to_string);
        run_blocking(move || db.list_turns(&user_id, document_id.as_deref())).await
    }
}

/// SQLite calls block, so they run on the blocking pool.
async fn run_blocking<T, F>(f: F) -> Result<T, StoreError>
where
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
}
