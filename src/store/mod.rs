//! Durable storage for repositories, commits and file changes.
//!
//! A single SQLite connection guarded by a mutex. Readers and writers take
//! the lock only for the duration of one statement batch, so diff extraction
//! for several repositories can run in parallel while their writes are
//! serialized.

mod read;
mod write;

use crate::error::{RepostatError, Result};
use crate::model::SCHEMA_VERSION;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;

pub use write::NewRepository;

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(db_path)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;
        debug!(path = %db_path.display(), "opened statistics store");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", true)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize()?;
        Ok(store)
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS repositories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                remote_url TEXT,
                last_scanned_commit TEXT,
                last_scanned_at INTEGER
            );
            CREATE TABLE IF NOT EXISTS commits (
                id TEXT NOT NULL,
                repository_id INTEGER NOT NULL,
                author_name TEXT NOT NULL,
                author_email TEXT NOT NULL,
                message TEXT NOT NULL,
                authored_at INTEGER NOT NULL,
                branch TEXT,
                additions INTEGER NOT NULL,
                deletions INTEGER NOT NULL,
                files_changed INTEGER NOT NULL,
                PRIMARY KEY (repository_id, id),
                FOREIGN KEY (repository_id) REFERENCES repositories(id) ON DELETE CASCADE
            );
            CREATE TABLE IF NOT EXISTS file_changes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                repository_id INTEGER NOT NULL,
                commit_id TEXT NOT NULL,
                file_path TEXT NOT NULL,
                additions INTEGER NOT NULL,
                deletions INTEGER NOT NULL,
                is_binary INTEGER NOT NULL,
                diff_text TEXT NOT NULL,
                FOREIGN KEY (repository_id, commit_id)
                    REFERENCES commits(repository_id, id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_commits_authored_at ON commits(authored_at);
            CREATE INDEX IF NOT EXISTS idx_commits_author ON commits(author_name);
            CREATE INDEX IF NOT EXISTS idx_file_changes_commit ON file_changes(repository_id, commit_id);
            CREATE INDEX IF NOT EXISTS idx_file_changes_path ON file_changes(file_path);
            ",
        )?;
        check_schema_version(&conn)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| RepostatError::Storage("connection lock poisoned".to_string()))
    }
}

fn check_schema_version(conn: &Connection) -> Result<()> {
    let user_version: i64 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;

    if user_version == 0 {
        let set_stmt = format!("PRAGMA user_version = {SCHEMA_VERSION};");
        conn.execute_batch(&set_stmt)?;
    } else if user_version != SCHEMA_VERSION as i64 {
        return Err(RepostatError::Storage(format!(
            "Schema version mismatch: expected {}, found {}",
            SCHEMA_VERSION, user_version
        )));
    }

    Ok(())
}
