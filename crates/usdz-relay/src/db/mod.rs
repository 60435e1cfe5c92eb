//! Optional SQLite job store.
//!
//! A single rusqlite connection behind a `Mutex`; the scheduler writes one row
//! per state change, so contention is limited to the dispatcher thread and
//! whoever inspects jobs.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

pub mod error;
pub mod job_repo;
pub mod migrations;

pub use error::DatabaseError;

/// Another process reading the job table may briefly hold the write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Cloneable handle to the job store.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    location: Option<PathBuf>,
}

impl Database {
    /// Opens or creates the store at `path`, creating parent directories and
    /// applying pending migrations. The file uses WAL journaling so it can be
    /// read while the relay is running.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| DatabaseError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        let db = Self::prepare(conn, Some(path.to_path_buf()))?;

        log::info!("Job store opened at {}", path.display());
        Ok(db)
    }

    /// Store that lives as long as the handle.
    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::prepare(Connection::open_in_memory()?, None)
    }

    fn prepare(conn: Connection, location: Option<PathBuf>) -> Result<Self, DatabaseError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        migrations::run_all(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            location,
        })
    }

    /// File backing the store, `None` for in-memory stores.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }

    /// Runs `f` with exclusive access to the connection.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let conn = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&conn)
    }
}

/// `<platform data dir>/usdz-relay/jobs.db`, if the platform has one.
pub fn default_database_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("usdz-relay").join("jobs.db"))
}
