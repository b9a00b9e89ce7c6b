/*!
 * SQLite connection handling for the session store.
 *
 * rusqlite is blocking, so every query runs on tokio's blocking pool while
 * holding the single shared connection.
 */

use log::info;
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::schema;
use crate::errors::StorageError;

const APP_DIR: &str = "dualsub";
const DB_FILE: &str = "sessions.db";

/// Shared handle to a migrated SQLite database
#[derive(Clone)]
pub struct DatabaseConnection {
    path: PathBuf,
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConnection").field("path", &self.path).finish()
    }
}

impl DatabaseConnection {
    /// Open the database under the user data directory
    pub fn new_default() -> Result<Self, StorageError> {
        Self::new(Self::default_database_path()?)
    }

    /// Open or create the database file at `path`
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening session store at {}", path.display());
        let mut conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        schema::migrate(&mut conn)?;

        Ok(Self::wrap(path, conn))
    }

    /// Private in-memory database
    pub fn new_in_memory() -> Result<Self, StorageError> {
        let mut conn = Connection::open_in_memory()?;
        schema::migrate(&mut conn)?;
        Ok(Self::wrap(PathBuf::from(":memory:"), conn))
    }

    fn wrap(path: PathBuf, conn: Connection) -> Self {
        Self {
            path,
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// `<data dir>/dualsub/sessions.db`
    pub fn default_database_path() -> Result<PathBuf, StorageError> {
        let base = dirs::data_local_dir().or_else(dirs::data_dir).ok_or_else(|| {
            StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no user data directory on this platform",
            ))
        })?;

        Ok(base.join(APP_DIR).join(DB_FILE))
    }

    /// Location of the database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against the connection on the blocking pool
    pub async fn with_conn<F, T>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || f(&conn.lock()))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }
}
