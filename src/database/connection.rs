/*!
 * Database connection management.
 *
 * This module handles SQLite database connection creation, initialization,
 * and provides async-safe access patterns using tokio's spawn_blocking.
 */

use anyhow::{Context, Result};
use log::{debug, info};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::schema;

/// Default database filename
const DEFAULT_DB_FILENAME: &str = "kinolingo.db";

/// Default database directory name under user's data directory
const DEFAULT_DB_DIRNAME: &str = "kinolingo";

/// Database connection wrapper with thread-safe access
#[derive(Clone)]
pub struct DatabaseConnection {
    /// Path to the database file
    db_path: PathBuf,
    /// Thread-safe connection wrapped in Arc<Mutex>
    connection: Arc<Mutex<Connection>>,
}

impl DatabaseConnection {
    /// Create a new database connection at the default location
    pub fn new_default() -> Result<Self> {
        let db_path = Self::default_database_path()?;
        Self::new(&db_path)
    }

    /// Create a new database connection at the specified path
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        info!("Opening database at: {:?}", db_path);

        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open database: {:?}", db_path))?;

        // foreign_keys is a per-connection pragma; cascades depend on it
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        schema::initialize_schema(&conn)?;

        Ok(Self {
            db_path,
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        debug!("Creating in-memory database");

        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;

        schema::initialize_schema(&conn)?;

        Ok(Self {
            db_path: PathBuf::from(":memory:"),
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// Get the default database path
    pub fn default_database_path() -> Result<PathBuf> {
        let base_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

        let db_dir = base_dir.join(DEFAULT_DB_DIRNAME);
        let db_path = db_dir.join(DEFAULT_DB_FILENAME);

        Ok(db_path)
    }

    /// Get the database file path
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Execute a database operation with the connection
    ///
    /// This method acquires the mutex lock and executes the provided closure
    /// with access to the connection. For async contexts, use `execute_async`.
    pub fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .connection
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to acquire database lock: {}", e))?;

        f(&conn)
    }

    /// Execute a database operation asynchronously using spawn_blocking
    ///
    /// This is the preferred method for async contexts as it prevents
    /// blocking the async runtime.
    pub async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| anyhow::anyhow!("Failed to acquire database lock: {}", e))?;

            f(&conn)
        })
        .await
        .context("Database task panicked")?
    }

    /// Begin a transaction and execute operations within it
    ///
    /// The closure's error rolls the transaction back; success commits it.
    pub fn transaction<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> Result<T>,
    {
        let mut conn = self
            .connection
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to acquire database lock: {}", e))?;

        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;

        Ok(result)
    }

    /// Begin an async transaction and execute operations within it
    pub async fn transaction_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&rusqlite::Transaction) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| anyhow::anyhow!("Failed to acquire database lock: {}", e))?;

            let tx = conn.transaction()?;
            let result = f(&tx)?;
            tx.commit()?;

            Ok(result)
        })
        .await
        .context("Database transaction task panicked")?
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DatabaseStats> {
        self.execute(|conn| {
            let film_count: i64 = conn
                .query_row("SELECT COUNT(*) FROM films", [], |row| row.get(0))
                .unwrap_or(0);

            let variant_count: i64 = conn
                .query_row("SELECT COUNT(*) FROM video_variants", [], |row| row.get(0))
                .unwrap_or(0);

            let subtitle_count: i64 = conn
                .query_row("SELECT COUNT(*) FROM subtitles", [], |row| row.get(0))
                .unwrap_or(0);

            let phrase_count: i64 = conn
                .query_row("SELECT COUNT(*) FROM phrases", [], |row| row.get(0))
                .unwrap_or(0);

            // Get file size if not in-memory
            let file_size = if self.db_path.to_string_lossy() != ":memory:" {
                std::fs::metadata(&self.db_path)
                    .map(|m| m.len())
                    .unwrap_or(0)
            } else {
                0
            };

            Ok(DatabaseStats {
                film_count,
                variant_count,
                subtitle_count,
                phrase_count,
                file_size_bytes: file_size,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    /// Number of catalog films
    pub film_count: i64,
    /// Number of transcoded variants
    pub variant_count: i64,
    /// Number of subtitle lines across all films
    pub subtitle_count: i64,
    /// Number of phrases in the global dictionary
    pub phrase_count: i64,
    /// Database file size in bytes
    pub file_size_bytes: u64,
}

impl std::fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Films: {}, Variants: {}, Subtitles: {}, Phrases: {}, Size: {} KB",
            self.film_count,
            self.variant_count,
            self.subtitle_count,
            self.phrase_count,
            self.file_size_bytes / 1024
        )
    }
}
