//! Database connection management with pragma configuration.
//!
//! This module handles opening the SQLite database, applying required pragmas
//! for performance and concurrency (WAL mode), and running migrations. The
//! [`ConnectionSlot`] holds the single lazily-opened handle the cache manager
//! works through.

use super::migrations;
use crate::Error;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tokio_rusqlite::Connection;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// Cache database handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations
/// on a background thread.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open a database at the specified path.
    ///
    /// Creates the file if it doesn't exist, applies performance pragmas,
    /// and runs any pending migrations.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    /// Open an in-memory database for testing.
    ///
    /// Creates a temporary in-memory SQLite database with the same
    /// pragma configuration as file-based databases.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::prepare(conn).await
    }

    async fn prepare(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}

/// Where the cache database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    Memory,
}

/// Lazily-opened, replaceable connection.
///
/// The slot lock is held across the open, so concurrent callers coalesce onto
/// a single pending open instead of racing to create several connections.
#[derive(Debug)]
pub struct ConnectionSlot {
    location: StoreLocation,
    handle: Mutex<Option<CacheDb>>,
}

impl ConnectionSlot {
    pub fn new(location: StoreLocation) -> Self {
        Self { location, handle: Mutex::new(None) }
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Return the open connection, opening it first if needed.
    pub async fn get(&self) -> Result<CacheDb, Error> {
        let mut handle = self.handle.lock().await;
        if let Some(db) = handle.as_ref() {
            return Ok(db.clone());
        }

        let db = match &self.location {
            StoreLocation::File(path) => {
                if let Some(parent) = path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| Error::InvalidInput(format!("cannot create {}: {e}", parent.display())))?;
                }
                CacheDb::open(path).await?
            }
            StoreLocation::Memory => CacheDb::open_in_memory().await?,
        };

        tracing::debug!(location = ?self.location, "opened icon cache database");
        *handle = Some(db.clone());
        Ok(db)
    }

    /// Drop the cached handle so the next [`get`](Self::get) reopens.
    ///
    /// Returns whether a handle was actually held.
    pub async fn invalidate(&self) -> bool {
        self.handle.lock().await.take().is_some()
    }

    pub async fn is_open(&self) -> bool {
        self.handle.lock().await.is_some()
    }
}
