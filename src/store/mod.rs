//! Threadsafe Store
//!
//! One SQLite connection behind one non-reentrant mutex. Every statement runs
//! with contention retry. Callers either use the convenience methods here, which
//! lock for a single statement, or take a [`Session`] with [`ThreadsafeStore::lock`]
//! and run several statements under one acquisition.

mod retry;
pub(crate) mod schema;
mod session;

pub use retry::{is_locked, RetryPolicy, DEFAULT_RETRY_DELAY};
pub use session::Session;

use crate::error::StorageError;
use parking_lot::Mutex;
use rusqlite::{Connection, DatabaseName, ToSql};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub struct ThreadsafeStore {
    conn: Mutex<Connection>,
    retry: RetryPolicy,
    path: Option<PathBuf>,
}

impl ThreadsafeStore {
    /// Open (or create) the store file at `path`
    pub fn open(path: &Path, retry: RetryPolicy) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn, retry, Some(path.to_path_buf()))
    }

    /// Open a private in-memory store
    pub fn open_in_memory(retry: RetryPolicy) -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn, retry, None)
    }

    fn from_connection(
        conn: Connection,
        retry: RetryPolicy,
        path: Option<PathBuf>,
    ) -> Result<Self, StorageError> {
        // Contention is handled by `RetryPolicy`, not SQLite's busy handler.
        conn.busy_timeout(Duration::ZERO)?;
        retry.run(|| conn.execute_batch("pragma foreign_keys = on;"))?;
        debug!(path = ?path, "Opened store connection");
        Ok(Self {
            conn: Mutex::new(conn),
            retry,
            path,
        })
    }

    /// Acquire the store lock.
    ///
    /// The lock is not reentrant: calling this again on the same thread while a
    /// session is alive deadlocks. Pass the session down instead.
    pub fn lock(&self) -> Session<'_> {
        Session::new(self.conn.lock(), self.retry)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn execute(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        commit: bool,
    ) -> Result<usize, StorageError> {
        self.lock().execute(sql, params, commit)
    }

    pub fn execute_many<'p, I>(
        &self,
        sql: &str,
        param_sets: I,
        commit: bool,
    ) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = Vec<&'p dyn ToSql>>,
    {
        self.lock().execute_many(sql, param_sets, commit)
    }

    pub fn execute_script(&self, sql: &str, commit: bool) -> Result<(), StorageError> {
        self.lock().execute_script(sql, commit)
    }

    pub fn commit(&self) -> Result<(), StorageError> {
        self.lock().commit()
    }

    /// Copy the live database to `destination` with the online backup API.
    ///
    /// Holds the lock for the duration so no statement interleaves with the copy.
    /// Uncommitted writes are not part of the copy.
    pub fn backup_to(&self, destination: &Path) -> Result<(), StorageError> {
        let session = self.lock();
        self.retry.run(|| {
            session
                .connection()
                .backup(DatabaseName::Main, destination, None)
        })?;
        info!(destination = %destination.display(), "Store copied");
        Ok(())
    }

    /// Commit pending work, then rebuild the database file to reclaim space
    pub fn vacuum(&self) -> Result<(), StorageError> {
        let session = self.lock();
        session.commit()?;
        session.execute_script("vacuum", false)?;
        info!(path = ?self.path, "Store vacuumed");
        Ok(())
    }
}
