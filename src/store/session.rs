//! Locked access to the shared connection
//!
//! A `Session` is the store mutex held by the current thread. Everything that
//! needs several statements to stay consistent (parent resolution, ingestion,
//! read-then-write sequences) runs through one session. Session methods never
//! lock, so holding a session is how a caller says "I already own the lock".

use super::retry::RetryPolicy;
use crate::error::StorageError;
use parking_lot::MutexGuard;
use rusqlite::{ffi, Connection, OptionalExtension, Row, ToSql};
use tracing::warn;

pub struct Session<'a> {
    conn: MutexGuard<'a, Connection>,
    retry: RetryPolicy,
}

impl<'a> Session<'a> {
    pub(crate) fn new(conn: MutexGuard<'a, Connection>, retry: RetryPolicy) -> Self {
        Self { conn, retry }
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Whether a write transaction is currently open on the connection
    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }

    // `immediate` takes the write lock up front. A deferred transaction that has
    // already read would hold a shared lock while retrying its first write, and
    // the other writer could never commit.
    fn begin_if_needed(&self) -> Result<(), StorageError> {
        if self.conn.is_autocommit() {
            self.retry.run(|| self.conn.execute_batch("begin immediate"))?;
        }
        Ok(())
    }

    /// Execute one write statement, returning the number of changed rows
    pub fn execute(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        commit: bool,
    ) -> Result<usize, StorageError> {
        self.begin_if_needed()?;
        let changed = self
            .retry
            .run(|| self.conn.prepare_cached(sql)?.execute(params))?;
        if commit {
            self.commit()?;
        }
        Ok(changed)
    }

    /// Execute one write statement once per parameter set
    pub fn execute_many<'p, I>(
        &self,
        sql: &str,
        param_sets: I,
        commit: bool,
    ) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = Vec<&'p dyn ToSql>>,
    {
        self.begin_if_needed()?;
        let mut changed = 0;
        for params in param_sets {
            changed += self
                .retry
                .run(|| self.conn.prepare_cached(sql)?.execute(&params[..]))?;
        }
        if commit {
            self.commit()?;
        }
        Ok(changed)
    }

    /// Execute a multi-statement script outside of any implicit transaction
    pub fn execute_script(&self, sql: &str, commit: bool) -> Result<(), StorageError> {
        self.retry.run(|| self.conn.execute_batch(sql))?;
        if commit {
            self.commit()?;
        }
        Ok(())
    }

    /// Insert a row into a table with a uniqueness constraint.
    ///
    /// Returns the new row id, or `None` if the row already exists.
    pub fn insert_unique(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
    ) -> Result<Option<i64>, StorageError> {
        self.begin_if_needed()?;
        match self
            .retry
            .run(|| self.conn.prepare_cached(sql)?.execute(params))
        {
            Ok(_) => Ok(Some(self.conn.last_insert_rowid())),
            Err(err) if is_duplicate(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Commit the open transaction, if any
    pub fn commit(&self) -> Result<(), StorageError> {
        if !self.conn.is_autocommit() {
            self.retry.run(|| self.conn.execute_batch("commit"))?;
        }
        Ok(())
    }

    /// Open a write transaction now instead of at the first write.
    ///
    /// Scripts run after this join the transaction, so DDL can be made atomic.
    pub fn begin(&self) -> Result<(), StorageError> {
        self.begin_if_needed()
    }

    /// Run `op` under a savepoint of the write transaction.
    ///
    /// If `op` fails, its writes are undone and the rest of the transaction is
    /// kept.
    pub fn savepoint<T, E>(&self, name: &str, op: impl FnOnce(&Self) -> Result<T, E>) -> Result<T, E>
    where
        E: From<StorageError>,
    {
        self.begin_if_needed()?;
        self.execute_script(&format!("savepoint {}", name), false)?;
        match op(self) {
            Ok(value) => {
                self.execute_script(&format!("release {}", name), false)?;
                Ok(value)
            }
            Err(err) => {
                let undo = format!("rollback to {name}; release {name}");
                if let Err(undo_err) = self.execute_script(&undo, false) {
                    warn!(savepoint = name, error = %undo_err, "Could not roll back savepoint");
                }
                Err(err)
            }
        }
    }

    /// Discard the open transaction, if any
    pub fn rollback(&self) -> Result<(), StorageError> {
        if !self.conn.is_autocommit() {
            self.retry.run(|| self.conn.execute_batch("rollback"))?;
        }
        Ok(())
    }

    /// Run a read query and map every row
    pub fn query_rows<T, F>(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        mut map: F,
    ) -> Result<Vec<T>, StorageError>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let rows = self.retry.run(|| {
            let mut stmt = self.conn.prepare_cached(sql)?;
            let mapped = stmt.query_map(params, &mut map)?;
            mapped.collect::<rusqlite::Result<Vec<T>>>()
        })?;
        Ok(rows)
    }

    /// Run a read query expected to return at most one row
    pub fn query_optional<T, F>(
        &self,
        sql: &str,
        params: &[&dyn ToSql],
        mut map: F,
    ) -> Result<Option<T>, StorageError>
    where
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let row = self.retry.run(|| {
            self.conn
                .prepare_cached(sql)?
                .query_row(params, &mut map)
                .optional()
        })?;
        Ok(row)
    }
}

/// Whether an insert failed because the row is already present
pub(crate) fn is_duplicate(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}
