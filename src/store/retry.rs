//! Contention retry
//!
//! Another process writing the same store file surfaces as `SQLITE_BUSY` or
//! `SQLITE_LOCKED`. Those are retried forever at a fixed interval; every other
//! error is returned to the caller untouched.

use rusqlite::ErrorCode;
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Default delay between attempts while the store is locked
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Fixed-interval, unbounded retry for lock contention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Run `op` until it returns anything other than a lock-contention error.
    ///
    /// There is no attempt limit. Callers that need a deadline must impose it
    /// themselves.
    pub fn run<T>(&self, mut op: impl FnMut() -> rusqlite::Result<T>) -> rusqlite::Result<T> {
        let mut attempts: u64 = 0;
        loop {
            match op() {
                Err(err) if is_locked(&err) => {
                    attempts += 1;
                    debug!(
                        attempts,
                        delay_ms = self.delay.as_millis() as u64,
                        error = %err,
                        "Store is locked, retrying"
                    );
                    thread::sleep(self.delay);
                }
                result => return result,
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_DELAY)
    }
}

/// Whether an error is transient lock contention on the store file
pub fn is_locked(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if matches!(failure.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}
