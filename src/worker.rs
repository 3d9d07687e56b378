//! Pausable background worker
//!
//! Runs a [`Task`] on its own thread until the task reports completion. Pausing
//! is cooperative: the loop checks the pause latch before and after every
//! iteration, so an iteration in progress always runs to the end.

use crate::error::{ApiError, Result};
use parking_lot::{Condvar, Mutex};
use std::any::Any;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// A unit of background work, advanced one iteration at a time
pub trait Task: Send + 'static {
    /// Do one step of work
    fn iterate(&mut self) -> Result<()>;

    /// Whether there is nothing left to do
    fn complete(&self) -> bool;

    fn on_start(&mut self) {}

    fn on_finish(&mut self) {}
}

/// Shared pause flag
#[derive(Debug, Default)]
struct PauseLatch {
    paused: Mutex<bool>,
    changed: Condvar,
}

impl PauseLatch {
    fn set(&self, paused: bool) {
        *self.paused.lock() = paused;
        self.changed.notify_all();
    }

    fn is_set(&self) -> bool {
        *self.paused.lock()
    }

    fn wait_while_paused(&self) {
        let mut paused = self.paused.lock();
        while *paused {
            self.changed.wait(&mut paused);
        }
    }
}

/// Handle to a running task
pub struct PausableWorker<T: Task> {
    name: String,
    latch: Arc<PauseLatch>,
    handle: Option<JoinHandle<(T, Result<()>)>>,
}

impl<T: Task> PausableWorker<T> {
    /// Start `task` on a new named thread, running
    pub fn spawn(name: impl Into<String>, task: T) -> Result<Self> {
        Self::spawn_with_state(name, task, false)
    }

    /// Start `task` on a new named thread, paused until [`resume`](Self::resume)
    pub fn spawn_paused(name: impl Into<String>, task: T) -> Result<Self> {
        Self::spawn_with_state(name, task, true)
    }

    fn spawn_with_state(name: impl Into<String>, mut task: T, paused: bool) -> Result<Self> {
        let name = name.into();
        let latch = Arc::new(PauseLatch::default());
        latch.set(paused);

        let thread_latch = Arc::clone(&latch);
        let thread_name = name.clone();
        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            let result = run(&mut task, &thread_latch, &thread_name);
            (task, result)
        })?;

        Ok(Self {
            name,
            latch,
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pause(&self) {
        debug!(worker = %self.name, "Pausing");
        self.latch.set(true);
    }

    pub fn resume(&self) {
        debug!(worker = %self.name, "Resuming");
        self.latch.set(false);
    }

    pub fn is_paused(&self) -> bool {
        self.latch.is_set()
    }

    /// Whether the task thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the task to complete and take it back.
    ///
    /// Returns the first error `iterate` produced, if any. A paused worker is
    /// not resumed; joining it blocks until someone else resumes it.
    pub fn join(mut self) -> Result<T> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| ApiError::WorkerPanicked(self.name.clone()))?;
        match handle.join() {
            Ok((task, Ok(()))) => Ok(task),
            Ok((_, Err(err))) => Err(err),
            Err(payload) => Err(ApiError::WorkerPanicked(format!(
                "{}: {}",
                self.name,
                panic_message(payload.as_ref())
            ))),
        }
    }
}

impl<T: Task> Drop for PausableWorker<T> {
    fn drop(&mut self) {
        // A detached worker must not stay parked forever.
        if self.handle.is_some() {
            self.latch.set(false);
        }
    }
}

fn run<T: Task>(task: &mut T, latch: &PauseLatch, name: &str) -> Result<()> {
    info!(worker = name, "Worker started");
    task.on_start();
    let mut iterations: u64 = 0;
    let result = loop {
        if task.complete() {
            break Ok(());
        }
        latch.wait_while_paused();
        if let Err(err) = task.iterate() {
            warn!(worker = name, iterations, error = %err, "Worker stopped on error");
            break Err(err);
        }
        iterations += 1;
        latch.wait_while_paused();
    };
    task.on_finish();
    info!(worker = name, iterations, "Worker finished");
    result
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
