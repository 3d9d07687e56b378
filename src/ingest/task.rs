//! Ingestion as a background task

use super::{IngestReport, IngestStream};
use crate::error::Result;
use crate::worker::Task;

/// Drives an [`IngestStream`] one path per iteration, so a pause takes effect
/// between paths
pub struct IngestTask {
    stream: IngestStream,
    done: bool,
}

impl IngestTask {
    pub fn new(stream: IngestStream) -> Self {
        Self {
            stream,
            done: false,
        }
    }

    pub fn report(&self) -> IngestReport {
        self.stream.report()
    }
}

impl Task for IngestTask {
    fn iterate(&mut self) -> Result<()> {
        match self.stream.next() {
            Some(Ok(_)) => Ok(()),
            Some(Err(err)) => {
                // The worker stops on an error.
                self.stream.close();
                self.done = true;
                Err(err)
            }
            None => {
                self.done = true;
                Ok(())
            }
        }
    }

    fn complete(&self) -> bool {
        self.done
    }
}
