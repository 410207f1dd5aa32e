//! Dedicated worker thread executor

use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{Continuation, Executor};
use crate::error::SubmitError;

type Job = Box<dyn FnOnce() + Send>;

/// Serial executor backed by one named OS thread
///
/// Jobs run one at a time in submission order. Dropping the queue closes
/// it and waits for already queued jobs to finish.
pub struct SerialQueue {
    label: String,
    tx: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Option<JoinHandle<()>>,
}

impl SerialQueue {
    /// Spawn the worker thread
    pub fn new(label: impl Into<String>) -> std::io::Result<Self> {
        let label = label.into();
        debug!(%label, "SerialQueue::new: called");
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        let thread_label = label.clone();
        let worker = thread::Builder::new().name(label.clone()).spawn(move || {
            while let Some(job) = rx.blocking_recv() {
                job();
            }
            debug!(label = %thread_label, "SerialQueue: worker exiting");
        })?;

        Ok(Self {
            label,
            tx: Mutex::new(Some(tx)),
            worker: Some(worker),
        })
    }

    /// Queue an arbitrary closure on the worker
    pub fn dispatch(&self, f: impl FnOnce() + Send + 'static) -> Result<(), SubmitError> {
        self.send(Box::new(f))
    }

    /// Stop accepting work; queued jobs still run
    pub fn close(&self) {
        debug!(label = %self.label, "SerialQueue::close: called");
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn send(&self, job: Job) -> Result<(), SubmitError> {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let closed = || SubmitError::Closed {
            label: self.label.clone(),
        };
        guard.as_ref().ok_or_else(closed)?.send(job).map_err(|_| closed())
    }
}

impl Executor for SerialQueue {
    fn submit(&self, continuation: Continuation) -> Result<(), SubmitError> {
        self.send(Box::new(move || continuation.run()))
    }

    fn label(&self) -> &str {
        &self.label
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        self.close();
        if let Some(worker) = self.worker.take() {
            // Joining from the worker itself would never return
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                warn!(label = %self.label, "SerialQueue: worker panicked");
            }
        }
    }
}
