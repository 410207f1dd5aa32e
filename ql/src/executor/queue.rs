//! Host-drained FIFO queue

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use tracing::debug;

use super::{Continuation, Executor};
use crate::error::SubmitError;

/// Work waiting in a [`RunQueue`]
enum Job {
    Resume(Continuation),
    Call(Box<dyn FnOnce() + Send>),
}

impl Job {
    fn run(self) {
        match self {
            Self::Resume(continuation) => continuation.run(),
            Self::Call(f) => f(),
        }
    }
}

/// FIFO executor drained explicitly by its owner
///
/// Nothing runs until the host calls [`RunQueue::run_next`] or
/// [`RunQueue::run_until_idle`], typically once per turn of its event loop.
/// Jobs run in submission order on the draining thread.
pub struct RunQueue {
    label: String,
    jobs: Mutex<VecDeque<Job>>,
}

static MAIN: OnceLock<Arc<RunQueue>> = OnceLock::new();

impl RunQueue {
    pub fn new(label: impl Into<String>) -> Self {
        let label = label.into();
        debug!(%label, "RunQueue::new: called");
        Self {
            label,
            jobs: Mutex::new(VecDeque::new()),
        }
    }

    /// Process-wide default executor for new iterators
    pub fn main() -> Arc<RunQueue> {
        Arc::clone(MAIN.get_or_init(|| Arc::new(RunQueue::new("main"))))
    }

    fn jobs(&self) -> MutexGuard<'_, VecDeque<Job>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an arbitrary closure behind any pending work
    pub fn dispatch(&self, f: impl FnOnce() + Send + 'static) {
        self.jobs().push_back(Job::Call(Box::new(f)));
    }

    /// Pending job count
    pub fn len(&self) -> usize {
        self.jobs().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs().is_empty()
    }

    /// Run the oldest job; false if the queue was empty
    pub fn run_next(&self) -> bool {
        // Pop before running so the job can queue more work
        let job = self.jobs().pop_front();
        match job {
            Some(job) => {
                job.run();
                true
            }
            None => false,
        }
    }

    /// Run jobs until the queue is empty, including ones queued meanwhile
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.run_next() {
            ran += 1;
        }
        debug!(label = %self.label, ran, "RunQueue::run_until_idle: drained");
        ran
    }
}

impl Executor for RunQueue {
    fn submit(&self, continuation: Continuation) -> Result<(), SubmitError> {
        self.jobs().push_back(Job::Resume(continuation));
        Ok(())
    }

    fn label(&self) -> &str {
        &self.label
    }
}
