//! Executors that resume quantized iterators
//!
//! An [`Executor`] accepts a [`Continuation`] and runs it later, never on
//! the submitting call stack. Three are provided:
//!
//! - [`RunQueue`] - FIFO drained by the host's own event loop
//! - [`SerialQueue`] - a dedicated worker thread
//! - [`TokioExecutor`] - tasks on a tokio runtime

mod queue;
mod runtime;
mod serial;

use std::fmt;
use std::sync::Arc;

use crate::error::SubmitError;
use crate::pacing::Pacing;

pub use queue::RunQueue;
pub use runtime::TokioExecutor;
pub use serial::SerialQueue;

/// Scheduling target for continuations
pub trait Executor: Send + Sync {
    /// Queue `continuation` to run asynchronously
    fn submit(&self, continuation: Continuation) -> Result<(), SubmitError>;

    /// Label used in logs
    fn label(&self) -> &str;
}

/// Something that can run one more quantum
pub(crate) trait Resumable: Send + Sync {
    fn resume(self: Arc<Self>);
}

/// The remaining work of one iterator, handed to an executor
///
/// Carries a snapshot of where the traversal stands so executors and tests
/// can inspect it without running it.
pub struct Continuation {
    task: Arc<dyn Resumable>,
    cursor: usize,
    len: usize,
    pacing: Pacing,
}

impl Continuation {
    pub(crate) fn new(task: Arc<dyn Resumable>, cursor: usize, len: usize, pacing: Pacing) -> Self {
        Self {
            task,
            cursor,
            len,
            pacing,
        }
    }

    /// Index the next quantum starts at
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Length of the underlying sequence
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Elements not yet processed when this continuation was created
    pub fn remaining(&self) -> usize {
        self.len - self.cursor
    }

    pub fn pacing(&self) -> Pacing {
        self.pacing
    }

    /// Run exactly one quantum of the owning iterator
    pub fn run(self) {
        self.task.resume();
    }
}

impl fmt::Debug for Continuation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Continuation")
            .field("cursor", &self.cursor)
            .field("len", &self.len)
            .field("pacing", &self.pacing)
            .finish()
    }
}
