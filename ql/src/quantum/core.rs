//! QuantizedIterator implementation

use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::LoopError;
use crate::executor::{Continuation, Executor, Resumable, RunQueue};
use crate::pacing::Pacing;
use crate::sequence::IndexedSequence;

use super::state::{LoopState, Phase, PhaseCell, Progress};

type Routine<T> = Box<dyn FnMut(&T) + Send>;
type Callback = Box<dyn FnOnce() + Send>;

/// What a single quantum accomplished
struct QuantumReport {
    processed: usize,
    exhausted: bool,
}

/// State shared between the owner's handle and pending continuations
struct Shared<S: IndexedSequence> {
    sequence: S,
    pacing: Pacing,

    /// Held for the whole quantum, so quanta never overlap
    routine: Mutex<Routine<S::Item>>,

    /// Next unprocessed index, only written while `routine` is locked
    cursor: AtomicUsize,
    quanta: AtomicU64,
    phase: PhaseCell,

    executor: RwLock<Arc<dyn Executor>>,
    on_done: Mutex<Option<Callback>>,
    on_cancel: Mutex<Option<Callback>>,
}

/// Cooperative traversal of a sequence, one quantum per `run()`
///
/// Each quantum invokes the routine for a bounded run of elements, in index
/// order, on the calling thread, then hands a [`Continuation`] to the
/// executor and returns. The handle is cheap to clone; clones drive and
/// observe the same traversal, so `cancel()` may be called from any thread.
pub struct QuantizedIterator<S: IndexedSequence> {
    shared: Arc<Shared<S>>,
}

impl<S: IndexedSequence> Clone for QuantizedIterator<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: IndexedSequence> QuantizedIterator<S> {
    /// Create an iterator resuming on [`RunQueue::main`]
    pub fn new<F>(sequence: S, pacing: Pacing, routine: F) -> Self
    where
        F: FnMut(&S::Item) + Send + 'static,
    {
        debug!(len = sequence.len(), %pacing, "QuantizedIterator::new: called");
        let executor: Arc<dyn Executor> = RunQueue::main();
        Self {
            shared: Arc::new(Shared {
                sequence,
                pacing,
                routine: Mutex::new(Box::new(routine)),
                cursor: AtomicUsize::new(0),
                quanta: AtomicU64::new(0),
                phase: PhaseCell::new(),
                executor: RwLock::new(executor),
                on_done: Mutex::new(None),
                on_cancel: Mutex::new(None),
            }),
        }
    }

    /// Builder form of [`set_executor`](Self::set_executor)
    pub fn with_executor(self, executor: Arc<dyn Executor>) -> Result<Self, LoopError> {
        self.set_executor(executor)?;
        Ok(self)
    }

    /// Replace the executor continuations are submitted to
    ///
    /// Only allowed before the first `run()`.
    pub fn set_executor(&self, executor: Arc<dyn Executor>) -> Result<(), LoopError> {
        debug!(label = executor.label(), "QuantizedIterator::set_executor: called");
        let mut slot = self.shared.executor.write().unwrap_or_else(PoisonError::into_inner);
        let state = self.state();
        if state != LoopState::Created {
            debug!(%state, "QuantizedIterator::set_executor: already started, rejecting");
            return Err(LoopError::AlreadyStarted { state });
        }
        *slot = executor;
        Ok(())
    }

    /// Callback fired once, on the thread that completes the traversal
    pub fn on_done(&self, f: impl FnOnce() + Send + 'static) {
        *lock(&self.shared.on_done) = Some(Box::new(f));
    }

    /// Callback fired once, on the thread that calls `cancel()`
    pub fn on_cancel(&self, f: impl FnOnce() + Send + 'static) {
        *lock(&self.shared.on_cancel) = Some(Box::new(f));
    }

    /// Execute one quantum; no-op once done or canceled
    pub fn run(&self) {
        self.shared.quantum();
    }

    /// Stop the traversal before its next quantum
    ///
    /// Returns true only for the call that canceled. Once the final element
    /// has been dispatched completion wins and this returns false.
    pub fn cancel(&self) -> bool {
        debug!(cursor = self.cursor(), "QuantizedIterator::cancel: called");
        if !self.shared.phase.cancel() {
            debug!(state = %self.state(), "QuantizedIterator::cancel: nothing to cancel");
            return false;
        }
        debug!(cursor = self.cursor(), "QuantizedIterator::cancel: canceled");
        fire(&self.shared.on_cancel);
        true
    }

    pub fn is_done(&self) -> bool {
        self.state() == LoopState::Done
    }

    pub fn is_canceled(&self) -> bool {
        self.state() == LoopState::Canceled
    }

    pub fn state(&self) -> LoopState {
        self.shared.phase.load().observed()
    }

    /// Index of the next unprocessed element
    pub fn cursor(&self) -> usize {
        self.shared.cursor.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.shared.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.sequence.is_empty()
    }

    /// Quanta that processed at least one element
    pub fn quanta(&self) -> u64 {
        self.shared.quanta.load(Ordering::Acquire)
    }

    pub fn pacing(&self) -> Pacing {
        self.shared.pacing
    }

    pub fn progress(&self) -> Progress {
        Progress {
            cursor: self.cursor(),
            len: self.len(),
            quanta: self.quanta(),
            state: self.state(),
        }
    }
}

impl<S: IndexedSequence> fmt::Debug for QuantizedIterator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuantizedIterator")
            .field("pacing", &self.pacing())
            .field("progress", &self.progress())
            .finish()
    }
}

impl<S: IndexedSequence> Shared<S> {
    fn quantum(self: &Arc<Self>) {
        if self.phase.load().observed().is_terminal() || !self.phase.start() {
            debug!(phase = ?self.phase.load(), "QuantizedIterator::run: not runnable, skipping");
            return;
        }

        let mut routine = lock(&self.routine);
        // A quantum that held the lock before us may have finished or been canceled
        if self.phase.load() != Phase::Running {
            debug!(phase = ?self.phase.load(), "QuantizedIterator::run: stopped while waiting, skipping");
            return;
        }

        let len = self.sequence.len();
        let start = self.cursor.load(Ordering::Acquire);
        let report = match self.pacing {
            Pacing::FixedCount(step) => self.process_count(&mut routine, start, len, step.get()),
            Pacing::TimeBudget(budget) => self.process_budget(&mut routine, start, len, budget),
        };
        if report.processed > 0 {
            self.quanta.fetch_add(1, Ordering::AcqRel);
        }
        drop(routine);

        debug!(
            start,
            processed = report.processed,
            len,
            exhausted = report.exhausted,
            "QuantizedIterator::run: quantum finished"
        );

        if report.exhausted {
            self.complete();
        } else {
            self.resubmit(len);
        }
    }

    fn process_count(&self, routine: &mut Routine<S::Item>, start: usize, len: usize, step: usize) -> QuantumReport {
        let end = start.saturating_add(step).min(len);
        for index in start..end {
            self.dispatch(routine, index, len);
        }
        QuantumReport {
            processed: end - start,
            exhausted: end == len,
        }
    }

    fn process_budget(
        &self,
        routine: &mut Routine<S::Item>,
        start: usize,
        len: usize,
        budget: Duration,
    ) -> QuantumReport {
        let started = Instant::now();
        let mut index = start;
        while index < len {
            self.dispatch(routine, index, len);
            index += 1;
            if index < len && started.elapsed() >= budget {
                return QuantumReport {
                    processed: index - start,
                    exhausted: false,
                };
            }
        }
        QuantumReport {
            processed: index - start,
            exhausted: true,
        }
    }

    /// Invoke the routine for one element and advance the cursor
    fn dispatch(&self, routine: &mut Routine<S::Item>, index: usize, len: usize) {
        // Claim completion first; a cancel() from here on loses
        let _claim = (index + 1 == len && self.phase.seal()).then(|| Unseal(&self.phase));
        routine(self.sequence.at(index));
        self.cursor.store(index + 1, Ordering::Release);
    }

    fn complete(&self) {
        // Empty sequences reach here without dispatching, so seal now
        self.phase.seal();
        if self.phase.finish() {
            debug!(len = self.sequence.len(), "QuantizedIterator::run: done");
            fire(&self.on_done);
        } else {
            debug!("QuantizedIterator::run: canceled before completion");
        }
    }

    fn resubmit(self: &Arc<Self>, len: usize) {
        if self.phase.load() == Phase::Canceled {
            debug!("QuantizedIterator::run: canceled during quantum, not resubmitting");
            return;
        }

        let executor = Arc::clone(&*self.executor.read().unwrap_or_else(PoisonError::into_inner));
        let cursor = self.cursor.load(Ordering::Acquire);
        let task: Arc<dyn Resumable> = Arc::clone(self) as Arc<dyn Resumable>;
        let continuation = Continuation::new(task, cursor, len, self.pacing);

        if let Err(e) = executor.submit(continuation) {
            warn!(label = executor.label(), cursor, error = %e, "Failed to resubmit quantized iterator");
        }
    }
}

impl<S: IndexedSequence> Resumable for Shared<S> {
    fn resume(self: Arc<Self>) {
        self.quantum();
    }
}

/// Releases the completion claim if the final routine call unwinds, leaving
/// the iterator cancelable and resumable from the failed element
struct Unseal<'a>(&'a PhaseCell);

impl Drop for Unseal<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() && self.0.unseal() {
            warn!("QuantizedIterator::run: routine panicked on the final element, completion released");
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Take the callback out of its slot and call it outside the lock
fn fire(slot: &Mutex<Option<Callback>>) {
    let callback = lock(slot).take();
    if let Some(callback) = callback {
        callback();
    }
}
