//! QuantLoop - cooperative, quantized sequence processing
//!
//! QuantLoop walks an indexable sequence with a per-element routine without
//! monopolizing the calling thread. Work is split into quanta bounded by an
//! element count or a wall-clock budget; between quanta control returns to an
//! executor, which later resumes the remaining work.
//!
//! # Core Concepts
//!
//! - **One traversal per iterator**: elements are visited once, in index order
//! - **Yield between quanta**: each `run()` does a bounded amount of work, then resubmits
//! - **Pluggable executors**: host-drained queue, worker thread, or tokio runtime
//! - **Terminal once**: done and canceled are absorbing, and each callback fires at most once
//!
//! # Modules
//!
//! - [`quantum`] - The quantized iterator state machine
//! - [`executor`] - Executor trait, continuations, and built-in executors
//! - [`sequence`] - Indexable sequences and the factory entry points
//! - [`pacing`] - Fixed-count and time-budget pacing
//! - [`config`] - Configuration for the `ql` demo binary
//! - [`cli`] - Command-line interface of the `ql` demo binary
//!
//! The `ql` binary is a demo driver for trying pacing and executors on a
//! file. [`config`] and [`cli`] exist for it; the other modules are the
//! supported API.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use quantloop::{Quantize, RunQueue};
//!
//! let queue = Arc::new(RunQueue::new("example"));
//! let it = vec!["a", "b", "c"]
//!     .quantize_by_count(1, |item| println!("{item}"))
//!     .unwrap()
//!     .with_executor(queue.clone())
//!     .unwrap();
//!
//! it.run();
//! queue.run_until_idle();
//! assert!(it.is_done());
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod pacing;
pub mod quantum;
pub mod sequence;

// Re-export commonly used types
pub use config::{Config, ExecutorKind};
pub use error::{LoopError, SubmitError};
pub use executor::{Continuation, Executor, RunQueue, SerialQueue, TokioExecutor};
pub use pacing::Pacing;
pub use quantum::{LoopState, PacingConfig, Progress, QuantizedIterator};
pub use sequence::{IndexedSequence, Quantize};
