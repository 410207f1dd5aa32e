//! Quantized iteration
//!
//! A [`QuantizedIterator`] walks an indexable sequence a bounded amount at a
//! time, yielding to its executor between quanta, until it is done or
//! canceled.

mod config;
mod core;
mod state;

pub use config::PacingConfig;
pub use self::core::QuantizedIterator;
pub use state::{LoopState, Progress};
