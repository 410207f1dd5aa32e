//! Pacing strategies that bound the size of a quantum

use std::fmt;
use std::num::NonZeroUsize;
use std::time::Duration;

use crate::error::LoopError;

/// Rule bounding how much work a single quantum performs
///
/// Fixed at construction and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// At most `n` elements per quantum
    FixedCount(NonZeroUsize),

    /// Yield once a quantum has run for at least this long.
    /// Every quantum processes at least one element, so a zero budget
    /// means exactly one element per quantum.
    TimeBudget(Duration),
}

impl Pacing {
    /// Fixed-count pacing; a zero step is rejected
    pub fn fixed_count(step: usize) -> Result<Self, LoopError> {
        NonZeroUsize::new(step).map(Self::FixedCount).ok_or(LoopError::ZeroStep)
    }

    /// Time-budget pacing
    pub fn time_budget(budget: Duration) -> Self {
        Self::TimeBudget(budget)
    }

    /// Element cap for fixed-count pacing
    pub fn step(&self) -> Option<usize> {
        match self {
            Self::FixedCount(step) => Some(step.get()),
            Self::TimeBudget(_) => None,
        }
    }

    /// Duration cap for time-budget pacing
    pub fn budget(&self) -> Option<Duration> {
        match self {
            Self::FixedCount(_) => None,
            Self::TimeBudget(budget) => Some(*budget),
        }
    }
}

impl fmt::Display for Pacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FixedCount(step) => write!(f, "step={}", step),
            Self::TimeBudget(budget) => write!(f, "budget={:?}", budget),
        }
    }
}
