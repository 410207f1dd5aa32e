//! Lifecycle states for a quantized iterator

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    /// Constructed, `run()` not called yet
    Created,
    /// At least one quantum started, cursor advancing
    Running,
    /// Every element was processed
    Done,
    /// Canceled before completion
    Canceled,
}

impl LoopState {
    /// Done and Canceled are absorbing
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Canceled)
    }
}

impl std::fmt::Display for LoopState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Done => write!(f, "done"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for LoopState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "created" => Ok(Self::Created),
            "running" => Ok(Self::Running),
            "done" => Ok(Self::Done),
            "canceled" | "cancelled" => Ok(Self::Canceled),
            _ => Err(format!("Unknown loop state: {}", s)),
        }
    }
}

/// Point-in-time view of an iterator's progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    /// Next unprocessed index
    pub cursor: usize,
    /// Sequence length
    pub len: usize,
    /// Quanta executed so far
    pub quanta: u64,
    pub state: LoopState,
}

impl Progress {
    pub fn remaining(&self) -> usize {
        self.len.saturating_sub(self.cursor)
    }
}

/// Internal phase; `Finishing` is the window between claiming completion
/// and the final routine call returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Phase {
    Created = 0,
    Running = 1,
    Finishing = 2,
    Done = 3,
    Canceled = 4,
}

impl Phase {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Finishing,
            3 => Self::Done,
            _ => Self::Canceled,
        }
    }

    pub(crate) fn observed(self) -> LoopState {
        match self {
            Self::Created => LoopState::Created,
            Self::Running | Self::Finishing => LoopState::Running,
            Self::Done => LoopState::Done,
            Self::Canceled => LoopState::Canceled,
        }
    }
}

/// Atomic phase cell; every transition is a compare-exchange so each
/// terminal phase is entered at most once.
#[derive(Debug)]
pub(crate) struct PhaseCell(AtomicU8);

impl PhaseCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(Phase::Created as u8))
    }

    pub(crate) fn load(&self) -> Phase {
        Phase::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Move `from -> to`; false if the current phase was not `from`
    pub(crate) fn transition(&self, from: Phase, to: Phase) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Created -> Running; true if the cell is Running afterwards
    pub(crate) fn start(&self) -> bool {
        self.transition(Phase::Created, Phase::Running) || self.load() == Phase::Running
    }

    /// Claim completion before the final element is dispatched
    pub(crate) fn seal(&self) -> bool {
        self.transition(Phase::Running, Phase::Finishing)
    }

    /// Finishing -> Running, undoing a claim whose final element never returned
    pub(crate) fn unseal(&self) -> bool {
        self.transition(Phase::Finishing, Phase::Running)
    }

    /// Finishing -> Done
    pub(crate) fn finish(&self) -> bool {
        self.transition(Phase::Finishing, Phase::Done)
    }

    /// Created/Running -> Canceled; false once sealed or terminal
    pub(crate) fn cancel(&self) -> bool {
        loop {
            let current = self.load();
            match current {
                Phase::Created | Phase::Running => {
                    if self.transition(current, Phase::Canceled) {
                        return true;
                    }
                }
                Phase::Finishing | Phase::Done | Phase::Canceled => return false,
            }
        }
    }
}
