//! Pacing configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::LoopError;
use crate::pacing::Pacing;

/// Default elements per quantum when nothing is configured
pub const DEFAULT_STEP: usize = 64;

/// Pacing as written in a config file
///
/// Set at most one of `step` and `budget-ms`. With neither set, fixed-count
/// pacing with [`DEFAULT_STEP`] is used.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PacingConfig {
    /// Max elements per quantum
    pub step: Option<usize>,

    /// Max milliseconds per quantum
    pub budget_ms: Option<u64>,
}

impl PacingConfig {
    /// Fixed-count pacing config
    pub fn step(step: usize) -> Self {
        Self {
            step: Some(step),
            budget_ms: None,
        }
    }

    /// Time-budget pacing config
    pub fn budget_ms(budget_ms: u64) -> Self {
        Self {
            step: None,
            budget_ms: Some(budget_ms),
        }
    }

    /// Overlay `other` on top of this config; fields set in `other` win
    pub fn merge(&self, other: &PacingConfig) -> Self {
        if other.step.is_some() || other.budget_ms.is_some() {
            other.clone()
        } else {
            self.clone()
        }
    }

    /// Resolve into a [`Pacing`]
    pub fn pacing(&self) -> Result<Pacing, LoopError> {
        match (self.step, self.budget_ms) {
            (Some(_), Some(_)) => Err(LoopError::ConflictingPacing),
            (Some(step), None) => Pacing::fixed_count(step),
            (None, Some(ms)) => Ok(Pacing::time_budget(Duration::from_millis(ms))),
            (None, None) => Pacing::fixed_count(DEFAULT_STEP),
        }
    }
}
