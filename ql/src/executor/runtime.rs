//! Tokio runtime executor

use tokio::runtime::Handle;
use tracing::debug;

use super::{Continuation, Executor};
use crate::error::{LoopError, SubmitError};

/// Spawns each continuation as a task on a tokio runtime
///
/// On a multi-threaded runtime successive quanta of one iterator may land on
/// different worker threads; they never overlap.
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: Handle,
    label: String,
}

impl TokioExecutor {
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            label: "tokio".to_string(),
        }
    }

    /// Executor for the runtime the caller is running inside
    pub fn current() -> Result<Self, LoopError> {
        debug!("TokioExecutor::current: called");
        let handle = Handle::try_current().map_err(|e| LoopError::NoRuntime(e.to_string()))?;
        Ok(Self::new(handle))
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl Executor for TokioExecutor {
    fn submit(&self, continuation: Continuation) -> Result<(), SubmitError> {
        self.handle.spawn(async move { continuation.run() });
        Ok(())
    }

    fn label(&self) -> &str {
        &self.label
    }
}
