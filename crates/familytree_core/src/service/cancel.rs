//! Cooperative cancellation for graph mutations.

use crate::service::error::GraphError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag checked by the orchestrator at every step boundary.
///
/// Clones observe the same flag, so a caller can keep one clone and hand
/// another to the mutating call.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Irreversible.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub(crate) fn check(&self) -> Result<(), GraphError> {
        if self.is_cancelled() {
            return Err(GraphError::Cancelled);
        }
        Ok(())
    }
}
