#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use evidence_contracts::LedgerError;

/// Caller-owned abandon signal, shared by clones. The ledger is never told
/// about it: a tripped token only makes this side stop and discard.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Call before entering a suspension point.
    pub fn checkpoint(&self, stage: &'static str) -> Result<(), LedgerError> {
        if self.is_cancelled() {
            tracing::debug!(target: "evidence_os::cancel", stage, "cancelled before suspension");
            return Err(LedgerError::UserCancelled);
        }
        Ok(())
    }

    /// Call after a suspension point returns. A response that arrives after
    /// cancellation is dropped here.
    pub fn discard_if_cancelled<T>(
        &self,
        stage: &'static str,
        response: T,
    ) -> Result<T, LedgerError> {
        if self.is_cancelled() {
            tracing::info!(
                target: "evidence_os::cancel",
                stage,
                "discarding response received after cancellation"
            );
            drop(response);
            return Err(LedgerError::UserCancelled);
        }
        Ok(response)
    }
}
