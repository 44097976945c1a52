//! Run-level cancellation shared by every scenario in a run.
//!
//! Engine calls and readiness waits race against the signal so a cancelled
//! run returns promptly with [`HarnessError::Cancelled`]. Teardown does not
//! consult the signal: cleanup must still happen after cancellation.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

use crate::error::{HarnessError, Result};

/// Cloneable cancellation flag with async wake-up.
#[derive(Debug, Clone, Default)]
pub struct CancellationSignal {
    cancelled: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl CancellationSignal {
    /// Create a signal in the not-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel the run and wake every waiter.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    /// Returns true once [`Self::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Fail if the signal has fired.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Cancelled` naming `operation` once cancelled.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.is_cancelled() {
            Err(cancelled(operation))
        } else {
            Ok(())
        }
    }

    /// Resolve once the signal is cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent cancel is not lost.
            notified.as_mut().enable();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Run `future` unless the signal fires first.
    ///
    /// # Errors
    ///
    /// Returns `HarnessError::Cancelled` naming `operation` when the signal
    /// fires before `future` completes, or if it was already cancelled.
    pub async fn guard<T, F>(&self, operation: &str, future: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        self.check(operation)?;

        tokio::select! {
            biased;
            () = self.cancelled() => Err(cancelled(operation)),
            output = future => Ok(output),
        }
    }
}

fn cancelled(operation: &str) -> HarnessError {
    HarnessError::Cancelled {
        operation: String::from(operation),
    }
}
