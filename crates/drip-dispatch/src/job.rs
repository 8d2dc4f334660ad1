//! Handle to a running dispatch job.

use tokio_util::sync::CancellationToken;

/// Cloneable handle to a spawned dispatch job.
///
/// Cancellation is the only way a job ends from the outside; the loop
/// observes the token at both of its suspension points, so a cancelled job
/// exits within one delay interval.
#[derive(Clone, Debug)]
pub struct JobHandle {
    cancel: CancellationToken,
    done: CancellationToken,
}

impl JobHandle {
    pub(crate) fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            done: CancellationToken::new(),
        }
    }

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub(crate) fn mark_finished(&self) {
        self.done.cancel();
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the loop has exited (cancelled, aborted, or session halted).
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.done.is_cancelled()
    }

    /// Wait for the loop to exit.
    pub async fn finished(&self) {
        self.done.cancelled().await;
    }
}
