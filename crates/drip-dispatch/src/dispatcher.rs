//! Job admission and the one-job-per-process rule.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::info;

use drip_core::batch::MessageBatch;
use drip_core::errors::DispatchError;
use drip_core::recipient::normalize_recipient;
use drip_core::state::LifecycleState;
use drip_session::SessionManager;

use crate::job::JobHandle;
use crate::runner::{self, JobContext};

/// What the loop does when a single send fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Log the failure and move on to the next line. Default.
    LogAndContinue,
    /// End the job on the first failure.
    Abort,
    /// Retry the same line up to `max` extra attempts, then move on.
    Retry {
        /// Extra attempts per line.
        max: u32,
    },
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self::LogAndContinue
    }
}

/// Admits dispatch jobs and enforces that at most one runs at a time.
///
/// A second start while a job is live fails with
/// [`DispatchError::Conflict`]; the caller cancels the active job first.
#[derive(Debug)]
pub struct Dispatcher {
    manager: Arc<SessionManager>,
    min_delay: Duration,
    policy: FailurePolicy,
    active: Mutex<Option<JobHandle>>,
}

impl Dispatcher {
    /// New dispatcher over the given session manager.
    ///
    /// `min_delay` is the floor every requested delay is clamped up to.
    #[must_use]
    pub fn new(manager: Arc<SessionManager>, min_delay: Duration, policy: FailurePolicy) -> Self {
        Self {
            manager,
            min_delay,
            policy,
            active: Mutex::new(None),
        }
    }

    /// Start a dispatch job cycling `batch` to `recipient`.
    ///
    /// Validation failures and conflicts are synchronous; once a handle is
    /// returned the job runs until cancelled or the session halts.
    pub fn start(
        &self,
        recipient: &str,
        batch: MessageBatch,
        delay: Duration,
    ) -> Result<JobHandle, DispatchError> {
        if batch.is_empty() {
            return Err(DispatchError::Validation("message batch is empty".into()));
        }
        if self.manager.state() != LifecycleState::Connected {
            return Err(DispatchError::SessionUnavailable);
        }

        let mut active = self.active.lock();
        if let Some(handle) = active.as_ref() {
            if !handle.is_finished() {
                return Err(DispatchError::Conflict);
            }
        }

        let delay = delay.max(self.min_delay);
        let recipient = normalize_recipient(recipient);
        let handle = JobHandle::new();
        info!(%recipient, lines = batch.len(), delay_ms = delay.as_millis() as u64, "job accepted");
        drop(tokio::spawn(runner::run_job(JobContext {
            manager: Arc::clone(&self.manager),
            recipient,
            batch,
            delay,
            policy: self.policy,
            handle: handle.clone(),
        })));
        *active = Some(handle.clone());
        Ok(handle)
    }

    /// Cancel the active job, if one is running.
    ///
    /// Returns whether a live job was cancelled. Idempotent.
    pub fn stop(&self) -> bool {
        let active = self.active.lock();
        match active.as_ref() {
            Some(handle) if !handle.is_finished() => {
                handle.cancel();
                info!("job cancelled");
                true
            }
            _ => false,
        }
    }

    /// Whether a dispatch job is currently live.
    #[must_use]
    pub fn job_active(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
