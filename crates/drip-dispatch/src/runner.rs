//! The dispatch loop itself.
//!
//! One spawned task per job. The loop cycles the batch indefinitely, one
//! line per delay interval, and only ever sends while the session is
//! Connected. Suspension points (wait-for-connected and the inter-message
//! delay) are both cancellable, and both also observe the session manager's
//! halt token so a job never parks forever against a manager that has
//! given up.

use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use drip_core::batch::MessageBatch;
use drip_core::state::LifecycleState;
use drip_session::{Session, SessionManager};

use crate::dispatcher::FailurePolicy;
use crate::job::JobHandle;

pub(crate) struct JobContext {
    pub manager: Arc<SessionManager>,
    pub recipient: String,
    pub batch: MessageBatch,
    pub delay: Duration,
    pub policy: FailurePolicy,
    pub handle: JobHandle,
}

/// Why the loop stopped.
#[derive(Debug)]
enum Stop {
    Cancelled,
    SessionHalted,
    Aborted,
}

pub(crate) async fn run_job(ctx: JobContext) {
    let cancel = ctx.handle.cancel_token();
    gauge!("dispatch_jobs_active").increment(1.0);
    info!(
        recipient = %ctx.recipient,
        lines = ctx.batch.len(),
        delay_ms = ctx.delay.as_millis() as u64,
        "dispatch job started"
    );

    let stop = drive(&ctx, &cancel).await;

    info!(recipient = %ctx.recipient, ?stop, "dispatch job ended");
    gauge!("dispatch_jobs_active").decrement(1.0);
    ctx.handle.mark_finished();
}

async fn drive(ctx: &JobContext, cancel: &CancellationToken) -> Stop {
    loop {
        for (index, line) in ctx.batch.lines().enumerate() {
            if cancel.is_cancelled() {
                return Stop::Cancelled;
            }

            let session = tokio::select! {
                () = cancel.cancelled() => return Stop::Cancelled,
                session = connected_session(&ctx.manager) => match session {
                    Some(session) => session,
                    None => return Stop::SessionHalted,
                },
            };

            if !send_with_policy(ctx, &session, index, line).await {
                return Stop::Aborted;
            }

            tokio::select! {
                () = cancel.cancelled() => return Stop::Cancelled,
                () = tokio::time::sleep(ctx.delay) => {}
            }
        }
        debug!(recipient = %ctx.recipient, "batch cycle complete, wrapping");
    }
}

/// Send one line under the configured failure policy.
///
/// Returns `false` only when the policy says the job must end.
async fn send_with_policy(
    ctx: &JobContext,
    session: &Session,
    index: usize,
    line: &str,
) -> bool {
    match session.send_text(&ctx.recipient, line).await {
        Ok(()) => {
            counter!("messages_sent_total").increment(1);
            debug!(recipient = %ctx.recipient, index, "message sent");
            return true;
        }
        Err(e) => {
            counter!("send_failures_total").increment(1);
            warn!(recipient = %ctx.recipient, index, error = %e, "send failed");
        }
    }

    match ctx.policy {
        FailurePolicy::LogAndContinue => true,
        FailurePolicy::Abort => false,
        FailurePolicy::Retry { max } => {
            for attempt in 1..=max {
                // Re-fetch the handle; the failure may have been a stale
                // session from before a reconnect.
                let Some(session) = connected_session(&ctx.manager).await else {
                    return false;
                };
                match session.send_text(&ctx.recipient, line).await {
                    Ok(()) => {
                        counter!("messages_sent_total").increment(1);
                        debug!(recipient = %ctx.recipient, index, attempt, "retry succeeded");
                        return true;
                    }
                    Err(e) => {
                        counter!("send_failures_total").increment(1);
                        warn!(recipient = %ctx.recipient, index, attempt, error = %e, "retry failed");
                    }
                }
            }
            // Retries spent; move on rather than stall the batch.
            true
        }
    }
}

/// Resolve the live session handle, waiting through disconnects.
///
/// Returns `None` once the manager has halted for good (or its state watch
/// closed), so waiters never park forever.
async fn connected_session(manager: &SessionManager) -> Option<Session> {
    let halted = manager.halted();
    let mut state = manager.watch_state();
    loop {
        if *state.borrow_and_update() == LifecycleState::Connected {
            // State and handle are published separately; a handle can be
            // momentarily absent right around a transition.
            if let Some(session) = manager.active_session() {
                return Some(session);
            }
        }
        tokio::select! {
            () = halted.cancelled() => return None,
            changed = state.changed() => {
                if changed.is_err() {
                    return None;
                }
            }
        }
    }
}
