//! Session lifecycle manager.
//!
//! Owns the single platform connection of this process and supervises it
//! end to end: pairing, credential persistence, send-handle publication,
//! and recovery from drops with bounded exponential backoff.
//!
//! State is published two ways:
//! - a [`watch`] channel carrying the current [`LifecycleState`] — cheap to
//!   poll, awaitable for "wait until connected"
//! - a [`broadcast`] channel carrying every [`SessionEvent`] transition —
//!   for listeners that need the full narrative (the control surface)
//!
//! The manager halts for good on an unrecoverable disconnect or once the
//! retry ceiling is hit; [`SessionManager::halted`] lets waiters distinguish
//! "not connected yet" from "never connecting again".

use std::sync::Arc;

use metrics::{counter, gauge};
use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use drip_core::errors::StoreError;
use drip_core::retry::RetryConfig;
use drip_core::state::{DisconnectReason, LifecycleState, PairingCode, SessionEvent};

use crate::store::CredentialStore;
use crate::transport::{Connection, Session, Transport, TransportEvent};

/// How a live connection ended.
enum Ended {
    /// Shutdown token fired; stop without touching credentials.
    Shutdown,
    /// Transport closed with the given classification.
    Closed(DisconnectReason),
}

/// Supervisor for the one platform session in this process.
pub struct SessionManager {
    transport: Arc<dyn Transport>,
    store: CredentialStore,
    retry: RetryConfig,
    state_tx: watch::Sender<LifecycleState>,
    events_tx: broadcast::Sender<SessionEvent>,
    pairing: RwLock<Option<PairingCode>>,
    active: RwLock<Option<Session>>,
    halted: CancellationToken,
}

impl SessionManager {
    /// New manager around a transport and credential store.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, store: CredentialStore, retry: RetryConfig) -> Self {
        let (state_tx, _) = watch::channel(LifecycleState::Disconnected);
        let (events_tx, _) = broadcast::channel(64);
        Self {
            transport,
            store,
            retry,
            state_tx,
            events_tx,
            pairing: RwLock::new(None),
            active: RwLock::new(None),
            halted: CancellationToken::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state_tx.borrow()
    }

    /// Watch receiver over the lifecycle state.
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<LifecycleState> {
        self.state_tx.subscribe()
    }

    /// Subscribe to the transition event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// The pairing code to present, while one is live.
    #[must_use]
    pub fn pairing_code(&self) -> Option<PairingCode> {
        self.pairing.read().clone()
    }

    /// Send handle for the live session, while connected.
    ///
    /// Callers re-fetch this before every send; handles from a previous
    /// connection fail closed rather than silently misroute.
    #[must_use]
    pub fn active_session(&self) -> Option<Session> {
        self.active.read().clone()
    }

    /// Token cancelled when the manager has given up permanently.
    #[must_use]
    pub fn halted(&self) -> CancellationToken {
        self.halted.clone()
    }

    /// Run the supervision loop until shutdown or permanent halt.
    ///
    /// Errors are credential-store failures; everything transport-level is
    /// absorbed into the reconnect policy.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), StoreError> {
        let result = self.run_inner(&shutdown).await;
        self.clear_session();
        self.set_state(LifecycleState::Disconnected);
        self.halted.cancel();
        result
    }

    async fn run_inner(&self, shutdown: &CancellationToken) -> Result<(), StoreError> {
        let mut failures: u32 = 0;
        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }

            let stored = self.store.load()?;
            debug!(resuming = stored.is_some(), "connecting to gateway");
            match self.transport.connect(stored).await {
                Ok(conn) => match self.drive_connection(conn, shutdown, &mut failures).await? {
                    Ended::Shutdown => return Ok(()),
                    Ended::Closed(reason) => {
                        self.clear_session();
                        self.set_state(LifecycleState::Disconnected);
                        self.publish(SessionEvent::Disconnected {
                            reason: reason.clone(),
                        });
                        gauge!("session_connected").set(0.0);
                        if !reason.is_recoverable() {
                            warn!(?reason, "session revoked by platform, wiping credentials");
                            self.store.wipe()?;
                            return Ok(());
                        }
                        failures += 1;
                        counter!("reconnect_failures_total").increment(1);
                    }
                },
                Err(e) => {
                    warn!(error = %e, "gateway connect failed");
                    failures += 1;
                    counter!("reconnect_failures_total").increment(1);
                }
            }

            if !self.retry.allows_attempt(failures) {
                error!(attempts = failures, "reconnect attempts exhausted, halting");
                self.publish(SessionEvent::RetriesExhausted { attempts: failures });
                return Ok(());
            }
            let delay = self.retry.delay_for_attempt(failures);
            info!(attempt = failures, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
            self.publish(SessionEvent::ReconnectScheduled {
                attempt: failures,
                delay_ms: delay.as_millis() as u64,
            });
            counter!("reconnects_total").increment(1);
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = shutdown.cancelled() => return Ok(()),
            }
        }
    }

    /// Consume one connection's events until it closes.
    async fn drive_connection(
        &self,
        mut conn: Connection,
        shutdown: &CancellationToken,
        failures: &mut u32,
    ) -> Result<Ended, StoreError> {
        loop {
            let event = tokio::select! {
                () = shutdown.cancelled() => return Ok(Ended::Shutdown),
                event = conn.events.recv() => event,
            };
            match event {
                Some(TransportEvent::Pairing { code }) => {
                    info!("pairing code issued");
                    // The platform can demand a re-pair mid-session; the
                    // old send handle must go away with the Connected state.
                    *self.active.write() = None;
                    gauge!("session_connected").set(0.0);
                    *self.pairing.write() = Some(code.clone());
                    self.set_state(LifecycleState::AwaitingPairing);
                    self.publish(SessionEvent::PairingIssued { code });
                }
                Some(TransportEvent::Open { credentials }) => {
                    self.store.save(&credentials)?;
                    *failures = 0;
                    *self.pairing.write() = None;
                    *self.active.write() = Some(conn.session.clone());
                    info!("session open");
                    gauge!("session_connected").set(1.0);
                    self.set_state(LifecycleState::Connected);
                    self.publish(SessionEvent::CredentialsRotated);
                }
                Some(TransportEvent::CredentialsUpdate { credentials }) => {
                    self.store.save(&credentials)?;
                    self.publish(SessionEvent::CredentialsRotated);
                }
                Some(TransportEvent::Closed { reason }) => return Ok(Ended::Closed(reason)),
                // Event channel gone without a close frame.
                None => return Ok(Ended::Closed(DisconnectReason::ConnectionLost)),
            }
        }
    }

    fn clear_session(&self) {
        *self.active.write() = None;
        *self.pairing.write() = None;
    }

    fn set_state(&self, next: LifecycleState) {
        let changed = self.state_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
        if changed {
            self.publish(SessionEvent::StateChanged { state: next });
        }
    }

    fn publish(&self, event: SessionEvent) {
        debug!(event_type = event.event_type(), "session event");
        // Err just means nobody is listening right now.
        let _ = self.events_tx.send(event);
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("state", &self.state())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
