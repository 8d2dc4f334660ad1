//! Scriptable transport for exercising the session manager and the
//! dispatch loop without a gateway.
//!
//! Lives in the crate proper (not behind `cfg(test)`) so downstream crates
//! can drive their tests against the same fake.

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::store::Credentials;
use crate::transport::{Connection, SendCommand, Session, Transport, TransportError, TransportEvent};

/// Test-side handle to one scripted connection.
///
/// The test feeds lifecycle events through `events` and answers sends read
/// from `commands`. Dropping the handle closes both channels, which the
/// manager observes as a lost connection.
#[derive(Debug)]
pub struct ConnectionScript {
    /// Credentials the connecting side presented, if any.
    pub stored: Option<Credentials>,
    /// Feed of lifecycle events into the connection.
    pub events: mpsc::Sender<TransportEvent>,
    /// Sends issued through the connection's [`Session`] handle.
    pub commands: mpsc::Receiver<SendCommand>,
}

impl ConnectionScript {
    /// Emit one lifecycle event. Panics if the connection side is gone.
    pub async fn emit(&self, event: TransportEvent) {
        self.events
            .send(event)
            .await
            .unwrap_or_else(|_| panic!("connection side dropped"));
    }

    /// Receive the next send, ack it, and return its `(to, body)`.
    pub async fn ack_next_send(&mut self) -> (String, String) {
        let cmd = self
            .commands
            .recv()
            .await
            .unwrap_or_else(|| panic!("no send arrived"));
        let _ = cmd.done.send(Ok(()));
        (cmd.to, cmd.body)
    }

    /// Receive the next send and reject it with the given error.
    pub async fn nack_next_send(&mut self, error: TransportError) -> (String, String) {
        let cmd = self
            .commands
            .recv()
            .await
            .unwrap_or_else(|| panic!("no send arrived"));
        let _ = cmd.done.send(Err(error));
        (cmd.to, cmd.body)
    }
}

/// [`Transport`] whose connections are handed to the test as
/// [`ConnectionScript`]s.
#[derive(Debug)]
pub struct ScriptedTransport {
    scripts: mpsc::Sender<ConnectionScript>,
    forced_failures: Mutex<VecDeque<TransportError>>,
}

impl ScriptedTransport {
    /// New transport plus the receiver yielding one [`ConnectionScript`]
    /// per connect attempt.
    #[must_use]
    pub fn new() -> (Self, mpsc::Receiver<ConnectionScript>) {
        let (scripts, rx) = mpsc::channel(8);
        (
            Self {
                scripts,
                forced_failures: Mutex::new(VecDeque::new()),
            },
            rx,
        )
    }

    /// Make the next connect attempt fail with `error` instead of
    /// producing a connection.
    pub fn fail_next_connect(&self, error: TransportError) {
        self.forced_failures.lock().push_back(error);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, stored: Option<Credentials>) -> Result<Connection, TransportError> {
        if let Some(error) = self.forced_failures.lock().pop_front() {
            return Err(error);
        }
        let (command_tx, command_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = mpsc::channel(32);
        self.scripts
            .send(ConnectionScript {
                stored,
                events: event_tx,
                commands: command_rx,
            })
            .await
            .map_err(|_| TransportError::Connect("script receiver dropped".into()))?;
        Ok(Connection {
            session: Session::new(command_tx),
            events: event_rx,
        })
    }
}
