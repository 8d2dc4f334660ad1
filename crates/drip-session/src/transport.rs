//! Transport seam between the session manager and the wire.
//!
//! A [`Transport`] produces one [`Connection`] per connect attempt: a
//! cloneable [`Session`] send handle plus a stream of [`TransportEvent`]s
//! the manager consumes to drive its state machine. The production
//! implementation is [`crate::gateway::GatewayTransport`]; tests use
//! [`crate::testing::ScriptedTransport`].

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use drip_core::state::{DisconnectReason, PairingCode};

use crate::store::Credentials;

/// Transport-level failure.
///
/// These never cross the HTTP boundary as errors — the manager folds them
/// into state changes; the dispatch loop folds per-send failures into its
/// failure policy.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Could not reach or handshake with the gateway.
    #[error("gateway connect failed: {0}")]
    Connect(String),

    /// The gateway rejected a send.
    #[error("send rejected: {0}")]
    Rejected(String),

    /// The connection went away under us.
    #[error("connection closed")]
    Closed,
}

/// Event emitted by a live connection.
#[derive(Debug)]
pub enum TransportEvent {
    /// The platform wants the operator to pair; present this code.
    Pairing {
        /// Scannable pairing code.
        code: PairingCode,
    },
    /// The authenticated session opened. Carries the credential blob to
    /// persist.
    Open {
        /// Credentials valid for future connects.
        credentials: Credentials,
    },
    /// The platform rotated key material mid-session.
    CredentialsUpdate {
        /// Replacement credentials.
        credentials: Credentials,
    },
    /// The connection closed. Terminal for this [`Connection`].
    Closed {
        /// Close classification.
        reason: DisconnectReason,
    },
}

/// One send, answered with an ack or a rejection.
#[derive(Debug)]
pub struct SendCommand {
    /// Normalized recipient JID.
    pub to: String,
    /// Message text.
    pub body: String,
    /// Completion channel.
    pub done: oneshot::Sender<Result<(), TransportError>>,
}

/// Cloneable handle for sending over a live connection.
///
/// The handle is only useful while the connection that issued it is open;
/// after a disconnect every send fails with [`TransportError::Closed`].
/// Callers must re-fetch the current handle from the session manager on
/// every send rather than caching one.
#[derive(Clone, Debug)]
pub struct Session {
    commands: mpsc::Sender<SendCommand>,
}

impl Session {
    /// Wrap a command channel into a session handle.
    #[must_use]
    pub fn new(commands: mpsc::Sender<SendCommand>) -> Self {
        Self { commands }
    }

    /// Send one text message and wait for the gateway's ack.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<(), TransportError> {
        let (done, ack) = oneshot::channel();
        self.commands
            .send(SendCommand {
                to: to.to_string(),
                body: body.to_string(),
                done,
            })
            .await
            .map_err(|_| TransportError::Closed)?;
        ack.await.map_err(|_| TransportError::Closed)?
    }
}

/// A live connection: send handle + event stream.
#[derive(Debug)]
pub struct Connection {
    /// Send handle for this connection.
    pub session: Session,
    /// Events until [`TransportEvent::Closed`] (or channel end).
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Factory for connections to the messaging platform.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a connection, authenticating with `stored` credentials when
    /// present. With no credentials the connection starts a pairing round
    /// and emits [`TransportEvent::Pairing`].
    async fn connect(&self, stored: Option<Credentials>) -> Result<Connection, TransportError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn send_text_acked() {
        let (tx, mut rx) = mpsc::channel(8);
        let session = Session::new(tx);

        let answering = tokio::spawn(async move {
            let cmd = rx.recv().await.unwrap();
            assert_eq!(cmd.to, "1555@s.whatsapp.net");
            assert_eq!(cmd.body, "hi");
            cmd.done.send(Ok(())).unwrap();
        });

        session.send_text("1555@s.whatsapp.net", "hi").await.unwrap();
        answering.await.unwrap();
    }

    #[tokio::test]
    async fn send_text_rejected() {
        let (tx, mut rx) = mpsc::channel(8);
        let session = Session::new(tx);

        tokio::spawn(async move {
            let cmd = rx.recv().await.unwrap();
            cmd.done
                .send(Err(TransportError::Rejected("bad jid".into())))
                .unwrap();
        });

        let err = session.send_text("x", "hi").await.unwrap_err();
        assert_matches!(err, TransportError::Rejected(_));
    }

    #[tokio::test]
    async fn send_after_connection_gone_is_closed() {
        let (tx, rx) = mpsc::channel(8);
        drop(rx);
        let session = Session::new(tx);
        let err = session.send_text("x", "hi").await.unwrap_err();
        assert_matches!(err, TransportError::Closed);
    }

    #[tokio::test]
    async fn dropped_ack_maps_to_closed() {
        let (tx, mut rx) = mpsc::channel(8);
        let session = Session::new(tx);

        tokio::spawn(async move {
            let cmd = rx.recv().await.unwrap();
            drop(cmd.done);
        });

        let err = session.send_text("x", "hi").await.unwrap_err();
        assert_matches!(err, TransportError::Closed);
    }
}
