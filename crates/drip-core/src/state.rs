//! Session lifecycle types and transition events.
//!
//! The session manager owns exactly one [`LifecycleState`] value at any
//! instant and publishes every transition as a [`SessionEvent`]. Consumers
//! (the control surface, the dispatch loop) observe state rather than
//! sharing connection internals.

use serde::{Deserialize, Serialize};

/// Connection lifecycle of the one platform session in this process.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// No transport connection. Initial state, and terminal after an
    /// unrecoverable disconnect or exhausted reconnect attempts.
    Disconnected,
    /// Transport is up but unauthenticated; a pairing code is available
    /// for the operator to scan.
    AwaitingPairing,
    /// Authenticated session is live; sends are possible.
    Connected,
}

impl LifecycleState {
    /// String form used in logs and the status endpoint.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::AwaitingPairing => "awaiting_pairing",
            Self::Connected => "connected",
        }
    }
}

/// Short-lived pairing code, present only while awaiting pairing.
///
/// The code is opaque to drip — it is rendered to the operator, scanned by
/// the platform's companion app, and becomes useless the moment the session
/// opens (or the transport drops).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingCode(pub String);

impl PairingCode {
    /// The raw code string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Why the transport connection closed.
///
/// Recoverable reasons keep the stored credentials valid — reconnecting
/// alone restores service. Unrecoverable reasons mean the platform revoked
/// the session server-side and the operator must pair again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// Network-level drop (connection reset, timeout, DNS failure).
    ConnectionLost,
    /// Server asked the client to reconnect (restart, load shedding).
    ServerRestart,
    /// The platform logged this session out; credentials are dead.
    LoggedOut,
    /// The session was revoked from another device.
    SessionRevoked,
    /// Unclassified close with the raw reason string from the wire.
    Other(String),
}

impl DisconnectReason {
    /// Whether reconnecting with the same credentials can restore service.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::LoggedOut | Self::SessionRevoked)
    }

    /// Classify a wire-level reason string.
    ///
    /// Anything not explicitly known to invalidate credentials is treated
    /// as recoverable — wrongly treating a blip as a logout would force a
    /// needless re-pair.
    #[must_use]
    pub fn from_wire(reason: &str) -> Self {
        match reason {
            "connection_lost" => Self::ConnectionLost,
            "server_restart" => Self::ServerRestart,
            "logged_out" => Self::LoggedOut,
            "session_revoked" => Self::SessionRevoked,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Session manager transition event, broadcast to registered listeners.
///
/// The control surface uses these to re-render pairing/connected views;
/// the dispatch loop gates sends on the state they carry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Lifecycle state changed.
    StateChanged {
        /// The newly committed state.
        state: LifecycleState,
    },
    /// A fresh pairing code was issued.
    PairingIssued {
        /// The code to present to the operator.
        code: PairingCode,
    },
    /// Credentials were persisted (initial pairing or rotation).
    CredentialsRotated,
    /// A reconnect attempt is scheduled after a recoverable drop.
    ReconnectScheduled {
        /// 1-based attempt number.
        attempt: u32,
        /// Delay before the attempt, in milliseconds.
        delay_ms: u64,
    },
    /// All reconnect attempts failed; manager gave up.
    RetriesExhausted {
        /// Total consecutive failures.
        attempts: u32,
    },
    /// Transport closed.
    Disconnected {
        /// Close classification.
        reason: DisconnectReason,
    },
}

impl SessionEvent {
    /// Event type string for log discrimination.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::PairingIssued { .. } => "pairing_issued",
            Self::CredentialsRotated => "credentials_rotated",
            Self::ReconnectScheduled { .. } => "reconnect_scheduled",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::Disconnected { .. } => "disconnected",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_serde_snake_case() {
        let json = serde_json::to_value(LifecycleState::AwaitingPairing).unwrap();
        assert_eq!(json, "awaiting_pairing");
        let back: LifecycleState = serde_json::from_value(json).unwrap();
        assert_eq!(back, LifecycleState::AwaitingPairing);
    }

    #[test]
    fn state_as_str() {
        assert_eq!(LifecycleState::Disconnected.as_str(), "disconnected");
        assert_eq!(LifecycleState::Connected.as_str(), "connected");
    }

    #[test]
    fn network_drops_are_recoverable() {
        assert!(DisconnectReason::ConnectionLost.is_recoverable());
        assert!(DisconnectReason::ServerRestart.is_recoverable());
        assert!(DisconnectReason::Other("eof".into()).is_recoverable());
    }

    #[test]
    fn logout_and_revocation_are_not() {
        assert!(!DisconnectReason::LoggedOut.is_recoverable());
        assert!(!DisconnectReason::SessionRevoked.is_recoverable());
    }

    #[test]
    fn wire_classification() {
        assert_eq!(
            DisconnectReason::from_wire("logged_out"),
            DisconnectReason::LoggedOut
        );
        assert_eq!(
            DisconnectReason::from_wire("server_restart"),
            DisconnectReason::ServerRestart
        );
        assert_eq!(
            DisconnectReason::from_wire("weird"),
            DisconnectReason::Other("weird".into())
        );
    }

    #[test]
    fn unknown_wire_reason_defaults_recoverable() {
        assert!(DisconnectReason::from_wire("something_new").is_recoverable());
    }

    #[test]
    fn event_serde_tagged() {
        let e = SessionEvent::ReconnectScheduled {
            attempt: 3,
            delay_ms: 4000,
        };
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "reconnect_scheduled");
        assert_eq!(json["attempt"], 3);
        assert_eq!(json["delay_ms"], 4000);
    }

    #[test]
    fn event_types_distinct() {
        let events = [
            SessionEvent::StateChanged {
                state: LifecycleState::Connected,
            },
            SessionEvent::PairingIssued {
                code: PairingCode("c".into()),
            },
            SessionEvent::CredentialsRotated,
            SessionEvent::ReconnectScheduled {
                attempt: 1,
                delay_ms: 1000,
            },
            SessionEvent::RetriesExhausted { attempts: 5 },
            SessionEvent::Disconnected {
                reason: DisconnectReason::ConnectionLost,
            },
        ];
        let mut types: Vec<&str> = events.iter().map(SessionEvent::event_type).collect();
        types.sort_unstable();
        types.dedup();
        assert_eq!(types.len(), events.len());
    }
}
