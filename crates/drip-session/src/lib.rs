//! # drip-session
//!
//! Credential store, gateway transport, and the session lifecycle manager.
//!
//! - [`store::CredentialStore`] — durable key material for one platform
//!   account, read at startup and appended to on rotation events
//! - [`transport::Transport`] — the seam between the lifecycle state
//!   machine and the wire; [`gateway::GatewayTransport`] is the production
//!   WebSocket implementation
//! - [`manager::SessionManager`] — owns the one connection per process,
//!   exposes lifecycle state, and recovers it with bounded backoff
//!
//! ## Crate Position
//!
//! Depends on `drip-core`. Depended on by `drip-dispatch` (session handles)
//! and `drip-server` (state for the control surface).

#![deny(unsafe_code)]

pub mod gateway;
pub mod manager;
pub mod store;
pub mod testing;
pub mod transport;

pub use manager::SessionManager;
pub use store::{CredentialStore, Credentials};
pub use transport::{Connection, Session, Transport, TransportError, TransportEvent};
