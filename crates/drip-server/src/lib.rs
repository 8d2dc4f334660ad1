//! # drip-server
//!
//! The HTTP control surface: a small axum app the operator drives from a
//! browser or curl.
//!
//! - `GET /` — pairing view while disconnected, send form once connected
//! - `GET /qr` — the current pairing code as plain text
//! - `GET /status` — JSON state snapshot
//! - `POST /start` — multipart upload starting a dispatch job
//! - `POST /stop` — cancel the active job
//! - `GET /metrics` — Prometheus text from the installed recorder
//!
//! ## Crate Position
//!
//! Depends on `drip-core`, `drip-session`, and `drip-dispatch`. The binary
//! wires it up and serves it.

#![deny(unsafe_code)]

pub mod metrics;
pub mod server;

pub use server::{AppState, ServerConfig, ServerHandle, build_router, start};
