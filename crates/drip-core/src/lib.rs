//! # drip-core
//!
//! Foundation types, errors, and utilities for the drip sender.
//!
//! This crate provides the shared vocabulary that all other drip crates
//! depend on:
//!
//! - **Lifecycle**: [`state::LifecycleState`] and [`state::SessionEvent`]
//!   for observing session transitions
//! - **Disconnect classification**: [`state::DisconnectReason`] with
//!   recoverable vs unrecoverable semantics
//! - **Batches**: [`batch::MessageBatch`] — ordered non-empty message lines
//! - **Recipients**: [`recipient::normalize_recipient`] JID normalization
//! - **Errors**: [`errors::DispatchError`] and [`errors::StoreError`]
//! - **Retry**: [`retry::RetryConfig`] bounded exponential backoff
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other drip crates.

#![deny(unsafe_code)]

pub mod batch;
pub mod errors;
pub mod logging;
pub mod recipient;
pub mod retry;
pub mod state;
