//! # drip-dispatch
//!
//! The paced dispatch job: a cancellable loop that cycles a message batch
//! to one recipient over the live session, one line per delay interval.
//!
//! - [`dispatcher::Dispatcher`] — validates requests, enforces the
//!   one-job-per-process rule, spawns the loop
//! - [`job::JobHandle`] — cancel and observe a running job
//! - [`dispatcher::FailurePolicy`] — what to do when a single send fails
//!
//! ## Crate Position
//!
//! Depends on `drip-core` and `drip-session`. Depended on by `drip-server`
//! (start/stop endpoints) and the binary.

#![deny(unsafe_code)]

pub mod dispatcher;
pub mod job;
mod runner;

pub use dispatcher::{Dispatcher, FailurePolicy};
pub use job::JobHandle;
