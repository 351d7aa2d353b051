//! # glaze-admin
//!
//! Administrative protocol contract for cache-proxy instances.
//!
//! The reconciliation engine talks to every instance through this contract
//! and nothing else:
//!
//! - [`AdminConnect`] - opens an authenticated session with a bounded timeout
//! - [`AdminSession`] - the sequential command surface (ping, status, fault,
//!   list, inline load, label, discard, close)
//! - [`LoadedConfig`] / [`ConfigState`] / [`ChildStatus`] - reported state
//!
//! The [`fake`] module provides an in-memory implementation with per-call
//! counters, used by the engine's test suites.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
pub mod fake;

pub use client::{AdminConnect, AdminSession, ChildStatus, ConfigState, LoadedConfig};
