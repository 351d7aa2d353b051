//! # glaze-core
//!
//! Core types, errors, and secret handling for the glaze fleet engine.
//!
//! This crate provides the foundational types used across the other glaze
//! crates:
//!
//! - [`FleetError`] / [`AdminError`] - engine-level and protocol-level errors
//! - [`FleetErrors`] - ordered aggregate of per-instance failures
//! - [`Secret`] / [`SecretStore`] - admin secrets held in a named registry
//!
//! ## Example
//!
//! ```rust
//! use glaze_core::{Secret, SecretStore};
//!
//! let secrets = SecretStore::new();
//! secrets.put("admin", Secret::from("s3cr3t"));
//!
//! assert!(secrets.get("admin").is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod secret;

pub use error::{AdminError, FleetError, FleetErrors, Result};
pub use secret::{Secret, SecretStore};
