//! # glaze-model
//!
//! Desired-state model for the glaze fleet engine.
//!
//! This crate defines the value types describing the full routing/caching
//! configuration of one managed service, and the two derived identities the
//! reconciler keys on:
//!
//! - [`DesiredSpec`] - the aggregate configuration value, with
//!   [`DesiredSpec::canonical`] producing the order-normalized form
//! - [`SpecDigest`] - 64-bit FNV-1a content digest of the canonical form
//! - [`ConfigName`] - protocol-safe configuration identity derived from the
//!   service key, object UID, and digest
//!
//! ## Example
//!
//! ```rust
//! use glaze_model::{Address, BackendService, ConfigName, DesiredSpec};
//!
//! let spec = DesiredSpec {
//!     default_backend: BackendService::new(
//!         "tea-svc",
//!         vec![Address::new("10.0.0.1".parse().unwrap(), 80)],
//!     ),
//!     ..DesiredSpec::default()
//! };
//!
//! let name = ConfigName::new("web/cafe", "d4f1", spec.digest());
//! assert!(ConfigName::is_managed(name.as_str()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod digest;
mod identity;
mod spec;

pub use digest::SpecDigest;
pub use identity::{ConfigName, CONFIG_PREFIX};
pub use spec::{
    AclAddress, AclSpec, Address, AuthKind, AuthSpec, BackendService, Compare, DesiredSpec,
    Director, DirectorKind, MatchTerm, Probe, RoutingRule, ShardCluster,
};
