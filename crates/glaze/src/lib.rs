//! # glaze
//!
//! Fleet reconciliation engine for cache proxies.
//!
//! glaze continuously converges a fleet of independently running cache-proxy
//! instances onto a desired routing/caching configuration, talking to each
//! instance over its stateful administrative channel. It supports:
//!
//! - Deterministic configuration identities (canonical form + content digest)
//! - Minimal, idempotent per-instance convergence
//! - Instance-set diffing as fleet membership changes
//! - Secret propagation through a named registry
//! - Fleet-wide error aggregation that never loses sibling progress
//! - A periodic monitor pass: health checks, drift healing, and
//!   garbage collection of cold configuration generations
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use glaze::prelude::*;
//!
//! let reconciler = Arc::new(
//!     Reconciler::builder()
//!         .connector(connector)
//!         .renderer(renderer)
//!         .build()?,
//! );
//!
//! reconciler.set_secret("admin", secret_bytes).await?;
//! reconciler.upsert_membership("web/cafe", &addrs, "admin", true).await?;
//! reconciler.reconcile("web/cafe", "cafe-routes", uid, &spec).await?;
//! ```
//!
//! ## Architecture
//!
//! This library is organized into several crates:
//!
//! - `glaze-core` - errors, aggregates, and the secret registry
//! - `glaze-model` - the desired-state model and its identities
//! - `glaze-admin` - the administrative protocol contract (plus a test fake)
//! - `glaze-fleet` - convergence, fleet state, reconciler API, monitor loop
//!
//! This crate (`glaze`) re-exports all public APIs for convenience.
//!
//! ## Design Principles
//!
//! 1. **No panics in library code** - all errors are returned as `Result`
//! 2. **Per-instance serialization** - the sequential admin channel never
//!    sees interleaved commands
//! 3. **Idempotent convergence** - repeating a converged operation performs
//!    no mutating protocol calls
//! 4. **Partial failure is first-class** - fleet operations report exactly
//!    which instances failed, and keep going for the rest

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub use glaze_admin as admin;
pub use glaze_core as core;
pub use glaze_fleet as fleet;
pub use glaze_model as model;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use glaze::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use glaze_core::{AdminError, FleetError, FleetErrors, Result, Secret, SecretStore};

    // Model types
    pub use glaze_model::{
        Address, BackendService, ConfigName, DesiredSpec, RoutingRule, ShardCluster, SpecDigest,
    };

    // Admin protocol contract
    pub use glaze_admin::{AdminConnect, AdminSession, ChildStatus, ConfigState, LoadedConfig};

    // Engine types
    pub use glaze_fleet::{
        ConfigRenderer, EventSink, FleetStats, Monitor, Reconciler, ReconcilerBuilder,
        ReconcilerConfig,
    };
}

/// Version information for this crate.
pub mod version {
    /// Crate version.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Minimum supported Rust version.
    pub const MSRV: &str = "1.75";

    /// Get version info as a string.
    pub fn version_string() -> String {
        format!("glaze {} (MSRV {})", VERSION, MSRV)
    }
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn prelude_imports_work() {
        let spec = DesiredSpec {
            default_backend: BackendService::new(
                "tea-svc",
                vec![Address::new("10.0.0.1".parse().unwrap(), 80)],
            ),
            ..DesiredSpec::default()
        };
        let name = ConfigName::new("web/cafe", "d4f1", spec.digest());
        assert!(ConfigName::is_managed(name.as_str()));
    }

    #[test]
    fn builder_surfaces_configuration_errors() {
        let result = Reconciler::builder().build();
        assert!(matches!(result, Err(FleetError::Configuration(_))));
    }

    #[test]
    fn version_info() {
        let version = super::version::version_string();
        assert!(version.contains("glaze"));
    }
}
