//! # glaze-fleet
//!
//! The fleet reconciliation engine: converges a fleet of cache-proxy
//! instances onto desired configurations through their administrative
//! channels.
//!
//! - [`Reconciler`] - the public operations the external watch layer calls
//!   (membership, desired spec, secrets, lifecycle)
//! - [`Monitor`] - the periodic health/garbage-collection/self-healing pass
//! - [`Instance`] - one managed instance with its serialized admin channel
//! - [`ConfigRenderer`] / [`EventSink`] - collaborator contracts
//! - [`FleetStats`] - operation counters for embedders to export
//!
//! ## Key Design Decisions
//!
//! - Every admin operation against one instance holds that instance's own
//!   exclusive lock; the stateful sequential channel never sees interleaved
//!   commands
//! - Each service's mutable state sits behind its own `tokio::sync::Mutex`,
//!   so concurrent reconcile calls and monitor passes serialize per service
//! - Fleet operations attempt every instance and aggregate failures rather
//!   than stopping at the first
//! - Convergence checks instance state before each step, so re-running it
//!   against a correct instance performs no mutating protocol calls
//!
//! ## Example
//!
//! ```rust,ignore
//! use glaze_fleet::Reconciler;
//!
//! let reconciler = Arc::new(
//!     Reconciler::builder()
//!         .connector(connector)
//!         .renderer(renderer)
//!         .build()?,
//! );
//!
//! reconciler.set_secret("admin", b"s3cr3t".to_vec()).await?;
//! reconciler.upsert_membership("web/cafe", &addrs, "admin", true).await?;
//! reconciler.reconcile("web/cafe", "cafe-routes", "d4f1", &spec).await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod converge;
mod instance;
mod monitor;
mod notify;
mod reconciler;
mod render;
mod state;
mod stats;

pub use converge::{NOT_AVAILABLE_CONFIG, READINESS_LABEL, READY_CONFIG, REGULAR_LABEL};
pub use instance::Instance;
pub use monitor::Monitor;
pub use notify::{EventSink, TracingEvents};
pub use reconciler::{Reconciler, ReconcilerBuilder, ReconcilerConfig};
pub use render::{ConfigRenderer, RenderError};
pub use stats::FleetStats;
