//! Event reporting collaborator.
//!
//! The monitor loop and the convergence error paths surface human-readable
//! status through this trait, so the engine never depends on a specific
//! notification transport. The default sink forwards to `tracing`.

use tracing::{info, warn};

/// Receives human-readable status events about managed services.
pub trait EventSink: Send + Sync {
    /// Report normal progress for a service.
    fn notify_info(&self, service: &str, reason: &str, message: &str);

    /// Report a degraded or failing condition for a service.
    fn notify_warn(&self, service: &str, reason: &str, message: &str);
}

/// [`EventSink`] that logs events through `tracing`.
#[derive(Debug, Default)]
pub struct TracingEvents;

impl EventSink for TracingEvents {
    fn notify_info(&self, service: &str, reason: &str, message: &str) {
        info!(service = %service, reason = %reason, "{message}");
    }

    fn notify_warn(&self, service: &str, reason: &str, message: &str) {
        warn!(service = %service, reason = %reason, "{message}");
    }
}
