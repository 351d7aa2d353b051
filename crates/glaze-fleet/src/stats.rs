//! Reconciliation operation counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for reconciliation and monitor operations.
///
/// All counters are atomic and can be read from any thread. The engine never
/// exports these anywhere itself; embedders poll them into whatever metrics
/// pipeline they run.
#[derive(Debug, Default)]
pub struct FleetStats {
    /// Per-instance convergence attempts.
    convergences: AtomicU64,
    /// Per-instance convergence failures.
    convergence_failures: AtomicU64,
    /// Configurations loaded inline.
    configs_loaded: AtomicU64,
    /// Labels pointed at a new target.
    labels_set: AtomicU64,
    /// Cold configurations discarded by the monitor.
    configs_discarded: AtomicU64,
    /// Completed monitor passes.
    monitor_passes: AtomicU64,
}

impl FleetStats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_convergence(&self) {
        self.convergences.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_convergence_failure(&self) {
        self.convergence_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_config_loaded(&self) {
        self.configs_loaded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_label_set(&self) {
        self.labels_set.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_config_discarded(&self) {
        self.configs_discarded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_monitor_pass(&self) {
        self.monitor_passes.fetch_add(1, Ordering::Relaxed);
    }

    /// Total per-instance convergence attempts.
    #[inline]
    pub fn convergences(&self) -> u64 {
        self.convergences.load(Ordering::Relaxed)
    }

    /// Total per-instance convergence failures.
    #[inline]
    pub fn convergence_failures(&self) -> u64 {
        self.convergence_failures.load(Ordering::Relaxed)
    }

    /// Total configurations loaded inline.
    #[inline]
    pub fn configs_loaded(&self) -> u64 {
        self.configs_loaded.load(Ordering::Relaxed)
    }

    /// Total label updates.
    #[inline]
    pub fn labels_set(&self) -> u64 {
        self.labels_set.load(Ordering::Relaxed)
    }

    /// Total cold configurations discarded.
    #[inline]
    pub fn configs_discarded(&self) -> u64 {
        self.configs_discarded.load(Ordering::Relaxed)
    }

    /// Total completed monitor passes.
    #[inline]
    pub fn monitor_passes(&self) -> u64 {
        self.monitor_passes.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = FleetStats::new();
        stats.record_convergence();
        stats.record_convergence();
        stats.record_convergence_failure();
        stats.record_config_loaded();

        assert_eq!(stats.convergences(), 2);
        assert_eq!(stats.convergence_failures(), 1);
        assert_eq!(stats.configs_loaded(), 1);
        assert_eq!(stats.monitor_passes(), 0);
    }
}
