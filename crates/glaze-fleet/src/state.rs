//! Per-service fleet state and the service table.
//!
//! The table maps service keys to shared, individually locked
//! [`ServiceState`] values. The reference behavior under concurrent callers
//! was unspecified; here every mutation of a service's state goes through its
//! own `tokio::sync::Mutex`, so overlapping reconcile calls and monitor
//! passes for the same service serialize instead of racing. No `DashMap`
//! guard is ever held across an await point; callers clone the `Arc` out and
//! lock that.

use std::sync::Arc;

use dashmap::DashMap;
use glaze_model::DesiredSpec;
use tokio::sync::Mutex;

use crate::instance::Instance;

/// The configuration object currently driving a service.
#[derive(Debug)]
pub(crate) struct Assignment {
    /// Identity of the driving object.
    pub object: String,
    /// UID of the driving object.
    pub uid: String,
    /// Desired spec, stored in canonical form.
    pub spec: DesiredSpec,
}

/// Mutable state for one managed service.
#[derive(Debug, Default)]
pub(crate) struct ServiceState {
    /// Current member instances, in membership order.
    pub instances: Vec<Arc<Instance>>,
    /// What configuration should be active, if any.
    pub assigned: Option<Assignment>,
    /// Whether every instance successfully carries the current assignment.
    pub converged: bool,
    /// Name of the admin secret in the secret registry.
    pub secret_name: Option<String>,
}

pub(crate) type SharedServiceState = Arc<Mutex<ServiceState>>;

/// Concurrent service-key to service-state table.
#[derive(Debug, Default)]
pub(crate) struct FleetState {
    services: DashMap<String, SharedServiceState>,
}

impl FleetState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The state for `service`, if known.
    pub fn get(&self, service: &str) -> Option<SharedServiceState> {
        self.services.get(service).map(|entry| Arc::clone(&entry))
    }

    /// The state for `service`, created empty on first sight.
    pub fn get_or_insert(&self, service: &str) -> SharedServiceState {
        let entry = self.services.entry(service.to_string()).or_default();
        Arc::clone(&entry)
    }

    /// Drop the state for `service`.
    pub fn remove(&self, service: &str) -> Option<SharedServiceState> {
        self.services.remove(service).map(|(_, state)| state)
    }

    /// All known service keys.
    pub fn service_keys(&self) -> Vec<String> {
        self.services.iter().map(|entry| entry.key().clone()).collect()
    }
}
