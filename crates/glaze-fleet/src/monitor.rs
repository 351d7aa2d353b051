//! Periodic fleet monitor.
//!
//! Each pass health-checks every instance of every service: ping, worker
//! status, captured fault reports, and a configuration listing from which
//! cold engine-managed generations are discarded. The pass then re-invokes
//! convergence for the service unconditionally, which heals drift and picks
//! up instances that missed an update. No failure propagates out of a pass;
//! everything becomes a warning and the pass moves on.

use std::sync::Arc;
use std::time::Duration;

use glaze_admin::{AdminSession, ConfigState};
use glaze_core::{AdminError, FleetError, Secret};
use glaze_model::ConfigName;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::instance::Instance;
use crate::reconciler::Reconciler;

/// The periodic monitor over one reconciler's fleet.
pub struct Monitor {
    reconciler: Arc<Reconciler>,
    interval: Duration,
}

impl Monitor {
    /// Create a monitor running a pass every `interval`.
    pub fn new(reconciler: Arc<Reconciler>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Run passes until `shutdown` flips to `true` or its sender drops.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.pass().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("monitor loop exiting");
    }

    /// Run one monitor pass over every known service.
    pub async fn pass(&self) {
        for service in self.reconciler.services() {
            self.check_service(&service).await;
        }
        self.reconciler.stats.record_monitor_pass();
    }

    async fn check_service(&self, service: &str) {
        let Some(shared) = self.reconciler.state.get(service) else {
            return;
        };

        // Snapshot membership, then release the service lock for the health
        // pass; instance locks serialize the actual protocol traffic.
        let (instances, secret) = {
            let state = shared.lock().await;
            let secret = state
                .secret_name
                .as_deref()
                .and_then(|name| self.reconciler.secrets.get(name));
            (state.instances.clone(), secret)
        };

        let mut healthy = true;
        for instance in &instances {
            if let Err(err) = self.check_instance(service, instance, secret.as_ref()).await {
                healthy = false;
                warn!(service, instance = %instance.addr(), error = %err, "instance check failed");
                self.reconciler
                    .events
                    .notify_warn(service, "MonitorInstance", &err.to_string());
            }
        }

        // Unconditional re-convergence: heals drift and missed updates.
        let result = {
            let mut state = shared.lock().await;
            self.reconciler.apply_assignment(service, &mut state).await
        };
        match result {
            Ok(()) if healthy => {
                self.reconciler
                    .events
                    .notify_info(service, "MonitorHealthy", "all instances healthy and converged");
            }
            Ok(()) => {
                self.reconciler.events.notify_warn(
                    service,
                    "MonitorDegraded",
                    "service converged with degraded instances",
                );
            }
            Err(err) => {
                self.reconciler
                    .events
                    .notify_warn(service, "MonitorDegraded", &err.to_string());
            }
        }
    }

    async fn check_instance(
        &self,
        service: &str,
        instance: &Arc<Instance>,
        secret: Option<&Secret>,
    ) -> Result<(), FleetError> {
        let addr = instance.socket_addr();
        let Some(secret) = secret else {
            warn!(service, instance = %addr, "no admin secret known, skipping check");
            return Ok(());
        };

        let _serial = instance.serialize().await;
        let mut session = self
            .reconciler
            .converger
            .open(instance, secret)
            .await
            .map_err(|err| FleetError::instance(addr, err))?;

        let result = self.check_session(service, addr, session.as_mut()).await;
        session.close().await;
        result.map_err(|err| FleetError::instance(addr, err))
    }

    async fn check_session(
        &self,
        service: &str,
        addr: std::net::SocketAddr,
        session: &mut dyn AdminSession,
    ) -> Result<(), AdminError> {
        session.ping().await?;

        let status = session.status().await?;
        if !status.is_running() {
            warn!(service, instance = %addr, ?status, "worker not running");
        }

        if let Some(fault) = session.fault().await? {
            warn!(service, instance = %addr, %fault, "instance captured a fault");
            self.reconciler
                .events
                .notify_warn(service, "InstanceFault", &fault);
        }

        for config in session.list_configs().await? {
            if config.is_label() || config.state != ConfigState::Cold {
                continue;
            }
            if !ConfigName::is_managed(&config.name) {
                continue;
            }
            session.discard(&config.name).await?;
            self.reconciler.stats.record_config_discarded();
            info!(service, instance = %addr, config = %config.name,
                "discarded cold configuration generation");
        }

        Ok(())
    }
}
