//! The reconciler: public operations consumed by the external watch layer.
//!
//! All fleet state lives here, in memory: the service table, the secret
//! registry, and the operation counters. Nothing is persisted; on restart the
//! watch layer replays its current snapshot and live instances are queried
//! fresh.
//!
//! Fleet-wide operations always attempt every instance before returning and
//! aggregate per-instance failures, so one stuck instance never hides the
//! outcome on its siblings.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use glaze_admin::AdminConnect;
use glaze_core::{FleetError, FleetErrors, Result, Secret, SecretStore};
use glaze_model::{Address, ConfigName, DesiredSpec};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::converge::Converger;
use crate::instance::{diff_instances, Instance};
use crate::monitor::Monitor;
use crate::notify::{EventSink, TracingEvents};
use crate::render::ConfigRenderer;
use crate::state::{Assignment, FleetState, ServiceState};
use crate::stats::FleetStats;

/// Tuning knobs for the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Timeout for opening one administrative connection.
    pub connect_timeout: Duration,
    /// Interval between monitor passes.
    pub monitor_interval: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            monitor_interval: Duration::from_secs(30),
        }
    }
}

struct MonitorTask {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Fleet reconciliation engine.
///
/// Converges every instance of every managed service onto the service's
/// desired configuration, tracks convergence, and garbage-collects stale
/// configuration generations through the monitor loop.
pub struct Reconciler {
    pub(crate) state: FleetState,
    pub(crate) secrets: SecretStore,
    pub(crate) converger: Converger,
    renderer: Arc<dyn ConfigRenderer>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) stats: Arc<FleetStats>,
    pub(crate) config: ReconcilerConfig,
    running: StdMutex<Option<MonitorTask>>,
    fatal: StdMutex<Option<mpsc::Sender<FleetError>>>,
}

impl Reconciler {
    /// Start building a reconciler.
    pub fn builder() -> ReconcilerBuilder {
        ReconcilerBuilder::new()
    }

    /// Create, update, or re-shape a service's instance membership.
    ///
    /// Creates the service state on first sight, diffs the previous instance
    /// set against `addrs` (kept instances survive with their locks intact),
    /// rebinds the admin secret reference, and tolerantly tells removed
    /// instances to stop advertising readiness. When `load` is set and a
    /// configuration is assigned, the whole service is re-converged; callers
    /// pass `false` when membership moved but the configuration content did
    /// not.
    pub async fn upsert_membership(
        &self,
        service: &str,
        addrs: &[Address],
        secret_name: &str,
        load: bool,
    ) -> Result<()> {
        let shared = self.state.get_or_insert(service);
        let mut state = shared.lock().await;
        state.secret_name = Some(secret_name.to_string());

        let diff = diff_instances(&state.instances, addrs);
        if !diff.created.is_empty() || !diff.removed.is_empty() {
            info!(
                service,
                kept = diff.kept.len(),
                created = diff.created.len(),
                removed = diff.removed.len(),
                "instance set changed"
            );
        }
        state.instances = diff.merged();

        let secret = self.secrets.get(secret_name);
        for instance in &diff.removed {
            if let Err(err) = self
                .converger
                .mark_not_available(instance, secret.as_ref(), true)
                .await
            {
                // The tolerant path already swallowed disconnects; anything
                // surviving is an active refusal from an instance on its way
                // out, not a membership failure.
                warn!(service, instance = %instance.addr(), error = %err,
                    "outgoing instance refused teardown");
            }
        }

        if load {
            self.apply_assignment(service, &mut state).await
        } else {
            if !diff.created.is_empty() {
                // New instances have not seen the assignment yet; the monitor
                // loop converges them.
                state.converged = false;
            }
            Ok(())
        }
    }

    /// Tear down a service's membership entirely.
    ///
    /// Every remaining instance is told to stop advertising readiness; the
    /// service state is discarded only if that succeeded everywhere.
    pub async fn remove_membership(&self, service: &str) -> Result<()> {
        let Some(shared) = self.state.get(service) else {
            return Ok(());
        };
        let mut state = shared.lock().await;

        let secret = state
            .secret_name
            .as_deref()
            .and_then(|name| self.secrets.get(name));
        let mut errors = FleetErrors::new(state.instances.len());
        for instance in &state.instances {
            if let Err(err) = self
                .converger
                .mark_not_available(instance, secret.as_ref(), false)
                .await
            {
                errors.push(err);
            }
        }

        if errors.is_empty() {
            drop(state);
            self.state.remove(service);
            info!(service, "service state removed");
            Ok(())
        } else {
            warn!(service, failed = errors.len(), "keeping service state, teardown incomplete");
            errors.into_result()
        }
    }

    /// Set or replace the desired configuration for a service.
    ///
    /// Refuses if a different object is already driving this service (the
    /// previous association must be deleted first). Stores the canonical
    /// spec, marks the service not yet converged, then converges every
    /// instance, aggregating per-instance failures.
    pub async fn reconcile(
        &self,
        service: &str,
        object: &str,
        uid: &str,
        spec: &DesiredSpec,
    ) -> Result<()> {
        let Some(shared) = self.state.get(service) else {
            return Err(FleetError::NoInstances {
                service: service.to_string(),
            });
        };
        let mut state = shared.lock().await;

        if let Some(current) = &state.assigned {
            if current.object != object {
                return Err(FleetError::AlreadyAssigned {
                    service: service.to_string(),
                    current: current.object.clone(),
                    requested: object.to_string(),
                });
            }
        }

        state.assigned = Some(Assignment {
            object: object.to_string(),
            uid: uid.to_string(),
            spec: spec.canonical(),
        });
        state.converged = false;

        if state.instances.is_empty() {
            return Err(FleetError::NoInstances {
                service: service.to_string(),
            });
        }

        let instances = state.instances.len();
        let result = self.apply_assignment(service, &mut state).await;
        if result.is_ok() {
            self.events.notify_info(
                service,
                "Configured",
                &format!("configuration from {object} applied to {instances} instances"),
            );
        }
        result
    }

    /// Delete the association between a service and its driving object.
    ///
    /// Refuses if the service is driven by a different object. Instances are
    /// told non-tolerantly to stop advertising readiness; the stored spec is
    /// cleared only if that succeeded everywhere.
    pub async fn unassign(&self, service: &str, object: &str) -> Result<()> {
        let Some(shared) = self.state.get(service) else {
            return Err(FleetError::NotAssigned {
                service: service.to_string(),
                requested: object.to_string(),
            });
        };
        let mut state = shared.lock().await;

        match &state.assigned {
            Some(current) if current.object == object => {}
            _ => {
                return Err(FleetError::NotAssigned {
                    service: service.to_string(),
                    requested: object.to_string(),
                });
            }
        }

        let secret = state
            .secret_name
            .as_deref()
            .and_then(|name| self.secrets.get(name));
        let mut errors = FleetErrors::new(state.instances.len());
        for instance in &state.instances {
            if let Err(err) = self
                .converger
                .mark_not_available(instance, secret.as_ref(), false)
                .await
            {
                errors.push(err);
            }
        }

        if errors.is_empty() {
            state.assigned = None;
            state.converged = false;
            self.events
                .notify_info(service, "Unconfigured", &format!("configuration from {object} withdrawn"));
            Ok(())
        } else {
            errors.into_result()
        }
    }

    /// Whether the service is converged on exactly this configuration.
    ///
    /// True iff the service is marked converged and its stored
    /// (object, uid, spec) triple equals the canonical form of the supplied
    /// one. The caller's short-circuit for skipping redundant reconciles.
    pub async fn is_converged(
        &self,
        service: &str,
        object: &str,
        uid: &str,
        spec: &DesiredSpec,
    ) -> bool {
        let Some(shared) = self.state.get(service) else {
            return false;
        };
        let state = shared.lock().await;
        if !state.converged {
            return false;
        }
        match &state.assigned {
            Some(current) => {
                current.object == object && current.uid == uid && current.spec == *spec
            }
            None => false,
        }
    }

    /// Store or replace an admin secret, then re-converge every service that
    /// references it.
    pub async fn set_secret(&self, secret_name: &str, bytes: impl Into<Vec<u8>>) -> Result<()> {
        self.secrets.put(secret_name, Secret::new(bytes));
        info!(secret = secret_name, "admin secret stored");

        let mut attempted = 0;
        let mut failures = Vec::new();
        for service in self.state.service_keys() {
            let Some(shared) = self.state.get(&service) else {
                continue;
            };
            let mut state = shared.lock().await;
            if state.secret_name.as_deref() != Some(secret_name) {
                continue;
            }
            attempted += 1;
            if let Err(err) = self.apply_assignment(&service, &mut state).await {
                failures.push(err);
            }
        }

        let mut errors = FleetErrors::new(attempted);
        for failure in failures {
            errors.push(failure);
        }
        errors.into_result()
    }

    /// Forget an admin secret.
    ///
    /// Convergence for referencing services fails fast with a "no secret"
    /// error until the secret is set again.
    pub fn clear_secret(&self, secret_name: &str) {
        if self.secrets.remove(secret_name).is_some() {
            info!(secret = secret_name, "admin secret cleared");
        }
    }

    /// Re-associate an already-known secret with a service and re-converge.
    pub async fn set_secret_for_membership(
        &self,
        service: &str,
        secret_name: &str,
    ) -> Result<()> {
        let Some(shared) = self.state.get(service) else {
            return Err(FleetError::NoInstances {
                service: service.to_string(),
            });
        };
        let mut state = shared.lock().await;
        state.secret_name = Some(secret_name.to_string());
        self.apply_assignment(service, &mut state).await
    }

    /// The current member instances of a service.
    pub async fn instances(&self, service: &str) -> Vec<Arc<Instance>> {
        match self.state.get(service) {
            Some(shared) => shared.lock().await.instances.clone(),
            None => Vec::new(),
        }
    }

    /// All known service keys.
    pub fn services(&self) -> Vec<String> {
        self.state.service_keys()
    }

    /// Operation counters.
    pub fn stats(&self) -> &FleetStats {
        &self.stats
    }

    /// Spawn the monitor loop.
    ///
    /// Fatal, non-recoverable conditions (renderer loss) are surfaced on
    /// `fatal` for the process supervisor. Calling `start` while the loop is
    /// already running is a no-op.
    pub fn start(self: &Arc<Self>, fatal: mpsc::Sender<FleetError>) {
        let mut running = self.running.lock().unwrap();
        if running.is_some() {
            warn!("monitor loop already running");
            return;
        }
        *self.fatal.lock().unwrap() = Some(fatal);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let monitor = Monitor::new(Arc::clone(self), self.config.monitor_interval);
        let task = tokio::spawn(monitor.run(shutdown_rx));
        *running = Some(MonitorTask { shutdown, task });
        info!(interval = ?self.config.monitor_interval, "monitor loop started");
    }

    /// Stop the monitor loop, letting an in-flight pass finish.
    pub async fn stop(&self) {
        let stopped = self.running.lock().unwrap().take();
        let Some(MonitorTask { shutdown, task }) = stopped else {
            return;
        };
        let _ = shutdown.send(true);
        if task.await.is_err() {
            warn!("monitor task aborted");
        }
        *self.fatal.lock().unwrap() = None;
        info!("monitor loop stopped");
    }

    /// Converge every instance onto the service's current assignment.
    ///
    /// No-op when nothing is assigned or the service has no instances.
    /// Expects the service state lock to be held by the caller.
    pub(crate) async fn apply_assignment(
        &self,
        service: &str,
        state: &mut ServiceState,
    ) -> Result<()> {
        let Some(assignment) = state.assigned.as_ref() else {
            return Ok(());
        };
        if state.instances.is_empty() {
            return Ok(());
        }

        let name = ConfigName::new(service, &assignment.uid, assignment.spec.digest());
        let text = match self.renderer.render(&assignment.spec) {
            Ok(text) => text,
            Err(err) => {
                let reason = err.to_string();
                self.events.notify_warn(service, "RenderFailed", &reason);
                self.send_fatal(FleetError::Render {
                    service: service.to_string(),
                    reason: reason.clone(),
                });
                return Err(FleetError::Render {
                    service: service.to_string(),
                    reason,
                });
            }
        };

        let secret = state
            .secret_name
            .as_deref()
            .and_then(|name| self.secrets.get(name));
        let mut errors = FleetErrors::new(state.instances.len());
        for instance in &state.instances {
            if let Err(err) = self
                .converger
                .converge(instance, secret.as_ref(), &name, &text)
                .await
            {
                warn!(service, instance = %instance.addr(), error = %err, "convergence failed");
                errors.push(err);
            }
        }

        if errors.is_empty() {
            state.converged = true;
            debug!(service, config = %name, "service converged");
            Ok(())
        } else {
            state.converged = false;
            self.events
                .notify_warn(service, "ConvergenceIncomplete", &errors.to_string());
            errors.into_result()
        }
    }

    fn send_fatal(&self, error: FleetError) {
        let sender = self.fatal.lock().unwrap().clone();
        if let Some(sender) = sender {
            if sender.try_send(error).is_err() {
                warn!("supervisor channel full or closed, fatal error dropped");
            }
        }
    }
}

/// Builder for [`Reconciler`].
///
/// # Example
///
/// ```rust,ignore
/// let reconciler = Reconciler::builder()
///     .connector(connector)
///     .renderer(renderer)
///     .connect_timeout(Duration::from_secs(5))
///     .build()?;
/// ```
#[derive(Default)]
pub struct ReconcilerBuilder {
    connector: Option<Arc<dyn AdminConnect>>,
    renderer: Option<Arc<dyn ConfigRenderer>>,
    events: Option<Arc<dyn EventSink>>,
    config: ReconcilerConfig,
}

impl ReconcilerBuilder {
    /// Create a builder with default tuning.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the admin connector. Required.
    pub fn connector(mut self, connector: Arc<dyn AdminConnect>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Set the configuration renderer. Required.
    pub fn renderer(mut self, renderer: Arc<dyn ConfigRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Set the event sink. Defaults to logging through `tracing`.
    pub fn events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Set the admin connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the monitor pass interval.
    pub fn monitor_interval(mut self, interval: Duration) -> Self {
        self.config.monitor_interval = interval;
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the connector or renderer is missing.
    pub fn build(self) -> Result<Reconciler> {
        let connector = self.connector.ok_or_else(|| {
            FleetError::Configuration("an admin connector is required".into())
        })?;
        let renderer = self.renderer.ok_or_else(|| {
            FleetError::Configuration("a configuration renderer is required".into())
        })?;
        let events = self
            .events
            .unwrap_or_else(|| Arc::new(TracingEvents) as Arc<dyn EventSink>);
        let stats = Arc::new(FleetStats::new());

        Ok(Reconciler {
            state: FleetState::new(),
            secrets: SecretStore::new(),
            converger: Converger::new(connector, self.config.connect_timeout, Arc::clone(&stats)),
            renderer,
            events,
            stats,
            config: self.config,
            running: StdMutex::new(None),
            fatal: StdMutex::new(None),
        })
    }
}
