//! Per-instance convergence.
//!
//! Convergence brings one instance to a target configuration identity with
//! the minimal idempotent command sequence: list what is loaded, load the
//! target only if missing, repoint the two administrative labels only if they
//! point elsewhere. Re-running convergence against an already correct
//! instance costs one connect and one listing, nothing more, which is what
//! makes unconditional re-convergence from the monitor loop affordable.

use std::sync::Arc;
use std::time::Duration;

use glaze_admin::{AdminConnect, AdminSession};
use glaze_core::{AdminError, FleetError, Result, Secret};
use glaze_model::ConfigName;
use tracing::{debug, trace};

use crate::instance::Instance;
use crate::stats::FleetStats;

/// Label resolved by clients; points at the active configuration.
pub const REGULAR_LABEL: &str = "regular";

/// Label resolved by load-balancer health checks.
pub const READINESS_LABEL: &str = "readiness";

/// Sentinel configuration meaning "configured and serving".
///
/// Preloaded on every instance image; the engine only ever points the
/// readiness label at it.
pub const READY_CONFIG: &str = "ready";

/// Sentinel configuration meaning "do not route to this instance".
pub const NOT_AVAILABLE_CONFIG: &str = "not-available";

/// Drives single instances through the admin protocol.
pub(crate) struct Converger {
    connector: Arc<dyn AdminConnect>,
    timeout: Duration,
    stats: Arc<FleetStats>,
}

impl Converger {
    pub fn new(
        connector: Arc<dyn AdminConnect>,
        timeout: Duration,
        stats: Arc<FleetStats>,
    ) -> Self {
        Self {
            connector,
            timeout,
            stats,
        }
    }

    /// Open an authenticated session to `instance`, recording the banner.
    ///
    /// The caller must hold the instance's admin lock.
    pub async fn open(
        &self,
        instance: &Instance,
        secret: &Secret,
    ) -> std::result::Result<Box<dyn AdminSession>, AdminError> {
        let session = self
            .connector
            .connect(instance.socket_addr(), secret, self.timeout)
            .await?;
        instance.record_banner(session.banner());
        Ok(session)
    }

    /// Converge one instance onto the configuration `name` with body `text`.
    ///
    /// Fails fast with a "no secret" error before any I/O if `secret` is
    /// absent. Safe to repeat: each step checks current instance state before
    /// acting. The connection is closed on every exit path.
    pub async fn converge(
        &self,
        instance: &Instance,
        secret: Option<&Secret>,
        name: &ConfigName,
        text: &str,
    ) -> Result<()> {
        let addr = instance.socket_addr();
        let secret = secret.ok_or(FleetError::NoSecret { addr })?;
        self.stats.record_convergence();

        let _serial = instance.serialize().await;
        let mut session = match self.open(instance, secret).await {
            Ok(session) => session,
            Err(err) => {
                self.stats.record_convergence_failure();
                return Err(FleetError::instance(addr, err));
            }
        };

        let result = self.converge_session(session.as_mut(), name, text).await;
        session.close().await;
        result.map_err(|err| {
            self.stats.record_convergence_failure();
            FleetError::instance(addr, err)
        })
    }

    async fn converge_session(
        &self,
        session: &mut dyn AdminSession,
        name: &ConfigName,
        text: &str,
    ) -> std::result::Result<(), AdminError> {
        let loaded = session.list_configs().await?;

        let have_target = loaded
            .iter()
            .any(|config| !config.is_label() && config.name == name.as_str());
        if have_target {
            trace!(config = %name, "target configuration already loaded");
        } else {
            session.load_inline(name.as_str(), text).await?;
            self.stats.record_config_loaded();
            debug!(config = %name, "loaded configuration");
        }

        let regular = label_target(&loaded, REGULAR_LABEL);
        if regular.as_deref() != Some(name.as_str()) {
            session.set_label(REGULAR_LABEL, name.as_str()).await?;
            self.stats.record_label_set();
            debug!(config = %name, "pointed {REGULAR_LABEL} label");
        }

        let readiness = label_target(&loaded, READINESS_LABEL);
        if readiness.as_deref() != Some(READY_CONFIG) {
            session.set_label(READINESS_LABEL, READY_CONFIG).await?;
            self.stats.record_label_set();
            debug!("pointed {READINESS_LABEL} label at {READY_CONFIG}");
        }

        Ok(())
    }

    /// Point the readiness label at the not-available sentinel.
    ///
    /// With `tolerant` set, losing the connection counts as success: the
    /// instance may already be shutting down, which achieves the same end.
    /// Missing secrets are likewise tolerated on the tolerant path.
    pub async fn mark_not_available(
        &self,
        instance: &Instance,
        secret: Option<&Secret>,
        tolerant: bool,
    ) -> Result<()> {
        let addr = instance.socket_addr();
        let Some(secret) = secret else {
            if tolerant {
                debug!(instance = %addr, "no secret for outgoing instance, skipping teardown");
                return Ok(());
            }
            return Err(FleetError::NoSecret { addr });
        };

        let _serial = instance.serialize().await;
        let mut session = match self.open(instance, secret).await {
            Ok(session) => session,
            Err(err) if tolerant && err.is_disconnect() => {
                debug!(instance = %addr, error = %err, "instance gone during teardown");
                return Ok(());
            }
            Err(err) => return Err(FleetError::instance(addr, err)),
        };

        let result = session
            .set_label(READINESS_LABEL, NOT_AVAILABLE_CONFIG)
            .await;
        session.close().await;
        match result {
            Ok(()) => {
                self.stats.record_label_set();
                debug!(instance = %addr, "marked not available");
                Ok(())
            }
            Err(err) if tolerant && err.is_disconnect() => Ok(()),
            Err(err) => Err(FleetError::instance(addr, err)),
        }
    }
}

fn label_target(loaded: &[glaze_admin::LoadedConfig], label: &str) -> Option<String> {
    loaded
        .iter()
        .find(|config| config.is_label() && config.name == label)
        .and_then(|config| config.label.clone())
}

#[cfg(test)]
mod tests {
    use glaze_admin::fake::FakeFleet;
    use glaze_model::{Address, BackendService, DesiredSpec};

    use super::*;

    fn fixture() -> (Arc<FakeFleet>, Converger, Arc<Instance>, Secret) {
        let fleet = Arc::new(FakeFleet::new());
        let converger = Converger::new(
            Arc::clone(&fleet) as Arc<dyn AdminConnect>,
            Duration::from_secs(1),
            Arc::new(FleetStats::new()),
        );
        let addr = Address::new("10.0.0.1".parse().unwrap(), 6082);
        fleet.add_instance(addr.into());
        let instance = Instance::new(addr);
        (fleet, converger, instance, Secret::from("s3cr3t"))
    }

    fn target() -> (ConfigName, String) {
        let spec = DesiredSpec {
            default_backend: BackendService::new(
                "tea-svc",
                vec![Address::new("10.10.0.1".parse().unwrap(), 80)],
            ),
            ..DesiredSpec::default()
        };
        (
            ConfigName::new("web/cafe", "d4f1", spec.digest()),
            "backend tea-svc { }".to_string(),
        )
    }

    #[tokio::test]
    async fn convergence_loads_and_labels() {
        let (fleet, converger, instance, secret) = fixture();
        let (name, text) = target();

        converger
            .converge(&instance, Some(&secret), &name, &text)
            .await
            .unwrap();

        let fake = fleet.instance(instance.socket_addr()).unwrap();
        assert!(fake.has_config(name.as_str()));
        assert_eq!(fake.label_of(REGULAR_LABEL).as_deref(), Some(name.as_str()));
        assert_eq!(fake.label_of(READINESS_LABEL).as_deref(), Some(READY_CONFIG));
        assert!(instance.banner().is_some());
    }

    #[tokio::test]
    async fn repeated_convergence_is_a_read_only_no_op() {
        let (fleet, converger, instance, secret) = fixture();
        let (name, text) = target();

        converger
            .converge(&instance, Some(&secret), &name, &text)
            .await
            .unwrap();
        let fake = fleet.instance(instance.socket_addr()).unwrap();
        let before = fake.counts();

        converger
            .converge(&instance, Some(&secret), &name, &text)
            .await
            .unwrap();
        let after = fake.counts();

        assert_eq!(after.mutations(), before.mutations());
        assert_eq!(after.lists, before.lists + 1);
    }

    #[tokio::test]
    async fn missing_secret_fails_before_any_io() {
        let (fleet, converger, instance, _secret) = fixture();
        let (name, text) = target();

        let err = converger
            .converge(&instance, None, &name, &text)
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::NoSecret { .. }));

        let fake = fleet.instance(instance.socket_addr()).unwrap();
        assert_eq!(fake.counts().connects, 0);
    }

    #[tokio::test]
    async fn load_rejection_aborts_this_instance() {
        let (fleet, converger, instance, secret) = fixture();
        let (name, text) = target();
        let fake = fleet.instance(instance.socket_addr()).unwrap();
        fake.reject_loads(true);

        let err = converger
            .converge(&instance, Some(&secret), &name, &text)
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::Instance { .. }));
        // Labels were never touched.
        assert!(fake.label_of(REGULAR_LABEL).is_none());
    }

    #[tokio::test]
    async fn tolerant_teardown_swallows_disconnects() {
        let (fleet, converger, instance, secret) = fixture();
        let fake = fleet.instance(instance.socket_addr()).unwrap();
        fake.refuse_connections(true);

        converger
            .mark_not_available(&instance, Some(&secret), true)
            .await
            .unwrap();

        let err = converger
            .mark_not_available(&instance, Some(&secret), false)
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::Instance { .. }));
    }

    #[tokio::test]
    async fn teardown_points_readiness_at_not_available() {
        let (fleet, converger, instance, secret) = fixture();

        converger
            .mark_not_available(&instance, Some(&secret), false)
            .await
            .unwrap();

        let fake = fleet.instance(instance.socket_addr()).unwrap();
        assert_eq!(
            fake.label_of(READINESS_LABEL).as_deref(),
            Some(NOT_AVAILABLE_CONFIG)
        );
    }
}
