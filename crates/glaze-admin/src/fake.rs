//! In-memory protocol fake for tests.
//!
//! [`FakeFleet`] implements [`AdminConnect`] over a set of in-memory
//! instances. Each instance keeps its loaded configurations, labels, worker
//! state, and per-operation call counts, and can be programmed to refuse
//! connections, demand a specific secret, or reject loads.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use glaze_core::{AdminError, Secret};

use crate::client::{AdminConnect, AdminSession, ChildStatus, ConfigState, LoadedConfig};

/// Per-operation call counts for one fake instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FakeCounts {
    /// Successful connects.
    pub connects: usize,
    /// `ping` calls.
    pub pings: usize,
    /// `list_configs` calls.
    pub lists: usize,
    /// `load_inline` calls.
    pub loads: usize,
    /// `set_label` calls.
    pub labels: usize,
    /// `discard` calls.
    pub discards: usize,
}

impl FakeCounts {
    /// Calls that mutate instance state (loads + labels + discards).
    pub fn mutations(&self) -> usize {
        self.loads + self.labels + self.discards
    }
}

#[derive(Debug)]
struct FakeState {
    configs: HashMap<String, ConfigState>,
    labels: HashMap<String, String>,
    child: ChildStatus,
    fault: Option<String>,
    counts: FakeCounts,
    refuse_connect: bool,
    reject_loads: bool,
    required_secret: Option<Secret>,
}

/// One in-memory cache-proxy instance.
///
/// Fresh instances come with the `ready` and `not-available` sentinel
/// configurations preloaded, the way production images ship them.
#[derive(Debug)]
pub struct FakeInstance {
    addr: SocketAddr,
    state: Mutex<FakeState>,
}

impl FakeInstance {
    fn new(addr: SocketAddr) -> Self {
        let configs = HashMap::from([
            ("ready".to_string(), ConfigState::Available),
            ("not-available".to_string(), ConfigState::Available),
        ]);
        Self {
            addr,
            state: Mutex::new(FakeState {
                configs,
                labels: HashMap::new(),
                child: ChildStatus::Running,
                fault: None,
                counts: FakeCounts::default(),
                refuse_connect: false,
                reject_loads: false,
                required_secret: None,
            }),
        }
    }

    /// The instance's administrative endpoint.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Refuse (or stop refusing) new connections.
    pub fn refuse_connections(&self, refuse: bool) {
        self.state.lock().unwrap().refuse_connect = refuse;
    }

    /// Reject (or stop rejecting) `load_inline` calls.
    pub fn reject_loads(&self, reject: bool) {
        self.state.lock().unwrap().reject_loads = reject;
    }

    /// Demand that connects present exactly `secret`.
    pub fn require_secret(&self, secret: Secret) {
        self.state.lock().unwrap().required_secret = Some(secret);
    }

    /// Set the reported worker state.
    pub fn set_child_status(&self, status: ChildStatus) {
        self.state.lock().unwrap().child = status;
    }

    /// Set the captured fault report.
    pub fn set_fault(&self, fault: impl Into<String>) {
        self.state.lock().unwrap().fault = Some(fault.into());
    }

    /// Preload a configuration in the given state.
    pub fn preload(&self, name: impl Into<String>, state: ConfigState) {
        self.state.lock().unwrap().configs.insert(name.into(), state);
    }

    /// The configuration a label currently points at.
    pub fn label_of(&self, label: &str) -> Option<String> {
        self.state.lock().unwrap().labels.get(label).cloned()
    }

    /// Whether a configuration with `name` is loaded.
    pub fn has_config(&self, name: &str) -> bool {
        self.state.lock().unwrap().configs.contains_key(name)
    }

    /// The state of the configuration `name`, if loaded.
    pub fn config_state(&self, name: &str) -> Option<ConfigState> {
        self.state.lock().unwrap().configs.get(name).copied()
    }

    /// Snapshot of the call counts.
    pub fn counts(&self) -> FakeCounts {
        self.state.lock().unwrap().counts
    }
}

/// An [`AdminConnect`] over a set of [`FakeInstance`]s.
#[derive(Debug, Default)]
pub struct FakeFleet {
    instances: Mutex<HashMap<SocketAddr, Arc<FakeInstance>>>,
}

impl FakeFleet {
    /// Create an empty fake fleet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance at `addr` and return a handle to it.
    pub fn add_instance(&self, addr: SocketAddr) -> Arc<FakeInstance> {
        let instance = Arc::new(FakeInstance::new(addr));
        self.instances
            .lock()
            .unwrap()
            .insert(addr, Arc::clone(&instance));
        instance
    }

    /// The instance registered at `addr`, if any.
    pub fn instance(&self, addr: SocketAddr) -> Option<Arc<FakeInstance>> {
        self.instances.lock().unwrap().get(&addr).cloned()
    }
}

#[async_trait]
impl AdminConnect for FakeFleet {
    async fn connect(
        &self,
        addr: SocketAddr,
        secret: &Secret,
        _timeout: Duration,
    ) -> Result<Box<dyn AdminSession>, AdminError> {
        let instance = self
            .instances
            .lock()
            .unwrap()
            .get(&addr)
            .cloned()
            .ok_or_else(|| AdminError::Connect {
                addr,
                reason: "connection refused".into(),
            })?;

        {
            let mut state = instance.state.lock().unwrap();
            if state.refuse_connect {
                return Err(AdminError::Connect {
                    addr,
                    reason: "connection refused".into(),
                });
            }
            if let Some(required) = &state.required_secret {
                if required != secret {
                    return Err(AdminError::AuthRejected { addr });
                }
            }
            state.counts.connects += 1;
        }

        Ok(Box::new(FakeSession {
            banner: format!("fake-cache-proxy admin on {addr}"),
            instance,
        }))
    }
}

struct FakeSession {
    banner: String,
    instance: Arc<FakeInstance>,
}

#[async_trait]
impl AdminSession for FakeSession {
    fn banner(&self) -> &str {
        &self.banner
    }

    async fn ping(&mut self) -> Result<(), AdminError> {
        self.instance.state.lock().unwrap().counts.pings += 1;
        Ok(())
    }

    async fn status(&mut self) -> Result<ChildStatus, AdminError> {
        Ok(self.instance.state.lock().unwrap().child.clone())
    }

    async fn fault(&mut self) -> Result<Option<String>, AdminError> {
        Ok(self.instance.state.lock().unwrap().fault.clone())
    }

    async fn list_configs(&mut self) -> Result<Vec<LoadedConfig>, AdminError> {
        let mut state = self.instance.state.lock().unwrap();
        state.counts.lists += 1;

        let mut listing: Vec<LoadedConfig> = state
            .configs
            .iter()
            .map(|(name, config_state)| LoadedConfig {
                name: name.clone(),
                label: None,
                state: *config_state,
            })
            .collect();
        listing.extend(state.labels.iter().map(|(label, target)| LoadedConfig {
            name: label.clone(),
            label: Some(target.clone()),
            state: ConfigState::Available,
        }));
        listing.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listing)
    }

    async fn load_inline(&mut self, name: &str, _text: &str) -> Result<(), AdminError> {
        let mut state = self.instance.state.lock().unwrap();
        state.counts.loads += 1;
        if state.reject_loads {
            return Err(AdminError::Rejected {
                op: "load_inline",
                status: 106,
                message: format!("compilation of {name} failed"),
            });
        }
        state.configs.insert(name.to_string(), ConfigState::Available);
        Ok(())
    }

    async fn set_label(&mut self, label: &str, name: &str) -> Result<(), AdminError> {
        let mut state = self.instance.state.lock().unwrap();
        state.counts.labels += 1;
        if !state.configs.contains_key(name) {
            return Err(AdminError::Rejected {
                op: "set_label",
                status: 106,
                message: format!("no configuration named {name}"),
            });
        }
        state.labels.insert(label.to_string(), name.to_string());
        Ok(())
    }

    async fn discard(&mut self, name: &str) -> Result<(), AdminError> {
        let mut state = self.instance.state.lock().unwrap();
        state.counts.discards += 1;
        if state.labels.values().any(|target| target == name) {
            return Err(AdminError::Rejected {
                op: "discard",
                status: 300,
                message: format!("{name} is labeled"),
            });
        }
        match state.configs.get(name) {
            Some(ConfigState::Active) => Err(AdminError::Rejected {
                op: "discard",
                status: 300,
                message: format!("{name} is active"),
            }),
            Some(_) => {
                state.configs.remove(name);
                Ok(())
            }
            None => Err(AdminError::Rejected {
                op: "discard",
                status: 106,
                message: format!("no configuration named {name}"),
            }),
        }
    }

    async fn close(&mut self) {}
}
