//! The administrative protocol contract.
//!
//! One cache-proxy instance is reachable through a stateful, sequential
//! administrative text channel. This module defines only the contract the
//! reconciliation engine relies on; the wire protocol behind it is a
//! transport concern and lives with the embedder.
//!
//! A connection is obtained from an [`AdminConnect`] and used through
//! [`AdminSession`]. Sessions are sequential: one command at a time, in
//! order. Serialization across tasks is the caller's job (the engine holds a
//! per-instance lock around every session).

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use glaze_core::{AdminError, Secret};

/// State of one loaded configuration as reported by an instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigState {
    /// Currently serving traffic.
    Active,
    /// Loaded and warm, not active.
    Available,
    /// No longer referenced; eligible for discard.
    Cold,
}

/// One entry from a configuration listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadedConfig {
    /// Configuration or label name.
    pub name: String,
    /// Set when this entry is a label: the configuration it points at.
    pub label: Option<String>,
    /// Reported state.
    pub state: ConfigState,
}

impl LoadedConfig {
    /// Whether this entry is a label rather than a configuration.
    pub fn is_label(&self) -> bool {
        self.label.is_some()
    }
}

/// Run state of the instance's worker process.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChildStatus {
    /// Worker is running.
    Running,
    /// Worker is stopped.
    Stopped,
    /// Any other reported state, verbatim.
    Other(String),
}

impl ChildStatus {
    /// Whether the worker is in the running state.
    pub fn is_running(&self) -> bool {
        matches!(self, ChildStatus::Running)
    }
}

/// Opens administrative connections to instances.
#[async_trait]
pub trait AdminConnect: Send + Sync {
    /// Connect to `addr`, authenticate with `secret`, and return a session.
    ///
    /// The whole handshake is bounded by `timeout`.
    async fn connect(
        &self,
        addr: SocketAddr,
        secret: &Secret,
        timeout: Duration,
    ) -> Result<Box<dyn AdminSession>, AdminError>;
}

/// One open administrative session.
///
/// Commands are issued strictly one at a time. Every method may fail with a
/// protocol rejection or a transport error; after a transport error the
/// session is dead and must be closed.
#[async_trait]
pub trait AdminSession: Send {
    /// The banner the instance sent on connect.
    fn banner(&self) -> &str;

    /// Liveness check.
    async fn ping(&mut self) -> Result<(), AdminError>;

    /// Report the worker process state.
    async fn status(&mut self) -> Result<ChildStatus, AdminError>;

    /// Fetch the last captured fault report, if any.
    async fn fault(&mut self) -> Result<Option<String>, AdminError>;

    /// List loaded configurations and labels.
    async fn list_configs(&mut self) -> Result<Vec<LoadedConfig>, AdminError>;

    /// Load `text` as an inline configuration under `name`.
    async fn load_inline(&mut self, name: &str, text: &str) -> Result<(), AdminError>;

    /// Point `label` at the configuration `name`.
    async fn set_label(&mut self, label: &str, name: &str) -> Result<(), AdminError>;

    /// Discard the configuration `name`.
    async fn discard(&mut self, name: &str) -> Result<(), AdminError>;

    /// Close the session. Always safe to call; never fails.
    async fn close(&mut self);
}
