//! One managed cache-proxy instance, and the instance-set diff.

use std::net::SocketAddr;
use std::sync::Mutex as StdMutex;
use std::sync::Arc;

use glaze_model::Address;
use tokio::sync::{Mutex, MutexGuard};

/// One running cache-proxy instance, identified by its administrative
/// endpoint.
///
/// Every administrative operation against the instance is serialized by the
/// instance's own exclusive lock; concurrent attempts block each other
/// instead of interleaving commands on the stateful admin channel. Instances
/// are shared as `Arc<Instance>` so a membership diff can keep the same
/// object (lock included) across updates.
#[derive(Debug)]
pub struct Instance {
    addr: Address,
    serial: Mutex<()>,
    banner: StdMutex<Option<String>>,
}

impl Instance {
    pub(crate) fn new(addr: Address) -> Arc<Self> {
        Arc::new(Self {
            addr,
            serial: Mutex::new(()),
            banner: StdMutex::new(None),
        })
    }

    /// The instance's administrative endpoint.
    pub fn addr(&self) -> Address {
        self.addr
    }

    /// The administrative endpoint as a socket address.
    pub fn socket_addr(&self) -> SocketAddr {
        self.addr.into()
    }

    /// The banner from the most recent successful connect, if any.
    pub fn banner(&self) -> Option<String> {
        self.banner.lock().unwrap().clone()
    }

    /// Acquire the instance's exclusive admin lock.
    pub(crate) async fn serialize(&self) -> MutexGuard<'_, ()> {
        self.serial.lock().await
    }

    pub(crate) fn record_banner(&self, banner: &str) {
        *self.banner.lock().unwrap() = Some(banner.to_string());
    }
}

/// Outcome of diffing a previous instance set against a new address list.
#[derive(Debug, Default)]
pub(crate) struct InstanceDiff {
    /// Instances whose address is present in both sets. Same objects as
    /// before, locks and all.
    pub kept: Vec<Arc<Instance>>,
    /// Freshly created instances for addresses not previously present.
    pub created: Vec<Arc<Instance>>,
    /// Instances whose address is gone from the new list.
    pub removed: Vec<Arc<Instance>>,
}

impl InstanceDiff {
    /// The new instance set: kept followed by created.
    pub fn merged(&self) -> Vec<Arc<Instance>> {
        self.kept.iter().chain(self.created.iter()).cloned().collect()
    }
}

/// Partition `previous` against `addrs` into kept, created, and removed.
pub(crate) fn diff_instances(previous: &[Arc<Instance>], addrs: &[Address]) -> InstanceDiff {
    let mut diff = InstanceDiff::default();

    for instance in previous {
        if addrs.contains(&instance.addr()) {
            diff.kept.push(Arc::clone(instance));
        } else {
            diff.removed.push(Arc::clone(instance));
        }
    }
    for addr in addrs {
        if !previous.iter().any(|instance| instance.addr() == *addr) {
            diff.created.push(Instance::new(*addr));
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> Address {
        Address::new(format!("10.0.0.{last}").parse().unwrap(), 6082)
    }

    #[test]
    fn diff_partitions_kept_created_removed() {
        let previous = vec![
            Instance::new(addr(1)),
            Instance::new(addr(2)),
            Instance::new(addr(3)),
        ];
        let diff = diff_instances(&previous, &[addr(2), addr(3), addr(4)]);

        let kept: Vec<_> = diff.kept.iter().map(|i| i.addr()).collect();
        assert_eq!(kept, vec![addr(2), addr(3)]);
        // Kept instances are the same objects, not copies.
        assert!(Arc::ptr_eq(&diff.kept[0], &previous[1]));
        assert!(Arc::ptr_eq(&diff.kept[1], &previous[2]));

        let created: Vec<_> = diff.created.iter().map(|i| i.addr()).collect();
        assert_eq!(created, vec![addr(4)]);

        let removed: Vec<_> = diff.removed.iter().map(|i| i.addr()).collect();
        assert_eq!(removed, vec![addr(1)]);
    }

    #[test]
    fn merged_is_kept_then_created() {
        let previous = vec![Instance::new(addr(1))];
        let diff = diff_instances(&previous, &[addr(2), addr(1)]);

        let merged: Vec<_> = diff.merged().iter().map(|i| i.addr()).collect();
        assert_eq!(merged, vec![addr(1), addr(2)]);
    }

    #[test]
    fn diff_of_identical_sets_changes_nothing() {
        let previous = vec![Instance::new(addr(1)), Instance::new(addr(2))];
        let diff = diff_instances(&previous, &[addr(1), addr(2)]);
        assert_eq!(diff.kept.len(), 2);
        assert!(diff.created.is_empty());
        assert!(diff.removed.is_empty());
    }
}
