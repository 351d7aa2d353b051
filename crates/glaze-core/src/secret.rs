//! Admin secrets and the secret registry.
//!
//! Secrets are never aliased between holders. Instead, [`SecretStore`] keys
//! secret bytes by name and every holder keeps the name, resolving it at use
//! time. Replacing an entry is therefore immediately visible to every holder,
//! and removing one makes the next resolution fail fast.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;

/// Secret bytes used to authenticate an administrative connection.
///
/// Cheap to clone; the `Debug` impl never prints the bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(Arc<[u8]>);

impl Secret {
    /// Create a secret from raw bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into().into())
    }

    /// The secret bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the secret in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret({} bytes)", self.0.len())
    }
}

impl From<&str> for Secret {
    fn from(s: &str) -> Self {
        Self::new(s.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Secret {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

/// Registry of admin secrets keyed by secret name.
#[derive(Debug, Default)]
pub struct SecretStore {
    entries: DashMap<String, Secret>,
}

impl SecretStore {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or replace the secret under `name`.
    ///
    /// Returns `true` if an existing entry was replaced.
    pub fn put(&self, name: impl Into<String>, secret: Secret) -> bool {
        self.entries.insert(name.into(), secret).is_some()
    }

    /// Resolve the secret under `name`.
    pub fn get(&self, name: &str) -> Option<Secret> {
        self.entries.get(name).map(|entry| entry.clone())
    }

    /// Remove the secret under `name`, returning it if present.
    pub fn remove(&self, name: &str) -> Option<Secret> {
        self.entries.remove(name).map(|(_, secret)| secret)
    }

    /// Whether a secret is stored under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of stored secrets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_is_visible_to_later_reads() {
        let store = SecretStore::new();
        assert!(!store.put("admin", Secret::from("s3cr3t")));
        assert!(store.put("admin", Secret::from("rotated")));

        let secret = store.get("admin").unwrap();
        assert_eq!(secret.as_bytes(), b"rotated");
    }

    #[test]
    fn removal_makes_resolution_fail() {
        let store = SecretStore::new();
        store.put("admin", Secret::from("s3cr3t"));
        assert!(store.remove("admin").is_some());
        assert!(store.get("admin").is_none());
        assert!(store.remove("admin").is_none());
    }

    #[test]
    fn debug_never_prints_bytes() {
        let secret = Secret::from("s3cr3t");
        let printed = format!("{secret:?}");
        assert!(!printed.contains("s3cr3t"));
        assert_eq!(printed, "Secret(6 bytes)");
    }
}
