//! Configuration identity names.
//!
//! A [`ConfigName`] is the deterministic, protocol-safe symbol under which a
//! rendered configuration is loaded on every instance of a service. It
//! concatenates the service key, the driving object's UID, and the content
//! digest, so any change to the spec produces a different name and an
//! unchanged spec always reproduces the same one.

use std::fmt;

use crate::digest::SpecDigest;

/// Prefix carried by every engine-managed configuration name.
///
/// The monitor loop only ever garbage-collects configurations whose name
/// starts with this prefix; anything else on the instance is left alone.
pub const CONFIG_PREFIX: &str = "glz_";

/// Deterministic, protocol-safe configuration name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConfigName(String);

impl ConfigName {
    /// Derive the name for `(service_key, object_uid, digest)`.
    ///
    /// Characters outside the protocol symbol alphabet
    /// (`[A-Za-z0-9_.-]`) are replaced with `_`.
    #[must_use]
    pub fn new(service_key: &str, object_uid: &str, digest: SpecDigest) -> Self {
        let raw = format!("{CONFIG_PREFIX}{service_key}_{object_uid}_{digest}");
        let name = raw
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        Self(name)
    }

    /// The name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether `name` was produced by this engine (carries the managed
    /// prefix) and is therefore eligible for garbage collection.
    #[must_use]
    pub fn is_managed(name: &str) -> bool {
        name.starts_with(CONFIG_PREFIX)
    }
}

impl fmt::Display for ConfigName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ConfigName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{Address, BackendService, DesiredSpec};

    fn sample_spec(port: u16) -> DesiredSpec {
        DesiredSpec {
            default_backend: BackendService::new(
                "tea-svc",
                vec![Address::new("10.0.0.1".parse().unwrap(), port)],
            ),
            ..DesiredSpec::default()
        }
    }

    #[test]
    fn identity_is_stable_for_equal_inputs() {
        let spec = sample_spec(80);
        let a = ConfigName::new("web/cafe", "1f6c3", spec.digest());
        let b = ConfigName::new("web/cafe", "1f6c3", spec.digest());
        assert_eq!(a, b);
    }

    #[test]
    fn identity_changes_with_the_spec() {
        let a = ConfigName::new("web/cafe", "1f6c3", sample_spec(80).digest());
        let b = ConfigName::new("web/cafe", "1f6c3", sample_spec(8080).digest());
        assert_ne!(a, b);
    }

    #[test]
    fn identity_is_protocol_safe() {
        let name = ConfigName::new("web/cafe", "9a2e:7", sample_spec(80).digest());
        assert!(name
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')));
        assert_eq!(&name.as_str()[..CONFIG_PREFIX.len()], CONFIG_PREFIX);
        assert!(name.as_str().contains("web_cafe"));
    }

    #[test]
    fn managed_prefix_is_recognized() {
        let name = ConfigName::new("web/cafe", "1f6c3", sample_spec(80).digest());
        assert!(ConfigName::is_managed(name.as_str()));
        assert!(!ConfigName::is_managed("boot"));
        assert!(!ConfigName::is_managed("ready"));
    }
}
