//! Content digest over the canonical spec form.
//!
//! The digest is the cheap identity answering "has this exact configuration
//! already been applied." Two semantically equal specs always digest equal;
//! distinct specs collide only with ordinary 64-bit hash probability, which
//! is acceptable for an identity that is never used for security.

use std::fmt;
use std::hash::{Hash, Hasher};

use fnv::FnvHasher;

use crate::spec::DesiredSpec;

/// 64-bit FNV-1a digest of a canonical [`DesiredSpec`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpecDigest(u64);

impl SpecDigest {
    /// The raw digest value.
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SpecDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl DesiredSpec {
    /// Compute the content digest.
    ///
    /// The spec is canonicalized first, so permutations of unordered
    /// collections always produce the same digest.
    #[must_use]
    pub fn digest(&self) -> SpecDigest {
        let canonical = self.canonical();
        let mut hasher = FnvHasher::default();
        canonical.hash(&mut hasher);
        SpecDigest(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::net::SocketAddr;

    use super::*;
    use crate::spec::{Address, AuthSpec, BackendService, RoutingRule};

    fn addr(s: &str) -> Address {
        let sock: SocketAddr = s.parse().unwrap();
        sock.into()
    }

    fn spec_with(addresses: Vec<Address>, auths: Vec<AuthSpec>) -> DesiredSpec {
        let backend = BackendService::new("tea-svc", addresses);
        DesiredSpec {
            default_backend: backend.clone(),
            rules: vec![RoutingRule {
                host: "cafe.example.com".into(),
                routes: BTreeMap::from([("/tea".to_string(), backend.clone())]),
            }],
            backends: std::collections::HashMap::from([("tea-svc".to_string(), backend)]),
            auths,
            ..DesiredSpec::default()
        }
    }

    #[test]
    fn digest_is_permutation_invariant() {
        let auths = vec![
            AuthSpec {
                realm: "alpha".into(),
                credentials: vec!["YTpi".into(), "Yzpk".into()],
                ..AuthSpec::default()
            },
            AuthSpec {
                realm: "beta".into(),
                ..AuthSpec::default()
            },
        ];
        let mut permuted_auths = auths.clone();
        permuted_auths.reverse();
        // "alpha" sits at index 1 after the reversal; permute its credentials too.
        permuted_auths[1].credentials.reverse();

        let a = spec_with(vec![addr("10.0.0.1:80"), addr("10.0.0.2:80")], auths);
        let b = spec_with(
            vec![addr("10.0.0.2:80"), addr("10.0.0.1:80")],
            permuted_auths,
        );

        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn digest_is_stable_across_calls() {
        let spec = spec_with(vec![addr("10.0.0.1:80")], Vec::new());
        assert_eq!(spec.digest(), spec.digest());
        assert_eq!(spec.digest(), spec.clone().digest());
    }

    #[test]
    fn one_changed_address_changes_the_digest() {
        let a = spec_with(vec![addr("10.0.0.1:80"), addr("10.0.0.2:80")], Vec::new());
        let b = spec_with(vec![addr("10.0.0.1:80"), addr("10.0.0.3:80")], Vec::new());
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn raw_text_participates_in_the_digest() {
        let mut a = spec_with(vec![addr("10.0.0.1:80")], Vec::new());
        let b = a.clone();
        a.raw = "sub vcl_deliver { }".into();
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn digest_displays_as_sixteen_hex_chars() {
        let spec = spec_with(vec![addr("10.0.0.1:80")], Vec::new());
        let printed = format!("{}", spec.digest());
        assert_eq!(printed.len(), 16);
        assert!(printed.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn representative_corpus_has_no_collisions() {
        let mut digests = std::collections::HashSet::new();
        for octet in 1..=50u8 {
            for port in [80u16, 8080] {
                let spec = spec_with(
                    vec![Address::new(format!("10.0.0.{octet}").parse().unwrap(), port)],
                    Vec::new(),
                );
                assert!(
                    digests.insert(spec.digest()),
                    "collision at 10.0.0.{octet}:{port}"
                );
            }
        }
    }
}
