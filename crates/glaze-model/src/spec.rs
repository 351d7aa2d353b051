//! Desired routing/caching configuration for one managed service.
//!
//! [`DesiredSpec`] is a pure value type. Its unordered collections (backend
//! addresses, the backend map, auth and ACL lists) carry no meaning in their
//! iteration order, so equality and the content digest are defined over the
//! *canonical* form: every unordered collection sorted by a fixed key. Use
//! [`DesiredSpec::canonical`] to obtain that form; [`DesiredSpec`]'s
//! `PartialEq` compares canonical forms so permuted-but-identical specs are
//! equal.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};

/// An IP + port pair identifying one backend or admin endpoint.
///
/// Ordered by IP then port. The ordering exists for canonicalization only and
/// carries no semantic meaning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address {
    /// IP address.
    pub ip: IpAddr,
    /// Port number.
    pub port: u16,
}

impl Address {
    /// Create an address from an IP and a port.
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

impl From<SocketAddr> for Address {
    fn from(addr: SocketAddr) -> Self {
        Self {
            ip: addr.ip(),
            port: addr.port(),
        }
    }
}

impl From<Address> for SocketAddr {
    fn from(addr: Address) -> Self {
        SocketAddr::new(addr.ip, addr.port)
    }
}

/// Health-probe parameters for a backend.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Probe {
    /// URL path the probe requests.
    pub url: Option<String>,
    /// Interval between probe requests, e.g. `"5s"`.
    pub interval: Option<String>,
    /// Per-request probe timeout, e.g. `"2s"`.
    pub timeout: Option<String>,
    /// Number of probes presumed good at startup.
    pub initial: Option<u32>,
    /// Size of the sliding window of probe results.
    pub window: Option<u32>,
    /// Number of good probes within the window required for health.
    pub threshold: Option<u32>,
}

/// Load-balancing director family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DirectorKind {
    /// Round-robin over healthy backends.
    #[default]
    RoundRobin,
    /// Uniformly random selection.
    Random,
    /// Consistent-hash sharding.
    Shard,
}

/// Load-balancing director parameters for a backend service.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Director {
    /// Director family.
    pub kind: DirectorKind,
    /// Ramp-up duration for newly healthy backends, e.g. `"30s"`.
    pub rampup: Option<String>,
    /// Warm-up weight in `[0.0, 1.0]` for backends returning to health.
    pub warmup: Option<f64>,
}

impl Hash for Director {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.rampup.hash(state);
        // f64 has no Hash impl; the bit pattern is stable for our purposes.
        self.warmup.map(f64::to_bits).hash(state);
    }
}

/// A named backend: an ordered set of addresses plus optional tuning.
#[derive(Clone, Debug, Default, PartialEq, Hash)]
pub struct BackendService {
    /// Backend name, unique within one [`DesiredSpec`].
    pub name: String,
    /// Endpoint addresses. Unordered; sorted by canonicalization.
    pub addresses: Vec<Address>,
    /// Health-probe parameters.
    pub probe: Option<Probe>,
    /// Director parameters.
    pub director: Option<Director>,
    /// Host header override sent to this backend.
    pub host_header: Option<String>,
    /// Connection establishment timeout, e.g. `"3s"`.
    pub connect_timeout: Option<String>,
    /// Timeout for the first response byte.
    pub first_byte_timeout: Option<String>,
    /// Timeout between consecutive response bytes.
    pub between_bytes_timeout: Option<String>,
}

impl BackendService {
    /// Create a backend with a name and addresses, no tuning.
    pub fn new(name: impl Into<String>, addresses: Vec<Address>) -> Self {
        Self {
            name: name.into(),
            addresses,
            ..Self::default()
        }
    }

    fn canonical(&self) -> Self {
        let mut backend = self.clone();
        backend.addresses.sort();
        backend
    }
}

/// One host-match entry: a host string and its URL-path routing map.
#[derive(Clone, Debug, Default, PartialEq, Hash)]
pub struct RoutingRule {
    /// Host header to match.
    pub host: String,
    /// URL path prefix to backend. Keyed map, inherently canonical.
    pub routes: BTreeMap<String, BackendService>,
}

impl RoutingRule {
    fn canonical(&self) -> Self {
        Self {
            host: self.host.clone(),
            routes: self
                .routes
                .iter()
                .map(|(path, backend)| (path.clone(), backend.canonical()))
                .collect(),
        }
    }
}

/// Cache self-sharding cluster: the peer nodes and their shared probe.
#[derive(Clone, Debug, Default, PartialEq, Hash)]
pub struct ShardCluster {
    /// Peer cache nodes. Unordered; sorted by name in canonical form.
    pub nodes: Vec<BackendService>,
    /// Probe shared by all peer nodes.
    pub probe: Probe,
    /// TTL override for objects fetched from a peer, e.g. `"5m"`.
    pub max_secondary_ttl: Option<String>,
}

impl ShardCluster {
    fn canonical(&self) -> Self {
        let mut nodes: Vec<_> = self.nodes.iter().map(BackendService::canonical).collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));
        Self {
            nodes,
            probe: self.probe.clone(),
            max_secondary_ttl: self.max_secondary_ttl.clone(),
        }
    }
}

/// Comparison operator in a match condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Compare {
    /// Exact equality.
    Equal,
    /// Exact inequality.
    NotEqual,
    /// Regular-expression match.
    Match,
    /// Negated regular-expression match.
    NotMatch,
}

/// One condition restricting when an auth or ACL applies.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchTerm {
    /// Request element compared, e.g. `req.url` or `req.http.Host`.
    pub comparand: String,
    /// Comparison operator.
    pub compare: Compare,
    /// Value compared against.
    pub value: String,
}

/// Credential-realm kind.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AuthKind {
    /// `401` / `Authorization` authentication.
    #[default]
    Basic,
    /// `407` / `Proxy-Authorization` authentication.
    Proxy,
}

/// One credential realm and the conditions under which it is enforced.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AuthSpec {
    /// Realm name announced in the challenge.
    pub realm: String,
    /// Basic or proxy authentication.
    pub kind: AuthKind,
    /// Accepted credentials, pre-encoded. Unordered.
    pub credentials: Vec<String>,
    /// Conditions restricting when the realm applies. Unordered.
    pub conditions: Vec<MatchTerm>,
    /// Whether credentials are validated as UTF-8.
    pub utf8_mode: bool,
}

impl AuthSpec {
    fn canonical(&self) -> Self {
        let mut auth = self.clone();
        auth.credentials.sort();
        auth.conditions.sort();
        auth
    }
}

/// One address entry of an ACL.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AclAddress {
    /// IP address or hostname.
    pub addr: String,
    /// CIDR mask bits, if a range.
    pub mask_bits: Option<u8>,
    /// Whether the entry is negated.
    pub negate: bool,
}

/// An IP allowlist or denylist with match conditions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct AclSpec {
    /// ACL name, unique within one [`DesiredSpec`].
    pub name: String,
    /// Request element compared against the ACL, e.g. `client.ip`.
    pub comparand: String,
    /// HTTP status sent on failure.
    pub fail_status: u16,
    /// `true` for an allowlist, `false` for a denylist.
    pub whitelist: bool,
    /// Address entries. Unordered.
    pub addresses: Vec<AclAddress>,
    /// Conditions restricting when the ACL applies. Unordered.
    pub conditions: Vec<MatchTerm>,
}

impl AclSpec {
    fn canonical(&self) -> Self {
        let mut acl = self.clone();
        acl.addresses.sort();
        acl.conditions.sort();
        acl
    }
}

/// The full desired routing/caching configuration for one managed service.
#[derive(Clone, Debug, Default)]
pub struct DesiredSpec {
    /// Backend used when no routing rule matches.
    pub default_backend: BackendService,
    /// Host-match rules. Ordered; sorted by host in canonical form.
    pub rules: Vec<RoutingRule>,
    /// Every backend referenced anywhere in the spec, by name.
    pub backends: HashMap<String, BackendService>,
    /// Self-sharding cluster membership, if sharding is enabled.
    pub sharding: Option<ShardCluster>,
    /// Credential realms. Unordered.
    pub auths: Vec<AuthSpec>,
    /// Access-control lists. Unordered.
    pub acls: Vec<AclSpec>,
    /// Free-form configuration text appended verbatim.
    pub raw: String,
}

impl DesiredSpec {
    /// Produce the canonical form: every unordered collection sorted by its
    /// fixed key (addresses by IP/port, rules by host, auths by realm, ACLs
    /// by name, and each ACL's addresses and conditions by their own keys).
    ///
    /// Canonicalization is idempotent, and the content digest is only
    /// meaningful over the canonical form.
    pub fn canonical(&self) -> Self {
        let mut rules: Vec<_> = self.rules.iter().map(RoutingRule::canonical).collect();
        rules.sort_by(|a, b| a.host.cmp(&b.host));

        let mut auths: Vec<_> = self.auths.iter().map(AuthSpec::canonical).collect();
        auths.sort_by(|a, b| a.realm.cmp(&b.realm));

        let mut acls: Vec<_> = self.acls.iter().map(AclSpec::canonical).collect();
        acls.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            default_backend: self.default_backend.canonical(),
            rules,
            backends: self
                .backends
                .iter()
                .map(|(name, backend)| (name.clone(), backend.canonical()))
                .collect(),
            sharding: self.sharding.as_ref().map(ShardCluster::canonical),
            auths,
            acls,
            raw: self.raw.clone(),
        }
    }
}

/// Equality over canonical forms: specs differing only in the iteration
/// order of their unordered collections compare equal.
impl PartialEq for DesiredSpec {
    fn eq(&self, other: &Self) -> bool {
        let a = self.canonical();
        let b = other.canonical();
        a.default_backend == b.default_backend
            && a.rules == b.rules
            && a.backends == b.backends
            && a.sharding == b.sharding
            && a.auths == b.auths
            && a.acls == b.acls
            && a.raw == b.raw
    }
}

/// Field-order fold of the canonical form.
///
/// Only well-defined on the result of [`DesiredSpec::canonical`]; the digest
/// entry point canonicalizes before hashing.
impl Hash for DesiredSpec {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.default_backend.hash(state);
        self.rules.hash(state);
        // The backend map is unordered; fold entries in key order.
        let mut names: Vec<&String> = self.backends.keys().collect();
        names.sort();
        state.write_usize(names.len());
        for name in names {
            name.hash(state);
            self.backends[name].hash(state);
        }
        self.sharding.hash(state);
        self.auths.hash(state);
        self.acls.hash(state);
        self.raw.hash(state);
    }
}
