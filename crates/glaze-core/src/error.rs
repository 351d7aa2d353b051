//! Error types for fleet reconciliation.
//!
//! Two layers of failure are modeled here:
//!
//! - [`AdminError`] - a single administrative-protocol operation against one
//!   instance went wrong (connect, command, transport)
//! - [`FleetError`] - an engine-level failure: a precondition was not met, one
//!   instance failed, or a fleet-wide operation collected failures from
//!   several instances ([`FleetErrors`])
//!
//! Fleet operations always attempt every instance before returning, so a
//! partial failure surfaces as a [`FleetErrors`] collection rather than as the
//! first error encountered.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

/// Failure of one administrative-protocol operation against one instance.
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// Opening the administrative connection failed.
    #[error("connect to {addr} failed: {reason}")]
    Connect {
        /// Administrative endpoint that was dialed.
        addr: SocketAddr,
        /// Description of the connect failure.
        reason: String,
    },

    /// The instance refused the authentication challenge.
    #[error("{addr} rejected the admin secret")]
    AuthRejected {
        /// Administrative endpoint that refused the secret.
        addr: SocketAddr,
    },

    /// The instance answered a command with a non-OK status.
    #[error("{op} rejected with status {status}: {message}")]
    Rejected {
        /// Protocol operation that was rejected.
        op: &'static str,
        /// Protocol status code from the response.
        status: u16,
        /// Response body text.
        message: String,
    },

    /// The connection was lost mid-operation.
    #[error("connection closed during {op}")]
    Closed {
        /// Protocol operation in flight when the connection dropped.
        op: &'static str,
    },

    /// An operation did not complete within the configured timeout.
    #[error("{op} timed out after {timeout:?}")]
    Timeout {
        /// Protocol operation that timed out.
        op: &'static str,
        /// Timeout that was exceeded.
        timeout: Duration,
    },

    /// Transport-level I/O failure.
    #[error("i/o error during {op}: {source}")]
    Io {
        /// Protocol operation in flight when the I/O error occurred.
        op: &'static str,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl AdminError {
    /// Whether this error means the remote side went away rather than
    /// answering with a rejection.
    ///
    /// Tolerant teardown paths treat a disconnect as success, since the
    /// instance may already be shutting down.
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            AdminError::Connect { .. }
                | AdminError::Closed { .. }
                | AdminError::Timeout { .. }
                | AdminError::Io { .. }
        )
    }
}

/// Engine-level reconciliation failure.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    /// No admin secret is currently known for an instance.
    ///
    /// Returned before any protocol I/O is attempted.
    #[error("no admin secret known for instance {addr}")]
    NoSecret {
        /// Administrative endpoint of the instance.
        addr: SocketAddr,
    },

    /// The service has no member instances, so there is nothing to converge.
    #[error("service {service} has no known instances")]
    NoInstances {
        /// Service key.
        service: String,
    },

    /// The service is already driven by a different configuration object.
    ///
    /// At most one object drives a service at a time; the previous
    /// association must be deleted first.
    #[error(
        "service {service} already carries configuration from {current}, refusing {requested}"
    )]
    AlreadyAssigned {
        /// Service key.
        service: String,
        /// Object currently driving the service.
        current: String,
        /// Object that was refused.
        requested: String,
    },

    /// A delete named an object that is not driving the service.
    #[error("service {service} carries no configuration from {requested}")]
    NotAssigned {
        /// Service key.
        service: String,
        /// Object named by the delete.
        requested: String,
    },

    /// Rendering the desired spec into configuration text failed.
    ///
    /// Loss of the renderer is fatal to the controller process (surfaced on
    /// the supervisor channel), not retried per instance.
    #[error("rendering configuration for service {service} failed: {reason}")]
    Render {
        /// Service key.
        service: String,
        /// Renderer failure description.
        reason: String,
    },

    /// An administrative operation against one instance failed.
    #[error("instance {addr}: {source}")]
    Instance {
        /// Administrative endpoint of the failing instance.
        addr: SocketAddr,
        /// Underlying protocol failure.
        #[source]
        source: AdminError,
    },

    /// One or more instances in a fleet-wide operation failed.
    #[error("{0}")]
    Fleet(#[from] FleetErrors),

    /// The engine was assembled with an invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl FleetError {
    /// Wrap a protocol failure with the instance it came from.
    pub fn instance(addr: SocketAddr, source: AdminError) -> Self {
        FleetError::Instance { addr, source }
    }

    /// The administrative endpoint this error is attributed to, if it is a
    /// per-instance error.
    pub fn addr(&self) -> Option<SocketAddr> {
        match self {
            FleetError::NoSecret { addr } | FleetError::Instance { addr, .. } => Some(*addr),
            _ => None,
        }
    }
}

/// Ordered collection of per-instance failures from one fleet-wide operation.
///
/// `attempted` records how many instances the operation covered, so an
/// all-instances-failed outcome is distinguishable from a partial one.
#[derive(Debug, Default)]
pub struct FleetErrors {
    errors: Vec<FleetError>,
    attempted: usize,
}

impl FleetErrors {
    /// Create an empty collection for an operation covering `attempted`
    /// instances.
    pub fn new(attempted: usize) -> Self {
        Self {
            errors: Vec::new(),
            attempted,
        }
    }

    /// Record one instance's failure. Order of insertion is preserved.
    pub fn push(&mut self, error: FleetError) {
        self.errors.push(error);
    }

    /// Number of instances that failed.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Whether no instance failed.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of instances the operation attempted.
    pub fn attempted(&self) -> usize {
        self.attempted
    }

    /// Whether every attempted instance failed.
    pub fn is_total(&self) -> bool {
        !self.errors.is_empty() && self.errors.len() == self.attempted
    }

    /// Iterate over the recorded failures in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &FleetError> {
        self.errors.iter()
    }

    /// Collapse into a `Result`: `Ok(())` when no instance failed, otherwise
    /// the whole collection as a [`FleetError::Fleet`].
    pub fn into_result(self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(FleetError::Fleet(self))
        }
    }
}

impl fmt::Display for FleetErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} instances failed",
            self.errors.len(),
            self.attempted
        )?;
        for (i, err) in self.errors.iter().enumerate() {
            if i == 0 {
                write!(f, ": ")?;
            } else {
                write!(f, "; ")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FleetErrors {}

/// Result type alias using [`FleetError`].
pub type Result<T> = std::result::Result<T, FleetError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(last: u8) -> SocketAddr {
        format!("10.0.0.{last}:6082").parse().unwrap()
    }

    #[test]
    fn disconnects_are_classified() {
        let err = AdminError::Closed { op: "set_label" };
        assert!(err.is_disconnect());

        let err = AdminError::Rejected {
            op: "load_inline",
            status: 106,
            message: "syntax error".into(),
        };
        assert!(!err.is_disconnect());
    }

    #[test]
    fn aggregate_distinguishes_partial_from_total() {
        let mut errs = FleetErrors::new(3);
        errs.push(FleetError::instance(
            addr(1),
            AdminError::Closed { op: "ping" },
        ));
        assert!(!errs.is_total());
        assert_eq!(errs.len(), 1);
        assert_eq!(errs.attempted(), 3);

        let mut errs = FleetErrors::new(1);
        errs.push(FleetError::NoSecret { addr: addr(2) });
        assert!(errs.is_total());
    }

    #[test]
    fn empty_aggregate_collapses_to_ok() {
        assert!(FleetErrors::new(4).into_result().is_ok());

        let mut errs = FleetErrors::new(4);
        errs.push(FleetError::NoSecret { addr: addr(1) });
        let err = errs.into_result().unwrap_err();
        assert!(err.to_string().contains("1 of 4 instances failed"));
    }

    #[test]
    fn instance_errors_carry_their_address() {
        let err = FleetError::instance(addr(7), AdminError::Closed { op: "ping" });
        assert_eq!(err.addr(), Some(addr(7)));
        assert_eq!(
            FleetError::NoInstances {
                service: "web/cafe".into()
            }
            .addr(),
            None
        );
    }
}
