//! # Domain Errors
//!
//! Error taxonomy for the Port protocol.
//!
//! Internal operations log and degrade (`Option` / `()`); these errors reach
//! callers through the `try_*` entry points and the handshake paths.

use super::value_objects::{PairHash, PortId, PortKind};
use thiserror::Error;

/// Port protocol error types.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PortError {
    /// Malformed bundle or argument, rejected before persistence.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// No implementation registered for the version.
    #[error("Unsupported version {version:?} for {kind}")]
    UnsupportedVersion {
        /// Bundle kind
        kind: PortKind,
        /// Requested version (None when absent)
        version: Option<String>,
    },

    /// Port paused, expired or at its usage limit.
    #[error("Port {port_id} cannot accept connections")]
    Capacity {
        /// Port that refused the connection
        port_id: PortId,
    },

    /// Intro secret, rad or ticket check failed.
    #[error("Verification failed: {0}")]
    Verification(String),

    /// An active connection already exists for the peer.
    #[error("Duplicate connection for pair {pair_hash}")]
    DuplicateConnection {
        /// Peer pair hash
        pair_hash: PairHash,
    },

    /// Peer is blocked.
    #[error("Pair {pair_hash} is blocked")]
    Blocked {
        /// Peer pair hash
        pair_hash: PairHash,
    },

    /// Network or API failure; local state must be kept.
    #[error("Transient issuer error: {0}")]
    TransientIssuer(String),

    /// Remote resource is gone (404).
    #[error("Issuer resource gone: {0}")]
    PermanentIssuer(String),

    /// Missing local record.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Port or pending bundle has expired.
    #[error("Port {port_id} has expired")]
    Expired {
        /// Expired port
        port_id: PortId,
    },

    /// Persistence failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Crypto collaborator failure.
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl PortError {
    /// Network-class failure: retry later, never delete local state.
    pub fn is_transient(&self) -> bool {
        matches!(self, PortError::TransientIssuer(_))
    }

    /// Remote resource is definitively gone.
    pub fn is_permanent(&self) -> bool {
        matches!(self, PortError::PermanentIssuer(_))
    }

    /// Short label used for metrics and structured logs.
    pub fn reason(&self) -> &'static str {
        match self {
            PortError::Validation(_) => "validation",
            PortError::UnsupportedVersion { .. } => "unsupported_version",
            PortError::Capacity { .. } => "capacity",
            PortError::Verification(_) => "verification",
            PortError::DuplicateConnection { .. } => "duplicate_connection",
            PortError::Blocked { .. } => "blocked",
            PortError::TransientIssuer(_) => "transient_issuer",
            PortError::PermanentIssuer(_) => "permanent_issuer",
            PortError::NotFound(_) => "not_found",
            PortError::Expired { .. } => "expired",
            PortError::Storage(_) => "storage",
            PortError::Crypto(_) => "crypto",
        }
    }
}

/// Result alias for the Port protocol.
pub type PortResult<T> = Result<T, PortError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PortError::UnsupportedVersion {
            kind: PortKind::Superport,
            version: Some("2.0.0".to_string()),
        };
        assert!(err.to_string().contains("2.0.0"));
        assert!(err.to_string().contains("superportDirect"));

        let err = PortError::Capacity {
            port_id: "abc".to_string(),
        };
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_classification() {
        assert!(PortError::TransientIssuer("timeout".into()).is_transient());
        assert!(!PortError::TransientIssuer("timeout".into()).is_permanent());
        assert!(PortError::PermanentIssuer("404".into()).is_permanent());
        assert!(!PortError::Verification("rad".into()).is_transient());
        assert_eq!(PortError::Verification("rad".into()).reason(), "verification");
    }
}
