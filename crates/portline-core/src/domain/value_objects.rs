//! # Value Objects
//!
//! Identifiers and small enums shared by every port kind.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 32 lowercase-hex port identifier issued by the remote issuer.
pub type PortId = String;

/// Server-assigned connection identifier.
pub type LineId = String;

/// Stable hash identifying a peer pair.
pub type PairHash = String;

/// Handle of a crypto session held by the crypto collaborator.
pub type CryptoId = String;

/// Handle of a permission set held by the permission store.
pub type PermissionsId = String;

/// Local folder a new chat is filed under.
pub type FolderId = String;

/// Local chat identifier.
pub type ChatId = String;

/// Group identifier.
pub type GroupId = String;

/// 32 lowercase-hex ticket identifier.
pub type TicketId = String;

/// Bundle kind, serialized as the wire `target` literal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PortKind {
    /// Single-use direct port.
    #[serde(rename = "direct")]
    Direct,
    /// Single-use group port.
    #[serde(rename = "group")]
    Group,
    /// Multi-use, limit-enforced direct port.
    #[serde(rename = "superportDirect")]
    Superport,
    /// Multi-use group port, one per group.
    #[serde(rename = "superportGroup")]
    GroupSuperport,
    /// Ticket-mediated re-sharing port.
    #[serde(rename = "contactPort")]
    ContactPort,
}

impl PortKind {
    /// All kinds, in registry order.
    pub const ALL: [PortKind; 5] = [
        PortKind::Direct,
        PortKind::Group,
        PortKind::Superport,
        PortKind::GroupSuperport,
        PortKind::ContactPort,
    ];

    /// Wire `target` literal.
    pub fn target(&self) -> &'static str {
        match self {
            PortKind::Direct => "direct",
            PortKind::Group => "group",
            PortKind::Superport => "superportDirect",
            PortKind::GroupSuperport => "superportGroup",
            PortKind::ContactPort => "contactPort",
        }
    }

    /// Parse a wire `target` literal.
    pub fn from_target(target: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.target() == target)
    }

    /// Multi-use kinds survive a successful connection.
    pub fn is_multi_use(&self) -> bool {
        matches!(
            self,
            PortKind::Superport | PortKind::GroupSuperport | PortKind::ContactPort
        )
    }

    /// Group kinds carry no crypto material.
    pub fn is_group(&self) -> bool {
        matches!(self, PortKind::Group | PortKind::GroupSuperport)
    }
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.target())
    }
}

/// Key under which a multi-use port is unique.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CorrelationKey {
    /// One group superport per group.
    GroupSuperport(GroupId),
    /// One shared contact port per contact.
    SharedContactPort(PairHash),
    /// One accepted contact port per owner.
    AcceptedContactPort(PairHash),
}

/// Pool of pre-fetched single-use port ids.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PoolKey {
    /// Direct ports.
    Direct,
    /// Group ports of one group.
    Group(GroupId),
}

/// A remotely registered multi-use port, addressed for pause/resume/delete.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RemotePort {
    /// Superport by port id.
    Superport(PortId),
    /// Group superport by group id.
    GroupSuperport(GroupId),
    /// Shared contact port by port id.
    ContactPort(PortId),
}

impl fmt::Display for RemotePort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemotePort::Superport(id) => write!(f, "superport:{}", id),
            RemotePort::GroupSuperport(id) => write!(f, "group-superport:{}", id),
            RemotePort::ContactPort(id) => write!(f, "contact-port:{}", id),
        }
    }
}
