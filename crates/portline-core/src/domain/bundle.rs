//! # Bundles
//!
//! Wire payloads exchanged through QR codes and links. Parsing goes through
//! the per-version validators in `algorithms::schema`; these types only
//! describe an already-validated bundle.

use super::errors::{PortError, PortResult};
use super::value_objects::{PortId, PortKind, TicketId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bundle of a crypto-bearing kind (direct, superport, contact port).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerBundle {
    /// Port id.
    pub port_id: PortId,
    /// Version literal.
    pub version: String,
    /// Organisation literal.
    pub org: String,
    /// Kind literal.
    pub target: PortKind,
    /// Generator's display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Generator's session nonce.
    pub rad: String,
    /// Hash of the generator's public key.
    pub key_hash: String,
    /// Generator's public key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pubkey: Option<String>,
    /// Contact port ticket.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<TicketId>,
    /// Generator-side expiry, carried for direct ports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_timestamp: Option<DateTime<Utc>>,
}

/// Bundle of a group kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupBundle {
    /// Port id.
    pub port_id: PortId,
    /// Version literal.
    pub version: String,
    /// Organisation literal.
    pub org: String,
    /// Kind literal.
    pub target: PortKind,
    /// Group name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Group description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Generator-side expiry, carried for group ports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry_timestamp: Option<DateTime<Utc>>,
}

/// A validated bundle of any kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Bundle {
    /// Direct, superport or contact port bundle.
    Peer(PeerBundle),
    /// Group or group superport bundle.
    Group(GroupBundle),
}

impl Bundle {
    /// Bundle kind.
    pub fn kind(&self) -> PortKind {
        match self {
            Bundle::Peer(b) => b.target,
            Bundle::Group(b) => b.target,
        }
    }

    /// Port id.
    pub fn port_id(&self) -> &str {
        match self {
            Bundle::Peer(b) => &b.port_id,
            Bundle::Group(b) => &b.port_id,
        }
    }

    /// Version literal.
    pub fn version(&self) -> &str {
        match self {
            Bundle::Peer(b) => &b.version,
            Bundle::Group(b) => &b.version,
        }
    }

    /// Published name.
    pub fn name(&self) -> Option<&str> {
        match self {
            Bundle::Peer(b) => b.name.as_deref(),
            Bundle::Group(b) => b.name.as_deref(),
        }
    }

    /// Wire JSON value.
    pub fn to_value(&self) -> PortResult<serde_json::Value> {
        serde_json::to_value(self).map_err(|e| PortError::Validation(e.to_string()))
    }

    /// Wire JSON string, as rendered into a QR code.
    pub fn to_json(&self) -> PortResult<String> {
        serde_json::to_string(self).map_err(|e| PortError::Validation(e.to_string()))
    }

    /// Borrow the peer bundle, if this is one.
    pub fn as_peer(&self) -> Option<&PeerBundle> {
        match self {
            Bundle::Peer(b) => Some(b),
            Bundle::Group(_) => None,
        }
    }

    /// Borrow the group bundle, if this is one.
    pub fn as_group(&self) -> Option<&GroupBundle> {
        match self {
            Bundle::Group(b) => Some(b),
            Bundle::Peer(_) => None,
        }
    }
}
