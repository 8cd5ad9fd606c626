//! # Domain Entities
//!
//! Generated and read port records, tickets, and the connection entities the
//! handshake produces.

use super::bundle::PeerBundle;
use super::value_objects::{
    ChatId, CorrelationKey, CryptoId, FolderId, GroupId, LineId, PairHash, PermissionsId, PortId,
    PortKind, TicketId,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Generated port records
// =============================================================================

/// Single-use direct port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectPortRecord {
    /// Issued port id.
    pub port_id: PortId,
    /// Protocol version that produced this record.
    pub version: String,
    /// Label given to the contact created through this port.
    pub label: Option<String>,
    /// Port crypto session; moves to the line on success.
    pub crypto_id: CryptoId,
    /// Folder new chats are filed under.
    pub folder_id: FolderId,
    /// Permissions applied to the new chat.
    pub permissions_id: Option<PermissionsId>,
    /// Creation time.
    pub created_on: DateTime<Utc>,
    /// Port is unusable after this instant.
    pub expiry_timestamp: Option<DateTime<Utc>>,
    /// Cached short-link id.
    pub bundle_id: Option<String>,
}

/// Multi-use, usage-limited direct port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuperportRecord {
    /// Issued port id.
    pub port_id: PortId,
    /// Protocol version that produced this record.
    pub version: String,
    /// Label given to contacts created through this port.
    pub label: Option<String>,
    /// Port crypto session; cloned for every chat.
    pub crypto_id: CryptoId,
    /// Folder new chats are filed under.
    pub folder_id: FolderId,
    /// Permissions copied to every chat.
    pub permissions_id: Option<PermissionsId>,
    /// Creation time.
    pub created_on: DateTime<Utc>,
    /// Maximum successful connections.
    pub connections_limit: u32,
    /// Successful connections so far.
    pub connections_made: u32,
    /// Paused ports refuse connections.
    pub paused: bool,
    /// Cached short-link id.
    pub bundle_id: Option<String>,
}

/// Single-use group port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupPortRecord {
    /// Issued port id.
    pub port_id: PortId,
    /// Protocol version that produced this record.
    pub version: String,
    /// Group the port admits to.
    pub group_id: GroupId,
    /// Group name published in the bundle.
    pub name: String,
    /// Group description published in the bundle.
    pub description: Option<String>,
    /// Creation time.
    pub created_on: DateTime<Utc>,
    /// Port is unusable after this instant.
    pub expiry_timestamp: Option<DateTime<Utc>>,
    /// Cached short-link id.
    pub bundle_id: Option<String>,
}

/// Multi-use group port, one per group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSuperportRecord {
    /// Issued port id.
    pub port_id: PortId,
    /// Protocol version that produced this record.
    pub version: String,
    /// Group the port admits to.
    pub group_id: GroupId,
    /// Group name published in the bundle.
    pub name: String,
    /// Group description published in the bundle.
    pub description: Option<String>,
    /// Creation time.
    pub created_on: DateTime<Utc>,
    /// Optional usage limit.
    pub connections_limit: Option<u32>,
    /// Joins so far.
    pub connections_made: u32,
    /// Paused ports refuse joins.
    pub paused: bool,
    /// Cached short-link id.
    pub bundle_id: Option<String>,
}

/// Contact port owned by this user and shared with one contact.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPortRecord {
    /// Issued port id.
    pub port_id: PortId,
    /// Protocol version that produced this record.
    pub version: String,
    /// Contact allowed to re-share this port.
    pub pair_hash: PairHash,
    /// Port crypto session; cloned for every chat.
    pub crypto_id: CryptoId,
    /// Folder new chats are filed under.
    pub folder_id: FolderId,
    /// Permissions copied to every chat.
    pub permissions_id: Option<PermissionsId>,
    /// Creation time.
    pub created_on: DateTime<Utc>,
    /// Successful connections so far.
    pub connections_made: u32,
    /// Mirrors the contact's `contact_sharing` permission.
    pub paused: bool,
    /// Cached short-link id.
    pub bundle_id: Option<String>,
}

/// Contact port shared with this user by its owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedContactPortRecord {
    /// Owner's port id.
    pub port_id: PortId,
    /// Protocol version that produced this record.
    pub version: String,
    /// Owner of the port.
    pub pair_hash: PairHash,
    /// Session holding the owner's published key material.
    pub crypto_id: CryptoId,
    /// Acceptance time.
    pub created_on: DateTime<Utc>,
    /// Last minted bundle, carrying its ticket.
    pub cached_bundle: Option<PeerBundle>,
    /// Short-link id of the cached bundle.
    pub bundle_id: Option<String>,
}

/// Any generated record, as persisted by the lifecycle store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum GeneratedPort {
    /// Direct port.
    Direct(DirectPortRecord),
    /// Superport.
    Superport(SuperportRecord),
    /// Group port.
    Group(GroupPortRecord),
    /// Group superport.
    GroupSuperport(GroupSuperportRecord),
    /// Shared contact port.
    ContactPort(ContactPortRecord),
    /// Accepted contact port.
    AcceptedContactPort(AcceptedContactPortRecord),
}

impl GeneratedPort {
    /// Port id.
    pub fn port_id(&self) -> &str {
        match self {
            GeneratedPort::Direct(r) => &r.port_id,
            GeneratedPort::Superport(r) => &r.port_id,
            GeneratedPort::Group(r) => &r.port_id,
            GeneratedPort::GroupSuperport(r) => &r.port_id,
            GeneratedPort::ContactPort(r) => &r.port_id,
            GeneratedPort::AcceptedContactPort(r) => &r.port_id,
        }
    }

    /// Stored protocol version.
    pub fn version(&self) -> &str {
        match self {
            GeneratedPort::Direct(r) => &r.version,
            GeneratedPort::Superport(r) => &r.version,
            GeneratedPort::Group(r) => &r.version,
            GeneratedPort::GroupSuperport(r) => &r.version,
            GeneratedPort::ContactPort(r) => &r.version,
            GeneratedPort::AcceptedContactPort(r) => &r.version,
        }
    }

    /// Bundle kind this record shares.
    pub fn kind(&self) -> PortKind {
        match self {
            GeneratedPort::Direct(_) => PortKind::Direct,
            GeneratedPort::Superport(_) => PortKind::Superport,
            GeneratedPort::Group(_) => PortKind::Group,
            GeneratedPort::GroupSuperport(_) => PortKind::GroupSuperport,
            GeneratedPort::ContactPort(_) | GeneratedPort::AcceptedContactPort(_) => {
                PortKind::ContactPort
            }
        }
    }

    /// Key under which the record is unique, for multi-use kinds.
    pub fn correlation_key(&self) -> Option<CorrelationKey> {
        match self {
            GeneratedPort::GroupSuperport(r) => {
                Some(CorrelationKey::GroupSuperport(r.group_id.clone()))
            }
            GeneratedPort::ContactPort(r) => {
                Some(CorrelationKey::SharedContactPort(r.pair_hash.clone()))
            }
            GeneratedPort::AcceptedContactPort(r) => {
                Some(CorrelationKey::AcceptedContactPort(r.pair_hash.clone()))
            }
            _ => None,
        }
    }

    /// Expiry, for kinds that expire.
    pub fn expiry_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            GeneratedPort::Direct(r) => r.expiry_timestamp,
            GeneratedPort::Group(r) => r.expiry_timestamp,
            _ => None,
        }
    }
}

// =============================================================================
// Read records and tickets
// =============================================================================

/// A bundle accepted by this user and pending consumption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadPortRecord {
    /// Port id from the bundle.
    pub port_id: PortId,
    /// Version from the bundle.
    pub version: String,
    /// Kind from the bundle.
    pub target: PortKind,
    /// Name published by the generator.
    pub name: Option<String>,
    /// Group description, for group kinds.
    pub description: Option<String>,
    /// Reader crypto session, for crypto-bearing kinds.
    pub crypto_id: Option<CryptoId>,
    /// Permissions chosen for the new chat.
    pub permissions_id: Option<PermissionsId>,
    /// Folder for the new chat.
    pub folder_id: FolderId,
    /// Ticket, for contact ports.
    pub ticket: Option<TicketId>,
    /// Acceptance time.
    pub created_on: DateTime<Utc>,
    /// Bundle is discarded after this instant.
    pub expiry_timestamp: Option<DateTime<Utc>>,
    /// Where the bundle came from, e.g. `shared://<chat><sep><message>`.
    pub channel: Option<String>,
}

impl ReadPortRecord {
    /// Whether the record is past its expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_timestamp.is_some_and(|expiry| expiry <= now)
    }
}

/// Single-use re-share authorization on a shared contact port.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    /// Contact port the ticket belongs to.
    pub contact_port_id: PortId,
    /// Ticket id.
    pub ticket_id: TicketId,
    /// Cleared once the ticket has formed a connection.
    pub active: bool,
}

// =============================================================================
// Permissions and connection entities
// =============================================================================

/// Per-chat permission set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    /// Show notifications.
    pub notifications: bool,
    /// Download media automatically.
    pub auto_download: bool,
    /// Share display picture.
    pub display_picture: bool,
    /// Allow the contact to re-share this user's contact port.
    pub contact_sharing: bool,
    /// Send read receipts.
    pub read_receipts: bool,
}

impl Default for Permissions {
    fn default() -> Self {
        Self {
            notifications: true,
            auto_download: true,
            display_picture: true,
            contact_sharing: true,
            read_receipts: true,
        }
    }
}

/// Server-side connection as mirrored locally.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    /// Server-assigned id.
    pub line_id: LineId,
    /// Handshake completed on both sides.
    pub authenticated: bool,
    /// Line no longer delivers messages.
    pub disconnected: bool,
    /// Chat crypto session.
    pub crypto_id: Option<CryptoId>,
    /// Chat permission set.
    pub permissions_id: Option<PermissionsId>,
}

impl Line {
    /// A freshly formed line with no session attached yet.
    pub fn connected(line_id: impl Into<LineId>) -> Self {
        Self {
            line_id: line_id.into(),
            authenticated: true,
            disconnected: false,
            crypto_id: None,
            permissions_id: None,
        }
    }
}

/// Chat kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatKind {
    /// One-to-one chat.
    Direct,
    /// Group chat.
    Group,
}

/// Local chat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    /// Local id.
    pub chat_id: ChatId,
    /// Direct or group.
    pub kind: ChatKind,
    /// Peer, for direct chats.
    pub pair_hash: Option<PairHash>,
    /// Group, for group chats.
    pub group_id: Option<GroupId>,
    /// Current line (member id for groups).
    pub line_id: LineId,
    /// Folder the chat is filed under.
    pub folder_id: FolderId,
}

/// Contact entry created for a direct chat.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Peer.
    pub pair_hash: PairHash,
    /// Display name.
    pub name: String,
    /// Connection time.
    pub connected_on: DateTime<Utc>,
    /// Contact whose shared port introduced this one.
    pub connection_source: Option<PairHash>,
}

// =============================================================================
// Handshake payloads
// =============================================================================

/// Intro message a reader sends through the issuer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntroMessage {
    /// Reader's public key, hex.
    pub pubkey: String,
    /// Encrypted [`IntroSecret`].
    pub encrypted_secret_content: String,
}

/// Plaintext of the intro message's secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntroSecret {
    /// Echo of the generator's rad.
    pub rad: String,
    /// Reader's display name.
    pub name: String,
    /// Ticket, for contact ports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket: Option<TicketId>,
}

/// Notification that a peer attempted to connect through a generated port.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectionRequest {
    /// Line the issuer allocated.
    pub line_id: LineId,
    /// Peer.
    pub pair_hash: PairHash,
    /// Intro message forwarded by the issuer.
    pub intro: IntroMessage,
}

/// Issuer response to a line formation request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineGrant {
    /// Allocated line.
    pub line_id: LineId,
    /// Peer.
    pub pair_hash: PairHash,
}

/// Issuer response to a group join.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupGrant {
    /// Joined group.
    pub group_id: GroupId,
    /// This user's member id in the group.
    pub member_id: String,
}

/// Key material an owner publishes in a contact port bundle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactPortMaterial {
    /// Owner's public key, hex.
    pub pubkey: String,
    /// Owner's rad.
    pub rad: String,
    /// Hash of the owner's public key.
    pub key_hash: String,
}


/// Outcome of one sweep over the pending bundles.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    /// Records looked at.
    pub processed: usize,
    /// Records used (or discarded as expired) without error.
    pub consumed: usize,
    /// Records kept for the next sweep after a transient failure.
    pub retained: usize,
    /// Records that failed for good.
    pub failed: usize,
}
