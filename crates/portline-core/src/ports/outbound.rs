//! # Outbound Ports
//!
//! Collaborators the protocol drives: the remote issuer, persistence, the
//! crypto collaborator, and the post-connection senders.

use crate::domain::{
    Chat, ChatId, Contact, ContactPortMaterial, CorrelationKey, CryptoId, GeneratedPort, GroupGrant,
    GroupId, IntroMessage, Line, LineGrant, LineId, PairHash, Permissions, PermissionsId, PoolKey,
    PortId, PortKind, PortResult, ReadPortRecord, RemotePort, Ticket, TicketId,
};
use async_trait::async_trait;

/// Remote issuer - outbound port.
///
/// Errors must be classified: `TransientIssuer` for network/API failures,
/// `PermanentIssuer` for 404/gone.
#[async_trait]
pub trait RemoteIssuer: Send + Sync {
    /// Allocate a batch of single-use direct port ids.
    async fn fetch_unused_ports(&self) -> PortResult<Vec<PortId>>;

    /// Allocate a batch of single-use group port ids.
    async fn fetch_unused_group_ports(&self, group_id: &GroupId) -> PortResult<Vec<PortId>>;

    /// Register a superport with a usage limit.
    async fn new_superport(&self, limit: u32) -> PortResult<PortId>;

    /// Change a superport's usage limit.
    async fn set_superport_limit(&self, port_id: &PortId, limit: u32) -> PortResult<()>;

    /// Register the group superport of a group.
    async fn new_group_superport(&self, group_id: &GroupId) -> PortResult<PortId>;

    /// Register a contact port bound to the owner's line with the contact.
    async fn new_contact_port(&self, line_id: &LineId, sharing_allowed: bool)
        -> PortResult<PortId>;

    /// Pause or resume a multi-use port.
    async fn set_paused(&self, port: &RemotePort, paused: bool) -> PortResult<()>;

    /// Delete a multi-use port.
    async fn delete_port(&self, port: &RemotePort) -> PortResult<()>;

    /// Mint a short-link id for a bundle.
    async fn mint_bundle_id(&self, bundle: &serde_json::Value, multi_use: bool)
        -> PortResult<String>;

    /// Form a line through a direct port or superport.
    async fn create_line(
        &self,
        kind: PortKind,
        port_id: &PortId,
        intro: &IntroMessage,
    ) -> PortResult<LineGrant>;

    /// Form a line through a contact port, spending a ticket.
    async fn create_line_from_contact_port(
        &self,
        port_id: &PortId,
        ticket: &TicketId,
        intro: &IntroMessage,
    ) -> PortResult<LineGrant>;

    /// Join a group through a group port or group superport.
    async fn join_group(&self, kind: PortKind, port_id: &PortId) -> PortResult<GroupGrant>;

    /// Announce a ticket to the contact port owner.
    async fn create_contact_port_ticket(
        &self,
        port_id: &PortId,
        ticket: &TicketId,
        line_id: &LineId,
        encrypted_payload: &str,
    ) -> PortResult<()>;

    /// Tell the issuer a line could not be set up locally.
    async fn report_line_failure(&self, line_id: &LineId) -> PortResult<()>;
}

/// Port lifecycle store - outbound port.
#[async_trait]
pub trait PortLifecycleStore: Send + Sync {
    /// Insert or replace a generated record, keyed by port id.
    async fn save_generated(&self, port: GeneratedPort) -> PortResult<()>;

    /// Get a generated record.
    async fn get_generated(&self, port_id: &PortId) -> PortResult<Option<GeneratedPort>>;

    /// Find a multi-use record by its correlation key.
    async fn find_generated(&self, key: &CorrelationKey) -> PortResult<Option<GeneratedPort>>;

    /// All generated records.
    async fn list_generated(&self) -> PortResult<Vec<GeneratedPort>>;

    /// Delete a generated record. Missing records are not an error.
    async fn delete_generated(&self, port_id: &PortId) -> PortResult<()>;

    /// Insert or replace a read record.
    async fn save_read(&self, record: ReadPortRecord) -> PortResult<()>;

    /// Get a read record.
    async fn get_read(&self, port_id: &PortId) -> PortResult<Option<ReadPortRecord>>;

    /// All read records.
    async fn list_read(&self) -> PortResult<Vec<ReadPortRecord>>;

    /// Delete a read record. Missing records are not an error.
    async fn delete_read(&self, port_id: &PortId) -> PortResult<()>;

    /// Add pre-fetched ids to a pool.
    async fn push_unused_ports(&self, pool: &PoolKey, port_ids: Vec<PortId>) -> PortResult<()>;

    /// Take one id from a pool.
    async fn pop_unused_port(&self, pool: &PoolKey) -> PortResult<Option<PortId>>;

    /// Ids left in a pool.
    async fn count_unused_ports(&self, pool: &PoolKey) -> PortResult<usize>;

    /// Insert or replace a ticket.
    async fn save_ticket(&self, ticket: Ticket) -> PortResult<()>;

    /// Get a ticket of a contact port.
    async fn get_ticket(
        &self,
        contact_port_id: &PortId,
        ticket_id: &TicketId,
    ) -> PortResult<Option<Ticket>>;

    /// Delete every ticket of a contact port.
    async fn delete_tickets(&self, contact_port_id: &PortId) -> PortResult<()>;
}

/// Crypto collaborator - outbound port.
///
/// Keys, rads and hashes cross this boundary as lowercase hex; ciphertexts
/// are opaque strings.
#[async_trait]
pub trait CryptoCollaborator: Send + Sync {
    /// Create a session with a fresh keypair and rad, or clone another.
    async fn create_session(&self, clone_from: Option<&CryptoId>) -> PortResult<CryptoId>;

    /// Create a session holding a contact port owner's published material.
    async fn create_contact_port_session(
        &self,
        material: &ContactPortMaterial,
    ) -> PortResult<CryptoId>;

    /// Own rad.
    async fn get_rad(&self, crypto_id: &CryptoId) -> PortResult<String>;

    /// Rad imported from the peer's bundle.
    async fn get_peer_rad(&self, crypto_id: &CryptoId) -> PortResult<String>;

    /// Own public key.
    async fn get_public_key(&self, crypto_id: &CryptoId) -> PortResult<String>;

    /// Hash of own public key.
    async fn get_public_key_hash(&self, crypto_id: &CryptoId) -> PortResult<String>;

    /// Material stored by `create_contact_port_session`.
    async fn get_contact_port_material(
        &self,
        crypto_id: &CryptoId,
    ) -> PortResult<ContactPortMaterial>;

    /// Derive the shared secret with a peer public key.
    async fn update_shared_secret(&self, crypto_id: &CryptoId, peer_public_key: &str)
        -> PortResult<()>;

    /// Import the peer's key hash and rad from its bundle.
    async fn update_peer_key_hash_and_rad(
        &self,
        crypto_id: &CryptoId,
        key_hash: &str,
        rad: &str,
    ) -> PortResult<()>;

    /// Encrypt with the shared secret.
    async fn encrypt(&self, crypto_id: &CryptoId, plaintext: &str) -> PortResult<String>;

    /// Decrypt with the shared secret.
    async fn decrypt(&self, crypto_id: &CryptoId, ciphertext: &str) -> PortResult<String>;

    /// Delete a session. Missing sessions are not an error.
    async fn delete_session(&self, crypto_id: &CryptoId) -> PortResult<()>;
}

/// Connection store - outbound port.
#[async_trait]
pub trait ConnectionStore: Send + Sync {
    /// Get a line.
    async fn get_line(&self, line_id: &LineId) -> PortResult<Option<Line>>;

    /// Insert a line unless one with the same id exists.
    ///
    /// Returns `false` when the line already existed. Must be atomic.
    async fn insert_line_if_absent(&self, line: Line) -> PortResult<bool>;

    /// Attach the chat's crypto session and permissions to a line.
    async fn attach_line_session(
        &self,
        line_id: &LineId,
        crypto_id: CryptoId,
        permissions_id: PermissionsId,
    ) -> PortResult<()>;

    /// Delete a line. Missing lines are not an error.
    async fn delete_line(&self, line_id: &LineId) -> PortResult<()>;

    /// Get a chat.
    async fn get_chat(&self, chat_id: &ChatId) -> PortResult<Option<Chat>>;

    /// Direct chat with a peer.
    async fn chat_for_pair_hash(&self, pair_hash: &PairHash) -> PortResult<Option<Chat>>;

    /// Chat currently routed through a line.
    async fn chat_for_line(&self, line_id: &LineId) -> PortResult<Option<Chat>>;

    /// Group chat of a group.
    async fn chat_for_group(&self, group_id: &GroupId) -> PortResult<Option<Chat>>;

    /// Insert or replace a chat.
    async fn save_chat(&self, chat: Chat) -> PortResult<()>;

    /// Delete a chat.
    async fn delete_chat(&self, chat_id: &ChatId) -> PortResult<()>;

    /// Get a contact.
    async fn get_contact(&self, pair_hash: &PairHash) -> PortResult<Option<Contact>>;

    /// Insert or replace a contact.
    async fn save_contact(&self, contact: Contact) -> PortResult<()>;

    /// Whether a peer is blocked.
    async fn is_blocked(&self, pair_hash: &PairHash) -> PortResult<bool>;
}

/// Permission store - outbound port.
#[async_trait]
pub trait PermissionStore: Send + Sync {
    /// Store a permission set under a new id.
    async fn create_permissions(&self, permissions: Permissions) -> PortResult<PermissionsId>;

    /// Get a permission set.
    async fn get_permissions(&self, id: &PermissionsId) -> PortResult<Option<Permissions>>;

    /// Replace a permission set.
    async fn update_permissions(&self, id: &PermissionsId, permissions: Permissions)
        -> PortResult<()>;

    /// Delete a permission set. Missing sets are not an error.
    async fn delete_permissions(&self, id: &PermissionsId) -> PortResult<()>;
}

/// Notification service - outbound port.
#[async_trait]
pub trait NotificationService: Send + Sync {
    /// Apply the chat's notification permission.
    async fn apply_notification_permission(&self, chat_id: &ChatId, enabled: bool)
        -> PortResult<()>;
}

/// Initial info exchange - outbound port.
#[async_trait]
pub trait InitialInfoExchange: Send + Sync {
    /// Messages the generator side sends once a chat is formed.
    async fn send_generator_info(&self, chat_id: &ChatId, line_id: &LineId) -> PortResult<()>;

    /// Messages the reader side sends once a chat is formed.
    async fn send_reader_info(&self, chat_id: &ChatId, line_id: &LineId) -> PortResult<()>;

    /// Mark a contact bundle shared in a chat message as accepted.
    async fn mark_shared_bundle_accepted(&self, chat_id: &ChatId, message_id: &str)
        -> PortResult<()>;
}

/// Own profile - outbound port.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    /// Own display name, sent in intro messages and published in bundles.
    async fn own_name(&self) -> PortResult<String>;
}
