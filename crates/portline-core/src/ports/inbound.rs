//! # Inbound Ports
//!
//! Generator and reader contracts. One implementing type per kind and
//! version, resolved through the `BundleVersionRegistry`.

use crate::domain::{
    Bundle, ChatId, ConnectionRequest, FolderId, GeneratedPort, GroupId, PairHash, PeerBundle,
    Permissions, PortError, PortId, PortKind, PortResult, PortSummary, ReadPortRecord,
    SweepReport, TicketId,
};
use async_trait::async_trait;

/// Owner side of a shareable port.
#[async_trait]
pub trait PortGenerator: Send + Sync {
    /// Bundle kind.
    fn kind(&self) -> PortKind;

    /// Version of the implementation (equals the record's stored version).
    fn version(&self) -> &str;

    /// Port id.
    fn port_id(&self) -> &str;

    /// Snapshot of the record as last persisted.
    fn record(&self) -> GeneratedPort;

    /// Bundle to render into a QR code.
    async fn get_shareable_bundle(&mut self) -> PortResult<Bundle>;

    /// Link to share; prefers a cached short link, never fails on issuer
    /// outage.
    async fn get_shareable_link(&mut self) -> PortResult<String>;

    /// Stop accepting connections.
    async fn pause(&mut self) -> PortResult<()> {
        Err(PortError::Validation(format!(
            "{} ports cannot be paused",
            self.kind()
        )))
    }

    /// Accept connections again.
    async fn resume(&mut self) -> PortResult<()> {
        Err(PortError::Validation(format!(
            "{} ports cannot be resumed",
            self.kind()
        )))
    }

    /// Delete the record with its crypto session and permissions.
    ///
    /// Idempotent; secondary failures are logged, never raised.
    async fn clean(&mut self);

    /// Consume a connection attempt notified by the issuer.
    ///
    /// Idempotent per line id.
    async fn use_connection(&mut self, request: &ConnectionRequest) -> PortResult<()> {
        let _ = request;
        Err(PortError::Validation(format!(
            "{} ports do not accept direct connections",
            self.kind()
        )))
    }

    /// Mark a single-use group invitation as used.
    async fn consume(&mut self) -> PortResult<()> {
        Err(PortError::Validation(format!(
            "{} ports are consumed through connections",
            self.kind()
        )))
    }

    /// Record a re-share ticket announced by the contact behind `chat_id`.
    async fn accept_ticket(&mut self, ticket_id: TicketId, chat_id: &ChatId) -> PortResult<()> {
        let _ = (ticket_id, chat_id);
        Err(PortError::Validation(format!(
            "{} ports do not take tickets",
            self.kind()
        )))
    }
}

/// Consumer side of an accepted bundle.
#[async_trait]
pub trait PortReader: Send + Sync {
    /// Bundle kind.
    fn kind(&self) -> PortKind;

    /// Version of the implementation (equals the record's stored version).
    fn version(&self) -> &str;

    /// Pending record.
    fn record(&self) -> &ReadPortRecord;

    /// Form the connection. Transient issuer errors keep the record.
    async fn use_bundle(&mut self) -> PortResult<()>;

    /// Delete the record with its crypto session and permissions.
    async fn clean(&self);
}

/// Port protocol API - inbound port of the facade.
#[async_trait]
pub trait PortProtocolApi: Send + Sync {
    /// Create a port with the latest version.
    async fn try_create_port(&self, request: CreatePortRequest)
        -> PortResult<Box<dyn PortGenerator>>;

    /// Parse a scanned string (bundle JSON or fallback link), validate it and
    /// store it as pending.
    async fn try_read_bundle(
        &self,
        raw: &str,
        channel: Option<String>,
        folder_id: Option<FolderId>,
    ) -> PortResult<ReadPortRecord>;

    /// Consume a connection attempt the issuer notified for a generated port.
    async fn on_line_created(
        &self,
        kind: PortKind,
        port_id: &PortId,
        request: &ConnectionRequest,
    ) -> PortResult<()>;

    /// Record a re-share ticket on a shared contact port.
    async fn accept_contact_port_ticket(
        &self,
        port_id: &PortId,
        ticket_id: TicketId,
        chat_id: &ChatId,
    ) -> PortResult<()>;

    /// Use every pending bundle. Concurrent calls never overlap.
    async fn process_read_bundles(&self) -> PortResult<SweepReport>;

    /// Delete a pending bundle with its session and permissions.
    async fn clean_delete_read_port(&self, port_id: &PortId) -> PortResult<()>;

    /// Delete expired direct ports, group ports and pending bundles.
    /// Returns how many records were removed.
    async fn cleanup_expired_ports(&self) -> PortResult<usize>;

    /// Direct ports and superports, newest first.
    async fn list_generated_ports(&self) -> PortResult<Vec<PortSummary>>;

    /// Stop a contact from re-sharing this user.
    async fn pause_contact_sharing(&self, chat_id: &ChatId) -> PortResult<()>;

    /// Let a contact re-share this user again.
    async fn resume_contact_sharing(&self, chat_id: &ChatId) -> PortResult<()>;
}

/// Parameters of `PortGenerator` creation, per kind.
#[derive(Clone, Debug)]
pub enum CreatePortRequest {
    /// Single-use direct port.
    Direct {
        /// Label for the contact this port creates.
        label: Option<String>,
        /// Folder for the new chat.
        folder_id: Option<FolderId>,
        /// Permissions for the new chat.
        permissions: Option<Permissions>,
        /// Override of the configured lifetime.
        expires_in: Option<chrono::Duration>,
    },
    /// Multi-use direct port.
    Superport {
        /// Label for contacts this port creates.
        label: Option<String>,
        /// Maximum successful connections.
        limit: u32,
        /// Folder for new chats.
        folder_id: Option<FolderId>,
        /// Permissions copied to every chat.
        permissions: Option<Permissions>,
    },
    /// Single-use group port.
    Group {
        /// Group to admit to.
        group_id: GroupId,
        /// Group name for the bundle.
        name: String,
        /// Group description for the bundle.
        description: Option<String>,
    },
    /// The group superport of a group.
    GroupSuperport {
        /// Group to admit to.
        group_id: GroupId,
        /// Group name for the bundle.
        name: String,
        /// Group description for the bundle.
        description: Option<String>,
        /// Optional usage limit.
        limit: Option<u32>,
        /// Replace an existing group superport.
        regenerate: bool,
    },
    /// Contact port shared with an existing contact.
    SharedContactPort {
        /// Contact allowed to re-share.
        pair_hash: PairHash,
        /// Folder for chats formed through re-shares.
        folder_id: Option<FolderId>,
    },
    /// Contact port received from its owner.
    AcceptedContactPort {
        /// Owner.
        pair_hash: PairHash,
        /// Bundle the owner sent.
        bundle: PeerBundle,
    },
}

impl CreatePortRequest {
    /// Bundle kind the request creates.
    pub fn kind(&self) -> PortKind {
        match self {
            CreatePortRequest::Direct { .. } => PortKind::Direct,
            CreatePortRequest::Superport { .. } => PortKind::Superport,
            CreatePortRequest::Group { .. } => PortKind::Group,
            CreatePortRequest::GroupSuperport { .. } => PortKind::GroupSuperport,
            CreatePortRequest::SharedContactPort { .. }
            | CreatePortRequest::AcceptedContactPort { .. } => PortKind::ContactPort,
        }
    }

    /// Whether the request creates an accepted (contact-side) port.
    pub fn is_accepted_contact_port(&self) -> bool {
        matches!(self, CreatePortRequest::AcceptedContactPort { .. })
    }
}
