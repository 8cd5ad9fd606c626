//! # Shared Contact Port (1.0.0)
//!
//! A port this user hands to one existing contact, who may re-share it with
//! others. Every re-share is authorized by a ticket the contact announces
//! first; the handshake only accepts an intro carrying an active ticket, and
//! spends it.
//!
//! The port is paused whenever the contact's `contact_sharing` permission is
//! off, and pausing mirrors back into that permission.

use super::{
    clone_port_session, create_permissions, delete_owned, delete_remote_port, ensure_permissions,
    own_name, peer_bundle, resolve_shareable_link, run_handshake, set_remote_paused,
    HandshakeTarget,
};
use crate::application::context::PortContext;
use crate::domain::{
    Bundle, ChatId, ConnectionRequest, ContactPortRecord, CorrelationKey, CryptoId, FolderId,
    GeneratedPort, IntroSecret, PairHash, PermissionsId, PortError, PortId, PortKind, PortResult,
    RemotePort, Ticket, TicketId, LATEST_VERSION,
};
use crate::metrics;
use crate::ports::PortGenerator;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

/// Shared contact port generator, version 1.0.0.
pub struct SharedContactPortV1 {
    ctx: PortContext,
    record: ContactPortRecord,
}

/// Load the permission set of the line currently serving a contact.
async fn contact_line_permissions(
    ctx: &PortContext,
    pair_hash: &PairHash,
) -> PortResult<Option<PermissionsId>> {
    let Some(chat) = ctx.connections.chat_for_pair_hash(pair_hash).await? else {
        return Ok(None);
    };
    Ok(ctx
        .connections
        .get_line(&chat.line_id)
        .await?
        .and_then(|line| line.permissions_id))
}

/// Set a contact's `contact_sharing` permission. Returns whether a
/// permission set was found to update.
pub(crate) async fn set_contact_sharing(
    ctx: &PortContext,
    pair_hash: &PairHash,
    allowed: bool,
) -> PortResult<bool> {
    let Some(permissions_id) = contact_line_permissions(ctx, pair_hash).await? else {
        return Ok(false);
    };
    let mut permissions = ctx
        .permissions
        .get_permissions(&permissions_id)
        .await?
        .unwrap_or_default();
    permissions.contact_sharing = allowed;
    ctx.permissions
        .update_permissions(&permissions_id, permissions)
        .await?;
    Ok(true)
}

impl SharedContactPortV1 {
    /// Version implemented by this type.
    pub const VERSION: &'static str = LATEST_VERSION;

    /// Return the contact's shared port, creating it if there is none.
    ///
    /// The contact must have a connected chat with this user.
    pub async fn create(
        ctx: &PortContext,
        pair_hash: PairHash,
        folder_id: Option<FolderId>,
    ) -> PortResult<Self> {
        let key = CorrelationKey::SharedContactPort(pair_hash.clone());
        if let Some(existing) = ctx.store.find_generated(&key).await? {
            return match existing {
                GeneratedPort::ContactPort(record) => Ok(Self::load(ctx, record)),
                other => Err(PortError::Storage(format!(
                    "contact port key resolved to a {} port",
                    other.kind()
                ))),
            };
        }

        let chat = ctx
            .connections
            .chat_for_pair_hash(&pair_hash)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("chat with {}", pair_hash)))?;
        let line = ctx
            .connections
            .get_line(&chat.line_id)
            .await?
            .filter(|line| line.authenticated && !line.disconnected)
            .ok_or_else(|| {
                PortError::Validation(format!("contact {} is not connected", pair_hash))
            })?;
        let sharing_allowed = match &line.permissions_id {
            Some(id) => ctx
                .permissions
                .get_permissions(id)
                .await?
                .unwrap_or_default()
                .contact_sharing,
            None => true,
        };

        let port_id = ctx
            .issuer
            .new_contact_port(&line.line_id, sharing_allowed)
            .await?;
        let crypto_id = ctx.crypto.create_session(None).await?;
        let permissions_id = match create_permissions(ctx, None).await {
            Ok(id) => id,
            Err(e) => {
                delete_owned(ctx, Some(&crypto_id), None).await;
                return Err(e);
            }
        };
        let record = ContactPortRecord {
            port_id,
            version: Self::VERSION.to_string(),
            pair_hash,
            crypto_id,
            folder_id: folder_id.unwrap_or_else(|| ctx.config.default_folder_id.clone()),
            permissions_id: Some(permissions_id),
            created_on: Utc::now(),
            connections_made: 0,
            paused: !sharing_allowed,
            bundle_id: None,
        };
        if let Err(e) = ctx
            .store
            .save_generated(GeneratedPort::ContactPort(record.clone()))
            .await
        {
            delete_owned(ctx, Some(&record.crypto_id), record.permissions_id.as_ref()).await;
            return Err(e);
        }

        metrics::record_port_created(PortKind::ContactPort);
        info!(
            port_id = %record.port_id,
            pair_hash = %record.pair_hash,
            paused = record.paused,
            "[portline] contact port created"
        );
        Ok(Self::load(ctx, record))
    }

    /// Wrap a persisted record.
    pub fn load(ctx: &PortContext, record: ContactPortRecord) -> Self {
        Self {
            ctx: ctx.clone(),
            record,
        }
    }

    /// Typed record.
    pub fn data(&self) -> &ContactPortRecord {
        &self.record
    }

    fn remote(&self) -> RemotePort {
        RemotePort::ContactPort(self.record.port_id.clone())
    }

    async fn persist(&self) -> PortResult<()> {
        self.ctx
            .store
            .save_generated(GeneratedPort::ContactPort(self.record.clone()))
            .await
    }

    async fn set_paused(&mut self, paused: bool) -> PortResult<()> {
        set_remote_paused(&self.ctx, &self.remote(), paused).await;
        self.record.paused = paused;
        self.persist().await?;
        match set_contact_sharing(&self.ctx, &self.record.pair_hash, !paused).await {
            Ok(true) => {}
            Ok(false) => debug!(pair_hash = %self.record.pair_hash, "[portline] no chat to mirror sharing state into"),
            Err(e) => warn!(pair_hash = %self.record.pair_hash, error = %e, "[portline] failed to mirror sharing state"),
        }
        Ok(())
    }
}

#[async_trait]
impl PortGenerator for SharedContactPortV1 {
    fn kind(&self) -> PortKind {
        PortKind::ContactPort
    }

    fn version(&self) -> &str {
        &self.record.version
    }

    fn port_id(&self) -> &str {
        &self.record.port_id
    }

    fn record(&self) -> GeneratedPort {
        GeneratedPort::ContactPort(self.record.clone())
    }

    /// The material sent to the contact; carries no ticket.
    async fn get_shareable_bundle(&mut self) -> PortResult<Bundle> {
        let name = own_name(&self.ctx).await;
        let bundle = peer_bundle(
            &self.ctx,
            PortKind::ContactPort,
            &self.record.port_id,
            &self.record.version,
            &self.record.crypto_id,
            name,
            None,
            None,
        )
        .await?;
        Ok(Bundle::Peer(bundle))
    }

    async fn get_shareable_link(&mut self) -> PortResult<String> {
        let bundle = self.get_shareable_bundle().await?;
        let resolved =
            resolve_shareable_link(&self.ctx, self.record.bundle_id.as_deref(), &bundle, true)
                .await?;
        if let Some(bundle_id) = resolved.minted {
            self.record.bundle_id = Some(bundle_id);
            if let Err(e) = self.persist().await {
                warn!(port_id = %self.record.port_id, error = %e, "[portline] failed to cache bundle id");
            }
        }
        Ok(resolved.link)
    }

    async fn pause(&mut self) -> PortResult<()> {
        self.set_paused(true).await
    }

    async fn resume(&mut self) -> PortResult<()> {
        self.set_paused(false).await
    }

    async fn clean(&mut self) {
        set_remote_paused(&self.ctx, &self.remote(), true).await;
        delete_remote_port(&self.ctx, &self.remote()).await;
        if let Err(e) = self.ctx.store.delete_tickets(&self.record.port_id).await {
            warn!(port_id = %self.record.port_id, error = %e, "[portline] failed to delete tickets");
        }
        if let Err(e) = self.ctx.store.delete_generated(&self.record.port_id).await {
            warn!(port_id = %self.record.port_id, error = %e, "[portline] failed to delete contact port");
        }
        delete_owned(
            &self.ctx,
            Some(&self.record.crypto_id),
            self.record.permissions_id.as_ref(),
        )
        .await;
    }

    async fn use_connection(&mut self, request: &ConnectionRequest) -> PortResult<()> {
        let ctx = self.ctx.clone();
        run_handshake(&ctx, self, request).await
    }

    /// Accept a ticket announced through `chat_id`.
    ///
    /// Only the contact the port was shared with can announce tickets, and
    /// only while the port is not paused.
    async fn accept_ticket(&mut self, ticket_id: TicketId, chat_id: &ChatId) -> PortResult<()> {
        let chat = self
            .ctx
            .connections
            .get_chat(chat_id)
            .await?
            .ok_or_else(|| PortError::NotFound(format!("chat {}", chat_id)))?;
        if chat.pair_hash.as_ref() != Some(&self.record.pair_hash) {
            return Err(PortError::Verification(
                "ticket announced by another contact".to_string(),
            ));
        }
        if self.record.paused {
            set_remote_paused(&self.ctx, &self.remote(), true).await;
            return Err(PortError::Capacity {
                port_id: self.record.port_id.clone(),
            });
        }
        self.ctx
            .store
            .save_ticket(Ticket {
                contact_port_id: self.record.port_id.clone(),
                ticket_id: ticket_id.clone(),
                active: true,
            })
            .await?;
        debug!(port_id = %self.record.port_id, ticket = %ticket_id, "[portline] ticket accepted");
        Ok(())
    }
}

#[async_trait]
impl HandshakeTarget for SharedContactPortV1 {
    fn target_port_id(&self) -> &PortId {
        &self.record.port_id
    }

    fn target_kind(&self) -> PortKind {
        PortKind::ContactPort
    }

    fn port_crypto_id(&self) -> &CryptoId {
        &self.record.crypto_id
    }

    fn target_folder_id(&self) -> &FolderId {
        &self.record.folder_id
    }

    fn connection_source(&self) -> Option<PairHash> {
        Some(self.record.pair_hash.clone())
    }

    async fn port_permissions(&mut self, ctx: &PortContext) -> PortResult<PermissionsId> {
        let (id, created) = ensure_permissions(ctx, &mut self.record.permissions_id).await?;
        if created {
            self.persist().await?;
        }
        Ok(id)
    }

    async fn check_capacity(&mut self, ctx: &PortContext) -> PortResult<()> {
        if self.record.paused {
            set_remote_paused(ctx, &self.remote(), true).await;
            return Err(PortError::Capacity {
                port_id: self.record.port_id.clone(),
            });
        }
        Ok(())
    }

    async fn check_secret(&self, ctx: &PortContext, secret: &IntroSecret) -> PortResult<()> {
        let ticket_id = secret
            .ticket
            .as_ref()
            .ok_or_else(|| PortError::Verification("intro carries no ticket".to_string()))?;
        match ctx.store.get_ticket(&self.record.port_id, ticket_id).await? {
            Some(ticket) if ticket.active => Ok(()),
            _ => Err(PortError::Verification(format!(
                "ticket {} is not active",
                ticket_id
            ))),
        }
    }

    async fn line_session(
        &mut self,
        ctx: &PortContext,
        permissions_id: &PermissionsId,
    ) -> PortResult<(CryptoId, PermissionsId)> {
        clone_port_session(ctx, &self.record.crypto_id, permissions_id).await
    }

    async fn record_success(&mut self, ctx: &PortContext, secret: &IntroSecret) -> PortResult<()> {
        if let Some(ticket_id) = &secret.ticket {
            ctx.store
                .save_ticket(Ticket {
                    contact_port_id: self.record.port_id.clone(),
                    ticket_id: ticket_id.clone(),
                    active: false,
                })
                .await?;
        }
        self.record.connections_made += 1;
        self.persist().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryBackend;
    use crate::application::connection::{merge_connection, MergeRequest};
    use crate::application::generators::test_support::reader_request;
    use crate::config::PortProtocolConfig;
    use crate::domain::{Permissions, PeerBundle};
    use crate::ports::{ConnectionStore, PermissionStore, PortLifecycleStore};

    const TICKET: &str = "0123456789abcdef0123456789abcdef";

    /// Backend with a connected chat to contact "B"; returns its chat id.
    async fn backend_with_contact(contact_sharing: bool) -> (InMemoryBackend, PortContext, ChatId) {
        let backend = InMemoryBackend::new("Alice");
        let ctx = backend.context(PortProtocolConfig::for_testing());
        merge_connection(
            &ctx,
            MergeRequest {
                line_id: &"LB".to_string(),
                pair_hash: &"B".to_string(),
                contact_name: "Bob".into(),
                folder_id: &"all".to_string(),
                connection_source: None,
            },
        )
        .await
        .unwrap();
        let crypto = ctx.crypto.create_session(None).await.unwrap();
        let permissions = ctx
            .permissions
            .create_permissions(Permissions {
                contact_sharing,
                ..Permissions::default()
            })
            .await
            .unwrap();
        ctx.connections
            .attach_line_session(&"LB".to_string(), crypto, permissions)
            .await
            .unwrap();
        let chat_id = backend.connections.chats()[0].chat_id.clone();
        (backend, ctx, chat_id)
    }

    async fn material(port: &mut SharedContactPortV1) -> PeerBundle {
        port.get_shareable_bundle().await.unwrap().as_peer().unwrap().clone()
    }

    #[tokio::test]
    async fn test_create_requires_connected_contact() {
        let backend = InMemoryBackend::new("Alice");
        let ctx = backend.context(PortProtocolConfig::for_testing());
        let result = SharedContactPortV1::create(&ctx, "B".into(), None).await;
        assert!(matches!(result, Err(PortError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_is_idempotent_and_follows_sharing_permission() {
        let (backend, ctx, _) = backend_with_contact(false).await;
        let first = SharedContactPortV1::create(&ctx, "B".into(), None).await.unwrap();
        let second = SharedContactPortV1::create(&ctx, "B".into(), None).await.unwrap();
        assert_eq!(first.port_id(), second.port_id());
        assert!(first.data().paused);
        assert!(backend.issuer.is_paused(&first.remote()));
    }

    #[tokio::test]
    async fn test_ticket_authorizes_exactly_one_connection() {
        let (backend, ctx, chat_id) = backend_with_contact(true).await;
        let mut port = SharedContactPortV1::create(&ctx, "B".into(), None).await.unwrap();
        let mut bundle = material(&mut port).await;
        bundle.ticket = Some(TICKET.into());
        port.accept_ticket(TICKET.into(), &chat_id).await.unwrap();

        port.use_connection(&reader_request(&bundle, "LC", "C", Some(TICKET.into())).await)
            .await
            .unwrap();
        let contact = backend.connections.get_contact(&"C".to_string()).await.unwrap().unwrap();
        assert_eq!(contact.connection_source.as_deref(), Some("B"));
        assert_eq!(port.data().connections_made, 1);
        let ticket = backend
            .store
            .get_ticket(&port.data().port_id, &TICKET.to_string())
            .await
            .unwrap()
            .unwrap();
        assert!(!ticket.active);

        let err = port
            .use_connection(&reader_request(&bundle, "LD", "D", Some(TICKET.into())).await)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Verification(_)));
        assert!(backend.connections.get_contact(&"D".to_string()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_ticket_is_rejected() {
        let (_backend, ctx, _) = backend_with_contact(true).await;
        let mut port = SharedContactPortV1::create(&ctx, "B".into(), None).await.unwrap();
        let bundle = material(&mut port).await;
        let err = port
            .use_connection(&reader_request(&bundle, "LC", "C", None).await)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Verification(_)));
    }

    #[tokio::test]
    async fn test_ticket_from_other_contact_is_refused() {
        let (backend, ctx, _) = backend_with_contact(true).await;
        let mut port = SharedContactPortV1::create(&ctx, "B".into(), None).await.unwrap();
        merge_connection(
            &ctx,
            MergeRequest {
                line_id: &"LE".to_string(),
                pair_hash: &"E".to_string(),
                contact_name: "Eve".into(),
                folder_id: &"all".to_string(),
                connection_source: None,
            },
        )
        .await
        .unwrap();
        let eve_chat = backend
            .connections
            .chat_for_pair_hash(&"E".to_string())
            .await
            .unwrap()
            .unwrap();
        let err = port.accept_ticket(TICKET.into(), &eve_chat.chat_id).await.unwrap_err();
        assert!(matches!(err, PortError::Verification(_)));
    }

    #[tokio::test]
    async fn test_pause_mirrors_contact_sharing() {
        let (backend, ctx, chat_id) = backend_with_contact(true).await;
        let mut port = SharedContactPortV1::create(&ctx, "B".into(), None).await.unwrap();

        port.pause().await.unwrap();
        let line = backend.connections.get_line(&"LB".to_string()).await.unwrap().unwrap();
        let permissions = backend
            .permissions
            .get_permissions(line.permissions_id.as_ref().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert!(!permissions.contact_sharing);
        let err = port.accept_ticket(TICKET.into(), &chat_id).await.unwrap_err();
        assert!(matches!(err, PortError::Capacity { .. }));

        port.resume().await.unwrap();
        port.accept_ticket(TICKET.into(), &chat_id).await.unwrap();
    }

    #[tokio::test]
    async fn test_clean_removes_tickets_and_remote() {
        let (backend, ctx, chat_id) = backend_with_contact(true).await;
        let mut port = SharedContactPortV1::create(&ctx, "B".into(), None).await.unwrap();
        port.accept_ticket(TICKET.into(), &chat_id).await.unwrap();

        port.clean().await;
        port.clean().await;
        assert!(backend.issuer.is_deleted(&port.remote()));
        assert!(backend
            .store
            .get_ticket(&port.data().port_id, &TICKET.to_string())
            .await
            .unwrap()
            .is_none());
        assert!(!backend.crypto.contains(&port.data().crypto_id));
    }
}
