//! # Superport (1.0.0)
//!
//! Multi-use direct port with a usage limit. Every chat gets a clone of the
//! port session; reaching the limit pauses the port.

use super::{
    clone_port_session, create_permissions, delete_owned, delete_remote_port, ensure_permissions,
    own_name, peer_bundle, replace_permissions, resolve_shareable_link, run_handshake,
    set_remote_paused, HandshakeTarget,
};
use crate::application::context::PortContext;
use crate::domain::{
    invariant_connections_within_limit, invariant_limit_not_below_usage, Bundle,
    ConnectionRequest, CryptoId, FolderId, GeneratedPort, IntroSecret, Permissions, PermissionsId,
    PortError, PortId, PortKind, PortResult, RemotePort, SuperportRecord, LATEST_VERSION,
};
use crate::metrics;
use crate::ports::PortGenerator;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

/// Superport generator, version 1.0.0.
pub struct SuperportV1 {
    ctx: PortContext,
    record: SuperportRecord,
}

impl SuperportV1 {
    /// Version implemented by this type.
    pub const VERSION: &'static str = LATEST_VERSION;

    /// Register and persist a new superport.
    pub async fn create(
        ctx: &PortContext,
        label: Option<String>,
        limit: u32,
        folder_id: Option<FolderId>,
        permissions: Option<Permissions>,
    ) -> PortResult<Self> {
        if limit == 0 {
            return Err(PortError::Validation(
                "superport limit must be at least 1".to_string(),
            ));
        }
        let port_id = ctx.issuer.new_superport(limit).await?;
        let crypto_id = ctx.crypto.create_session(None).await?;
        let permissions_id = match create_permissions(ctx, permissions).await {
            Ok(id) => id,
            Err(e) => {
                delete_owned(ctx, Some(&crypto_id), None).await;
                return Err(e);
            }
        };
        let record = SuperportRecord {
            port_id,
            version: Self::VERSION.to_string(),
            label,
            crypto_id,
            folder_id: folder_id.unwrap_or_else(|| ctx.config.default_folder_id.clone()),
            permissions_id: Some(permissions_id),
            created_on: Utc::now(),
            connections_limit: limit,
            connections_made: 0,
            paused: false,
            bundle_id: None,
        };
        if let Err(e) = ctx
            .store
            .save_generated(GeneratedPort::Superport(record.clone()))
            .await
        {
            delete_owned(ctx, Some(&record.crypto_id), record.permissions_id.as_ref()).await;
            return Err(e);
        }

        metrics::record_port_created(PortKind::Superport);
        info!(port_id = %record.port_id, limit, "[portline] superport created");
        Ok(Self::load(ctx, record))
    }

    /// Wrap a persisted record.
    pub fn load(ctx: &PortContext, record: SuperportRecord) -> Self {
        Self {
            ctx: ctx.clone(),
            record,
        }
    }

    /// Typed record.
    pub fn data(&self) -> &SuperportRecord {
        &self.record
    }

    /// Change the usage limit. Never below the connections already made;
    /// a paused port stays paused.
    pub async fn update_limit(&mut self, limit: u32) -> PortResult<()> {
        invariant_limit_not_below_usage(limit, self.record.connections_made)?;
        self.ctx
            .issuer
            .set_superport_limit(&self.record.port_id, limit)
            .await?;
        self.record.connections_limit = limit;
        self.persist().await?;
        info!(port_id = %self.record.port_id, limit, "[portline] superport limit updated");
        Ok(())
    }

    /// Change the label given to new contacts.
    pub async fn update_label(&mut self, label: Option<String>) -> PortResult<()> {
        self.record.label = label;
        self.persist().await
    }

    /// Replace the permissions copied to new chats.
    pub async fn update_permissions(&mut self, permissions: Permissions) -> PortResult<()> {
        replace_permissions(&self.ctx, &mut self.record.permissions_id, permissions).await?;
        self.persist().await
    }

    fn remote(&self) -> RemotePort {
        RemotePort::Superport(self.record.port_id.clone())
    }

    async fn persist(&self) -> PortResult<()> {
        self.ctx
            .store
            .save_generated(GeneratedPort::Superport(self.record.clone()))
            .await
    }

    async fn set_paused(&mut self, paused: bool) -> PortResult<()> {
        set_remote_paused(&self.ctx, &self.remote(), paused).await;
        self.record.paused = paused;
        self.persist().await
    }
}

#[async_trait]
impl PortGenerator for SuperportV1 {
    fn kind(&self) -> PortKind {
        PortKind::Superport
    }

    fn version(&self) -> &str {
        &self.record.version
    }

    fn port_id(&self) -> &str {
        &self.record.port_id
    }

    fn record(&self) -> GeneratedPort {
        GeneratedPort::Superport(self.record.clone())
    }

    async fn get_shareable_bundle(&mut self) -> PortResult<Bundle> {
        let name = own_name(&self.ctx).await;
        let bundle = peer_bundle(
            &self.ctx,
            PortKind::Superport,
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
        delete_remote_port(&self.ctx, &self.remote()).await;
        if let Err(e) = self.ctx.store.delete_generated(&self.record.port_id).await {
            warn!(port_id = %self.record.port_id, error = %e, "[portline] failed to delete superport");
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
}

#[async_trait]
impl HandshakeTarget for SuperportV1 {
    fn target_port_id(&self) -> &PortId {
        &self.record.port_id
    }

    fn target_kind(&self) -> PortKind {
        PortKind::Superport
    }

    fn port_crypto_id(&self) -> &CryptoId {
        &self.record.crypto_id
    }

    fn target_folder_id(&self) -> &FolderId {
        &self.record.folder_id
    }

    fn target_label(&self) -> Option<&str> {
        self.record.label.as_deref()
    }

    async fn port_permissions(&mut self, ctx: &PortContext) -> PortResult<PermissionsId> {
        let (id, created) = ensure_permissions(ctx, &mut self.record.permissions_id).await?;
        if created {
            self.persist().await?;
        }
        Ok(id)
    }

    async fn check_capacity(&mut self, ctx: &PortContext) -> PortResult<()> {
        if self.record.paused || self.record.connections_made >= self.record.connections_limit {
            set_remote_paused(ctx, &self.remote(), true).await;
            return Err(PortError::Capacity {
                port_id: self.record.port_id.clone(),
            });
        }
        Ok(())
    }

    async fn line_session(
        &mut self,
        ctx: &PortContext,
        permissions_id: &PermissionsId,
    ) -> PortResult<(CryptoId, PermissionsId)> {
        clone_port_session(ctx, &self.record.crypto_id, permissions_id).await
    }

    async fn record_success(&mut self, ctx: &PortContext, _secret: &IntroSecret) -> PortResult<()> {
        let made = self.record.connections_made + 1;
        invariant_connections_within_limit(made, self.record.connections_limit)?;
        self.record.connections_made = made;
        if made >= self.record.connections_limit {
            self.record.paused = true;
            set_remote_paused(ctx, &self.remote(), true).await;
            info!(port_id = %self.record.port_id, made, "[portline] superport limit reached, paused");
        }
        self.persist().await
    }
}
