//! # Direct Port (1.0.0)
//!
//! Single-use port. Its crypto session and permissions move to the line it
//! forms; any other failure discards the port unless the issuer was merely
//! unreachable.

use super::{
    create_permissions, delete_owned, draw_pooled_port, ensure_permissions, own_name, peer_bundle,
    replace_permissions, resolve_shareable_link, run_handshake, HandshakeTarget,
};
use crate::application::context::PortContext;
use crate::domain::{
    Bundle, ConnectionRequest, CryptoId, DirectPortRecord, FolderId, GeneratedPort, IntroSecret,
    PermissionsId, Permissions, PoolKey, PortError, PortId, PortKind, PortResult, LATEST_VERSION,
};
use crate::metrics;
use crate::ports::PortGenerator;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{info, warn};

/// Direct port generator, version 1.0.0.
pub struct DirectPortV1 {
    ctx: PortContext,
    record: DirectPortRecord,
    session_moved: bool,
}

impl DirectPortV1 {
    /// Version implemented by this type.
    pub const VERSION: &'static str = LATEST_VERSION;

    /// Create and persist a new direct port.
    pub async fn create(
        ctx: &PortContext,
        label: Option<String>,
        folder_id: Option<FolderId>,
        permissions: Option<Permissions>,
        expires_in: Option<Duration>,
    ) -> PortResult<Self> {
        let port_id = draw_pooled_port(ctx, &PoolKey::Direct).await?;
        let crypto_id = ctx.crypto.create_session(None).await?;
        let permissions_id = match create_permissions(ctx, permissions).await {
            Ok(id) => id,
            Err(e) => {
                delete_owned(ctx, Some(&crypto_id), None).await;
                return Err(e);
            }
        };
        let created_on = Utc::now();
        let record = DirectPortRecord {
            port_id,
            version: Self::VERSION.to_string(),
            label,
            crypto_id,
            folder_id: folder_id.unwrap_or_else(|| ctx.config.default_folder_id.clone()),
            permissions_id: Some(permissions_id),
            created_on,
            expiry_timestamp: Some(
                created_on + expires_in.unwrap_or_else(|| ctx.config.direct_port_expiry()),
            ),
            bundle_id: None,
        };
        if let Err(e) = ctx
            .store
            .save_generated(GeneratedPort::Direct(record.clone()))
            .await
        {
            delete_owned(ctx, Some(&record.crypto_id), record.permissions_id.as_ref()).await;
            return Err(e);
        }

        metrics::record_port_created(PortKind::Direct);
        info!(port_id = %record.port_id, version = %record.version, "[portline] direct port created");
        Ok(Self::load(ctx, record))
    }

    /// Wrap a persisted record.
    pub fn load(ctx: &PortContext, record: DirectPortRecord) -> Self {
        Self {
            ctx: ctx.clone(),
            record,
            session_moved: false,
        }
    }

    /// Typed record.
    pub fn data(&self) -> &DirectPortRecord {
        &self.record
    }

    /// Change the label given to the contact this port creates.
    pub async fn update_label(&mut self, label: Option<String>) -> PortResult<()> {
        self.record.label = label;
        self.persist().await
    }

    /// Replace the permissions the new chat will get.
    pub async fn update_permissions(&mut self, permissions: Permissions) -> PortResult<()> {
        replace_permissions(&self.ctx, &mut self.record.permissions_id, permissions).await?;
        self.persist().await
    }

    async fn persist(&self) -> PortResult<()> {
        self.ctx
            .store
            .save_generated(GeneratedPort::Direct(self.record.clone()))
            .await
    }

    async fn discard(&self) {
        if let Err(e) = self.ctx.store.delete_generated(&self.record.port_id).await {
            warn!(port_id = %self.record.port_id, error = %e, "[portline] failed to delete direct port");
        }
        delete_owned(
            &self.ctx,
            Some(&self.record.crypto_id),
            self.record.permissions_id.as_ref(),
        )
        .await;
    }
}

#[async_trait]
impl PortGenerator for DirectPortV1 {
    fn kind(&self) -> PortKind {
        PortKind::Direct
    }

    fn version(&self) -> &str {
        &self.record.version
    }

    fn port_id(&self) -> &str {
        &self.record.port_id
    }

    fn record(&self) -> GeneratedPort {
        GeneratedPort::Direct(self.record.clone())
    }

    async fn get_shareable_bundle(&mut self) -> PortResult<Bundle> {
        let name = own_name(&self.ctx).await;
        let bundle = peer_bundle(
            &self.ctx,
            PortKind::Direct,
            &self.record.port_id,
            &self.record.version,
            &self.record.crypto_id,
            name,
            None,
            self.record.expiry_timestamp,
        )
        .await?;
        Ok(Bundle::Peer(bundle))
    }

    async fn get_shareable_link(&mut self) -> PortResult<String> {
        let bundle = self.get_shareable_bundle().await?;
        let resolved =
            resolve_shareable_link(&self.ctx, self.record.bundle_id.as_deref(), &bundle, false)
                .await?;
        if let Some(bundle_id) = resolved.minted {
            self.record.bundle_id = Some(bundle_id);
            if let Err(e) = self.persist().await {
                warn!(port_id = %self.record.port_id, error = %e, "[portline] failed to cache bundle id");
            }
        }
        Ok(resolved.link)
    }

    async fn clean(&mut self) {
        if self.session_moved {
            if let Err(e) = self.ctx.store.delete_generated(&self.record.port_id).await {
                warn!(port_id = %self.record.port_id, error = %e, "[portline] failed to delete direct port");
            }
            return;
        }
        self.discard().await;
    }

    async fn use_connection(&mut self, request: &ConnectionRequest) -> PortResult<()> {
        let ctx = self.ctx.clone();
        run_handshake(&ctx, self, request).await
    }
}

#[async_trait]
impl HandshakeTarget for DirectPortV1 {
    fn target_port_id(&self) -> &PortId {
        &self.record.port_id
    }

    fn target_kind(&self) -> PortKind {
        PortKind::Direct
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

    async fn check_capacity(&mut self, _ctx: &PortContext) -> PortResult<()> {
        if self
            .record
            .expiry_timestamp
            .is_some_and(|expiry| expiry <= Utc::now())
        {
            return Err(PortError::Expired {
                port_id: self.record.port_id.clone(),
            });
        }
        Ok(())
    }

    async fn line_session(
        &mut self,
        _ctx: &PortContext,
        permissions_id: &PermissionsId,
    ) -> PortResult<(CryptoId, PermissionsId)> {
        self.session_moved = true;
        Ok((self.record.crypto_id.clone(), permissions_id.clone()))
    }

    async fn record_success(&mut self, ctx: &PortContext, _secret: &IntroSecret) -> PortResult<()> {
        ctx.store.delete_generated(&self.record.port_id).await
    }

    async fn on_failure(&mut self, _ctx: &PortContext, err: &PortError) {
        if err.is_transient() {
            return;
        }
        self.discard().await;
    }
}
