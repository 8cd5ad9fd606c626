//! # Group Port (1.0.0)
//!
//! Single-use invitation into a group. Membership is joined by the reader
//! through the issuer, so the owner side never runs a handshake; it only
//! consumes the record once the invitation has been used.

use super::{draw_pooled_port, resolve_shareable_link};
use crate::application::context::PortContext;
use crate::domain::{
    clip_name, Bundle, GeneratedPort, GroupBundle, GroupId, GroupPortRecord, PoolKey, PortKind,
    PortResult, LATEST_VERSION, ORG_NAME,
};
use crate::metrics;
use crate::ports::PortGenerator;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

/// Group port generator, version 1.0.0.
pub struct GroupPortV1 {
    ctx: PortContext,
    record: GroupPortRecord,
}

impl GroupPortV1 {
    /// Version implemented by this type.
    pub const VERSION: &'static str = LATEST_VERSION;

    /// Create and persist a new group port.
    pub async fn create(
        ctx: &PortContext,
        group_id: GroupId,
        name: String,
        description: Option<String>,
    ) -> PortResult<Self> {
        let port_id = draw_pooled_port(ctx, &PoolKey::Group(group_id.clone())).await?;
        let created_on = Utc::now();
        let record = GroupPortRecord {
            port_id,
            version: Self::VERSION.to_string(),
            group_id,
            name,
            description,
            created_on,
            expiry_timestamp: Some(created_on + ctx.config.group_port_expiry()),
            bundle_id: None,
        };
        ctx.store
            .save_generated(GeneratedPort::Group(record.clone()))
            .await?;

        metrics::record_port_created(PortKind::Group);
        info!(port_id = %record.port_id, group_id = %record.group_id, "[portline] group port created");
        Ok(Self::load(ctx, record))
    }

    /// Wrap a persisted record.
    pub fn load(ctx: &PortContext, record: GroupPortRecord) -> Self {
        Self {
            ctx: ctx.clone(),
            record,
        }
    }

    /// Typed record.
    pub fn data(&self) -> &GroupPortRecord {
        &self.record
    }
}

#[async_trait]
impl PortGenerator for GroupPortV1 {
    fn kind(&self) -> PortKind {
        PortKind::Group
    }

    fn version(&self) -> &str {
        &self.record.version
    }

    fn port_id(&self) -> &str {
        &self.record.port_id
    }

    fn record(&self) -> GeneratedPort {
        GeneratedPort::Group(self.record.clone())
    }

    async fn get_shareable_bundle(&mut self) -> PortResult<Bundle> {
        Ok(Bundle::Group(GroupBundle {
            port_id: self.record.port_id.clone(),
            version: self.record.version.clone(),
            org: ORG_NAME.to_string(),
            target: PortKind::Group,
            name: Some(clip_name(&self.record.name)),
            description: self.record.description.clone(),
            expiry_timestamp: self.record.expiry_timestamp,
        }))
    }

    async fn get_shareable_link(&mut self) -> PortResult<String> {
        let bundle = self.get_shareable_bundle().await?;
        let resolved =
            resolve_shareable_link(&self.ctx, self.record.bundle_id.as_deref(), &bundle, false)
                .await?;
        if let Some(bundle_id) = resolved.minted {
            self.record.bundle_id = Some(bundle_id);
            if let Err(e) = self
                .ctx
                .store
                .save_generated(GeneratedPort::Group(self.record.clone()))
                .await
            {
                warn!(port_id = %self.record.port_id, error = %e, "[portline] failed to cache bundle id");
            }
        }
        Ok(resolved.link)
    }

    /// Deletes the record.
    async fn consume(&mut self) -> PortResult<()> {
        self.ctx.store.delete_generated(&self.record.port_id).await?;
        info!(port_id = %self.record.port_id, "[portline] group port consumed");
        Ok(())
    }

    async fn clean(&mut self) {
        if let Err(e) = self.ctx.store.delete_generated(&self.record.port_id).await {
            warn!(port_id = %self.record.port_id, error = %e, "[portline] failed to delete group port");
        }
    }
}
